//! Shared utilities: normal distribution helpers, plan validation.

pub mod stats;
pub mod validation;

pub use stats::{interval_probability, normal_cdf, normal_sf};
pub use validation::validate_plan_consistency;
