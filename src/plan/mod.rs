//! Connectivity plan module.
//!
//! Combines the derived areas and delay specifications into the ordered list
//! of connection rules submitted to the engine: one intra-area rule per area,
//! followed by one inter-area rule per ordered pair of distinct areas.

pub mod types;
pub mod assembler;

pub use types::{ConnectionClass, ConnectionRule, ConnectivityPlan};
pub use assembler::{assemble_plan, build_plan, PlanError};
