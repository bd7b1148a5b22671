//! Delay distribution specifications.
//!
//! Every connection class draws its delays from a normal distribution that is
//! redrawn (not clamped) until the value falls inside the class bounds.
//! Intra-area delays live in `[min_delay, threshold_delay]` and inter-area
//! delays in `[threshold_delay, max_delay]`, so local and long-range delays
//! never overlap.
//!
//! The specifications are handed to the engine as-is; [`DelaySpec::sample`]
//! exists for consumers that need realised values.

use log::{info, warn};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::Serialize;

use crate::config::{GlobalConfig, ValidationError};
use crate::topology::AreaId;
use crate::utils::stats::interval_probability;
use crate::{MAX_REDRAW_ATTEMPTS, MIN_ACCEPTANCE};

/// Errors raised while building or sampling delay distributions
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DelayError {
    #[error(transparent)]
    Config(#[from] ValidationError),

    #[error("Delay bounds [{lower}, {upper}] are not an interval of non-negative values")]
    InvalidBounds { lower: f64, upper: f64 },

    #[error("Delay mean {mean} lies outside its bounds [{lower}, {upper}]")]
    MeanOutOfBounds { mean: f64, lower: f64, upper: f64 },

    #[error("Delay standard deviation must be non-negative, got {0}")]
    InvalidStd(f64),

    #[error("Normal({mean}, {std}) lands in [{lower}, {upper}] with probability {acceptance:.3e}; redraw sampling would not terminate in practice")]
    Pathological {
        mean: f64,
        std: f64,
        lower: f64,
        upper: f64,
        acceptance: f64,
    },

    #[error("No delay inside the bounds after {attempts} draws")]
    ResamplingExhausted { attempts: usize },
}

/// Normal distribution redrawn until it falls in `[lower_bound, upper_bound]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DelaySpec {
    pub mean: f64,
    pub std: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

impl DelaySpec {
    /// Build a delay specification.
    ///
    /// Rejects bounds that do not form an interval, a mean outside the bounds,
    /// and distributions whose mass inside the bounds is too small for redraw
    /// sampling to finish.
    pub fn new(mean: f64, std: f64, lower_bound: f64, upper_bound: f64) -> Result<Self, DelayError> {
        if !(lower_bound.is_finite() && upper_bound.is_finite())
            || lower_bound < 0.0
            || lower_bound > upper_bound
        {
            return Err(DelayError::InvalidBounds {
                lower: lower_bound,
                upper: upper_bound,
            });
        }
        if !(lower_bound..=upper_bound).contains(&mean) {
            return Err(DelayError::MeanOutOfBounds {
                mean,
                lower: lower_bound,
                upper: upper_bound,
            });
        }
        if !(std.is_finite() && std >= 0.0) {
            return Err(DelayError::InvalidStd(std));
        }

        let spec = Self {
            mean,
            std,
            lower_bound,
            upper_bound,
        };
        if !spec.is_constant() {
            let acceptance = spec.acceptance_probability();
            if acceptance < MIN_ACCEPTANCE {
                return Err(DelayError::Pathological {
                    mean,
                    std,
                    lower: lower_bound,
                    upper: upper_bound,
                    acceptance,
                });
            }
        }
        Ok(spec)
    }

    /// Build a specification whose standard deviation is `rel_std * mean`
    pub fn with_relative_std(
        mean: f64,
        rel_std: f64,
        lower_bound: f64,
        upper_bound: f64,
    ) -> Result<Self, DelayError> {
        Self::new(mean, rel_std * mean, lower_bound, upper_bound)
    }

    /// Whether every draw yields the same value
    pub fn is_constant(&self) -> bool {
        self.lower_bound == self.upper_bound || self.std == 0.0
    }

    /// Probability that a single draw is accepted
    pub fn acceptance_probability(&self) -> f64 {
        interval_probability(self.mean, self.std, self.lower_bound, self.upper_bound)
    }

    /// Draw one delay, redrawing values outside the bounds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64, DelayError> {
        if self.lower_bound == self.upper_bound {
            return Ok(self.lower_bound);
        }
        if self.std == 0.0 {
            return Ok(self.mean);
        }

        let normal = Normal::new(self.mean, self.std).map_err(|_| DelayError::InvalidStd(self.std))?;
        for _ in 0..MAX_REDRAW_ATTEMPTS {
            let delay = normal.sample(rng);
            if (self.lower_bound..=self.upper_bound).contains(&delay) {
                return Ok(delay);
            }
        }
        Err(DelayError::ResamplingExhausted {
            attempts: MAX_REDRAW_ATTEMPTS,
        })
    }
}

/// Index of a delay specification inside a [`DelayTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct DelayId(pub usize);

/// Inter-area delay specification dedicated to one ordered pair of areas
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PairDelay {
    pub pre: AreaId,
    pub post: AreaId,
    pub delay: DelayId,
}

/// All delay specifications of a run.
///
/// Holds one intra-area specification, one shared inter-area specification,
/// and one extra entry per ordered pair with its own configured mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelayTable {
    specs: Vec<DelaySpec>,
    intra: DelayId,
    inter: DelayId,
    /// Sorted by `(pre, post)`
    pairs: Vec<PairDelay>,
}

impl DelayTable {
    pub fn get(&self, id: DelayId) -> Option<&DelaySpec> {
        self.specs.get(id.0)
    }

    pub fn intra_id(&self) -> DelayId {
        self.intra
    }

    pub fn inter_id(&self) -> DelayId {
        self.inter
    }

    pub fn intra(&self) -> &DelaySpec {
        &self.specs[self.intra.0]
    }

    pub fn inter(&self) -> &DelaySpec {
        &self.specs[self.inter.0]
    }

    /// Specification used for connections from `pre` to `post`
    pub fn inter_for(&self, pre: AreaId, post: AreaId) -> DelayId {
        self.pairs
            .binary_search_by_key(&(pre, post), |p| (p.pre, p.post))
            .map(|i| self.pairs[i].delay)
            .unwrap_or(self.inter)
    }

    pub fn pairs(&self) -> &[PairDelay] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Build the delay specifications of every connection class.
///
/// Without configured means, intra-area delays are centred on
/// `threshold_delay / 2` and inter-area delays on
/// `(max_delay + threshold_delay) / 2`. Derived means are pulled into their
/// class bounds; configured means must already lie inside them.
pub fn build_delay_table(config: &GlobalConfig) -> Result<DelayTable, DelayError> {
    config.validate()?;

    let (intra_lower, intra_upper) = (config.min_delay, config.threshold_delay);
    let (inter_lower, inter_upper) = (config.threshold_delay, config.max_delay);

    let intra_mean = config
        .delay_mean_intra
        .unwrap_or_else(|| default_mean(config.threshold_delay / 2.0, intra_lower, intra_upper, "intra"));
    let inter_mean = config.delay_mean_inter.unwrap_or_else(|| {
        default_mean(
            (config.max_delay + config.threshold_delay) / 2.0,
            inter_lower,
            inter_upper,
            "inter",
        )
    });

    let intra = DelaySpec::with_relative_std(intra_mean, config.delay_rel_std, intra_lower, intra_upper)?;
    let inter = DelaySpec::with_relative_std(inter_mean, config.delay_rel_std, inter_lower, inter_upper)?;
    info!("Intra-area delays: {:?}", intra);
    info!("Inter-area delays: {:?}", inter);

    let mut specs = vec![intra, inter];
    let mut pairs: Vec<PairDelay> = Vec::new();
    for pair in &config.pair_delay_means {
        let spec = DelaySpec::with_relative_std(pair.mean, config.delay_rel_std, inter_lower, inter_upper)?;
        let (pre, post) = (AreaId(pair.pre), AreaId(pair.post));
        specs.push(spec);
        let delay = DelayId(specs.len() - 1);

        match pairs.binary_search_by_key(&(pre, post), |p| (p.pre, p.post)) {
            Ok(i) => {
                warn!("Delay mean for {} -> {} configured twice, keeping {}", pre, post, pair.mean);
                pairs[i].delay = delay;
            }
            Err(i) => pairs.insert(i, PairDelay { pre, post, delay }),
        }
    }

    Ok(DelayTable {
        specs,
        intra: DelayId(0),
        inter: DelayId(1),
        pairs,
    })
}

fn default_mean(mean: f64, lower: f64, upper: f64, class: &str) -> f64 {
    let clamped = mean.clamp(lower, upper);
    if clamped != mean {
        warn!(
            "Default {}-area delay mean {} lies outside [{}, {}], using {}",
            class, mean, lower, upper, clamped
        );
    }
    clamped
}
