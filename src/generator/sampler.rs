//! Parameter sampling for question generation.
//!
//! Uses ChaCha8 RNG so a seeded sampler is fully reproducible. Numeric
//! factors are drawn from a normal distribution and clamped to [0, 1];
//! categorical choices are uniform.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relationship the question's claim has to the charted data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Supports,
    Contradicts,
    Extends,
    Qualifies,
}

impl ClaimType {
    const ALL: [ClaimType; 4] = [
        ClaimType::Supports,
        ClaimType::Contradicts,
        ClaimType::Extends,
        ClaimType::Qualifies,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Supports => "supports",
            ClaimType::Contradicts => "contradicts",
            ClaimType::Extends => "extends",
            ClaimType::Qualifies => "qualifies",
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subject domain the passage and chart are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Science,
    SocialScience,
    Humanities,
    Economics,
}

impl Domain {
    const ALL: [Domain; 4] = [
        Domain::Science,
        Domain::SocialScience,
        Domain::Humanities,
        Domain::Economics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Science => "science",
            Domain::SocialScience => "social_science",
            Domain::Humanities => "humanities",
            Domain::Economics => "economics",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strategy a distractor choice should follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistractorStrategy {
    /// Reads the wrong bar, point, or row.
    Misreading,
    /// Reads the right position in the wrong series.
    WrongSeries,
    /// Right direction, wrong magnitude.
    Magnitude,
    /// Plausible claim the data does not support.
    Unsupported,
    /// Inverts the trend shown.
    OppositeTrend,
}

impl DistractorStrategy {
    const ALL: [DistractorStrategy; 5] = [
        DistractorStrategy::Misreading,
        DistractorStrategy::WrongSeries,
        DistractorStrategy::Magnitude,
        DistractorStrategy::Unsupported,
        DistractorStrategy::OppositeTrend,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DistractorStrategy::Misreading => "misreading",
            DistractorStrategy::WrongSeries => "wrong_series",
            DistractorStrategy::Magnitude => "magnitude",
            DistractorStrategy::Unsupported => "unsupported",
            DistractorStrategy::OppositeTrend => "opposite_trend",
        }
    }
}

impl fmt::Display for DistractorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable parameters for one work item.
///
/// Created once at batch start and never mutated. Persisted verbatim into the
/// DLQ record on failure so a retry keeps the same semantic intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledParams {
    /// Overall difficulty factor in [0, 1].
    pub difficulty: f64,
    /// Passage text complexity factor in [0, 1].
    pub text_complexity: f64,
    /// How much data the chart should carry, in [0, 1].
    pub data_density: f64,
    pub claim_type: ClaimType,
    pub domain: Domain,
    /// Two or three distinct strategies for the distractor choices.
    pub distractor_strategies: Vec<DistractorStrategy>,
}

#[cfg(test)]
impl SampledParams {
    /// Fixed params for unit tests.
    pub fn fixture() -> Self {
        Self {
            difficulty: 0.5,
            text_complexity: 0.5,
            data_density: 0.5,
            claim_type: ClaimType::Supports,
            domain: Domain::Science,
            distractor_strategies: vec![
                DistractorStrategy::Misreading,
                DistractorStrategy::Magnitude,
            ],
        }
    }
}

/// Gaussian parameters for the numeric factors.
const FACTOR_MEAN: f64 = 0.55;
const FACTOR_STD_DEV: f64 = 0.18;

/// Seeded sampler producing [`SampledParams`].
pub struct ParamSampler {
    rng: ChaCha8Rng,
}

impl ParamSampler {
    /// Creates a sampler with an explicit seed (reproducible batches).
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a sampler seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::new(rand::random::<u64>())
    }

    /// Samples parameters for one work item.
    pub fn sample(&mut self) -> SampledParams {
        SampledParams {
            difficulty: self.sample_factor(),
            text_complexity: self.sample_factor(),
            data_density: self.sample_factor(),
            claim_type: ClaimType::ALL[self.rng.random_range(0..ClaimType::ALL.len())],
            domain: Domain::ALL[self.rng.random_range(0..Domain::ALL.len())],
            distractor_strategies: self.sample_strategies(),
        }
    }

    /// Draws one Gaussian factor, clamped to [0, 1].
    fn sample_factor(&mut self) -> f64 {
        // FACTOR_STD_DEV is a positive constant, so Normal::new cannot fail.
        let normal = Normal::new(FACTOR_MEAN, FACTOR_STD_DEV)
            .unwrap_or_else(|_| Normal::new(FACTOR_MEAN, f64::MIN_POSITIVE).unwrap());
        let sampled: f64 = self.rng.sample(normal);
        sampled.clamp(0.0, 1.0)
    }

    /// Picks 2 or 3 distinct distractor strategies, uniformly.
    fn sample_strategies(&mut self) -> Vec<DistractorStrategy> {
        let count = self.rng.random_range(2..=3);
        let mut pool = DistractorStrategy::ALL.to_vec();
        // Partial Fisher-Yates: the first `count` slots end up uniform.
        for i in 0..count {
            let j = self.rng.random_range(i..pool.len());
            pool.swap(i, j);
        }
        pool.truncate(count);
        pool
    }
}
