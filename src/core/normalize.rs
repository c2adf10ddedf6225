//! Win probability normalization
//!
//! Model replies are arbitrary numbers: negative, zero, NaN, or not summing to
//! one. `ProbabilityNormalizer` always returns a distribution over exactly the
//! input keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::ScoreDistribution;

/// Most decimal places `f64` can hold meaningfully
pub const MAX_PRECISION: u32 = 15;

const DEFAULT_FLOOR: f64 = 1e-4;

/// Rounding and zero-floor applied for consumers that reject exact zeros.
///
/// Out-of-range settings are replaced when the normalizer runs: precision is
/// capped at `MAX_PRECISION` and a floor that is not finite and positive
/// falls back to `1e-4`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrictOutput {
    /// Decimal places kept when rounding
    pub precision: u32,
    /// Replacement for probabilities that round to zero
    pub floor: f64,
}

impl Default for StrictOutput {
    fn default() -> Self {
        Self {
            precision: 4,
            floor: DEFAULT_FLOOR,
        }
    }
}

impl StrictOutput {
    pub fn new(precision: u32, floor: f64) -> Self {
        Self { precision, floor }.sanitized()
    }

    fn sanitized(self) -> Self {
        let floor = if self.floor.is_finite() && self.floor > 0.0 {
            self.floor
        } else {
            tracing::warn!("Invalid strict floor {}, using {}", self.floor, DEFAULT_FLOOR);
            DEFAULT_FLOOR
        };
        Self {
            precision: self.precision.min(MAX_PRECISION),
            floor,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub strict: Option<StrictOutput>,
}

impl NormalizerConfig {
    pub fn strict() -> Self {
        Self {
            strict: Some(StrictOutput::default()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProbabilityNormalizer {
    config: NormalizerConfig,
}

impl ProbabilityNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize raw scores into probabilities.
    ///
    /// Negative and non-finite scores count as zero. When nothing positive is
    /// left, every key gets `1/N`.
    pub fn normalize(&self, raw: &BTreeMap<String, f64>) -> ScoreDistribution {
        let distribution = normalize_scores(raw);
        match self.config.strict {
            Some(strict) => apply_strict(distribution, strict),
            None => ScoreDistribution::from_map(distribution),
        }
    }
}

fn clamp_score(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn normalize_scores(raw: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
    let mut clamped: BTreeMap<String, f64> = raw
        .iter()
        .map(|(id, &v)| (id.clone(), clamp_score(v)))
        .collect();
    let mut total: f64 = clamped.values().sum();

    // Finite scores can still overflow the sum; rescale by the largest first
    if total.is_infinite() {
        let max = clamped.values().copied().fold(0.0, f64::max);
        clamped.values_mut().for_each(|v| *v /= max);
        total = clamped.values().sum();
    }

    if total <= 0.0 {
        if !raw.is_empty() {
            tracing::warn!(
                "No positive scores among {} runners, using uniform distribution",
                raw.len()
            );
        }
        return uniform(raw.keys());
    }

    clamped.into_iter().map(|(id, v)| (id, v / total)).collect()
}

fn uniform<'a>(ids: impl ExactSizeIterator<Item = &'a String>) -> BTreeMap<String, f64> {
    let n = ids.len();
    if n == 0 {
        return BTreeMap::new();
    }
    let p = 1.0 / n as f64;
    ids.map(|id| (id.clone(), p)).collect()
}

fn apply_strict(distribution: BTreeMap<String, f64>, strict: StrictOutput) -> ScoreDistribution {
    let strict = strict.sanitized();
    let scale = 10f64.powi(strict.precision as i32);

    let floored: BTreeMap<String, f64> = distribution
        .into_iter()
        .map(|(id, p)| {
            let rounded = (p * scale).round() / scale;
            (id, if rounded <= 0.0 { strict.floor } else { rounded })
        })
        .collect();

    let total: f64 = floored.values().sum();
    if total <= 0.0 {
        return ScoreDistribution::from_map(uniform(floored.keys()));
    }

    ScoreDistribution::from_map(floored.into_iter().map(|(id, p)| (id, p / total)).collect())
}
