use thiserror::Error;

use crate::models::{RankAssignment, ScoreDistribution};

/// Failures inside history extraction. Never escapes `HistoryExtractor::extract`.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid selector: {0}")]
    Selector(String),

    #[error("Markup is empty")]
    EmptyMarkup,
}

/// Model reply could not be read as a JSON object
#[derive(Debug, Error)]
pub enum ReplyError {
    #[error("Reply contains no JSON object")]
    NoJsonObject,

    #[error("Reply JSON is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Output invariant violations
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Probability for {id} out of range: {value}")]
    ProbabilityOutOfRange { id: String, value: f64 },

    #[error("Probabilities sum to {total}, expected 1.0")]
    BadTotal { total: f64 },

    #[error("Rank for {id} must be between 1 and {max}, got {rank}")]
    RankOutOfRange { id: String, rank: u32, max: usize },

    #[error("Rank {rank} assigned more than once")]
    DuplicateRank { rank: u32 },
}

/// Check that a distribution is a valid probability mass function
pub fn validate_distribution(
    distribution: &ScoreDistribution,
    tolerance: f64,
) -> Result<(), ValidationError> {
    if distribution.is_empty() {
        return Ok(());
    }

    for (id, value) in distribution.iter() {
        if !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::ProbabilityOutOfRange {
                id: id.to_string(),
                value,
            });
        }
    }

    let total = distribution.total();
    if (total - 1.0).abs() > tolerance {
        return Err(ValidationError::BadTotal { total });
    }
    Ok(())
}

/// Check that ranks form a permutation of 1..=N
pub fn validate_permutation(ranks: &RankAssignment) -> Result<(), ValidationError> {
    let max = ranks.len();
    let mut seen = vec![false; max];

    for (id, rank) in ranks.iter() {
        if rank == 0 || rank as usize > max {
            return Err(ValidationError::RankOutOfRange {
                id: id.to_string(),
                rank,
                max,
            });
        }
        let slot = &mut seen[rank as usize - 1];
        if *slot {
            return Err(ValidationError::DuplicateRank { rank });
        }
        *slot = true;
    }
    Ok(())
}
