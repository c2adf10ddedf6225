//! Output repair for model predictions

pub mod normalize;
pub mod ranks;

// Re-export commonly used types
pub use normalize::{NormalizerConfig, ProbabilityNormalizer, StrictOutput, MAX_PRECISION};
pub use ranks::{coerce_rank, repair_ranks, RankRepairer, TieBreak};
