//! Keiba - horse racing prediction core
//!
//! This library provides:
//! - Race history extraction from horse profile pages
//! - Win probability normalization for model output
//! - Finishing-order repair into a strict permutation
//! - Lenient model reply parsing with fallbacks
//!
//! Everything here is synchronous and side-effect free; fetching pages,
//! calling the model and writing results are left to the caller.
//!
//! # Example
//!
//! ```
//! use keiba::core::{ProbabilityNormalizer, RankRepairer};
//! use std::collections::BTreeMap;
//!
//! let mut scores = BTreeMap::new();
//! scores.insert("a".to_string(), 3.0);
//! scores.insert("b".to_string(), 1.0);
//! let probs = ProbabilityNormalizer::default().normalize(&scores);
//! assert_eq!(probs.get("a"), Some(0.75));
//!
//! let raw = serde_json::from_str(r#"{"x": 2, "y": 2, "z": 5}"#).unwrap();
//! let ranks = RankRepairer::default().repair(&["x", "y", "z"], &raw);
//! assert_eq!(ranks.get("y"), Some(1));
//! ```

pub mod core;
pub mod error;
pub mod models;
pub mod predictor;
pub mod scraper;

// Re-export commonly used types
pub use crate::core::{NormalizerConfig, ProbabilityNormalizer, RankRepairer, StrictOutput, TieBreak};
pub use error::{validate_distribution, validate_permutation, ReplyError, ValidationError};
pub use models::{
    FinishPosition, FinishTime, Going, HorseBrief, HorseEntry, Margin, MarginToken,
    PerformanceRecord, RankAssignment, ScoreDistribution, SpecialStatus, Surface, Venue,
};
pub use predictor::{parse_reply_object, probabilities_from_reply, ranking_from_reply, FallbackPredictor};
pub use scraper::{decode_markup, ExtractorConfig, HistoryExtractor};
