//! Model reply handling
//!
//! The prediction model answers with a JSON object keyed by horse id. Replies
//! are read leniently, aligned to the runners actually in the race, and
//! replaced by `FallbackPredictor` output when the call produced nothing usable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::core::{ProbabilityNormalizer, RankRepairer};
use crate::error::ReplyError;
use crate::models::{RankAssignment, ScoreDistribution};

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());

/// Read a model reply as a JSON object.
///
/// Replies wrapped in prose or code fences are handled by retrying on the
/// outermost `{...}` span.
pub fn parse_reply_object(content: &str) -> Result<Map<String, Value>, ReplyError> {
    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(content.trim()) {
        return Ok(object);
    }

    let span = JSON_OBJECT
        .find(content)
        .ok_or(ReplyError::NoJsonObject)?;
    match serde_json::from_str::<Value>(span.as_str())? {
        Value::Object(object) => Ok(object),
        _ => Err(ReplyError::NoJsonObject),
    }
}

/// Scores for exactly `ids`: unreadable or missing values become 0.0
pub fn scores_from_reply<S: AsRef<str>>(ids: &[S], reply: &Map<String, Value>) -> BTreeMap<String, f64> {
    ids.iter()
        .map(|id| {
            let id = id.as_ref();
            let score = reply.get(id).and_then(score_value).unwrap_or(0.0);
            (id.to_string(), score)
        })
        .collect()
}

/// Raw rank values as given; `RankRepairer` sorts out the rest
pub fn ranks_from_reply(reply: &Map<String, Value>) -> BTreeMap<String, Value> {
    reply.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

fn score_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Stand-in model output used when the prediction call fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackPredictor;

impl FallbackPredictor {
    pub fn new() -> Self {
        Self
    }

    /// Equal raw score for every runner
    pub fn scores<S: AsRef<str>>(&self, ids: &[S]) -> BTreeMap<String, f64> {
        ids.iter().map(|id| (id.as_ref().to_string(), 1.0)).collect()
    }

    /// Ranks in listing order
    pub fn ranks<S: AsRef<str>>(&self, ids: &[S]) -> BTreeMap<String, Value> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| (id.as_ref().to_string(), Value::from(i as u64 + 1)))
            .collect()
    }
}

/// Win probabilities from a model reply, or uniform ones when there is none
pub fn probabilities_from_reply<S: AsRef<str>>(
    ids: &[S],
    reply: Option<&str>,
    normalizer: &ProbabilityNormalizer,
) -> ScoreDistribution {
    let raw = match reply.map(parse_reply_object) {
        Some(Ok(object)) => scores_from_reply(ids, &object),
        Some(Err(e)) => {
            warn!("Unusable model reply ({}), using fallback scores", e);
            FallbackPredictor::new().scores(ids)
        }
        None => FallbackPredictor::new().scores(ids),
    };
    normalizer.normalize(&raw)
}

/// Finishing order from a model reply, or listing order when there is none
pub fn ranking_from_reply<S: AsRef<str>>(
    ids: &[S],
    reply: Option<&str>,
    repairer: &RankRepairer,
) -> RankAssignment {
    let raw = match reply.map(parse_reply_object) {
        Some(Ok(object)) => ranks_from_reply(&object),
        Some(Err(e)) => {
            warn!("Unusable model reply ({}), using listing order", e);
            FallbackPredictor::new().ranks(ids)
        }
        None => FallbackPredictor::new().ranks(ids),
    };
    repairer.repair(ids, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NormalizerConfig;
    use crate::error::{validate_distribution, validate_permutation};

    const IDS: [&str; 3] = ["h_202506040401_2", "h_202506040401_5", "h_202506040401_8"];

    #[test]
    fn test_parse_plain_object() {
        let object = parse_reply_object(r#"{"a": 0.6, "b": 0.4}"#).unwrap();
        assert_eq!(object.len(), 2);
    }

    #[test]
    fn test_parse_object_in_prose() {
        let reply = "Here you go:\n```json\n{\"a\": 0.6,\n \"b\": 0.4}\n```\nGood luck!";
        let object = parse_reply_object(reply).unwrap();
        assert_eq!(object.get("a"), Some(&Value::from(0.6)));
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            parse_reply_object("no json here"),
            Err(ReplyError::NoJsonObject)
        ));
        assert!(matches!(
            parse_reply_object("{not: valid}"),
            Err(ReplyError::Malformed(_))
        ));
        assert!(matches!(parse_reply_object("[1, 2]"), Err(ReplyError::NoJsonObject)));
    }

    #[test]
    fn test_scores_aligned_to_ids() {
        let object = parse_reply_object(
            r#"{"h_202506040401_2": 0.35, "h_202506040401_5": "0.25", "h_999": 0.4}"#,
        )
        .unwrap();
        let scores = scores_from_reply(&IDS, &object);

        assert_eq!(scores.len(), 3);
        assert_eq!(scores["h_202506040401_2"], 0.35);
        assert_eq!(scores["h_202506040401_5"], 0.25);
        assert_eq!(scores["h_202506040401_8"], 0.0);
        assert!(!scores.contains_key("h_999"));
    }

    #[test]
    fn test_fallback_predictor() {
        let fallback = FallbackPredictor::new();
        let scores = fallback.scores(&IDS);
        assert!(scores.values().all(|&v| v == 1.0));

        let ranks = fallback.ranks(&IDS);
        assert_eq!(ranks["h_202506040401_2"], Value::from(1));
        assert_eq!(ranks["h_202506040401_8"], Value::from(3));
    }

    #[test]
    fn test_probabilities_from_reply() {
        let normalizer = ProbabilityNormalizer::default();
        let dist = probabilities_from_reply(
            &IDS,
            Some(r#"{"h_202506040401_2": 3, "h_202506040401_5": 1, "h_202506040401_8": 0}"#),
            &normalizer,
        );
        assert!((dist.get("h_202506040401_2").unwrap() - 0.75).abs() < 1e-9);
        assert!(validate_distribution(&dist, 1e-9).is_ok());
    }

    #[test]
    fn test_probabilities_without_reply_are_uniform() {
        let normalizer = ProbabilityNormalizer::new(NormalizerConfig::strict());
        for reply in [None, Some("the model timed out")] {
            let dist = probabilities_from_reply(&IDS, reply, &normalizer);
            assert_eq!(dist.len(), 3);
            for (_, p) in dist.iter() {
                assert!((p - 1.0 / 3.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_ranking_from_reply() {
        let repairer = RankRepairer::default();
        let ranks = ranking_from_reply(
            &IDS,
            Some(r#"{"h_202506040401_2": 2, "h_202506040401_5": 2, "h_202506040401_8": 9}"#),
            &repairer,
        );
        assert_eq!(ranks.get("h_202506040401_2"), Some(2));
        assert_eq!(ranks.get("h_202506040401_5"), Some(1));
        assert_eq!(ranks.get("h_202506040401_8"), Some(3));
        assert!(validate_permutation(&ranks).is_ok());
    }

    #[test]
    fn test_ranking_without_reply_is_listing_order() {
        let ranks = ranking_from_reply(&IDS, None, &RankRepairer::default());
        assert_eq!(ranks.finishing_order(), IDS.to_vec());
    }
}
