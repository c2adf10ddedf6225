//! Finishing-order repair
//!
//! Turns whatever the model returned for each runner into a permutation of
//! `1..=N`. Values are accepted in canonical runner order (usually ascending
//! horse number); a rank already taken by an earlier runner is not granted
//! again, and every runner left without a rank receives the smallest ranks
//! nobody claimed.

use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

use crate::models::RankAssignment;

/// Settles competing claims on one rank
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// The earliest runner in canonical order keeps the rank
    #[default]
    FirstClaimWins,
}

#[derive(Debug, Clone, Default)]
pub struct RankRepairer {
    tie_break: TieBreak,
}

impl RankRepairer {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Repair raw ranks into a permutation over `ids`.
    ///
    /// `ids` fixes both the runner set and the claim order. Repeated ids count
    /// once. Runners missing from `raw` are treated as unranked.
    pub fn repair<S: AsRef<str>>(&self, ids: &[S], raw: &BTreeMap<String, Value>) -> RankAssignment {
        let mut seen = HashSet::new();
        let ids: Vec<&str> = ids
            .iter()
            .map(|id| id.as_ref())
            .filter(|id| seen.insert(*id))
            .collect();
        let n = ids.len();

        // Pass 1: accept in-range, unclaimed values in canonical order
        let mut claimed = vec![false; n];
        let mut assigned: Vec<Option<u32>> = Vec::with_capacity(n);
        for id in &ids {
            let rank = raw
                .get(*id)
                .and_then(coerce_rank)
                .filter(|r| (1..=n as i64).contains(r))
                .filter(|r| match self.tie_break {
                    TieBreak::FirstClaimWins => !claimed[*r as usize - 1],
                });

            if let Some(r) = rank {
                claimed[r as usize - 1] = true;
            }
            assigned.push(rank.map(|r| r as u32));
        }

        // Pass 2: hand out the unclaimed ranks, smallest first
        let mut free = claimed
            .iter()
            .enumerate()
            .filter(|(_, taken)| !**taken)
            .map(|(i, _)| i as u32 + 1);

        let mut repaired = 0;
        let mut ranks = BTreeMap::new();
        for (id, rank) in ids.iter().zip(assigned) {
            let rank = match rank {
                Some(r) => r,
                None => {
                    repaired += 1;
                    // One free rank exists per unassigned runner
                    free.next().unwrap_or(n as u32)
                }
            };
            ranks.insert(id.to_string(), rank);
        }

        if repaired > 0 {
            tracing::warn!("Reassigned ranks for {} of {} runners", repaired, n);
        }

        RankAssignment::from_map(ranks)
    }
}

/// Repair with the default first-claim-wins policy
pub fn repair_ranks<S: AsRef<str>>(ids: &[S], raw: &BTreeMap<String, Value>) -> RankAssignment {
    RankRepairer::default().repair(ids, raw)
}

/// Read a rank from a JSON value: integers, integral floats, numeric strings
pub fn coerce_rank(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}
