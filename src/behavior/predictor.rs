//! Predictor
//!
//! Ranks likely next resources from recorded navigation. The model is a
//! plain first-order transition count: confidence of `to` given `from` is
//! `count(from, to) / count(from, *)`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorEvent, BehaviorRecorder};

// == Prediction ==
/// A candidate next resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub resource_key: String,
    /// Empirical transition probability in [0, 1]
    pub confidence: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Candidate {
    count: u64,
    /// Position of the latest transition, for tie-breaking
    last_seen: usize,
}

// == Ranking ==
/// Computes predictions for `current` from events given oldest first.
///
/// Consecutive events of the same session form a transition; sessions with
/// a single event contribute nothing. Reloads (`A -> A`) count towards the
/// total but are never returned as a prediction. Ties are broken by the most
/// recent occurrence.
pub fn rank_transitions<'a, I>(events: I, current: &str, top_n: usize) -> Vec<Prediction>
where
    I: IntoIterator<Item = &'a BehaviorEvent>,
{
    let mut previous_by_session: HashMap<&str, &str> = HashMap::new();
    let mut candidates: HashMap<&str, Candidate> = HashMap::new();
    let mut total: u64 = 0;

    for (position, event) in events.into_iter().enumerate() {
        let key = event.resource_key.as_str();
        let previous = previous_by_session.insert(event.session_id.as_str(), key);

        if previous == Some(current) {
            total += 1;
            if key != current {
                let candidate = candidates.entry(key).or_default();
                candidate.count += 1;
                candidate.last_seen = position;
            }
        }
    }

    if total == 0 || top_n == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<(&str, Candidate)> = candidates.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| match b.count.cmp(&a.count) {
        Ordering::Equal => b.last_seen.cmp(&a.last_seen),
        other => other,
    });

    ranked
        .into_iter()
        .take(top_n)
        .map(|(key, candidate)| Prediction {
            resource_key: key.to_string(),
            confidence: candidate.count as f64 / total as f64,
        })
        .collect()
}

// == Predictor ==
/// Predictions over a recorder's retained history.
#[derive(Debug, Clone)]
pub struct Predictor {
    recorder: Arc<BehaviorRecorder>,
}

impl Predictor {
    pub fn new(recorder: Arc<BehaviorRecorder>) -> Self {
        Self { recorder }
    }

    /// Returns at most `top_n` predictions for the resource after `current`,
    /// highest confidence first. Empty on cold start.
    pub async fn predict_next(&self, current: &str, top_n: usize) -> Vec<Prediction> {
        let history = self.recorder.history(usize::MAX).await;
        rank_transitions(history.chronological(), current, top_n)
    }
}
