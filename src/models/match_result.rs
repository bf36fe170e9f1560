use crate::odds::Score;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Normalised result of one match from the results feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: String,
    pub home_score: u32,
    pub away_score: u32,
    pub finished: bool,
}

impl MatchResult {
    pub fn score(&self) -> Score {
        Score::new(self.home_score, self.away_score)
    }
}

/// Results of one fetch keyed by match id. A later entry for the same match
/// replaces an earlier one.
#[derive(Debug, Clone, Default)]
pub struct ResultsSnapshot {
    results: HashMap<String, MatchResult>,
}

impl ResultsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, result: MatchResult) {
        self.results.insert(result.match_id.clone(), result);
    }

    pub fn get(&self, match_id: &str) -> Option<&MatchResult> {
        self.results.get(match_id)
    }

    /// Final score, only when the match is known and finished
    pub fn final_score(&self, match_id: &str) -> Option<Score> {
        self.get(match_id).filter(|r| r.finished).map(MatchResult::score)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn finished_count(&self) -> usize {
        self.results.values().filter(|r| r.finished).count()
    }
}

impl FromIterator<MatchResult> for ResultsSnapshot {
    fn from_iter<I: IntoIterator<Item = MatchResult>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for result in iter {
            snapshot.insert(result);
        }
        snapshot
    }
}
