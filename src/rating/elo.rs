//! Logistic Elo rating update.
//!
//! ```
//! use review_arena::rating::{EloEngine, MatchResult};
//!
//! let engine = EloEngine::default();
//! let (a, b) = engine.rate(1500.0, 1500.0, MatchResult::AWins);
//! assert_eq!((a, b), (1516.0, 1484.0));
//! ```

use serde::{Deserialize, Serialize};

/// Default step size for a single result.
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Rating given to a schema the first time it is seen.
pub const DEFAULT_INITIAL_RATING: f64 = 1500.0;

/// Outcome of one A/B match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchResult {
    AWins,
    BWins,
    Tie,
}

impl MatchResult {
    /// Actual score for side A (B's is `1 - score_a`).
    pub fn score_a(self) -> f64 {
        match self {
            Self::AWins => 1.0,
            Self::BWins => 0.0,
            Self::Tie => 0.5,
        }
    }
}

/// Probability-like expected score of `rating` against `opponent`.
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

/// Pure Elo calculator with a fixed K-factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloEngine {
    pub k_factor: f64,
}

impl Default for EloEngine {
    fn default() -> Self {
        Self {
            k_factor: DEFAULT_K_FACTOR,
        }
    }
}

impl EloEngine {
    pub fn new(k_factor: f64) -> Self {
        Self { k_factor }
    }

    /// New `(rating_a, rating_b)` after a match.
    ///
    /// B's delta is the exact negation of A's, so the pair is zero-sum up to
    /// one rounding step in each addition.
    pub fn rate(&self, rating_a: f64, rating_b: f64, result: MatchResult) -> (f64, f64) {
        let expected_a = expected_score(rating_a, rating_b);
        let expected_b = 1.0 - expected_a;
        let score_a = result.score_a();
        let score_b = 1.0 - score_a;

        let new_a = rating_a + self.k_factor * (score_a - expected_a);
        let new_b = rating_b + self.k_factor * (score_b - expected_b);
        (new_a, new_b)
    }
}
