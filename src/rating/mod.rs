//! Skill rating for schemas.

pub mod elo;

pub use elo::{DEFAULT_INITIAL_RATING, DEFAULT_K_FACTOR, EloEngine, MatchResult, expected_score};
