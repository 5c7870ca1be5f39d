//! Leaderboard queries over the rating store.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::db::ArenaDb;
use super::models::SchemaRating;

/// Filters for a leaderboard read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingQuery {
    /// Only schemas with at least this many games.
    #[serde(default)]
    pub min_games: u32,
    /// Truncate to the top `limit` entries.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Only schemas where some role uses this provider.
    #[serde(default)]
    pub provider: Option<String>,
}

impl RankingQuery {
    pub fn min_games(min_games: u32) -> Self {
        Self {
            min_games,
            ..Self::default()
        }
    }
}

/// A leaderboard row with its 1-based position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSchema {
    pub rank: usize,
    pub win_rate: Option<f64>,
    #[serde(flatten)]
    pub rating: SchemaRating,
}

/// Ratings passing `query`, best first. Read-only.
pub fn list_rankings(db: &ArenaDb, query: &RankingQuery) -> Result<Vec<SchemaRating>> {
    let mut ratings = db.query_ratings(query.min_games)?;
    if let Some(provider) = query.provider.as_deref() {
        ratings.retain(|r| r.schema_config.uses_provider(provider));
    }
    if let Some(limit) = query.limit {
        ratings.truncate(limit);
    }
    Ok(ratings)
}

/// Attach ranks to an already ordered leaderboard.
pub fn rank(ratings: Vec<SchemaRating>) -> Vec<RankedSchema> {
    ratings
        .into_iter()
        .enumerate()
        .map(|(i, rating)| RankedSchema {
            rank: i + 1,
            win_rate: rating.win_rate(),
            rating,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AgentConfig, SchemaConfig, SchemaIdentity};

    fn seed(db: &ArenaDb, provider: &str, model: &str, elo: f64, wins: u32, losses: u32) -> Result<SchemaIdentity> {
        let config = SchemaConfig::new().with_role("general", AgentConfig::new(provider, model));
        let hash = SchemaIdentity::of(&config);
        db.get_or_create_rating(&hash, &config, 1500.0)?;
        db.update_rating(&hash, |r| {
            r.elo_rating = elo;
            r.wins = wins;
            r.losses = losses;
            r.games_played = wins + losses;
        })?;
        Ok(hash)
    }

    #[test]
    fn test_min_games_excludes_new_schemas() -> Result<()> {
        let db = ArenaDb::new_in_memory()?;
        let veteran = seed(&db, "openai", "gpt-4o", 1540.0, 4, 2)?;
        let _rookie = seed(&db, "openai", "gpt-4o-mini", 1580.0, 2, 0)?;
        let strong = seed(&db, "anthropic", "claude", 1620.0, 5, 0)?;

        let ranked = list_rankings(&db, &RankingQuery::min_games(5))?;
        let hashes: Vec<_> = ranked.iter().map(|r| r.schema_hash.clone()).collect();
        assert_eq!(hashes, vec![strong, veteran]);
        Ok(())
    }

    #[test]
    fn test_provider_filter_and_limit() -> Result<()> {
        let db = ArenaDb::new_in_memory()?;
        seed(&db, "openai", "a", 1600.0, 1, 0)?;
        seed(&db, "anthropic", "b", 1700.0, 1, 0)?;
        let third = seed(&db, "openai", "c", 1650.0, 1, 0)?;

        let query = RankingQuery {
            min_games: 0,
            limit: Some(1),
            provider: Some("openai".into()),
        };
        let ranked = list_rankings(&db, &query)?;
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].schema_hash, third);
        Ok(())
    }

    #[test]
    fn test_rank_numbers_from_one_with_win_rate() -> Result<()> {
        let db = ArenaDb::new_in_memory()?;
        seed(&db, "openai", "a", 1600.0, 3, 1)?;
        seed(&db, "openai", "b", 1500.0, 0, 0)?;

        let ranked = rank(list_rankings(&db, &RankingQuery::default())?);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[0].win_rate, Some(0.75));
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[1].win_rate, None);
        Ok(())
    }

    #[test]
    fn test_ranked_schema_serializes_flat() -> Result<()> {
        let db = ArenaDb::new_in_memory()?;
        seed(&db, "openai", "a", 1600.0, 1, 0)?;
        let ranked = rank(list_rankings(&db, &RankingQuery::default())?);
        let json = serde_json::to_value(&ranked[0])?;
        assert_eq!(json["rank"], 1);
        assert_eq!(json["elo_rating"], 1600.0);
        assert!(json["schema_hash"].is_string());
        Ok(())
    }
}
