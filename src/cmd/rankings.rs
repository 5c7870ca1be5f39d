//! Schema leaderboard (`review-arena rankings`).

use anyhow::Result;

use review_arena::arena::ranking::{RankedSchema, RankingQuery};
use review_arena::arena::server;
use review_arena::arena_config::ArenaToml;

use super::describe_schema;

pub async fn cmd_rankings(
    config: &ArenaToml,
    min_games: u32,
    limit: Option<usize>,
    provider: Option<String>,
    json: bool,
) -> Result<()> {
    let service = server::build_service(config)?;
    let rankings = service
        .list_rankings(RankingQuery {
            min_games,
            limit,
            provider,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rankings)?);
        return Ok(());
    }

    if rankings.is_empty() {
        println!("No rated schemas yet.");
        return Ok(());
    }

    println!("{}", console::style("Schema Rankings").bold().cyan());
    println!();
    println!(
        "{:>4}  {:>7}  {:>5}  {:>9}  {:>6}  {:>10}  {:<12}  Roles",
        "#", "Elo", "Games", "W/L/T", "Win%", "Avg issues", "Schema"
    );
    for row in &rankings {
        println!("{}", format_row(row));
    }
    println!();

    Ok(())
}

fn format_row(row: &RankedSchema) -> String {
    let r = &row.rating;
    let win_rate = row
        .win_rate
        .map(|w| format!("{:.0}%", w * 100.0))
        .unwrap_or_else(|| "-".to_string());
    let avg_issues = r
        .avg_issues_found
        .map(|a| format!("{:.1}", a))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{:>4}  {:>7.1}  {:>5}  {:>9}  {:>6}  {:>10}  {:<12}  {}",
        row.rank,
        r.elo_rating,
        r.games_played,
        format!("{}/{}/{}", r.wins, r.losses, r.ties),
        win_rate,
        avg_issues,
        r.schema_hash.short(),
        describe_schema(&r.schema_config)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use review_arena::arena::models::SchemaRating;
    use review_arena::schema::{AgentConfig, SchemaConfig, SchemaIdentity};

    #[test]
    fn test_format_row_unplayed_schema_shows_dashes() {
        let schema = SchemaConfig::new().with_role("general", AgentConfig::new("openai", "gpt-4o"));
        let rating = SchemaRating::new(SchemaIdentity::of(&schema), schema, 1500.0, Utc::now());
        let line = format_row(&RankedSchema {
            rank: 1,
            win_rate: rating.win_rate(),
            rating,
        });
        assert!(line.contains("1500.0"));
        assert!(line.contains("0/0/0"));
        assert!(line.contains("general=openai/gpt-4o"));
        assert!(line.contains(" -  "));
    }
}
