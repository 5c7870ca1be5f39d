//! Abandoned-session sweep (`review-arena expire`).

use anyhow::Result;
use chrono::Utc;

use review_arena::arena::server;
use review_arena::arena_config::ArenaToml;

pub async fn cmd_expire(config: &ArenaToml, json: bool) -> Result<()> {
    let service = server::build_service(config)?;
    let expired = service.expire_abandoned(Utc::now()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&expired)?);
        return Ok(());
    }

    match config.sessions.abandon_voting_after_secs {
        None => {
            println!("No abandonment policy configured; voting sessions are kept.");
            println!("Set [sessions] abandon_voting_after_secs in arena.toml to enable expiry.");
        }
        Some(_) if expired.is_empty() => println!("No abandoned sessions."),
        Some(_) => {
            println!(
                "{} {} abandoned session(s):",
                console::style("Expired").yellow().bold(),
                expired.len()
            );
            for session in &expired {
                println!("  #{} (project {})", session.id, session.project_id);
            }
        }
    }

    Ok(())
}
