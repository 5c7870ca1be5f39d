//! Session inspection and voting (`review-arena session`).

use anyhow::{Context, Result};

use review_arena::arena::models::{ArenaSession, ReviewResult, SessionState, Side, Vote};
use review_arena::arena::server;
use review_arena::arena_config::ArenaToml;

use super::super::SessionCommands;
use super::describe_schema;

pub async fn cmd_session(config: &ArenaToml, command: SessionCommands) -> Result<()> {
    let service = server::build_service(config)?;

    match command {
        SessionCommands::List {
            project_id,
            state,
            json,
        } => {
            let state = state
                .as_deref()
                .map(str::parse::<SessionState>)
                .transpose()
                .map_err(anyhow::Error::msg)?;
            let sessions = service.list_sessions(project_id, state).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&sessions)?);
            } else if sessions.is_empty() {
                println!("No arena sessions.");
            } else {
                println!(
                    "{:>6}  {:>8}  {:<10}  {:<5}  Created",
                    "ID", "Project", "State", "Vote"
                );
                for s in &sessions {
                    println!(
                        "{:>6}  {:>8}  {:<10}  {:<5}  {}",
                        s.id,
                        s.project_id,
                        s.state,
                        s.vote.map(|v| v.as_str()).unwrap_or("-"),
                        s.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
        SessionCommands::Show { id, json } => {
            let session = service.get_session(id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                print_session(&session);
            }
        }
        SessionCommands::Vote { id, vote, json } => {
            let vote: Vote = vote
                .to_lowercase()
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid vote")?;
            let outcome = service.cast_vote(id, vote).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!(
                    "{} vote '{}' for session {}",
                    console::style("Recorded").green().bold(),
                    outcome.vote,
                    outcome.session_id
                );
                for rating in [&outcome.schema_a, &outcome.schema_b] {
                    println!(
                        "  {}  elo {:.1}  ({}/{}/{})",
                        rating.schema_hash.short(),
                        rating.elo_rating,
                        rating.wins,
                        rating.losses,
                        rating.ties
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_session(session: &ArenaSession) {
    println!(
        "{}",
        console::style(format!("Arena session {}", session.id))
            .bold()
            .cyan()
    );
    println!("  project: {}", session.project_id);
    println!("  state:   {}", state_label(session.state));
    if let Some(vote) = session.vote {
        println!("  vote:    {}", vote);
    }
    if let Some(reason) = &session.failure_reason {
        println!("  failure: {}", console::style(reason).red());
    }
    for side in [Side::A, Side::B] {
        println!();
        println!(
            "  Schema {} ({})",
            side.as_str().to_uppercase(),
            session.schema_hash(side).short()
        );
        let schema = match side {
            Side::A => &session.schema_a_config,
            Side::B => &session.schema_b_config,
        };
        println!("    roles:  {}", describe_schema(schema));
        println!("    job:    {}", session.job_ref(side));
        println!("    result: {}", result_label(session.result(side)));
    }
}

fn state_label(state: SessionState) -> String {
    match state {
        SessionState::Completed => console::style(state).green().to_string(),
        SessionState::Failed => console::style(state).red().to_string(),
        SessionState::Voting => console::style(state).yellow().to_string(),
        _ => state.to_string(),
    }
}

fn result_label(result: Option<&ReviewResult>) -> String {
    match result {
        Some(r) => format!(
            "{} issues ({})",
            r.issue_count,
            r.completed_at.format("%Y-%m-%d %H:%M:%S")
        ),
        None => "pending".to_string(),
    }
}
