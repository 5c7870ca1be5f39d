use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use review_arena::logging::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "review-arena")]
#[command(version, about = "Blind A/B comparison of code review schemas")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Log output format. Overrides arena.toml [logging] format.
    #[arg(long, value_enum, global = true)]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .arena/ with a default arena.toml and an empty database
    Init {
        /// Overwrite an existing arena.toml with defaults
        #[arg(long)]
        force: bool,
    },
    /// Run the arena HTTP server
    Serve {
        /// Port to serve on (overrides arena.toml and ARENA_PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Database path (overrides arena.toml and ARENA_DB_PATH)
        #[arg(long)]
        db_path: Option<PathBuf>,

        /// Enable dev mode (CORS permissive for a local frontend)
        #[arg(long)]
        dev: bool,
    },
    /// Show the schema leaderboard
    Rankings {
        /// Only schemas with at least this many games
        #[arg(long, default_value = "0")]
        min_games: u32,

        /// Show at most this many schemas
        #[arg(short, long)]
        limit: Option<usize>,

        /// Only schemas where some role uses this provider
        #[arg(long)]
        provider: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Inspect sessions and cast votes
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Fail voting sessions older than [sessions] abandon_voting_after_secs
    Expire {
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum SessionCommands {
    /// List sessions, newest first
    List {
        #[arg(long)]
        project_id: Option<i64>,

        /// created, running, voting, completed or failed
        #[arg(long)]
        state: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Show one session
    Show {
        id: i64,

        #[arg(long)]
        json: bool,
    },
    /// Record the human verdict for a session in voting
    Vote {
        id: i64,

        /// a, b or tie
        vote: String,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Check arena.toml for suspicious values
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    // `init` and `config` read the file themselves and run before logging is
    // configured from it.
    match &cli.command {
        Commands::Init { force } => return cmd::cmd_init(&project_dir, *force),
        Commands::Config { command } => {
            return cmd::cmd_config(&project_dir, command.clone());
        }
        _ => {}
    }

    let mut config = cmd::load_config(&project_dir)?;
    if let Commands::Serve { port, db_path, .. } = &cli.command {
        if let Some(port) = port {
            config.server.port = *port;
        }
        if let Some(db_path) = db_path {
            config.server.db_path = project_dir.join(db_path);
        }
    }

    let format = cli.log_format.unwrap_or(config.logging.format);
    let _log_guard = logging::init(format, config.logging.directory.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Serve { dev, .. } => cmd::cmd_serve(&config, dev).await?,
        Commands::Rankings {
            min_games,
            limit,
            provider,
            json,
        } => cmd::cmd_rankings(&config, min_games, limit, provider, json).await?,
        Commands::Session { command } => cmd::cmd_session(&config, command).await?,
        Commands::Expire { json } => cmd::cmd_expire(&config, json).await?,
        Commands::Init { .. } | Commands::Config { .. } => {}
    }

    Ok(())
}
