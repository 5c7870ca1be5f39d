//! Project initialization (`review-arena init`).

use anyhow::{Context, Result};
use console::style;
use std::path::Path;

use review_arena::arena::db::ArenaDb;
use review_arena::arena_config::{ArenaToml, CONFIG_FILE};

use super::{arena_dir, load_config};

pub fn cmd_init(project_dir: &Path, force: bool) -> Result<()> {
    let dir = arena_dir(project_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let config_path = dir.join(CONFIG_FILE);
    let wrote_config = force || !config_path.exists();
    if wrote_config {
        ArenaToml::default().save(&config_path)?;
    }

    let config = load_config(project_dir)?;
    ArenaDb::new(&config.server.db_path).with_context(|| {
        format!(
            "Failed to initialize arena database at {}",
            config.server.db_path.display()
        )
    })?;

    if wrote_config {
        println!(
            "{} arena project at {}",
            style("Initialized").green().bold(),
            dir.display()
        );
    } else {
        println!("Arena project already initialized at {}", dir.display());
        println!("Kept existing {}; database verified.", CONFIG_FILE);
    }
    println!();
    println!("  config:   {}", config_path.display());
    println!("  database: {}", config.server.db_path.display());
    println!();
    println!("Next steps:");
    println!("  1. Set [executor] review_cmd in {}", CONFIG_FILE);
    println!("  2. Run `review-arena serve` and POST sessions to /api/arena/sessions");

    Ok(())
}
