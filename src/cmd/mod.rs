//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                                   |
//! |-----------------|-----------------------------------------------------|
//! | `init`          | `Init`                                             |
//! | `serve`         | `Serve`                                            |
//! | `rankings`      | `Rankings`                                         |
//! | `session`       | `Session list`, `Session show`, `Session vote`     |
//! | `expire`        | `Expire`                                           |
//! | `config`        | `Config`                                           |

pub mod config;
pub mod expire;
pub mod init;
pub mod rankings;
pub mod serve;
pub mod session;

pub use config::cmd_config;
pub use expire::cmd_expire;
pub use init::cmd_init;
pub use rankings::cmd_rankings;
pub use serve::cmd_serve;
pub use session::cmd_session;

use anyhow::Result;
use std::path::{Path, PathBuf};

use review_arena::arena_config::{ARENA_DIR, ArenaToml};
use review_arena::schema::SchemaConfig;

/// `<project_dir>/.arena`
pub fn arena_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(ARENA_DIR)
}

/// Effective configuration: arena.toml, then `ARENA_*` variables, with
/// relative paths resolved against the project directory.
pub fn load_config(project_dir: &Path) -> Result<ArenaToml> {
    let mut config = ArenaToml::load_or_default(&arena_dir(project_dir))?;
    config.apply_env()?;
    resolve_paths(&mut config, project_dir);
    Ok(config)
}

fn resolve_paths(config: &mut ArenaToml, project_dir: &Path) {
    config.server.db_path = project_dir.join(&config.server.db_path);
    if let Some(dir) = config.logging.directory.take() {
        config.logging.directory = Some(project_dir.join(dir));
    }
    if let Some(dir) = config.executor.working_dir.take() {
        config.executor.working_dir = Some(project_dir.join(dir));
    }
}

/// One-line `role=provider/model` summary of a schema.
pub fn describe_schema(schema: &SchemaConfig) -> String {
    schema
        .iter()
        .map(|(role, agent)| format!("{}={}/{}", role, agent.provider, agent.model))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_arena::schema::AgentConfig;

    #[test]
    fn test_resolve_paths_keeps_absolute() {
        let mut config = ArenaToml::default();
        config.logging.directory = Some(PathBuf::from("/var/log/arena"));
        resolve_paths(&mut config, Path::new("/work/proj"));
        assert_eq!(
            config.server.db_path,
            PathBuf::from("/work/proj/.arena/arena.db")
        );
        assert_eq!(
            config.logging.directory,
            Some(PathBuf::from("/var/log/arena"))
        );
        assert_eq!(config.executor.working_dir, None);
    }

    #[test]
    fn test_describe_schema_lists_roles() {
        let schema = SchemaConfig::new()
            .with_role("security", AgentConfig::new("anthropic", "claude-sonnet"))
            .with_role("general", AgentConfig::new("openai", "gpt-4o"));
        assert_eq!(
            describe_schema(&schema),
            "general=openai/gpt-4o, security=anthropic/claude-sonnet"
        );
    }
}
