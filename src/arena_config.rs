//! Configuration for the review arena.
//!
//! Read from `.arena/arena.toml`, then overridden by environment variables,
//! then by CLI flags (file → environment → CLI). Every section is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3142
//! db_path = ".arena/arena.db"
//!
//! [rating]
//! k_factor = 32.0
//! initial_rating = 1500.0
//!
//! [sessions]
//! abandon_voting_after_secs = 86400
//!
//! [providers]
//! registered = ["anthropic", "openai"]
//!
//! [executor]
//! review_cmd = "review-runner"
//! args = ["--json"]
//! job_timeout_secs = 900
//!
//! [logging]
//! format = "pretty"
//! directory = ".arena/logs"
//! ```
//!
//! Environment overrides: `ARENA_PORT`, `ARENA_DB_PATH`, `ARENA_K_FACTOR`,
//! `ARENA_REVIEW_CMD`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::arena::executor::{DEFAULT_JOB_TIMEOUT_SECS, DEFAULT_REVIEW_CMD, ProcessExecutorConfig};
use crate::arena::service::ArenaSettings;
use crate::logging::LogFormat;
use crate::rating::{DEFAULT_INITIAL_RATING, DEFAULT_K_FACTOR, EloEngine};
use crate::schema::ProviderRegistry;

/// Directory holding config, database and logs.
pub const ARENA_DIR: &str = ".arena";

/// Config file name inside [`ARENA_DIR`].
pub const CONFIG_FILE: &str = "arena.toml";

pub const DEFAULT_PORT: u16 = 3142;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_path() -> PathBuf {
    Path::new(ARENA_DIR).join("arena.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSection {
    #[serde(default = "default_k_factor")]
    pub k_factor: f64,
    #[serde(default = "default_initial_rating")]
    pub initial_rating: f64,
}

fn default_k_factor() -> f64 {
    DEFAULT_K_FACTOR
}

fn default_initial_rating() -> f64 {
    DEFAULT_INITIAL_RATING
}

impl Default for RatingSection {
    fn default() -> Self {
        Self {
            k_factor: default_k_factor(),
            initial_rating: default_initial_rating(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionsSection {
    /// Seconds a session may wait in `voting` before `expire` fails it.
    /// Unset keeps voting sessions forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abandon_voting_after_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersSection {
    /// Accepted provider names. Empty accepts any non-empty name.
    #[serde(default)]
    pub registered: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_review_cmd")]
    pub review_cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,
}

fn default_review_cmd() -> String {
    DEFAULT_REVIEW_CMD.to_string()
}

fn default_job_timeout_secs() -> u64 {
    DEFAULT_JOB_TIMEOUT_SECS
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            review_cmd: default_review_cmd(),
            args: Vec::new(),
            job_timeout_secs: default_job_timeout_secs(),
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub format: LogFormat,
    /// Mirror logs to daily files in this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// The complete arena.toml configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArenaToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub rating: RatingSection,
    #[serde(default)]
    pub sessions: SessionsSection,
    #[serde(default)]
    pub providers: ProvidersSection,
    #[serde(default)]
    pub executor: ExecutorSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl ArenaToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse arena.toml")
    }

    /// Load configuration from `<arena_dir>/arena.toml`.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(arena_dir: &Path) -> Result<Self> {
        let config_path = arena_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize arena.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `ARENA_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("ARENA_PORT") {
            self.server.port = port
                .parse()
                .with_context(|| format!("ARENA_PORT is not a port number: '{}'", port))?;
        }
        if let Some(path) = lookup("ARENA_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(k) = lookup("ARENA_K_FACTOR") {
            self.rating.k_factor = k
                .parse()
                .with_context(|| format!("ARENA_K_FACTOR is not a number: '{}'", k))?;
        }
        if let Some(cmd) = lookup("ARENA_REVIEW_CMD") {
            self.executor.review_cmd = cmd;
        }
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !self.rating.k_factor.is_finite() || self.rating.k_factor <= 0.0 {
            warnings.push(format!(
                "k_factor must be a positive number, got {}",
                self.rating.k_factor
            ));
        }
        if !self.rating.initial_rating.is_finite() {
            warnings.push(format!(
                "initial_rating must be finite, got {}",
                self.rating.initial_rating
            ));
        }
        if self.sessions.abandon_voting_after_secs == Some(0) {
            warnings.push(
                "abandon_voting_after_secs = 0 expires every voting session on the next sweep"
                    .to_string(),
            );
        }
        if self.providers.registered.iter().any(|p| p.trim().is_empty()) {
            warnings.push("providers.registered contains an empty name".to_string());
        }
        if self.executor.review_cmd.trim().is_empty() {
            warnings.push("executor.review_cmd is empty".to_string());
        }
        if self.executor.job_timeout_secs == 0 {
            warnings.push("executor.job_timeout_secs = 0 times out every review".to_string());
        }

        warnings
    }

    /// Service tunables derived from this configuration.
    pub fn arena_settings(&self) -> ArenaSettings {
        ArenaSettings {
            elo: EloEngine::new(self.rating.k_factor),
            initial_rating: self.rating.initial_rating,
            providers: ProviderRegistry::new(
                self.providers
                    .registered
                    .iter()
                    .map(|p| p.trim())
                    .filter(|p| !p.is_empty()),
            ),
            abandon_voting_after: self
                .sessions
                .abandon_voting_after_secs
                .map(Duration::from_secs),
        }
    }

    pub fn executor_config(&self) -> ProcessExecutorConfig {
        ProcessExecutorConfig {
            review_cmd: self.executor.review_cmd.clone(),
            args: self.executor.args.clone(),
            job_timeout: Duration::from_secs(self.executor.job_timeout_secs),
            working_dir: self.executor.working_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ArenaToml::default();
        assert_eq!(config.server.port, 3142);
        assert_eq!(config.server.db_path, PathBuf::from(".arena/arena.db"));
        assert_eq!(config.rating.k_factor, 32.0);
        assert_eq!(config.rating.initial_rating, 1500.0);
        assert_eq!(config.sessions.abandon_voting_after_secs, None);
        assert!(config.providers.registered.is_empty());
        assert_eq!(config.executor.job_timeout_secs, 900);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_parse_empty_file_gives_defaults() {
        assert_eq!(ArenaToml::parse("").unwrap(), ArenaToml::default());
    }

    #[test]
    fn test_parse_full_file() {
        let content = r#"
[server]
port = 8080
db_path = "/var/lib/arena.db"

[rating]
k_factor = 24.0

[sessions]
abandon_voting_after_secs = 3600

[providers]
registered = ["anthropic", "openai"]

[executor]
review_cmd = "my-reviewer"
args = ["--fast"]
job_timeout_secs = 60

[logging]
format = "json"
directory = "/tmp/arena-logs"
"#;
        let config = ArenaToml::parse(content).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.rating.k_factor, 24.0);
        assert_eq!(config.rating.initial_rating, 1500.0);
        assert_eq!(config.logging.format, LogFormat::Json);

        let settings = config.arena_settings();
        assert_eq!(settings.elo.k_factor, 24.0);
        assert_eq!(settings.abandon_voting_after, Some(Duration::from_secs(3600)));
        assert!(settings.providers.allows("openai"));
        assert!(!settings.providers.allows("mistral"));

        let executor = config.executor_config();
        assert_eq!(executor.review_cmd, "my-reviewer");
        assert_eq!(executor.args, vec!["--fast".to_string()]);
        assert_eq!(executor.job_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_parse_rejects_bad_types() {
        assert!(ArenaToml::parse("[server]\nport = \"eighty\"").is_err());
        assert!(ArenaToml::parse("[logging]\nformat = \"xml\"").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = ArenaToml::parse("[server]\nport = 9000").unwrap();
        config
            .apply_env_from(env(&[
                ("ARENA_PORT", "9100"),
                ("ARENA_DB_PATH", "/tmp/x.db"),
                ("ARENA_K_FACTOR", "16"),
                ("ARENA_REVIEW_CMD", "other-runner"),
            ]))
            .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.rating.k_factor, 16.0);
        assert_eq!(config.executor.review_cmd, "other-runner");
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = ArenaToml::default();
        assert!(config.apply_env_from(env(&[("ARENA_PORT", "abc")])).is_err());
        assert!(config.apply_env_from(env(&[("ARENA_K_FACTOR", "fast")])).is_err());
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let mut config = ArenaToml::default();
        config.rating.k_factor = 0.0;
        config.executor.job_timeout_secs = 0;
        config.providers.registered = vec!["openai".into(), " ".into()];
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("k_factor")));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let mut config = ArenaToml::default();
        config.sessions.abandon_voting_after_secs = Some(120);
        config.providers.registered = vec!["anthropic".into()];

        let path = dir.path().join(CONFIG_FILE);
        config.save(&path).unwrap();
        assert_eq!(ArenaToml::load_or_default(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        assert_eq!(
            ArenaToml::load_or_default(dir.path()).unwrap(),
            ArenaToml::default()
        );
    }
}
