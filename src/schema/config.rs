//! Schema configuration types.
//!
//! A schema maps review roles to the provider/model pair that performs each
//! role. The role set is open: any non-empty role name is accepted, and two
//! schemas in the same arena session may use different roles.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The provider/model pair assigned to one review role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentConfig {
    pub provider: String,
    pub model: String,
}

impl AgentConfig {
    pub fn new(provider: &str, model: &str) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
        }
    }
}

/// Mapping from role name to [`AgentConfig`].
///
/// Backed by a `BTreeMap`, so iteration is always in ascending role order no
/// matter how the map was built.
///
/// ```
/// use review_arena::schema::{AgentConfig, SchemaConfig};
///
/// let schema = SchemaConfig::new()
///     .with_role("security", AgentConfig::new("anthropic", "claude-sonnet"))
///     .with_role("general", AgentConfig::new("openai", "gpt-4o"));
///
/// assert_eq!(schema.roles().collect::<Vec<_>>(), vec!["general", "security"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaConfig {
    roles: BTreeMap<String, AgentConfig>,
}

impl SchemaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the agent for a role.
    pub fn with_role(mut self, role: &str, agent: AgentConfig) -> Self {
        self.roles.insert(role.to_string(), agent);
        self
    }

    pub fn insert(&mut self, role: &str, agent: AgentConfig) -> Option<AgentConfig> {
        self.roles.insert(role.to_string(), agent)
    }

    pub fn get(&self, role: &str) -> Option<&AgentConfig> {
        self.roles.get(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AgentConfig)> {
        self.roles.iter().map(|(role, agent)| (role.as_str(), agent))
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Whether any role in this schema runs on `provider`.
    pub fn uses_provider(&self, provider: &str) -> bool {
        self.roles.values().any(|agent| agent.provider == provider)
    }

    /// Check the schema against the registered providers.
    ///
    /// Returns every problem found; an empty vector means the schema is valid.
    /// Nothing is defaulted: a role with a blank model is an error, never a
    /// silent fallback to some other configuration.
    pub fn validate(&self, providers: &ProviderRegistry) -> Vec<String> {
        let mut problems = Vec::new();

        if self.roles.is_empty() {
            problems.push("schema must define at least one role".to_string());
            return problems;
        }

        for (role, agent) in &self.roles {
            if role.trim().is_empty() {
                problems.push("role names must not be empty".to_string());
            }
            if agent.provider.trim().is_empty() {
                problems.push(format!("role '{}' has an empty provider", role));
            } else if !providers.allows(&agent.provider) {
                problems.push(format!(
                    "role '{}' uses unregistered provider '{}'",
                    role, agent.provider
                ));
            }
            if agent.model.trim().is_empty() {
                problems.push(format!("role '{}' has an empty model", role));
            }
        }

        problems
    }
}

impl FromIterator<(String, AgentConfig)> for SchemaConfig {
    fn from_iter<I: IntoIterator<Item = (String, AgentConfig)>>(iter: I) -> Self {
        Self {
            roles: iter.into_iter().collect(),
        }
    }
}

/// The set of providers callers may reference.
///
/// An empty registry is open: any non-empty provider name is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderRegistry {
    providers: BTreeSet<String>,
}

impl ProviderRegistry {
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: providers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn allows(&self, provider: &str) -> bool {
        self.is_open() || self.providers.contains(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::new(["anthropic", "openai"])
    }

    #[test]
    fn test_valid_schema_has_no_problems() {
        let schema = SchemaConfig::new()
            .with_role("general", AgentConfig::new("anthropic", "claude-sonnet"))
            .with_role("security", AgentConfig::new("openai", "gpt-4o"));
        assert!(schema.validate(&registry()).is_empty());
    }

    #[test]
    fn test_empty_schema_is_rejected() {
        let problems = SchemaConfig::new().validate(&registry());
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("at least one role"));
    }

    #[test]
    fn test_empty_model_is_rejected() {
        let schema =
            SchemaConfig::new().with_role("security", AgentConfig::new("anthropic", ""));
        let problems = schema.validate(&registry());
        assert_eq!(problems, vec!["role 'security' has an empty model".to_string()]);
    }

    #[test]
    fn test_whitespace_model_counts_as_empty() {
        let schema =
            SchemaConfig::new().with_role("general", AgentConfig::new("anthropic", "   "));
        assert!(!schema.validate(&registry()).is_empty());
    }

    #[test]
    fn test_unregistered_provider_is_rejected() {
        let schema =
            SchemaConfig::new().with_role("general", AgentConfig::new("mystery", "m-1"));
        let problems = schema.validate(&registry());
        assert!(problems[0].contains("unregistered provider 'mystery'"));
    }

    #[test]
    fn test_open_registry_accepts_any_named_provider() {
        let schema =
            SchemaConfig::new().with_role("general", AgentConfig::new("mystery", "m-1"));
        assert!(schema.validate(&ProviderRegistry::open()).is_empty());

        let blank = SchemaConfig::new().with_role("general", AgentConfig::new("", "m-1"));
        assert!(!blank.validate(&ProviderRegistry::open()).is_empty());
    }

    #[test]
    fn test_blank_role_name_is_rejected() {
        let schema = SchemaConfig::new().with_role(" ", AgentConfig::new("openai", "gpt-4o"));
        let problems = schema.validate(&registry());
        assert!(problems.iter().any(|p| p.contains("role names")));
    }

    #[test]
    fn test_all_problems_are_reported() {
        let schema = SchemaConfig::new()
            .with_role("general", AgentConfig::new("", ""))
            .with_role("security", AgentConfig::new("openai", ""));
        assert_eq!(schema.validate(&registry()).len(), 3);
    }

    #[test]
    fn test_schema_deserializes_from_plain_json_object() {
        let json = r#"{"security": {"provider": "openai", "model": "gpt-4o"},
                       "general": {"provider": "anthropic", "model": "claude-sonnet"}}"#;
        let schema: SchemaConfig = serde_json::from_str(json).unwrap();
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("security").unwrap().model, "gpt-4o");
        assert!(schema.uses_provider("anthropic"));
        assert!(!schema.uses_provider("google"));
    }

    #[test]
    fn test_schema_rejects_agent_missing_model_field() {
        let json = r#"{"security": {"provider": "openai"}}"#;
        assert!(serde_json::from_str::<SchemaConfig>(json).is_err());
    }
}
