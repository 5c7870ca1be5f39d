//! Schema canonicalization and content-addressed identity.
//!
//! The identity of a schema is the SHA-256 of its canonical JSON form:
//! object keys sorted ascending at every level, no insignificant whitespace.
//! Two schemas with the same role→agent entries therefore hash identically
//! regardless of how they were built, and changing any provider, model or
//! role name changes the hash.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::config::SchemaConfig;

/// Length of a rendered identity (hex SHA-256).
pub const IDENTITY_HEX_LEN: usize = 64;

/// Content hash of a [`SchemaConfig`]; primary key of the rating table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaIdentity(String);

impl SchemaIdentity {
    /// Compute the identity of a schema. Pure and total.
    pub fn of(config: &SchemaConfig) -> Self {
        let canonical = canonical_json(config);
        let digest = Sha256::digest(canonical.as_bytes());
        Self(format!("{:x}", digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines and tables.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SchemaIdentity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let is_hex = s
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if s.len() != IDENTITY_HEX_LEN || !is_hex {
            return Err(format!("Invalid schema hash: {}", s));
        }
        Ok(Self(s.to_string()))
    }
}

/// Canonical JSON text of a schema: compact, with keys sorted at every
/// level (`serde_json::Map` is a `BTreeMap`), so `model` precedes `provider`.
pub fn canonical_json(config: &SchemaConfig) -> String {
    let roles: Map<String, Value> = config
        .iter()
        .map(|(role, agent)| {
            let mut fields = Map::new();
            fields.insert("provider".to_string(), Value::String(agent.provider.clone()));
            fields.insert("model".to_string(), Value::String(agent.model.clone()));
            (role.to_string(), Value::Object(fields))
        })
        .collect();
    Value::Object(roles).to_string()
}
