//! Review schemas: what is being ranked.
//!
//! - [`config`]: `SchemaConfig` (role → provider/model) and its validation
//! - [`identity`]: canonical serialization and the content hash used as the
//!   rating table's primary key

pub mod config;
pub mod identity;

pub use config::{AgentConfig, ProviderRegistry, SchemaConfig};
pub use identity::{SchemaIdentity, canonical_json};
