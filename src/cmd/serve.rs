//! HTTP server (`review-arena serve`).

use anyhow::Result;

use review_arena::arena::server;
use review_arena::arena_config::ArenaToml;

pub async fn cmd_serve(config: &ArenaToml, dev: bool) -> Result<()> {
    for warning in config.validate() {
        tracing::warn!(%warning, "Suspicious configuration");
    }
    server::start_server(config, dev).await
}
