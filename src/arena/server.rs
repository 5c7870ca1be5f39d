use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::api::{self, AppState};
use super::db::{ArenaDb, DbHandle};
use super::executor::ProcessReviewExecutor;
use super::service::ArenaService;
use crate::arena_config::ArenaToml;

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router().with_state(state)
}

/// Open the store, wire the process executor into the service and start the
/// completion listener.
pub fn build_service(config: &ArenaToml) -> Result<Arc<ArenaService>> {
    let db = ArenaDb::new(&config.server.db_path).with_context(|| {
        format!(
            "Failed to initialize arena database at {}",
            config.server.db_path.display()
        )
    })?;
    let (executor, completions) = ProcessReviewExecutor::new(config.executor_config());
    let service = Arc::new(ArenaService::new(
        DbHandle::new(db),
        Arc::new(executor),
        config.arena_settings(),
    ));
    service.clone().spawn_completion_listener(completions);
    Ok(service)
}

/// Start the arena server and run until Ctrl+C.
pub async fn start_server(config: &ArenaToml, permissive_cors: bool) -> Result<()> {
    let service = build_service(config)?;
    let state = Arc::new(AppState { service });

    let mut app = build_router(state);
    if permissive_cors {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, db = %config.server.db_path.display(), "Review arena listening");
    println!("Review arena running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_config(dir: &std::path::Path) -> ArenaToml {
        let mut config = ArenaToml::default();
        config.server.db_path = dir.join("nested").join("arena.db");
        config
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&test_config(dir.path())).unwrap();
        let app = build_router(Arc::new(AppState { service }));

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_build_service_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let _service = build_service(&config).unwrap();
        assert!(config.server.db_path.exists());
    }

    #[tokio::test]
    async fn test_rankings_route_mounted() {
        let dir = tempfile::tempdir().unwrap();
        let service = build_service(&test_config(dir.path())).unwrap();
        let app = build_router(Arc::new(AppState { service }));

        let req = Request::builder()
            .uri("/api/arena/rankings")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"[]");
    }
}
