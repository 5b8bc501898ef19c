use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::api::{self, AppState};
use super::db::{DashboardDb, DbHandle};
use super::ws;
use crate::config::{BootstrapSection, DashboardToml};

/// Configuration for the dashboard server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub dev_mode: bool,
    pub session_ttl_hours: i64,
    pub bootstrap: BootstrapSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_toml(&DashboardToml::default())
    }
}

impl ServerConfig {
    pub fn from_toml(toml: &DashboardToml) -> Self {
        Self {
            host: toml.server.host.clone(),
            port: toml.server.port,
            db_path: toml.server.db_path.clone(),
            dev_mode: toml.server.dev_mode,
            session_ttl_hours: toml.auth.session_ttl_hours,
            bootstrap: toml.bootstrap.clone(),
        }
    }
}

/// Open the database file, creating its directory, and make sure a manager
/// account exists.
pub fn open_database(db_path: &Path, bootstrap: &BootstrapSection) -> Result<DashboardDb> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let db = DashboardDb::new(db_path).context("Failed to initialize dashboard database")?;
    if let Some(manager) = db.ensure_manager(
        &bootstrap.manager_name,
        &bootstrap.manager_username,
        &bootstrap.manager_password,
    )? {
        tracing::info!(
            username = manager.username.as_str(),
            "created bootstrap manager account"
        );
    }
    let purged = db.purge_expired_sessions()?;
    if purged > 0 {
        tracing::debug!(purged, "removed expired sessions");
    }
    Ok(db)
}

/// Build the full application router: REST API, WebSocket and JSON 404s.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": format!("No route for {}", uri.path())})),
    )
}

/// Start the dashboard server.
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let db = open_database(&config.db_path, &config.bootstrap)?;
    let (ws_tx, _rx) = broadcast::channel::<String>(256);

    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        ws_tx,
        session_ttl_hours: config.session_ttl_hours,
    });

    let mut app = build_router(state);
    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode {
        "0.0.0.0"
    } else {
        config.host.as_str()
    };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        db = %config.db_path.display(),
        dev_mode = config.dev_mode,
        "Brands in House dashboard listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn bootstrap() -> BootstrapSection {
        BootstrapSection {
            manager_name: "Morgan".into(),
            manager_username: "morgan".into(),
            manager_password: "pw".into(),
        }
    }

    fn test_router() -> Router {
        let db = DashboardDb::new_in_memory().unwrap();
        db.ensure_manager("Morgan", "morgan", "pw").unwrap();
        let (ws_tx, _) = broadcast::channel(16);
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            ws_tx,
            session_ttl_hours: 12,
        });
        build_router(state)
    }

    #[tokio::test]
    async fn test_health_via_full_router() {
        let app = test_router();
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let app = test_router();
        let req = Request::builder()
            .uri("/api/nope")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "No route for /api/nope");
    }

    #[tokio::test]
    async fn test_login_via_full_router() {
        let app = test_router();
        let req = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::json!({"username": "morgan", "password": "pw"}).to_string(),
            ))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let session: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(session["role"], "Manager");
    }

    #[test]
    fn test_open_database_bootstraps_manager_once() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("dashboard.db");
        {
            let db = open_database(&path, &bootstrap())?;
            assert_eq!(db.list_employees()?.len(), 1);
        }
        let db = open_database(&path, &bootstrap())?;
        assert_eq!(db.list_employees()?.len(), 1);
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3142);
        assert_eq!(config.db_path, PathBuf::from(".brandhouse/dashboard.db"));
        assert_eq!(config.session_ttl_hours, 12);
        assert!(!config.dev_mode);
    }
}
