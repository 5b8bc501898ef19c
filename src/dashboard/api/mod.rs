use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use tokio::sync::broadcast;

use super::auth::bearer_token;
use super::db::DbHandle;
use super::models::{Message, Principal};
use super::ws::{WsMessage, broadcast_message};
use crate::errors::DashboardError;

mod account;
pub mod extract;
mod feed;
mod people;
mod requests;
mod tasks;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<String>,
    pub session_ttl_hours: i64,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn broadcast(&self, msg: &WsMessage) {
        broadcast_message(&self.ws_tx, msg);
    }

    /// Fan a freshly written feed entry out to subscribers.
    pub fn announce(&self, notification: Option<Message>) {
        if let Some(message) = notification {
            self.broadcast(&WsMessage::FeedMessage { message });
        }
    }
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        let msg = err.to_string();
        match err {
            DashboardError::NotFound { .. } => ApiError::NotFound(msg),
            DashboardError::InvalidCredentials | DashboardError::Unauthorized => {
                ApiError::Unauthorized(msg)
            }
            DashboardError::Forbidden(_) => ApiError::Forbidden(msg),
            DashboardError::Conflict(_) | DashboardError::InvalidTransition { .. } => {
                ApiError::Conflict(msg)
            }
            DashboardError::Validation(_) => ApiError::BadRequest(msg),
            DashboardError::LockPoisoned => ApiError::Internal(msg),
            DashboardError::Other(inner) => ApiError::from(inner),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<DashboardError>() {
            Ok(domain) => ApiError::from(domain),
            Err(other) => {
                tracing::error!(error = format!("{:#}", other), "request failed");
                ApiError::Internal(other.to_string())
            }
        }
    }
}

// ── Authentication ────────────────────────────────────────────────────

/// The account behind the request's bearer token.
pub struct AuthUser {
    pub principal: Principal,
    pub token: String,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .map(str::to_string)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let lookup = token.clone();
        let principal = state
            .db
            .call(move |db| db.session_principal(&lookup))
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Session expired or invalid".to_string()))?;
        Ok(AuthUser { principal, token })
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/login", post(account::login))
        .route("/api/auth/logout", post(account::logout))
        .route("/api/auth/me", get(account::me))
        .route("/api/profile", patch(account::update_profile))
        .route(
            "/api/employees",
            get(people::list_employees).post(people::create_employee),
        )
        .route("/api/employees/{id}", get(people::get_employee))
        .route("/api/employees/{id}/tasks", get(people::employee_tasks))
        .route("/api/employees/{id}/dashboard", get(people::employee_dashboard))
        .route(
            "/api/clients",
            get(people::list_clients).post(people::create_client),
        )
        .route("/api/clients/{id}", get(people::client_overview))
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/api/tasks/{id}",
            get(tasks::get_task).delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/status", patch(tasks::update_status))
        .route("/api/tasks/{id}/assignees", put(tasks::transfer_task))
        .route("/api/tasks/{id}/rating", post(tasks::rate_task))
        .route("/api/tasks/{id}/comments", post(tasks::add_comment))
        .route(
            "/api/task-requests",
            get(requests::list_task_requests).post(requests::create_task_request),
        )
        .route(
            "/api/task-requests/{id}/approve",
            post(requests::approve_task_request),
        )
        .route(
            "/api/task-requests/{id}/reject",
            post(requests::reject_task_request),
        )
        .route(
            "/api/resource-requests",
            get(requests::list_resource_requests).post(requests::create_resource_request),
        )
        .route(
            "/api/resource-requests/{id}",
            patch(requests::update_resource_request),
        )
        .route("/api/reports", get(feed::list_reports).post(feed::submit_report))
        .route("/api/feed", get(feed::get_feed).post(feed::post_chat))
        .route("/api/stats/dashboard", get(feed::manager_dashboard))
        .route("/api/stats/performance", get(feed::performance_report))
        .route("/health", get(health_check))
}

async fn health_check() -> &'static str {
    "ok"
}

// ── Test support ──────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
    //! Router, seed data and request helpers for handler tests.

    use super::*;
    use crate::dashboard::db::DashboardDb;
    use crate::dashboard::models::MANAGER_TITLE;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub struct TestApp {
        pub app: Router,
        pub state: SharedState,
    }

    /// Seeds a manager (morgan), two employees (ana, ben) and a client (acme),
    /// all with password "pw".
    pub fn test_app() -> TestApp {
        let db = DashboardDb::new_in_memory().unwrap();
        db.create_employee("Morgan", MANAGER_TITLE, "morgan", "pw").unwrap();
        db.create_employee("Ana", "Designer", "ana", "pw").unwrap();
        db.create_employee("Ben", "Copywriter", "ben", "pw").unwrap();
        db.create_client("Acme", "ops@acme.test", "acme", "pw").unwrap();
        let (ws_tx, _) = broadcast::channel(64);
        let state = Arc::new(AppState {
            db: DbHandle::new(db),
            ws_tx,
            session_ttl_hours: 12,
        });
        TestApp {
            app: api_router().with_state(state.clone()),
            state,
        }
    }

    pub async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    impl TestApp {
        pub async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<serde_json::Value>,
        ) -> (StatusCode, serde_json::Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("authorization", format!("Bearer {}", token));
            }
            let request = match body {
                Some(json) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            let response = self.app.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let json = if bytes.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
            };
            (status, json)
        }

        pub async fn login(&self, username: &str) -> String {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/auth/login",
                    None,
                    Some(serde_json::json!({"username": username, "password": "pw"})),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "login failed for {}", username);
            body["token"].as_str().unwrap().to_string()
        }

        /// Create a task for Acme as the manager and return its id.
        pub async fn create_task(&self, manager: &str, title: &str, assignees: &[i64]) -> i64 {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/tasks",
                    Some(manager),
                    Some(serde_json::json!({
                        "title": title,
                        "description": format!("{} brief", title),
                        "assignees": assignees,
                        "client_id": 1,
                        "due_date": "2024-06-01",
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED, "create task failed: {}", body);
            body["id"].as_i64().unwrap()
        }
    }
}
