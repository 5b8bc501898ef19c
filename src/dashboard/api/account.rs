use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

use super::extract::ApiJson;
use super::{ApiError, AuthUser, SharedState};
use crate::dashboard::db::ProfileUpdate;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ProfileRequest {
    pub contact_number: Option<String>,
    pub dob: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ttl = state.session_ttl_hours;
    let username = req.username.clone();
    let result = state
        .db
        .call(move |db| db.login(&req.username, &req.password, ttl))
        .await;
    match result {
        Ok(session) => {
            tracing::info!(user = session.user.name(), role = %session.role, "login");
            Ok(Json(session))
        }
        Err(e) => {
            tracing::warn!(username = username.as_str(), "login failed");
            Err(e.into())
        }
    }
}

pub async fn logout(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let token = user.token;
    state.db.call(move |db| db.delete_session(&token)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(user: AuthUser) -> impl IntoResponse {
    Json(serde_json::json!({
        "role": user.principal.role(),
        "user": user.principal,
    }))
}

pub async fn update_profile(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<ProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let update = ProfileUpdate {
        contact_number: req.contact_number,
        dob: req.dob,
        password: req.password,
    };
    let principal = user.principal;
    let updated = state
        .db
        .call(move |db| db.update_profile(&principal, &update))
        .await?;
    Ok(Json(updated))
}
