use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::extract::{ApiJson, ApiPath};
use super::{ApiError, AuthUser, SharedState};
use crate::dashboard::access;
use crate::dashboard::models::{ClientOverview, EmployeeDetail};
use crate::dashboard::stats;
use crate::dashboard::validate::today;

#[derive(Deserialize)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub role: String,
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub contact_email: String,
    pub username: String,
    pub password: String,
}

// ── Employees ─────────────────────────────────────────────────────────

pub async fn list_employees(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    access::require_staff(&user.principal)?;
    let employees = state.db.call(|db| db.list_employees()).await?;
    Ok(Json(employees))
}

pub async fn create_employee(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateEmployeeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    access::require_manager(&user.principal)?;
    let employee = state
        .db
        .call(move |db| db.create_employee(&req.name, &req.role, &req.username, &req.password))
        .await?;
    tracing::info!(employee_id = employee.id, name = employee.name.as_str(), "employee added");
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn get_employee(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    access::ensure_employee_or_manager(&user.principal, id)?;
    let detail = state
        .db
        .call(move |db| {
            let employee = db.require_employee(id)?;
            let tasks = db.list_tasks_for_employee(id)?;
            Ok(EmployeeDetail { employee, tasks })
        })
        .await?;
    Ok(Json(detail))
}

pub async fn employee_tasks(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    access::ensure_employee_or_manager(&user.principal, id)?;
    let tasks = state
        .db
        .call(move |db| db.list_tasks_for_employee(id))
        .await?;
    Ok(Json(tasks))
}

pub async fn employee_dashboard(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    access::ensure_employee_or_manager(&user.principal, id)?;
    let tasks = state
        .db
        .call(move |db| db.list_tasks_for_employee(id))
        .await?;
    Ok(Json(stats::employee_dashboard(id, &tasks, &today())))
}

// ── Clients ───────────────────────────────────────────────────────────

pub async fn list_clients(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    access::require_manager(&user.principal)?;
    let clients = state.db.call(|db| db.list_clients()).await?;
    Ok(Json(clients))
}

pub async fn create_client(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateClientRequest>,
) -> Result<impl IntoResponse, ApiError> {
    access::require_manager(&user.principal)?;
    let client = state
        .db
        .call(move |db| {
            db.create_client(&req.name, &req.contact_email, &req.username, &req.password)
        })
        .await?;
    tracing::info!(client_id = client.id, name = client.name.as_str(), "client added");
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn client_overview(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    access::ensure_client_or_manager(&user.principal, id)?;
    let overview = state
        .db
        .call(move |db| {
            Ok(ClientOverview {
                client: db.require_client(id)?,
                tasks: db.list_tasks_for_client(id)?,
                requests: db.list_requests_for_client(id)?,
            })
        })
        .await?;
    Ok(Json(overview))
}
