use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use super::extract::{ApiJson, ApiPath};
use super::{ApiError, AuthUser, SharedState};
use crate::dashboard::access;
use crate::dashboard::models::{Principal, ResourceRequestStatus, Task, TaskRequest};
use crate::dashboard::ws::WsMessage;

#[derive(Deserialize)]
pub struct CreateTaskRequestBody {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct ApproveRequestBody {
    pub assignees: Vec<i64>,
    pub due_date: Option<String>,
}

#[derive(Serialize)]
pub struct ApprovalResponse {
    pub request: TaskRequest,
    pub task: Task,
}

#[derive(Deserialize)]
pub struct CreateResourceRequestBody {
    pub item_name: String,
    pub reason: String,
}

#[derive(Deserialize)]
pub struct UpdateResourceRequestBody {
    pub status: ResourceRequestStatus,
    pub assignee_id: Option<i64>,
    pub due_date: Option<String>,
}

// ── Task requests ─────────────────────────────────────────────────────

/// Pending requests for the manager, the caller's own for a client.
pub async fn list_task_requests(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let requests = match &user.principal {
        Principal::Client(c) => {
            let client_id = c.id;
            state
                .db
                .call(move |db| db.list_requests_for_client(client_id))
                .await?
        }
        principal => {
            access::require_manager(principal)?;
            state.db.call(|db| db.list_pending_requests()).await?
        }
    };
    Ok(Json(requests))
}

pub async fn create_task_request(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateTaskRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let client_id = access::require_client(&user.principal)?.id;
    let request = state
        .db
        .call(move |db| {
            db.create_task_request(client_id, &req.title, req.description.as_deref().unwrap_or(""))
        })
        .await?;
    tracing::info!(request_id = request.id, client_id, "task request submitted");
    state.broadcast(&WsMessage::TaskRequestUpdated {
        request: request.clone(),
    });
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn approve_task_request(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ApproveRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let manager = access::require_manager(&user.principal)?.clone();
    let outcome = state
        .db
        .call(move |db| db.approve_request(id, &req.assignees, req.due_date.as_deref(), &manager))
        .await?;

    tracing::info!(
        request_id = id,
        task_id = outcome.task.id,
        assignees = outcome.task.assignee_names().as_str(),
        "task request approved"
    );
    state.broadcast(&WsMessage::TaskRequestUpdated {
        request: outcome.request.clone(),
    });
    state.broadcast(&WsMessage::TaskCreated {
        task: outcome.task.clone(),
    });
    state.announce(Some(outcome.notification));
    Ok(Json(ApprovalResponse {
        request: outcome.request,
        task: outcome.task,
    }))
}

pub async fn reject_task_request(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    access::require_manager(&user.principal)?;
    let request = state.db.call(move |db| db.reject_request(id)).await?;
    tracing::info!(request_id = id, "task request rejected");
    state.broadcast(&WsMessage::TaskRequestUpdated {
        request: request.clone(),
    });
    Ok(Json(request))
}

// ── Resource requests ─────────────────────────────────────────────────

/// Every request for the manager, the caller's own for an employee.
pub async fn list_resource_requests(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let employee = access::require_staff(&user.principal)?;
    let requests = if access::is_manager(&user.principal) {
        state.db.call(|db| db.list_resource_requests()).await?
    } else {
        let employee_id = employee.id;
        state
            .db
            .call(move |db| db.list_resource_requests_for_employee(employee_id))
            .await?
    };
    Ok(Json(requests))
}

pub async fn create_resource_request(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateResourceRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let requester = access::require_staff(&user.principal)?.clone();
    let request = state
        .db
        .call(move |db| db.create_resource_request(&requester, &req.item_name, &req.reason))
        .await?;
    tracing::info!(request_id = request.id, item = request.item_name.as_str(), "resource requested");
    state.broadcast(&WsMessage::ResourceRequestUpdated {
        request: request.clone(),
    });
    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn update_resource_request(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateResourceRequestBody>,
) -> Result<impl IntoResponse, ApiError> {
    let manager = access::require_manager(&user.principal)?.clone();
    let outcome = state
        .db
        .call(move |db| {
            db.update_resource_request(
                id,
                req.status,
                req.assignee_id,
                req.due_date.as_deref(),
                &manager,
            )
        })
        .await?;
    tracing::info!(request_id = id, status = outcome.request.status.as_str(), "resource request updated");
    state.broadcast(&WsMessage::ResourceRequestUpdated {
        request: outcome.request.clone(),
    });
    state.announce(outcome.notification);
    Ok(Json(outcome.request))
}
