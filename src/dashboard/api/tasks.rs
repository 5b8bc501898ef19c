use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::{ApiError, AuthUser, SharedState};
use crate::dashboard::access;
use crate::dashboard::models::{NewTask, Principal, TaskStatus};
use crate::dashboard::ws::WsMessage;
use crate::errors::DashboardError;

#[derive(Deserialize)]
pub struct TaskListQuery {
    pub status: Option<TaskStatus>,
}

#[derive(Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    pub assignees: Vec<i64>,
    pub client_id: i64,
    pub due_date: String,
    pub status: Option<TaskStatus>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: TaskStatus,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub assignees: Vec<i64>,
}

#[derive(Deserialize)]
pub struct RateRequest {
    pub rating: i64,
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

/// Managers see every task, employees their assignments, clients their
/// own account's work.
pub async fn list_tasks(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = user.principal;
    let status = query.status;
    let tasks = state
        .db
        .call(move |db| {
            if access::is_manager(&principal) {
                return db.list_tasks(status);
            }
            let tasks = match &principal {
                Principal::Employee(e) => db.list_tasks_for_employee(e.id)?,
                Principal::Client(c) => db.list_tasks_for_client(c.id)?,
            };
            Ok(tasks
                .into_iter()
                .filter(|t| status.is_none_or(|s| t.status == s))
                .collect::<Vec<_>>())
        })
        .await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let manager = access::require_manager(&user.principal)?.clone();
    let new = NewTask {
        title: req.title,
        description: req.description,
        assignees: req.assignees,
        client_id: req.client_id,
        due_date: req.due_date,
        status: req.status.unwrap_or(TaskStatus::Pending),
    };
    let outcome = state
        .db
        .call(move |db| db.create_task(&manager, &new))
        .await?;

    tracing::info!(
        task_id = outcome.task.id,
        title = outcome.task.title.as_str(),
        assignees = outcome.task.assignee_names().as_str(),
        "task created"
    );
    state.broadcast(&WsMessage::TaskCreated {
        task: outcome.task.clone(),
    });
    state.announce(outcome.notification);
    Ok((StatusCode::CREATED, Json(outcome.task)))
}

pub async fn get_task(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = user.principal;
    let detail = state
        .db
        .call(move |db| {
            let detail = db
                .get_task_detail(id)?
                .ok_or(DashboardError::not_found("Task", id))?;
            access::ensure_task_visible(&principal, &detail.task)?;
            Ok(detail)
        })
        .await?;
    Ok(Json(detail))
}

pub async fn delete_task(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, ApiError> {
    access::require_manager(&user.principal)?;
    let deleted = state.db.call(move |db| db.delete_task(id)).await?;
    if !deleted {
        return Err(DashboardError::not_found("Task", id).into());
    }
    tracing::info!(task_id = id, "task deleted");
    state.broadcast(&WsMessage::TaskDeleted { task_id: id });
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_status(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = user.principal;
    let actor = access::require_staff(&principal)?.clone();
    let outcome = state
        .db
        .call(move |db| {
            let task = db.require_task(id)?;
            if !access::can_update_status(&principal, &task) {
                return Err(DashboardError::forbidden(format!(
                    "only the manager or an assignee may update task {}",
                    id
                ))
                .into());
            }
            db.update_task_status(id, req.status, &actor)
        })
        .await?;

    if outcome.notification.is_some() {
        tracing::info!(task_id = id, status = %outcome.task.status, "task status changed");
        state.broadcast(&WsMessage::TaskUpdated {
            task: outcome.task.clone(),
        });
        state.announce(outcome.notification);
    }
    Ok(Json(outcome.task))
}

pub async fn transfer_task(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<TransferRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let manager = access::require_manager(&user.principal)?.clone();
    let outcome = state
        .db
        .call(move |db| db.transfer_task(id, &req.assignees, &manager))
        .await?;
    tracing::info!(
        task_id = id,
        assignees = outcome.task.assignee_names().as_str(),
        "task transferred"
    );
    state.broadcast(&WsMessage::TaskUpdated {
        task: outcome.task.clone(),
    });
    state.announce(outcome.notification);
    Ok(Json(outcome.task))
}

pub async fn rate_task(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<RateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let manager = access::require_manager(&user.principal)?.clone();
    let outcome = state
        .db
        .call(move |db| db.rate_task(id, req.rating, &manager))
        .await?;
    tracing::info!(task_id = id, rating = outcome.task.rating, "task rated");
    state.broadcast(&WsMessage::TaskUpdated {
        task: outcome.task.clone(),
    });
    state.announce(outcome.notification);
    Ok(Json(outcome.task))
}

pub async fn add_comment(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let principal = user.principal;
    let comment = state
        .db
        .call(move |db| {
            let task = db.require_task(id)?;
            access::ensure_task_visible(&principal, &task)?;
            db.add_comment(id, principal.name(), principal.role(), &req.content)
        })
        .await?;
    state.broadcast(&WsMessage::CommentAdded {
        comment: comment.clone(),
    });
    Ok((StatusCode::CREATED, Json(comment)))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_task_broadcasts_task_and_notification() {
        let t = test_app();
        let mut rx = t.state.ws_tx.subscribe();
        let manager = t.login("morgan").await;
        let (status, body) = t
            .send(
                "POST",
                "/api/tasks",
                Some(&manager),
                Some(json!({
                    "title": "Logo refresh",
                    "description": "New mark",
                    "assignees": [2, 3],
                    "client_id": 1,
                    "due_date": "2024-06-01",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "Pending");
        assert_eq!(body["rating"], 0);
        assert_eq!(body["created_by"], 1);
        assert_eq!(body["assignees"][1]["name"], "Ben");

        let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(first["type"], "TaskCreated");
        let second: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(second["type"], "FeedMessage");
        assert_eq!(
            second["data"]["message"]["content"],
            "created a new task \"Logo refresh\" and assigned it to Ana, Ben."
        );
    }

    #[tokio::test]
    async fn test_create_task_rejects_non_managers_and_bad_input() {
        let t = test_app();
        let ana = t.login("ana").await;
        let payload = json!({
            "title": "Sneaky", "description": "x", "assignees": [2], "client_id": 1, "due_date": "2024-06-01"
        });
        let (status, _) = t.send("POST", "/api/tasks", Some(&ana), Some(payload)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let manager = t.login("morgan").await;
        let payload = json!({
            "title": "Nobody", "description": "x", "assignees": [], "client_id": 1, "due_date": "2024-06-01"
        });
        let (status, body) = t.send("POST", "/api/tasks", Some(&manager), Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "At least one assignee is required.");
    }

    #[tokio::test]
    async fn test_task_visibility_by_role() {
        let t = test_app();
        let manager = t.login("morgan").await;
        let task_id = t.create_task(&manager, "Logo", &[2]).await;
        t.create_task(&manager, "Deck", &[3]).await;

        let ana = t.login("ana").await;
        let (_, list) = t.send("GET", "/api/tasks", Some(&ana), None).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        let (status, _) = t.send("GET", &format!("/api/tasks/{}", task_id), Some(&ana), None).await;
        assert_eq!(status, StatusCode::OK);

        let ben = t.login("ben").await;
        let (status, _) = t.send("GET", &format!("/api/tasks/{}", task_id), Some(&ben), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let acme = t.login("acme").await;
        let (_, list) = t.send("GET", "/api/tasks", Some(&acme), None).await;
        assert_eq!(list.as_array().unwrap().len(), 2);

        let (_, list) = t.send("GET", "/api/tasks?status=Blocked", Some(&manager), None).await;
        assert!(list.as_array().unwrap().is_empty());
        let (status, _) = t.send("GET", "/api/tasks/404", Some(&manager), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_update_by_assignee_only() {
        let t = test_app();
        let manager = t.login("morgan").await;
        let task_id = t.create_task(&manager, "Logo", &[2]).await;
        let uri = format!("/api/tasks/{}/status", task_id);

        let ben = t.login("ben").await;
        let (status, _) = t.send("PATCH", &uri, Some(&ben), Some(json!({"status": "Completed"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let acme = t.login("acme").await;
        let (status, _) = t.send("PATCH", &uri, Some(&acme), Some(json!({"status": "Completed"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let ana = t.login("ana").await;
        let (status, body) = t
            .send("PATCH", &uri, Some(&ana), Some(json!({"status": "In Progress"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "In Progress");

        let (_, feed) = t.send("GET", "/api/feed", Some(&ana), None).await;
        let messages = feed["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["author_id"], 2);
    }

    #[tokio::test]
    async fn test_rate_transfer_and_delete() {
        let t = test_app();
        let manager = t.login("morgan").await;
        let task_id = t.create_task(&manager, "Logo", &[2]).await;

        let (status, _) = t
            .send("POST", &format!("/api/tasks/{}/rating", task_id), Some(&manager), Some(json!({"rating": 5})))
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = t
            .send("PUT", &format!("/api/tasks/{}/assignees", task_id), Some(&manager), Some(json!({"assignees": [3]})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["assignees"][0]["name"], "Ben");

        t.send("PATCH", &format!("/api/tasks/{}/status", task_id), Some(&manager), Some(json!({"status": "Completed"})))
            .await;
        let (status, body) = t
            .send("POST", &format!("/api/tasks/{}/rating", task_id), Some(&manager), Some(json!({"rating": 5})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rating"], 5);
        let (_, ben) = t.send("GET", "/api/employees/3", Some(&manager), None).await;
        assert_eq!(ben["points"], 5);

        let (status, _) = t.send("DELETE", &format!("/api/tasks/{}", task_id), Some(&manager), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = t.send("DELETE", &format!("/api/tasks/{}", task_id), Some(&manager), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_client_comments_on_own_task() {
        let t = test_app();
        let manager = t.login("morgan").await;
        let task_id = t.create_task(&manager, "Logo", &[2]).await;
        let acme = t.login("acme").await;
        let uri = format!("/api/tasks/{}/comments", task_id);

        let (status, body) = t.send("POST", &uri, Some(&acme), Some(json!({"content": "Love it"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["author_name"], "Acme");
        assert_eq!(body["author_role"], "Client");

        let (status, _) = t.send("POST", &uri, Some(&acme), Some(json!({"content": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, detail) = t.send("GET", &format!("/api/tasks/{}", task_id), Some(&manager), None).await;
        assert_eq!(detail["comments"].as_array().unwrap().len(), 1);
    }
}
