use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use super::extract::{ApiJson, ApiQuery};
use super::{ApiError, AuthUser, SharedState};
use crate::dashboard::access;
use crate::dashboard::models::ResourceRequestStatus;
use crate::dashboard::stats;
use crate::dashboard::validate::{parse_date, today};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ReportRequest {
    pub content: String,
    pub date: Option<String>,
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub employee_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct DashboardQuery {
    pub today: Option<String>,
}

// ── Team hub ──────────────────────────────────────────────────────────

pub async fn get_feed(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    access::require_staff(&user.principal)?;
    let feed = state.db.call(|db| db.feed()).await?;
    Ok(Json(feed))
}

pub async fn post_chat(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let author = access::require_staff(&user.principal)?.clone();
    let message = state
        .db
        .call(move |db| db.post_chat(&author, &req.content))
        .await?;
    state.announce(Some(message.clone()));
    Ok((StatusCode::CREATED, Json(message)))
}

// ── Reports ───────────────────────────────────────────────────────────

/// The manager may list everyone's reports (optionally one employee's);
/// employees only see their own.
pub async fn list_reports(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ReportQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let employee = access::require_staff(&user.principal)?;
    let filter = if access::is_manager(&user.principal) {
        query.employee_id
    } else {
        if let Some(other) = query.employee_id {
            access::ensure_employee_or_manager(&user.principal, other)?;
        }
        Some(employee.id)
    };
    let reports = state.db.call(move |db| db.list_reports(filter)).await?;
    Ok(Json(reports))
}

pub async fn submit_report(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<ReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let employee = access::require_staff(&user.principal)?.clone();
    let report = state
        .db
        .call(move |db| db.submit_report(&employee, &req.content, req.date.as_deref()))
        .await?;
    tracing::info!(report_id = report.id, employee_id = report.employee_id, "report submitted");
    Ok((StatusCode::CREATED, Json(report)))
}

// ── Stats ─────────────────────────────────────────────────────────────

pub async fn manager_dashboard(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<DashboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    access::require_manager(&user.principal)?;
    let day = match query.today {
        Some(d) => parse_date("today", &d)?,
        None => today(),
    };
    let dashboard = state
        .db
        .call(move |db| {
            let tasks = db.list_tasks(None)?;
            let pending_tasks = db.list_pending_requests()?.len();
            let pending_resources = db
                .list_resource_requests()?
                .iter()
                .filter(|r| r.status == ResourceRequestStatus::Pending)
                .count();
            Ok(stats::manager_dashboard(
                &tasks,
                &day,
                pending_tasks,
                pending_resources,
            ))
        })
        .await?;
    Ok(Json(dashboard))
}

pub async fn performance_report(
    State(state): State<SharedState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    access::require_manager(&user.principal)?;
    let report = state
        .db
        .call(|db| {
            let tasks = db.list_tasks(None)?;
            let employees = db.list_employees()?;
            let clients = db.list_clients()?;
            Ok(stats::performance_report(&tasks, &employees, &clients))
        })
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_feed_is_staff_only() {
        let t = test_app();
        let ana = t.login("ana").await;
        let (status, body) = t
            .send("POST", "/api/feed", Some(&ana), Some(json!({"content": "Coffee?"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["type"], "chat");

        let (status, feed) = t.send("GET", "/api/feed", Some(&ana), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feed["messages"][0]["content"], "Coffee?");
        assert_eq!(feed["employees"].as_array().unwrap().len(), 3);

        let acme = t.login("acme").await;
        let (status, _) = t.send("GET", "/api/feed", Some(&acme), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_reports_scoping() {
        let t = test_app();
        let ana = t.login("ana").await;
        let ben = t.login("ben").await;
        let (status, _) = t
            .send("POST", "/api/reports", Some(&ana), Some(json!({"content": "Sketches done", "date": "2024-05-06"})))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        t.send("POST", "/api/reports", Some(&ben), Some(json!({"content": "Copy drafted"})))
            .await;

        let (_, mine) = t.send("GET", "/api/reports", Some(&ana), None).await;
        assert_eq!(mine.as_array().unwrap().len(), 1);
        let (status, _) = t.send("GET", "/api/reports?employee_id=3", Some(&ana), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let manager = t.login("morgan").await;
        let (_, all) = t.send("GET", "/api/reports", Some(&manager), None).await;
        assert_eq!(all.as_array().unwrap().len(), 2);
        let (_, filtered) = t.send("GET", "/api/reports?employee_id=2", Some(&manager), None).await;
        assert_eq!(filtered[0]["employee_name"], "Ana");
    }

    #[tokio::test]
    async fn test_manager_stats() {
        let t = test_app();
        let manager = t.login("morgan").await;
        let first = t.create_task(&manager, "Logo", &[2]).await;
        t.create_task(&manager, "Deck", &[3]).await;
        t.send(
            "PATCH",
            &format!("/api/tasks/{}/status", first),
            Some(&manager),
            Some(json!({"status": "Completed"})),
        )
        .await;
        t.send(
            "POST",
            &format!("/api/tasks/{}/rating", first),
            Some(&manager),
            Some(json!({"rating": 4})),
        )
        .await;

        let (status, dash) = t
            .send("GET", "/api/stats/dashboard?today=2024-06-01", Some(&manager), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(dash["total_tasks"], 2);
        assert_eq!(dash["due_today"].as_array().unwrap().len(), 2);
        assert_eq!(dash["recent_completed"][0]["title"], "Logo");

        let (status, perf) = t.send("GET", "/api/stats/performance", Some(&manager), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(perf["average_rating"], 4.0);
        assert_eq!(perf["completion_rate"], 50.0);
        assert_eq!(perf["client_progress"][0]["name"], "Acme");
        assert_eq!(perf["client_progress"][0]["completed"], 1);
        assert_eq!(perf["client_progress"][0]["total"], 2);
        assert_eq!(perf["employees"][1]["points"], 4);

        let ana = t.login("ana").await;
        let (status, _) = t.send("GET", "/api/stats/performance", Some(&ana), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
