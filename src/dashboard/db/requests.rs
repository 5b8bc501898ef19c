use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Params, Row, params};

use super::{DashboardDb, parse_column};
use crate::dashboard::models::*;
use crate::dashboard::notify;
use crate::dashboard::validate::{parse_date, require_text, today};
use crate::errors::DashboardError;

/// Result of approving a client's task request.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub request: TaskRequest,
    pub task: Task,
    pub notification: Message,
}

/// A resource request after a manager decision.
#[derive(Debug, Clone)]
pub struct ResourceOutcome {
    pub request: ResourceRequest,
    pub notification: Option<Message>,
}

const TASK_REQUEST_SELECT: &str = "SELECT r.id, r.title, r.description, r.client_id, c.name, r.status,
            r.task_id, r.created_at
     FROM task_requests r JOIN clients c ON c.id = r.client_id";

const RESOURCE_COLUMNS: &str = "id, requester_id, requester_name, item_name, reason, status, due_date,
     assigned_to_id, created_at";

fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<(ResourceRequest, String)> {
    let status: String = row.get(5)?;
    Ok((
        ResourceRequest {
            id: row.get(0)?,
            requester_id: row.get(1)?,
            requester_name: row.get(2)?,
            item_name: row.get(3)?,
            reason: row.get(4)?,
            status: ResourceRequestStatus::Pending,
            due_date: row.get(6)?,
            assigned_to_id: row.get(7)?,
            created_at: row.get(8)?,
        },
        status,
    ))
}

impl DashboardDb {
    // ── Task requests ─────────────────────────────────────────────────

    fn query_task_requests<P: Params>(&self, filter: &str, params: P) -> Result<Vec<TaskRequest>> {
        let sql = format!("{} {} ORDER BY r.id", TASK_REQUEST_SELECT, filter);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare task request query")?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })
            .context("Failed to query task requests")?;
        let mut requests = Vec::new();
        for row in rows {
            let (id, title, description, client_id, client_name, status, task_id, created_at) =
                row.context("Failed to read task request row")?;
            requests.push(TaskRequest {
                id,
                title,
                description,
                client_id,
                client_name,
                status: parse_column(&status, "task request status")?,
                task_id,
                created_at,
            });
        }
        Ok(requests)
    }

    pub fn create_task_request(
        &self,
        client_id: i64,
        title: &str,
        description: &str,
    ) -> Result<TaskRequest> {
        let title = require_text("Title", title)?;
        self.require_client(client_id)?;
        self.conn
            .execute(
                "INSERT INTO task_requests (title, description, client_id, status)
                 VALUES (?1, ?2, ?3, 'Pending')",
                params![title, description.trim(), client_id],
            )
            .context("Failed to insert task request")?;
        let id = self.conn.last_insert_rowid();
        self.require_task_request(id)
    }

    pub fn get_task_request(&self, id: i64) -> Result<Option<TaskRequest>> {
        Ok(self
            .query_task_requests("WHERE r.id = ?1", params![id])?
            .pop())
    }

    pub fn require_task_request(&self, id: i64) -> Result<TaskRequest> {
        self.get_task_request(id)?
            .ok_or_else(|| DashboardError::not_found("Task request", id).into())
    }

    pub fn list_pending_requests(&self) -> Result<Vec<TaskRequest>> {
        self.query_task_requests(
            "WHERE r.status = ?1",
            params![TaskRequestStatus::Pending.as_str()],
        )
    }

    pub fn list_requests_for_client(&self, client_id: i64) -> Result<Vec<TaskRequest>> {
        self.require_client(client_id)?;
        self.query_task_requests("WHERE r.client_id = ?1", params![client_id])
    }

    fn ensure_request_pending(request: &TaskRequest, to: TaskRequestStatus) -> Result<()> {
        if request.status != TaskRequestStatus::Pending {
            return Err(DashboardError::InvalidTransition {
                kind: "Task request",
                id: request.id,
                from: request.status.as_str().to_string(),
                to: to.as_str().to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Turn a pending request into a task. The task, the feed entry and
    /// the request update commit together.
    pub fn approve_request(
        &self,
        id: i64,
        assignees: &[i64],
        due_date: Option<&str>,
        manager: &Employee,
    ) -> Result<ApprovalOutcome> {
        let request = self.require_task_request(id)?;
        Self::ensure_request_pending(&request, TaskRequestStatus::Approved)?;

        let due_date = match due_date {
            Some(d) => parse_date("Due date", d)?,
            None => today(),
        };
        let description = if request.description.trim().is_empty() {
            request.title.clone()
        } else {
            request.description.clone()
        };
        let new = NewTask {
            title: request.title.clone(),
            description,
            assignees: assignees.to_vec(),
            client_id: request.client_id,
            due_date,
            status: TaskStatus::Pending,
        };

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let (task_id, resolved) = self.insert_task(manager.id, &new)?;
        let names = join_names(resolved.iter().map(|e| e.name.as_str()));
        let notification = self.insert_message(
            MessageKind::Notification,
            manager.id,
            &notify::request_approved(&request.title, &names),
            Some(task_id),
        )?;
        self.conn
            .execute(
                "UPDATE task_requests SET status = ?1, task_id = ?2 WHERE id = ?3",
                params![TaskRequestStatus::Approved.as_str(), task_id, id],
            )
            .context("Failed to mark task request approved")?;
        tx.commit().context("Failed to commit request approval")?;

        Ok(ApprovalOutcome {
            request: self.require_task_request(id)?,
            task: self.require_task(task_id)?,
            notification,
        })
    }

    pub fn reject_request(&self, id: i64) -> Result<TaskRequest> {
        let request = self.require_task_request(id)?;
        Self::ensure_request_pending(&request, TaskRequestStatus::Rejected)?;
        self.conn
            .execute(
                "UPDATE task_requests SET status = ?1 WHERE id = ?2",
                params![TaskRequestStatus::Rejected.as_str(), id],
            )
            .context("Failed to reject task request")?;
        self.require_task_request(id)
    }

    // ── Resource requests ─────────────────────────────────────────────

    fn query_resource_requests<P: Params>(
        &self,
        filter: &str,
        params: P,
    ) -> Result<Vec<ResourceRequest>> {
        let sql = format!(
            "SELECT {} FROM resource_requests {} ORDER BY created_at DESC, id DESC",
            RESOURCE_COLUMNS, filter
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare resource request query")?;
        let rows = stmt
            .query_map(params, resource_from_row)
            .context("Failed to query resource requests")?;
        let mut requests = Vec::new();
        for row in rows {
            let (mut request, status) = row.context("Failed to read resource request row")?;
            request.status = parse_column(&status, "resource request status")?;
            requests.push(request);
        }
        Ok(requests)
    }

    pub fn create_resource_request(
        &self,
        requester: &Employee,
        item_name: &str,
        reason: &str,
    ) -> Result<ResourceRequest> {
        let item_name = require_text("Item name", item_name)?;
        let reason = require_text("Reason", reason)?;
        self.conn
            .execute(
                "INSERT INTO resource_requests (requester_id, requester_name, item_name, reason, status)
                 VALUES (?1, ?2, ?3, ?4, 'Pending')",
                params![requester.id, requester.name, item_name, reason],
            )
            .context("Failed to insert resource request")?;
        let id = self.conn.last_insert_rowid();
        self.require_resource_request(id)
    }

    pub fn get_resource_request(&self, id: i64) -> Result<Option<ResourceRequest>> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT {} FROM resource_requests WHERE id = ?1", RESOURCE_COLUMNS),
                params![id],
                resource_from_row,
            )
            .optional()
            .context("Failed to query resource request")?;
        match found {
            Some((mut request, status)) => {
                request.status = parse_column(&status, "resource request status")?;
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    pub fn require_resource_request(&self, id: i64) -> Result<ResourceRequest> {
        self.get_resource_request(id)?
            .ok_or_else(|| DashboardError::not_found("Resource request", id).into())
    }

    pub fn list_resource_requests_for_employee(&self, employee_id: i64) -> Result<Vec<ResourceRequest>> {
        self.require_employee(employee_id)?;
        self.query_resource_requests("WHERE requester_id = ?1", params![employee_id])
    }

    pub fn list_resource_requests(&self) -> Result<Vec<ResourceRequest>> {
        self.query_resource_requests("", [])
    }

    /// Apply a manager decision to a resource request.
    pub fn update_resource_request(
        &self,
        id: i64,
        status: ResourceRequestStatus,
        assignee_id: Option<i64>,
        due_date: Option<&str>,
        manager: &Employee,
    ) -> Result<ResourceOutcome> {
        let request = self.require_resource_request(id)?;
        if !request.status.can_transition_to(status) {
            return Err(DashboardError::InvalidTransition {
                kind: "Resource request",
                id,
                from: request.status.as_str().to_string(),
                to: status.as_str().to_string(),
            }
            .into());
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let notification = match status {
            ResourceRequestStatus::Approved => {
                let (Some(assignee_id), Some(due_date)) = (assignee_id, due_date) else {
                    return Err(DashboardError::validation(
                        "Assignee and due date are required for approval.",
                    )
                    .into());
                };
                let due_date = parse_date("Due date", due_date)?;
                if self.get_employee(assignee_id)?.is_none() {
                    return Err(DashboardError::validation(format!(
                        "Assignee {} does not exist.",
                        assignee_id
                    ))
                    .into());
                }
                self.conn
                    .execute(
                        "UPDATE resource_requests SET status = ?1, assigned_to_id = ?2, due_date = ?3
                         WHERE id = ?4",
                        params![status.as_str(), assignee_id, due_date, id],
                    )
                    .context("Failed to approve resource request")?;
                Some(self.insert_message(
                    MessageKind::Notification,
                    manager.id,
                    &notify::resource_approved(&request.item_name, &request.requester_name),
                    None,
                )?)
            }
            ResourceRequestStatus::Rejected => {
                self.set_resource_status(id, status)?;
                Some(self.insert_message(
                    MessageKind::Notification,
                    manager.id,
                    &notify::resource_rejected(&request.item_name, &request.requester_name),
                    None,
                )?)
            }
            _ => {
                self.set_resource_status(id, status)?;
                None
            }
        };
        tx.commit().context("Failed to commit resource request update")?;

        Ok(ResourceOutcome {
            request: self.require_resource_request(id)?,
            notification,
        })
    }

    fn set_resource_status(&self, id: i64, status: ResourceRequestStatus) -> Result<()> {
        self.conn
            .execute(
                "UPDATE resource_requests SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )
            .context("Failed to update resource request status")?;
        Ok(())
    }
}
