use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Params, params};

use super::{DashboardDb, parse_column};
use crate::dashboard::models::*;
use crate::dashboard::notify;
use crate::dashboard::validate::{parse_date, require_text};
use crate::errors::DashboardError;

const TASK_SELECT: &str = "SELECT t.id, t.title, t.description, t.client_id, c.name, t.due_date,
            t.status, t.rating, t.created_by, t.created_at, t.updated_at
     FROM tasks t JOIN clients c ON c.id = t.client_id";

/// A task after a lifecycle operation, plus the feed entry it produced.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: Task,
    pub notification: Option<Message>,
}

struct TaskRow {
    id: i64,
    title: String,
    description: String,
    client_id: i64,
    client_name: String,
    due_date: String,
    status: String,
    rating: i64,
    created_by: i64,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn into_task(self, assignees: Vec<Assignee>) -> Result<Task> {
        Ok(Task {
            id: self.id,
            title: self.title,
            description: self.description,
            assignees,
            client_id: self.client_id,
            client_name: self.client_name,
            due_date: self.due_date,
            status: parse_column::<TaskStatus>(&self.status, "task status")?,
            rating: self.rating,
            created_by: self.created_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl DashboardDb {
    // ── Queries ───────────────────────────────────────────────────────

    fn query_tasks<P: Params>(&self, filter: &str, params: P) -> Result<Vec<Task>> {
        let sql = format!("{} {} ORDER BY t.id", TASK_SELECT, filter);
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare task query")?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(TaskRow {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                    client_id: row.get(3)?,
                    client_name: row.get(4)?,
                    due_date: row.get(5)?,
                    status: row.get(6)?,
                    rating: row.get(7)?,
                    created_by: row.get(8)?,
                    created_at: row.get(9)?,
                    updated_at: row.get(10)?,
                })
            })
            .context("Failed to query tasks")?;
        let mut task_rows = Vec::new();
        for row in rows {
            task_rows.push(row.context("Failed to read task row")?);
        }

        let mut tasks = Vec::with_capacity(task_rows.len());
        for row in task_rows {
            let assignees = self.task_assignees(row.id)?;
            tasks.push(row.into_task(assignees)?);
        }
        Ok(tasks)
    }

    fn task_assignees(&self, task_id: i64) -> Result<Vec<Assignee>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT e.id, e.name FROM task_assignees a
                 JOIN employees e ON e.id = a.employee_id
                 WHERE a.task_id = ?1 ORDER BY a.position",
            )
            .context("Failed to prepare task_assignees")?;
        let rows = stmt
            .query_map(params![task_id], |row| {
                Ok(Assignee {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("Failed to query task assignees")?;
        let mut assignees = Vec::new();
        for row in rows {
            assignees.push(row.context("Failed to read assignee row")?);
        }
        Ok(assignees)
    }

    pub fn get_task(&self, id: i64) -> Result<Option<Task>> {
        Ok(self.query_tasks("WHERE t.id = ?1", params![id])?.pop())
    }

    pub fn require_task(&self, id: i64) -> Result<Task> {
        self.get_task(id)?
            .ok_or_else(|| DashboardError::not_found("Task", id).into())
    }

    pub fn get_task_detail(&self, id: i64) -> Result<Option<TaskDetail>> {
        let task = match self.get_task(id)? {
            Some(t) => t,
            None => return Ok(None),
        };
        let comments = self.list_comments(id)?;
        Ok(Some(TaskDetail { task, comments }))
    }

    pub fn list_tasks(&self, status: Option<TaskStatus>) -> Result<Vec<Task>> {
        match status {
            Some(s) => self.query_tasks("WHERE t.status = ?1", params![s.as_str()]),
            None => self.query_tasks("", []),
        }
    }

    /// Tasks whose assignee list includes the employee.
    pub fn list_tasks_for_employee(&self, employee_id: i64) -> Result<Vec<Task>> {
        self.require_employee(employee_id)?;
        self.query_tasks(
            "WHERE t.id IN (SELECT task_id FROM task_assignees WHERE employee_id = ?1)",
            params![employee_id],
        )
    }

    pub fn list_tasks_for_client(&self, client_id: i64) -> Result<Vec<Task>> {
        self.require_client(client_id)?;
        self.query_tasks("WHERE t.client_id = ?1", params![client_id])
    }

    // ── Creation ──────────────────────────────────────────────────────

    /// Dedupe the ids (keeping order) and check every employee exists.
    fn resolve_assignees(&self, ids: &[i64]) -> Result<Vec<Employee>> {
        if ids.is_empty() {
            return Err(DashboardError::validation("At least one assignee is required.").into());
        }
        let mut resolved: Vec<Employee> = Vec::with_capacity(ids.len());
        for &id in ids {
            if resolved.iter().any(|e| e.id == id) {
                continue;
            }
            let employee = self.get_employee(id)?.ok_or_else(|| {
                DashboardError::validation(format!("Assignee {} does not exist.", id))
            })?;
            resolved.push(employee);
        }
        Ok(resolved)
    }

    fn write_assignees(&self, task_id: i64, assignees: &[Employee]) -> Result<()> {
        self.conn
            .execute("DELETE FROM task_assignees WHERE task_id = ?1", params![task_id])
            .context("Failed to clear task assignees")?;
        for (position, employee) in assignees.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT INTO task_assignees (task_id, employee_id, position) VALUES (?1, ?2, ?3)",
                    params![task_id, employee.id, position as i64],
                )
                .context("Failed to insert task assignee")?;
        }
        Ok(())
    }

    /// Validate and insert a task without opening a transaction.
    /// Returns the new id and the resolved assignees.
    pub(super) fn insert_task(&self, creator_id: i64, new: &NewTask) -> Result<(i64, Vec<Employee>)> {
        let title = require_text("Title", &new.title)?;
        let description = require_text("Description", &new.description)?;
        let due_date = parse_date("Due date", &new.due_date)?;
        let assignees = self.resolve_assignees(&new.assignees)?;
        if self.get_client(new.client_id)?.is_none() {
            return Err(DashboardError::validation(format!(
                "Client {} does not exist.",
                new.client_id
            ))
            .into());
        }

        self.conn
            .execute(
                "INSERT INTO tasks (title, description, client_id, due_date, status, rating, created_by)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                params![
                    title,
                    description,
                    new.client_id,
                    due_date,
                    new.status.as_str(),
                    creator_id
                ],
            )
            .context("Failed to insert task")?;
        let id = self.conn.last_insert_rowid();
        self.write_assignees(id, &assignees)?;
        Ok((id, assignees))
    }

    /// Create a task and announce it in the feed, atomically.
    pub fn create_task(&self, creator: &Employee, new: &NewTask) -> Result<TaskOutcome> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let (id, assignees) = self.insert_task(creator.id, new)?;
        let names = join_names(assignees.iter().map(|e| e.name.as_str()));
        let notification = self.insert_message(
            MessageKind::Notification,
            creator.id,
            &notify::task_created(new.title.trim(), &names),
            Some(id),
        )?;

        tx.commit().context("Failed to commit task creation")?;
        Ok(TaskOutcome {
            task: self.require_task(id)?,
            notification: Some(notification),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────────

    /// Move a task to `status`. Re-applying the current status changes nothing.
    pub fn update_task_status(
        &self,
        id: i64,
        status: TaskStatus,
        actor: &Employee,
    ) -> Result<TaskOutcome> {
        let task = self.require_task(id)?;
        if task.status == status {
            return Ok(TaskOutcome {
                task,
                notification: None,
            });
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        self.conn
            .execute(
                "UPDATE tasks SET status = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![status.as_str(), id],
            )
            .context("Failed to update task status")?;
        let notification = self.insert_message(
            MessageKind::Notification,
            actor.id,
            &notify::status_changed(&task.title, task.status, status),
            Some(id),
        )?;
        tx.commit().context("Failed to commit status change")?;

        Ok(TaskOutcome {
            task: self.require_task(id)?,
            notification: Some(notification),
        })
    }

    /// Replace the assignee list.
    pub fn transfer_task(&self, id: i64, assignee_ids: &[i64], actor: &Employee) -> Result<TaskOutcome> {
        let task = self.require_task(id)?;

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let assignees = self.resolve_assignees(assignee_ids)?;
        self.write_assignees(id, &assignees)?;
        self.conn
            .execute(
                "UPDATE tasks SET updated_at = datetime('now') WHERE id = ?1",
                params![id],
            )
            .context("Failed to touch task")?;
        let names = join_names(assignees.iter().map(|e| e.name.as_str()));
        let notification = self.insert_message(
            MessageKind::Notification,
            actor.id,
            &notify::task_transferred(&task.title, &names),
            Some(id),
        )?;
        tx.commit().context("Failed to commit task transfer")?;

        Ok(TaskOutcome {
            task: self.require_task(id)?,
            notification: Some(notification),
        })
    }

    /// Rating already credited to `employee_id` for this task, 0 if none.
    fn awarded_rating(&self, task_id: i64, employee_id: i64) -> Result<i64> {
        let awarded = self
            .conn
            .query_row(
                "SELECT awarded FROM task_rating_awards WHERE task_id = ?1 AND employee_id = ?2",
                params![task_id, employee_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to query rating award")?;
        Ok(awarded.unwrap_or(0))
    }

    /// Rate a completed task. Each current assignee's points move by the
    /// difference between this rating and what they were already credited
    /// for the task; former assignees keep what they earned.
    pub fn rate_task(&self, id: i64, rating: i64, actor: &Employee) -> Result<TaskOutcome> {
        if !(1..=5).contains(&rating) {
            return Err(DashboardError::validation("Rating must be between 1 and 5.").into());
        }
        let task = self.require_task(id)?;
        if task.status != TaskStatus::Completed {
            return Err(DashboardError::InvalidTransition {
                kind: "Task",
                id,
                from: task.status.to_string(),
                to: "Rated".to_string(),
            }
            .into());
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        self.conn
            .execute(
                "UPDATE tasks SET rating = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![rating, id],
            )
            .context("Failed to update task rating")?;
        for assignee in &task.assignees {
            let delta = rating - self.awarded_rating(id, assignee.id)?;
            if delta == 0 {
                continue;
            }
            self.conn
                .execute(
                    "UPDATE employees SET points = points + ?1 WHERE id = ?2",
                    params![delta, assignee.id],
                )
                .context("Failed to award points")?;
            self.conn
                .execute(
                    "INSERT INTO task_rating_awards (task_id, employee_id, awarded)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT (task_id, employee_id) DO UPDATE SET awarded = excluded.awarded",
                    params![id, assignee.id, rating],
                )
                .context("Failed to record rating award")?;
        }
        let notification = self.insert_message(
            MessageKind::Notification,
            actor.id,
            &notify::task_rated(&task.title, rating),
            Some(id),
        )?;
        tx.commit().context("Failed to commit task rating")?;

        Ok(TaskOutcome {
            task: self.require_task(id)?,
            notification: Some(notification),
        })
    }

    pub fn delete_task(&self, id: i64) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1", params![id])
            .context("Failed to delete task")?;
        Ok(count > 0)
    }

    // ── Comments ──────────────────────────────────────────────────────

    pub fn add_comment(
        &self,
        task_id: i64,
        author_name: &str,
        author_role: UserRole,
        content: &str,
    ) -> Result<Comment> {
        let content = require_text("Comment", content)?;
        self.require_task(task_id)?;
        self.conn
            .execute(
                "INSERT INTO task_comments (task_id, author_name, author_role, content)
                 VALUES (?1, ?2, ?3, ?4)",
                params![task_id, author_name, author_role.as_str(), content],
            )
            .context("Failed to insert comment")?;
        let id = self.conn.last_insert_rowid();
        self.list_comments(task_id)?
            .into_iter()
            .find(|c| c.id == id)
            .context("Comment not found after insert")
    }

    pub fn list_comments(&self, task_id: i64) -> Result<Vec<Comment>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, task_id, author_name, author_role, content, created_at
                 FROM task_comments WHERE task_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_comments")?;
        let rows = stmt
            .query_map(params![task_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("Failed to query comments")?;
        let mut comments = Vec::new();
        for row in rows {
            let (id, task_id, author_name, role, content, created_at) =
                row.context("Failed to read comment row")?;
            comments.push(Comment {
                id,
                task_id,
                author_name,
                author_role: parse_column(&role, "comment role")?,
                content,
                created_at,
            });
        }
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    struct Seed {
        db: DashboardDb,
        manager: Employee,
        ana: Employee,
        ben: Employee,
        client: Client,
    }

    fn seed() -> Seed {
        let db = DashboardDb::new_in_memory().unwrap();
        let manager = fixtures::manager(&db);
        let ana = fixtures::employee(&db, "Ana");
        let ben = fixtures::employee(&db, "Ben");
        let client = fixtures::client(&db, "Acme");
        Seed {
            db,
            manager,
            ana,
            ben,
            client,
        }
    }

    #[test]
    fn test_create_task_emits_notification() -> Result<()> {
        let s = seed();
        let outcome = s.db.create_task(
            &s.manager,
            &fixtures::new_task("Logo refresh", s.client.id, vec![s.ana.id, s.ben.id]),
        )?;
        let task = outcome.task;
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.rating, 0);
        assert_eq!(task.created_by, s.manager.id);
        assert_eq!(task.client_name, "Acme");
        assert_eq!(task.assignee_names(), "Ana, Ben");

        let note = outcome.notification.expect("notification expected");
        assert_eq!(note.kind, MessageKind::Notification);
        assert_eq!(note.author_id, s.manager.id);
        assert_eq!(note.task_id, Some(task.id));
        assert_eq!(
            note.content,
            "created a new task \"Logo refresh\" and assigned it to Ana, Ben."
        );
        Ok(())
    }

    #[test]
    fn test_create_task_validation_leaves_nothing_behind() -> Result<()> {
        let s = seed();
        let cases = vec![
            fixtures::new_task("", s.client.id, vec![s.ana.id]),
            fixtures::new_task("No assignees", s.client.id, vec![]),
            fixtures::new_task("Ghost assignee", s.client.id, vec![999]),
            fixtures::new_task("Ghost client", 999, vec![s.ana.id]),
            NewTask {
                due_date: "tomorrow".into(),
                ..fixtures::new_task("Bad date", s.client.id, vec![s.ana.id])
            },
        ];
        for new in cases {
            let err = s.db.create_task(&s.manager, &new).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<DashboardError>(), Some(DashboardError::Validation(_))),
                "expected validation error for {:?}, got {}",
                new.title,
                err
            );
        }
        assert!(s.db.list_tasks(None)?.is_empty());
        assert!(s.db.list_messages()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_duplicate_assignees_are_collapsed() -> Result<()> {
        let s = seed();
        let outcome = s.db.create_task(
            &s.manager,
            &fixtures::new_task("Dupes", s.client.id, vec![s.ana.id, s.ana.id, s.ben.id]),
        )?;
        assert_eq!(outcome.task.assignees.len(), 2);
        Ok(())
    }

    #[test]
    fn test_list_tasks_filters() -> Result<()> {
        let s = seed();
        let t1 = s
            .db
            .create_task(&s.manager, &fixtures::new_task("One", s.client.id, vec![s.ana.id]))?
            .task;
        s.db.create_task(&s.manager, &fixtures::new_task("Two", s.client.id, vec![s.ben.id]))?;
        s.db.update_task_status(t1.id, TaskStatus::Blocked, &s.ana)?;

        assert_eq!(s.db.list_tasks(None)?.len(), 2);
        let blocked = s.db.list_tasks(Some(TaskStatus::Blocked))?;
        assert_eq!(blocked.len(), 1);
        assert_eq!(blocked[0].title, "One");

        let ana_tasks = s.db.list_tasks_for_employee(s.ana.id)?;
        assert_eq!(ana_tasks.len(), 1);
        assert_eq!(ana_tasks[0].id, t1.id);
        assert_eq!(s.db.list_tasks_for_client(s.client.id)?.len(), 2);

        let err = s.db.list_tasks_for_employee(404).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DashboardError>(),
            Some(DashboardError::NotFound { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_status_change_notifies_once() -> Result<()> {
        let s = seed();
        let task = s
            .db
            .create_task(&s.manager, &fixtures::new_task("Copy", s.client.id, vec![s.ana.id]))?
            .task;

        let moved = s.db.update_task_status(task.id, TaskStatus::InProgress, &s.ana)?;
        assert_eq!(moved.task.status, TaskStatus::InProgress);
        let note = moved.notification.expect("status change should notify");
        assert_eq!(note.author_id, s.ana.id);
        assert_eq!(note.content, "moved \"Copy\" from Pending to In Progress.");

        let again = s.db.update_task_status(task.id, TaskStatus::InProgress, &s.ana)?;
        assert!(again.notification.is_none());
        assert_eq!(s.db.list_messages()?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_transfer_task_replaces_assignees() -> Result<()> {
        let s = seed();
        let task = s
            .db
            .create_task(&s.manager, &fixtures::new_task("Banner", s.client.id, vec![s.ana.id]))?
            .task;
        let outcome = s.db.transfer_task(task.id, &[s.ben.id], &s.manager)?;
        assert_eq!(outcome.task.assignee_names(), "Ben");
        assert!(s.db.list_tasks_for_employee(s.ana.id)?.is_empty());
        assert_eq!(
            outcome.notification.map(|n| n.content),
            Some("transferred \"Banner\" to Ben.".to_string())
        );

        assert!(s.db.transfer_task(task.id, &[], &s.manager).is_err());
        assert_eq!(s.db.require_task(task.id)?.assignee_names(), "Ben");
        Ok(())
    }

    #[test]
    fn test_rating_requires_completed_task() -> Result<()> {
        let s = seed();
        let task = s
            .db
            .create_task(&s.manager, &fixtures::new_task("Deck", s.client.id, vec![s.ana.id]))?
            .task;
        let err = s.db.rate_task(task.id, 4, &s.manager).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DashboardError>(),
            Some(DashboardError::InvalidTransition { .. })
        ));

        s.db.update_task_status(task.id, TaskStatus::Completed, &s.ana)?;
        for bad in [0, 6] {
            assert!(s.db.rate_task(task.id, bad, &s.manager).is_err());
        }
        Ok(())
    }

    #[test]
    fn test_rating_adjusts_points_by_delta() -> Result<()> {
        let s = seed();
        let task = s
            .db
            .create_task(
                &s.manager,
                &fixtures::new_task("Shoot", s.client.id, vec![s.ana.id, s.ben.id]),
            )?
            .task;
        s.db.update_task_status(task.id, TaskStatus::Completed, &s.ana)?;

        let rated = s.db.rate_task(task.id, 4, &s.manager)?;
        assert_eq!(rated.task.rating, 4);
        assert_eq!(s.db.require_employee(s.ana.id)?.points, 4);
        assert_eq!(s.db.require_employee(s.ben.id)?.points, 4);

        s.db.rate_task(task.id, 2, &s.manager)?;
        assert_eq!(s.db.require_employee(s.ana.id)?.points, 2);
        assert_eq!(s.db.require_employee(s.manager.id)?.points, 0);
        Ok(())
    }

    #[test]
    fn test_rerating_after_transfer_credits_each_assignee_once() -> Result<()> {
        let s = seed();
        let task = s
            .db
            .create_task(&s.manager, &fixtures::new_task("Poster", s.client.id, vec![s.ana.id]))?
            .task;
        s.db.update_task_status(task.id, TaskStatus::Completed, &s.ana)?;
        s.db.rate_task(task.id, 4, &s.manager)?;
        s.db.transfer_task(task.id, &[s.ben.id], &s.manager)?;
        s.db.rate_task(task.id, 2, &s.manager)?;

        assert_eq!(s.db.require_employee(s.ana.id)?.points, 4);
        assert_eq!(s.db.require_employee(s.ben.id)?.points, 2);

        // back to both: Ana moves from 4 to 3, Ben from 2 to 3
        s.db.transfer_task(task.id, &[s.ana.id, s.ben.id], &s.manager)?;
        s.db.rate_task(task.id, 3, &s.manager)?;
        assert_eq!(s.db.require_employee(s.ana.id)?.points, 3);
        assert_eq!(s.db.require_employee(s.ben.id)?.points, 3);

        s.db.rate_task(task.id, 3, &s.manager)?;
        assert_eq!(s.db.require_employee(s.ana.id)?.points, 3);
        Ok(())
    }

    #[test]
    fn test_comments_round_trip() -> Result<()> {
        let s = seed();
        let task = s
            .db
            .create_task(&s.manager, &fixtures::new_task("Site", s.client.id, vec![s.ana.id]))?
            .task;
        let comment = s.db.add_comment(task.id, "Acme", UserRole::Client, "  Looks great  ")?;
        assert_eq!(comment.content, "Looks great");
        assert_eq!(comment.author_role, UserRole::Client);
        assert!(s.db.add_comment(task.id, "Acme", UserRole::Client, "   ").is_err());

        let detail = s.db.get_task_detail(task.id)?.expect("task exists");
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.task.id, task.id);
        Ok(())
    }

    #[test]
    fn test_delete_task_cascades_and_unlinks_feed() -> Result<()> {
        let s = seed();
        let task = s
            .db
            .create_task(&s.manager, &fixtures::new_task("Temp", s.client.id, vec![s.ana.id]))?
            .task;
        s.db.add_comment(task.id, "Ana", UserRole::Employee, "on it")?;

        assert!(s.db.delete_task(task.id)?);
        assert!(s.db.get_task(task.id)?.is_none());
        assert!(s.db.list_comments(task.id)?.is_empty());
        let messages = s.db.list_messages()?;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].task_id, None);
        assert!(!s.db.delete_task(task.id)?);
        Ok(())
    }
}
