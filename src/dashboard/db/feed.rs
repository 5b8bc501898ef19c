use anyhow::{Context, Result};
use rusqlite::{Params, params};

use super::{DashboardDb, parse_column};
use crate::dashboard::models::*;
use crate::dashboard::validate::{parse_date, require_text, today};

impl DashboardDb {
    // ── Team feed ─────────────────────────────────────────────────────

    /// Append a feed entry. Callers that pair this with other writes wrap
    /// both in their own transaction.
    pub(super) fn insert_message(
        &self,
        kind: MessageKind,
        author_id: i64,
        content: &str,
        task_id: Option<i64>,
    ) -> Result<Message> {
        self.conn
            .execute(
                "INSERT INTO messages (kind, author_id, content, task_id) VALUES (?1, ?2, ?3, ?4)",
                params![kind.as_str(), author_id, content, task_id],
            )
            .context("Failed to insert message")?;
        let id = self.conn.last_insert_rowid();
        self.query_messages("WHERE id = ?1", params![id])?
            .pop()
            .context("Message not found after insert")
    }

    fn query_messages<P: Params>(&self, filter: &str, params: P) -> Result<Vec<Message>> {
        let sql = format!(
            "SELECT id, kind, author_id, content, task_id, created_at FROM messages {} ORDER BY id",
            filter
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare message query")?;
        let rows = stmt
            .query_map(params, |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("Failed to query messages")?;
        let mut messages = Vec::new();
        for row in rows {
            let (id, kind, author_id, content, task_id, created_at) =
                row.context("Failed to read message row")?;
            messages.push(Message {
                id,
                kind: parse_column(&kind, "message kind")?,
                author_id,
                content,
                task_id,
                created_at,
            });
        }
        Ok(messages)
    }

    /// Every feed entry, oldest first.
    pub fn list_messages(&self) -> Result<Vec<Message>> {
        self.query_messages("", [])
    }

    pub fn post_chat(&self, author: &Employee, content: &str) -> Result<Message> {
        let content = require_text("Message", content)?;
        self.insert_message(MessageKind::Chat, author.id, &content, None)
    }

    /// Messages plus the roster used to render author names and avatars.
    pub fn feed(&self) -> Result<FeedView> {
        Ok(FeedView {
            messages: self.list_messages()?,
            employees: self.list_employees()?,
        })
    }

    // ── Daily reports ─────────────────────────────────────────────────

    pub fn submit_report(
        &self,
        employee: &Employee,
        content: &str,
        date: Option<&str>,
    ) -> Result<Report> {
        let content = require_text("Report", content)?;
        let date = match date {
            Some(d) => parse_date("Report date", d)?,
            None => today(),
        };
        self.conn
            .execute(
                "INSERT INTO reports (employee_id, date, content) VALUES (?1, ?2, ?3)",
                params![employee.id, date, content],
            )
            .context("Failed to insert report")?;
        let id = self.conn.last_insert_rowid();
        self.query_reports("WHERE r.id = ?1", params![id])?
            .pop()
            .context("Report not found after insert")
    }

    /// Reports newest first, optionally for a single employee.
    pub fn list_reports(&self, employee_id: Option<i64>) -> Result<Vec<Report>> {
        match employee_id {
            Some(id) => {
                self.require_employee(id)?;
                self.query_reports("WHERE r.employee_id = ?1", params![id])
            }
            None => self.query_reports("", []),
        }
    }

    fn query_reports<P: Params>(&self, filter: &str, params: P) -> Result<Vec<Report>> {
        let sql = format!(
            "SELECT r.id, r.employee_id, e.name, r.date, r.content, r.created_at
             FROM reports r JOIN employees e ON e.id = r.employee_id
             {} ORDER BY r.date DESC, r.id DESC",
            filter
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare report query")?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(Report {
                    id: row.get(0)?,
                    employee_id: row.get(1)?,
                    employee_name: row.get(2)?,
                    date: row.get(3)?,
                    content: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .context("Failed to query reports")?;
        let mut reports = Vec::new();
        for row in rows {
            reports.push(row.context("Failed to read report row")?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    #[test]
    fn test_post_chat_and_feed_order() -> Result<()> {
        let db = DashboardDb::new_in_memory()?;
        let manager = fixtures::manager(&db);
        let ana = fixtures::employee(&db, "Ana");

        let first = db.post_chat(&ana, " Morning all ")?;
        assert_eq!(first.kind, MessageKind::Chat);
        assert_eq!(first.content, "Morning all");
        assert_eq!(first.task_id, None);
        db.post_chat(&manager, "Standup in 5")?;
        assert!(db.post_chat(&ana, "   ").is_err());

        let feed = db.feed()?;
        assert_eq!(
            feed.messages.iter().map(|m| m.content.as_str()).collect::<Vec<_>>(),
            vec!["Morning all", "Standup in 5"]
        );
        assert_eq!(feed.employees.len(), 2);
        Ok(())
    }

    #[test]
    fn test_feed_mixes_chat_and_notifications() -> Result<()> {
        let db = DashboardDb::new_in_memory()?;
        let manager = fixtures::manager(&db);
        let ana = fixtures::employee(&db, "Ana");
        let acme = fixtures::client(&db, "Acme");

        db.post_chat(&ana, "hi")?;
        db.create_task(&manager, &fixtures::new_task("Logo", acme.id, vec![ana.id]))?;
        let kinds: Vec<MessageKind> = db.list_messages()?.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![MessageKind::Chat, MessageKind::Notification]);
        Ok(())
    }

    #[test]
    fn test_submit_report_defaults_date() -> Result<()> {
        let db = DashboardDb::new_in_memory()?;
        let ana = fixtures::employee(&db, "Ana");
        let report = db.submit_report(&ana, "Finished the moodboard", None)?;
        assert_eq!(report.date, today());
        assert_eq!(report.employee_name, "Ana");
        assert!(db.submit_report(&ana, " ", None).is_err());
        assert!(db.submit_report(&ana, "x", Some("yesterday")).is_err());
        Ok(())
    }

    #[test]
    fn test_list_reports_newest_first_and_filtered() -> Result<()> {
        let db = DashboardDb::new_in_memory()?;
        let ana = fixtures::employee(&db, "Ana");
        let ben = fixtures::employee(&db, "Ben");
        db.submit_report(&ana, "Monday", Some("2024-05-06"))?;
        db.submit_report(&ana, "Tuesday", Some("2024-05-07"))?;
        db.submit_report(&ben, "Ben's day", Some("2024-05-06"))?;

        let all = db.list_reports(None)?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].content, "Tuesday");

        let ana_reports = db.list_reports(Some(ana.id))?;
        assert_eq!(
            ana_reports.iter().map(|r| r.content.as_str()).collect::<Vec<_>>(),
            vec!["Tuesday", "Monday"]
        );
        assert!(db.list_reports(Some(404)).is_err());
        Ok(())
    }
}
