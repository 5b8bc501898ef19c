use anyhow::{Context, Result};
use rusqlite::{OptionalExtension, Row, params};

use super::DashboardDb;
use crate::dashboard::auth::{hash_password, new_token, verify_password};
use crate::dashboard::models::*;
use crate::dashboard::validate::{missing_fields, parse_date, require_text};
use crate::errors::DashboardError;

const EMPLOYEE_COLUMNS: &str =
    "id, name, role, avatar, points, username, contact_number, dob, created_at";
const CLIENT_COLUMNS: &str =
    "id, name, contact_email, username, contact_number, dob, created_at";

fn employee_from_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        avatar: row.get(3)?,
        points: row.get(4)?,
        username: row.get(5)?,
        contact_number: row.get(6)?,
        dob: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn client_from_row(row: &Row<'_>) -> rusqlite::Result<Client> {
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        contact_email: row.get(2)?,
        username: row.get(3)?,
        contact_number: row.get(4)?,
        dob: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Fields a signed-in user may change on their own profile.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub contact_number: Option<String>,
    pub dob: Option<String>,
    pub password: Option<String>,
}

const PRINCIPAL_EMPLOYEE: &str = "employee";
const PRINCIPAL_CLIENT: &str = "client";

impl DashboardDb {
    // ── Usernames ─────────────────────────────────────────────────────

    /// Usernames are unique across employees and clients.
    pub fn username_taken(&self, username: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM employees WHERE username = ?1)
                      + (SELECT COUNT(*) FROM clients WHERE username = ?1) > 0",
                params![username],
                |row| row.get(0),
            )
            .context("Failed to check username")
    }

    fn ensure_username_free(&self, username: &str) -> Result<()> {
        if self.username_taken(username)? {
            return Err(DashboardError::Conflict("Username already exists.".into()).into());
        }
        Ok(())
    }

    // ── Employee CRUD ─────────────────────────────────────────────────

    pub fn create_employee(
        &self,
        name: &str,
        role: &str,
        username: &str,
        password: &str,
    ) -> Result<Employee> {
        let missing = missing_fields(&[
            ("name", name),
            ("role", role),
            ("username", username),
            ("password", password),
        ]);
        if !missing.is_empty() {
            return Err(DashboardError::validation(format!(
                "Failed to add employee. Missing fields: {}",
                missing.join(", ")
            ))
            .into());
        }
        let username = username.trim();
        self.ensure_username_free(username)?;

        self.conn
            .execute(
                "INSERT INTO employees (name, role, avatar, points, username, password_hash)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5)",
                params![
                    name.trim(),
                    role.trim(),
                    DEFAULT_AVATAR,
                    username,
                    hash_password(password)
                ],
            )
            .context("Failed to insert employee")?;
        let id = self.conn.last_insert_rowid();
        self.get_employee(id)?
            .context("Employee not found after insert")
    }

    pub fn get_employee(&self, id: i64) -> Result<Option<Employee>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM employees WHERE id = ?1", EMPLOYEE_COLUMNS),
                params![id],
                employee_from_row,
            )
            .optional()
            .context("Failed to query employee")
    }

    /// Like `get_employee` but a missing row is a `NotFound` error.
    pub fn require_employee(&self, id: i64) -> Result<Employee> {
        self.get_employee(id)?
            .ok_or_else(|| DashboardError::not_found("Employee", id).into())
    }

    pub fn list_employees(&self) -> Result<Vec<Employee>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM employees ORDER BY id", EMPLOYEE_COLUMNS))
            .context("Failed to prepare list_employees")?;
        let rows = stmt
            .query_map([], employee_from_row)
            .context("Failed to query employees")?;
        let mut employees = Vec::new();
        for row in rows {
            employees.push(row.context("Failed to read employee row")?);
        }
        Ok(employees)
    }

    /// The first account holding the manager title.
    pub fn find_manager(&self) -> Result<Option<Employee>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM employees WHERE role = ?1 ORDER BY id LIMIT 1",
                    EMPLOYEE_COLUMNS
                ),
                params![MANAGER_TITLE],
                employee_from_row,
            )
            .optional()
            .context("Failed to query manager")
    }

    /// Create the manager account when none exists yet.
    /// Returns the new account, or `None` if a manager was already present.
    pub fn ensure_manager(
        &self,
        name: &str,
        username: &str,
        password: &str,
    ) -> Result<Option<Employee>> {
        if self.find_manager()?.is_some() {
            return Ok(None);
        }
        let manager = self.create_employee(name, MANAGER_TITLE, username, password)?;
        Ok(Some(manager))
    }

    // ── Client CRUD ───────────────────────────────────────────────────

    pub fn create_client(
        &self,
        name: &str,
        contact_email: &str,
        username: &str,
        password: &str,
    ) -> Result<Client> {
        let missing = missing_fields(&[
            ("name", name),
            ("contact_email", contact_email),
            ("username", username),
            ("password", password),
        ]);
        if !missing.is_empty() {
            return Err(DashboardError::validation(format!(
                "Failed to add client. Missing fields: {}",
                missing.join(", ")
            ))
            .into());
        }
        if !contact_email.contains('@') {
            return Err(DashboardError::validation("Contact email must be an email address.").into());
        }
        let username = username.trim();
        self.ensure_username_free(username)?;

        self.conn
            .execute(
                "INSERT INTO clients (name, contact_email, username, password_hash)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    name.trim(),
                    contact_email.trim(),
                    username,
                    hash_password(password)
                ],
            )
            .context("Failed to insert client")?;
        let id = self.conn.last_insert_rowid();
        self.get_client(id)?.context("Client not found after insert")
    }

    pub fn get_client(&self, id: i64) -> Result<Option<Client>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM clients WHERE id = ?1", CLIENT_COLUMNS),
                params![id],
                client_from_row,
            )
            .optional()
            .context("Failed to query client")
    }

    pub fn require_client(&self, id: i64) -> Result<Client> {
        self.get_client(id)?
            .ok_or_else(|| DashboardError::not_found("Client", id).into())
    }

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM clients ORDER BY id", CLIENT_COLUMNS))
            .context("Failed to prepare list_clients")?;
        let rows = stmt
            .query_map([], client_from_row)
            .context("Failed to query clients")?;
        let mut clients = Vec::new();
        for row in rows {
            clients.push(row.context("Failed to read client row")?);
        }
        Ok(clients)
    }

    // ── Sessions ──────────────────────────────────────────────────────

    /// Check credentials and open a session. Employees are looked up first,
    /// then clients.
    pub fn login(&self, username: &str, password: &str, ttl_hours: i64) -> Result<Session> {
        let username = username.trim();

        let employee: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT id, password_hash FROM employees WHERE username = ?1",
                params![username],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to look up employee login")?;

        let (kind, id, hash) = match employee {
            Some((id, hash)) => (PRINCIPAL_EMPLOYEE, id, hash),
            None => {
                let client: Option<(i64, String)> = self
                    .conn
                    .query_row(
                        "SELECT id, password_hash FROM clients WHERE username = ?1",
                        params![username],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()
                    .context("Failed to look up client login")?;
                match client {
                    Some((id, hash)) => (PRINCIPAL_CLIENT, id, hash),
                    None => return Err(DashboardError::InvalidCredentials.into()),
                }
            }
        };

        if !verify_password(password, &hash) {
            return Err(DashboardError::InvalidCredentials.into());
        }

        let purged = self.purge_expired_sessions()?;
        if purged > 0 {
            tracing::debug!(purged, "removed expired sessions");
        }

        let token = new_token();
        self.conn
            .execute(
                "INSERT INTO sessions (token, principal_kind, principal_id, expires_at)
                 VALUES (?1, ?2, ?3, datetime('now', ?4))",
                params![token, kind, id, format!("{:+} hours", ttl_hours)],
            )
            .context("Failed to insert session")?;

        let expires_at: String = self
            .conn
            .query_row(
                "SELECT expires_at FROM sessions WHERE token = ?1",
                params![token],
                |row| row.get(0),
            )
            .context("Failed to read session expiry")?;
        let user = self
            .load_principal(kind, id)?
            .context("Principal vanished after login")?;

        Ok(Session {
            token,
            role: user.role(),
            user,
            expires_at,
        })
    }

    fn load_principal(&self, kind: &str, id: i64) -> Result<Option<Principal>> {
        match kind {
            PRINCIPAL_EMPLOYEE => Ok(self.get_employee(id)?.map(Principal::Employee)),
            PRINCIPAL_CLIENT => Ok(self.get_client(id)?.map(Principal::Client)),
            other => Err(anyhow::anyhow!("invalid principal kind in database: '{}'", other)),
        }
    }

    /// Resolve a token to its account. Expired or unknown tokens yield `None`.
    pub fn session_principal(&self, token: &str) -> Result<Option<Principal>> {
        let found: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT principal_kind, principal_id FROM sessions
                 WHERE token = ?1 AND expires_at > datetime('now')",
                params![token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .context("Failed to query session")?;
        match found {
            Some((kind, id)) => self.load_principal(&kind, id),
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token: &str) -> Result<bool> {
        let count = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .context("Failed to delete session")?;
        Ok(count > 0)
    }

    /// Drop every expired session; returns how many were removed.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        self.conn
            .execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])
            .context("Failed to purge sessions")
    }

    // ── Profile ───────────────────────────────────────────────────────

    pub fn update_profile(&self, principal: &Principal, update: &ProfileUpdate) -> Result<Principal> {
        let (table, kind) = match principal {
            Principal::Employee(_) => ("employees", PRINCIPAL_EMPLOYEE),
            Principal::Client(_) => ("clients", PRINCIPAL_CLIENT),
        };
        let id = principal.id();

        let dob = match &update.dob {
            Some(d) => Some(parse_date("Date of birth", d)?),
            None => None,
        };
        let password_hash = match &update.password {
            Some(p) => {
                require_text("Password", p)?;
                Some(hash_password(p))
            }
            None => None,
        };

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if let Some(number) = &update.contact_number {
            tx.execute(
                &format!("UPDATE {} SET contact_number = ?1 WHERE id = ?2", table),
                params![number.trim(), id],
            )
            .context("Failed to update contact number")?;
        }
        if let Some(dob) = &dob {
            tx.execute(
                &format!("UPDATE {} SET dob = ?1 WHERE id = ?2", table),
                params![dob, id],
            )
            .context("Failed to update date of birth")?;
        }
        if let Some(hash) = &password_hash {
            tx.execute(
                &format!("UPDATE {} SET password_hash = ?1 WHERE id = ?2", table),
                params![hash, id],
            )
            .context("Failed to update password")?;
        }
        tx.commit().context("Failed to commit profile update")?;

        self.load_principal(kind, id)?
            .context("Profile not found after update")
    }
}
