//! Who may see or change what.
//!
//! Managers see everything. Employees see the tasks they are assigned to.
//! Clients see the tasks and requests filed under their own account.

use super::models::{Client, Employee, Principal, Task, UserRole};
use crate::errors::DashboardError;

pub fn require_manager(principal: &Principal) -> Result<&Employee, DashboardError> {
    match principal {
        Principal::Employee(e) if e.user_role() == UserRole::Manager => Ok(e),
        _ => Err(DashboardError::forbidden("manager access required")),
    }
}

/// Managers and employees.
pub fn require_staff(principal: &Principal) -> Result<&Employee, DashboardError> {
    match principal {
        Principal::Employee(e) => Ok(e),
        Principal::Client(_) => Err(DashboardError::forbidden("staff access required")),
    }
}

pub fn require_client(principal: &Principal) -> Result<&Client, DashboardError> {
    match principal {
        Principal::Client(c) => Ok(c),
        Principal::Employee(_) => Err(DashboardError::forbidden("client access required")),
    }
}

pub fn is_manager(principal: &Principal) -> bool {
    principal.role() == UserRole::Manager
}

pub fn can_view_task(principal: &Principal, task: &Task) -> bool {
    match principal {
        Principal::Employee(e) => e.user_role() == UserRole::Manager || task.is_assigned_to(e.id),
        Principal::Client(c) => task.client_id == c.id,
    }
}

/// Managers may move any task; employees only their own.
pub fn can_update_status(principal: &Principal, task: &Task) -> bool {
    match principal {
        Principal::Employee(e) => e.user_role() == UserRole::Manager || task.is_assigned_to(e.id),
        Principal::Client(_) => false,
    }
}

pub fn ensure_task_visible(principal: &Principal, task: &Task) -> Result<(), DashboardError> {
    if can_view_task(principal, task) {
        Ok(())
    } else {
        Err(DashboardError::forbidden(format!("no access to task {}", task.id)))
    }
}

/// The manager, or the employee with this id.
pub fn ensure_employee_or_manager(
    principal: &Principal,
    employee_id: i64,
) -> Result<(), DashboardError> {
    match principal {
        Principal::Employee(e) if e.id == employee_id || e.user_role() == UserRole::Manager => {
            Ok(())
        }
        _ => Err(DashboardError::forbidden(format!(
            "no access to employee {}",
            employee_id
        ))),
    }
}

/// The manager, or the client with this id.
pub fn ensure_client_or_manager(principal: &Principal, client_id: i64) -> Result<(), DashboardError> {
    match principal {
        Principal::Client(c) if c.id == client_id => Ok(()),
        Principal::Employee(e) if e.user_role() == UserRole::Manager => Ok(()),
        _ => Err(DashboardError::forbidden(format!(
            "no access to client {}",
            client_id
        ))),
    }
}
