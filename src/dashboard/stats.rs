//! Dashboard aggregates computed from task snapshots.
//!
//! Nothing here touches the database: handlers load the tasks and
//! employees, then fold them into these views.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::models::{Client, Employee, Task, TaskStatus};
use super::validate::DATE_FORMAT;

const RECENT_COMPLETED_LIMIT: usize = 5;
const DUE_SOON_DAYS: u64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusCount {
    pub status: TaskStatus,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerDashboard {
    pub today: String,
    pub total_tasks: usize,
    pub status_counts: Vec<StatusCount>,
    pub blocked: Vec<Task>,
    pub due_today: Vec<Task>,
    pub recent_completed: Vec<Task>,
    pub pending_task_requests: usize,
    pub pending_resource_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmployeePerformance {
    pub employee_id: i64,
    pub name: String,
    pub role: String,
    pub assigned: usize,
    pub completed: usize,
    pub average_rating: f64,
    pub points: i64,
}

/// Completed over total tasks for one client account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientProgress {
    pub client_id: i64,
    pub name: String,
    pub completed: usize,
    pub total: usize,
    /// Percentage, 0.0 when the client has no tasks
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub completion_rate: f64,
    pub average_rating: f64,
    pub rated_tasks: usize,
    pub employees: Vec<EmployeePerformance>,
    pub client_progress: Vec<ClientProgress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeDashboard {
    pub employee_id: i64,
    pub total_tasks: usize,
    pub status_counts: Vec<StatusCount>,
    pub completion_rate: f64,
    pub due_soon: Vec<Task>,
}

/// One entry per status, in display order, zeros included.
pub fn count_by_status(tasks: &[Task]) -> Vec<StatusCount> {
    TaskStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            count: tasks.iter().filter(|t| t.status == status).count(),
        })
        .collect()
}

/// Completed tasks as a percentage of all tasks, 0.0 for an empty set.
pub fn completion_rate<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> f64 {
    let (completed, total) = tasks.into_iter().fold((0usize, 0usize), |(done, all), t| {
        (done + usize::from(t.status == TaskStatus::Completed), all + 1)
    });
    if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64 * 100.0
    }
}

/// Mean of the non-zero ratings, 0.0 when nothing is rated.
pub fn average_rating<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> (f64, usize) {
    let ratings: Vec<i64> = tasks
        .into_iter()
        .filter(|t| t.rating > 0)
        .map(|t| t.rating)
        .collect();
    if ratings.is_empty() {
        return (0.0, 0);
    }
    let sum: i64 = ratings.iter().sum();
    (sum as f64 / ratings.len() as f64, ratings.len())
}

pub fn manager_dashboard(
    tasks: &[Task],
    today: &str,
    pending_task_requests: usize,
    pending_resource_requests: usize,
) -> ManagerDashboard {
    let blocked = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Blocked)
        .cloned()
        .collect();
    let due_today = tasks
        .iter()
        .filter(|t| t.due_date == today)
        .cloned()
        .collect();

    let mut completed: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .collect();
    completed.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
    let recent_completed = completed
        .into_iter()
        .take(RECENT_COMPLETED_LIMIT)
        .cloned()
        .collect();

    ManagerDashboard {
        today: today.to_string(),
        total_tasks: tasks.len(),
        status_counts: count_by_status(tasks),
        blocked,
        due_today,
        recent_completed,
        pending_task_requests,
        pending_resource_requests,
    }
}

pub fn performance_report(
    tasks: &[Task],
    employees: &[Employee],
    clients: &[Client],
) -> PerformanceReport {
    let (average, rated) = average_rating(tasks);
    let completed_tasks = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let employees = employees
        .iter()
        .map(|e| {
            let assigned: Vec<&Task> = tasks.iter().filter(|t| t.is_assigned_to(e.id)).collect();
            let completed = assigned
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count();
            let (average_rating, _) = average_rating(assigned.iter().copied());
            EmployeePerformance {
                employee_id: e.id,
                name: e.name.clone(),
                role: e.role.clone(),
                assigned: assigned.len(),
                completed,
                average_rating,
                points: e.points,
            }
        })
        .collect();
    let client_progress = clients
        .iter()
        .map(|c| {
            let own: Vec<&Task> = tasks.iter().filter(|t| t.client_id == c.id).collect();
            ClientProgress {
                client_id: c.id,
                name: c.name.clone(),
                completed: own
                    .iter()
                    .filter(|t| t.status == TaskStatus::Completed)
                    .count(),
                total: own.len(),
                progress: completion_rate(own.iter().copied()),
            }
        })
        .collect();

    PerformanceReport {
        total_tasks: tasks.len(),
        completed_tasks,
        completion_rate: completion_rate(tasks),
        average_rating: average,
        rated_tasks: rated,
        employees,
        client_progress,
    }
}

/// `tasks` should already be limited to the employee's assignments.
/// Due-soon covers open tasks due from today through the next seven days.
pub fn employee_dashboard(employee_id: i64, tasks: &[Task], today: &str) -> EmployeeDashboard {
    let horizon = NaiveDate::parse_from_str(today, DATE_FORMAT)
        .ok()
        .and_then(|d| d.checked_add_days(Days::new(DUE_SOON_DAYS)))
        .map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| today.to_string());

    let mut due_soon: Vec<Task> = tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Completed)
        .filter(|t| t.due_date.as_str() >= today && t.due_date.as_str() <= horizon.as_str())
        .cloned()
        .collect();
    due_soon.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.id.cmp(&b.id)));

    EmployeeDashboard {
        employee_id,
        total_tasks: tasks.len(),
        status_counts: count_by_status(tasks),
        completion_rate: completion_rate(tasks),
        due_soon,
    }
}
