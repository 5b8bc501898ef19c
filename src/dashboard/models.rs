use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Job title that grants manager rights.
pub const MANAGER_TITLE: &str = "Manager";

/// Avatar assigned to new employees.
pub const DEFAULT_AVATAR: &str = "https://placehold.co/40x40.png";

// ── Roles ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    Manager,
    Employee,
    Client,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "Manager",
            Self::Employee => "Employee",
            Self::Client => "Client",
        }
    }

    /// Role of an employee account, derived from its job title.
    pub fn for_title(title: &str) -> Self {
        if title == MANAGER_TITLE {
            Self::Manager
        } else {
            Self::Employee
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Manager | Self::Employee)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Manager" => Ok(Self::Manager),
            "Employee" => Ok(Self::Employee),
            "Client" => Ok(Self::Client),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

// ── People ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    /// Job title, e.g. "Designer". "Manager" makes the account a manager.
    pub role: String,
    pub avatar: String,
    pub points: i64,
    pub username: String,
    pub contact_number: Option<String>,
    pub dob: Option<String>,
    pub created_at: String,
}

impl Employee {
    pub fn user_role(&self) -> UserRole {
        UserRole::for_title(&self.role)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub contact_email: String,
    pub username: String,
    pub contact_number: Option<String>,
    pub dob: Option<String>,
    pub created_at: String,
}

/// The signed-in account behind a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Principal {
    Employee(Employee),
    Client(Client),
}

impl Principal {
    pub fn id(&self) -> i64 {
        match self {
            Self::Employee(e) => e.id,
            Self::Client(c) => c.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Employee(e) => &e.name,
            Self::Client(c) => &c.name,
        }
    }

    pub fn role(&self) -> UserRole {
        match self {
            Self::Employee(e) => e.user_role(),
            Self::Client(_) => UserRole::Client,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub role: UserRole,
    pub user: Principal,
    pub expires_at: String,
}

// ── Tasks ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Blocked,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
        TaskStatus::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Blocked => "Blocked",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "In Progress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Blocked" => Ok(Self::Blocked),
            _ => Err(format!("Invalid task status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignee {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub assignees: Vec<Assignee>,
    pub client_id: i64,
    pub client_name: String,
    pub due_date: String,
    pub status: TaskStatus,
    /// 0 while unrated, otherwise 1..=5
    pub rating: i64,
    pub created_by: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    pub fn is_assigned_to(&self, employee_id: i64) -> bool {
        self.assignees.iter().any(|a| a.id == employee_id)
    }

    pub fn assignee_names(&self) -> String {
        join_names(self.assignees.iter().map(|a| a.name.as_str()))
    }
}

/// Join display names the way feed notifications render them.
pub fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub task_id: i64,
    pub author_name: String,
    pub author_role: UserRole,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: Task,
    pub comments: Vec<Comment>,
}

/// Input for creating a task, shared by direct creation and request approval.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assignees: Vec<i64>,
    pub client_id: i64,
    pub due_date: String,
    pub status: TaskStatus,
}

// ── Requests ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TaskRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl TaskRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl FromStr for TaskRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            _ => Err(format!("Invalid task request status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRequest {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub client_id: i64,
    pub client_name: String,
    pub status: TaskRequestStatus,
    pub task_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ResourceRequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl ResourceRequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Completed => "Completed",
        }
    }

    /// Pending → Approved | Rejected, Approved → Completed.
    pub fn can_transition_to(&self, next: ResourceRequestStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved)
                | (Self::Pending, Self::Rejected)
                | (Self::Approved, Self::Completed)
        )
    }
}

impl FromStr for ResourceRequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Approved" => Ok(Self::Approved),
            "Rejected" => Ok(Self::Rejected),
            "Completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid resource request status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceRequest {
    pub id: i64,
    pub requester_id: i64,
    pub requester_name: String,
    pub item_name: String,
    pub reason: String,
    pub status: ResourceRequestStatus,
    pub due_date: Option<String>,
    pub assigned_to_id: Option<i64>,
    pub created_at: String,
}

// ── Reports and feed ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    pub date: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    Notification,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Notification => "notification",
        }
    }
}

impl FromStr for MessageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(Self::Chat),
            "notification" => Ok(Self::Notification),
            _ => Err(format!("Invalid message kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub author_id: i64,
    pub content: String,
    pub task_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedView {
    pub messages: Vec<Message>,
    pub employees: Vec<Employee>,
}

// ── API view types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeDetail {
    #[serde(flatten)]
    pub employee: Employee,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientOverview {
    pub client: Client,
    pub tasks: Vec<Task>,
    pub requests: Vec<TaskRequest>,
}
