//! Brands in House: role-based operations dashboard back-end.
//!
//! ## Overview
//!
//! Managers assign tasks to employees against client projects, employees
//! move their tasks through the status lifecycle and file daily reports,
//! and clients follow progress and request new work. Every lifecycle step
//! (task created, request approved, status moved, task transferred, task
//! rated, resource request decided) writes a notification into the shared
//! team feed, and every change is pushed to connected staff over a
//! WebSocket.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │  (SPA)   │ <─────── │    └─ api/  (handlers, AppState, AuthUser)       │
//! └──────────┘ WebSocket│         │                                        │
//!                       │         │ access::*  (role checks)               │
//!                       │         v                                        │
//!                       │  db/  (DashboardDb via DbHandle::call)           │
//!                       │         │                                        │
//!                       │         │ notify::*  (feed text)                 │
//!                       │         v                                        │
//!                       │  ws.rs  (WsMessage, broadcast_message)           │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module     | Responsibility                                           |
//! |------------|----------------------------------------------------------|
//! | `models`   | Records: `Employee`, `Client`, `Task`, `Message`, ...    |
//! | `auth`     | Salted password digests, session tokens, bearer parsing  |
//! | `validate` | Required-text and `YYYY-MM-DD` date checks               |
//! | `stats`    | Manager/employee dashboards and the performance report   |
//!
//! ## Typical Request Flow (approve a client request)
//!
//! 1. `POST /api/task-requests/{id}/approve` → `api::requests::approve_task_request`
//! 2. `access::require_manager` checks the session's principal.
//! 3. `DashboardDb::approve_request` creates the task, writes the
//!    notification and marks the request approved in one transaction.
//! 4. The handler broadcasts `TaskRequestUpdated`, `TaskCreated` and
//!    `FeedMessage` to WebSocket subscribers.

pub mod access;
pub mod api;
pub mod auth;
pub mod db;
pub mod models;
pub mod notify;
pub mod server;
pub mod stats;
pub mod validate;
pub mod ws;
