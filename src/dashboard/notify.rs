//! Text of the notification messages posted to the team feed.
//!
//! The feed renders the author's name in front of each entry, so every
//! message starts with a verb: `<author> created a new task "...".`

use super::models::TaskStatus;

pub fn task_created(title: &str, assignees: &str) -> String {
    format!("created a new task \"{}\" and assigned it to {}.", title, assignees)
}

pub fn request_approved(title: &str, assignees: &str) -> String {
    format!("approved request \"{}\" and assigned it to {}.", title, assignees)
}

pub fn status_changed(title: &str, from: TaskStatus, to: TaskStatus) -> String {
    format!("moved \"{}\" from {} to {}.", title, from, to)
}

pub fn task_transferred(title: &str, assignees: &str) -> String {
    format!("transferred \"{}\" to {}.", title, assignees)
}

pub fn task_rated(title: &str, rating: i64) -> String {
    format!("rated \"{}\" {}/5.", title, rating)
}

pub fn resource_approved(item: &str, requester: &str) -> String {
    format!("approved resource request \"{}\" for {}.", item, requester)
}

pub fn resource_rejected(item: &str, requester: &str) -> String {
    format!("rejected resource request \"{}\" for {}.", item, requester)
}
