use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    GoalReminder,
    LeaderboardChange,
}

/// Insert shape for the durable in-app notification record. Producers create
/// the record before dispatching so the notification list stays correct even
/// when every push delivery fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub reference_id: Option<String>,
    pub actor_id: Option<String>,
}
