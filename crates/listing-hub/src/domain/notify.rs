use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyStatus {
    Unsent,
    Sent,
}

impl NotifyStatus {
    pub fn label(&self) -> &'static str {
        match self {
            NotifyStatus::Unsent => "unsent",
            NotifyStatus::Sent => "sent",
        }
    }
}

/// Outbox row describing one pending subscriber notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notify {
    pub id: i64,
    pub flat_id: i64,
    pub house_id: i64,
    pub recipient_mail: String,
    pub status: NotifyStatus,
}

impl Notify {
    pub fn message(&self) -> String {
        format!(
            "New flat with number {} in house {}!",
            self.flat_id, self.house_id
        )
    }
}
