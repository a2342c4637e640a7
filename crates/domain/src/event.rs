use serde::{Deserialize, Serialize};

/// Watched fields of a complaint document. Update-triggered categories
/// receive a before/after pair of these; create-triggered ones a single
/// snapshot.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ComplaintSnapshot {
    pub user_id: String,
    pub status: String,
    pub complaint_type: Option<String>,
    pub area: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<String>,
}

impl ComplaintSnapshot {
    pub fn complaint_type_or_default(&self) -> &str {
        self.complaint_type.as_deref().unwrap_or("complaint")
    }

    pub fn area_or_default(&self) -> &str {
        self.area.as_deref().unwrap_or("Unknown area")
    }

    pub fn priority_or_default(&self) -> &str {
        self.priority.as_deref().unwrap_or("normal")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NoticeSnapshot {
    pub notice_type: String,
    pub title: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewsSnapshot {
    pub title: String,
    pub priority: i64,
}

/// Which chat tree the message landed in. The citizen channel also serves
/// users that turn out to live in the contractor partition; the contractor
/// channel is contractor-only.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatChannel {
    Citizen,
    Contractor,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ChatMessageEvent {
    /// The non-admin side of the conversation: a user id or contractor id.
    pub conversation_id: String,
    pub message_id: String,
    pub text: String,
    /// Sender direction flag set by the client: true means an admin wrote
    /// the message, so the user side gets notified, and vice versa.
    pub from_admin: bool,
    pub channel: ChatChannel,
}

/// One change-feed invocation. Constructed per event, never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub enum NotificationEvent {
    ComplaintCreated {
        complaint_id: String,
        snapshot: ComplaintSnapshot,
    },
    ComplaintUpdated {
        complaint_id: String,
        before: ComplaintSnapshot,
        after: ComplaintSnapshot,
    },
    NoticeCreated {
        notice_id: String,
        snapshot: NoticeSnapshot,
    },
    NewsCreated {
        news_id: String,
        snapshot: NewsSnapshot,
    },
    ChatMessage(ChatMessageEvent),
}
