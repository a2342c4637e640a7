use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::account::{AccountRecord, Partition};
use crate::event::{ChatChannel, ChatMessageEvent, ComplaintSnapshot, NewsSnapshot, NoticeSnapshot};

pub const ANDROID_CHANNEL_ID: &str = "srscs_high_importance";
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

const MAX_BODY_LENGTH: usize = 100;
const TRUNCATED_BODY_LENGTH: usize = 97;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum PushPriority {
    Normal,
    High,
    Max,
}

impl PushPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Max => "max",
        }
    }
}

/// Client-platform presentation hints carried alongside every message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlatformHints {
    pub android_channel_id: String,
    pub sound: String,
    pub badge: u32,
}

impl Default for PlatformHints {
    fn default() -> Self {
        Self {
            android_channel_id: ANDROID_CHANNEL_ID.to_string(),
            sound: "default".to_string(),
            badge: 1,
        }
    }
}

/// A fully composed push message. `data` always carries a `type`
/// discriminator and the ids the client needs to deep-link; it never
/// carries secrets or whole account records.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
    pub priority: PushPriority,
    pub hints: PlatformHints,
}

impl PushNotification {
    fn new(title: impl Into<String>, body: impl Into<String>, priority: PushPriority) -> Self {
        let mut data = BTreeMap::new();
        data.insert("click_action".to_string(), CLICK_ACTION.to_string());
        Self {
            title: title.into(),
            body: body.into(),
            data,
            priority,
            hints: PlatformHints::default(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

/// Free-text bodies longer than 100 characters are cut to the first 97
/// plus an ellipsis marker, so the output never exceeds 100.
pub fn truncate_message(text: &str) -> String {
    if text.chars().count() <= MAX_BODY_LENGTH {
        return text.to_string();
    }
    let mut out: String = text.chars().take(TRUNCATED_BODY_LENGTH).collect();
    out.push_str("...");
    out
}

pub fn complaint_status(complaint_id: &str, after: &ComplaintSnapshot) -> PushNotification {
    let complaint_type = after.complaint_type_or_default();
    let (title, body, priority) = match after.status.as_str() {
        "underReview" => (
            "👀 Complaint Under Review".to_string(),
            format!("Your {complaint_type} complaint is now being reviewed by authorities"),
            PushPriority::Normal,
        ),
        "inProgress" => (
            "🔧 Work in Progress".to_string(),
            format!("Great news! Work has started on your {complaint_type} complaint"),
            PushPriority::High,
        ),
        "resolved" => (
            "✅ Complaint Resolved".to_string(),
            format!("Excellent! Your {complaint_type} complaint has been successfully resolved"),
            PushPriority::High,
        ),
        "rejected" => (
            "❌ Complaint Rejected".to_string(),
            format!("Your {complaint_type} complaint was rejected. Tap to view details"),
            PushPriority::High,
        ),
        other => (
            "📋 Complaint Update".to_string(),
            format!("Your complaint status has been updated to {other}"),
            PushPriority::Normal,
        ),
    };

    PushNotification::new(title, body, priority)
        .with("type", "complaint_status")
        .with("complaintId", complaint_id)
        .with("status", after.status.clone())
}

pub fn new_complaint(complaint_id: &str, snapshot: &ComplaintSnapshot) -> PushNotification {
    let complaint_type = snapshot.complaint_type_or_default();
    let priority_field = snapshot.priority_or_default();
    let priority = if priority_field == "high" {
        PushPriority::High
    } else {
        PushPriority::Normal
    };

    PushNotification::new(
        "📋 New Complaint Received",
        format!("{complaint_type} complaint at {}", snapshot.area_or_default()),
        priority,
    )
    .with("type", "new_complaint")
    .with("complaintId", complaint_id)
    .with("complaintType", complaint_type)
    .with("priority", priority_field)
}

pub fn task_assigned(complaint_id: &str, after: &ComplaintSnapshot) -> PushNotification {
    let complaint_type = after.complaint_type_or_default();
    let priority_field = after.priority_or_default();
    let priority = if priority_field == "high" {
        PushPriority::High
    } else {
        PushPriority::Normal
    };

    PushNotification::new(
        "🔧 New Task Assigned",
        format!("{complaint_type} at {}", after.area_or_default()),
        priority,
    )
    .with("type", "task_assigned")
    .with("complaintId", complaint_id)
    .with("complaintType", complaint_type)
    .with("priority", priority_field)
}

pub fn urgent_notice(notice_id: &str, snapshot: &NoticeSnapshot) -> PushNotification {
    let (emoji, title, priority) = match snapshot.notice_type.as_str() {
        "emergency" => ("🚨", "EMERGENCY ALERT", PushPriority::Max),
        "warning" => ("⚠️", "WARNING", PushPriority::High),
        _ => ("📢", "NOTICE", PushPriority::Normal),
    };

    PushNotification::new(format!("{emoji} {title}"), snapshot.title.clone(), priority)
        .with("type", "urgent_notice")
        .with("noticeId", notice_id)
        .with("noticeType", snapshot.notice_type.clone())
}

pub fn news_alert(news_id: &str, snapshot: &NewsSnapshot) -> PushNotification {
    PushNotification::new("📰 Important News", snapshot.title.clone(), PushPriority::Normal)
        .with("type", "news")
        .with("newsId", news_id)
}

/// Admin wrote; notify the user or contractor side of the conversation.
pub fn chat_to_peer(msg: &ChatMessageEvent) -> PushNotification {
    let base = PushNotification::new(
        "💬 New Message from Admin",
        truncate_message(&msg.text),
        PushPriority::High,
    )
    .with("messageId", msg.message_id.clone());

    match msg.channel {
        ChatChannel::Citizen => base
            .with("type", "admin_chat_message")
            .with("userId", msg.conversation_id.clone()),
        ChatChannel::Contractor => base
            .with("type", "admin_contractor_chat_message")
            .with("contractorId", msg.conversation_id.clone()),
    }
}

/// User or contractor wrote; notify all admins, titled with the sender's
/// display name when we could resolve one.
pub fn chat_to_admins(msg: &ChatMessageEvent, sender: Option<&AccountRecord>) -> PushNotification {
    let sender_name = sender
        .and_then(|account| account.name.clone())
        .unwrap_or_else(
            || match (sender.map(|account| account.partition), msg.channel) {
                (Some(Partition::Citizen), _) => "A citizen".to_string(),
                (Some(Partition::Contractor), _) => "A contractor".to_string(),
                (None, ChatChannel::Contractor) => "A contractor".to_string(),
                _ => "A user".to_string(),
            },
        );

    let base = PushNotification::new(
        format!("💬 New Message from {sender_name}"),
        truncate_message(&msg.text),
        PushPriority::High,
    )
    .with("messageId", msg.message_id.clone());

    match msg.channel {
        ChatChannel::Citizen => {
            let user_type = sender
                .map(|account| account.partition.label())
                .unwrap_or("user");
            base.with("type", "user_chat_message")
                .with("userId", msg.conversation_id.clone())
                .with("userType", user_type)
        }
        ChatChannel::Contractor => base
            .with("type", "contractor_chat_message")
            .with("contractorId", msg.conversation_id.clone()),
    }
}
