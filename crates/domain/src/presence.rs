use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::ports::presence::PresenceStore;

/// Conversation-scoped presence flags. Keys mirror the realtime-database
/// paths the viewer clients write to.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PresenceKey {
    /// Citizen-side flag for their own chat screen.
    UserChat { user_id: String },
    /// Contractor-side flag for the contractor chat screen.
    ContractorChat { contractor_id: String },
    /// Admin-side flag for the chat with the given user or contractor.
    AdminChat { peer_id: String },
}

impl PresenceKey {
    pub fn storage_key(&self) -> String {
        match self {
            Self::UserChat { user_id } => format!("chats/{user_id}/chatStatus"),
            Self::ContractorChat { contractor_id } => {
                format!("contractor_chats/{contractor_id}/chatStatus")
            }
            Self::AdminChat { peer_id } => format!("admin_chat_status/{peer_id}"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceFlag {
    pub is_viewing: bool,
    pub updated_at_ms: i64,
}

/// Skips delivery to a recipient who is already looking at the
/// conversation. Fails open: an absent flag, or any state other than
/// actively viewing, means deliver. The check is not atomic with the
/// viewer closing the screen; an occasional redundant notification is the
/// accepted cost.
#[derive(Clone)]
pub struct PresenceSuppressor {
    presence: Arc<dyn PresenceStore>,
}

impl PresenceSuppressor {
    pub fn new(presence: Arc<dyn PresenceStore>) -> Self {
        Self { presence }
    }

    pub async fn should_suppress(&self, key: &PresenceKey) -> DomainResult<bool> {
        let flag = self.presence.get_presence(key).await?;
        Ok(flag.is_some_and(|flag| flag.is_viewing))
    }
}
