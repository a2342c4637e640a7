use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Account partitions, in the order single-user lookups scan them.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    Citizen,
    Contractor,
    Admin,
}

impl Partition {
    pub const LOOKUP_ORDER: [Partition; 3] =
        [Partition::Citizen, Partition::Contractor, Partition::Admin];

    pub fn collection(&self) -> &'static str {
        match self {
            Self::Citizen => "citizens",
            Self::Contractor => "contractors",
            Self::Admin => "admins",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Citizen => "citizen",
            Self::Contractor => "contractor",
            Self::Admin => "admin",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRegistration {
    pub token: String,
    pub added_at_ms: i64,
    pub platform: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountRecord {
    pub id: String,
    pub partition: Partition,
    pub name: Option<String>,
    /// Keyed by preference category; absent map or absent key falls back to
    /// the category default.
    pub notification_preferences: Option<HashMap<String, bool>>,
    pub device_registrations: Vec<DeviceRegistration>,
    /// Pre-multi-device token field, kept only so the scheduled sweep can
    /// retire it. Live delivery never reads this.
    pub legacy_token: Option<String>,
}

impl AccountRecord {
    /// Tokens eligible for multicast, in registration order. Entries with an
    /// empty token string are skipped.
    pub fn push_tokens(&self) -> Vec<String> {
        self.device_registrations
            .iter()
            .filter(|reg| !reg.token.is_empty())
            .map(|reg| reg.token.clone())
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountFilter {
    HasLegacyToken,
}
