use std::collections::HashMap;

/// Notification categories a recipient can opt in or out of. Storage keys
/// are camelCase because the preference maps are written by the client app.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PreferenceCategory {
    ComplaintUpdates,
    UrgentNotices,
    ChatMessages,
    NewsAlerts,
}

impl PreferenceCategory {
    pub const ALL: [PreferenceCategory; 4] = [
        PreferenceCategory::ComplaintUpdates,
        PreferenceCategory::UrgentNotices,
        PreferenceCategory::ChatMessages,
        PreferenceCategory::NewsAlerts,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Self::ComplaintUpdates => "complaintUpdates",
            Self::UrgentNotices => "urgentNotices",
            Self::ChatMessages => "chatMessages",
            Self::NewsAlerts => "newsAlerts",
        }
    }

    /// Default applied when the key (or the whole map) is absent. News
    /// alerts are the only opt-in category.
    pub fn default_allow(&self) -> bool {
        match self {
            Self::ComplaintUpdates => true,
            Self::UrgentNotices => true,
            Self::ChatMessages => true,
            Self::NewsAlerts => false,
        }
    }
}

/// An explicit value always wins; anything missing degrades to the
/// category default and never blocks processing.
pub fn is_allowed(
    prefs: Option<&HashMap<String, bool>>,
    category: PreferenceCategory,
) -> bool {
    match prefs.and_then(|map| map.get(category.key())) {
        Some(explicit) => *explicit,
        None => category.default_allow(),
    }
}
