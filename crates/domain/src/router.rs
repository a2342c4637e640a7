use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::DomainResult;
use crate::account::Partition;
use crate::compose;
use crate::dispatch::{DeliveryOutcome, Dispatcher, TokenRoster};
use crate::event::{
    ChatChannel, ChatMessageEvent, ComplaintSnapshot, NewsSnapshot, NoticeSnapshot,
    NotificationEvent,
};
use crate::ports::accounts::AccountStore;
use crate::ports::presence::PresenceStore;
use crate::ports::push::PushTransport;
use crate::prefs::{self, PreferenceCategory};
use crate::presence::{PresenceKey, PresenceSuppressor};
use crate::reconcile::TokenReconciler;
use crate::resolve::{RecipientResolver, RecipientSpec};

pub const URGENT_NOTICE_CHANNEL: &str = "urgent_notices";
const NEWS_PRIORITY_THRESHOLD: i64 = 5;

/// Why a unit of work ended without a dispatch. All of these are the
/// normal majority path, not errors.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    StatusUnchanged,
    AssigneeUnchanged,
    NoAssignee,
    BelowThreshold,
    RecipientNotFound,
    PreferenceOptOut,
    ViewerPresent,
    NoDevices,
    NoEligibleRecipients,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusUnchanged => "status_unchanged",
            Self::AssigneeUnchanged => "assignee_unchanged",
            Self::NoAssignee => "no_assignee",
            Self::BelowThreshold => "below_threshold",
            Self::RecipientNotFound => "recipient_not_found",
            Self::PreferenceOptOut => "preference_opt_out",
            Self::ViewerPresent => "viewer_present",
            Self::NoDevices => "no_devices",
            Self::NoEligibleRecipients => "no_eligible_recipients",
        }
    }
}

/// Terminal result of one category's unit of work.
#[derive(Clone, Debug, PartialEq)]
pub enum RouterOutcome {
    Skipped(SkipReason),
    Delivered {
        outcome: DeliveryOutcome,
        pruned: usize,
    },
    /// Channel broadcast; unaddressed, so nothing to reconcile.
    Broadcast { channel: String, ack: String },
    /// A collaborator failed; logged and swallowed, never retried here.
    Failed(String),
}

/// Orchestrates resolve → preference filter → presence check → compose →
/// dispatch → reconcile for each supported category. Stateless across
/// invocations; every event only acts on the snapshots it was handed.
#[derive(Clone)]
pub struct NotificationRouter {
    resolver: RecipientResolver,
    suppressor: PresenceSuppressor,
    dispatcher: Dispatcher,
    reconciler: TokenReconciler,
}

impl NotificationRouter {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        presence: Arc<dyn PresenceStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            resolver: RecipientResolver::new(accounts.clone()),
            suppressor: PresenceSuppressor::new(presence),
            dispatcher: Dispatcher::new(transport.clone()),
            reconciler: TokenReconciler::new(accounts, transport),
        }
    }

    /// Entry point per change-feed invocation. A complaint update fans out
    /// to both update-triggered categories, everything else maps to one.
    /// Failures never propagate to the caller; the event source owns any
    /// redelivery policy.
    pub async fn handle(&self, event: &NotificationEvent) -> Vec<RouterOutcome> {
        match event {
            NotificationEvent::ComplaintUpdated {
                complaint_id,
                before,
                after,
            } => {
                vec![
                    self.run(
                        "complaint_status",
                        self.on_status_change(complaint_id, before, after),
                    )
                    .await,
                    self.run(
                        "complaint_assigned",
                        self.on_assignment(complaint_id, before, after),
                    )
                    .await,
                ]
            }
            NotificationEvent::ComplaintCreated {
                complaint_id,
                snapshot,
            } => {
                vec![
                    self.run("complaint_created", self.on_complaint_created(complaint_id, snapshot))
                        .await,
                ]
            }
            NotificationEvent::NoticeCreated {
                notice_id,
                snapshot,
            } => {
                vec![
                    self.run("urgent_notice", self.on_urgent_notice(notice_id, snapshot))
                        .await,
                ]
            }
            NotificationEvent::NewsCreated { news_id, snapshot } => {
                vec![
                    self.run("high_priority_news", self.on_news_created(news_id, snapshot))
                        .await,
                ]
            }
            NotificationEvent::ChatMessage(msg) => {
                vec![self.run("chat_message", self.on_chat_message(msg)).await]
            }
        }
    }

    async fn run(
        &self,
        category: &'static str,
        unit: impl Future<Output = DomainResult<RouterOutcome>>,
    ) -> RouterOutcome {
        match unit.await {
            Ok(RouterOutcome::Skipped(reason)) => {
                info!(category, reason = reason.as_str(), "notification skipped");
                RouterOutcome::Skipped(reason)
            }
            Ok(outcome) => outcome,
            Err(err) => {
                error!(category, error = %err, "notification unit of work failed");
                RouterOutcome::Failed(err.to_string())
            }
        }
    }

    async fn on_status_change(
        &self,
        complaint_id: &str,
        before: &ComplaintSnapshot,
        after: &ComplaintSnapshot,
    ) -> DomainResult<RouterOutcome> {
        if before.status == after.status {
            return Ok(RouterOutcome::Skipped(SkipReason::StatusUnchanged));
        }

        let Some(account) = self
            .resolver
            .find_in(&Partition::LOOKUP_ORDER, &after.user_id)
            .await?
        else {
            return Ok(RouterOutcome::Skipped(SkipReason::RecipientNotFound));
        };

        if !prefs::is_allowed(
            account.notification_preferences.as_ref(),
            PreferenceCategory::ComplaintUpdates,
        ) {
            return Ok(RouterOutcome::Skipped(SkipReason::PreferenceOptOut));
        }

        let roster = TokenRoster::from_account(&account);
        if roster.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::NoDevices));
        }

        let notification = compose::complaint_status(complaint_id, after);
        self.deliver(roster, notification).await
    }

    async fn on_assignment(
        &self,
        complaint_id: &str,
        before: &ComplaintSnapshot,
        after: &ComplaintSnapshot,
    ) -> DomainResult<RouterOutcome> {
        if before.assigned_to == after.assigned_to {
            return Ok(RouterOutcome::Skipped(SkipReason::AssigneeUnchanged));
        }
        let Some(contractor_id) = after.assigned_to.as_deref().filter(|id| !id.is_empty()) else {
            return Ok(RouterOutcome::Skipped(SkipReason::NoAssignee));
        };

        let Some(contractor) = self
            .resolver
            .find_in(&[Partition::Contractor], contractor_id)
            .await?
        else {
            return Ok(RouterOutcome::Skipped(SkipReason::RecipientNotFound));
        };

        if !prefs::is_allowed(
            contractor.notification_preferences.as_ref(),
            PreferenceCategory::ComplaintUpdates,
        ) {
            return Ok(RouterOutcome::Skipped(SkipReason::PreferenceOptOut));
        }

        let roster = TokenRoster::from_account(&contractor);
        if roster.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::NoDevices));
        }

        let notification = compose::task_assigned(complaint_id, after);
        self.deliver(roster, notification).await
    }

    async fn on_complaint_created(
        &self,
        complaint_id: &str,
        snapshot: &ComplaintSnapshot,
    ) -> DomainResult<RouterOutcome> {
        let admins = self
            .resolver
            .resolve(&RecipientSpec::AllInRole(Partition::Admin))
            .await?;
        if admins.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::RecipientNotFound));
        }

        let mut roster = TokenRoster::new();
        for admin in &admins {
            if prefs::is_allowed(
                admin.notification_preferences.as_ref(),
                PreferenceCategory::ComplaintUpdates,
            ) {
                roster.push_account(admin);
            }
        }
        if roster.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::NoDevices));
        }

        let notification = compose::new_complaint(complaint_id, snapshot);
        self.deliver(roster, notification).await
    }

    /// Urgent notices go out over an unaddressed channel. Individual
    /// preferences gate whether the broadcast happens at all, not who
    /// receives it; opted-out subscribers still get channel traffic.
    async fn on_urgent_notice(
        &self,
        notice_id: &str,
        snapshot: &NoticeSnapshot,
    ) -> DomainResult<RouterOutcome> {
        if snapshot.notice_type != "emergency" && snapshot.notice_type != "warning" {
            return Ok(RouterOutcome::Skipped(SkipReason::BelowThreshold));
        }

        let citizens = self
            .resolver
            .resolve(&RecipientSpec::AllInRole(Partition::Citizen))
            .await?;
        let any_opted_in = citizens.iter().any(|citizen| {
            prefs::is_allowed(
                citizen.notification_preferences.as_ref(),
                PreferenceCategory::UrgentNotices,
            )
        });
        if !any_opted_in {
            return Ok(RouterOutcome::Skipped(SkipReason::NoEligibleRecipients));
        }

        let notification = compose::urgent_notice(notice_id, snapshot);
        let ack = self
            .dispatcher
            .broadcast(URGENT_NOTICE_CHANNEL, &notification)
            .await?;
        info!(notice_id, channel = URGENT_NOTICE_CHANNEL, "urgent notice broadcast");
        Ok(RouterOutcome::Broadcast {
            channel: URGENT_NOTICE_CHANNEL.to_string(),
            ack,
        })
    }

    async fn on_chat_message(&self, msg: &ChatMessageEvent) -> DomainResult<RouterOutcome> {
        if msg.from_admin {
            self.notify_chat_peer(msg).await
        } else {
            self.notify_admins_of_chat(msg).await
        }
    }

    /// Admin wrote: notify the user/contractor side, unless they are
    /// looking at the chat right now.
    async fn notify_chat_peer(&self, msg: &ChatMessageEvent) -> DomainResult<RouterOutcome> {
        let (partitions, presence_key): (&[Partition], PresenceKey) = match msg.channel {
            ChatChannel::Citizen => (
                &[Partition::Citizen, Partition::Contractor],
                PresenceKey::UserChat {
                    user_id: msg.conversation_id.clone(),
                },
            ),
            ChatChannel::Contractor => (
                &[Partition::Contractor],
                PresenceKey::ContractorChat {
                    contractor_id: msg.conversation_id.clone(),
                },
            ),
        };

        let Some(account) = self.resolver.find_in(partitions, &msg.conversation_id).await? else {
            return Ok(RouterOutcome::Skipped(SkipReason::RecipientNotFound));
        };

        if !prefs::is_allowed(
            account.notification_preferences.as_ref(),
            PreferenceCategory::ChatMessages,
        ) {
            return Ok(RouterOutcome::Skipped(SkipReason::PreferenceOptOut));
        }

        if self.suppressor.should_suppress(&presence_key).await? {
            return Ok(RouterOutcome::Skipped(SkipReason::ViewerPresent));
        }

        let roster = TokenRoster::from_account(&account);
        if roster.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::NoDevices));
        }

        let notification = compose::chat_to_peer(msg);
        self.deliver(roster, notification).await
    }

    /// User or contractor wrote: notify every admin, unless an admin has
    /// this conversation open.
    async fn notify_admins_of_chat(&self, msg: &ChatMessageEvent) -> DomainResult<RouterOutcome> {
        let sender_partitions: &[Partition] = match msg.channel {
            ChatChannel::Citizen => &[Partition::Citizen, Partition::Contractor],
            ChatChannel::Contractor => &[Partition::Contractor],
        };
        let sender = self
            .resolver
            .find_in(sender_partitions, &msg.conversation_id)
            .await?;

        let presence_key = PresenceKey::AdminChat {
            peer_id: msg.conversation_id.clone(),
        };
        if self.suppressor.should_suppress(&presence_key).await? {
            return Ok(RouterOutcome::Skipped(SkipReason::ViewerPresent));
        }

        let admins = self
            .resolver
            .resolve(&RecipientSpec::AllInRole(Partition::Admin))
            .await?;
        if admins.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::RecipientNotFound));
        }

        let mut roster = TokenRoster::new();
        for admin in &admins {
            if prefs::is_allowed(
                admin.notification_preferences.as_ref(),
                PreferenceCategory::ChatMessages,
            ) {
                roster.push_account(admin);
            }
        }
        if roster.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::NoDevices));
        }

        let notification = compose::chat_to_admins(msg, sender.as_ref());
        self.deliver(roster, notification).await
    }

    async fn on_news_created(
        &self,
        news_id: &str,
        snapshot: &NewsSnapshot,
    ) -> DomainResult<RouterOutcome> {
        if snapshot.priority < NEWS_PRIORITY_THRESHOLD {
            return Ok(RouterOutcome::Skipped(SkipReason::BelowThreshold));
        }

        let citizens = self
            .resolver
            .resolve(&RecipientSpec::AllInRole(Partition::Citizen))
            .await?;
        let subscribed: Vec<_> = citizens
            .iter()
            .filter(|citizen| {
                prefs::is_allowed(
                    citizen.notification_preferences.as_ref(),
                    PreferenceCategory::NewsAlerts,
                )
            })
            .collect();
        if subscribed.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::NoEligibleRecipients));
        }

        let mut roster = TokenRoster::new();
        for citizen in subscribed {
            roster.push_account(citizen);
        }
        if roster.is_empty() {
            return Ok(RouterOutcome::Skipped(SkipReason::NoDevices));
        }

        let notification = compose::news_alert(news_id, snapshot);
        self.deliver(roster, notification).await
    }

    async fn deliver(
        &self,
        roster: TokenRoster,
        notification: compose::PushNotification,
    ) -> DomainResult<RouterOutcome> {
        let outcome = self.dispatcher.dispatch(&roster, &notification).await?;
        let pruned = if outcome.failure_count > 0 {
            self.reconciler.prune(&roster, &outcome).await?
        } else {
            0
        };
        info!(
            devices = roster.len(),
            success = outcome.success_count,
            failed = outcome.failure_count,
            pruned,
            "notification dispatched"
        );
        Ok(RouterOutcome::Delivered { outcome, pruned })
    }
}
