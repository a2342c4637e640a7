use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::account::{AccountRecord, Partition};
use crate::compose::PushNotification;
use crate::ports::push::PushTransport;

/// Ordered delivery targets for one multicast. Each entry remembers the
/// account that owns the token so per-index failures can be reconciled
/// even when the roster spans several accounts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TokenRoster {
    entries: Vec<RosterEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RosterEntry {
    pub partition: Partition,
    pub account_id: String,
    pub token: String,
}

impl TokenRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_account(account: &AccountRecord) -> Self {
        let mut roster = Self::new();
        roster.push_account(account);
        roster
    }

    pub fn push_account(&mut self, account: &AccountRecord) {
        for token in account.push_tokens() {
            self.entries.push(RosterEntry {
                partition: account.partition,
                account_id: account.id.clone(),
                token,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.token.clone()).collect()
    }

    pub fn entry(&self, index: usize) -> Option<&RosterEntry> {
        self.entries.get(index)
    }
}

/// Result of one dispatch attempt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// The resolved token list, in send order.
    pub tokens: Vec<String>,
    pub success_count: usize,
    pub failure_count: usize,
    /// Indices into `tokens` whose failures the transport classified as
    /// permanently dead. Transient failures appear only in the counts.
    pub invalid_indices: Vec<usize>,
}

impl DeliveryOutcome {
    pub fn empty() -> Self {
        Self {
            tokens: vec![],
            success_count: 0,
            failure_count: 0,
            invalid_indices: vec![],
        }
    }
}

/// One best-effort multicast attempt, no retry.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn PushTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self { transport }
    }

    pub async fn dispatch(
        &self,
        roster: &TokenRoster,
        notification: &PushNotification,
    ) -> DomainResult<DeliveryOutcome> {
        if roster.is_empty() {
            return Ok(DeliveryOutcome::empty());
        }

        let tokens = roster.tokens();
        let response = self.transport.send_multicast(&tokens, notification).await?;

        let invalid_indices: Vec<usize> = response
            .responses
            .iter()
            .enumerate()
            .filter(|(_, result)| {
                !result.success && result.error.is_some_and(|class| class.is_permanent())
            })
            .map(|(index, _)| index)
            .collect();

        Ok(DeliveryOutcome {
            tokens,
            success_count: response.success_count,
            failure_count: response.failure_count,
            invalid_indices,
        })
    }

    pub async fn broadcast(
        &self,
        channel: &str,
        notification: &PushNotification,
    ) -> DomainResult<String> {
        self.transport.send_to_channel(channel, notification).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::DeviceRegistration;
    use crate::compose;
    use crate::event::{NewsSnapshot, NoticeSnapshot};
    use crate::ports::BoxFuture;
    use crate::ports::push::{MulticastResponse, SendErrorClass, SendResult};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    /// Scripted transport: answers from a canned per-token result map and
    /// counts calls.
    #[derive(Default)]
    struct MockTransport {
        dead_tokens: RwLock<Vec<String>>,
        multicast_calls: AtomicUsize,
    }

    impl MockTransport {
        async fn mark_dead(&self, token: &str) {
            self.dead_tokens.write().await.push(token.to_string());
        }
    }

    impl PushTransport for MockTransport {
        fn send_multicast(
            &self,
            tokens: &[String],
            _notification: &PushNotification,
        ) -> BoxFuture<'_, DomainResult<MulticastResponse>> {
            self.multicast_calls.fetch_add(1, Ordering::SeqCst);
            let tokens = tokens.to_vec();
            Box::pin(async move {
                let dead = self.dead_tokens.read().await;
                let responses: Vec<SendResult> = tokens
                    .iter()
                    .map(|token| {
                        if dead.contains(token) {
                            SendResult {
                                success: false,
                                error: Some(SendErrorClass::Unregistered),
                            }
                        } else if token.starts_with("flaky") {
                            SendResult {
                                success: false,
                                error: Some(SendErrorClass::Unavailable),
                            }
                        } else {
                            SendResult {
                                success: true,
                                error: None,
                            }
                        }
                    })
                    .collect();
                let success_count = responses.iter().filter(|r| r.success).count();
                Ok(MulticastResponse {
                    success_count,
                    failure_count: responses.len() - success_count,
                    responses,
                })
            })
        }

        fn send_to_channel(
            &self,
            channel: &str,
            _notification: &PushNotification,
        ) -> BoxFuture<'_, DomainResult<String>> {
            let ack = format!("projects/demo/messages/{channel}");
            Box::pin(async move { Ok(ack) })
        }

        fn send_dry_run(
            &self,
            _token: &str,
        ) -> BoxFuture<'_, DomainResult<Option<SendErrorClass>>> {
            Box::pin(async { Ok(None) })
        }
    }

    fn account_with_tokens(id: &str, tokens: &[&str]) -> AccountRecord {
        AccountRecord {
            id: id.to_string(),
            partition: Partition::Citizen,
            name: None,
            notification_preferences: None,
            device_registrations: tokens
                .iter()
                .map(|token| DeviceRegistration {
                    token: token.to_string(),
                    added_at_ms: 0,
                    platform: "android".to_string(),
                })
                .collect(),
            legacy_token: None,
        }
    }

    fn sample_notification() -> PushNotification {
        compose::news_alert(
            "n1",
            &NewsSnapshot {
                title: "headline".to_string(),
                priority: 5,
            },
        )
    }

    #[tokio::test]
    async fn empty_roster_short_circuits_without_a_send() {
        let transport = Arc::new(MockTransport::default());
        let dispatcher = Dispatcher::new(transport.clone());

        let outcome = dispatcher
            .dispatch(&TokenRoster::new(), &sample_notification())
            .await
            .unwrap();

        assert_eq!(outcome, DeliveryOutcome::empty());
        assert_eq!(transport.multicast_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn permanent_failures_become_invalid_indices() {
        let transport = Arc::new(MockTransport::default());
        transport.mark_dead("tok-dead").await;
        let dispatcher = Dispatcher::new(transport.clone());

        let roster = TokenRoster::from_account(&account_with_tokens(
            "u1",
            &["tok-ok", "tok-dead", "flaky-1", "tok-ok-2"],
        ));
        let outcome = dispatcher
            .dispatch(&roster, &sample_notification())
            .await
            .unwrap();

        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.failure_count, 2);
        // Only the unregistered token, not the transient one.
        assert_eq!(outcome.invalid_indices, vec![1]);
        assert_eq!(transport.multicast_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn roster_preserves_account_ownership_per_index() {
        let mut roster = TokenRoster::from_account(&account_with_tokens("u1", &["a", "b"]));
        roster.push_account(&account_with_tokens("u2", &["c"]));

        assert_eq!(roster.len(), 3);
        assert_eq!(roster.entry(2).unwrap().account_id, "u2");
        assert_eq!(roster.tokens(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn broadcast_returns_transport_ack() {
        let dispatcher = Dispatcher::new(Arc::new(MockTransport::default()));
        let ack = dispatcher
            .broadcast(
                "urgent_notices",
                &compose::urgent_notice(
                    "n1",
                    &NoticeSnapshot {
                        notice_type: "emergency".to_string(),
                        title: "t".to_string(),
                    },
                ),
            )
            .await
            .unwrap();
        assert_eq!(ack, "projects/demo/messages/urgent_notices");
    }
}
