use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::DomainResult;
use crate::account::{AccountFilter, Partition};
use crate::dispatch::{DeliveryOutcome, TokenRoster};
use crate::ports::accounts::AccountStore;
use crate::ports::push::PushTransport;

/// Removes device registrations the dispatcher reported as permanently
/// dead, and retires pre-multi-device legacy tokens on a scheduled sweep.
#[derive(Clone)]
pub struct TokenReconciler {
    accounts: Arc<dyn AccountStore>,
    transport: Arc<dyn PushTransport>,
}

impl TokenReconciler {
    pub fn new(accounts: Arc<dyn AccountStore>, transport: Arc<dyn PushTransport>) -> Self {
        Self { accounts, transport }
    }

    /// Prunes exactly the registrations behind `outcome.invalid_indices`,
    /// grouped into one targeted removal per owning account. Indices the
    /// transport did not flag are never touched; an empty invalid set is a
    /// no-op without a store call.
    pub async fn prune(
        &self,
        roster: &TokenRoster,
        outcome: &DeliveryOutcome,
    ) -> DomainResult<usize> {
        if outcome.invalid_indices.is_empty() {
            return Ok(0);
        }

        let mut by_account: BTreeMap<(Partition, String), Vec<String>> = BTreeMap::new();
        for index in &outcome.invalid_indices {
            let Some(entry) = roster.entry(*index) else {
                continue;
            };
            by_account
                .entry((entry.partition, entry.account_id.clone()))
                .or_default()
                .push(entry.token.clone());
        }

        let mut removed = 0;
        for ((partition, account_id), tokens) in by_account {
            self.accounts
                .remove_device_registrations(partition, &account_id, &tokens)
                .await?;
            info!(
                account_id,
                partition = partition.label(),
                count = tokens.len(),
                "removed invalid device registrations"
            );
            removed += tokens.len();
        }
        Ok(removed)
    }

    /// Daily sweep over accounts still carrying a legacy single-device
    /// token: dry-run each token against the transport and delete the
    /// field when the token is provably dead. Each account's check is
    /// independent; transport hiccups skip the account rather than abort
    /// the sweep.
    pub async fn sweep_legacy_tokens(&self) -> DomainResult<usize> {
        let mut cleared = 0;

        for partition in Partition::LOOKUP_ORDER {
            let holders = self
                .accounts
                .list_accounts(partition, Some(AccountFilter::HasLegacyToken))
                .await?;

            for account in holders {
                let Some(token) = account.legacy_token.as_deref() else {
                    continue;
                };

                match self.transport.send_dry_run(token).await {
                    Ok(None) => {}
                    Ok(Some(class)) if class.is_permanent() => {
                        self.accounts
                            .clear_legacy_token(partition, &account.id)
                            .await?;
                        cleared += 1;
                        info!(
                            account_id = account.id,
                            partition = partition.label(),
                            "removed invalid legacy token"
                        );
                    }
                    Ok(Some(class)) => {
                        debug!(
                            account_id = account.id,
                            class = ?class,
                            "legacy token validation inconclusive, keeping"
                        );
                    }
                    Err(err) => {
                        warn!(
                            account_id = account.id,
                            error = %err,
                            "legacy token dry run failed, skipping account"
                        );
                    }
                }
            }
        }

        info!(cleared, "legacy token sweep complete");
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountRecord, DeviceRegistration};
    use crate::compose::PushNotification;
    use crate::ports::BoxFuture;
    use crate::ports::push::{MulticastResponse, SendErrorClass};
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct MockAccountStore {
        accounts: Arc<RwLock<HashMap<(Partition, String), AccountRecord>>>,
        removals: Arc<RwLock<Vec<(Partition, String, Vec<String>)>>>,
    }

    impl MockAccountStore {
        async fn insert(&self, account: AccountRecord) {
            self.accounts
                .write()
                .await
                .insert((account.partition, account.id.clone()), account);
        }

        async fn get(&self, partition: Partition, id: &str) -> AccountRecord {
            self.accounts
                .read()
                .await
                .get(&(partition, id.to_string()))
                .cloned()
                .unwrap()
        }
    }

    impl AccountStore for MockAccountStore {
        fn get_account(
            &self,
            partition: Partition,
            id: &str,
        ) -> BoxFuture<'_, DomainResult<Option<AccountRecord>>> {
            let id = id.to_string();
            let accounts = self.accounts.clone();
            Box::pin(async move { Ok(accounts.read().await.get(&(partition, id)).cloned()) })
        }

        fn list_accounts(
            &self,
            partition: Partition,
            filter: Option<AccountFilter>,
        ) -> BoxFuture<'_, DomainResult<Vec<AccountRecord>>> {
            let accounts = self.accounts.clone();
            Box::pin(async move {
                let mut output: Vec<AccountRecord> = accounts
                    .read()
                    .await
                    .values()
                    .filter(|account| account.partition == partition)
                    .filter(|account| match filter {
                        Some(AccountFilter::HasLegacyToken) => account.legacy_token.is_some(),
                        None => true,
                    })
                    .cloned()
                    .collect();
                output.sort_by(|a, b| a.id.cmp(&b.id));
                Ok(output)
            })
        }

        fn remove_device_registrations(
            &self,
            partition: Partition,
            id: &str,
            tokens: &[String],
        ) -> BoxFuture<'_, DomainResult<()>> {
            let id = id.to_string();
            let tokens = tokens.to_vec();
            let accounts = self.accounts.clone();
            let removals = self.removals.clone();
            Box::pin(async move {
                removals
                    .write()
                    .await
                    .push((partition, id.clone(), tokens.clone()));
                if let Some(account) = accounts.write().await.get_mut(&(partition, id)) {
                    account
                        .device_registrations
                        .retain(|reg| !tokens.contains(&reg.token));
                }
                Ok(())
            })
        }

        fn clear_legacy_token(
            &self,
            partition: Partition,
            id: &str,
        ) -> BoxFuture<'_, DomainResult<()>> {
            let id = id.to_string();
            let accounts = self.accounts.clone();
            Box::pin(async move {
                if let Some(account) = accounts.write().await.get_mut(&(partition, id)) {
                    account.legacy_token = None;
                }
                Ok(())
            })
        }
    }

    /// Dry-run answers come from a canned token → class map.
    #[derive(Default)]
    struct MockTransport {
        dry_run_classes: Arc<RwLock<HashMap<String, SendErrorClass>>>,
    }

    impl MockTransport {
        async fn script(&self, token: &str, class: SendErrorClass) {
            self.dry_run_classes
                .write()
                .await
                .insert(token.to_string(), class);
        }
    }

    impl PushTransport for MockTransport {
        fn send_multicast(
            &self,
            tokens: &[String],
            _notification: &PushNotification,
        ) -> BoxFuture<'_, DomainResult<MulticastResponse>> {
            let count = tokens.len();
            Box::pin(async move {
                Ok(MulticastResponse {
                    success_count: count,
                    failure_count: 0,
                    responses: vec![],
                })
            })
        }

        fn send_to_channel(
            &self,
            _channel: &str,
            _notification: &PushNotification,
        ) -> BoxFuture<'_, DomainResult<String>> {
            Box::pin(async { Ok("ack".to_string()) })
        }

        fn send_dry_run(
            &self,
            token: &str,
        ) -> BoxFuture<'_, DomainResult<Option<SendErrorClass>>> {
            let token = token.to_string();
            let classes = self.dry_run_classes.clone();
            Box::pin(async move { Ok(classes.read().await.get(&token).copied()) })
        }
    }

    fn account_with_tokens(partition: Partition, id: &str, tokens: &[&str]) -> AccountRecord {
        AccountRecord {
            id: id.to_string(),
            partition,
            name: None,
            notification_preferences: None,
            device_registrations: tokens
                .iter()
                .enumerate()
                .map(|(i, token)| DeviceRegistration {
                    token: token.to_string(),
                    added_at_ms: i as i64,
                    platform: "android".to_string(),
                })
                .collect(),
            legacy_token: None,
        }
    }

    #[tokio::test]
    async fn prune_removes_exactly_the_reported_indices() {
        let store = Arc::new(MockAccountStore::default());
        let account = account_with_tokens(Partition::Citizen, "u1", &["t0", "t1", "t2", "t3"]);
        store.insert(account.clone()).await;

        let reconciler = TokenReconciler::new(store.clone(), Arc::new(MockTransport::default()));
        let roster = TokenRoster::from_account(&account);
        let outcome = DeliveryOutcome {
            tokens: roster.tokens(),
            success_count: 2,
            failure_count: 2,
            invalid_indices: vec![1, 3],
        };

        let removed = reconciler.prune(&roster, &outcome).await.unwrap();
        assert_eq!(removed, 2);

        let after = store.get(Partition::Citizen, "u1").await;
        let remaining: Vec<&str> = after
            .device_registrations
            .iter()
            .map(|reg| reg.token.as_str())
            .collect();
        // Survivors keep their order.
        assert_eq!(remaining, vec!["t0", "t2"]);
    }

    #[tokio::test]
    async fn prune_with_no_invalid_indices_makes_no_store_call() {
        let store = Arc::new(MockAccountStore::default());
        let account = account_with_tokens(Partition::Citizen, "u1", &["t0"]);
        store.insert(account.clone()).await;

        let reconciler = TokenReconciler::new(store.clone(), Arc::new(MockTransport::default()));
        let roster = TokenRoster::from_account(&account);
        let outcome = DeliveryOutcome {
            tokens: roster.tokens(),
            success_count: 0,
            failure_count: 1,
            invalid_indices: vec![],
        };

        assert_eq!(reconciler.prune(&roster, &outcome).await.unwrap(), 0);
        assert!(store.removals.read().await.is_empty());
    }

    #[tokio::test]
    async fn prune_groups_removals_by_owning_account() {
        let store = Arc::new(MockAccountStore::default());
        let first = account_with_tokens(Partition::Admin, "a1", &["a1-t0", "a1-t1"]);
        let second = account_with_tokens(Partition::Admin, "a2", &["a2-t0"]);
        store.insert(first.clone()).await;
        store.insert(second.clone()).await;

        let mut roster = TokenRoster::from_account(&first);
        roster.push_account(&second);
        let outcome = DeliveryOutcome {
            tokens: roster.tokens(),
            success_count: 1,
            failure_count: 2,
            invalid_indices: vec![1, 2],
        };

        let reconciler = TokenReconciler::new(store.clone(), Arc::new(MockTransport::default()));
        assert_eq!(reconciler.prune(&roster, &outcome).await.unwrap(), 2);

        let removals = store.removals.read().await;
        assert_eq!(removals.len(), 2);
        assert!(removals.contains(&(
            Partition::Admin,
            "a1".to_string(),
            vec!["a1-t1".to_string()]
        )));
        assert!(removals.contains(&(
            Partition::Admin,
            "a2".to_string(),
            vec!["a2-t0".to_string()]
        )));
    }

    #[tokio::test]
    async fn sweep_clears_only_provably_dead_legacy_tokens() {
        let store = Arc::new(MockAccountStore::default());
        let transport = Arc::new(MockTransport::default());

        let mut dead = account_with_tokens(Partition::Citizen, "dead", &[]);
        dead.legacy_token = Some("dead-token".to_string());
        let mut flaky = account_with_tokens(Partition::Citizen, "flaky", &[]);
        flaky.legacy_token = Some("flaky-token".to_string());
        let mut healthy = account_with_tokens(Partition::Contractor, "healthy", &[]);
        healthy.legacy_token = Some("live-token".to_string());
        store.insert(dead).await;
        store.insert(flaky).await;
        store.insert(healthy).await;

        transport.script("dead-token", SendErrorClass::Unregistered).await;
        transport.script("flaky-token", SendErrorClass::Unavailable).await;

        let reconciler = TokenReconciler::new(store.clone(), transport);
        let cleared = reconciler.sweep_legacy_tokens().await.unwrap();
        assert_eq!(cleared, 1);

        assert!(store.get(Partition::Citizen, "dead").await.legacy_token.is_none());
        assert!(store.get(Partition::Citizen, "flaky").await.legacy_token.is_some());
        assert!(store
            .get(Partition::Contractor, "healthy")
            .await
            .legacy_token
            .is_some());
    }
}
