use std::collections::HashMap;
use std::sync::Arc;

use srscs_domain::DomainResult;
use srscs_domain::account::{AccountFilter, AccountRecord, Partition};
use srscs_domain::compose::PushNotification;
use srscs_domain::ports::BoxFuture;
use srscs_domain::ports::accounts::AccountStore;
use srscs_domain::ports::presence::PresenceStore;
use srscs_domain::ports::push::{MulticastResponse, PushTransport, SendErrorClass, SendResult};
use srscs_domain::presence::{PresenceFlag, PresenceKey};
use tokio::sync::RwLock;

/// Memory-backed account store for local runs and tests. The production
/// account store lives outside this service and is reached through the
/// same port.
#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<RwLock<HashMap<(Partition, String), AccountRecord>>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert(&self, account: AccountRecord) {
        self.accounts
            .write()
            .await
            .insert((account.partition, account.id.clone()), account);
    }

    pub async fn get(&self, partition: Partition, id: &str) -> Option<AccountRecord> {
        self.accounts
            .read()
            .await
            .get(&(partition, id.to_string()))
            .cloned()
    }
}

impl AccountStore for InMemoryAccountStore {
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
        Box::pin(async move {
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

#[derive(Default, Clone)]
pub struct InMemoryPresenceStore {
    flags: Arc<RwLock<HashMap<String, PresenceFlag>>>,
}

impl InMemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: &PresenceKey, flag: PresenceFlag) {
        self.flags.write().await.insert(key.storage_key(), flag);
    }

    pub async fn clear(&self, key: &PresenceKey) {
        self.flags.write().await.remove(&key.storage_key());
    }
}

impl PresenceStore for InMemoryPresenceStore {
    fn get_presence(
        &self,
        key: &PresenceKey,
    ) -> BoxFuture<'_, DomainResult<Option<PresenceFlag>>> {
        let key = key.storage_key();
        let flags = self.flags.clone();
        Box::pin(async move { Ok(flags.read().await.get(&key).cloned()) })
    }
}

/// Transport for the `memory` backend: accepts everything, records what it
/// was asked to send.
#[derive(Default, Clone)]
pub struct InMemoryPushTransport {
    pub sent: Arc<RwLock<Vec<(Vec<String>, PushNotification)>>>,
    pub channel_sends: Arc<RwLock<Vec<(String, PushNotification)>>>,
}

impl InMemoryPushTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PushTransport for InMemoryPushTransport {
    fn send_multicast(
        &self,
        tokens: &[String],
        notification: &PushNotification,
    ) -> BoxFuture<'_, DomainResult<MulticastResponse>> {
        let tokens = tokens.to_vec();
        let notification = notification.clone();
        let sent = self.sent.clone();
        Box::pin(async move {
            let count = tokens.len();
            sent.write().await.push((tokens, notification));
            Ok(MulticastResponse {
                success_count: count,
                failure_count: 0,
                responses: vec![
                    SendResult {
                        success: true,
                        error: None,
                    };
                    count
                ],
            })
        })
    }

    fn send_to_channel(
        &self,
        channel: &str,
        notification: &PushNotification,
    ) -> BoxFuture<'_, DomainResult<String>> {
        let channel = channel.to_string();
        let notification = notification.clone();
        let channel_sends = self.channel_sends.clone();
        Box::pin(async move {
            channel_sends
                .write()
                .await
                .push((channel.clone(), notification));
            Ok(format!("memory://{channel}"))
        })
    }

    fn send_dry_run(&self, _token: &str) -> BoxFuture<'_, DomainResult<Option<SendErrorClass>>> {
        Box::pin(async { Ok(None) })
    }
}
