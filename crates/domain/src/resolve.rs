use std::sync::Arc;

use crate::DomainResult;
use crate::account::{AccountFilter, AccountRecord, Partition};
use crate::ports::accounts::AccountStore;

/// Logical description of who should receive a notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecipientSpec {
    /// One account, searched across partitions in lookup order; first
    /// match wins.
    SingleUser { id: String },
    /// Every account in one partition.
    AllInRole(Partition),
    /// One partition, restricted by a store-side filter.
    RoleFilteredBy {
        partition: Partition,
        filter: AccountFilter,
    },
}

/// Read-only account locator shared by every category handler. "Nobody
/// matched" is an empty list, never an error.
#[derive(Clone)]
pub struct RecipientResolver {
    accounts: Arc<dyn AccountStore>,
}

impl RecipientResolver {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    pub async fn resolve(&self, spec: &RecipientSpec) -> DomainResult<Vec<AccountRecord>> {
        match spec {
            RecipientSpec::SingleUser { id } => {
                let found = self.find_in(&Partition::LOOKUP_ORDER, id).await?;
                Ok(found.into_iter().collect())
            }
            RecipientSpec::AllInRole(partition) => {
                self.accounts.list_accounts(*partition, None).await
            }
            RecipientSpec::RoleFilteredBy { partition, filter } => {
                self.accounts.list_accounts(*partition, Some(*filter)).await
            }
        }
    }

    /// At most one lookup per candidate partition, stopping at the first
    /// hit. Chat recipients use a narrowed partition list.
    pub async fn find_in(
        &self,
        partitions: &[Partition],
        id: &str,
    ) -> DomainResult<Option<AccountRecord>> {
        for partition in partitions {
            if let Some(account) = self.accounts.get_account(*partition, id).await? {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }
}
