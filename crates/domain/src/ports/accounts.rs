use crate::DomainResult;
use crate::account::{AccountFilter, AccountRecord, Partition};

pub trait AccountStore: Send + Sync {
    fn get_account(
        &self,
        partition: Partition,
        id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<AccountRecord>>>;

    fn list_accounts(
        &self,
        partition: Partition,
        filter: Option<AccountFilter>,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<AccountRecord>>>;

    /// Removes only the named tokens from the account's device list. The
    /// store must not replace the whole array against a possibly-changed
    /// remote state; concurrent registrations on the same account must
    /// survive a prune.
    fn remove_device_registrations(
        &self,
        partition: Partition,
        id: &str,
        tokens: &[String],
    ) -> crate::ports::BoxFuture<'_, DomainResult<()>>;

    fn clear_legacy_token(
        &self,
        partition: Partition,
        id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<()>>;
}
