use crate::DomainResult;
use crate::presence::{PresenceFlag, PresenceKey};

pub trait PresenceStore: Send + Sync {
    fn get_presence(
        &self,
        key: &PresenceKey,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<PresenceFlag>>>;
}
