use serde::{Deserialize, Serialize};

use crate::DomainResult;
use crate::compose::PushNotification;

/// Per-token failure classification reported by the transport.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SendErrorClass {
    /// The registration no longer exists on the push service.
    Unregistered,
    /// The token is structurally malformed.
    InvalidToken,
    /// The push service was temporarily unreachable or throttling.
    Unavailable,
    /// Any other transport-side error.
    Internal,
}

impl SendErrorClass {
    /// Permanent classes make the registration eligible for pruning;
    /// everything else is left in place.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Unregistered | Self::InvalidToken)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendResult {
    pub success: bool,
    pub error: Option<SendErrorClass>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MulticastResponse {
    pub success_count: usize,
    pub failure_count: usize,
    /// One entry per input token, same order.
    pub responses: Vec<SendResult>,
}

pub trait PushTransport: Send + Sync {
    fn send_multicast(
        &self,
        tokens: &[String],
        notification: &PushNotification,
    ) -> crate::ports::BoxFuture<'_, DomainResult<MulticastResponse>>;

    /// Broadcast to a named subscription channel. Unaddressed: yields an
    /// ack id but no per-token outcome.
    fn send_to_channel(
        &self,
        channel: &str,
        notification: &PushNotification,
    ) -> crate::ports::BoxFuture<'_, DomainResult<String>>;

    /// Validation-only send. `None` means the token is deliverable.
    fn send_dry_run(
        &self,
        token: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<SendErrorClass>>>;
}
