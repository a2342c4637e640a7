pub mod account;
pub mod compose;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod ports;
pub mod prefs;
pub mod presence;
pub mod reconcile;
pub mod resolve;
pub mod router;

pub type DomainResult<T> = Result<T, error::DomainError>;
