use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("account store error: {0}")]
    Store(String),
    #[error("presence store error: {0}")]
    Presence(String),
    #[error("push transport error: {0}")]
    Transport(String),
}
