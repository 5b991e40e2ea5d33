use thiserror::Error;

use crate::domain::negotiation::NegotiationStatus;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("invalid negotiation config: {0}")]
    InvalidNegotiationConfig(String),
}

/// Precondition failures rejected before any state mutation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("negotiation `{0}` was not found")]
    NegotiationNotFound(String),
    #[error("user `{user_id}` is not authorized for negotiation `{negotiation_id}`")]
    Unauthorized { negotiation_id: String, user_id: String },
    #[error("negotiation `{negotiation_id}` is already closed with status {status:?}")]
    NegotiationClosed { negotiation_id: String, status: NegotiationStatus },
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Whether the caller can retry the same request unchanged and expect it
    /// to possibly succeed. Only infrastructure failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Integration(_))
    }
}
