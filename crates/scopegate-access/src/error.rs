//! Error types for access resolution and grant management.

use scopegate_core::{CoreError, ResourceId, Visibility};
use scopegate_store::StoreError;
use thiserror::Error;

/// Errors that can occur while resolving access or changing grants.
///
/// Denied access is never an error; resolvers report it as `granted: false`.
#[derive(Debug, Error)]
pub enum AccessError {
    /// A value was rejected by core validation.
    #[error("invalid value: {0}")]
    Core(#[from] CoreError),

    /// Storage error while reading.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The target of a write does not exist or is deleted.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The write conflicts with the current state, including a guard that
    /// stopped matching between read and commit.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Explicit shares can only be created on private resources.
    #[error("resource {resource_id} is {visibility}, shares require private visibility")]
    NotPrivate {
        resource_id: ResourceId,
        visibility: Visibility,
    },

    /// A change set could not be committed.
    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}

impl AccessError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        AccessError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Classify a failure from `Store::apply`.
    pub fn from_apply(err: StoreError) -> Self {
        match err {
            StoreError::PreconditionFailed(msg) | StoreError::Conflict(msg) => {
                AccessError::Conflict(msg)
            }
            StoreError::NotFound { kind, id } => AccessError::NotFound { kind, id },
            StoreError::Core(e) => AccessError::Core(e),
            other => AccessError::TransactionFailed(other.to_string()),
        }
    }

    /// True for errors the caller can resolve by re-reading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, AccessError::Conflict(_))
    }
}

/// Result type for access operations.
pub type Result<T> = std::result::Result<T, AccessError>;
