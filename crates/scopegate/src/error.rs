//! Error types for the Engine.

use scopegate_access::AccessError;
use scopegate_core::{AreaId, CoreError, Permission, ResourceId, UserId};
use scopegate_store::StoreError;
use thiserror::Error;

/// Errors that can occur during Engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A value was rejected before touching the store.
    #[error("invalid input: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Access resolution or grant management error.
    #[error("access error: {0}")]
    Access(#[from] AccessError),

    /// The target of an operation does not exist or is deleted.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The General area of a space cannot be renamed or deleted.
    #[error("area {0} is the General area of its space")]
    ProtectedArea(AreaId),

    /// The user lacks the required permission.
    #[error("user {user} lacks {required} on resource {resource}")]
    NotAuthorized {
        user: UserId,
        resource: ResourceId,
        required: Permission,
    },

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Classify a failure from a lifecycle change set.
    pub(crate) fn from_apply(err: StoreError) -> Self {
        EngineError::Access(AccessError::from_apply(err))
    }

    /// True if re-reading and retrying may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Access(e) if e.is_conflict())
    }
}

/// Result type for Engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
