//! Error types for Scopegate Core.

use thiserror::Error;

/// Errors raised while constructing or validating core values.
///
/// These are all caller errors: they are detected before any store is
/// consulted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An identifier did not have the expected shape.
    #[error("malformed {kind} id: {value:?}")]
    MalformedId { kind: &'static str, value: String },

    /// A membership or share row referenced both a user and a group, or neither.
    #[error("row must reference exactly one of user or group (user set: {user}, group set: {group})")]
    PrincipalXor { user: bool, group: bool },

    /// A role that is not valid for the scope kind it was written to.
    #[error("role {role} is not valid on a {scope}")]
    InvalidRole {
        role: &'static str,
        scope: &'static str,
    },

    /// A scope or resource name failed validation.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A stored or parsed enum discriminant was not recognised.
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant { kind: &'static str, value: String },
}

impl CoreError {
    /// True for errors that represent a write-time conflict with the data
    /// model's invariants rather than a malformed input.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::PrincipalXor { .. } | CoreError::InvalidRole { .. })
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
