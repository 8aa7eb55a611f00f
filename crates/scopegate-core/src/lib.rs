//! # Scopegate Core
//!
//! Pure types for the Scopegate access-resolution engine: identifiers,
//! principals, roles, permissions, scopes and resources.
//!
//! This crate contains no I/O, no storage, no async. It is the vocabulary the
//! store, the resolvers and the engine share.
//!
//! ## Key Types
//!
//! - [`Principal`] - A user or a group; exactly one, never both
//! - [`Role`] - Scope-level level, totally ordered for tie-breaking
//! - [`Permission`] - Resource-level level, derived from roles or shares
//! - [`ScopeId`] - A space or an area
//! - [`Resource`] - A page or a document with a [`Visibility`]
//!
//! ## Hierarchy
//!
//! ```text
//! Organization ─▶ Space ─▶ Area ─▶ Page
//!                   └──────────────▶ Document ──(area shares)──▶ Area
//! ```

pub mod error;
pub mod ids;
pub mod model;
pub mod principal;
pub mod records;
pub mod role;
pub mod validation;

pub use error::{CoreError, Result};
pub use ids::{AreaId, GroupId, OrganizationId, ResourceId, SpaceId, UserId, ID_HEX_LEN, ID_LEN};
pub use model::{
    Area, Group, Placement, Resource, ResourceKind, ScopeId, ScopeKind, Space, Visibility,
    GENERAL_AREA_NAME,
};
pub use principal::{Principal, PrincipalKind};
pub use records::{AreaDocumentShare, ContextRef, Membership, ResourceShare};
pub use role::{Permission, Role, ScopeGrant};
pub use validation::{validate_area_name, validate_name, MAX_NAME_LEN};

/// Get current time in milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
