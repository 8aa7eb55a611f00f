//! # Scopegate Access
//!
//! The access-resolution engine: who can reach which space, area, page or
//! document, at what level, and through which path.
//!
//! ## Key Types
//!
//! - [`ScopeResolver`] - Best role for a user on a space or area
//! - [`ResourceResolver`] - Permission for a user on a page or document
//! - [`ResourcePolicy`] - Per-kind meaning of `area` and `space` visibility
//! - [`ShareManager`] - Explicit shares, area shares, area context, visibility
//! - [`MembershipManager`] - Scope memberships
//!
//! ## Resolution
//!
//! ```text
//! resource ─▶ owner? ─▶ admin
//!    │
//!    ├─ private ─▶ direct share ∨ group share
//!    ├─ area    ─▶ policy: page area role / document area shares
//!    └─ space   ─▶ policy: page space owner / document space member
//! ```
//!
//! Resolution only reads. Denied access is a value (`granted: false`), not
//! an error. Writes go through guarded change sets so a decision made on
//! stale state fails instead of committing.

pub mod decision;
pub mod error;
pub mod groups;
pub mod membership;
pub mod policy;
pub mod resource;
pub mod scope;
pub mod shares;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_support;

pub use decision::{AccessSource, Decision, ResourceAccess, ScopeAccess};
pub use error::{AccessError, Result};
pub use groups::GroupExpansion;
pub use membership::MembershipManager;
pub use policy::{DocumentPolicy, PagePolicy, ResourcePolicy};
pub use resource::ResourceResolver;
pub use scope::{ScopeAccessResolver, ScopeResolver};
pub use shares::ShareManager;
pub use visibility::{plan_visibility_change, VisibilityChange};
