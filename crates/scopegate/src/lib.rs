//! # Scopegate
//!
//! The unified API for Scopegate, a hierarchical access-resolution engine
//! for collaborative workspaces.
//!
//! ## Overview
//!
//! Scopegate answers one question: what may this user do with this page or
//! document, and why?
//!
//! - **Spaces** own **Areas**; every space has a protected General area
//! - **Pages** live in one area; **Documents** reach areas through area shares
//! - **Memberships** give users or groups a role on a space or area
//! - **Visibility** (`private`, `area`, `space`) decides which path applies
//! - **Shares** grant explicit permissions on private resources
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scopegate::{Engine, EngineConfig, Permission, UserId, Visibility};
//!
//! async fn example() -> scopegate::Result<()> {
//!     let engine = Engine::open(EngineConfig::default())?;
//!
//!     let owner = UserId::generate();
//!     let (space, general) = engine.create_space(owner, "Research", None).await?;
//!     let page = engine
//!         .create_page(&general.id, owner, "Notes", Visibility::Area)
//!         .await?;
//!
//!     let decision = engine.authorize(&owner, &page.id, Permission::Editor).await?;
//!     assert!(decision.allowed);
//!     # let _ = space;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `scopegate::core` - Identifiers, roles, permissions, resources
//! - `scopegate::store` - Storage abstraction, SQLite and in-memory stores
//! - `scopegate::access` - Resolvers, policies and grant managers

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;

// Re-export component crates
pub use scopegate_access as access;
pub use scopegate_core as core;
pub use scopegate_store as store;

// Re-export main types for convenience
pub use audit::{AuditAction, AuditEvent, AuditSink, NoopAuditSink, TracingAuditSink};
pub use config::{EngineConfig, StoreConfig};
pub use engine::Engine;
pub use error::{EngineError, Result};

pub use scopegate_access::{
    AccessError, AccessSource, Decision, ResourceAccess, ScopeAccess, VisibilityChange,
};
pub use scopegate_core::{
    Area, AreaDocumentShare, AreaId, ContextRef, Group, GroupId, Membership, OrganizationId,
    Permission, Principal, Resource, ResourceId, ResourceKind, ResourceShare, Role, ScopeGrant,
    ScopeId, Space, SpaceId, UserId, Visibility,
};
pub use scopegate_store::{MemoryStore, SqliteStore, Store};
