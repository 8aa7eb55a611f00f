//! # Scopegate Store
//!
//! Storage abstraction for Scopegate. Provides a trait-based interface for
//! scopes, resources, memberships, shares and area context, with SQLite and
//! in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`ChangeSet`] - Guards plus mutations, applied atomically
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scopegate_core::{now_millis, Space, SpaceId, UserId};
//! use scopegate_store::{ChangeSet, Mutation, SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("scopegate.db").unwrap();
//!
//!     let space = Space {
//!         id: SpaceId::generate(),
//!         organization_id: None,
//!         name: "Engineering".into(),
//!         owner_id: UserId::generate(),
//!         created_at: now_millis(),
//!         deleted_at: None,
//!     };
//!     store
//!         .apply(ChangeSet::new().push(Mutation::InsertSpace(space)))
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Single write path**: every write is a [`ChangeSet`]; guards and
//!   mutations run in one transaction
//! - **Soft deletes**: spaces, areas and resources keep their rows with a
//!   `deleted_at` stamp; lookups return them and callers decide
//! - **Principal XOR**: membership and share rows hold exactly one of a user
//!   or a group, enforced by CHECK constraints and by [`scopegate_core::Principal`]

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, DEFAULT_BUSY_TIMEOUT};
pub use traits::{ApplyReport, ChangeSet, Guard, Mutation, Store, StoreExt};
