//! # Scopegate Testkit
//!
//! Testing utilities for Scopegate.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A space with its General area behind an engine over a
//!   memory store, plus an audit sink that records events
//! - **Generators**: Proptest strategies, and [`AccessParams`] describing
//!   every path from one user to one document
//! - **Tracing**: One-call subscriber setup that writes through the test
//!   harness
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use scopegate_testkit::{AccessParams, TestWorld};
//!
//! proptest! {
//!     #[test]
//!     fn resolution_matches_model(params: AccessParams) {
//!         let rt = tokio::runtime::Runtime::new().unwrap();
//!         let resolved = rt.block_on(async {
//!             let world = TestWorld::new().await?;
//!             let (user, doc) = params.build(&world).await?;
//!             world.permission(&user, &doc.id).await
//!         }).unwrap();
//!         prop_assert_eq!(resolved, params.expected_permission());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use scopegate_testkit::TestWorld;
//! use scopegate::{Role, Visibility};
//!
//! let world = TestWorld::new().await?;
//! let member = world.space_member(Role::Member).await?;
//! let page = world.page(&world.general, world.owner, Visibility::Area).await?;
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{RecordingAuditSink, TestWorld};
pub use generators::AccessParams;

/// Install a `tracing` subscriber that writes through the test harness.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}
