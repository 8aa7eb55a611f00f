//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: an engine over a memory store
//! with one space, and an audit sink that keeps what it is given.

use std::sync::{Arc, Mutex};

use scopegate::{AuditAction, AuditEvent, AuditSink, Engine, EngineConfig, Result};
use scopegate_core::{
    Area, GroupId, Permission, Principal, Resource, ResourceId, Role, ScopeId, Space, UserId,
    Visibility,
};
use scopegate_store::MemoryStore;

/// An audit sink that records every event in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first.
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.events().into_iter().map(|e| e.action).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// A space owned by a fresh user, reached through an engine over a memory
/// store.
pub struct TestWorld {
    pub engine: Engine<MemoryStore>,
    pub audit: Arc<RecordingAuditSink>,
    pub owner: UserId,
    pub space: Space,
    pub general: Area,
}

impl TestWorld {
    pub async fn new() -> Result<Self> {
        let audit = Arc::new(RecordingAuditSink::new());
        let engine = Engine::new(MemoryStore::new(), EngineConfig::default())
            .with_audit_sink(audit.clone());
        let owner = UserId::generate();
        let (space, general) = engine.create_space(owner, "Test Space", None).await?;

        Ok(Self {
            engine,
            audit,
            owner,
            space,
            general,
        })
    }

    /// A non-general area created by the space owner.
    pub async fn area(&self, name: &str, is_restricted: bool) -> Result<Area> {
        self.engine
            .create_area(&self.space.id, name, self.owner, is_restricted)
            .await
    }

    /// A fresh user holding `role` on the space.
    pub async fn space_member(&self, role: Role) -> Result<UserId> {
        let user = UserId::generate();
        self.grant(ScopeId::Space(self.space.id), user, role).await?;
        Ok(user)
    }

    /// A fresh user holding `role` on the area.
    pub async fn area_member(&self, area: &Area, role: Role) -> Result<UserId> {
        let user = UserId::generate();
        self.grant(ScopeId::Area(area.id), user, role).await?;
        Ok(user)
    }

    /// Give a user or group a role on a scope.
    pub async fn grant(
        &self,
        scope: impl Into<ScopeId>,
        principal: impl Into<Principal>,
        role: Role,
    ) -> Result<()> {
        self.engine
            .add_member(scope.into(), principal.into(), role, Some(self.owner))
            .await?;
        Ok(())
    }

    /// A group holding exactly the given users.
    pub async fn group_of(&self, members: &[UserId]) -> Result<GroupId> {
        let group = self.engine.create_group("Test Group", None).await?;
        for user in members {
            self.engine.add_group_member(&group.id, *user).await?;
        }
        Ok(group.id)
    }

    pub async fn page(&self, area: &Area, owner: UserId, visibility: Visibility) -> Result<Resource> {
        self.engine
            .create_page(&area.id, owner, "Test Page", visibility)
            .await
    }

    /// A document scoped to the world's space.
    pub async fn document(&self, owner: UserId, visibility: Visibility) -> Result<Resource> {
        self.engine
            .create_document(Some(self.space.id), owner, "Test Document", visibility)
            .await
    }

    /// The permission a user resolves to, or `None` when denied.
    pub async fn permission(&self, user: &UserId, resource: &ResourceId) -> Result<Option<Permission>> {
        let access = self.engine.resolve_resource_access(user, resource).await?;
        Ok(access.permission.filter(|_| access.granted))
    }
}
