//! Audit events.
//!
//! The engine reports every committed change to an [`AuditSink`]. Recording
//! is fire-and-forget: a sink cannot fail an operation, and persisting the
//! trail is the sink's business.

use serde::{Deserialize, Serialize};

use scopegate_access::VisibilityChange;
use scopegate_core::{
    AreaId, GroupId, Permission, Principal, ResourceId, ResourceKind, Role, ScopeId, SpaceId,
    UserId,
};

/// A committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Milliseconds since the epoch.
    pub at: i64,
    /// Who asked for the change, when known.
    pub actor: Option<UserId>,
    pub action: AuditAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction {
    SpaceCreated {
        space_id: SpaceId,
        general_area_id: AreaId,
    },
    SpaceDeleted {
        space_id: SpaceId,
        areas_deleted: usize,
        context_pruned: usize,
    },
    AreaCreated {
        area_id: AreaId,
        space_id: SpaceId,
    },
    AreaRenamed {
        area_id: AreaId,
        name: String,
    },
    AreaRestrictionChanged {
        area_id: AreaId,
        is_restricted: bool,
    },
    AreaDeleted {
        area_id: AreaId,
        context_pruned: usize,
    },
    ResourceCreated {
        resource_id: ResourceId,
        kind: ResourceKind,
    },
    ResourceDeleted {
        resource_id: ResourceId,
        context_pruned: usize,
    },
    VisibilityChanged {
        resource_id: ResourceId,
        change: VisibilityChange,
    },
    Shared {
        resource_id: ResourceId,
        principal: Principal,
        permission: Permission,
    },
    Unshared {
        resource_id: ResourceId,
        principal: Principal,
    },
    SharedWithArea {
        document_id: ResourceId,
        area_id: AreaId,
    },
    UnsharedFromArea {
        document_id: ResourceId,
        area_id: AreaId,
    },
    MemberAdded {
        scope: ScopeId,
        principal: Principal,
        role: Role,
    },
    RoleChanged {
        scope: ScopeId,
        principal: Principal,
        role: Role,
    },
    MemberRemoved {
        scope: ScopeId,
        principal: Principal,
    },
    GroupCreated {
        group_id: GroupId,
    },
    GroupMemberAdded {
        group_id: GroupId,
        user_id: UserId,
    },
    GroupMemberRemoved {
        group_id: GroupId,
        user_id: UserId,
    },
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Emits events as `tracing` records on the `scopegate::audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "scopegate::audit", event = %json, "audit"),
            Err(e) => tracing::warn!(target: "scopegate::audit", error = %e, ?event, "audit event not serializable"),
        }
    }
}
