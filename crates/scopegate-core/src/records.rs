//! Grant rows: memberships, shares, area shares and context references.

use serde::{Deserialize, Serialize};

use crate::ids::{AreaId, ResourceId, UserId};
use crate::model::ScopeId;
use crate::principal::Principal;
use crate::role::{Permission, Role};

/// A principal's role on a space or an area. Unique per (scope, principal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub scope: ScopeId,
    pub principal: Principal,
    pub role: Role,
    pub invited_by: Option<UserId>,
    pub created_at: i64,
}

/// An explicit permission on a private resource. Unique per (resource, principal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceShare {
    pub resource_id: ResourceId,
    pub principal: Principal,
    pub permission: Permission,
    pub shared_by: UserId,
    pub shared_at: i64,
}

/// A document shared into an area. Unique per (document, area).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaDocumentShare {
    pub document_id: ResourceId,
    pub area_id: AreaId,
    pub shared_by: UserId,
    pub shared_at: i64,
    pub notifications_sent: bool,
}

/// A document marked active in an area's context list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRef {
    pub area_id: AreaId,
    pub document_id: ResourceId,
    pub added_by: UserId,
    pub added_at: i64,
}
