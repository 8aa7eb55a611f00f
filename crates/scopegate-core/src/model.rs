//! Scopes and resources.
//!
//! Soft deletion is represented by `deleted_at`; rows are never removed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{AreaId, GroupId, OrganizationId, ResourceId, SpaceId, UserId};

/// Name of the area every space is created with.
pub const GENERAL_AREA_NAME: &str = "General";

/// Kind of scope a membership row is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Space,
    Area,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Space => "space",
            ScopeKind::Area => "area",
        }
    }
}

impl FromStr for ScopeKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "space" => Ok(ScopeKind::Space),
            "area" => Ok(ScopeKind::Area),
            _ => Err(CoreError::UnknownVariant {
                kind: "scope kind",
                value: s.to_string(),
            }),
        }
    }
}

/// A space or an area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScopeId {
    Space(SpaceId),
    Area(AreaId),
}

impl ScopeId {
    pub fn kind(&self) -> ScopeKind {
        match self {
            ScopeId::Space(_) => ScopeKind::Space,
            ScopeId::Area(_) => ScopeKind::Area,
        }
    }

    /// Raw id bytes, as persisted in the `scope_id` column.
    pub fn bytes(&self) -> &[u8] {
        match self {
            ScopeId::Space(id) => id.as_ref(),
            ScopeId::Area(id) => id.as_ref(),
        }
    }
}

impl From<SpaceId> for ScopeId {
    fn from(id: SpaceId) -> Self {
        ScopeId::Space(id)
    }
}

impl From<AreaId> for ScopeId {
    fn from(id: AreaId) -> Self {
        ScopeId::Area(id)
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeId::Space(id) => write!(f, "space:{}", id),
            ScopeId::Area(id) => write!(f, "area:{}", id),
        }
    }
}

/// Top-level scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub organization_id: Option<OrganizationId>,
    pub name: String,
    pub owner_id: UserId,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
}

impl Space {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A scope nested in exactly one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: AreaId,
    pub space_id: SpaceId,
    pub name: String,
    /// The area's creator acts as its owner.
    pub created_by: UserId,
    /// When set, only explicit area memberships grant access.
    pub is_restricted: bool,
    /// The per-space "General" area: cannot be renamed or deleted.
    pub is_general: bool,
    pub created_at: i64,
    pub deleted_at: Option<i64>,
}

impl Area {
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Who besides the owner can see a resource, structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Area,
    Space,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Area => "area",
            Visibility::Space => "space",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "private" => Ok(Visibility::Private),
            "area" => Ok(Visibility::Area),
            "space" => Ok(Visibility::Space),
            _ => Err(CoreError::UnknownVariant {
                kind: "visibility",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Page,
    Document,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Page => "page",
            ResourceKind::Document => "document",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "page" => Ok(ResourceKind::Page),
            "document" => Ok(ResourceKind::Document),
            _ => Err(CoreError::UnknownVariant {
                kind: "resource kind",
                value: s.to_string(),
            }),
        }
    }
}

/// Where a resource lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    /// Pages live in exactly one area.
    Page { area_id: AreaId },
    /// Documents are optionally scoped to a space and reach areas through
    /// explicit area shares.
    Document { space_id: Option<SpaceId> },
}

/// A page or a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub owner_id: UserId,
    pub title: String,
    pub placement: Placement,
    pub visibility: Visibility,
    pub created_at: i64,
    pub updated_at: i64,
    pub deleted_at: Option<i64>,
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self.placement {
            Placement::Page { .. } => ResourceKind::Page,
            Placement::Document { .. } => ResourceKind::Document,
        }
    }

    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// The area a page lives in. `None` for documents.
    pub fn area_id(&self) -> Option<AreaId> {
        match self.placement {
            Placement::Page { area_id } => Some(area_id),
            Placement::Document { .. } => None,
        }
    }

    /// The space a document is scoped to. `None` for pages and unscoped documents.
    pub fn space_id(&self) -> Option<SpaceId> {
        match self.placement {
            Placement::Document { space_id } => space_id,
            Placement::Page { .. } => None,
        }
    }
}

/// A named set of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub organization_id: Option<OrganizationId>,
    pub name: String,
    pub created_at: i64,
}
