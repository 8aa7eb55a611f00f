//! Resolution outcomes.

use std::fmt;

use serde::{Deserialize, Serialize};

use scopegate_core::{Permission, ScopeGrant};

/// The authorization path that produced a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessSource {
    /// The user owns the resource, or created the scope.
    Owner,
    /// A membership row for the user on the scope.
    Membership,
    /// A membership row for one of the user's groups.
    Group,
    /// Non-guest access to the parent space of an unrestricted area.
    Inherited,
    /// A share row for the user on a private resource.
    DirectShare,
    /// A share row for one of the user's groups on a private resource.
    GroupShare,
    /// The user owns the space a space-visible page lives in.
    SpaceOwner,
    /// Any access to the space of a space-visible document.
    SpaceMember,
    /// Access to an area a document is shared into.
    AreaShare,
}

impl AccessSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessSource::Owner => "owner",
            AccessSource::Membership => "membership",
            AccessSource::Group => "group",
            AccessSource::Inherited => "inherited",
            AccessSource::DirectShare => "direct_share",
            AccessSource::GroupShare => "group_share",
            AccessSource::SpaceOwner => "space_owner",
            AccessSource::SpaceMember => "space_member",
            AccessSource::AreaShare => "area_share",
        }
    }
}

impl fmt::Display for AccessSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a user's access to a space or area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeAccess {
    pub granted: bool,
    pub role: Option<ScopeGrant>,
    pub source: Option<AccessSource>,
}

impl ScopeAccess {
    pub fn denied() -> Self {
        Self {
            granted: false,
            role: None,
            source: None,
        }
    }

    pub fn granted(role: ScopeGrant, source: AccessSource) -> Self {
        Self {
            granted: true,
            role: Some(role),
            source: Some(source),
        }
    }

    /// Resource permission this access implies, if granted.
    pub fn permission(&self) -> Option<Permission> {
        self.role.filter(|_| self.granted).map(|r| r.to_permission())
    }
}

/// Outcome of resolving a user's access to a page or document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceAccess {
    pub granted: bool,
    pub permission: Option<Permission>,
    pub source: Option<AccessSource>,
}

impl ResourceAccess {
    pub fn denied() -> Self {
        Self {
            granted: false,
            permission: None,
            source: None,
        }
    }

    pub fn granted(permission: Permission, source: AccessSource) -> Self {
        Self {
            granted: true,
            permission: Some(permission),
            source: Some(source),
        }
    }

    /// Whether this access is at least `required`.
    pub fn allows(&self, required: Permission) -> bool {
        self.granted && self.permission.is_some_and(|p| p.allows(required))
    }

    /// Keep whichever of two candidates carries the higher permission.
    ///
    /// Ties keep `self`, so callers feed candidates in precedence order.
    pub(crate) fn or_better(self, other: ResourceAccess) -> ResourceAccess {
        match (self.permission, other.permission) {
            (_, None) => self,
            (None, Some(_)) => other,
            (Some(current), Some(candidate)) if candidate > current => other,
            _ => self,
        }
    }
}

/// Answer to "may this user act on this resource at this level?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allowed: bool,
    pub required: Permission,
    pub access: ResourceAccess,
}

impl Decision {
    pub fn new(access: ResourceAccess, required: Permission) -> Self {
        Self {
            allowed: access.allows(required),
            required,
            access,
        }
    }
}
