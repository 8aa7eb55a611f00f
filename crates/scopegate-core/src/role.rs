//! Roles (scope level) and permissions (resource level).
//!
//! Both are totally ordered so that ties between several authorization paths
//! resolve deterministically: the higher level wins.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::ScopeKind;

/// Scope-level role.
///
/// Spaces use `owner > admin > member > guest`, areas use
/// `owner > admin > member > viewer`. Both ladders share one ordering;
/// `guest` and `viewer` never appear on the same scope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Guest,
    Viewer,
    Member,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Guest,
        Role::Viewer,
        Role::Member,
        Role::Admin,
        Role::Owner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Viewer => "viewer",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    /// Whether this role may be written to a scope of the given kind.
    pub fn is_valid_for(&self, scope: ScopeKind) -> bool {
        !matches!(
            (scope, self),
            (ScopeKind::Space, Role::Viewer) | (ScopeKind::Area, Role::Guest)
        )
    }

    /// Reject roles that do not belong to the scope kind's ladder.
    pub fn validate_for(&self, scope: ScopeKind) -> Result<()> {
        if self.is_valid_for(scope) {
            Ok(())
        } else {
            Err(CoreError::InvalidRole {
                role: self.as_str(),
                scope: scope.as_str(),
            })
        }
    }

    /// Resource permission implied by holding this role on the containing scope.
    pub fn to_permission(&self) -> Permission {
        match self {
            Role::Owner | Role::Admin | Role::Member => Permission::Editor,
            Role::Viewer | Role::Guest => Permission::Viewer,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "guest" => Ok(Role::Guest),
            "viewer" => Ok(Role::Viewer),
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            _ => Err(CoreError::UnknownVariant {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

/// Resource-level permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Viewer,
    Editor,
    Admin,
}

impl Permission {
    pub const ALL: [Permission; 3] = [Permission::Viewer, Permission::Editor, Permission::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Viewer => "viewer",
            Permission::Editor => "editor",
            Permission::Admin => "admin",
        }
    }

    /// Whether holding `self` is enough to perform an action requiring `required`.
    pub fn allows(&self, required: Permission) -> bool {
        *self >= required
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "viewer" => Ok(Permission::Viewer),
            "editor" => Ok(Permission::Editor),
            "admin" => Ok(Permission::Admin),
            _ => Err(CoreError::UnknownVariant {
                kind: "permission",
                value: s.to_string(),
            }),
        }
    }
}

/// The role a user effectively holds on a scope.
///
/// `Inherited` is only produced for unrestricted areas reached through
/// non-guest access to the parent space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeGrant {
    Role(Role),
    Inherited,
}

impl ScopeGrant {
    pub fn role(&self) -> Option<Role> {
        match self {
            ScopeGrant::Role(role) => Some(*role),
            ScopeGrant::Inherited => None,
        }
    }

    /// Resource permission implied by this grant: `viewer` maps to viewer
    /// (as does `guest`), everything else including inheritance to editor.
    pub fn to_permission(&self) -> Permission {
        match self {
            ScopeGrant::Role(role) => role.to_permission(),
            ScopeGrant::Inherited => Permission::Editor,
        }
    }
}

impl fmt::Display for ScopeGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeGrant::Role(role) => fmt::Display::fmt(role, f),
            ScopeGrant::Inherited => f.write_str("inherited"),
        }
    }
}
