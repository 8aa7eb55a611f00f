//! Principals: who a membership or share row grants something to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{GroupId, UserId};

/// A user or a group.
///
/// Persisted rows carry two nullable columns; [`Principal::from_columns`] is
/// the only way back from that shape and enforces that exactly one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Principal {
    User(UserId),
    Group(GroupId),
}

/// Discriminant of a [`Principal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    User,
    Group,
}

impl Principal {
    /// Rebuild a principal from the persisted `(user_id, group_id)` columns.
    pub fn from_columns(user: Option<UserId>, group: Option<GroupId>) -> Result<Self> {
        match (user, group) {
            (Some(user), None) => Ok(Principal::User(user)),
            (None, Some(group)) => Ok(Principal::Group(group)),
            (user, group) => Err(CoreError::PrincipalXor {
                user: user.is_some(),
                group: group.is_some(),
            }),
        }
    }

    /// Split into the persisted `(user_id, group_id)` columns.
    pub fn to_columns(&self) -> (Option<UserId>, Option<GroupId>) {
        match self {
            Principal::User(user) => (Some(*user), None),
            Principal::Group(group) => (None, Some(*group)),
        }
    }

    pub fn kind(&self) -> PrincipalKind {
        match self {
            Principal::User(_) => PrincipalKind::User,
            Principal::Group(_) => PrincipalKind::Group,
        }
    }

    pub fn as_user(&self) -> Option<&UserId> {
        match self {
            Principal::User(user) => Some(user),
            Principal::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&GroupId> {
        match self {
            Principal::Group(group) => Some(group),
            Principal::User(_) => None,
        }
    }
}

impl From<UserId> for Principal {
    fn from(user: UserId) -> Self {
        Principal::User(user)
    }
}

impl From<GroupId> for Principal {
    fn from(group: GroupId) -> Self {
        Principal::Group(group)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Principal::User(user) => write!(f, "user:{}", user),
            Principal::Group(group) => write!(f, "group:{}", group),
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "group",
        })
    }
}
