//! Scope access resolution.
//!
//! Answers "what role does this user hold on this space or area, and why".
//! Precedence, first match wins:
//!
//! 1. Missing or soft-deleted scope: not granted
//! 2. Scope owner (space owner, area creator): `owner`
//! 3. Explicit membership, direct or through a group; the higher role wins
//!    and a tie goes to the direct row
//! 4. Areas only: unrestricted area plus non-guest access to a live parent
//!    space: `inherited`

use std::sync::Arc;

use async_trait::async_trait;

use scopegate_core::{AreaId, Principal, Role, ScopeGrant, ScopeId, SpaceId, UserId};
use scopegate_store::{Store, StoreExt};

use crate::decision::{AccessSource, ScopeAccess};
use crate::error::Result;
use crate::groups::GroupExpansion;

/// The narrow view of scope resolution that resource policies depend on.
#[async_trait]
pub trait ScopeAccessResolver: Send + Sync {
    async fn resolve_scope_access(&self, user_id: &UserId, scope: &ScopeId) -> Result<ScopeAccess>;
}

#[async_trait]
impl<T: ScopeAccessResolver + ?Sized> ScopeAccessResolver for Arc<T> {
    async fn resolve_scope_access(&self, user_id: &UserId, scope: &ScopeId) -> Result<ScopeAccess> {
        (**self).resolve_scope_access(user_id, scope).await
    }
}

/// Store-backed scope resolver.
pub struct ScopeResolver<S> {
    store: Arc<S>,
    groups: GroupExpansion<S>,
}

impl<S: Store> ScopeResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            groups: GroupExpansion::new(Arc::clone(&store)),
            store,
        }
    }

    /// Resolve access to a space.
    pub async fn resolve_space(&self, user_id: &UserId, space_id: &SpaceId) -> Result<ScopeAccess> {
        let Some(space) = self.store.live_space(space_id).await? else {
            return Ok(ScopeAccess::denied());
        };

        if space.owner_id == *user_id {
            return Ok(ScopeAccess::granted(
                ScopeGrant::Role(Role::Owner),
                AccessSource::Owner,
            ));
        }

        Ok(self
            .explicit_role(user_id, ScopeId::Space(*space_id))
            .await?
            .unwrap_or_else(ScopeAccess::denied))
    }

    /// Resolve access to an area.
    pub async fn resolve_area(&self, user_id: &UserId, area_id: &AreaId) -> Result<ScopeAccess> {
        let Some(area) = self.store.live_area(area_id).await? else {
            return Ok(ScopeAccess::denied());
        };

        if area.created_by == *user_id {
            return Ok(ScopeAccess::granted(
                ScopeGrant::Role(Role::Owner),
                AccessSource::Owner,
            ));
        }

        if let Some(access) = self.explicit_role(user_id, ScopeId::Area(*area_id)).await? {
            return Ok(access);
        }

        if area.is_restricted {
            return Ok(ScopeAccess::denied());
        }

        // Guest space access never reaches into areas
        let parent = self.resolve_space(user_id, &area.space_id).await?;
        match parent.role {
            Some(ScopeGrant::Role(role)) if parent.granted && role > Role::Guest => Ok(
                ScopeAccess::granted(ScopeGrant::Inherited, AccessSource::Inherited),
            ),
            _ => Ok(ScopeAccess::denied()),
        }
    }

    /// Best explicit membership for the user on `scope`.
    async fn explicit_role(&self, user_id: &UserId, scope: ScopeId) -> Result<Option<ScopeAccess>> {
        let direct = self
            .store
            .get_membership(&scope, &Principal::User(*user_id))
            .await?
            .map(|m| m.role);

        let groups = self.groups.groups_for(user_id).await?;
        let via_group = self
            .store
            .group_memberships(&scope, &groups)
            .await?
            .into_iter()
            .map(|m| m.role)
            .max();

        let best = match (direct, via_group) {
            (Some(d), Some(g)) if g > d => Some((g, AccessSource::Group)),
            (Some(d), _) => Some((d, AccessSource::Membership)),
            (None, Some(g)) => Some((g, AccessSource::Group)),
            (None, None) => None,
        };

        Ok(best.map(|(role, source)| ScopeAccess::granted(ScopeGrant::Role(role), source)))
    }
}

#[async_trait]
impl<S: Store> ScopeAccessResolver for ScopeResolver<S> {
    async fn resolve_scope_access(&self, user_id: &UserId, scope: &ScopeId) -> Result<ScopeAccess> {
        let access = match scope {
            ScopeId::Space(space_id) => self.resolve_space(user_id, space_id).await?,
            ScopeId::Area(area_id) => self.resolve_area(user_id, area_id).await?,
        };

        tracing::debug!(
            user = %user_id,
            scope = %scope,
            granted = access.granted,
            role = ?access.role,
            source = ?access.source,
            "resolved scope access"
        );
        Ok(access)
    }
}
