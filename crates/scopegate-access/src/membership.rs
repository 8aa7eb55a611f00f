//! Membership management on spaces and areas.

use std::sync::Arc;

use scopegate_core::{now_millis, Membership, Principal, Role, ScopeId, UserId};
use scopegate_store::{ChangeSet, Guard, Mutation, Store, StoreExt};

use crate::error::{AccessError, Result};

/// Adds, changes and removes scope memberships.
pub struct MembershipManager<S> {
    store: Arc<S>,
}

impl<S> Clone for MembershipManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> MembershipManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn require_live_scope(&self, scope: &ScopeId) -> Result<Guard> {
        let live = match scope {
            ScopeId::Space(id) => self.store.live_space(id).await?.is_some(),
            ScopeId::Area(id) => self.store.live_area(id).await?.is_some(),
        };
        if !live {
            return Err(AccessError::not_found("scope", scope));
        }
        Ok(match scope {
            ScopeId::Space(id) => Guard::SpaceLive(*id),
            ScopeId::Area(id) => Guard::AreaLive(*id),
        })
    }

    async fn upsert(&self, guard: Guard, membership: Membership) -> Result<Membership> {
        self.store
            .apply(
                ChangeSet::new()
                    .guard(guard)
                    .push(Mutation::UpsertMembership(membership.clone())),
            )
            .await
            .map_err(AccessError::from_apply)?;

        Ok(self
            .store
            .get_membership(&membership.scope, &membership.principal)
            .await?
            .unwrap_or(membership))
    }

    /// Add a principal to a scope, or replace the role it already holds.
    pub async fn add_member(
        &self,
        scope: ScopeId,
        principal: Principal,
        role: Role,
        invited_by: Option<UserId>,
    ) -> Result<Membership> {
        role.validate_for(scope.kind())?;
        let guard = self.require_live_scope(&scope).await?;

        let membership = self
            .upsert(
                guard,
                Membership {
                    scope,
                    principal,
                    role,
                    invited_by,
                    created_at: now_millis(),
                },
            )
            .await?;

        tracing::info!(scope = %scope, principal = %principal, role = %role, "member added");
        Ok(membership)
    }

    /// Change the role of an existing member.
    pub async fn update_role(&self, scope: ScopeId, principal: Principal, role: Role) -> Result<Membership> {
        role.validate_for(scope.kind())?;
        let guard = self.require_live_scope(&scope).await?;
        let existing = self
            .store
            .get_membership(&scope, &principal)
            .await?
            .ok_or_else(|| AccessError::not_found("membership", principal))?;

        let membership = self.upsert(guard, Membership { role, ..existing }).await?;

        tracing::info!(scope = %scope, principal = %principal, role = %role, "member role updated");
        Ok(membership)
    }

    /// Remove a principal from a scope. Returns whether a row was removed.
    pub async fn remove_member(&self, scope: ScopeId, principal: Principal) -> Result<bool> {
        let report = self
            .store
            .apply(ChangeSet::new().push(Mutation::DeleteMembership { scope, principal }))
            .await
            .map_err(AccessError::from_apply)?;

        let removed = report.total() > 0;
        if removed {
            tracing::info!(scope = %scope, principal = %principal, "member removed");
        }
        Ok(removed)
    }

    /// All memberships on a scope, oldest first.
    pub async fn list_members(&self, scope: &ScopeId) -> Result<Vec<Membership>> {
        Ok(self.store.list_memberships(scope).await?)
    }
}
