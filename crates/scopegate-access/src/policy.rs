//! Per-kind resource policies.
//!
//! Ownership and private shares resolve the same way for every resource kind
//! and live in the resolver. What `area` and `space` visibility mean differs
//! between pages and documents, and that is what a [`ResourcePolicy`] decides.

use async_trait::async_trait;

use scopegate_core::{Permission, Resource, ResourceKind, ScopeGrant, ScopeId, UserId};
use scopegate_store::{Store, StoreExt};

use crate::decision::{AccessSource, ResourceAccess};
use crate::error::Result;
use crate::scope::ScopeAccessResolver;

/// Strategy for the visibility-dependent part of resource resolution.
#[async_trait]
pub trait ResourcePolicy: Send + Sync {
    /// The resource kind this policy handles.
    fn kind(&self) -> ResourceKind;

    /// Access to a resource with `area` visibility.
    async fn area_access(
        &self,
        store: &dyn Store,
        scopes: &dyn ScopeAccessResolver,
        user_id: &UserId,
        resource: &Resource,
    ) -> Result<ResourceAccess>;

    /// Access to a resource with `space` visibility.
    async fn space_access(
        &self,
        store: &dyn Store,
        scopes: &dyn ScopeAccessResolver,
        user_id: &UserId,
        resource: &Resource,
    ) -> Result<ResourceAccess>;
}

/// Pages live in exactly one area.
#[derive(Debug, Clone, Copy, Default)]
pub struct PagePolicy;

#[async_trait]
impl ResourcePolicy for PagePolicy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Page
    }

    async fn area_access(
        &self,
        _store: &dyn Store,
        scopes: &dyn ScopeAccessResolver,
        user_id: &UserId,
        resource: &Resource,
    ) -> Result<ResourceAccess> {
        let Some(area_id) = resource.area_id() else {
            return Ok(ResourceAccess::denied());
        };

        let access = scopes
            .resolve_scope_access(user_id, &ScopeId::Area(area_id))
            .await?;
        match (access.permission(), access.source) {
            (Some(permission), Some(source)) => Ok(ResourceAccess::granted(permission, source)),
            _ => Ok(ResourceAccess::denied()),
        }
    }

    /// Space-visible pages open up to the space owner only.
    async fn space_access(
        &self,
        store: &dyn Store,
        _scopes: &dyn ScopeAccessResolver,
        user_id: &UserId,
        resource: &Resource,
    ) -> Result<ResourceAccess> {
        let Some(area_id) = resource.area_id() else {
            return Ok(ResourceAccess::denied());
        };
        let Some(area) = store.live_area(&area_id).await? else {
            return Ok(ResourceAccess::denied());
        };
        let Some(space) = store.live_space(&area.space_id).await? else {
            return Ok(ResourceAccess::denied());
        };

        if space.owner_id == *user_id {
            Ok(ResourceAccess::granted(
                Permission::Editor,
                AccessSource::SpaceOwner,
            ))
        } else {
            Ok(ResourceAccess::denied())
        }
    }
}

/// Documents are optionally scoped to a space and can be shared into areas.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentPolicy;

#[async_trait]
impl ResourcePolicy for DocumentPolicy {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Document
    }

    /// Best permission across every area the document is shared into.
    async fn area_access(
        &self,
        store: &dyn Store,
        scopes: &dyn ScopeAccessResolver,
        user_id: &UserId,
        resource: &Resource,
    ) -> Result<ResourceAccess> {
        let mut best = ResourceAccess::denied();
        for share in store.list_area_shares(&resource.id).await? {
            let access = scopes
                .resolve_scope_access(user_id, &ScopeId::Area(share.area_id))
                .await?;
            if let Some(permission) = access.permission() {
                best = best.or_better(ResourceAccess::granted(permission, AccessSource::AreaShare));
            }
        }
        Ok(best)
    }

    /// Any access to the document's space grants; guests read only.
    async fn space_access(
        &self,
        _store: &dyn Store,
        scopes: &dyn ScopeAccessResolver,
        user_id: &UserId,
        resource: &Resource,
    ) -> Result<ResourceAccess> {
        let Some(space_id) = resource.space_id() else {
            return Ok(ResourceAccess::denied());
        };

        let access = scopes
            .resolve_scope_access(user_id, &ScopeId::Space(space_id))
            .await?;
        match access.role {
            Some(ScopeGrant::Role(role)) if access.granted => {
                let source = if access.source == Some(AccessSource::Owner) {
                    AccessSource::SpaceOwner
                } else {
                    AccessSource::SpaceMember
                };
                Ok(ResourceAccess::granted(role.to_permission(), source))
            }
            _ => Ok(ResourceAccess::denied()),
        }
    }
}
