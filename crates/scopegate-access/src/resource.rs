//! Resource access resolution.
//!
//! One resolver for every resource kind. Ownership and private shares are
//! handled here; `area` and `space` visibility are delegated to the
//! [`ResourcePolicy`] for the resource's kind.

use std::sync::Arc;

use scopegate_core::{Permission, Principal, Resource, ResourceId, ResourceKind, UserId, Visibility};
use scopegate_store::{Store, StoreExt};

use crate::decision::{AccessSource, Decision, ResourceAccess};
use crate::error::Result;
use crate::groups::GroupExpansion;
use crate::policy::{DocumentPolicy, PagePolicy, ResourcePolicy};
use crate::scope::ScopeAccessResolver;

/// Resolves a user's access to pages and documents.
pub struct ResourceResolver<S, R> {
    store: Arc<S>,
    scopes: R,
    groups: GroupExpansion<S>,
    pages: PagePolicy,
    documents: DocumentPolicy,
}

impl<S: Store, R: ScopeAccessResolver> ResourceResolver<S, R> {
    pub fn new(store: Arc<S>, scopes: R) -> Self {
        Self {
            groups: GroupExpansion::new(Arc::clone(&store)),
            store,
            scopes,
            pages: PagePolicy,
            documents: DocumentPolicy,
        }
    }

    fn policy(&self, kind: ResourceKind) -> &dyn ResourcePolicy {
        match kind {
            ResourceKind::Page => &self.pages,
            ResourceKind::Document => &self.documents,
        }
    }

    /// Resolve a user's access to a resource.
    pub async fn resolve_resource_access(
        &self,
        user_id: &UserId,
        resource_id: &ResourceId,
    ) -> Result<ResourceAccess> {
        let access = match self.store.live_resource(resource_id).await? {
            Some(resource) => self.resolve_loaded(user_id, &resource).await?,
            None => ResourceAccess::denied(),
        };

        tracing::debug!(
            user = %user_id,
            resource = %resource_id,
            granted = access.granted,
            permission = ?access.permission,
            source = ?access.source,
            "resolved resource access"
        );
        Ok(access)
    }

    /// Resolve access and compare it against a required level.
    pub async fn authorize(
        &self,
        user_id: &UserId,
        resource_id: &ResourceId,
        required: Permission,
    ) -> Result<Decision> {
        let access = self.resolve_resource_access(user_id, resource_id).await?;
        Ok(Decision::new(access, required))
    }

    async fn resolve_loaded(&self, user_id: &UserId, resource: &Resource) -> Result<ResourceAccess> {
        // Ownership does not depend on the containing area still existing
        if resource.owner_id == *user_id {
            return Ok(ResourceAccess::granted(Permission::Admin, AccessSource::Owner));
        }

        let store: &dyn Store = self.store.as_ref();
        let policy = self.policy(resource.kind());
        match resource.visibility {
            Visibility::Private => self.private_access(user_id, resource).await,
            Visibility::Area => {
                policy
                    .area_access(store, &self.scopes, user_id, resource)
                    .await
            }
            Visibility::Space => {
                policy
                    .space_access(store, &self.scopes, user_id, resource)
                    .await
            }
        }
    }

    /// Direct and group shares on a private resource.
    async fn private_access(&self, user_id: &UserId, resource: &Resource) -> Result<ResourceAccess> {
        let direct = self
            .store
            .get_share(&resource.id, &Principal::User(*user_id))
            .await?
            .map(|s| ResourceAccess::granted(s.permission, AccessSource::DirectShare))
            .unwrap_or_else(ResourceAccess::denied);

        let groups = self.groups.groups_for(user_id).await?;
        let best = self
            .store
            .group_shares(&resource.id, &groups)
            .await?
            .into_iter()
            .map(|s| ResourceAccess::granted(s.permission, AccessSource::GroupShare))
            .fold(direct, ResourceAccess::or_better);

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeResolver;
    use crate::test_support::World;
    use scopegate_core::{AreaDocumentShare, ResourceShare, Role};
    use scopegate_store::{MemoryStore, Mutation};

    fn resolver(world: &World) -> ResourceResolver<MemoryStore, ScopeResolver<MemoryStore>> {
        ResourceResolver::new(
            world.store.clone(),
            ScopeResolver::new(world.store.clone()),
        )
    }

    async fn share(world: &World, resource: &Resource, principal: impl Into<Principal>, permission: Permission) {
        world
            .store
            .apply_one(Mutation::UpsertShare(ResourceShare {
                resource_id: resource.id,
                principal: principal.into(),
                permission,
                shared_by: resource.owner_id,
                shared_at: 0,
            }))
            .await
            .unwrap();
    }

    async fn share_into(world: &World, document: &Resource, area: &scopegate_core::Area) {
        world
            .store
            .apply_one(Mutation::UpsertAreaShare(AreaDocumentShare {
                document_id: document.id,
                area_id: area.id,
                shared_by: document.owner_id,
                shared_at: 0,
                notifications_sent: false,
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_owner_gets_admin_even_after_area_deleted() {
        let world = World::new().await;
        let author = UserId::generate();
        let area = world.area("Drafts", false).await;
        let page = world.page(&area, author, Visibility::Area).await;
        world.delete_area(&area).await;

        let access = resolver(&world)
            .resolve_resource_access(&author, &page.id)
            .await
            .unwrap();
        assert_eq!(
            access,
            ResourceAccess::granted(Permission::Admin, AccessSource::Owner)
        );
    }

    #[tokio::test]
    async fn test_private_direct_and_group_shares() {
        let world = World::new().await;
        let reader = UserId::generate();
        let group = world.group(&[reader]).await;
        let doc = world.document(world.owner, Visibility::Private).await;
        let resolver = resolver(&world);

        assert!(!resolver
            .resolve_resource_access(&reader, &doc.id)
            .await
            .unwrap()
            .granted);

        share(&world, &doc, reader, Permission::Viewer).await;
        share(&world, &doc, group, Permission::Editor).await;
        let access = resolver.resolve_resource_access(&reader, &doc.id).await.unwrap();
        assert_eq!(access.permission, Some(Permission::Editor));
        assert_eq!(access.source, Some(AccessSource::GroupShare));

        share(&world, &doc, reader, Permission::Editor).await;
        let access = resolver.resolve_resource_access(&reader, &doc.id).await.unwrap();
        assert_eq!(access.source, Some(AccessSource::DirectShare));
    }

    #[tokio::test]
    async fn test_area_page_maps_scope_role() {
        let world = World::new().await;
        let viewer = UserId::generate();
        let member = UserId::generate();
        let area = world.area("Ops", true).await;
        world.member(area.id, viewer, Role::Viewer).await;
        world.member(area.id, member, Role::Member).await;
        let page = world.page(&area, world.owner, Visibility::Area).await;
        let resolver = resolver(&world);

        let access = resolver.resolve_resource_access(&viewer, &page.id).await.unwrap();
        assert_eq!(access.permission, Some(Permission::Viewer));
        assert_eq!(access.source, Some(AccessSource::Membership));

        let decision = resolver
            .authorize(&member, &page.id, Permission::Editor)
            .await
            .unwrap();
        assert!(decision.allowed);

        let decision = resolver
            .authorize(&viewer, &page.id, Permission::Editor)
            .await
            .unwrap();
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn test_space_page_only_for_space_owner() {
        let world = World::new().await;
        let author = UserId::generate();
        let admin = UserId::generate();
        world.member(world.space.id, admin, Role::Admin).await;
        let page = world.page(&world.general, author, Visibility::Space).await;
        let resolver = resolver(&world);

        let access = resolver
            .resolve_resource_access(&world.owner, &page.id)
            .await
            .unwrap();
        assert_eq!(
            access,
            ResourceAccess::granted(Permission::Editor, AccessSource::SpaceOwner)
        );
        assert!(!resolver
            .resolve_resource_access(&admin, &page.id)
            .await
            .unwrap()
            .granted);
    }

    #[tokio::test]
    async fn test_space_document_grants_members_and_guests() {
        let world = World::new().await;
        let guest = UserId::generate();
        let member = UserId::generate();
        world.member(world.space.id, guest, Role::Guest).await;
        world.member(world.space.id, member, Role::Member).await;
        let doc = world.document(world.owner, Visibility::Space).await;
        let resolver = resolver(&world);

        let access = resolver.resolve_resource_access(&guest, &doc.id).await.unwrap();
        assert_eq!(
            access,
            ResourceAccess::granted(Permission::Viewer, AccessSource::SpaceMember)
        );
        let access = resolver.resolve_resource_access(&member, &doc.id).await.unwrap();
        assert_eq!(access.permission, Some(Permission::Editor));
        assert!(!resolver
            .resolve_resource_access(&UserId::generate(), &doc.id)
            .await
            .unwrap()
            .granted);
    }

    #[tokio::test]
    async fn test_area_document_best_over_shared_areas() {
        let world = World::new().await;
        let user = UserId::generate();
        let author = UserId::generate();
        let reading = world.area("Reading", true).await;
        let writing = world.area("Writing", true).await;
        let closed = world.area("Closed", true).await;
        world.member(reading.id, user, Role::Viewer).await;
        world.member(writing.id, user, Role::Member).await;
        let doc = world.document(author, Visibility::Area).await;
        let resolver = resolver(&world);

        share_into(&world, &doc, &closed).await;
        assert!(!resolver.resolve_resource_access(&user, &doc.id).await.unwrap().granted);

        share_into(&world, &doc, &reading).await;
        let access = resolver.resolve_resource_access(&user, &doc.id).await.unwrap();
        assert_eq!(
            access,
            ResourceAccess::granted(Permission::Viewer, AccessSource::AreaShare)
        );

        share_into(&world, &doc, &writing).await;
        let access = resolver.resolve_resource_access(&user, &doc.id).await.unwrap();
        assert_eq!(access.permission, Some(Permission::Editor));
    }

    #[tokio::test]
    async fn test_deleted_resource_denies_everyone() {
        let world = World::new().await;
        let doc = world.document(world.owner, Visibility::Space).await;
        world
            .store
            .apply_one(Mutation::SoftDeleteResource {
                resource_id: doc.id,
                at: 1,
            })
            .await
            .unwrap();

        let access = resolver(&world)
            .resolve_resource_access(&world.owner, &doc.id)
            .await
            .unwrap();
        assert!(!access.granted);
        assert!(!resolver(&world)
            .resolve_resource_access(&world.owner, &ResourceId::generate())
            .await
            .unwrap()
            .granted);
    }
}
