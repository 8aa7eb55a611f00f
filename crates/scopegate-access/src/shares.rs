//! Share management: explicit shares, area shares, area context, and the
//! visibility transitions that cascade through them.
//!
//! Every write is a single guarded [`ChangeSet`]. If the state a decision was
//! based on changes before commit, the write fails with
//! [`AccessError::Conflict`] and nothing is persisted.

use std::sync::Arc;

use scopegate_core::{
    now_millis, AreaDocumentShare, AreaId, ContextRef, Permission, Principal, Resource,
    ResourceId, ResourceKind, ResourceShare, UserId, Visibility,
};
use scopegate_store::{ApplyReport, ChangeSet, Guard, Mutation, Store, StoreExt};

use crate::error::{AccessError, Result};
use crate::visibility::{plan_visibility_change, VisibilityChange};

/// Creates, lists and removes shares and context references.
pub struct ShareManager<S> {
    store: Arc<S>,
}

impl<S> Clone for ShareManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> ShareManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn commit(&self, changes: ChangeSet) -> Result<ApplyReport> {
        self.store.apply(changes).await.map_err(|e| {
            let err = AccessError::from_apply(e);
            if err.is_conflict() {
                tracing::warn!(error = %err, "change set rejected");
            }
            err
        })
    }

    async fn live_resource(&self, resource_id: &ResourceId) -> Result<Resource> {
        self.store
            .live_resource(resource_id)
            .await?
            .ok_or_else(|| AccessError::not_found("resource", resource_id))
    }

    async fn live_document(&self, document_id: &ResourceId) -> Result<Resource> {
        let resource = self.live_resource(document_id).await?;
        if resource.kind() != ResourceKind::Document {
            return Err(AccessError::Conflict(format!(
                "resource {} is a {}, not a document",
                document_id,
                resource.kind()
            )));
        }
        Ok(resource)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Explicit shares
    // ─────────────────────────────────────────────────────────────────────────

    /// Grant `permission` on a private resource, replacing any existing share
    /// for the same principal.
    pub async fn share(
        &self,
        resource_id: &ResourceId,
        principal: Principal,
        permission: Permission,
        granted_by: UserId,
    ) -> Result<ResourceShare> {
        let resource = self.live_resource(resource_id).await?;
        if resource.visibility != Visibility::Private {
            return Err(AccessError::NotPrivate {
                resource_id: *resource_id,
                visibility: resource.visibility,
            });
        }

        let share = ResourceShare {
            resource_id: *resource_id,
            principal,
            permission,
            shared_by: granted_by,
            shared_at: now_millis(),
        };
        self.commit(
            ChangeSet::new()
                .guard(Guard::Visibility {
                    resource_id: *resource_id,
                    expected: Visibility::Private,
                })
                .push(Mutation::UpsertShare(share.clone())),
        )
        .await?;

        tracing::info!(
            resource = %resource_id,
            principal = %principal,
            permission = %permission,
            "resource shared"
        );
        Ok(self
            .store
            .get_share(resource_id, &principal)
            .await?
            .unwrap_or(share))
    }

    /// Remove a principal's share. Returns whether a share was removed.
    pub async fn unshare(&self, resource_id: &ResourceId, principal: Principal) -> Result<bool> {
        let report = self
            .commit(ChangeSet::new().push(Mutation::DeleteShare {
                resource_id: *resource_id,
                principal,
            }))
            .await?;

        let removed = report.total() > 0;
        if removed {
            tracing::info!(resource = %resource_id, principal = %principal, "resource unshared");
        }
        Ok(removed)
    }

    pub async fn list_shares(&self, resource_id: &ResourceId) -> Result<Vec<ResourceShare>> {
        Ok(self.store.list_shares(resource_id).await?)
    }

    /// Remove every explicit share on a resource. Returns how many were removed.
    pub async fn remove_all_shares(&self, resource_id: &ResourceId) -> Result<usize> {
        let report = self
            .commit(ChangeSet::new().push(Mutation::DeleteAllShares {
                resource_id: *resource_id,
            }))
            .await?;
        tracing::info!(resource = %resource_id, removed = report.total(), "shares removed");
        Ok(report.total())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Area shares
    // ─────────────────────────────────────────────────────────────────────────

    /// Share a document into an area.
    pub async fn share_with_area(
        &self,
        document_id: &ResourceId,
        area_id: &AreaId,
        shared_by: UserId,
    ) -> Result<AreaDocumentShare> {
        self.live_document(document_id).await?;
        if self.store.live_area(area_id).await?.is_none() {
            return Err(AccessError::not_found("area", area_id));
        }

        let share = AreaDocumentShare {
            document_id: *document_id,
            area_id: *area_id,
            shared_by,
            shared_at: now_millis(),
            notifications_sent: false,
        };
        self.commit(
            ChangeSet::new()
                .guard(Guard::ResourceLive(*document_id))
                .guard(Guard::AreaLive(*area_id))
                .push(Mutation::UpsertAreaShare(share.clone())),
        )
        .await?;

        tracing::info!(document = %document_id, area = %area_id, "document shared into area");
        Ok(self
            .store
            .get_area_share(document_id, area_id)
            .await?
            .unwrap_or(share))
    }

    /// Remove a document's share into an area and drop it from that area's
    /// context, whatever the document's visibility.
    pub async fn unshare_from_area(&self, document_id: &ResourceId, area_id: &AreaId) -> Result<bool> {
        let report = self
            .commit(
                ChangeSet::new()
                    .push(Mutation::DeleteAreaShare {
                        document_id: *document_id,
                        area_id: *area_id,
                    })
                    .push(Mutation::RemoveContextRef {
                        area_id: *area_id,
                        document_id: *document_id,
                    }),
            )
            .await?;

        let removed = report.affected_at(0) > 0;
        tracing::info!(
            document = %document_id,
            area = %area_id,
            removed,
            context_pruned = report.affected_at(1),
            "document unshared from area"
        );
        Ok(removed)
    }

    pub async fn list_area_shares(&self, document_id: &ResourceId) -> Result<Vec<AreaDocumentShare>> {
        Ok(self.store.list_area_shares(document_id).await?)
    }

    /// Record that members of the area were told about the share. Returns
    /// false if it was already recorded or the share does not exist.
    pub async fn mark_notifications_sent(&self, document_id: &ResourceId, area_id: &AreaId) -> Result<bool> {
        let report = self
            .commit(ChangeSet::new().push(Mutation::MarkAreaShareNotified {
                document_id: *document_id,
                area_id: *area_id,
            }))
            .await?;
        Ok(report.total() > 0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Area context
    // ─────────────────────────────────────────────────────────────────────────

    /// Mark a document as active in an area.
    ///
    /// The area must currently have access to the document: the document is
    /// `area`-visible and shared into the area, or `space`-visible and in the
    /// area's space. Returns false if the reference already existed.
    pub async fn add_to_area_context(
        &self,
        area_id: &AreaId,
        document_id: &ResourceId,
        added_by: UserId,
    ) -> Result<bool> {
        let area = self
            .store
            .live_area(area_id)
            .await?
            .ok_or_else(|| AccessError::not_found("area", area_id))?;
        let document = self.live_document(document_id).await?;

        let reachable = match document.visibility {
            Visibility::Area => self
                .store
                .get_area_share(document_id, area_id)
                .await?
                .is_some(),
            Visibility::Space => document.space_id() == Some(area.space_id),
            Visibility::Private => false,
        };
        if !reachable {
            return Err(AccessError::Conflict(format!(
                "area {} has no access to document {}",
                area_id, document_id
            )));
        }

        let mut changes = ChangeSet::new()
            .guard(Guard::Visibility {
                resource_id: *document_id,
                expected: document.visibility,
            })
            .guard(Guard::AreaLive(*area_id));
        if document.visibility == Visibility::Area {
            changes = changes.guard(Guard::AreaShareExists {
                document_id: *document_id,
                area_id: *area_id,
            });
        }

        let report = self
            .commit(changes.push(Mutation::AddContextRef(ContextRef {
                area_id: *area_id,
                document_id: *document_id,
                added_by,
                added_at: now_millis(),
            })))
            .await?;

        let added = report.total() > 0;
        if added {
            tracing::info!(area = %area_id, document = %document_id, "document added to area context");
        }
        Ok(added)
    }

    /// Drop a document from an area's context. Returns whether it was there.
    pub async fn remove_from_area_context(&self, area_id: &AreaId, document_id: &ResourceId) -> Result<bool> {
        let report = self
            .commit(ChangeSet::new().push(Mutation::RemoveContextRef {
                area_id: *area_id,
                document_id: *document_id,
            }))
            .await?;
        Ok(report.total() > 0)
    }

    pub async fn list_area_context(&self, area_id: &AreaId) -> Result<Vec<ContextRef>> {
        Ok(self.store.list_context(area_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Visibility
    // ─────────────────────────────────────────────────────────────────────────

    /// Move a resource to a new visibility and apply the cascade atomically.
    ///
    /// Fails with [`AccessError::Conflict`] if the visibility changed between
    /// read and commit.
    pub async fn change_visibility(
        &self,
        resource_id: &ResourceId,
        to: Visibility,
    ) -> Result<VisibilityChange> {
        let resource = self.live_resource(resource_id).await?;
        let Some(plan) = plan_visibility_change(&resource, to, now_millis()) else {
            return Ok(VisibilityChange::unchanged(to));
        };

        let report = self.commit(plan.clone()).await?;
        let change = VisibilityChange::from_report(resource.visibility, to, &plan, &report);

        tracing::info!(
            resource = %resource_id,
            from = %change.from,
            to = %change.to,
            shares_removed = change.shares_removed,
            area_shares_removed = change.area_shares_removed,
            context_pruned = change.context_pruned,
            "visibility changed"
        );
        Ok(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::World;

    #[tokio::test]
    async fn test_share_upserts_single_row() {
        let world = World::new().await;
        let doc = world.document(world.owner, Visibility::Private).await;
        let reader = UserId::generate();
        let shares = ShareManager::new(world.store.clone());

        shares
            .share(&doc.id, reader.into(), Permission::Viewer, world.owner)
            .await
            .unwrap();
        let share = shares
            .share(&doc.id, reader.into(), Permission::Editor, world.owner)
            .await
            .unwrap();
        assert_eq!(share.permission, Permission::Editor);

        let listed = shares.list_shares(&doc.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].permission, Permission::Editor);
    }

    #[tokio::test]
    async fn test_share_rejects_non_private_resource() {
        let world = World::new().await;
        let page = world
            .page(&world.general, world.owner, Visibility::Area)
            .await;
        let shares = ShareManager::new(world.store.clone());

        let err = shares
            .share(&page.id, UserId::generate().into(), Permission::Viewer, world.owner)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AccessError::NotPrivate {
                visibility: Visibility::Area,
                ..
            }
        ));
        assert!(shares.list_shares(&page.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_share_missing_resource() {
        let world = World::new().await;
        let shares = ShareManager::new(world.store.clone());
        let err = shares
            .share(
                &ResourceId::generate(),
                UserId::generate().into(),
                Permission::Viewer,
                world.owner,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::NotFound { kind: "resource", .. }));
    }

    #[tokio::test]
    async fn test_unshare_is_idempotent() {
        let world = World::new().await;
        let doc = world.document(world.owner, Visibility::Private).await;
        let reader = UserId::generate();
        let shares = ShareManager::new(world.store.clone());
        shares
            .share(&doc.id, reader.into(), Permission::Viewer, world.owner)
            .await
            .unwrap();

        assert!(shares.unshare(&doc.id, reader.into()).await.unwrap());
        assert!(!shares.unshare(&doc.id, reader.into()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unshare_from_area_prunes_only_that_area() {
        let world = World::new().await;
        let a1 = world.area("A1", false).await;
        let a2 = world.area("A2", false).await;
        let doc = world.document(world.owner, Visibility::Area).await;
        let shares = ShareManager::new(world.store.clone());

        shares.share_with_area(&doc.id, &a1.id, world.owner).await.unwrap();
        shares.share_with_area(&doc.id, &a2.id, world.owner).await.unwrap();
        assert!(shares.add_to_area_context(&a1.id, &doc.id, world.owner).await.unwrap());
        assert!(shares.add_to_area_context(&a2.id, &doc.id, world.owner).await.unwrap());

        assert!(shares.unshare_from_area(&doc.id, &a1.id).await.unwrap());

        assert!(shares.list_area_context(&a1.id).await.unwrap().is_empty());
        assert_eq!(shares.list_area_context(&a2.id).await.unwrap().len(), 1);
        let remaining = shares.list_area_shares(&doc.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].area_id, a2.id);
    }

    #[tokio::test]
    async fn test_context_requires_area_access() {
        let world = World::new().await;
        let area = world.area("Notes", false).await;
        let private = world.document(world.owner, Visibility::Private).await;
        let unshared = world.document(world.owner, Visibility::Area).await;
        let spaced = world.document(world.owner, Visibility::Space).await;
        let shares = ShareManager::new(world.store.clone());

        for doc in [&private, &unshared] {
            let err = shares
                .add_to_area_context(&area.id, &doc.id, world.owner)
                .await
                .unwrap_err();
            assert!(err.is_conflict());
        }

        assert!(shares.add_to_area_context(&area.id, &spaced.id, world.owner).await.unwrap());
        // Already present
        assert!(!shares.add_to_area_context(&area.id, &spaced.id, world.owner).await.unwrap());
    }

    #[tokio::test]
    async fn test_context_rejects_pages() {
        let world = World::new().await;
        let page = world
            .page(&world.general, world.owner, Visibility::Space)
            .await;
        let shares = ShareManager::new(world.store.clone());

        let err = shares
            .add_to_area_context(&world.general.id, &page.id, world.owner)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_mark_notifications_sent_once() {
        let world = World::new().await;
        let doc = world.document(world.owner, Visibility::Area).await;
        let shares = ShareManager::new(world.store.clone());
        shares
            .share_with_area(&doc.id, &world.general.id, world.owner)
            .await
            .unwrap();

        assert!(shares.mark_notifications_sent(&doc.id, &world.general.id).await.unwrap());
        assert!(!shares.mark_notifications_sent(&doc.id, &world.general.id).await.unwrap());
        assert!(shares.list_area_shares(&doc.id).await.unwrap()[0].notifications_sent);
    }

    #[tokio::test]
    async fn test_visibility_round_trip_drops_shares() {
        let world = World::new().await;
        let doc = world.document(world.owner, Visibility::Private).await;
        let shares = ShareManager::new(world.store.clone());
        shares
            .share(&doc.id, UserId::generate().into(), Permission::Viewer, world.owner)
            .await
            .unwrap();
        shares
            .share(&doc.id, UserId::generate().into(), Permission::Editor, world.owner)
            .await
            .unwrap();

        let change = shares.change_visibility(&doc.id, Visibility::Space).await.unwrap();
        assert_eq!(change.shares_removed, 2);
        let change = shares.change_visibility(&doc.id, Visibility::Private).await.unwrap();
        assert_eq!(change.shares_removed, 0);

        assert!(shares.list_shares(&doc.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_to_private_prunes_context_keeps_area_shares() {
        let world = World::new().await;
        let area = world.area("Specs", false).await;
        let doc = world.document(world.owner, Visibility::Area).await;
        let shares = ShareManager::new(world.store.clone());
        shares.share_with_area(&doc.id, &area.id, world.owner).await.unwrap();
        shares.add_to_area_context(&area.id, &doc.id, world.owner).await.unwrap();

        let change = shares.change_visibility(&doc.id, Visibility::Private).await.unwrap();
        assert_eq!(change.context_pruned, 1);
        assert!(shares.list_area_context(&area.id).await.unwrap().is_empty());
        assert_eq!(shares.list_area_shares(&doc.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_to_space_clears_area_shares_keeps_context() {
        let world = World::new().await;
        let area = world.area("Specs", false).await;
        let doc = world.document(world.owner, Visibility::Area).await;
        let shares = ShareManager::new(world.store.clone());
        shares.share_with_area(&doc.id, &area.id, world.owner).await.unwrap();
        shares.add_to_area_context(&area.id, &doc.id, world.owner).await.unwrap();

        let change = shares.change_visibility(&doc.id, Visibility::Space).await.unwrap();
        assert_eq!(change.area_shares_removed, 1);
        assert!(shares.list_area_shares(&doc.id).await.unwrap().is_empty());
        assert_eq!(shares.list_area_context(&area.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_to_private_after_space_leaves_no_context() {
        let world = World::new().await;
        let area = world.area("Specs", false).await;
        let doc = world.document(world.owner, Visibility::Area).await;
        let shares = ShareManager::new(world.store.clone());
        shares.share_with_area(&doc.id, &area.id, world.owner).await.unwrap();
        shares.add_to_area_context(&area.id, &doc.id, world.owner).await.unwrap();
        shares.add_to_area_context(&world.general.id, &doc.id, world.owner).await.unwrap_err();

        shares.change_visibility(&doc.id, Visibility::Space).await.unwrap();
        shares.add_to_area_context(&world.general.id, &doc.id, world.owner).await.unwrap();

        // No area shares remain, yet both references must go
        let change = shares.change_visibility(&doc.id, Visibility::Private).await.unwrap();
        assert_eq!(change.context_pruned, 2);
        for area_id in [area.id, world.general.id] {
            assert!(shares.list_area_context(&area_id).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_to_area_keeps_only_shared_context() {
        let world = World::new().await;
        let area = world.area("Specs", false).await;
        let doc = world.document(world.owner, Visibility::Space).await;
        let shares = ShareManager::new(world.store.clone());
        shares.add_to_area_context(&area.id, &doc.id, world.owner).await.unwrap();
        shares.add_to_area_context(&world.general.id, &doc.id, world.owner).await.unwrap();
        shares.share_with_area(&doc.id, &area.id, world.owner).await.unwrap();

        let change = shares.change_visibility(&doc.id, Visibility::Area).await.unwrap();
        assert_eq!(change.context_pruned, 1);
        assert!(shares.list_area_context(&world.general.id).await.unwrap().is_empty());
        assert_eq!(shares.list_area_context(&area.id).await.unwrap().len(), 1);

        let err = shares
            .add_to_area_context(&world.general.id, &doc.id, world.owner)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_to_private_prunes_context_added_after_planning() {
        let world = World::new().await;
        let area = world.area("Specs", false).await;
        let doc = world.document(world.owner, Visibility::Area).await;
        let shares = ShareManager::new(world.store.clone());

        let plan = plan_visibility_change(&doc, Visibility::Private, now_millis()).unwrap();
        shares.share_with_area(&doc.id, &area.id, world.owner).await.unwrap();
        shares.add_to_area_context(&area.id, &doc.id, world.owner).await.unwrap();

        let report = world.store.apply(plan.clone()).await.unwrap();
        let change = VisibilityChange::from_report(Visibility::Area, Visibility::Private, &plan, &report);
        assert_eq!(change.context_pruned, 1);
        assert!(shares.list_area_context(&area.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unchanged_visibility_writes_nothing() {
        let world = World::new().await;
        let doc = world.document(world.owner, Visibility::Private).await;
        let shares = ShareManager::new(world.store.clone());
        shares
            .share(&doc.id, UserId::generate().into(), Permission::Viewer, world.owner)
            .await
            .unwrap();

        let change = shares.change_visibility(&doc.id, Visibility::Private).await.unwrap();
        assert!(change.is_noop());
        assert_eq!(shares.list_shares(&doc.id).await.unwrap().len(), 1);
        let stored = world.store.get_resource(&doc.id).await.unwrap().unwrap();
        assert_eq!(stored.updated_at, doc.updated_at);
    }
}
