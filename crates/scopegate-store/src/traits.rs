//! Store trait: the abstract interface for scope, resource and grant persistence.
//!
//! Reads are point lookups. Every write goes through [`Store::apply`], which
//! checks a set of guards and applies a list of mutations as one atomic unit.
//! This is what lets a visibility change and all of its cascade pruning land
//! together or not at all.

use async_trait::async_trait;
use scopegate_core::{
    Area, AreaDocumentShare, AreaId, ContextRef, Group, GroupId, Membership, Principal, Resource,
    ResourceId, ResourceShare, ScopeId, Space, SpaceId, UserId, Visibility,
};

use crate::error::Result;

/// A condition that must hold when a [`ChangeSet`] is applied.
///
/// Guards are evaluated inside the same transaction as the mutations, so a
/// guard failure means nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// The resource exists, is not deleted, and currently has this visibility.
    Visibility {
        resource_id: ResourceId,
        expected: Visibility,
    },
    /// The resource exists and is not deleted.
    ResourceLive(ResourceId),
    /// The area exists and is not deleted.
    AreaLive(AreaId),
    /// The space exists and is not deleted.
    SpaceLive(SpaceId),
    /// The document is currently shared with the area.
    AreaShareExists {
        document_id: ResourceId,
        area_id: AreaId,
    },
}

/// A single write.
///
/// Deletes are idempotent and report zero affected rows when there was
/// nothing to delete. Inserts that reference a missing parent row fail with
/// `NotFound`; inserts that duplicate an id fail with `Conflict`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    InsertSpace(Space),
    InsertArea(Area),
    UpdateArea {
        area_id: AreaId,
        name: Option<String>,
        is_restricted: Option<bool>,
    },
    SoftDeleteSpace {
        space_id: SpaceId,
        at: i64,
    },
    SoftDeleteArea {
        area_id: AreaId,
        at: i64,
    },

    InsertResource(Resource),
    SetVisibility {
        resource_id: ResourceId,
        visibility: Visibility,
        at: i64,
    },
    SoftDeleteResource {
        resource_id: ResourceId,
        at: i64,
    },

    InsertGroup(Group),
    AddGroupMember {
        group_id: GroupId,
        user_id: UserId,
    },
    RemoveGroupMember {
        group_id: GroupId,
        user_id: UserId,
    },

    /// Insert, or replace the role and inviter of an existing row.
    UpsertMembership(Membership),
    DeleteMembership {
        scope: ScopeId,
        principal: Principal,
    },

    /// Insert, or replace the permission and sharer of an existing row.
    UpsertShare(ResourceShare),
    DeleteShare {
        resource_id: ResourceId,
        principal: Principal,
    },
    DeleteAllShares {
        resource_id: ResourceId,
    },

    /// Insert, or refresh the sharer of an existing row. The notification
    /// flag of an existing row is kept.
    UpsertAreaShare(AreaDocumentShare),
    DeleteAreaShare {
        document_id: ResourceId,
        area_id: AreaId,
    },
    DeleteAllAreaShares {
        document_id: ResourceId,
    },
    MarkAreaShareNotified {
        document_id: ResourceId,
        area_id: AreaId,
    },

    /// Insert unless the reference already exists.
    AddContextRef(ContextRef),
    RemoveContextRef {
        area_id: AreaId,
        document_id: ResourceId,
    },
    ClearAreaContext {
        area_id: AreaId,
    },
    RemoveFromAllContexts {
        document_id: ResourceId,
    },
    /// Drop the document from every area context it is no longer shared
    /// with, evaluated against the shares present at apply time.
    PruneUnsharedContext {
        document_id: ResourceId,
    },
    /// Drop the document from every area context outside its own space.
    /// A document with no space leaves every context.
    PruneContextOutsideSpace {
        document_id: ResourceId,
    },
}

/// Guards plus mutations, applied atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub guards: Vec<Guard>,
    pub mutations: Vec<Mutation>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a guard.
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Add a mutation.
    pub fn push(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    /// Add several mutations.
    pub fn extend(mut self, mutations: impl IntoIterator<Item = Mutation>) -> Self {
        self.mutations.extend(mutations);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

/// Outcome of applying a [`ChangeSet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Rows affected by each mutation, in change set order.
    pub affected: Vec<usize>,
}

impl ApplyReport {
    /// Rows affected by the mutation at `index`.
    pub fn affected_at(&self, index: usize) -> usize {
        self.affected.get(index).copied().unwrap_or(0)
    }

    /// Rows affected across the whole change set.
    pub fn total(&self) -> usize {
        self.affected.iter().sum()
    }
}

/// The Store trait: async interface for persistence.
///
/// Lookups return soft-deleted rows as well; deciding what a deleted row
/// means is the resolvers' job. Nothing here caches.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Scope Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a space by id.
    async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>>;

    /// Get an area by id.
    async fn get_area(&self, id: &AreaId) -> Result<Option<Area>>;

    /// List the areas of a space, including deleted ones, oldest first.
    async fn list_areas(&self, space_id: &SpaceId) -> Result<Vec<Area>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Resource Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a page or document by id.
    async fn get_resource(&self, id: &ResourceId) -> Result<Option<Resource>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Group Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>>;

    /// Groups the user belongs to.
    async fn groups_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>>;

    /// Users in a group.
    async fn group_members(&self, group_id: &GroupId) -> Result<Vec<UserId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Membership Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// The membership row for exactly this (scope, principal), if any.
    async fn get_membership(
        &self,
        scope: &ScopeId,
        principal: &Principal,
    ) -> Result<Option<Membership>>;

    /// Membership rows on `scope` held by any of `groups`.
    async fn group_memberships(
        &self,
        scope: &ScopeId,
        groups: &[GroupId],
    ) -> Result<Vec<Membership>>;

    /// All membership rows on a scope, oldest first.
    async fn list_memberships(&self, scope: &ScopeId) -> Result<Vec<Membership>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Share Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// The share row for exactly this (resource, principal), if any.
    async fn get_share(
        &self,
        resource_id: &ResourceId,
        principal: &Principal,
    ) -> Result<Option<ResourceShare>>;

    /// Share rows on `resource_id` held by any of `groups`.
    async fn group_shares(
        &self,
        resource_id: &ResourceId,
        groups: &[GroupId],
    ) -> Result<Vec<ResourceShare>>;

    /// All share rows on a resource, oldest first.
    async fn list_shares(&self, resource_id: &ResourceId) -> Result<Vec<ResourceShare>>;

    /// All areas a document is shared into, oldest first.
    async fn list_area_shares(&self, document_id: &ResourceId) -> Result<Vec<AreaDocumentShare>>;

    async fn get_area_share(
        &self,
        document_id: &ResourceId,
        area_id: &AreaId,
    ) -> Result<Option<AreaDocumentShare>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Context Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Documents active in an area, oldest first.
    async fn list_context(&self, area_id: &AreaId) -> Result<Vec<ContextRef>>;

    /// Areas in which a document is active.
    async fn contexts_for_document(&self, document_id: &ResourceId) -> Result<Vec<ContextRef>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Check every guard and apply every mutation in one transaction.
    ///
    /// Either all mutations are applied or none are. A failed guard returns
    /// `PreconditionFailed`.
    async fn apply(&self, changes: ChangeSet) -> Result<ApplyReport>;
}

/// Extension trait for common store patterns.
#[async_trait]
pub trait StoreExt: Store {
    /// Get a space only if it exists and is not soft-deleted.
    async fn live_space(&self, id: &SpaceId) -> Result<Option<Space>> {
        Ok(self.get_space(id).await?.filter(Space::is_live))
    }

    /// Get an area only if it exists and is not soft-deleted.
    async fn live_area(&self, id: &AreaId) -> Result<Option<Area>> {
        Ok(self.get_area(id).await?.filter(Area::is_live))
    }

    /// Get a resource only if it exists and is not soft-deleted.
    async fn live_resource(&self, id: &ResourceId) -> Result<Option<Resource>> {
        Ok(self.get_resource(id).await?.filter(Resource::is_live))
    }

    /// Apply a single mutation with no guards.
    async fn apply_one(&self, mutation: Mutation) -> Result<usize> {
        let report = self.apply(ChangeSet::new().push(mutation)).await?;
        Ok(report.affected_at(0))
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

#[async_trait]
impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>> {
        (**self).get_space(id).await
    }

    async fn get_area(&self, id: &AreaId) -> Result<Option<Area>> {
        (**self).get_area(id).await
    }

    async fn list_areas(&self, space_id: &SpaceId) -> Result<Vec<Area>> {
        (**self).list_areas(space_id).await
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<Option<Resource>> {
        (**self).get_resource(id).await
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        (**self).get_group(id).await
    }

    async fn groups_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>> {
        (**self).groups_for_user(user_id).await
    }

    async fn group_members(&self, group_id: &GroupId) -> Result<Vec<UserId>> {
        (**self).group_members(group_id).await
    }

    async fn get_membership(
        &self,
        scope: &ScopeId,
        principal: &Principal,
    ) -> Result<Option<Membership>> {
        (**self).get_membership(scope, principal).await
    }

    async fn group_memberships(
        &self,
        scope: &ScopeId,
        groups: &[GroupId],
    ) -> Result<Vec<Membership>> {
        (**self).group_memberships(scope, groups).await
    }

    async fn list_memberships(&self, scope: &ScopeId) -> Result<Vec<Membership>> {
        (**self).list_memberships(scope).await
    }

    async fn get_share(
        &self,
        resource_id: &ResourceId,
        principal: &Principal,
    ) -> Result<Option<ResourceShare>> {
        (**self).get_share(resource_id, principal).await
    }

    async fn group_shares(
        &self,
        resource_id: &ResourceId,
        groups: &[GroupId],
    ) -> Result<Vec<ResourceShare>> {
        (**self).group_shares(resource_id, groups).await
    }

    async fn list_shares(&self, resource_id: &ResourceId) -> Result<Vec<ResourceShare>> {
        (**self).list_shares(resource_id).await
    }

    async fn list_area_shares(&self, document_id: &ResourceId) -> Result<Vec<AreaDocumentShare>> {
        (**self).list_area_shares(document_id).await
    }

    async fn get_area_share(
        &self,
        document_id: &ResourceId,
        area_id: &AreaId,
    ) -> Result<Option<AreaDocumentShare>> {
        (**self).get_area_share(document_id, area_id).await
    }

    async fn list_context(&self, area_id: &AreaId) -> Result<Vec<ContextRef>> {
        (**self).list_context(area_id).await
    }

    async fn contexts_for_document(&self, document_id: &ResourceId) -> Result<Vec<ContextRef>> {
        (**self).contexts_for_document(document_id).await
    }

    async fn apply(&self, changes: ChangeSet) -> Result<ApplyReport> {
        (**self).apply(changes).await
    }
}
