//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence. Change sets are
//! applied to a copy of the state that replaces the live state only once
//! every guard and mutation has succeeded.

use std::collections::{BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use scopegate_core::{
    Area, AreaDocumentShare, AreaId, ContextRef, Group, GroupId, Membership, Placement, Principal,
    Resource, ResourceId, ResourceKind, ResourceShare, ScopeId, Space, SpaceId, UserId,
};

use crate::error::{Result, StoreError};
use crate::traits::{ApplyReport, ChangeSet, Guard, Mutation, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Clone, Default)]
struct MemoryStoreInner {
    spaces: HashMap<SpaceId, Space>,
    areas: HashMap<AreaId, Area>,
    resources: HashMap<ResourceId, Resource>,
    groups: HashMap<GroupId, Group>,

    /// (group, user) pairs.
    group_members: BTreeSet<(GroupId, UserId)>,

    memberships: HashMap<(ScopeId, Principal), Membership>,
    shares: HashMap<(ResourceId, Principal), ResourceShare>,
    area_shares: HashMap<(ResourceId, AreaId), AreaDocumentShare>,
    context: HashMap<(AreaId, ResourceId), ContextRef>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStoreInner {
    fn scope_exists(&self, scope: &ScopeId) -> bool {
        match scope {
            ScopeId::Space(id) => self.spaces.contains_key(id),
            ScopeId::Area(id) => self.areas.contains_key(id),
        }
    }

    fn check_guard(&self, guard: &Guard) -> Result<()> {
        match guard {
            Guard::Visibility {
                resource_id,
                expected,
            } => match self.resources.get(resource_id) {
                Some(r) if r.is_live() && r.visibility == *expected => Ok(()),
                Some(r) if r.is_live() => Err(StoreError::PreconditionFailed(format!(
                    "resource {} has visibility {}, expected {}",
                    resource_id, r.visibility, expected
                ))),
                _ => Err(StoreError::PreconditionFailed(format!(
                    "resource {} is missing or deleted",
                    resource_id
                ))),
            },
            Guard::ResourceLive(id) => match self.resources.get(id) {
                Some(r) if r.is_live() => Ok(()),
                _ => Err(StoreError::PreconditionFailed(format!(
                    "resource {} is missing or deleted",
                    id
                ))),
            },
            Guard::AreaLive(id) => match self.areas.get(id) {
                Some(a) if a.is_live() => Ok(()),
                _ => Err(StoreError::PreconditionFailed(format!(
                    "area {} is missing or deleted",
                    id
                ))),
            },
            Guard::SpaceLive(id) => match self.spaces.get(id) {
                Some(s) if s.is_live() => Ok(()),
                _ => Err(StoreError::PreconditionFailed(format!(
                    "space {} is missing or deleted",
                    id
                ))),
            },
            Guard::AreaShareExists {
                document_id,
                area_id,
            } => {
                if self.area_shares.contains_key(&(*document_id, *area_id)) {
                    Ok(())
                } else {
                    Err(StoreError::PreconditionFailed(format!(
                        "document {} is not shared with area {}",
                        document_id, area_id
                    )))
                }
            }
        }
    }

    fn apply_mutation(&mut self, mutation: &Mutation) -> Result<usize> {
        match mutation {
            Mutation::InsertSpace(space) => {
                if self.spaces.contains_key(&space.id) {
                    return Err(StoreError::Conflict(format!("space {} exists", space.id)));
                }
                self.spaces.insert(space.id, space.clone());
                Ok(1)
            }
            Mutation::InsertArea(area) => {
                if !self.spaces.contains_key(&area.space_id) {
                    return Err(StoreError::not_found("space", area.space_id));
                }
                if self.areas.contains_key(&area.id) {
                    return Err(StoreError::Conflict(format!("area {} exists", area.id)));
                }
                if area.is_general
                    && self
                        .areas
                        .values()
                        .any(|a| a.space_id == area.space_id && a.is_general)
                {
                    return Err(StoreError::Conflict(format!(
                        "space {} already has a General area",
                        area.space_id
                    )));
                }
                self.areas.insert(area.id, area.clone());
                Ok(1)
            }
            Mutation::UpdateArea {
                area_id,
                name,
                is_restricted,
            } => {
                let area = self
                    .areas
                    .get_mut(area_id)
                    .ok_or_else(|| StoreError::not_found("area", area_id))?;
                if let Some(name) = name {
                    area.name = name.clone();
                }
                if let Some(restricted) = is_restricted {
                    area.is_restricted = *restricted;
                }
                Ok(1)
            }
            Mutation::SoftDeleteSpace { space_id, at } => {
                let space = self
                    .spaces
                    .get_mut(space_id)
                    .ok_or_else(|| StoreError::not_found("space", space_id))?;
                if space.deleted_at.is_some() {
                    return Ok(0);
                }
                space.deleted_at = Some(*at);
                Ok(1)
            }
            Mutation::SoftDeleteArea { area_id, at } => {
                let area = self
                    .areas
                    .get_mut(area_id)
                    .ok_or_else(|| StoreError::not_found("area", area_id))?;
                if area.deleted_at.is_some() {
                    return Ok(0);
                }
                area.deleted_at = Some(*at);
                Ok(1)
            }

            Mutation::InsertResource(resource) => {
                if self.resources.contains_key(&resource.id) {
                    return Err(StoreError::Conflict(format!(
                        "resource {} exists",
                        resource.id
                    )));
                }
                match resource.placement {
                    Placement::Page { area_id } => {
                        if !self.areas.contains_key(&area_id) {
                            return Err(StoreError::not_found("area", area_id));
                        }
                    }
                    Placement::Document {
                        space_id: Some(space_id),
                    } => {
                        if !self.spaces.contains_key(&space_id) {
                            return Err(StoreError::not_found("space", space_id));
                        }
                    }
                    Placement::Document { space_id: None } => {}
                }
                self.resources.insert(resource.id, resource.clone());
                Ok(1)
            }
            Mutation::SetVisibility {
                resource_id,
                visibility,
                at,
            } => {
                let resource = self
                    .resources
                    .get_mut(resource_id)
                    .ok_or_else(|| StoreError::not_found("resource", resource_id))?;
                resource.visibility = *visibility;
                resource.updated_at = *at;
                Ok(1)
            }
            Mutation::SoftDeleteResource { resource_id, at } => {
                let resource = self
                    .resources
                    .get_mut(resource_id)
                    .ok_or_else(|| StoreError::not_found("resource", resource_id))?;
                if resource.deleted_at.is_some() {
                    return Ok(0);
                }
                resource.deleted_at = Some(*at);
                resource.updated_at = *at;
                Ok(1)
            }

            Mutation::InsertGroup(group) => {
                if self.groups.contains_key(&group.id) {
                    return Err(StoreError::Conflict(format!("group {} exists", group.id)));
                }
                self.groups.insert(group.id, group.clone());
                Ok(1)
            }
            Mutation::AddGroupMember { group_id, user_id } => {
                if !self.groups.contains_key(group_id) {
                    return Err(StoreError::not_found("group", group_id));
                }
                Ok(usize::from(self.group_members.insert((*group_id, *user_id))))
            }
            Mutation::RemoveGroupMember { group_id, user_id } => {
                Ok(usize::from(self.group_members.remove(&(*group_id, *user_id))))
            }

            Mutation::UpsertMembership(membership) => {
                if !self.scope_exists(&membership.scope) {
                    return Err(StoreError::not_found("scope", membership.scope));
                }
                if let Principal::Group(group_id) = membership.principal {
                    if !self.groups.contains_key(&group_id) {
                        return Err(StoreError::not_found("group", group_id));
                    }
                }
                let key = (membership.scope, membership.principal);
                match self.memberships.get_mut(&key) {
                    Some(existing) => {
                        existing.role = membership.role;
                        existing.invited_by = membership.invited_by;
                    }
                    None => {
                        self.memberships.insert(key, membership.clone());
                    }
                }
                Ok(1)
            }
            Mutation::DeleteMembership { scope, principal } => Ok(usize::from(
                self.memberships.remove(&(*scope, *principal)).is_some(),
            )),

            Mutation::UpsertShare(share) => {
                if !self.resources.contains_key(&share.resource_id) {
                    return Err(StoreError::not_found("resource", share.resource_id));
                }
                if let Principal::Group(group_id) = share.principal {
                    if !self.groups.contains_key(&group_id) {
                        return Err(StoreError::not_found("group", group_id));
                    }
                }
                let key = (share.resource_id, share.principal);
                match self.shares.get_mut(&key) {
                    Some(existing) => {
                        existing.permission = share.permission;
                        existing.shared_by = share.shared_by;
                        existing.shared_at = share.shared_at;
                    }
                    None => {
                        self.shares.insert(key, share.clone());
                    }
                }
                Ok(1)
            }
            Mutation::DeleteShare {
                resource_id,
                principal,
            } => Ok(usize::from(
                self.shares.remove(&(*resource_id, *principal)).is_some(),
            )),
            Mutation::DeleteAllShares { resource_id } => {
                let before = self.shares.len();
                self.shares.retain(|(rid, _), _| rid != resource_id);
                Ok(before - self.shares.len())
            }

            Mutation::UpsertAreaShare(share) => {
                match self.resources.get(&share.document_id) {
                    Some(r) if r.kind() == ResourceKind::Document => {}
                    Some(_) => {
                        return Err(StoreError::Conflict(format!(
                            "resource {} is not a document",
                            share.document_id
                        )))
                    }
                    None => return Err(StoreError::not_found("document", share.document_id)),
                }
                if !self.areas.contains_key(&share.area_id) {
                    return Err(StoreError::not_found("area", share.area_id));
                }
                let key = (share.document_id, share.area_id);
                match self.area_shares.get_mut(&key) {
                    Some(existing) => {
                        existing.shared_by = share.shared_by;
                        existing.shared_at = share.shared_at;
                    }
                    None => {
                        self.area_shares.insert(key, share.clone());
                    }
                }
                Ok(1)
            }
            Mutation::DeleteAreaShare {
                document_id,
                area_id,
            } => Ok(usize::from(
                self.area_shares.remove(&(*document_id, *area_id)).is_some(),
            )),
            Mutation::DeleteAllAreaShares { document_id } => {
                let before = self.area_shares.len();
                self.area_shares.retain(|(did, _), _| did != document_id);
                Ok(before - self.area_shares.len())
            }
            Mutation::MarkAreaShareNotified {
                document_id,
                area_id,
            } => match self.area_shares.get_mut(&(*document_id, *area_id)) {
                Some(share) if !share.notifications_sent => {
                    share.notifications_sent = true;
                    Ok(1)
                }
                _ => Ok(0),
            },

            Mutation::AddContextRef(context) => {
                if !self.areas.contains_key(&context.area_id) {
                    return Err(StoreError::not_found("area", context.area_id));
                }
                if !self.resources.contains_key(&context.document_id) {
                    return Err(StoreError::not_found("document", context.document_id));
                }
                let key = (context.area_id, context.document_id);
                if self.context.contains_key(&key) {
                    return Ok(0);
                }
                self.context.insert(key, context.clone());
                Ok(1)
            }
            Mutation::RemoveContextRef {
                area_id,
                document_id,
            } => Ok(usize::from(
                self.context.remove(&(*area_id, *document_id)).is_some(),
            )),
            Mutation::ClearAreaContext { area_id } => {
                let before = self.context.len();
                self.context.retain(|(aid, _), _| aid != area_id);
                Ok(before - self.context.len())
            }
            Mutation::RemoveFromAllContexts { document_id } => {
                let before = self.context.len();
                self.context.retain(|(_, did), _| did != document_id);
                Ok(before - self.context.len())
            }
            Mutation::PruneUnsharedContext { document_id } => {
                let before = self.context.len();
                let shares = &self.area_shares;
                self.context.retain(|(aid, did), _| {
                    did != document_id || shares.contains_key(&(*did, *aid))
                });
                Ok(before - self.context.len())
            }
            Mutation::PruneContextOutsideSpace { document_id } => {
                let space_id = self
                    .resources
                    .get(document_id)
                    .and_then(|r| r.space_id());
                let areas = &self.areas;
                let before = self.context.len();
                self.context.retain(|(aid, did), _| {
                    did != document_id
                        || matches!(
                            (space_id, areas.get(aid)),
                            (Some(space), Some(area)) if area.space_id == space
                        )
                });
                Ok(before - self.context.len())
            }
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>> {
        Ok(self.read()?.spaces.get(id).cloned())
    }

    async fn get_area(&self, id: &AreaId) -> Result<Option<Area>> {
        Ok(self.read()?.areas.get(id).cloned())
    }

    async fn list_areas(&self, space_id: &SpaceId) -> Result<Vec<Area>> {
        let inner = self.read()?;
        let mut areas: Vec<Area> = inner
            .areas
            .values()
            .filter(|a| a.space_id == *space_id)
            .cloned()
            .collect();
        areas.sort_by_key(|a| (a.created_at, a.id));
        Ok(areas)
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<Option<Resource>> {
        Ok(self.read()?.resources.get(id).cloned())
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        Ok(self.read()?.groups.get(id).cloned())
    }

    async fn groups_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>> {
        let inner = self.read()?;
        Ok(inner
            .group_members
            .iter()
            .filter(|(_, uid)| uid == user_id)
            .map(|(gid, _)| *gid)
            .collect())
    }

    async fn group_members(&self, group_id: &GroupId) -> Result<Vec<UserId>> {
        let inner = self.read()?;
        Ok(inner
            .group_members
            .iter()
            .filter(|(gid, _)| gid == group_id)
            .map(|(_, uid)| *uid)
            .collect())
    }

    async fn get_membership(
        &self,
        scope: &ScopeId,
        principal: &Principal,
    ) -> Result<Option<Membership>> {
        Ok(self.read()?.memberships.get(&(*scope, *principal)).cloned())
    }

    async fn group_memberships(
        &self,
        scope: &ScopeId,
        groups: &[GroupId],
    ) -> Result<Vec<Membership>> {
        let inner = self.read()?;
        Ok(groups
            .iter()
            .filter_map(|g| inner.memberships.get(&(*scope, Principal::Group(*g))))
            .cloned()
            .collect())
    }

    async fn list_memberships(&self, scope: &ScopeId) -> Result<Vec<Membership>> {
        let inner = self.read()?;
        let mut rows: Vec<Membership> = inner
            .memberships
            .values()
            .filter(|m| m.scope == *scope)
            .cloned()
            .collect();
        rows.sort_by_key(|m| (m.created_at, m.principal));
        Ok(rows)
    }

    async fn get_share(
        &self,
        resource_id: &ResourceId,
        principal: &Principal,
    ) -> Result<Option<ResourceShare>> {
        Ok(self.read()?.shares.get(&(*resource_id, *principal)).cloned())
    }

    async fn group_shares(
        &self,
        resource_id: &ResourceId,
        groups: &[GroupId],
    ) -> Result<Vec<ResourceShare>> {
        let inner = self.read()?;
        Ok(groups
            .iter()
            .filter_map(|g| inner.shares.get(&(*resource_id, Principal::Group(*g))))
            .cloned()
            .collect())
    }

    async fn list_shares(&self, resource_id: &ResourceId) -> Result<Vec<ResourceShare>> {
        let inner = self.read()?;
        let mut rows: Vec<ResourceShare> = inner
            .shares
            .values()
            .filter(|s| s.resource_id == *resource_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.shared_at, s.principal));
        Ok(rows)
    }

    async fn list_area_shares(&self, document_id: &ResourceId) -> Result<Vec<AreaDocumentShare>> {
        let inner = self.read()?;
        let mut rows: Vec<AreaDocumentShare> = inner
            .area_shares
            .values()
            .filter(|s| s.document_id == *document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.shared_at, s.area_id));
        Ok(rows)
    }

    async fn get_area_share(
        &self,
        document_id: &ResourceId,
        area_id: &AreaId,
    ) -> Result<Option<AreaDocumentShare>> {
        Ok(self
            .read()?
            .area_shares
            .get(&(*document_id, *area_id))
            .cloned())
    }

    async fn list_context(&self, area_id: &AreaId) -> Result<Vec<ContextRef>> {
        let inner = self.read()?;
        let mut rows: Vec<ContextRef> = inner
            .context
            .values()
            .filter(|c| c.area_id == *area_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.added_at, c.document_id));
        Ok(rows)
    }

    async fn contexts_for_document(&self, document_id: &ResourceId) -> Result<Vec<ContextRef>> {
        let inner = self.read()?;
        let mut rows: Vec<ContextRef> = inner
            .context
            .values()
            .filter(|c| c.document_id == *document_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| (c.added_at, c.area_id));
        Ok(rows)
    }

    async fn apply(&self, changes: ChangeSet) -> Result<ApplyReport> {
        let mut inner = self.write()?;

        for guard in &changes.guards {
            inner.check_guard(guard)?;
        }

        // Work on a copy so a failing mutation leaves the live state untouched
        let mut next = inner.clone();
        let mut affected = Vec::with_capacity(changes.mutations.len());
        for mutation in &changes.mutations {
            affected.push(next.apply_mutation(mutation)?);
        }

        *inner = next;
        Ok(ApplyReport { affected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopegate_core::{Permission, Role, Visibility};

    fn space(owner: UserId) -> Space {
        Space {
            id: SpaceId::generate(),
            organization_id: None,
            name: "Product".into(),
            owner_id: owner,
            created_at: 1_000,
            deleted_at: None,
        }
    }

    fn area(space_id: SpaceId, owner: UserId, general: bool) -> Area {
        Area {
            id: AreaId::generate(),
            space_id,
            name: if general { "General".into() } else { "Design".into() },
            created_by: owner,
            is_restricted: false,
            is_general: general,
            created_at: 1_000,
            deleted_at: None,
        }
    }

    fn page(owner: UserId, area_id: AreaId) -> Resource {
        Resource {
            id: ResourceId::generate(),
            owner_id: owner,
            title: "Notes".into(),
            placement: Placement::Page { area_id },
            visibility: Visibility::Private,
            created_at: 1_000,
            updated_at: 1_000,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let s = space(owner);
        let a = area(s.id, owner, true);

        let report = store
            .apply(
                ChangeSet::new()
                    .push(Mutation::InsertSpace(s.clone()))
                    .push(Mutation::InsertArea(a.clone())),
            )
            .await
            .unwrap();
        assert_eq!(report.affected, vec![1, 1]);

        assert_eq!(store.get_space(&s.id).await.unwrap(), Some(s.clone()));
        assert_eq!(store.list_areas(&s.id).await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn test_failed_mutation_rolls_back() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let s = space(owner);

        // Second mutation references a space that does not exist
        let orphan = area(SpaceId::generate(), owner, false);
        let err = store
            .apply(
                ChangeSet::new()
                    .push(Mutation::InsertSpace(s.clone()))
                    .push(Mutation::InsertArea(orphan)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "space", .. }));
        assert!(store.get_space(&s.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guard_blocks_write() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let s = space(owner);
        let a = area(s.id, owner, true);
        let p = page(owner, a.id);
        store
            .apply(
                ChangeSet::new()
                    .push(Mutation::InsertSpace(s))
                    .push(Mutation::InsertArea(a))
                    .push(Mutation::InsertResource(p.clone())),
            )
            .await
            .unwrap();

        let share = ResourceShare {
            resource_id: p.id,
            principal: Principal::User(UserId::generate()),
            permission: Permission::Viewer,
            shared_by: owner,
            shared_at: 2_000,
        };
        let err = store
            .apply(
                ChangeSet::new()
                    .guard(Guard::Visibility {
                        resource_id: p.id,
                        expected: Visibility::Area,
                    })
                    .push(Mutation::UpsertShare(share)),
            )
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
        assert!(store.list_shares(&p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_membership_upsert_keeps_single_row() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let member = UserId::generate();
        let s = space(owner);
        store
            .apply(ChangeSet::new().push(Mutation::InsertSpace(s.clone())))
            .await
            .unwrap();

        let scope = ScopeId::Space(s.id);
        for role in [Role::Guest, Role::Admin] {
            store
                .apply(ChangeSet::new().push(Mutation::UpsertMembership(Membership {
                    scope,
                    principal: Principal::User(member),
                    role,
                    invited_by: Some(owner),
                    created_at: 1_500,
                })))
                .await
                .unwrap();
        }

        let rows = store.list_memberships(&scope).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].role, Role::Admin);
    }

    #[tokio::test]
    async fn test_idempotent_deletes() {
        let store = MemoryStore::new();
        let report = store
            .apply(ChangeSet::new().push(Mutation::DeleteShare {
                resource_id: ResourceId::generate(),
                principal: Principal::User(UserId::generate()),
            }))
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_single_general_area_per_space() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let s = space(owner);
        store
            .apply(
                ChangeSet::new()
                    .push(Mutation::InsertSpace(s.clone()))
                    .push(Mutation::InsertArea(area(s.id, owner, true))),
            )
            .await
            .unwrap();

        let err = store
            .apply(ChangeSet::new().push(Mutation::InsertArea(area(s.id, owner, true))))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    fn document(owner: UserId, space_id: Option<SpaceId>) -> Resource {
        Resource {
            id: ResourceId::generate(),
            owner_id: owner,
            title: "Brief".into(),
            placement: Placement::Document { space_id },
            visibility: Visibility::Area,
            created_at: 1_000,
            updated_at: 1_000,
            deleted_at: None,
        }
    }

    fn context(area_id: AreaId, document_id: ResourceId, added_by: UserId) -> ContextRef {
        ContextRef {
            area_id,
            document_id,
            added_by,
            added_at: 3_000,
        }
    }

    #[tokio::test]
    async fn test_context_add_needs_live_area_share() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let s = space(owner);
        let a = area(s.id, owner, false);
        let d = document(owner, Some(s.id));
        store
            .apply(
                ChangeSet::new()
                    .push(Mutation::InsertSpace(s))
                    .push(Mutation::InsertArea(a.clone()))
                    .push(Mutation::InsertResource(d.clone()))
                    .push(Mutation::UpsertAreaShare(AreaDocumentShare {
                        document_id: d.id,
                        area_id: a.id,
                        shared_by: owner,
                        shared_at: 2_000,
                        notifications_sent: false,
                    })),
            )
            .await
            .unwrap();

        // Planned while the share existed, committed after it was removed
        let add = ChangeSet::new()
            .guard(Guard::AreaShareExists {
                document_id: d.id,
                area_id: a.id,
            })
            .push(Mutation::AddContextRef(context(a.id, d.id, owner)));
        store
            .apply(ChangeSet::new().push(Mutation::DeleteAreaShare {
                document_id: d.id,
                area_id: a.id,
            }))
            .await
            .unwrap();

        let err = store.apply(add).await.unwrap_err();
        assert!(err.is_precondition_failed());
        assert!(store.list_context(&a.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_prunes_read_state_at_apply_time() {
        let store = MemoryStore::new();
        let owner = UserId::generate();
        let home = space(owner);
        let elsewhere = space(owner);
        let kept = area(home.id, owner, true);
        let unshared = area(home.id, owner, false);
        let foreign = area(elsewhere.id, owner, false);
        let d = document(owner, Some(home.id));

        let mut setup = ChangeSet::new()
            .push(Mutation::InsertSpace(home))
            .push(Mutation::InsertSpace(elsewhere))
            .push(Mutation::InsertResource(d.clone()));
        for a in [&kept, &unshared, &foreign] {
            setup = setup.push(Mutation::InsertArea(a.clone()));
        }
        let setup = setup.push(Mutation::UpsertAreaShare(AreaDocumentShare {
            document_id: d.id,
            area_id: kept.id,
            shared_by: owner,
            shared_at: 2_000,
            notifications_sent: false,
        }));
        store.apply(setup).await.unwrap();
        for a in [&kept, &unshared, &foreign] {
            store
                .apply(ChangeSet::new().push(Mutation::AddContextRef(context(a.id, d.id, owner))))
                .await
                .unwrap();
        }

        let report = store
            .apply(ChangeSet::new().push(Mutation::PruneContextOutsideSpace { document_id: d.id }))
            .await
            .unwrap();
        assert_eq!(report.total(), 1);
        assert!(store.list_context(&foreign.id).await.unwrap().is_empty());

        let report = store
            .apply(ChangeSet::new().push(Mutation::PruneUnsharedContext { document_id: d.id }))
            .await
            .unwrap();
        assert_eq!(report.total(), 1);
        assert!(store.list_context(&unshared.id).await.unwrap().is_empty());
        assert_eq!(store.list_context(&kept.id).await.unwrap().len(), 1);
    }
}
