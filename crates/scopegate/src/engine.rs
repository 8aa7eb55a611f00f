//! The Engine: unified API for Scopegate.
//!
//! The Engine wires the resolvers and managers to one store, runs the scope
//! and resource lifecycle, and reports committed changes to an audit sink.

use std::sync::Arc;

use scopegate_access::{
    Decision, GroupExpansion, MembershipManager, ResourceAccess, ResourceResolver, ScopeAccess,
    ScopeAccessResolver, ScopeResolver, ShareManager, VisibilityChange,
};
use scopegate_core::{
    now_millis, validate_area_name, validate_name, Area, AreaDocumentShare, AreaId, ContextRef,
    Group, GroupId, Membership, OrganizationId, Permission, Placement, Principal, Resource,
    ResourceId, ResourceShare, Role, ScopeId, Space, SpaceId, UserId, Visibility,
    GENERAL_AREA_NAME,
};
use scopegate_store::{ApplyReport, ChangeSet, Guard, Mutation, SqliteStore, Store, StoreExt};

use crate::audit::{AuditAction, AuditEvent, AuditSink, NoopAuditSink, TracingAuditSink};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// The main Engine struct.
///
/// Provides a unified API for:
/// - Resolving scope and resource access
/// - Creating and deleting spaces, areas, pages and documents
/// - Managing memberships, groups, shares and area context
/// - Changing resource visibility with its cascade
pub struct Engine<S: Store> {
    /// The storage backend.
    store: Arc<S>,
    /// Configuration.
    config: EngineConfig,
    scopes: Arc<ScopeResolver<S>>,
    resources: ResourceResolver<S, Arc<ScopeResolver<S>>>,
    shares: ShareManager<S>,
    members: MembershipManager<S>,
    groups: GroupExpansion<S>,
    audit: Arc<dyn AuditSink>,
}

impl Engine<SqliteStore> {
    /// Open the SQLite store named by the configuration.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = config.store.open()?;
        Ok(Self::new(store, config))
    }
}

impl<S: Store> Engine<S> {
    /// Create a new engine over a store.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self::with_store(Arc::new(store), config)
    }

    /// Create a new engine over a shared store.
    pub fn with_store(store: Arc<S>, config: EngineConfig) -> Self {
        let scopes = Arc::new(ScopeResolver::new(Arc::clone(&store)));
        let audit: Arc<dyn AuditSink> = if config.audit {
            Arc::new(TracingAuditSink)
        } else {
            Arc::new(NoopAuditSink)
        };

        Self {
            resources: ResourceResolver::new(Arc::clone(&store), Arc::clone(&scopes)),
            shares: ShareManager::new(Arc::clone(&store)),
            members: MembershipManager::new(Arc::clone(&store)),
            groups: GroupExpansion::new(Arc::clone(&store)),
            scopes,
            store,
            config,
            audit,
        }
    }

    /// Replace the audit sink.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn shares(&self) -> &ShareManager<S> {
        &self.shares
    }

    pub fn memberships(&self) -> &MembershipManager<S> {
        &self.members
    }

    fn emit(&self, actor: Option<UserId>, action: AuditAction) {
        self.audit.record(AuditEvent {
            at: now_millis(),
            actor,
            action,
        });
    }

    async fn commit(&self, changes: ChangeSet) -> Result<ApplyReport> {
        self.store.apply(changes).await.map_err(|e| {
            let err = EngineError::from_apply(e);
            if err.is_conflict() {
                tracing::warn!(error = %err, "change set rejected");
            }
            err
        })
    }

    async fn live_space(&self, space_id: &SpaceId) -> Result<Space> {
        self.store
            .live_space(space_id)
            .await?
            .ok_or_else(|| EngineError::not_found("space", space_id))
    }

    async fn live_area(&self, area_id: &AreaId) -> Result<Area> {
        self.store
            .live_area(area_id)
            .await?
            .ok_or_else(|| EngineError::not_found("area", area_id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Resolution
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve a user's access to a space or area.
    pub async fn resolve_scope_access(&self, user_id: &UserId, scope: &ScopeId) -> Result<ScopeAccess> {
        Ok(self.scopes.resolve_scope_access(user_id, scope).await?)
    }

    /// Resolve a user's access to a page or document.
    pub async fn resolve_resource_access(
        &self,
        user_id: &UserId,
        resource_id: &ResourceId,
    ) -> Result<ResourceAccess> {
        Ok(self
            .resources
            .resolve_resource_access(user_id, resource_id)
            .await?)
    }

    /// Decide whether a user holds at least `required` on a resource.
    pub async fn authorize(
        &self,
        user_id: &UserId,
        resource_id: &ResourceId,
        required: Permission,
    ) -> Result<Decision> {
        Ok(self.resources.authorize(user_id, resource_id, required).await?)
    }

    /// Like [`Engine::authorize`], but a denial is an error.
    pub async fn require(
        &self,
        user_id: &UserId,
        resource_id: &ResourceId,
        required: Permission,
    ) -> Result<ResourceAccess> {
        let decision = self.authorize(user_id, resource_id, required).await?;
        if decision.allowed {
            Ok(decision.access)
        } else {
            Err(EngineError::NotAuthorized {
                user: *user_id,
                resource: *resource_id,
                required,
            })
        }
    }

    /// Authorize from string inputs as they arrive at a service boundary.
    ///
    /// Malformed ids and unknown permission names are rejected before the
    /// store is consulted.
    pub async fn authorize_request(&self, user_id: &str, resource_id: &str, required: &str) -> Result<Decision> {
        let user_id = UserId::parse(user_id)?;
        let resource_id = ResourceId::parse(resource_id)?;
        let required: Permission = required.parse()?;
        self.authorize(&user_id, &resource_id, required).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Spaces and Areas
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a space and its General area.
    pub async fn create_space(
        &self,
        owner_id: UserId,
        name: &str,
        organization_id: Option<OrganizationId>,
    ) -> Result<(Space, Area)> {
        validate_name(name)?;
        let now = now_millis();
        let space = Space {
            id: SpaceId::generate(),
            organization_id,
            name: name.to_string(),
            owner_id,
            created_at: now,
            deleted_at: None,
        };
        let general = Area {
            id: AreaId::generate(),
            space_id: space.id,
            name: GENERAL_AREA_NAME.to_string(),
            created_by: owner_id,
            is_restricted: false,
            is_general: true,
            created_at: now,
            deleted_at: None,
        };

        self.commit(
            ChangeSet::new()
                .push(Mutation::InsertSpace(space.clone()))
                .push(Mutation::InsertArea(general.clone())),
        )
        .await?;

        tracing::info!(space = %space.id, owner = %owner_id, "space created");
        self.emit(
            Some(owner_id),
            AuditAction::SpaceCreated {
                space_id: space.id,
                general_area_id: general.id,
            },
        );
        Ok((space, general))
    }

    /// Create an area in a live space.
    pub async fn create_area(
        &self,
        space_id: &SpaceId,
        name: &str,
        created_by: UserId,
        is_restricted: bool,
    ) -> Result<Area> {
        validate_area_name(name)?;
        self.live_space(space_id).await?;

        let area = Area {
            id: AreaId::generate(),
            space_id: *space_id,
            name: name.to_string(),
            created_by,
            is_restricted,
            is_general: false,
            created_at: now_millis(),
            deleted_at: None,
        };
        self.commit(
            ChangeSet::new()
                .guard(Guard::SpaceLive(*space_id))
                .push(Mutation::InsertArea(area.clone())),
        )
        .await?;

        tracing::info!(area = %area.id, space = %space_id, is_restricted, "area created");
        self.emit(
            Some(created_by),
            AuditAction::AreaCreated {
                area_id: area.id,
                space_id: *space_id,
            },
        );
        Ok(area)
    }

    /// Rename an area. The General area keeps its name.
    pub async fn rename_area(&self, area_id: &AreaId, name: &str) -> Result<Area> {
        validate_area_name(name)?;
        let area = self.live_area(area_id).await?;
        if area.is_general {
            return Err(EngineError::ProtectedArea(*area_id));
        }

        self.commit(
            ChangeSet::new()
                .guard(Guard::AreaLive(*area_id))
                .push(Mutation::UpdateArea {
                    area_id: *area_id,
                    name: Some(name.to_string()),
                    is_restricted: None,
                }),
        )
        .await?;

        tracing::info!(area = %area_id, "area renamed");
        self.emit(
            None,
            AuditAction::AreaRenamed {
                area_id: *area_id,
                name: name.to_string(),
            },
        );
        Ok(Area {
            name: name.to_string(),
            ..area
        })
    }

    /// Turn inheritance of space access into an area off (restricted) or on.
    pub async fn set_area_restricted(&self, area_id: &AreaId, is_restricted: bool) -> Result<Area> {
        let area = self.live_area(area_id).await?;
        if area.is_restricted == is_restricted {
            return Ok(area);
        }

        self.commit(
            ChangeSet::new()
                .guard(Guard::AreaLive(*area_id))
                .push(Mutation::UpdateArea {
                    area_id: *area_id,
                    name: None,
                    is_restricted: Some(is_restricted),
                }),
        )
        .await?;

        tracing::info!(area = %area_id, is_restricted, "area restriction changed");
        self.emit(
            None,
            AuditAction::AreaRestrictionChanged {
                area_id: *area_id,
                is_restricted,
            },
        );
        Ok(Area {
            is_restricted,
            ..area
        })
    }

    /// Soft-delete an area and clear its context list in one commit.
    ///
    /// Returns the number of context references pruned. The General area
    /// cannot be deleted on its own.
    pub async fn delete_area(&self, area_id: &AreaId) -> Result<usize> {
        let area = self.live_area(area_id).await?;
        if area.is_general {
            return Err(EngineError::ProtectedArea(*area_id));
        }

        let report = self
            .commit(
                ChangeSet::new()
                    .guard(Guard::AreaLive(*area_id))
                    .push(Mutation::SoftDeleteArea {
                        area_id: *area_id,
                        at: now_millis(),
                    })
                    .push(Mutation::ClearAreaContext { area_id: *area_id }),
            )
            .await?;

        let context_pruned = report.affected_at(1);
        tracing::info!(area = %area_id, context_pruned, "area deleted");
        self.emit(
            None,
            AuditAction::AreaDeleted {
                area_id: *area_id,
                context_pruned,
            },
        );
        Ok(context_pruned)
    }

    /// Soft-delete a space with all of its areas, General included, and clear
    /// their context lists in one commit.
    pub async fn delete_space(&self, space_id: &SpaceId) -> Result<()> {
        self.live_space(space_id).await?;
        let areas: Vec<Area> = self
            .store
            .list_areas(space_id)
            .await?
            .into_iter()
            .filter(Area::is_live)
            .collect();

        let at = now_millis();
        let mut changes = ChangeSet::new()
            .guard(Guard::SpaceLive(*space_id))
            .push(Mutation::SoftDeleteSpace {
                space_id: *space_id,
                at,
            });
        for area in &areas {
            changes = changes
                .push(Mutation::SoftDeleteArea {
                    area_id: area.id,
                    at,
                })
                .push(Mutation::ClearAreaContext { area_id: area.id });
        }
        let plan = changes.clone();
        let report = self.commit(changes).await?;

        let context_pruned = plan
            .mutations
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(m, Mutation::ClearAreaContext { .. }))
            .map(|(i, _)| report.affected_at(i))
            .sum::<usize>();

        tracing::info!(space = %space_id, areas = areas.len(), context_pruned, "space deleted");
        self.emit(
            None,
            AuditAction::SpaceDeleted {
                space_id: *space_id,
                areas_deleted: areas.len(),
                context_pruned,
            },
        );
        Ok(())
    }

    /// Areas of a space that have not been deleted, oldest first.
    pub async fn list_areas(&self, space_id: &SpaceId) -> Result<Vec<Area>> {
        Ok(self
            .store
            .list_areas(space_id)
            .await?
            .into_iter()
            .filter(Area::is_live)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pages and Documents
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a page in a live area.
    pub async fn create_page(
        &self,
        area_id: &AreaId,
        owner_id: UserId,
        title: &str,
        visibility: Visibility,
    ) -> Result<Resource> {
        let resource = new_resource(owner_id, title, Placement::Page { area_id: *area_id }, visibility)?;
        self.live_area(area_id).await?;
        self.insert_resource(ChangeSet::new().guard(Guard::AreaLive(*area_id)), resource)
            .await
    }

    /// Create a document, optionally scoped to a live space.
    pub async fn create_document(
        &self,
        space_id: Option<SpaceId>,
        owner_id: UserId,
        title: &str,
        visibility: Visibility,
    ) -> Result<Resource> {
        let resource = new_resource(owner_id, title, Placement::Document { space_id }, visibility)?;
        let mut changes = ChangeSet::new();
        if let Some(space_id) = space_id {
            self.live_space(&space_id).await?;
            changes = changes.guard(Guard::SpaceLive(space_id));
        }
        self.insert_resource(changes, resource).await
    }

    async fn insert_resource(&self, changes: ChangeSet, resource: Resource) -> Result<Resource> {
        self.commit(changes.push(Mutation::InsertResource(resource.clone())))
            .await?;

        tracing::info!(
            resource = %resource.id,
            kind = %resource.kind(),
            visibility = %resource.visibility,
            "resource created"
        );
        self.emit(
            Some(resource.owner_id),
            AuditAction::ResourceCreated {
                resource_id: resource.id,
                kind: resource.kind(),
            },
        );
        Ok(resource)
    }

    /// Soft-delete a resource and remove it from every area context list.
    ///
    /// Returns the number of context references pruned.
    pub async fn delete_resource(&self, resource_id: &ResourceId) -> Result<usize> {
        if self.store.live_resource(resource_id).await?.is_none() {
            return Err(EngineError::not_found("resource", resource_id));
        }

        let report = self
            .commit(
                ChangeSet::new()
                    .guard(Guard::ResourceLive(*resource_id))
                    .push(Mutation::SoftDeleteResource {
                        resource_id: *resource_id,
                        at: now_millis(),
                    })
                    .push(Mutation::RemoveFromAllContexts {
                        document_id: *resource_id,
                    }),
            )
            .await?;

        let context_pruned = report.affected_at(1);
        tracing::info!(resource = %resource_id, context_pruned, "resource deleted");
        self.emit(
            None,
            AuditAction::ResourceDeleted {
                resource_id: *resource_id,
                context_pruned,
            },
        );
        Ok(context_pruned)
    }

    /// Move a resource to a new visibility, applying the share cascade.
    pub async fn change_visibility(
        &self,
        resource_id: &ResourceId,
        to: Visibility,
        actor: Option<UserId>,
    ) -> Result<VisibilityChange> {
        let change = self.shares.change_visibility(resource_id, to).await?;
        if !change.is_noop() {
            self.emit(
                actor,
                AuditAction::VisibilityChanged {
                    resource_id: *resource_id,
                    change,
                },
            );
        }
        Ok(change)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sharing
    // ─────────────────────────────────────────────────────────────────────────

    /// Share a private resource with a user or group.
    pub async fn share(
        &self,
        resource_id: &ResourceId,
        principal: Principal,
        permission: Permission,
        granted_by: UserId,
    ) -> Result<ResourceShare> {
        let share = self
            .shares
            .share(resource_id, principal, permission, granted_by)
            .await?;
        self.emit(
            Some(granted_by),
            AuditAction::Shared {
                resource_id: *resource_id,
                principal,
                permission,
            },
        );
        Ok(share)
    }

    /// Remove a share. Returns whether one was removed.
    pub async fn unshare(
        &self,
        resource_id: &ResourceId,
        principal: Principal,
        actor: Option<UserId>,
    ) -> Result<bool> {
        let removed = self.shares.unshare(resource_id, principal).await?;
        if removed {
            self.emit(
                actor,
                AuditAction::Unshared {
                    resource_id: *resource_id,
                    principal,
                },
            );
        }
        Ok(removed)
    }

    /// Share a document into an area.
    pub async fn share_with_area(
        &self,
        document_id: &ResourceId,
        area_id: &AreaId,
        shared_by: UserId,
    ) -> Result<AreaDocumentShare> {
        let share = self
            .shares
            .share_with_area(document_id, area_id, shared_by)
            .await?;
        self.emit(
            Some(shared_by),
            AuditAction::SharedWithArea {
                document_id: *document_id,
                area_id: *area_id,
            },
        );
        Ok(share)
    }

    /// Withdraw a document from an area, pruning that area's context.
    pub async fn unshare_from_area(
        &self,
        document_id: &ResourceId,
        area_id: &AreaId,
        actor: Option<UserId>,
    ) -> Result<bool> {
        let removed = self.shares.unshare_from_area(document_id, area_id).await?;
        if removed {
            self.emit(
                actor,
                AuditAction::UnsharedFromArea {
                    document_id: *document_id,
                    area_id: *area_id,
                },
            );
        }
        Ok(removed)
    }

    /// Mark a document as active in an area.
    pub async fn add_to_area_context(
        &self,
        area_id: &AreaId,
        document_id: &ResourceId,
        added_by: UserId,
    ) -> Result<bool> {
        Ok(self
            .shares
            .add_to_area_context(area_id, document_id, added_by)
            .await?)
    }

    pub async fn remove_from_area_context(&self, area_id: &AreaId, document_id: &ResourceId) -> Result<bool> {
        Ok(self
            .shares
            .remove_from_area_context(area_id, document_id)
            .await?)
    }

    pub async fn list_area_context(&self, area_id: &AreaId) -> Result<Vec<ContextRef>> {
        Ok(self.shares.list_area_context(area_id).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Memberships
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a member to a space or area, or change the role it holds.
    pub async fn add_member(
        &self,
        scope: ScopeId,
        principal: Principal,
        role: Role,
        invited_by: Option<UserId>,
    ) -> Result<Membership> {
        let membership = self
            .members
            .add_member(scope, principal, role, invited_by)
            .await?;
        self.emit(
            invited_by,
            AuditAction::MemberAdded {
                scope,
                principal,
                role,
            },
        );
        Ok(membership)
    }

    /// Change the role of an existing member.
    pub async fn update_role(
        &self,
        scope: ScopeId,
        principal: Principal,
        role: Role,
        actor: Option<UserId>,
    ) -> Result<Membership> {
        let membership = self.members.update_role(scope, principal, role).await?;
        self.emit(
            actor,
            AuditAction::RoleChanged {
                scope,
                principal,
                role,
            },
        );
        Ok(membership)
    }

    /// Remove a member. Returns whether one was removed.
    pub async fn remove_member(
        &self,
        scope: ScopeId,
        principal: Principal,
        actor: Option<UserId>,
    ) -> Result<bool> {
        let removed = self.members.remove_member(scope, principal).await?;
        if removed {
            self.emit(actor, AuditAction::MemberRemoved { scope, principal });
        }
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Groups
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a group.
    pub async fn create_group(&self, name: &str, organization_id: Option<OrganizationId>) -> Result<Group> {
        validate_name(name)?;
        let group = Group {
            id: GroupId::generate(),
            organization_id,
            name: name.to_string(),
            created_at: now_millis(),
        };
        self.commit(ChangeSet::new().push(Mutation::InsertGroup(group.clone())))
            .await?;

        tracing::info!(group = %group.id, "group created");
        self.emit(None, AuditAction::GroupCreated { group_id: group.id });
        Ok(group)
    }

    /// Add a user to a group. Returns false if they were already in it.
    pub async fn add_group_member(&self, group_id: &GroupId, user_id: UserId) -> Result<bool> {
        let report = self
            .commit(ChangeSet::new().push(Mutation::AddGroupMember {
                group_id: *group_id,
                user_id,
            }))
            .await?;

        let added = report.total() > 0;
        if added {
            tracing::info!(group = %group_id, user = %user_id, "group member added");
            self.emit(
                None,
                AuditAction::GroupMemberAdded {
                    group_id: *group_id,
                    user_id,
                },
            );
        }
        Ok(added)
    }

    /// Remove a user from a group. Returns whether they were in it.
    pub async fn remove_group_member(&self, group_id: &GroupId, user_id: UserId) -> Result<bool> {
        let report = self
            .commit(ChangeSet::new().push(Mutation::RemoveGroupMember {
                group_id: *group_id,
                user_id,
            }))
            .await?;

        let removed = report.total() > 0;
        if removed {
            tracing::info!(group = %group_id, user = %user_id, "group member removed");
            self.emit(
                None,
                AuditAction::GroupMemberRemoved {
                    group_id: *group_id,
                    user_id,
                },
            );
        }
        Ok(removed)
    }

    /// Groups a user belongs to.
    pub async fn groups_for(&self, user_id: &UserId) -> Result<Vec<GroupId>> {
        Ok(self.groups.groups_for(user_id).await?)
    }
}

fn new_resource(
    owner_id: UserId,
    title: &str,
    placement: Placement,
    visibility: Visibility,
) -> Result<Resource> {
    validate_name(title)?;
    let now = now_millis();
    Ok(Resource {
        id: ResourceId::generate(),
        owner_id,
        title: title.to_string(),
        placement,
        visibility,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    })
}
