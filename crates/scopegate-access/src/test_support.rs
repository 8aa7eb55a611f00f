//! A small populated world for unit tests, written straight to the store.

use std::sync::Arc;

use scopegate_core::{
    now_millis, Area, AreaId, Group, GroupId, Membership, Placement, Principal, Resource,
    ResourceId, Role, ScopeId, Space, SpaceId, UserId, Visibility, GENERAL_AREA_NAME,
};
use scopegate_store::{ChangeSet, MemoryStore, Mutation, Store, StoreExt};

pub(crate) struct World {
    pub store: Arc<MemoryStore>,
    pub owner: UserId,
    pub space: Space,
    pub general: Area,
}

impl World {
    /// A space owned by a fresh user, with its General area.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let owner = UserId::generate();
        let now = now_millis();
        let space = Space {
            id: SpaceId::generate(),
            organization_id: None,
            name: "Research".into(),
            owner_id: owner,
            created_at: now,
            deleted_at: None,
        };
        let general = Area {
            id: AreaId::generate(),
            space_id: space.id,
            name: GENERAL_AREA_NAME.into(),
            created_by: owner,
            is_restricted: false,
            is_general: true,
            created_at: now,
            deleted_at: None,
        };
        store
            .apply(
                ChangeSet::new()
                    .push(Mutation::InsertSpace(space.clone()))
                    .push(Mutation::InsertArea(general.clone())),
            )
            .await
            .unwrap();

        Self {
            store,
            owner,
            space,
            general,
        }
    }

    pub async fn area(&self, name: &str, is_restricted: bool) -> Area {
        let area = Area {
            id: AreaId::generate(),
            space_id: self.space.id,
            name: name.into(),
            created_by: self.owner,
            is_restricted,
            is_general: false,
            created_at: now_millis(),
            deleted_at: None,
        };
        self.store
            .apply_one(Mutation::InsertArea(area.clone()))
            .await
            .unwrap();
        area
    }

    pub async fn member(&self, scope: impl Into<ScopeId>, principal: impl Into<Principal>, role: Role) {
        self.store
            .apply_one(Mutation::UpsertMembership(Membership {
                scope: scope.into(),
                principal: principal.into(),
                role,
                invited_by: Some(self.owner),
                created_at: now_millis(),
            }))
            .await
            .unwrap();
    }

    pub async fn group(&self, members: &[UserId]) -> GroupId {
        let group = Group {
            id: GroupId::generate(),
            organization_id: None,
            name: "Team".into(),
            created_at: now_millis(),
        };
        let id = group.id;
        let changes = ChangeSet::new()
            .push(Mutation::InsertGroup(group))
            .extend(members.iter().map(|user_id| Mutation::AddGroupMember {
                group_id: id,
                user_id: *user_id,
            }));
        self.store.apply(changes).await.unwrap();
        id
    }

    pub async fn page(&self, area: &Area, owner: UserId, visibility: Visibility) -> Resource {
        self.resource(owner, Placement::Page { area_id: area.id }, visibility)
            .await
    }

    pub async fn document(&self, owner: UserId, visibility: Visibility) -> Resource {
        self.resource(
            owner,
            Placement::Document {
                space_id: Some(self.space.id),
            },
            visibility,
        )
        .await
    }

    async fn resource(&self, owner: UserId, placement: Placement, visibility: Visibility) -> Resource {
        let now = now_millis();
        let resource = Resource {
            id: ResourceId::generate(),
            owner_id: owner,
            title: "Notes".into(),
            placement,
            visibility,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.store
            .apply_one(Mutation::InsertResource(resource.clone()))
            .await
            .unwrap();
        resource
    }

    pub async fn delete_area(&self, area: &Area) {
        self.store
            .apply_one(Mutation::SoftDeleteArea {
                area_id: area.id,
                at: now_millis(),
            })
            .await
            .unwrap();
    }
}
