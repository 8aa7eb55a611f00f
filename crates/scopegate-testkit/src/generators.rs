//! Proptest generators for property-based testing.

use proptest::prelude::*;

use scopegate::Result;
use scopegate_core::{
    AreaId, Permission, Principal, Resource, ResourceId, Role, ScopeId, SpaceId, UserId,
    Visibility, ID_LEN,
};

use crate::fixtures::TestWorld;

pub fn user_id() -> impl Strategy<Value = UserId> {
    any::<[u8; ID_LEN]>().prop_map(UserId::from_bytes)
}

pub fn space_id() -> impl Strategy<Value = SpaceId> {
    any::<[u8; ID_LEN]>().prop_map(SpaceId::from_bytes)
}

pub fn area_id() -> impl Strategy<Value = AreaId> {
    any::<[u8; ID_LEN]>().prop_map(AreaId::from_bytes)
}

pub fn resource_id() -> impl Strategy<Value = ResourceId> {
    any::<[u8; ID_LEN]>().prop_map(ResourceId::from_bytes)
}

pub fn role() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

/// Roles a space membership may hold.
pub fn space_role() -> impl Strategy<Value = Role> {
    prop::sample::select(vec![Role::Guest, Role::Member, Role::Admin, Role::Owner])
}

/// Roles an area membership may hold.
pub fn area_role() -> impl Strategy<Value = Role> {
    prop::sample::select(vec![Role::Viewer, Role::Member, Role::Admin, Role::Owner])
}

pub fn permission() -> impl Strategy<Value = Permission> {
    prop::sample::select(Permission::ALL.to_vec())
}

pub fn visibility() -> impl Strategy<Value = Visibility> {
    prop_oneof![
        Just(Visibility::Private),
        Just(Visibility::Area),
        Just(Visibility::Space),
    ]
}

/// Generate a name that passes validation.
pub fn name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_-]{0,31}".prop_map(String::from)
}

/// Every path through which one user may reach one document in a fresh
/// world: memberships on the space and on one area (direct and through a
/// group), and explicit shares (direct and through the same group).
#[derive(Debug, Clone)]
pub struct AccessParams {
    pub visibility: Visibility,
    pub area_restricted: bool,
    pub space_role: Option<Role>,
    pub group_space_role: Option<Role>,
    pub area_role: Option<Role>,
    pub group_area_role: Option<Role>,
    pub direct_share: Option<Permission>,
    pub group_share: Option<Permission>,
}

impl Arbitrary for AccessParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            visibility(),
            any::<bool>(),
            proptest::option::of(space_role()),
            proptest::option::of(space_role()),
            proptest::option::of(area_role()),
            proptest::option::of(area_role()),
            proptest::option::of(permission()),
            proptest::option::of(permission()),
        )
            .prop_map(
                |(
                    visibility,
                    area_restricted,
                    space_role,
                    group_space_role,
                    area_role,
                    group_area_role,
                    direct_share,
                    group_share,
                )| AccessParams {
                    visibility,
                    area_restricted,
                    space_role,
                    group_space_role,
                    area_role,
                    group_area_role,
                    direct_share,
                    group_share,
                },
            )
            .boxed()
    }
}

impl AccessParams {
    /// The permission the user should resolve to, computed without a store.
    pub fn expected_permission(&self) -> Option<Permission> {
        match self.visibility {
            Visibility::Private => self.direct_share.max(self.group_share),
            Visibility::Area => self.expected_area_grant(),
            Visibility::Space => self
                .space_role
                .max(self.group_space_role)
                .map(|role| role.to_permission()),
        }
    }

    fn expected_area_grant(&self) -> Option<Permission> {
        if let Some(role) = self.area_role.max(self.group_area_role) {
            return Some(role.to_permission());
        }
        if self.area_restricted {
            return None;
        }
        match self.space_role.max(self.group_space_role) {
            Some(role) if role > Role::Guest => Some(Permission::Editor),
            _ => None,
        }
    }

    /// Build the scenario in `world`: returns the user and a document owned
    /// by the world's owner, shared into one area.
    pub async fn build(&self, world: &TestWorld) -> Result<(UserId, Resource)> {
        let user = UserId::generate();
        let group = Principal::Group(world.group_of(&[user]).await?);
        let area = world.area("Target", self.area_restricted).await?;
        let space = ScopeId::Space(world.space.id);

        let memberships = [
            (space, Principal::User(user), self.space_role),
            (space, group, self.group_space_role),
            (ScopeId::Area(area.id), Principal::User(user), self.area_role),
            (ScopeId::Area(area.id), group, self.group_area_role),
        ];
        for (scope, principal, role) in memberships {
            if let Some(role) = role {
                world.grant(scope, principal, role).await?;
            }
        }

        let doc = world.document(world.owner, Visibility::Private).await?;
        let shares = [
            (Principal::User(user), self.direct_share),
            (group, self.group_share),
        ];
        for (principal, permission) in shares {
            if let Some(permission) = permission {
                world
                    .engine
                    .share(&doc.id, principal, permission, world.owner)
                    .await?;
            }
        }

        world
            .engine
            .share_with_area(&doc.id, &area.id, world.owner)
            .await?;
        if self.visibility != Visibility::Private {
            // Leaving private drops the explicit shares.
            world
                .engine
                .change_visibility(&doc.id, self.visibility, Some(world.owner))
                .await?;
        }

        Ok((user, doc))
    }
}
