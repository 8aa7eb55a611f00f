//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking. Change sets run inside a
//! `BEGIN IMMEDIATE` transaction so guards and mutations see one consistent
//! snapshot and concurrent writers serialize.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};

use scopegate_core::{
    Area, AreaDocumentShare, AreaId, ContextRef, CoreError, Group, GroupId, Membership,
    OrganizationId, Placement, Principal, Resource, ResourceId, ResourceKind, ResourceShare,
    ScopeId, ScopeKind, Space, SpaceId, UserId, Visibility,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{ApplyReport, ChangeSet, Guard, Mutation, Store};

/// How long a statement waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SPACE_COLUMNS: &str = "space_id, organization_id, name, owner_id, created_at, deleted_at";
const AREA_COLUMNS: &str =
    "area_id, space_id, name, created_by, is_restricted, is_general, created_at, deleted_at";
const RESOURCE_COLUMNS: &str = "resource_id, kind, owner_id, title, area_id, space_id, visibility,
     created_at, updated_at, deleted_at";
const GROUP_COLUMNS: &str = "group_id, organization_id, name, created_at";
const MEMBERSHIP_COLUMNS: &str =
    "scope_kind, scope_id, user_id, group_id, role, invited_by, created_at";
const SHARE_COLUMNS: &str = "resource_id, user_id, group_id, permission, shared_by, shared_at";
const AREA_SHARE_COLUMNS: &str = "document_id, area_id, shared_by, shared_at, notifications_sent";
const CONTEXT_COLUMNS: &str = "area_id, document_id, added_by, added_at";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open a SQLite database with an explicit busy timeout.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, busy_timeout)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_BUSY_TIMEOUT)
    }

    fn from_connection(mut conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.busy_timeout(busy_timeout)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation on the connection from the calling thread.
    #[cfg(test)]
    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        f(&mut conn)
    }

    /// Execute a blocking operation on the connection via spawn_blocking.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row decoding
// ─────────────────────────────────────────────────────────────────────────────

fn conversion_error(ty: Type, e: CoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(0, ty, Box::new(e))
}

fn id_col<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<T>
where
    T: for<'a> TryFrom<&'a [u8], Error = CoreError>,
{
    let bytes: Vec<u8> = row.get(col)?;
    T::try_from(bytes.as_slice()).map_err(|e| conversion_error(Type::Blob, e))
}

fn opt_id_col<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<Option<T>>
where
    T: for<'a> TryFrom<&'a [u8], Error = CoreError>,
{
    let bytes: Option<Vec<u8>> = row.get(col)?;
    bytes
        .map(|b| T::try_from(b.as_slice()).map_err(|e| conversion_error(Type::Blob, e)))
        .transpose()
}

fn enum_col<T>(row: &Row<'_>, col: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = CoreError>,
{
    let text: String = row.get(col)?;
    text.parse().map_err(|e| conversion_error(Type::Text, e))
}

fn principal_cols(row: &Row<'_>) -> rusqlite::Result<Principal> {
    let user: Option<UserId> = opt_id_col(row, "user_id")?;
    let group: Option<GroupId> = opt_id_col(row, "group_id")?;
    Principal::from_columns(user, group).map_err(|e| conversion_error(Type::Blob, e))
}

fn row_to_space(row: &Row<'_>) -> rusqlite::Result<Space> {
    Ok(Space {
        id: id_col(row, "space_id")?,
        organization_id: opt_id_col::<OrganizationId>(row, "organization_id")?,
        name: row.get("name")?,
        owner_id: id_col(row, "owner_id")?,
        created_at: row.get("created_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn row_to_area(row: &Row<'_>) -> rusqlite::Result<Area> {
    Ok(Area {
        id: id_col(row, "area_id")?,
        space_id: id_col(row, "space_id")?,
        name: row.get("name")?,
        created_by: id_col(row, "created_by")?,
        is_restricted: row.get("is_restricted")?,
        is_general: row.get("is_general")?,
        created_at: row.get("created_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn row_to_resource(row: &Row<'_>) -> rusqlite::Result<Resource> {
    let kind: ResourceKind = enum_col(row, "kind")?;
    let placement = match kind {
        ResourceKind::Page => Placement::Page {
            area_id: id_col(row, "area_id")?,
        },
        ResourceKind::Document => Placement::Document {
            space_id: opt_id_col(row, "space_id")?,
        },
    };

    Ok(Resource {
        id: id_col(row, "resource_id")?,
        owner_id: id_col(row, "owner_id")?,
        title: row.get("title")?,
        placement,
        visibility: enum_col(row, "visibility")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

fn row_to_group(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: id_col(row, "group_id")?,
        organization_id: opt_id_col(row, "organization_id")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_membership(row: &Row<'_>) -> rusqlite::Result<Membership> {
    let scope = match enum_col::<ScopeKind>(row, "scope_kind")? {
        ScopeKind::Space => ScopeId::Space(id_col(row, "scope_id")?),
        ScopeKind::Area => ScopeId::Area(id_col(row, "scope_id")?),
    };

    Ok(Membership {
        scope,
        principal: principal_cols(row)?,
        role: enum_col(row, "role")?,
        invited_by: opt_id_col(row, "invited_by")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_share(row: &Row<'_>) -> rusqlite::Result<ResourceShare> {
    Ok(ResourceShare {
        resource_id: id_col(row, "resource_id")?,
        principal: principal_cols(row)?,
        permission: enum_col(row, "permission")?,
        shared_by: id_col(row, "shared_by")?,
        shared_at: row.get("shared_at")?,
    })
}

fn row_to_area_share(row: &Row<'_>) -> rusqlite::Result<AreaDocumentShare> {
    Ok(AreaDocumentShare {
        document_id: id_col(row, "document_id")?,
        area_id: id_col(row, "area_id")?,
        shared_by: id_col(row, "shared_by")?,
        shared_at: row.get("shared_at")?,
        notifications_sent: row.get("notifications_sent")?,
    })
}

fn row_to_context(row: &Row<'_>) -> rusqlite::Result<ContextRef> {
    Ok(ContextRef {
        area_id: id_col(row, "area_id")?,
        document_id: id_col(row, "document_id")?,
        added_by: id_col(row, "added_by")?,
        added_at: row.get("added_at")?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Split a principal into `(user_id, group_id)` column values.
fn principal_params(principal: &Principal) -> (Option<Vec<u8>>, Option<Vec<u8>>) {
    let (user, group) = principal.to_columns();
    (
        user.map(|u| u.as_bytes().to_vec()),
        group.map(|g| g.as_bytes().to_vec()),
    )
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn exists(conn: &Connection, sql: &str, id: &[u8]) -> Result<bool> {
    Ok(conn
        .query_row(sql, params![id], |_| Ok(()))
        .optional()?
        .is_some())
}

fn space_exists(conn: &Connection, id: &SpaceId) -> Result<bool> {
    exists(conn, "SELECT 1 FROM spaces WHERE space_id = ?1", id.as_ref())
}

fn area_exists(conn: &Connection, id: &AreaId) -> Result<bool> {
    exists(conn, "SELECT 1 FROM areas WHERE area_id = ?1", id.as_ref())
}

fn resource_exists(conn: &Connection, id: &ResourceId) -> Result<bool> {
    exists(conn, "SELECT 1 FROM resources WHERE resource_id = ?1", id.as_ref())
}

fn group_exists(conn: &Connection, id: &GroupId) -> Result<bool> {
    exists(conn, "SELECT 1 FROM user_groups WHERE group_id = ?1", id.as_ref())
}

fn require_group_principal(conn: &Connection, principal: &Principal) -> Result<()> {
    if let Principal::Group(group_id) = principal {
        if !group_exists(conn, group_id)? {
            return Err(StoreError::not_found("group", group_id));
        }
    }
    Ok(())
}

/// `Some(deleted_at)` if the row exists.
fn deleted_at(conn: &Connection, sql: &str, id: &[u8]) -> Result<Option<Option<i64>>> {
    Ok(conn.query_row(sql, params![id], |row| row.get(0)).optional()?)
}

// ─────────────────────────────────────────────────────────────────────────────
// Change set application
// ─────────────────────────────────────────────────────────────────────────────

fn check_guard(conn: &Connection, guard: &Guard) -> Result<()> {
    match guard {
        Guard::Visibility {
            resource_id,
            expected,
        } => {
            let row: Option<(String, Option<i64>)> = conn
                .query_row(
                    "SELECT visibility, deleted_at FROM resources WHERE resource_id = ?1",
                    params![resource_id.as_bytes().as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            match row {
                Some((visibility, None)) => {
                    let actual = Visibility::from_str(&visibility)?;
                    if actual == *expected {
                        Ok(())
                    } else {
                        Err(StoreError::PreconditionFailed(format!(
                            "resource {} has visibility {}, expected {}",
                            resource_id, actual, expected
                        )))
                    }
                }
                _ => Err(StoreError::PreconditionFailed(format!(
                    "resource {} is missing or deleted",
                    resource_id
                ))),
            }
        }
        Guard::ResourceLive(id) => live_guard(
            conn,
            "SELECT deleted_at FROM resources WHERE resource_id = ?1",
            id.as_ref(),
            "resource",
            id,
        ),
        Guard::AreaLive(id) => live_guard(
            conn,
            "SELECT deleted_at FROM areas WHERE area_id = ?1",
            id.as_ref(),
            "area",
            id,
        ),
        Guard::SpaceLive(id) => live_guard(
            conn,
            "SELECT deleted_at FROM spaces WHERE space_id = ?1",
            id.as_ref(),
            "space",
            id,
        ),
        Guard::AreaShareExists {
            document_id,
            area_id,
        } => {
            let shared: bool = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM area_document_shares
                                 WHERE document_id = ?1 AND area_id = ?2)",
                params![document_id.as_bytes().as_slice(), area_id.as_bytes().as_slice()],
                |row| row.get(0),
            )?;
            if shared {
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

fn live_guard(
    conn: &Connection,
    sql: &str,
    id: &[u8],
    kind: &str,
    display: &dyn std::fmt::Display,
) -> Result<()> {
    match deleted_at(conn, sql, id)? {
        Some(None) => Ok(()),
        _ => Err(StoreError::PreconditionFailed(format!(
            "{} {} is missing or deleted",
            kind, display
        ))),
    }
}

fn apply_mutation(conn: &Connection, mutation: &Mutation) -> Result<usize> {
    match mutation {
        Mutation::InsertSpace(space) => {
            if space_exists(conn, &space.id)? {
                return Err(StoreError::Conflict(format!("space {} exists", space.id)));
            }
            conn.execute(
                "INSERT INTO spaces (space_id, organization_id, name, owner_id, created_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    space.id.as_bytes().as_slice(),
                    space.organization_id.map(|o| o.as_bytes().to_vec()),
                    &space.name,
                    space.owner_id.as_bytes().as_slice(),
                    space.created_at,
                    space.deleted_at,
                ],
            )?;
            Ok(1)
        }
        Mutation::InsertArea(area) => {
            if !space_exists(conn, &area.space_id)? {
                return Err(StoreError::not_found("space", area.space_id));
            }
            if area_exists(conn, &area.id)? {
                return Err(StoreError::Conflict(format!("area {} exists", area.id)));
            }
            if area.is_general
                && exists(
                    conn,
                    "SELECT 1 FROM areas WHERE space_id = ?1 AND is_general = 1",
                    area.space_id.as_ref(),
                )?
            {
                return Err(StoreError::Conflict(format!(
                    "space {} already has a General area",
                    area.space_id
                )));
            }
            conn.execute(
                "INSERT INTO areas (area_id, space_id, name, created_by, is_restricted,
                                    is_general, created_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    area.id.as_bytes().as_slice(),
                    area.space_id.as_bytes().as_slice(),
                    &area.name,
                    area.created_by.as_bytes().as_slice(),
                    area.is_restricted,
                    area.is_general,
                    area.created_at,
                    area.deleted_at,
                ],
            )?;
            Ok(1)
        }
        Mutation::UpdateArea {
            area_id,
            name,
            is_restricted,
        } => {
            let changed = conn.execute(
                "UPDATE areas SET name = COALESCE(?2, name),
                                  is_restricted = COALESCE(?3, is_restricted)
                 WHERE area_id = ?1",
                params![area_id.as_bytes().as_slice(), name, is_restricted],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("area", area_id));
            }
            Ok(changed)
        }
        Mutation::SoftDeleteSpace { space_id, at } => {
            if !space_exists(conn, space_id)? {
                return Err(StoreError::not_found("space", space_id));
            }
            Ok(conn.execute(
                "UPDATE spaces SET deleted_at = ?2 WHERE space_id = ?1 AND deleted_at IS NULL",
                params![space_id.as_bytes().as_slice(), at],
            )?)
        }
        Mutation::SoftDeleteArea { area_id, at } => {
            if !area_exists(conn, area_id)? {
                return Err(StoreError::not_found("area", area_id));
            }
            Ok(conn.execute(
                "UPDATE areas SET deleted_at = ?2 WHERE area_id = ?1 AND deleted_at IS NULL",
                params![area_id.as_bytes().as_slice(), at],
            )?)
        }

        Mutation::InsertResource(resource) => {
            if resource_exists(conn, &resource.id)? {
                return Err(StoreError::Conflict(format!(
                    "resource {} exists",
                    resource.id
                )));
            }
            let (area_id, space_id) = match resource.placement {
                Placement::Page { area_id } => {
                    if !area_exists(conn, &area_id)? {
                        return Err(StoreError::not_found("area", area_id));
                    }
                    (Some(area_id.as_bytes().to_vec()), None)
                }
                Placement::Document { space_id } => {
                    if let Some(space_id) = space_id {
                        if !space_exists(conn, &space_id)? {
                            return Err(StoreError::not_found("space", space_id));
                        }
                    }
                    (None, space_id.map(|s| s.as_bytes().to_vec()))
                }
            };
            conn.execute(
                "INSERT INTO resources (resource_id, kind, owner_id, title, area_id, space_id,
                                        visibility, created_at, updated_at, deleted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    resource.id.as_bytes().as_slice(),
                    resource.kind().as_str(),
                    resource.owner_id.as_bytes().as_slice(),
                    &resource.title,
                    area_id,
                    space_id,
                    resource.visibility.as_str(),
                    resource.created_at,
                    resource.updated_at,
                    resource.deleted_at,
                ],
            )?;
            Ok(1)
        }
        Mutation::SetVisibility {
            resource_id,
            visibility,
            at,
        } => {
            let changed = conn.execute(
                "UPDATE resources SET visibility = ?2, updated_at = ?3 WHERE resource_id = ?1",
                params![resource_id.as_bytes().as_slice(), visibility.as_str(), at],
            )?;
            if changed == 0 {
                return Err(StoreError::not_found("resource", resource_id));
            }
            Ok(changed)
        }
        Mutation::SoftDeleteResource { resource_id, at } => {
            if !resource_exists(conn, resource_id)? {
                return Err(StoreError::not_found("resource", resource_id));
            }
            Ok(conn.execute(
                "UPDATE resources SET deleted_at = ?2, updated_at = ?2
                 WHERE resource_id = ?1 AND deleted_at IS NULL",
                params![resource_id.as_bytes().as_slice(), at],
            )?)
        }

        Mutation::InsertGroup(group) => {
            if group_exists(conn, &group.id)? {
                return Err(StoreError::Conflict(format!("group {} exists", group.id)));
            }
            conn.execute(
                "INSERT INTO user_groups (group_id, organization_id, name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    group.id.as_bytes().as_slice(),
                    group.organization_id.map(|o| o.as_bytes().to_vec()),
                    &group.name,
                    group.created_at,
                ],
            )?;
            Ok(1)
        }
        Mutation::AddGroupMember { group_id, user_id } => {
            if !group_exists(conn, group_id)? {
                return Err(StoreError::not_found("group", group_id));
            }
            Ok(conn.execute(
                "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2)",
                params![group_id.as_bytes().as_slice(), user_id.as_bytes().as_slice()],
            )?)
        }
        Mutation::RemoveGroupMember { group_id, user_id } => Ok(conn.execute(
            "DELETE FROM group_members WHERE group_id = ?1 AND user_id = ?2",
            params![group_id.as_bytes().as_slice(), user_id.as_bytes().as_slice()],
        )?),

        Mutation::UpsertMembership(membership) => {
            let scope_present = match &membership.scope {
                ScopeId::Space(id) => space_exists(conn, id)?,
                ScopeId::Area(id) => area_exists(conn, id)?,
            };
            if !scope_present {
                return Err(StoreError::not_found("scope", membership.scope));
            }
            require_group_principal(conn, &membership.principal)?;

            let (user, group) = principal_params(&membership.principal);
            let invited_by = membership.invited_by.map(|u| u.as_bytes().to_vec());
            let updated = conn.execute(
                "UPDATE memberships SET role = ?5, invited_by = ?6
                 WHERE scope_kind = ?1 AND scope_id = ?2 AND user_id IS ?3 AND group_id IS ?4",
                params![
                    membership.scope.kind().as_str(),
                    membership.scope.bytes(),
                    user,
                    group,
                    membership.role.as_str(),
                    invited_by,
                ],
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO memberships (scope_kind, scope_id, user_id, group_id, role,
                                              invited_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        membership.scope.kind().as_str(),
                        membership.scope.bytes(),
                        user,
                        group,
                        membership.role.as_str(),
                        invited_by,
                        membership.created_at,
                    ],
                )?;
            }
            Ok(1)
        }
        Mutation::DeleteMembership { scope, principal } => {
            let (user, group) = principal_params(principal);
            Ok(conn.execute(
                "DELETE FROM memberships
                 WHERE scope_kind = ?1 AND scope_id = ?2 AND user_id IS ?3 AND group_id IS ?4",
                params![scope.kind().as_str(), scope.bytes(), user, group],
            )?)
        }

        Mutation::UpsertShare(share) => {
            if !resource_exists(conn, &share.resource_id)? {
                return Err(StoreError::not_found("resource", share.resource_id));
            }
            require_group_principal(conn, &share.principal)?;

            let (user, group) = principal_params(&share.principal);
            let updated = conn.execute(
                "UPDATE resource_shares SET permission = ?4, shared_by = ?5, shared_at = ?6
                 WHERE resource_id = ?1 AND user_id IS ?2 AND group_id IS ?3",
                params![
                    share.resource_id.as_bytes().as_slice(),
                    user,
                    group,
                    share.permission.as_str(),
                    share.shared_by.as_bytes().as_slice(),
                    share.shared_at,
                ],
            )?;
            if updated == 0 {
                conn.execute(
                    "INSERT INTO resource_shares (resource_id, user_id, group_id, permission,
                                                  shared_by, shared_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        share.resource_id.as_bytes().as_slice(),
                        user,
                        group,
                        share.permission.as_str(),
                        share.shared_by.as_bytes().as_slice(),
                        share.shared_at,
                    ],
                )?;
            }
            Ok(1)
        }
        Mutation::DeleteShare {
            resource_id,
            principal,
        } => {
            let (user, group) = principal_params(principal);
            Ok(conn.execute(
                "DELETE FROM resource_shares
                 WHERE resource_id = ?1 AND user_id IS ?2 AND group_id IS ?3",
                params![resource_id.as_bytes().as_slice(), user, group],
            )?)
        }
        Mutation::DeleteAllShares { resource_id } => Ok(conn.execute(
            "DELETE FROM resource_shares WHERE resource_id = ?1",
            params![resource_id.as_bytes().as_slice()],
        )?),

        Mutation::UpsertAreaShare(share) => {
            let kind: Option<String> = conn
                .query_row(
                    "SELECT kind FROM resources WHERE resource_id = ?1",
                    params![share.document_id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            match kind.as_deref() {
                Some("document") => {}
                Some(_) => {
                    return Err(StoreError::Conflict(format!(
                        "resource {} is not a document",
                        share.document_id
                    )))
                }
                None => return Err(StoreError::not_found("document", share.document_id)),
            }
            if !area_exists(conn, &share.area_id)? {
                return Err(StoreError::not_found("area", share.area_id));
            }
            conn.execute(
                "INSERT INTO area_document_shares (document_id, area_id, shared_by, shared_at,
                                                   notifications_sent)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(document_id, area_id) DO UPDATE SET
                    shared_by = excluded.shared_by,
                    shared_at = excluded.shared_at",
                params![
                    share.document_id.as_bytes().as_slice(),
                    share.area_id.as_bytes().as_slice(),
                    share.shared_by.as_bytes().as_slice(),
                    share.shared_at,
                    share.notifications_sent,
                ],
            )?;
            Ok(1)
        }
        Mutation::DeleteAreaShare {
            document_id,
            area_id,
        } => Ok(conn.execute(
            "DELETE FROM area_document_shares WHERE document_id = ?1 AND area_id = ?2",
            params![document_id.as_bytes().as_slice(), area_id.as_bytes().as_slice()],
        )?),
        Mutation::DeleteAllAreaShares { document_id } => Ok(conn.execute(
            "DELETE FROM area_document_shares WHERE document_id = ?1",
            params![document_id.as_bytes().as_slice()],
        )?),
        Mutation::MarkAreaShareNotified {
            document_id,
            area_id,
        } => Ok(conn.execute(
            "UPDATE area_document_shares SET notifications_sent = 1
             WHERE document_id = ?1 AND area_id = ?2 AND notifications_sent = 0",
            params![document_id.as_bytes().as_slice(), area_id.as_bytes().as_slice()],
        )?),

        Mutation::AddContextRef(context) => {
            if !area_exists(conn, &context.area_id)? {
                return Err(StoreError::not_found("area", context.area_id));
            }
            if !resource_exists(conn, &context.document_id)? {
                return Err(StoreError::not_found("document", context.document_id));
            }
            Ok(conn.execute(
                "INSERT OR IGNORE INTO area_context (area_id, document_id, added_by, added_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    context.area_id.as_bytes().as_slice(),
                    context.document_id.as_bytes().as_slice(),
                    context.added_by.as_bytes().as_slice(),
                    context.added_at,
                ],
            )?)
        }
        Mutation::RemoveContextRef {
            area_id,
            document_id,
        } => Ok(conn.execute(
            "DELETE FROM area_context WHERE area_id = ?1 AND document_id = ?2",
            params![area_id.as_bytes().as_slice(), document_id.as_bytes().as_slice()],
        )?),
        Mutation::ClearAreaContext { area_id } => Ok(conn.execute(
            "DELETE FROM area_context WHERE area_id = ?1",
            params![area_id.as_bytes().as_slice()],
        )?),
        Mutation::RemoveFromAllContexts { document_id } => Ok(conn.execute(
            "DELETE FROM area_context WHERE document_id = ?1",
            params![document_id.as_bytes().as_slice()],
        )?),
        Mutation::PruneUnsharedContext { document_id } => Ok(conn.execute(
            "DELETE FROM area_context
             WHERE document_id = ?1
               AND area_id NOT IN (SELECT area_id FROM area_document_shares
                                   WHERE document_id = ?1)",
            params![document_id.as_bytes().as_slice()],
        )?),
        // A NULL space matches no area, so spaceless documents leave every context.
        Mutation::PruneContextOutsideSpace { document_id } => Ok(conn.execute(
            "DELETE FROM area_context
             WHERE document_id = ?1
               AND area_id NOT IN (SELECT a.area_id FROM areas a
                                   JOIN resources r ON r.space_id = a.space_id
                                   WHERE r.resource_id = ?1)",
            params![document_id.as_bytes().as_slice()],
        )?),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_space(&self, id: &SpaceId) -> Result<Option<Space>> {
        let id = *id;
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM spaces WHERE space_id = ?1", SPACE_COLUMNS),
                    params![id.as_bytes().as_slice()],
                    row_to_space,
                )
                .optional()?)
        })
        .await
    }

    async fn get_area(&self, id: &AreaId) -> Result<Option<Area>> {
        let id = *id;
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM areas WHERE area_id = ?1", AREA_COLUMNS),
                    params![id.as_bytes().as_slice()],
                    row_to_area,
                )
                .optional()?)
        })
        .await
    }

    async fn list_areas(&self, space_id: &SpaceId) -> Result<Vec<Area>> {
        let space_id = *space_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM areas WHERE space_id = ?1 ORDER BY created_at, area_id",
                AREA_COLUMNS
            ))?;
            let areas = stmt
                .query_map(params![space_id.as_bytes().as_slice()], row_to_area)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(areas)
        })
        .await
    }

    async fn get_resource(&self, id: &ResourceId) -> Result<Option<Resource>> {
        let id = *id;
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM resources WHERE resource_id = ?1",
                        RESOURCE_COLUMNS
                    ),
                    params![id.as_bytes().as_slice()],
                    row_to_resource,
                )
                .optional()?)
        })
        .await
    }

    async fn get_group(&self, id: &GroupId) -> Result<Option<Group>> {
        let id = *id;
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM user_groups WHERE group_id = ?1", GROUP_COLUMNS),
                    params![id.as_bytes().as_slice()],
                    row_to_group,
                )
                .optional()?)
        })
        .await
    }

    async fn groups_for_user(&self, user_id: &UserId) -> Result<Vec<GroupId>> {
        let user_id = *user_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT group_id FROM group_members WHERE user_id = ?1 ORDER BY group_id",
            )?;
            let groups = stmt
                .query_map(params![user_id.as_bytes().as_slice()], |row| {
                    id_col(row, "group_id")
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(groups)
        })
        .await
    }

    async fn group_members(&self, group_id: &GroupId) -> Result<Vec<UserId>> {
        let group_id = *group_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id FROM group_members WHERE group_id = ?1 ORDER BY user_id",
            )?;
            let users = stmt
                .query_map(params![group_id.as_bytes().as_slice()], |row| {
                    id_col(row, "user_id")
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }

    async fn get_membership(
        &self,
        scope: &ScopeId,
        principal: &Principal,
    ) -> Result<Option<Membership>> {
        let scope = *scope;
        let principal = *principal;
        self.run(move |conn| {
            let (user, group) = principal_params(&principal);
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM memberships
                         WHERE scope_kind = ?1 AND scope_id = ?2
                           AND user_id IS ?3 AND group_id IS ?4",
                        MEMBERSHIP_COLUMNS
                    ),
                    params![scope.kind().as_str(), scope.bytes(), user, group],
                    row_to_membership,
                )
                .optional()?)
        })
        .await
    }

    async fn group_memberships(
        &self,
        scope: &ScopeId,
        groups: &[GroupId],
    ) -> Result<Vec<Membership>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        let scope = *scope;
        let groups = groups.to_vec();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM memberships
                 WHERE scope_kind = ? AND scope_id = ? AND group_id IN ({})",
                MEMBERSHIP_COLUMNS,
                placeholders(groups.len())
            );
            let mut values = vec![
                Value::Text(scope.kind().as_str().to_string()),
                Value::Blob(scope.bytes().to_vec()),
            ];
            values.extend(groups.iter().map(|g| Value::Blob(g.as_bytes().to_vec())));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), row_to_membership)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn list_memberships(&self, scope: &ScopeId) -> Result<Vec<Membership>> {
        let scope = *scope;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM memberships WHERE scope_kind = ?1 AND scope_id = ?2
                 ORDER BY created_at, rowid",
                MEMBERSHIP_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![scope.kind().as_str(), scope.bytes()],
                    row_to_membership,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn get_share(
        &self,
        resource_id: &ResourceId,
        principal: &Principal,
    ) -> Result<Option<ResourceShare>> {
        let resource_id = *resource_id;
        let principal = *principal;
        self.run(move |conn| {
            let (user, group) = principal_params(&principal);
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM resource_shares
                         WHERE resource_id = ?1 AND user_id IS ?2 AND group_id IS ?3",
                        SHARE_COLUMNS
                    ),
                    params![resource_id.as_bytes().as_slice(), user, group],
                    row_to_share,
                )
                .optional()?)
        })
        .await
    }

    async fn group_shares(
        &self,
        resource_id: &ResourceId,
        groups: &[GroupId],
    ) -> Result<Vec<ResourceShare>> {
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        let resource_id = *resource_id;
        let groups = groups.to_vec();
        self.run(move |conn| {
            let sql = format!(
                "SELECT {} FROM resource_shares WHERE resource_id = ? AND group_id IN ({})",
                SHARE_COLUMNS,
                placeholders(groups.len())
            );
            let mut values = vec![Value::Blob(resource_id.as_bytes().to_vec())];
            values.extend(groups.iter().map(|g| Value::Blob(g.as_bytes().to_vec())));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), row_to_share)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn list_shares(&self, resource_id: &ResourceId) -> Result<Vec<ResourceShare>> {
        let resource_id = *resource_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM resource_shares WHERE resource_id = ?1
                 ORDER BY shared_at, rowid",
                SHARE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![resource_id.as_bytes().as_slice()], row_to_share)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn list_area_shares(&self, document_id: &ResourceId) -> Result<Vec<AreaDocumentShare>> {
        let document_id = *document_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM area_document_shares WHERE document_id = ?1
                 ORDER BY shared_at, area_id",
                AREA_SHARE_COLUMNS
            ))?;
            let rows = stmt
                .query_map(
                    params![document_id.as_bytes().as_slice()],
                    row_to_area_share,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn get_area_share(
        &self,
        document_id: &ResourceId,
        area_id: &AreaId,
    ) -> Result<Option<AreaDocumentShare>> {
        let document_id = *document_id;
        let area_id = *area_id;
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM area_document_shares
                         WHERE document_id = ?1 AND area_id = ?2",
                        AREA_SHARE_COLUMNS
                    ),
                    params![
                        document_id.as_bytes().as_slice(),
                        area_id.as_bytes().as_slice()
                    ],
                    row_to_area_share,
                )
                .optional()?)
        })
        .await
    }

    async fn list_context(&self, area_id: &AreaId) -> Result<Vec<ContextRef>> {
        let area_id = *area_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM area_context WHERE area_id = ?1 ORDER BY added_at, document_id",
                CONTEXT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![area_id.as_bytes().as_slice()], row_to_context)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn contexts_for_document(&self, document_id: &ResourceId) -> Result<Vec<ContextRef>> {
        let document_id = *document_id;
        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM area_context WHERE document_id = ?1 ORDER BY added_at, area_id",
                CONTEXT_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![document_id.as_bytes().as_slice()], row_to_context)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn apply(&self, changes: ChangeSet) -> Result<ApplyReport> {
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            for guard in &changes.guards {
                check_guard(&tx, guard)?;
            }

            let mut affected = Vec::with_capacity(changes.mutations.len());
            for mutation in &changes.mutations {
                affected.push(apply_mutation(&tx, mutation)?);
            }

            // Dropping the transaction on an early return rolls it back
            tx.commit()?;
            Ok(ApplyReport { affected })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scopegate_core::{Permission, Role};

    fn seed(owner: UserId) -> (Space, Area, Resource) {
        let space = Space {
            id: SpaceId::generate(),
            organization_id: Some(OrganizationId::generate()),
            name: "Product".into(),
            owner_id: owner,
            created_at: 1_000,
            deleted_at: None,
        };
        let area = Area {
            id: AreaId::generate(),
            space_id: space.id,
            name: "General".into(),
            created_by: owner,
            is_restricted: false,
            is_general: true,
            created_at: 1_000,
            deleted_at: None,
        };
        let document = Resource {
            id: ResourceId::generate(),
            owner_id: owner,
            title: "Spec".into(),
            placement: Placement::Document {
                space_id: Some(space.id),
            },
            visibility: Visibility::Private,
            created_at: 1_000,
            updated_at: 1_000,
            deleted_at: None,
        };
        (space, area, document)
    }

    async fn seeded_store(owner: UserId) -> (SqliteStore, Space, Area, Resource) {
        let store = SqliteStore::open_memory().unwrap();
        let (space, area, document) = seed(owner);
        store
            .apply(
                ChangeSet::new()
                    .push(Mutation::InsertSpace(space.clone()))
                    .push(Mutation::InsertArea(area.clone()))
                    .push(Mutation::InsertResource(document.clone())),
            )
            .await
            .unwrap();
        (store, space, area, document)
    }

    #[tokio::test]
    async fn test_insert_and_get_scopes() {
        let owner = UserId::generate();
        let (store, space, area, document) = seeded_store(owner).await;

        assert_eq!(store.get_space(&space.id).await.unwrap(), Some(space.clone()));
        assert_eq!(store.get_area(&area.id).await.unwrap(), Some(area.clone()));
        assert_eq!(store.list_areas(&space.id).await.unwrap(), vec![area]);
        assert_eq!(
            store.get_resource(&document.id).await.unwrap(),
            Some(document)
        );
        assert!(store
            .get_space(&SpaceId::generate())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_membership_lookup_by_principal_kind() {
        let owner = UserId::generate();
        let (store, space, _, _) = seeded_store(owner).await;
        let member = UserId::generate();
        let group = Group {
            id: GroupId::generate(),
            organization_id: None,
            name: "Design".into(),
            created_at: 1_000,
        };
        let scope = ScopeId::Space(space.id);

        store
            .apply(
                ChangeSet::new()
                    .push(Mutation::InsertGroup(group.clone()))
                    .push(Mutation::AddGroupMember {
                        group_id: group.id,
                        user_id: member,
                    })
                    .push(Mutation::UpsertMembership(Membership {
                        scope,
                        principal: Principal::User(member),
                        role: Role::Member,
                        invited_by: Some(owner),
                        created_at: 2_000,
                    }))
                    .push(Mutation::UpsertMembership(Membership {
                        scope,
                        principal: Principal::Group(group.id),
                        role: Role::Admin,
                        invited_by: None,
                        created_at: 2_001,
                    })),
            )
            .await
            .unwrap();

        let direct = store
            .get_membership(&scope, &Principal::User(member))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(direct.role, Role::Member);
        assert_eq!(direct.invited_by, Some(owner));

        assert_eq!(
            store.groups_for_user(&member).await.unwrap(),
            vec![group.id]
        );
        let via_group = store.group_memberships(&scope, &[group.id]).await.unwrap();
        assert_eq!(via_group.len(), 1);
        assert_eq!(via_group[0].role, Role::Admin);
        assert!(store.group_memberships(&scope, &[]).await.unwrap().is_empty());

        assert_eq!(store.list_memberships(&scope).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_share_upsert_and_delete() {
        let owner = UserId::generate();
        let (store, _, _, document) = seeded_store(owner).await;
        let reader = UserId::generate();

        for permission in [Permission::Viewer, Permission::Editor] {
            store
                .apply(ChangeSet::new().push(Mutation::UpsertShare(ResourceShare {
                    resource_id: document.id,
                    principal: Principal::User(reader),
                    permission,
                    shared_by: owner,
                    shared_at: 3_000,
                })))
                .await
                .unwrap();
        }

        let shares = store.list_shares(&document.id).await.unwrap();
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].permission, Permission::Editor);

        let report = store
            .apply(ChangeSet::new().push(Mutation::DeleteShare {
                resource_id: document.id,
                principal: Principal::User(reader),
            }))
            .await
            .unwrap();
        assert_eq!(report.total(), 1);

        // Second delete is a no-op
        let report = store
            .apply(ChangeSet::new().push(Mutation::DeleteShare {
                resource_id: document.id,
                principal: Principal::User(reader),
            }))
            .await
            .unwrap();
        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_xor_check_rejects_raw_rows() {
        let owner = UserId::generate();
        let (store, space, _, document) = seeded_store(owner).await;

        store
            .with_conn(|conn| {
                let both = conn.execute(
                    "INSERT INTO memberships (scope_kind, scope_id, user_id, group_id, role, created_at)
                     VALUES ('space', ?1, ?2, ?3, 'member', 0)",
                    params![
                        space.id.as_bytes().as_slice(),
                        UserId::generate().as_bytes().as_slice(),
                        GroupId::generate().as_bytes().as_slice(),
                    ],
                );
                assert!(both.is_err());

                let neither = conn.execute(
                    "INSERT INTO resource_shares (resource_id, user_id, group_id, permission, shared_by, shared_at)
                     VALUES (?1, NULL, NULL, 'viewer', ?2, 0)",
                    params![
                        document.id.as_bytes().as_slice(),
                        owner.as_bytes().as_slice()
                    ],
                );
                assert!(neither.is_err());
                Ok(())
            })
            .unwrap();

        assert!(store.list_shares(&document.id).await.unwrap().is_empty());
        assert!(store
            .list_memberships(&ScopeId::Space(space.id))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_failure() {
        let owner = UserId::generate();
        let (store, _, area, document) = seeded_store(owner).await;

        store
            .apply(ChangeSet::new().push(Mutation::AddContextRef(ContextRef {
                area_id: area.id,
                document_id: document.id,
                added_by: owner,
                added_at: 4_000,
            })))
            .await
            .unwrap();

        let err = store
            .apply(
                ChangeSet::new()
                    .push(Mutation::ClearAreaContext { area_id: area.id })
                    .push(Mutation::SetVisibility {
                        resource_id: ResourceId::generate(),
                        visibility: Visibility::Space,
                        at: 5_000,
                    }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "resource", .. }));

        // The context reference survived the rolled-back clear
        assert_eq!(store.list_context(&area.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_visibility_guard() {
        let owner = UserId::generate();
        let (store, _, _, document) = seeded_store(owner).await;

        let changes = ChangeSet::new()
            .guard(Guard::Visibility {
                resource_id: document.id,
                expected: Visibility::Private,
            })
            .push(Mutation::SetVisibility {
                resource_id: document.id,
                visibility: Visibility::Space,
                at: 6_000,
            });

        store.apply(changes.clone()).await.unwrap();

        // Replaying against the new state fails the guard
        let err = store.apply(changes).await.unwrap_err();
        assert!(err.is_precondition_failed());
        let stored = store.get_resource(&document.id).await.unwrap().unwrap();
        assert_eq!(stored.visibility, Visibility::Space);
        assert_eq!(stored.updated_at, 6_000);
    }

    #[tokio::test]
    async fn test_area_share_keeps_notification_flag() {
        let owner = UserId::generate();
        let (store, _, area, document) = seeded_store(owner).await;
        let share = AreaDocumentShare {
            document_id: document.id,
            area_id: area.id,
            shared_by: owner,
            shared_at: 7_000,
            notifications_sent: false,
        };

        store
            .apply(
                ChangeSet::new()
                    .push(Mutation::UpsertAreaShare(share.clone()))
                    .push(Mutation::MarkAreaShareNotified {
                        document_id: document.id,
                        area_id: area.id,
                    }),
            )
            .await
            .unwrap();
        store
            .apply(ChangeSet::new().push(Mutation::UpsertAreaShare(AreaDocumentShare {
                shared_at: 8_000,
                ..share
            })))
            .await
            .unwrap();

        let stored = store
            .get_area_share(&document.id, &area.id)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.notifications_sent);
        assert_eq!(stored.shared_at, 8_000);
    }

    #[tokio::test]
    async fn test_area_share_guard_sees_committed_unshare() {
        let owner = UserId::generate();
        let (store, _, area, document) = seeded_store(owner).await;
        store
            .apply(ChangeSet::new().push(Mutation::UpsertAreaShare(AreaDocumentShare {
                document_id: document.id,
                area_id: area.id,
                shared_by: owner,
                shared_at: 2_000,
                notifications_sent: false,
            })))
            .await
            .unwrap();

        let add = ChangeSet::new()
            .guard(Guard::AreaShareExists {
                document_id: document.id,
                area_id: area.id,
            })
            .push(Mutation::AddContextRef(ContextRef {
                area_id: area.id,
                document_id: document.id,
                added_by: owner,
                added_at: 3_000,
            }));
        store
            .apply(ChangeSet::new().push(Mutation::DeleteAreaShare {
                document_id: document.id,
                area_id: area.id,
            }))
            .await
            .unwrap();

        let err = store.apply(add).await.unwrap_err();
        assert!(err.is_precondition_failed());
        assert!(store.list_context(&area.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_context_prunes_by_share_and_space() {
        let owner = UserId::generate();
        let (store, _, general, document) = seeded_store(owner).await;
        let (elsewhere, _, _) = seed(owner);
        let unshared = Area {
            id: AreaId::generate(),
            name: "Design".into(),
            is_general: false,
            ..general.clone()
        };
        let foreign = Area {
            id: AreaId::generate(),
            space_id: elsewhere.id,
            ..unshared.clone()
        };
        let mut setup = ChangeSet::new()
            .push(Mutation::InsertSpace(elsewhere))
            .push(Mutation::InsertArea(unshared.clone()))
            .push(Mutation::InsertArea(foreign.clone()))
            .push(Mutation::UpsertAreaShare(AreaDocumentShare {
                document_id: document.id,
                area_id: general.id,
                shared_by: owner,
                shared_at: 2_000,
                notifications_sent: false,
            }));
        for area_id in [general.id, unshared.id, foreign.id] {
            setup = setup.push(Mutation::AddContextRef(ContextRef {
                area_id,
                document_id: document.id,
                added_by: owner,
                added_at: 3_000,
            }));
        }
        store.apply(setup).await.unwrap();

        let report = store
            .apply(ChangeSet::new().push(Mutation::PruneContextOutsideSpace {
                document_id: document.id,
            }))
            .await
            .unwrap();
        assert_eq!(report.total(), 1);
        assert!(store.list_context(&foreign.id).await.unwrap().is_empty());

        let report = store
            .apply(ChangeSet::new().push(Mutation::PruneUnsharedContext {
                document_id: document.id,
            }))
            .await
            .unwrap();
        assert_eq!(report.total(), 1);
        assert!(store.list_context(&unshared.id).await.unwrap().is_empty());
        assert_eq!(store.list_context(&general.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scopegate.db");
        let owner = UserId::generate();
        let (space, area, document) = seed(owner);

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .apply(
                    ChangeSet::new()
                        .push(Mutation::InsertSpace(space.clone()))
                        .push(Mutation::InsertArea(area))
                        .push(Mutation::InsertResource(document.clone())),
                )
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_space(&space.id).await.unwrap(), Some(space));
        assert_eq!(
            store.get_resource(&document.id).await.unwrap(),
            Some(document)
        );
    }
}
