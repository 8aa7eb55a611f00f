//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use scopegate_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::info!(version = CURRENT_VERSION, "schema migrated");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Top-level scopes
        CREATE TABLE spaces (
            space_id BLOB PRIMARY KEY,        -- 12 bytes
            organization_id BLOB,             -- nullable
            name TEXT NOT NULL,
            owner_id BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            deleted_at INTEGER                -- soft delete
        );

        -- Areas nested in a space
        CREATE TABLE areas (
            area_id BLOB PRIMARY KEY,
            space_id BLOB NOT NULL REFERENCES spaces(space_id),
            name TEXT NOT NULL,
            created_by BLOB NOT NULL,
            is_restricted INTEGER NOT NULL DEFAULT 0,
            is_general INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            deleted_at INTEGER
        );

        -- At most one General area per space
        CREATE UNIQUE INDEX idx_areas_general ON areas(space_id) WHERE is_general = 1;

        -- Pages and documents
        CREATE TABLE resources (
            resource_id BLOB PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('page', 'document')),
            owner_id BLOB NOT NULL,
            title TEXT NOT NULL,
            area_id BLOB REFERENCES areas(area_id),    -- pages only
            space_id BLOB REFERENCES spaces(space_id), -- documents only, nullable
            visibility TEXT NOT NULL CHECK (visibility IN ('private', 'area', 'space')),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            deleted_at INTEGER,

            CHECK ((kind = 'page') = (area_id IS NOT NULL)),
            CHECK (kind = 'document' OR space_id IS NULL)
        );

        CREATE TABLE user_groups (
            group_id BLOB PRIMARY KEY,
            organization_id BLOB,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE group_members (
            group_id BLOB NOT NULL REFERENCES user_groups(group_id),
            user_id BLOB NOT NULL,
            PRIMARY KEY (group_id, user_id)
        );

        -- Scope memberships: exactly one of user_id / group_id
        CREATE TABLE memberships (
            scope_kind TEXT NOT NULL CHECK (scope_kind IN ('space', 'area')),
            scope_id BLOB NOT NULL,
            user_id BLOB,
            group_id BLOB REFERENCES user_groups(group_id),
            role TEXT NOT NULL CHECK (role IN ('guest', 'viewer', 'member', 'admin', 'owner')),
            invited_by BLOB,
            created_at INTEGER NOT NULL,

            CHECK ((user_id IS NULL) <> (group_id IS NULL))
        );

        CREATE UNIQUE INDEX idx_memberships_user
            ON memberships(scope_kind, scope_id, user_id) WHERE user_id IS NOT NULL;
        CREATE UNIQUE INDEX idx_memberships_group
            ON memberships(scope_kind, scope_id, group_id) WHERE group_id IS NOT NULL;

        -- Explicit shares on private resources: exactly one of user_id / group_id
        CREATE TABLE resource_shares (
            resource_id BLOB NOT NULL REFERENCES resources(resource_id),
            user_id BLOB,
            group_id BLOB REFERENCES user_groups(group_id),
            permission TEXT NOT NULL CHECK (permission IN ('viewer', 'editor', 'admin')),
            shared_by BLOB NOT NULL,
            shared_at INTEGER NOT NULL,

            CHECK ((user_id IS NULL) <> (group_id IS NULL))
        );

        CREATE UNIQUE INDEX idx_shares_user
            ON resource_shares(resource_id, user_id) WHERE user_id IS NOT NULL;
        CREATE UNIQUE INDEX idx_shares_group
            ON resource_shares(resource_id, group_id) WHERE group_id IS NOT NULL;

        -- Documents shared into areas
        CREATE TABLE area_document_shares (
            document_id BLOB NOT NULL REFERENCES resources(resource_id),
            area_id BLOB NOT NULL REFERENCES areas(area_id),
            shared_by BLOB NOT NULL,
            shared_at INTEGER NOT NULL,
            notifications_sent INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (document_id, area_id)
        );

        -- Documents active in an area's context
        CREATE TABLE area_context (
            area_id BLOB NOT NULL REFERENCES areas(area_id),
            document_id BLOB NOT NULL REFERENCES resources(resource_id),
            added_by BLOB NOT NULL,
            added_at INTEGER NOT NULL,
            PRIMARY KEY (area_id, document_id)
        );

        -- Indexes for common queries
        CREATE INDEX idx_areas_space ON areas(space_id);
        CREATE INDEX idx_group_members_user ON group_members(user_id);
        CREATE INDEX idx_area_shares_area ON area_document_shares(area_id);
        CREATE INDEX idx_area_context_document ON area_context(document_id);
        "#,
    )?;

    Ok(())
}
