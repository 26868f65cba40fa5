//! Resource records.
//!
//! Statement helpers take a `&Connection` so they run the same way on a
//! plain locked connection and inside a [`Transaction`](crate::Transaction).
//! The `Database` methods are thin async wrappers for the common case.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::database::{db_err, map_sqlite_error, Database};
use crate::users::parse_id;
use lockbox_common::{
    AuthError, Identity, KindFilter, Resource, ResourceError, ResourceId, ResourceKind, Result,
    ShortResourceInfo, StorageError,
};

/// One page of a listing, in storage order.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub items: Vec<ShortResourceInfo>,
    /// Cursor for the next page; `None` once the listing is exhausted.
    pub next: Option<i64>,
}

/// Persist a resource.
///
/// # Errors
/// - `AuthError::NotFound` if the owner does not exist
pub fn insert_resource(conn: &Connection, resource: &Resource) -> Result<()> {
    let inserted = conn.execute(
        "INSERT INTO resources (id, user_id, kind, data, meta, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            resource.id.to_string(),
            resource.owner.to_string(),
            resource.kind.code(),
            resource.payload,
            resource.meta,
            Utc::now().timestamp(),
        ],
    );

    match inserted {
        Ok(_) => {
            debug!(resource = %resource.id, kind = %resource.kind, "Resource inserted");
            Ok(())
        }
        Err(e) => match map_sqlite_error(e) {
            StorageError::ForeignKeyViolation(_) => Err(AuthError::NotFound.into()),
            other => Err(other.into()),
        },
    }
}

/// Fetch a resource scoped to `owner` and filtered by kind.
///
/// # Errors
/// - `ResourceError::NotFound` if absent or of another kind
/// - `ResourceError::OwnerMismatch` if it belongs to someone else
pub fn get_resource(
    conn: &Connection,
    id: &ResourceId,
    owner: &Identity,
    filter: KindFilter,
) -> Result<Resource> {
    let row = conn
        .query_row(
            "SELECT user_id, kind, data, meta FROM resources WHERE id = ?1",
            [id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            },
        )
        .optional()
        .map_err(db_err)?;

    let (user_id, kind, payload, meta) = row.ok_or(ResourceError::NotFound)?;

    let stored_owner = Identity::from_uuid(parse_id("resources.user_id", &user_id)?);
    if stored_owner != *owner {
        warn!(resource = %id, caller = %owner, "Cross-owner access rejected");
        return Err(ResourceError::OwnerMismatch.into());
    }

    let kind = ResourceKind::from_code(kind)?;
    if !filter.matches(kind) {
        return Err(ResourceError::NotFound.into());
    }

    Ok(Resource {
        id: *id,
        owner: stored_owner,
        kind,
        payload,
        meta,
    })
}

/// Delete a resource scoped to `owner`. Returns whether a row was removed.
pub fn delete_resource(conn: &Connection, id: &ResourceId, owner: &Identity) -> Result<bool> {
    let removed = conn
        .execute(
            "DELETE FROM resources WHERE id = ?1 AND user_id = ?2",
            params![id.to_string(), owner.to_string()],
        )
        .map_err(db_err)?;
    Ok(removed > 0)
}

/// Fetch up to `limit` entries of `owner`'s resources of `kind` with a
/// rowid greater than `after`.
pub fn list_page(
    conn: &Connection,
    owner: &Identity,
    kind: ResourceKind,
    after: Option<i64>,
    limit: usize,
) -> Result<ListPage> {
    let mut stmt = conn
        .prepare(
            "SELECT rowid, id, meta FROM resources
             WHERE user_id = ?1 AND kind = ?2 AND rowid > ?3
             ORDER BY rowid LIMIT ?4",
        )
        .map_err(db_err)?;

    let rows = stmt
        .query_map(
            params![
                owner.to_string(),
                kind.code(),
                after.unwrap_or(0),
                limit as i64
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            },
        )
        .map_err(db_err)?;

    let mut page = ListPage::default();
    let mut last = None;
    for row in rows {
        let (rowid, id, meta) = row.map_err(db_err)?;
        page.items.push(ShortResourceInfo {
            id: ResourceId::from_uuid(parse_id("resources.id", &id)?),
            meta,
        });
        last = Some(rowid);
    }

    if page.items.len() == limit {
        page.next = last;
    }
    Ok(page)
}

impl Database {
    /// See [`insert_resource`].
    pub async fn insert_resource(&self, resource: &Resource) -> Result<()> {
        let conn = self.conn().await;
        insert_resource(&*conn, resource)
    }

    /// See [`get_resource`].
    pub async fn get_resource(
        &self,
        id: &ResourceId,
        owner: &Identity,
        filter: KindFilter,
    ) -> Result<Resource> {
        let conn = self.conn().await;
        get_resource(&*conn, id, owner, filter)
    }

    /// See [`delete_resource`].
    pub async fn delete_resource(&self, id: &ResourceId, owner: &Identity) -> Result<bool> {
        let conn = self.conn().await;
        delete_resource(&*conn, id, owner)
    }

    /// See [`list_page`].
    pub async fn list_page(
        &self,
        owner: &Identity,
        kind: ResourceKind,
        after: Option<i64>,
        limit: usize,
    ) -> Result<ListPage> {
        let conn = self.conn().await;
        list_page(&*conn, owner, kind, after, limit)
    }
}
