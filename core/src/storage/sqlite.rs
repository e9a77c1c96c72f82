use r2d2_sqlite::rusqlite::{params, OptionalExtension};
use time::OffsetDateTime;

use super::{check_quota, SameSite, Slot, SlotAttributes, SlotStore, StorageError};
use crate::db::DbPool;

/// Slot store backed by the `slots` table of the application database.
#[derive(Clone)]
pub struct SqliteSlotStore {
    pool: DbPool,
}

impl SqliteSlotStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl SlotStore for SqliteSlotStore {
    fn read(&self, name: &str) -> Result<Option<Slot>, StorageError> {
        let conn = self.pool.get()?;
        let row = conn
            .query_row(
                "SELECT value, expires_at, secure, same_site, path FROM slots WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<i64>>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((value, expires_at, secure, same_site, path)) = row else {
            return Ok(None);
        };

        let expires_at = match expires_at {
            Some(ts) => Some(
                OffsetDateTime::from_unix_timestamp(ts)
                    .map_err(|err| StorageError::Unavailable(err.to_string()))?,
            ),
            None => None,
        };
        let slot = Slot {
            name: name.to_string(),
            value,
            expires_at,
            secure: secure != 0,
            same_site: SameSite::parse(&same_site),
            path,
        };

        if slot.is_expired(OffsetDateTime::now_utc()) {
            conn.execute("DELETE FROM slots WHERE name = ?1", params![name])?;
            return Ok(None);
        }
        Ok(Some(slot))
    }

    fn write(&self, name: &str, value: &str, attrs: &SlotAttributes) -> Result<(), StorageError> {
        check_quota(name, value)?;
        let now = OffsetDateTime::now_utc();
        let expires_at = attrs.expires_at(now)?.map(|at| at.unix_timestamp());
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO slots (name, value, expires_at, secure, same_site, path, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                 value = excluded.value,
                 expires_at = excluded.expires_at,
                 secure = excluded.secure,
                 same_site = excluded.same_site,
                 path = excluded.path,
                 updated_at = excluded.updated_at",
            params![
                name,
                value,
                expires_at,
                attrs.secure as i32,
                attrs.same_site.as_str(),
                attrs.path,
                now.unix_timestamp(),
            ],
        )?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM slots WHERE name = ?1", params![name])?;
        Ok(())
    }
}
