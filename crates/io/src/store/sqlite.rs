// SQLite-backed world store

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{DocumentId, SnapshotInfo, StorageBackend};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS projections (
    doc_id TEXT PRIMARY KEY,
    bytes BLOB NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS snapshots (
    id TEXT PRIMARY KEY,
    doc_id TEXT NOT NULL,
    name TEXT NOT NULL,
    bytes BLOB NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS snapshots_by_doc ON snapshots (doc_id, created_at);
"#;

/// SQLite store. Each call opens its own connection, so concurrent flush
/// threads never share one.
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self { path: path.as_ref().to_path_buf() };
        let conn = store.conn()?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path).map_err(backend)?;
        // Writers from parallel flushes briefly contend; let SQLite wait
        // instead of returning SQLITE_BUSY.
        conn.busy_timeout(std::time::Duration::from_secs(5)).map_err(backend)?;
        Ok(conn)
    }
}

impl StorageBackend for SqliteStore {
    fn load_projection(&self, doc: &DocumentId) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT bytes FROM projections WHERE doc_id = ?1",
            params![doc.as_str()],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(backend)
    }

    fn save_projection(&self, doc: &DocumentId, bytes: &[u8]) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO projections (doc_id, bytes, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(doc_id) DO UPDATE SET bytes = excluded.bytes, updated_at = excluded.updated_at",
            params![doc.as_str(), bytes, Utc::now().to_rfc3339()],
        )
        .map_err(backend)?;
        Ok(())
    }

    fn list_snapshots(&self, doc: &DocumentId) -> Result<Vec<SnapshotInfo>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, created_at FROM snapshots
                 WHERE doc_id = ?1 ORDER BY created_at, rowid",
            )
            .map_err(backend)?;

        let rows = stmt
            .query_map(params![doc.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(backend)?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (id, name, created_at) = row.map_err(backend)?;
            snapshots.push(SnapshotInfo {
                id: parse_uuid(&id)?,
                name,
                created_at: parse_timestamp(&created_at)?,
            });
        }
        Ok(snapshots)
    }

    fn load_snapshot(&self, id: Uuid) -> Result<Vec<u8>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT bytes FROM snapshots WHERE id = ?1",
            params![id.to_string()],
            |row| row.get::<_, Vec<u8>>(0),
        )
        .optional()
        .map_err(backend)?
        .ok_or(StoreError::NotFound)
    }

    fn create_snapshot(
        &self,
        doc: &DocumentId,
        name: &str,
        bytes: &[u8],
    ) -> Result<SnapshotInfo, StoreError> {
        let info = SnapshotInfo {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO snapshots (id, doc_id, name, bytes, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                info.id.to_string(),
                doc.as_str(),
                info.name,
                bytes,
                info.created_at.to_rfc3339()
            ],
        )
        .map_err(backend)?;
        Ok(info)
    }

    fn rename_snapshot(&self, id: Uuid, name: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE snapshots SET name = ?1 WHERE id = ?2",
                params![name, id.to_string()],
            )
            .map_err(backend)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn delete_snapshot(&self, id: Uuid) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM snapshots WHERE id = ?1", params![id.to_string()])
            .map_err(backend)?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn parse_uuid(raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Backend(format!("bad snapshot id: {e}")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp: {e}")))
}
