//! libSQL-backed durable store for artifacts and chunks.
//!
//! The [`Store`] struct wraps a local libSQL database holding two independent
//! namespaces: complete assembled artifacts and transient chunks. All other
//! crates access payload bytes only through this store's read/write/delete
//! contract; entries survive process restarts.

mod migrations;

use std::path::Path;

use chrono::Utc;
use sha2::{Digest, Sha256};
use libsql::{Connection, Database, params};
use wasmcache_shared::{EntryMeta, LoaderError, Result};

/// A logical partition within the store.
///
/// The same name may exist in both namespaces without conflict; assembly
/// relies on this to stage chunks next to finished artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Complete assembled artifacts.
    Artifacts,
    /// Transient chunks awaiting assembly.
    Chunks,
}

impl Namespace {
    /// Backing table for this namespace. Fixed set, never interpolated from
    /// user input.
    fn table(self) -> &'static str {
        match self {
            Namespace::Artifacts => "artifacts",
            Namespace::Chunks => "chunks",
        }
    }
}

/// Primary storage handle wrapping a libSQL database.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Store {
    /// Open or create a cache database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LoaderError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LoaderError::StorageUnavailable(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| LoaderError::StorageUnavailable(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    LoaderError::StorageUnavailable(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Entry operations
    // -----------------------------------------------------------------------

    /// Upsert `payload` under `name` (last write wins).
    pub async fn put(&self, ns: Namespace, name: &str, payload: &[u8]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let hash = content_hash(payload);
        let sql = format!(
            "INSERT INTO {} (name, payload, size, content_hash, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(name) DO UPDATE SET
               payload = excluded.payload,
               size = excluded.size,
               content_hash = excluded.content_hash,
               stored_at = excluded.stored_at",
            ns.table()
        );
        self.conn
            .execute(
                &sql,
                params![
                    name,
                    payload.to_vec(),
                    payload.len() as i64,
                    hash.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| LoaderError::StorageWrite(format!("put '{name}': {e}")))?;
        Ok(())
    }

    /// Get the payload stored under `name`, or `None` if absent.
    pub async fn get(&self, ns: Namespace, name: &str) -> Result<Option<Vec<u8>>> {
        let sql = format!("SELECT payload FROM {} WHERE name = ?1", ns.table());
        let mut rows = self
            .conn
            .query(&sql, params![name])
            .await
            .map_err(|e| LoaderError::StorageRead(format!("get '{name}': {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let payload: Vec<u8> = row
                    .get(0)
                    .map_err(|e| LoaderError::StorageRead(format!("get '{name}': {e}")))?;
                Ok(Some(payload))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(LoaderError::StorageRead(format!("get '{name}': {e}"))),
        }
    }

    /// Check whether `name` exists without copying its payload out.
    pub async fn contains(&self, ns: Namespace, name: &str) -> Result<bool> {
        let sql = format!("SELECT 1 FROM {} WHERE name = ?1", ns.table());
        let mut rows = self
            .conn
            .query(&sql, params![name])
            .await
            .map_err(|e| LoaderError::StorageRead(format!("contains '{name}': {e}")))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(LoaderError::StorageRead(format!("contains '{name}': {e}"))),
        }
    }

    /// Delete `name`. Deleting a non-existent key is not an error.
    /// Returns whether an entry was removed.
    pub async fn delete(&self, ns: Namespace, name: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE name = ?1", ns.table());
        let affected = self
            .conn
            .execute(&sql, params![name])
            .await
            .map_err(|e| LoaderError::StorageWrite(format!("delete '{name}': {e}")))?;
        Ok(affected > 0)
    }

    /// Delete every name in `names`. Missing keys are skipped silently.
    pub async fn delete_many(&self, ns: Namespace, names: &[String]) -> Result<()> {
        for name in names {
            let sql = format!("DELETE FROM {} WHERE name = ?1", ns.table());
            self.conn
                .execute(&sql, params![name.as_str()])
                .await
                .map_err(|e| LoaderError::StorageWrite(format!("delete '{name}': {e}")))?;
        }
        Ok(())
    }

    /// List entry metadata (no payloads) in a namespace, ordered by name.
    pub async fn list(&self, ns: Namespace) -> Result<Vec<EntryMeta>> {
        let sql = format!(
            "SELECT name, size, content_hash, stored_at FROM {} ORDER BY name",
            ns.table()
        );
        let mut rows = self
            .conn
            .query(&sql, params![])
            .await
            .map_err(|e| LoaderError::StorageRead(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_entry_meta(&row)?);
        }
        Ok(results)
    }
}

/// SHA-256 hash of a payload as lowercase hex.
pub fn content_hash(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

/// Convert a database row to an [`EntryMeta`].
fn row_to_entry_meta(row: &libsql::Row) -> Result<EntryMeta> {
    Ok(EntryMeta {
        name: row
            .get::<String>(0)
            .map_err(|e| LoaderError::StorageRead(e.to_string()))?,
        size: row
            .get::<i64>(1)
            .map_err(|e| LoaderError::StorageRead(e.to_string()))? as usize,
        content_hash: row
            .get::<String>(2)
            .map_err(|e| LoaderError::StorageRead(e.to_string()))?,
        stored_at: {
            let s: String = row
                .get(3)
                .map_err(|e| LoaderError::StorageRead(e.to_string()))?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| LoaderError::StorageRead(format!("invalid date: {e}")))?
        },
    })
}
