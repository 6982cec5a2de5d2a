pub mod migrations;
pub mod models;
pub mod queries;
pub mod records;

use anyhow::Result;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

pub use records::{RecordQuery, UpdateOutcome};

pub const DEFAULT_READERS: usize = 4;

/// SQLite handle with a reader/writer split: one connection takes every
/// write, a small round-robin pool of read-only connections serves reads.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    pub fn open(path: &Path, readers: usize) -> Result<Self> {
        let writer = Connection::open(path)?;

        // WAL mode so readers never block the writer
        let mode: String =
            writer.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&writer)?;

        let pool_size = readers.max(1);
        let mut pool = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            pool.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers, journal_mode={})",
            path.display(),
            pool_size,
            mode
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers: pool,
            reader_idx: AtomicUsize::new(0),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| anyhow::anyhow!("Reader lock poisoned: {}", e))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("Writer lock poisoned: {}", e))?;
        f(&mut conn)
    }
}

#[cfg(test)]
pub(crate) fn open_temp() -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("tabula.db"), 2).unwrap();
    (dir, db)
}

#[cfg(test)]
pub(crate) fn definition(
    team: &models::TeamRow,
    name: &str,
    fields: &str,
    types: &str,
) -> tabula_engine::TableDefinition {
    let now = chrono::Utc::now();
    tabula_engine::TableDefinition {
        id: 0,
        team_id: team.id,
        team_name: team.team_name.clone(),
        table_name: name.into(),
        table_label: name.into(),
        field_names: fields.into(),
        field_types: types.into(),
        table_state: tabula_engine::TableState::TableCreated,
        table_privacy_model: tabula_engine::PrivacyLevel::Private,
        table_view_mode: 0,
        created_user_name: "admin".into(),
        created_at: now,
        updated_user_name: "admin".into(),
        updated_at: now,
    }
}
