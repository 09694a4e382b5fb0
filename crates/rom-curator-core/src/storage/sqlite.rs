use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

use crate::error::Error;

/// Current layout of the tables in `schema.sql`, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = include_str!("schema.sql");

/// Handle to the SQLite file holding the catalog and classification tables.
///
/// Every multi-statement write runs inside one transaction, so a reader on
/// another connection sees either the old state or the new one.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        debug!("Opened database {}", path.display());
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<(), Error> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -16000;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, foreign keys on)");
        Ok(())
    }

    /// Bring an older file up to [`SCHEMA_VERSION`].
    ///
    /// Version 0 files store missing placeholders with an empty `file_path`
    /// and may lack `original_status`/`closest_name`. Their `scanned_roms`
    /// table is rebuilt in place; no row is dropped, so user overrides survive.
    fn migrate_schema(&self) -> Result<(), Error> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < 1 && self.table_exists("scanned_roms")? {
            debug!("Schema version {} < 1, rebuilding scanned_roms", version);
            self.rebuild_legacy_scanned_roms()?;
        }

        self.conn.execute_batch(SCHEMA)?;
        self.conn
            .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
        Ok(())
    }

    fn rebuild_legacy_scanned_roms(&self) -> Result<(), Error> {
        let columns = self.table_columns("scanned_roms")?;
        let optional = |name: &str| {
            if columns.iter().any(|c| c == name) {
                name.to_string()
            } else {
                "NULL".to_string()
            }
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute_batch("ALTER TABLE scanned_roms RENAME TO scanned_roms_v0;")?;
        tx.execute_batch(SCHEMA)?;
        let copied = tx.execute(
            &format!(
                "INSERT INTO scanned_roms \
                 (id, system_id, file_path, file_size, calculated_crc32, status, \
                  matched_game_id, similarity_score, closest_name, error_message, \
                  original_status, scan_timestamp) \
                 SELECT id, system_id, NULLIF(file_path, ''), COALESCE(file_size, 0), \
                        calculated_crc32, status, matched_game_id, {}, {}, {}, {}, \
                        COALESCE({}, CURRENT_TIMESTAMP) \
                 FROM scanned_roms_v0",
                optional("similarity_score"),
                optional("closest_name"),
                optional("error_message"),
                optional("original_status"),
                optional("scan_timestamp"),
            ),
            [],
        )?;
        tx.execute_batch("DROP TABLE scanned_roms_v0;")?;
        tx.commit()?;
        debug!("Migrated {} scanned_roms rows", copied);
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool, Error> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>, Error> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
