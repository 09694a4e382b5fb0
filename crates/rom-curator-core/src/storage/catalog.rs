use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use super::models::SystemRecord;
use super::sqlite::Database;
use crate::catalog::{CatalogEntry, CatalogFlags, CatalogLookup};
use crate::error::Error;
use crate::hasher::Crc32;

const GAME_COLUMNS: &str = "id, system_id, dat_game_name, dat_rom_name, major_name, region, \
     languages, is_beta, is_demo, is_proto, is_unlicensed, is_unofficial_translation, \
     is_modified_release, is_overdump, is_verified_dump, crc32, size";

fn game_from_row(row: &Row) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        system_id: row.get(1)?,
        name: row.get(2)?,
        rom_name: row.get(3)?,
        major_name: row.get(4)?,
        region: row.get(5)?,
        languages: row.get(6)?,
        flags: CatalogFlags {
            beta: row.get(7)?,
            demo: row.get(8)?,
            proto: row.get(9)?,
            unlicensed: row.get(10)?,
            translation: row.get(11)?,
            modified: row.get(12)?,
            overdump: row.get(13)?,
        },
        verified_dump: row.get(14)?,
        crc32: row.get(15)?,
        size: row.get::<_, i64>(16)? as u64,
    })
}

impl Database {
    // ── Systems ──────────────────────────────────────────────────

    /// Create a system, or update the DAT path of an existing one. Returns its id.
    ///
    /// An existing system keeps its id, so its games and scans are untouched.
    pub fn add_system(&self, name: &str, dat_file_path: &str) -> Result<i64, Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let id = self.connection().query_row(
            "INSERT INTO systems (system_name, dat_file_path, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(system_name) DO UPDATE SET \
                 dat_file_path = excluded.dat_file_path, \
                 updated_at = excluded.updated_at \
             RETURNING id",
            params![name, dat_file_path, now],
            |row| row.get(0),
        )?;
        debug!("Registered system '{}' as {}", name, id);
        Ok(id)
    }

    pub fn get_system_by_name(&self, name: &str) -> Result<Option<SystemRecord>, Error> {
        let system = self
            .connection()
            .query_row(
                "SELECT s.id, s.system_name, s.dat_file_path, \
                        (SELECT COUNT(*) FROM games g WHERE g.system_id = s.id) \
                 FROM systems s WHERE s.system_name = ?1",
                params![name],
                |row| {
                    Ok(SystemRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        dat_file_path: row.get(2)?,
                        game_count: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(system)
    }

    pub fn get_all_systems(&self) -> Result<Vec<SystemRecord>, Error> {
        let mut stmt = self.connection().prepare(
            "SELECT s.id, s.system_name, s.dat_file_path, COUNT(g.id) \
             FROM systems s LEFT JOIN games g ON g.system_id = s.id \
             GROUP BY s.id ORDER BY s.system_name",
        )?;
        let systems = stmt
            .query_map([], |row| {
                Ok(SystemRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    dat_file_path: row.get(2)?,
                    game_count: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(systems)
    }

    /// Delete a system. Its games and classification records cascade.
    pub fn delete_system(&self, system_id: i64) -> Result<usize, Error> {
        let deleted = self
            .connection()
            .execute("DELETE FROM systems WHERE id = ?1", params![system_id])?;
        debug!("Deleted system {} ({} rows)", system_id, deleted);
        Ok(deleted)
    }

    // ── Games ────────────────────────────────────────────────────

    /// Insert a catalog entry for `system_id`. `game.id` and `game.system_id` are ignored.
    pub fn add_game(&self, system_id: i64, game: &CatalogEntry) -> Result<i64, Error> {
        self.connection().execute(
            "INSERT INTO games \
             (system_id, dat_game_name, dat_rom_name, major_name, region, languages, \
              is_beta, is_demo, is_proto, is_unlicensed, is_unofficial_translation, \
              is_modified_release, is_overdump, is_verified_dump, crc32, size) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                system_id,
                game.name,
                game.rom_name,
                game.major_name,
                game.region,
                game.languages,
                game.flags.beta,
                game.flags.demo,
                game.flags.proto,
                game.flags.unlicensed,
                game.flags.translation,
                game.flags.modified,
                game.flags.overdump,
                game.verified_dump,
                game.crc32,
                game.size as i64,
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn get_games_by_system(&self, system_id: i64) -> Result<Vec<CatalogEntry>, Error> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "SELECT {} FROM games WHERE system_id = ?1 ORDER BY id",
            GAME_COLUMNS
        ))?;
        let games = stmt
            .query_map(params![system_id], game_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(games)
    }

    pub fn get_game_by_crc(
        &self,
        system_id: i64,
        crc32: Crc32,
        size: u64,
    ) -> Result<Option<CatalogEntry>, Error> {
        let game = self
            .connection()
            .query_row(
                &format!(
                    "SELECT {} FROM games \
                     WHERE system_id = ?1 AND crc32 = ?2 AND size = ?3 \
                     ORDER BY id LIMIT 1",
                    GAME_COLUMNS
                ),
                params![system_id, crc32, size as i64],
                game_from_row,
            )
            .optional()?;
        Ok(game)
    }
}

impl CatalogLookup for Database {
    fn games_by_system(&self, system_id: i64) -> Result<Vec<CatalogEntry>, Error> {
        self.get_games_by_system(system_id)
    }

    fn game_by_crc(
        &self,
        system_id: i64,
        crc32: Crc32,
        size: u64,
    ) -> Result<Option<CatalogEntry>, Error> {
        self.get_game_by_crc(system_id, crc32, size)
    }
}
