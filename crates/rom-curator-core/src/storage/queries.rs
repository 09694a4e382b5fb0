use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use tracing::debug;

use super::models::*;
use super::sqlite::Database;
use crate::catalog::CatalogEntry;
use crate::error::Error;
use crate::hasher::Crc32;
use crate::scanner::ScanOutcome;
use crate::status::RomStatus;

const RECORD_SELECT: &str = "SELECT sr.id, sr.system_id, sr.file_path, sr.file_size, \
         sr.calculated_crc32, sr.status, sr.matched_game_id, sr.similarity_score, \
         sr.closest_name, sr.error_message, sr.original_status, sr.scan_timestamp, \
         g.id, g.dat_game_name, g.dat_rom_name, g.major_name, g.region, g.languages, g.crc32 \
     FROM scanned_roms sr \
     LEFT JOIN games g ON sr.matched_game_id = g.id";

fn record_from_row(row: &Row) -> rusqlite::Result<ClassificationRecord> {
    let matched = match row.get::<_, Option<i64>>(12)? {
        Some(id) => Some(MatchedGame {
            id,
            name: row.get(13)?,
            rom_name: row.get(14)?,
            major_name: row.get(15)?,
            region: row.get(16)?,
            languages: row.get(17)?,
            crc32: row.get(18)?,
        }),
        None => None,
    };

    Ok(ClassificationRecord {
        id: row.get(0)?,
        system_id: row.get(1)?,
        // Version 0 files used '' for placeholders.
        file_path: row
            .get::<_, Option<String>>(2)?
            .filter(|path| !path.is_empty()),
        file_size: row.get::<_, i64>(3)? as u64,
        crc32: row.get(4)?,
        status: row.get(5)?,
        matched_game_id: row.get(6)?,
        similarity: row.get(7)?,
        closest_name: row.get(8)?,
        error_message: row.get(9)?,
        original_status: row.get(10)?,
        scan_timestamp: row.get(11)?,
        matched,
    })
}

fn ignored_crcs(conn: &Connection, system_id: i64) -> rusqlite::Result<HashSet<Crc32>> {
    let mut stmt = conn.prepare_cached(
        "SELECT DISTINCT calculated_crc32 FROM scanned_roms \
         WHERE system_id = ?1 AND status = ?2 AND calculated_crc32 IS NOT NULL",
    )?;
    let crcs = stmt
        .query_map(params![system_id, RomStatus::Ignored], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<Crc32>>>()?;
    Ok(crcs)
}

fn ignored_paths(conn: &Connection, system_id: i64) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT file_path FROM scanned_roms \
         WHERE system_id = ?1 AND status = ?2 AND file_path IS NOT NULL",
    )?;
    let paths = stmt
        .query_map(params![system_id, RomStatus::Ignored], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<String>>>()?;
    Ok(paths)
}

impl Database {
    // ── Scan Results ─────────────────────────────────────────────

    /// Replace every non-ignored record of `system_id` with `outcomes`.
    ///
    /// Outcomes whose CRC32 or path is currently ignored are skipped, so ignored
    /// records survive a rescan untouched. Runs as one transaction. Returns the
    /// number of records inserted.
    pub fn store_scan_results(
        &self,
        system_id: i64,
        outcomes: &[ScanOutcome],
    ) -> Result<usize, Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.connection().unchecked_transaction()?;

        let ignored_crcs = ignored_crcs(&tx, system_id)?;
        let ignored_paths = ignored_paths(&tx, system_id)?;

        let deleted = tx.execute(
            "DELETE FROM scanned_roms WHERE system_id = ?1 AND status != ?2",
            params![system_id, RomStatus::Ignored],
        )?;

        let mut inserted = 0;
        let mut skipped = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO scanned_roms \
                 (system_id, file_path, file_size, calculated_crc32, status, matched_game_id, \
                  similarity_score, closest_name, error_message, scan_timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for outcome in outcomes {
                let path = outcome.path.to_string_lossy();
                let path = path.as_ref();
                let crc_ignored = outcome
                    .crc32
                    .is_some_and(|crc32| ignored_crcs.contains(&crc32));
                if crc_ignored || ignored_paths.contains(path) {
                    skipped += 1;
                    continue;
                }
                inserted += stmt.execute(params![
                    system_id,
                    path,
                    outcome.size as i64,
                    outcome.crc32,
                    outcome.status,
                    outcome.matched_catalog_id(),
                    outcome.similarity,
                    outcome.closest_name,
                    outcome.error_message,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        debug!(
            "Stored scan for system {}: {} replaced, {} inserted, {} skipped as ignored",
            system_id, deleted, inserted, skipped
        );
        Ok(inserted)
    }

    /// Persist the post-scan missing set as placeholder records.
    ///
    /// Entries whose CRC32 is ignored, or that already have a placeholder,
    /// are skipped. Returns the number of placeholders created.
    pub fn record_missing(&self, system_id: i64, missing: &[CatalogEntry]) -> Result<usize, Error> {
        let now = chrono::Utc::now().to_rfc3339();
        let tx = self.connection().unchecked_transaction()?;
        let ignored = ignored_crcs(&tx, system_id)?;

        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO scanned_roms \
                 (system_id, file_path, file_size, calculated_crc32, status, matched_game_id, \
                  scan_timestamp) \
                 SELECT ?1, NULL, 0, ?2, ?3, ?4, ?5 \
                 WHERE NOT EXISTS (SELECT 1 FROM scanned_roms \
                     WHERE system_id = ?1 AND calculated_crc32 = ?2 AND file_path IS NULL)",
            )?;
            for game in missing.iter().filter(|g| !ignored.contains(&g.crc32)) {
                inserted += stmt.execute(params![
                    system_id,
                    game.crc32,
                    RomStatus::Missing,
                    game.id,
                    now
                ])?;
            }
        }
        tx.commit()?;
        debug!("Recorded {} missing entries for system {}", inserted, system_id);
        Ok(inserted)
    }

    // ── Single-record updates ────────────────────────────────────

    /// Set the status of the record(s) selected by exactly one of `file_path` or `crc32`.
    ///
    /// When `original_status` is given it is written to the shadow column in the
    /// same statement. Returns the number of rows changed; zero is not an error.
    pub fn update_rom_status(
        &self,
        system_id: i64,
        new_status: RomStatus,
        file_path: Option<&str>,
        crc32: Option<Crc32>,
        original_status: Option<RomStatus>,
    ) -> Result<usize, Error> {
        let key = RomKey::from_parts(file_path, crc32)?;
        let changed = match original_status {
            Some(original) => self.connection().execute(
                &format!(
                    "UPDATE scanned_roms SET status = ?1, original_status = ?2 \
                     WHERE system_id = ?3 AND {} = ?4",
                    key.column()
                ),
                params![new_status, original, system_id, key.value()],
            )?,
            None => self.connection().execute(
                &format!(
                    "UPDATE scanned_roms SET status = ?1 WHERE system_id = ?2 AND {} = ?3",
                    key.column()
                ),
                params![new_status, system_id, key.value()],
            )?,
        };
        debug!(
            "Set {} record(s) of system {} to {} ({:?})",
            changed, system_id, new_status, key
        );
        Ok(changed)
    }

    /// Re-key a record after the file was renamed on disk. History is kept.
    pub fn update_rom_path(
        &self,
        system_id: i64,
        old_path: &str,
        new_path: &str,
    ) -> Result<usize, Error> {
        let changed = self.connection().execute(
            "UPDATE scanned_roms SET file_path = ?1 WHERE system_id = ?2 AND file_path = ?3",
            params![new_path, system_id, old_path],
        )?;
        Ok(changed)
    }

    /// Insert one record as given. Returns its id.
    pub fn add_rom(
        &self,
        system_id: i64,
        status: RomStatus,
        file_path: Option<&str>,
        file_size: u64,
        crc32: Option<Crc32>,
        original_status: Option<RomStatus>,
    ) -> Result<i64, Error> {
        let now = chrono::Utc::now().to_rfc3339();
        self.connection().execute(
            "INSERT INTO scanned_roms \
             (system_id, file_path, file_size, calculated_crc32, status, original_status, \
              scan_timestamp) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                system_id,
                file_path,
                file_size as i64,
                crc32,
                status,
                original_status,
                now
            ],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    /// Ensure a `Missing` placeholder exists for `crc32`.
    ///
    /// Existing placeholders for the checksum are set back to `Missing` instead
    /// of adding another row. File-backed records with the same CRC32 are left
    /// alone.
    pub fn insert_missing_rom(
        &self,
        system_id: i64,
        crc32: Crc32,
        game: Option<&CatalogEntry>,
    ) -> Result<MissingInsert, Error> {
        let tx = self.connection().unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE scanned_roms SET status = ?1 \
             WHERE system_id = ?2 AND calculated_crc32 = ?3 AND file_path IS NULL",
            params![RomStatus::Missing, system_id, crc32],
        )?;
        if updated > 0 {
            tx.commit()?;
            return Ok(MissingInsert::Updated(updated));
        }

        tx.execute(
            "INSERT INTO scanned_roms \
             (system_id, file_path, file_size, calculated_crc32, status, matched_game_id, \
              scan_timestamp) \
             VALUES (?1, NULL, 0, ?2, ?3, ?4, ?5)",
            params![
                system_id,
                crc32,
                RomStatus::Missing,
                game.map(|g| g.id),
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        debug!("Inserted missing placeholder {} for {}", id, crc32);
        Ok(MissingInsert::Inserted(id))
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn get_scanned_roms_by_status(
        &self,
        system_id: i64,
        status: RomStatus,
    ) -> Result<Vec<ClassificationRecord>, Error> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "{} WHERE sr.system_id = ?1 AND sr.status = ?2 ORDER BY sr.file_path, sr.id",
            RECORD_SELECT
        ))?;
        let records = stmt
            .query_map(params![system_id, status], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn get_all_scanned_roms(&self, system_id: i64) -> Result<Vec<ClassificationRecord>, Error> {
        let mut stmt = self.connection().prepare_cached(&format!(
            "{} WHERE sr.system_id = ?1 ORDER BY sr.file_path, sr.id",
            RECORD_SELECT
        ))?;
        let records = stmt
            .query_map(params![system_id], record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn get_rom_by_file_path(
        &self,
        system_id: i64,
        file_path: &str,
    ) -> Result<Option<ClassificationRecord>, Error> {
        let record = self
            .connection()
            .query_row(
                &format!(
                    "{} WHERE sr.system_id = ?1 AND sr.file_path = ?2",
                    RECORD_SELECT
                ),
                params![system_id, file_path],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// The oldest record carrying `crc32`, if any.
    pub fn get_rom_by_crc32(
        &self,
        system_id: i64,
        crc32: Crc32,
    ) -> Result<Option<ClassificationRecord>, Error> {
        let record = self
            .connection()
            .query_row(
                &format!(
                    "{} WHERE sr.system_id = ?1 AND sr.calculated_crc32 = ?2 \
                     ORDER BY sr.id LIMIT 1",
                    RECORD_SELECT
                ),
                params![system_id, crc32],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Records whose matched catalog entry has a CRC32 in `visible`.
    pub fn get_scanned_roms_with_matched_games(
        &self,
        system_id: i64,
        visible: &[Crc32],
    ) -> Result<Vec<ClassificationRecord>, Error> {
        if visible.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (0..visible.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.connection().prepare(&format!(
            "{} WHERE sr.system_id = ?1 AND g.crc32 IN ({}) ORDER BY sr.file_path, sr.id",
            RECORD_SELECT, placeholders
        ))?;

        let mut values: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(visible.len() + 1);
        values.push(&system_id);
        values.extend(visible.iter().map(|crc32| crc32 as &dyn rusqlite::ToSql));
        let records = stmt
            .query_map(params_from_iter(values), record_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    pub fn get_scan_summary(&self, system_id: i64) -> Result<ScanSummary, Error> {
        let mut stmt = self.connection().prepare_cached(
            "SELECT status, COUNT(*) FROM scanned_roms WHERE system_id = ?1 GROUP BY status",
        )?;
        let rows = stmt
            .query_map(params![system_id], |row| {
                Ok((row.get::<_, RomStatus>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut summary = ScanSummary::default();
        for (status, count) in rows {
            summary.add(status, count as usize);
        }
        Ok(summary)
    }

    /// The shadow status recorded for `crc32`.
    ///
    /// Ignored records are read first, so the shadow of an ignored copy is
    /// found even when an older, non-ignored record shares the checksum.
    pub fn get_rom_original_status(
        &self,
        system_id: i64,
        crc32: Crc32,
    ) -> Result<Option<RomStatus>, Error> {
        let status = self
            .connection()
            .query_row(
                "SELECT original_status FROM scanned_roms \
                 WHERE system_id = ?1 AND calculated_crc32 = ?2 \
                 ORDER BY (status = ?3) DESC, id LIMIT 1",
                params![system_id, crc32, RomStatus::Ignored],
                |row| row.get::<_, Option<RomStatus>>(0),
            )
            .optional()?;
        Ok(status.flatten())
    }

    /// Ignored CRC32s of `system_id`, read from the store on every call.
    pub fn get_ignored_crcs(&self, system_id: i64) -> Result<HashSet<Crc32>, Error> {
        Ok(ignored_crcs(self.connection(), system_id)?)
    }

    // ── Deletes ──────────────────────────────────────────────────

    pub fn clear_system_scans(&self, system_id: i64) -> Result<usize, Error> {
        let deleted = self.connection().execute(
            "DELETE FROM scanned_roms WHERE system_id = ?1",
            params![system_id],
        )?;
        debug!("Cleared {} records of system {}", deleted, system_id);
        Ok(deleted)
    }

    pub fn delete_rom_by_crc(&self, system_id: i64, crc32: Crc32) -> Result<usize, Error> {
        let deleted = self.connection().execute(
            "DELETE FROM scanned_roms WHERE system_id = ?1 AND calculated_crc32 = ?2",
            params![system_id, crc32],
        )?;
        Ok(deleted)
    }
}
