//! The ignore side-state.
//!
//! `Any --mark_ignored--> Ignored --unignore--> Any`. The prior status is kept
//! in `original_status` (a single slot, not a stack). Rescans never touch
//! ignored rows; see [`Database::store_scan_results`].

use rusqlite::params;
use tracing::{debug, info};

use super::models::RomKey;
use super::sqlite::Database;
use crate::error::Error;
use crate::status::RomStatus;

impl Database {
    /// Mark the record(s) selected by `key` as ignored, saving the current status.
    ///
    /// Re-marking an ignored record keeps its saved status. A CRC32 with no
    /// record at all (a missing entry never persisted) gets an ignored
    /// placeholder whose saved status is `Missing`. Returns rows affected.
    pub fn mark_ignored(&self, system_id: i64, key: &RomKey) -> Result<usize, Error> {
        let tx = self.connection().unchecked_transaction()?;
        let mut changed = tx.execute(
            &format!(
                "UPDATE scanned_roms SET \
                     original_status = CASE WHEN status = ?1 THEN original_status ELSE status END, \
                     status = ?1 \
                 WHERE system_id = ?2 AND {} = ?3",
                key.column()
            ),
            params![RomStatus::Ignored, system_id, key.value()],
        )?;

        if changed == 0 {
            if let RomKey::Crc(crc32) = key {
                changed = tx.execute(
                    "INSERT INTO scanned_roms \
                     (system_id, file_path, file_size, calculated_crc32, status, \
                      original_status, scan_timestamp) \
                     VALUES (?1, NULL, 0, ?2, ?3, ?4, ?5)",
                    params![
                        system_id,
                        crc32,
                        RomStatus::Ignored,
                        RomStatus::Missing,
                        chrono::Utc::now().to_rfc3339()
                    ],
                )?;
                debug!("Created ignored placeholder for {}", crc32);
            }
        }
        tx.commit()?;
        info!("Ignored {} record(s) of system {} ({:?})", changed, system_id, key);
        Ok(changed)
    }

    /// Restore ignored record(s) selected by `key` to their saved status.
    ///
    /// Records without a saved status are removed so the next scan derives
    /// them again. Records that are not ignored are left alone; zero rows
    /// affected is not an error.
    pub fn unignore(&self, system_id: i64, key: &RomKey) -> Result<usize, Error> {
        let tx = self.connection().unchecked_transaction()?;
        let restored = tx.execute(
            &format!(
                "UPDATE scanned_roms SET status = original_status \
                 WHERE system_id = ?1 AND {} = ?2 AND status = ?3 \
                   AND original_status IS NOT NULL",
                key.column()
            ),
            params![system_id, key.value(), RomStatus::Ignored],
        )?;
        let dropped = tx.execute(
            &format!(
                "DELETE FROM scanned_roms \
                 WHERE system_id = ?1 AND {} = ?2 AND status = ?3 \
                   AND original_status IS NULL",
                key.column()
            ),
            params![system_id, key.value(), RomStatus::Ignored],
        )?;
        tx.commit()?;
        info!(
            "Unignored {} record(s) of system {} ({:?}), {} left for rescan",
            restored + dropped,
            system_id,
            key,
            dropped
        );
        Ok(restored + dropped)
    }
}
