use serde::Serialize;

use crate::error::Error;
use crate::hasher::Crc32;
use crate::scanner::ScanOutcome;
use crate::status::RomStatus;

/// A system row with the number of catalog entries it owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemRecord {
    pub id: i64,
    pub name: String,
    pub dat_file_path: String,
    pub game_count: i64,
}

/// Catalog fields joined onto a classification record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedGame {
    pub id: i64,
    pub name: String,
    pub rom_name: String,
    pub major_name: String,
    pub region: Option<String>,
    pub languages: Option<String>,
    pub crc32: Crc32,
}

/// The persisted verdict for one file, or one placeholder when `file_path` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRecord {
    pub id: i64,
    pub system_id: i64,
    pub file_path: Option<String>,
    pub file_size: u64,
    pub crc32: Option<Crc32>,
    pub status: RomStatus,
    pub matched_game_id: Option<i64>,
    pub similarity: Option<f64>,
    pub closest_name: Option<String>,
    pub error_message: Option<String>,
    /// Status to restore on unignore. Only meaningful while `status` is `Ignored`.
    pub original_status: Option<RomStatus>,
    pub scan_timestamp: String,
    pub matched: Option<MatchedGame>,
}

/// Selects the record(s) a single-record store operation applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomKey {
    Path(String),
    Crc(Crc32),
}

impl RomKey {
    /// Exactly one discriminator must be supplied.
    pub fn from_parts(file_path: Option<&str>, crc32: Option<Crc32>) -> Result<Self, Error> {
        match (file_path, crc32) {
            (Some(path), None) => Ok(RomKey::Path(path.to_string())),
            (None, Some(crc32)) => Ok(RomKey::Crc(crc32)),
            (None, None) => Err(Error::InvalidArgument(
                "either file_path or crc32 must be provided".to_string(),
            )),
            (Some(_), Some(_)) => Err(Error::InvalidArgument(
                "file_path and crc32 are mutually exclusive".to_string(),
            )),
        }
    }

    pub(crate) fn column(&self) -> &'static str {
        match self {
            RomKey::Path(_) => "file_path",
            RomKey::Crc(_) => "calculated_crc32",
        }
    }

    pub(crate) fn value(&self) -> &dyn rusqlite::ToSql {
        match self {
            RomKey::Path(path) => path,
            RomKey::Crc(crc32) => crc32,
        }
    }
}

/// What [`Database::insert_missing_rom`](super::Database::insert_missing_rom) did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInsert {
    /// A new placeholder row with this id.
    Inserted(i64),
    /// Existing placeholders for the CRC32 were set back to `Missing`.
    Updated(usize),
}

/// Record counts per status. `total` excludes `ignored` rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub correct: usize,
    pub wrong_filename: usize,
    pub broken: usize,
    pub not_recognized: usize,
    pub duplicate: usize,
    pub missing: usize,
    pub ignored: usize,
    pub moved_extra: usize,
    pub moved_broken: usize,
}

impl ScanSummary {
    /// Summarise an unpersisted result list.
    pub fn from_outcomes(outcomes: &[ScanOutcome]) -> Self {
        let mut summary = ScanSummary::default();
        for outcome in outcomes {
            summary.add(outcome.status, 1);
        }
        summary
    }

    pub fn add(&mut self, status: RomStatus, count: usize) {
        let slot = match status {
            RomStatus::Correct => &mut self.correct,
            RomStatus::WrongFilename => &mut self.wrong_filename,
            RomStatus::Broken => &mut self.broken,
            RomStatus::NotRecognized => &mut self.not_recognized,
            RomStatus::Duplicate => &mut self.duplicate,
            RomStatus::Missing => &mut self.missing,
            RomStatus::Ignored => &mut self.ignored,
            RomStatus::MovedExtra => &mut self.moved_extra,
            RomStatus::MovedBroken => &mut self.moved_broken,
        };
        *slot += count;
        if status != RomStatus::Ignored {
            self.total += count;
        }
    }

    pub fn count(&self, status: RomStatus) -> usize {
        match status {
            RomStatus::Correct => self.correct,
            RomStatus::WrongFilename => self.wrong_filename,
            RomStatus::Broken => self.broken,
            RomStatus::NotRecognized => self.not_recognized,
            RomStatus::Duplicate => self.duplicate,
            RomStatus::Missing => self.missing,
            RomStatus::Ignored => self.ignored,
            RomStatus::MovedExtra => self.moved_extra,
            RomStatus::MovedBroken => self.moved_broken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rom_key_requires_exactly_one_discriminator() {
        assert_eq!(
            RomKey::from_parts(Some("/roms/a.nes"), None).unwrap(),
            RomKey::Path("/roms/a.nes".to_string())
        );
        assert_eq!(
            RomKey::from_parts(None, Some(Crc32::new(7))).unwrap(),
            RomKey::Crc(Crc32::new(7))
        );
        assert!(matches!(
            RomKey::from_parts(None, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            RomKey::from_parts(Some("/roms/a.nes"), Some(Crc32::new(7))),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_summary_total_excludes_ignored() {
        let mut summary = ScanSummary::default();
        summary.add(RomStatus::Correct, 3);
        summary.add(RomStatus::Missing, 2);
        summary.add(RomStatus::Ignored, 4);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.count(RomStatus::Ignored), 4);
        assert_eq!(summary.count(RomStatus::Correct), 3);
        assert_eq!(summary.count(RomStatus::Duplicate), 0);
    }
}
