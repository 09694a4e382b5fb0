use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version of the status string mapping stored in `scanned_roms.status`.
/// Renaming a variant requires bumping this and accepting the old spelling in `from_str`.
pub const STATUS_MAPPING_VERSION: u32 = 1;

/// Classification of one file (or one catalog entry, for `Missing`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RomStatus {
    /// Content matches a catalog entry and the filename matches too.
    Correct,
    /// Content matches a catalog entry, the filename does not.
    WrongFilename,
    /// File is present but could not be read.
    Broken,
    /// Content does not match any catalog entry.
    NotRecognized,
    /// Content matches a catalog entry already claimed earlier in the same scan.
    Duplicate,
    /// Catalog entry with no corresponding file.
    Missing,
    /// Explicitly excluded by the user; the prior status lives in the shadow column.
    Ignored,
    MovedExtra,
    MovedBroken,
}

#[derive(Debug, Error)]
#[error("unknown ROM status '{0}'")]
pub struct UnknownStatus(pub String);

impl RomStatus {
    pub const ALL: [RomStatus; 9] = [
        RomStatus::Correct,
        RomStatus::WrongFilename,
        RomStatus::Broken,
        RomStatus::NotRecognized,
        RomStatus::Duplicate,
        RomStatus::Missing,
        RomStatus::Ignored,
        RomStatus::MovedExtra,
        RomStatus::MovedBroken,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RomStatus::Correct => "correct",
            RomStatus::WrongFilename => "wrong_filename",
            RomStatus::Broken => "broken",
            RomStatus::NotRecognized => "not_recognized",
            RomStatus::Duplicate => "duplicate",
            RomStatus::Missing => "missing",
            RomStatus::Ignored => "ignored",
            RomStatus::MovedExtra => "moved_extra",
            RomStatus::MovedBroken => "moved_broken",
        }
    }

    /// Statuses that always carry a matched catalog entry on a scan outcome.
    pub fn has_catalog_match(self) -> bool {
        matches!(
            self,
            RomStatus::Correct | RomStatus::WrongFilename | RomStatus::Duplicate
        )
    }

    /// Statuses that claim a catalog slot for the missing-set computation.
    pub fn claims_catalog_entry(self) -> bool {
        matches!(self, RomStatus::Correct | RomStatus::WrongFilename)
    }
}

impl fmt::Display for RomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RomStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RomStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

impl ToSql for RomStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RomStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip() {
        for status in RomStatus::ALL {
            assert_eq!(status.as_str().parse::<RomStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_fails() {
        let err = "moved_to_trash".parse::<RomStatus>().unwrap_err();
        assert_eq!(err.0, "moved_to_trash");
        // Casing is part of the persisted mapping.
        assert!("Correct".parse::<RomStatus>().is_err());
    }

    #[test]
    fn test_catalog_match_statuses() {
        let matched: Vec<_> = RomStatus::ALL
            .into_iter()
            .filter(|s| s.has_catalog_match())
            .collect();
        assert_eq!(
            matched,
            vec![
                RomStatus::Correct,
                RomStatus::WrongFilename,
                RomStatus::Duplicate
            ]
        );
        assert!(!RomStatus::Duplicate.claims_catalog_entry());
    }

    #[test]
    fn test_invalid_status_in_sqlite_is_an_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let parsed: rusqlite::Result<RomStatus> =
            conn.query_row("SELECT 'bogus'", [], |row| row.get(0));
        assert!(parsed.is_err());
        let parsed: RomStatus = conn
            .query_row("SELECT ?1", [RomStatus::WrongFilename], |row| row.get(0))
            .unwrap();
        assert_eq!(parsed, RomStatus::WrongFilename);
    }
}
