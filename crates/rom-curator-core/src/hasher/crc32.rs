use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// CRC32 content fingerprint. Displayed and persisted as 8 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Crc32(u32);

#[derive(Debug, Error)]
#[error("invalid CRC32 '{0}'")]
pub struct InvalidCrc(pub String);

impl Crc32 {
    pub fn new(value: u32) -> Self {
        Crc32(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Checksum of an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Crc32(crc32fast::hash(data))
    }
}

impl fmt::Display for Crc32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl FromStr for Crc32 {
    type Err = InvalidCrc;

    /// Accepts DAT-style hex in either case, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > 8 {
            return Err(InvalidCrc(s.to_string()));
        }
        u32::from_str_radix(digits, 16)
            .map(Crc32)
            .map_err(|_| InvalidCrc(s.to_string()))
    }
}

impl Serialize for Crc32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl ToSql for Crc32 {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Crc32 {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// Byte length and CRC32 of a file, as read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub size: u64,
    pub crc32: Crc32,
}

/// A file could not be opened or failed partway through reading.
/// Any partially computed checksum is discarded.
#[derive(Debug, Error)]
#[error("could not read {}: {source}", path.display())]
pub struct Unreadable {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Stream `path` in `chunk_size` pieces and return its size and CRC32.
/// Memory use is bounded by the chunk size regardless of file size.
pub fn fingerprint(path: &Path, chunk_size: usize) -> Result<Fingerprint, Unreadable> {
    let unreadable = |source: io::Error| Unreadable {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(unreadable)?;
    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut hasher = crc32fast::Hasher::new();
    let mut size = 0u64;

    loop {
        let read = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(unreadable(e)),
        };
        hasher.update(&buffer[..read]);
        size += read as u64;
    }

    Ok(Fingerprint {
        size,
        crc32: Crc32(hasher.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_crc32_display_is_zero_padded_lowercase() {
        assert_eq!(Crc32::new(0xAB).to_string(), "000000ab");
        assert_eq!(Crc32::new(0xDEADBEEF).to_string(), "deadbeef");
    }

    #[test]
    fn test_crc32_parse_accepts_dat_spellings() {
        assert_eq!("DEADBEEF".parse::<Crc32>().unwrap(), Crc32::new(0xDEADBEEF));
        assert_eq!("0x000000ab".parse::<Crc32>().unwrap(), Crc32::new(0xAB));
        assert_eq!(" 1a2b3c4d ".parse::<Crc32>().unwrap(), Crc32::new(0x1A2B3C4D));
        assert!("".parse::<Crc32>().is_err());
        assert!("123456789".parse::<Crc32>().is_err());
        assert!("xyz".parse::<Crc32>().is_err());
    }

    #[test]
    fn test_known_checksum() {
        // Standard CRC-32 check value.
        assert_eq!(Crc32::of(b"123456789"), Crc32::new(0xCBF43926));
    }

    #[test]
    fn test_fingerprint_is_independent_of_chunk_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.bin");
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        let expected = Fingerprint {
            size: data.len() as u64,
            crc32: Crc32::of(&data),
        };
        for chunk_size in [1, 7, 4096, DEFAULT_CHUNK_SIZE, 1 << 20] {
            assert_eq!(fingerprint(&path, chunk_size).unwrap(), expected);
        }
    }

    #[test]
    fn test_fingerprint_twice_is_identical() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("game.bin");
        fs::write(&path, b"some rom content").unwrap();

        let first = fingerprint(&path, DEFAULT_CHUNK_SIZE).unwrap();
        let second = fingerprint(&path, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_fingerprint_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        fs::write(&path, b"").unwrap();

        let fp = fingerprint(&path, DEFAULT_CHUNK_SIZE).unwrap();
        assert_eq!(fp.size, 0);
        assert_eq!(fp.crc32, Crc32::new(0));
    }

    #[test]
    fn test_fingerprint_missing_file_is_unreadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.bin");
        let err = fingerprint(&path, DEFAULT_CHUNK_SIZE).unwrap_err();
        assert_eq!(err.path, path);
        assert_eq!(err.source.kind(), io::ErrorKind::NotFound);
    }
}
