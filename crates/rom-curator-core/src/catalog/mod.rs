//! Read-only view of the DAT catalog for one system.
//!
//! The catalog is populated elsewhere (a DAT importer writes the `games` table);
//! the scanning engine only needs [`CatalogLookup`].

use crate::error::Error;
use crate::hasher::Crc32;
use crate::similarity::{similarity_at_least, NameKey};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Release flags parsed from the DAT name by the importer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogFlags {
    pub beta: bool,
    pub demo: bool,
    pub proto: bool,
    pub unlicensed: bool,
    pub translation: bool,
    pub modified: bool,
    pub overdump: bool,
}

/// One known-good dump in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub system_id: i64,
    /// Canonical game name, e.g. `Foo (USA)`.
    pub name: String,
    /// File name the DAT expects, e.g. `Foo (USA).nes`.
    pub rom_name: String,
    /// Title without region/flag decorations.
    pub major_name: String,
    pub region: Option<String>,
    pub languages: Option<String>,
    pub size: u64,
    pub crc32: Crc32,
    pub flags: CatalogFlags,
    pub verified_dump: bool,
}

impl CatalogEntry {
    /// Whether `path` carries the name the catalog expects for this entry.
    ///
    /// The file stem or the full file name must equal the canonical name, or
    /// the full file name must equal the DAT ROM name. Comparison ignores case.
    /// The full-name check covers extensionless files such as `Dr. Mario`.
    pub fn name_matches(&self, path: &Path) -> bool {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let name = self.name.to_lowercase();

        (!stem.is_empty() && stem == name)
            || (!file_name.is_empty()
                && (file_name == name || file_name == self.rom_name.to_lowercase()))
    }

    /// Names a filename is compared against: ROM name stem, canonical name
    /// and major name, without repeats.
    fn name_keys(&self) -> Vec<NameKey> {
        let rom_stem = Path::new(&self.rom_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut keys: Vec<NameKey> = Vec::with_capacity(3);
        for name in [rom_stem.as_str(), self.name.as_str(), self.major_name.as_str()] {
            let key = NameKey::new(name);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

/// The catalog contract consumed by the scanner.
pub trait CatalogLookup {
    /// All entries for a system, in catalog id order.
    fn games_by_system(&self, system_id: i64) -> Result<Vec<CatalogEntry>, Error>;

    /// First entry (by catalog id) whose CRC32 and size both match.
    fn game_by_crc(
        &self,
        system_id: i64,
        crc32: Crc32,
        size: u64,
    ) -> Result<Option<CatalogEntry>, Error>;
}

/// An in-memory catalog. Entries are treated as if ordered by `id`.
impl CatalogLookup for Vec<CatalogEntry> {
    fn games_by_system(&self, system_id: i64) -> Result<Vec<CatalogEntry>, Error> {
        let mut games: Vec<CatalogEntry> = self
            .iter()
            .filter(|g| g.system_id == system_id)
            .cloned()
            .collect();
        games.sort_by_key(|g| g.id);
        Ok(games)
    }

    fn game_by_crc(
        &self,
        system_id: i64,
        crc32: Crc32,
        size: u64,
    ) -> Result<Option<CatalogEntry>, Error> {
        Ok(self
            .iter()
            .filter(|g| g.system_id == system_id && g.crc32 == crc32 && g.size == size)
            .min_by_key(|g| g.id)
            .cloned())
    }
}

/// Per-scan copy of a system's catalog, indexed by (CRC32, size).
///
/// Loaded once at the start of a scan so each candidate is matched without a
/// round trip to the store. Never outlives the scan that loaded it.
#[derive(Debug, Default)]
pub struct CatalogSnapshot {
    entries: Vec<CatalogEntry>,
    by_fingerprint: HashMap<(Crc32, u64), usize>,
    /// Parallel to `entries`.
    name_keys: Vec<Vec<NameKey>>,
}

impl CatalogSnapshot {
    pub fn load(catalog: &dyn CatalogLookup, system_id: i64) -> Result<Self, Error> {
        Ok(Self::from_entries(catalog.games_by_system(system_id)?))
    }

    pub fn from_entries(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by_key(|e| e.id);
        let mut by_fingerprint = HashMap::with_capacity(entries.len());
        for (idx, entry) in entries.iter().enumerate() {
            // Keep the lowest id when a pathological DAT repeats CRC32+size.
            by_fingerprint.entry((entry.crc32, entry.size)).or_insert(idx);
        }
        let name_keys = entries.iter().map(CatalogEntry::name_keys).collect();
        Self {
            entries,
            by_fingerprint,
            name_keys,
        }
    }

    pub fn find(&self, crc32: Crc32, size: u64) -> Option<&CatalogEntry> {
        self.by_fingerprint
            .get(&(crc32, size))
            .map(|&idx| &self.entries[idx])
    }

    /// The entry whose names best resemble `name`, if its score reaches `min_score`.
    ///
    /// Ties keep the lowest catalog id. Entries that cannot beat the best score
    /// so far are skipped without computing a full distance.
    pub fn closest(&self, name: &str, min_score: f64) -> Option<(f64, &CatalogEntry)> {
        let query = NameKey::new(name);
        let mut best: Option<(f64, usize)> = None;

        for (idx, keys) in self.name_keys.iter().enumerate() {
            for key in keys {
                let floor = best.map_or(min_score, |(score, _)| score);
                if let Some(score) = similarity_at_least(&query, key, floor) {
                    if best.map_or(true, |(top, _)| score > top) {
                        best = Some((score, idx));
                    }
                }
            }
        }
        best.map(|(score, idx)| (score, &self.entries[idx]))
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
