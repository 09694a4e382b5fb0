use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{trace, warn};

use super::walk::ScanCandidate;
use crate::catalog::{CatalogEntry, CatalogSnapshot};
use crate::hasher::{Crc32, Fingerprint, Unreadable};
use crate::status::RomStatus;

/// The verdict for one candidate file in one scan pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanOutcome {
    pub path: PathBuf,
    pub size: u64,
    /// `None` when the file could not be read.
    pub crc32: Option<Crc32>,
    pub status: RomStatus,
    /// Present iff `status.has_catalog_match()`.
    pub matched: Option<CatalogEntry>,
    /// 1.0 for catalog matches. For unrecognised files, the best filename
    /// score when it reaches the similarity threshold.
    pub similarity: Option<f64>,
    /// Closest catalog name for an unrecognised file, when similar enough.
    pub closest_name: Option<String>,
    /// For duplicates, the earlier file that claimed the catalog entry.
    pub duplicate_of: Option<PathBuf>,
    pub error_message: Option<String>,
}

impl ScanOutcome {
    pub fn matched_catalog_id(&self) -> Option<i64> {
        self.matched.as_ref().map(|entry| entry.id)
    }

    fn base(path: &Path, size: u64, crc32: Option<Crc32>, status: RomStatus) -> Self {
        Self {
            path: path.to_path_buf(),
            size,
            crc32,
            status,
            matched: None,
            similarity: None,
            closest_name: None,
            duplicate_of: None,
            error_message: None,
        }
    }
}

/// Assigns a status to each candidate of one scan pass.
///
/// Rules, first match wins:
/// 1. unreadable file -> `Broken`
/// 2. catalog entry already claimed earlier in this pass -> `Duplicate`
/// 3. catalog match and expected name -> `Correct`
/// 4. catalog match, other name -> `WrongFilename`
/// 5. no catalog match -> `NotRecognized`
///
/// Candidates must be fed in enumeration order; the first file to reach an
/// entry claims it. Identical unrecognised files are not flagged as duplicates.
pub struct Classifier<'a> {
    catalog: &'a CatalogSnapshot,
    similarity_threshold: f64,
    claimed: HashMap<i64, PathBuf>,
}

impl<'a> Classifier<'a> {
    pub fn new(catalog: &'a CatalogSnapshot, similarity_threshold: f64) -> Self {
        Self {
            catalog,
            similarity_threshold,
            claimed: HashMap::new(),
        }
    }

    pub fn classify(
        &mut self,
        candidate: &ScanCandidate,
        fingerprint: Result<Fingerprint, Unreadable>,
    ) -> ScanOutcome {
        let fingerprint = match fingerprint {
            Ok(fp) => fp,
            Err(err) => {
                warn!("Marking {} as broken: {}", candidate.path.display(), err.source);
                let mut outcome =
                    ScanOutcome::base(&candidate.path, candidate.size, None, RomStatus::Broken);
                outcome.error_message = Some(err.source.to_string());
                return outcome;
            }
        };

        let catalog = self.catalog;
        let outcome = match catalog.find(fingerprint.crc32, fingerprint.size) {
            Some(entry) => self.classify_match(candidate, fingerprint, entry),
            None => self.classify_unrecognized(candidate, fingerprint),
        };
        trace!("{} -> {}", candidate.path.display(), outcome.status);
        outcome
    }

    /// Catalog ids claimed so far by `Correct`/`WrongFilename` outcomes.
    pub fn claimed_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.claimed.keys().copied()
    }

    fn classify_match(
        &mut self,
        candidate: &ScanCandidate,
        fingerprint: Fingerprint,
        entry: &CatalogEntry,
    ) -> ScanOutcome {
        let mut outcome = ScanOutcome::base(
            &candidate.path,
            fingerprint.size,
            Some(fingerprint.crc32),
            RomStatus::Duplicate,
        );
        outcome.matched = Some(entry.clone());
        outcome.similarity = Some(1.0);

        if let Some(first) = self.claimed.get(&entry.id) {
            outcome.duplicate_of = Some(first.clone());
            return outcome;
        }

        self.claimed.insert(entry.id, candidate.path.clone());
        outcome.status = if entry.name_matches(&candidate.path) {
            RomStatus::Correct
        } else {
            RomStatus::WrongFilename
        };
        outcome
    }

    fn classify_unrecognized(
        &self,
        candidate: &ScanCandidate,
        fingerprint: Fingerprint,
    ) -> ScanOutcome {
        let mut outcome = ScanOutcome::base(
            &candidate.path,
            fingerprint.size,
            Some(fingerprint.crc32),
            RomStatus::NotRecognized,
        );

        let closest = candidate
            .path
            .file_stem()
            .and_then(|stem| self.catalog.closest(&stem.to_string_lossy(), self.similarity_threshold));
        if let Some((score, entry)) = closest {
            outcome.similarity = Some(score);
            outcome.closest_name = Some(entry.name.clone());
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogFlags;
    use std::io;

    fn foo_catalog() -> CatalogSnapshot {
        CatalogSnapshot::from_entries(vec![CatalogEntry {
            id: 1,
            system_id: 1,
            name: "Foo".to_string(),
            rom_name: "Foo.bin".to_string(),
            major_name: "Foo".to_string(),
            region: None,
            languages: None,
            size: 100,
            crc32: Crc32::new(0xAA),
            flags: CatalogFlags::default(),
            verified_dump: true,
        }])
    }

    fn candidate(name: &str) -> ScanCandidate {
        ScanCandidate {
            path: PathBuf::from("/roms").join(name),
            size: 100,
        }
    }

    fn fp(crc: u32, size: u64) -> Result<Fingerprint, Unreadable> {
        Ok(Fingerprint {
            size,
            crc32: Crc32::new(crc),
        })
    }

    #[test]
    fn test_exact_match_is_correct() {
        let catalog = foo_catalog();
        let mut classifier = Classifier::new(&catalog, 0.7);
        let outcome = classifier.classify(&candidate("Foo.bin"), fp(0xAA, 100));
        assert_eq!(outcome.status, RomStatus::Correct);
        assert_eq!(outcome.matched_catalog_id(), Some(1));
        assert_eq!(outcome.similarity, Some(1.0));
    }

    #[test]
    fn test_renamed_file_is_wrong_filename() {
        let catalog = foo_catalog();
        let mut classifier = Classifier::new(&catalog, 0.7);
        let outcome = classifier.classify(&candidate("Wrong.bin"), fp(0xAA, 100));
        assert_eq!(outcome.status, RomStatus::WrongFilename);
        assert_eq!(outcome.matched.unwrap().name, "Foo");
    }

    #[test]
    fn test_second_copy_is_duplicate_regardless_of_name() {
        let catalog = foo_catalog();
        let mut classifier = Classifier::new(&catalog, 0.7);

        let first = classifier.classify(&candidate("Bar.bin"), fp(0xAA, 100));
        let second = classifier.classify(&candidate("Foo.bin"), fp(0xAA, 100));

        assert_eq!(first.status, RomStatus::WrongFilename);
        assert_eq!(second.status, RomStatus::Duplicate);
        assert_eq!(second.matched_catalog_id(), Some(1));
        assert_eq!(second.duplicate_of, Some(PathBuf::from("/roms/Bar.bin")));
        assert_eq!(classifier.claimed_ids().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_size_mismatch_is_not_recognized() {
        let catalog = foo_catalog();
        let mut classifier = Classifier::new(&catalog, 0.7);
        let outcome = classifier.classify(&candidate("Foo.bin"), fp(0xAA, 99));
        assert_eq!(outcome.status, RomStatus::NotRecognized);
        assert!(outcome.matched.is_none());
        // Same name as the catalog entry, so it is annotated as a near miss.
        assert_eq!(outcome.closest_name.as_deref(), Some("Foo"));
    }

    #[test]
    fn test_identical_unrecognized_files_are_not_duplicates() {
        let catalog = foo_catalog();
        let mut classifier = Classifier::new(&catalog, 0.7);
        let a = classifier.classify(&candidate("x.bin"), fp(0xBB, 10));
        let b = classifier.classify(&candidate("y.bin"), fp(0xBB, 10));
        assert_eq!(a.status, RomStatus::NotRecognized);
        assert_eq!(b.status, RomStatus::NotRecognized);
        assert!(a.closest_name.is_none());
        assert!(a.similarity.is_none());
    }

    #[test]
    fn test_unreadable_is_broken_with_error_text() {
        let catalog = foo_catalog();
        let mut classifier = Classifier::new(&catalog, 0.7);
        let cand = candidate("Foo.bin");
        let err = Unreadable {
            path: cand.path.clone(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "access denied"),
        };
        let outcome = classifier.classify(&cand, Err(err));
        assert_eq!(outcome.status, RomStatus::Broken);
        assert_eq!(outcome.crc32, None);
        assert_eq!(outcome.error_message.as_deref(), Some("access denied"));
        assert!(outcome.matched.is_none());
        // A broken file never claims the entry.
        let next = classifier.classify(&candidate("Foo.bin"), fp(0xAA, 100));
        assert_eq!(next.status, RomStatus::Correct);
    }
}
