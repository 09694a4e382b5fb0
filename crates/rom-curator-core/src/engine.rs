use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::catalog::{CatalogEntry, CatalogLookup, CatalogSnapshot};
use crate::config::AppConfig;
use crate::error::Error;
use crate::hasher::{Crc32, Fingerprint, Unreadable};
use crate::progress::ProgressReporter;
use crate::scanner::{self, Classifier, ScanCandidate, ScanOutcome, ScanPolicy};
use crate::storage::models::ScanSummary;

/// Walks a ROM folder and classifies every file against a system's catalog.
///
/// A scan only reads. Handing the outcomes to
/// [`Database::store_scan_results`](crate::storage::Database::store_scan_results)
/// is a separate step, so an abandoned scan leaves the store untouched.
pub struct ScanEngine {
    config: AppConfig,
    policy: ScanPolicy,
    cancel_token: Arc<AtomicBool>,
}

impl ScanEngine {
    pub fn new(config: AppConfig) -> Result<Self, Error> {
        config.validate()?;
        let policy = config.scan_policy();
        Ok(Self {
            config,
            policy,
            cancel_token: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Setting the returned flag makes a running `scan` stop with [`Error::Cancelled`].
    /// The flag is cleared when the next scan starts.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_token)
    }

    /// Classify every candidate under `folder`, in enumeration order.
    ///
    /// Each file yields exactly one outcome; unreadable files come back as
    /// `Broken`. Fails with [`Error::ScanFailed`] only when `folder` itself
    /// cannot be listed.
    pub fn scan(
        &self,
        catalog: &dyn CatalogLookup,
        folder: &Path,
        system_id: i64,
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<ScanOutcome>, Error> {
        self.cancel_token.store(false, Ordering::SeqCst);
        info!("Scanning {} for system {}", folder.display(), system_id);
        let scan_start = Instant::now();

        let candidates = scanner::enumerate_candidates(folder, &self.policy)?;
        let total = candidates.len();
        reporter.on_scan_start(total);
        debug!("Found {} candidate files in {}", total, folder.display());

        if candidates.is_empty() {
            reporter.on_file_scanned(0, 0, folder);
            reporter.on_scan_complete(0, scan_start.elapsed().as_secs_f64());
            return Ok(Vec::new());
        }

        let snapshot = CatalogSnapshot::load(catalog, system_id)?;
        debug!("Loaded {} catalog entries for system {}", snapshot.len(), system_id);

        let hash_start = Instant::now();
        let fingerprints = self.fingerprint_all(&candidates, reporter)?;
        debug!(
            "Hashed {} files in {:.2}s",
            total,
            hash_start.elapsed().as_secs_f64()
        );

        let mut classifier = Classifier::new(&snapshot, self.config.similarity_threshold);
        let outcomes: Vec<ScanOutcome> = candidates
            .iter()
            .zip(fingerprints)
            .map(|(candidate, fingerprint)| classifier.classify(candidate, fingerprint))
            .collect();

        let duration = scan_start.elapsed().as_secs_f64();
        let summary = ScanSummary::from_outcomes(&outcomes);
        info!(
            "Scan complete in {:.2}s: {} correct, {} wrong filename, {} duplicate, {} not recognized, {} broken",
            duration,
            summary.correct,
            summary.wrong_filename,
            summary.duplicate,
            summary.not_recognized,
            summary.broken,
        );
        reporter.on_scan_complete(total, duration);

        Ok(outcomes)
    }

    /// Fingerprint candidates, returning results in candidate order.
    ///
    /// With `hash_threads > 1` files are hashed on a dedicated rayon pool;
    /// the ordered collect keeps duplicate designation tied to enumeration
    /// order rather than to whichever hash finishes first.
    fn fingerprint_all(
        &self,
        candidates: &[ScanCandidate],
        reporter: &dyn ProgressReporter,
    ) -> Result<Vec<Result<Fingerprint, Unreadable>>, Error> {
        let total = candidates.len();
        let finished = AtomicUsize::new(0);
        let chunk_size = self.config.chunk_size;
        let cancel_token = &self.cancel_token;

        let hash_one = |candidate: &ScanCandidate| {
            if cancel_token.load(Ordering::Relaxed) {
                return Err(Error::Cancelled);
            }
            let result = candidate.fingerprint(chunk_size);
            let current = finished.fetch_add(1, Ordering::Relaxed) + 1;
            reporter.on_file_scanned(current, total, &candidate.path);
            Ok(result)
        };

        if self.config.hash_threads <= 1 {
            return candidates.iter().map(hash_one).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.hash_threads)
            .build()
            .map_err(|e| Error::Other(format!("Failed to build hashing pool: {}", e)))?;
        pool.install(|| candidates.par_iter().map(hash_one).collect())
    }
}

/// Catalog entries with no `Correct`/`WrongFilename` outcome in `outcomes`.
///
/// Claims are compared by CRC32, so every catalog entry sharing a claimed
/// checksum counts as present.
pub fn find_missing(
    catalog: &dyn CatalogLookup,
    system_id: i64,
    outcomes: &[ScanOutcome],
) -> Result<Vec<CatalogEntry>, Error> {
    let found: HashSet<Crc32> = outcomes
        .iter()
        .filter(|o| o.status.claims_catalog_entry())
        .filter_map(|o| o.matched.as_ref().map(|entry| entry.crc32))
        .collect();

    let missing: Vec<CatalogEntry> = catalog
        .games_by_system(system_id)?
        .into_iter()
        .filter(|game| !found.contains(&game.crc32))
        .collect();
    debug!("{} catalog entries missing for system {}", missing.len(), system_id);
    Ok(missing)
}

/// Group readable outcomes sharing a CRC32, keeping groups of two or more.
///
/// Informational only: statuses are not changed, and unrecognised copies are
/// included.
pub fn find_duplicate_groups(outcomes: &[ScanOutcome]) -> Vec<Vec<&ScanOutcome>> {
    let mut groups: BTreeMap<Crc32, Vec<&ScanOutcome>> = BTreeMap::new();
    for outcome in outcomes {
        if let Some(crc32) = outcome.crc32 {
            groups.entry(crc32).or_default().push(outcome);
        }
    }
    groups.into_values().filter(|group| group.len() > 1).collect()
}
