use std::path::Path;

/// Trait for reporting scan progress.
///
/// Called from the scanning thread (or from hashing workers when
/// `hash_threads > 1`), so implementations must be cheap and must not block.
/// All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _total_files: usize) {}
    /// `current` counts finished files, starting at 1. An empty scan reports `(0, 0)` once.
    fn on_file_scanned(&self, _current: usize, _total: usize, _path: &Path) {}
    fn on_scan_complete(&self, _total_files: usize, _duration_secs: f64) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Adapts a plain `(current, total)` callback.
pub struct CallbackReporter<F>(pub F);

impl<F> ProgressReporter for CallbackReporter<F>
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_file_scanned(&self, current: usize, total: usize, _path: &Path) {
        (self.0)(current, total)
    }
}
