use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::Error;
use crate::hasher::{self, Fingerprint, Unreadable};

/// Which files under a scan root become candidates.
#[derive(Debug, Clone, Default)]
pub struct ScanPolicy {
    /// Descend into subfolders. When false only direct children of the root are scanned.
    pub recursive: bool,
    /// Subfolder names (compared case-insensitively) never descended into.
    pub excluded_dirs: Vec<String>,
    /// Paths matching any pattern are skipped, directories included.
    pub ignore_patterns: Vec<Pattern>,
    /// Lowercase extension allow-list without the dot. Empty accepts every file.
    pub extensions: Vec<String>,
}

impl ScanPolicy {
    pub fn new(
        recursive: bool,
        excluded_dirs: &[String],
        ignore_globs: &[String],
        extensions: &[String],
    ) -> Self {
        let ignore_patterns = ignore_globs
            .iter()
            .filter_map(|glob| match Pattern::new(glob) {
                Ok(p) => Some(p),
                Err(e) => {
                    error!("Invalid glob pattern '{}': {}", glob, e);
                    None
                }
            })
            .collect();

        Self {
            recursive,
            excluded_dirs: excluded_dirs.iter().map(|d| d.to_lowercase()).collect(),
            ignore_patterns,
            extensions: extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn is_excluded_dir(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        self.excluded_dirs.iter().any(|d| *d == name)
    }

    fn accepts_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

/// A file found during enumeration. Its checksum is computed on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanCandidate {
    pub path: PathBuf,
    /// Size reported by the filesystem at enumeration time.
    pub size: u64,
}

impl ScanCandidate {
    pub fn fingerprint(&self, chunk_size: usize) -> Result<Fingerprint, Unreadable> {
        hasher::fingerprint(&self.path, chunk_size)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// List candidate files under `root` in a stable order (file name order per directory).
///
/// Fails with [`Error::ScanFailed`] if the root is missing or cannot be read.
/// Unreadable subdirectories are logged and skipped. Symlinks are not followed.
pub fn enumerate_candidates(root: &Path, policy: &ScanPolicy) -> Result<Vec<ScanCandidate>, Error> {
    let scan_failed = |source: std::io::Error| Error::ScanFailed {
        path: root.to_path_buf(),
        source,
    };

    let canonical_root = fs::canonicalize(root).map_err(scan_failed)?;
    if !fs::metadata(&canonical_root).map_err(scan_failed)?.is_dir() {
        return Err(scan_failed(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "not a directory",
        )));
    }

    let max_depth = if policy.recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(&canonical_root)
        .min_depth(1)
        .max_depth(max_depth)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let skip_dir = entry.depth() > 0
                && entry.file_type().is_dir()
                && (policy.is_excluded_dir(entry) || policy.is_ignored(entry.path()));
            !skip_dir
        });

    let mut candidates = Vec::new();
    for entry_result in walker {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(err) => {
                // The root itself failing to list means nothing can be scanned.
                if err.depth() == 0 {
                    let source = err
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    return Err(scan_failed(source));
                }
                warn!("Skipping unreadable entry under {}: {}", canonical_root.display(), err);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if policy.is_ignored(path) || !policy.accepts_extension(path) {
            continue;
        }

        // Keep the file even if metadata fails; fingerprinting will report it broken.
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        candidates.push(ScanCandidate {
            path: entry.into_path(),
            size,
        });
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names(candidates: &[ScanCandidate]) -> Vec<String> {
        candidates.iter().map(|c| c.file_name()).collect()
    }

    fn make_tree(root: &Path) {
        fs::write(root.join("b.nes"), b"bbb").unwrap();
        fs::write(root.join("a.nes"), b"a").unwrap();
        fs::write(root.join("notes.txt"), b"text").unwrap();
        fs::create_dir_all(root.join("broken")).unwrap();
        fs::write(root.join("broken").join("bad.nes"), b"bad").unwrap();
        fs::create_dir_all(root.join("Sub")).unwrap();
        fs::write(root.join("Sub").join("c.nes"), b"cc").unwrap();
    }

    #[test]
    fn test_non_recursive_lists_direct_files_sorted() {
        let tmp = tempdir().unwrap();
        make_tree(tmp.path());

        let policy = ScanPolicy::new(false, &[], &[], &[]);
        let candidates = enumerate_candidates(tmp.path(), &policy).unwrap();
        assert_eq!(names(&candidates), vec!["a.nes", "b.nes", "notes.txt"]);
        assert_eq!(candidates[1].size, 3);
        assert!(candidates.iter().all(|c| c.path.is_absolute()));
    }

    #[test]
    fn test_recursive_skips_excluded_dirs() {
        let tmp = tempdir().unwrap();
        make_tree(tmp.path());

        let policy = ScanPolicy::new(true, &["BROKEN".to_string()], &[], &[]);
        let candidates = enumerate_candidates(tmp.path(), &policy).unwrap();
        // Depth-first, and "Sub" sorts before lowercase names.
        assert_eq!(
            names(&candidates),
            vec!["c.nes", "a.nes", "b.nes", "notes.txt"]
        );
    }

    #[test]
    fn test_extension_allow_list_and_ignore_globs() {
        let tmp = tempdir().unwrap();
        make_tree(tmp.path());

        let policy = ScanPolicy::new(
            true,
            &[],
            &["*/Sub".to_string()],
            &[".NES".to_string()],
        );
        let candidates = enumerate_candidates(tmp.path(), &policy).unwrap();
        assert_eq!(names(&candidates), vec!["a.nes", "b.nes", "bad.nes"]);
    }

    #[test]
    fn test_missing_root_fails_fast() {
        let tmp = tempdir().unwrap();
        let err = enumerate_candidates(&tmp.path().join("nope"), &ScanPolicy::default())
            .unwrap_err();
        assert!(matches!(err, Error::ScanFailed { .. }));
    }

    #[test]
    fn test_file_root_fails_fast() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("a.nes");
        fs::write(&file, b"a").unwrap();
        let err = enumerate_candidates(&file, &ScanPolicy::default()).unwrap_err();
        assert!(matches!(err, Error::ScanFailed { .. }));
    }

    #[test]
    fn test_empty_root_yields_nothing() {
        let tmp = tempdir().unwrap();
        let candidates = enumerate_candidates(tmp.path(), &ScanPolicy::default()).unwrap();
        assert!(candidates.is_empty());
    }
}
