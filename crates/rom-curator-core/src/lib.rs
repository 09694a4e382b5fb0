//! ROM scanning and matching engine.
//!
//! [`ScanEngine::scan`] walks a folder and classifies each file against a
//! system's catalog; [`storage::Database`] persists the result and owns the
//! ignore state.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod hasher;
pub mod progress;
pub mod scanner;
pub mod similarity;
pub mod status;
pub mod storage;

pub use catalog::{CatalogEntry, CatalogFlags, CatalogLookup};
pub use config::AppConfig;
pub use engine::{find_duplicate_groups, find_missing, ScanEngine};
pub use error::Error;
pub use hasher::{Crc32, Fingerprint};
pub use progress::{CallbackReporter, ProgressReporter, SilentReporter};
pub use scanner::ScanOutcome;
pub use status::RomStatus;
pub use storage::{Database, RomKey, ScanSummary};
