pub mod classify;
pub mod walk;

pub use classify::{Classifier, ScanOutcome};
pub use walk::{enumerate_candidates, ScanCandidate, ScanPolicy};
