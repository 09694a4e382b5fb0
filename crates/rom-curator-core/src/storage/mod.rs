pub mod catalog;
pub mod ignore;
pub mod models;
pub mod queries;
pub mod sqlite;

pub use models::{ClassificationRecord, MatchedGame, MissingInsert, RomKey, ScanSummary, SystemRecord};
pub use sqlite::Database;
