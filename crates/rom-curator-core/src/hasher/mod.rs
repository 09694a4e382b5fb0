pub mod crc32;

pub use crc32::{fingerprint, Crc32, Fingerprint, InvalidCrc, Unreadable, DEFAULT_CHUNK_SIZE};
