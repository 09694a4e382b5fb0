use clap::{Args, Parser, Subcommand};
use rom_curator_core::{Crc32, RomStatus};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "rom-curator")]
#[command(about = "Classify a ROM folder against its DAT catalog", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a folder and classify every file against the system's catalog
    Scan {
        /// System name as registered in the catalog
        system: String,
        /// Folder holding the ROM files
        folder: PathBuf,
        /// Persist the results, replacing the previous scan (ignored entries are kept)
        #[arg(long)]
        store: bool,
        /// Also record catalog entries with no file as missing (requires --store)
        #[arg(long, requires = "store")]
        missing: bool,
        /// Print outcomes as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show stored counts per status for a system
    Summary { system: String },
    /// List stored records for a system
    List {
        system: String,
        /// Only records with this status (e.g. wrong_filename)
        #[arg(long)]
        status: Option<RomStatus>,
        #[arg(long)]
        json: bool,
    },
    /// Exclude a file or CRC32 from views and counts
    Ignore {
        system: String,
        #[command(flatten)]
        target: Target,
    },
    /// Restore an ignored file or CRC32 to its previous status
    Unignore {
        system: String,
        #[command(flatten)]
        target: Target,
    },
    /// Delete every stored record for a system
    Clear { system: String },
    /// List registered systems
    Systems,
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct Target {
    /// Absolute path of a scanned file
    #[arg(long)]
    pub path: Option<String>,
    /// CRC32 in hex, e.g. 1a2b3c4d
    #[arg(long)]
    pub crc: Option<Crc32>,
}
