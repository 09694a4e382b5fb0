mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::Path;
use std::process;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, Target};
use dotenv::dotenv;
use progress::CliReporter;
use rom_curator_core::storage::{ClassificationRecord, Database, RomKey, ScanSummary};
use rom_curator_core::{find_missing, AppConfig, RomStatus, ScanEngine, ScanOutcome};
use tracing::{error, info};

fn main() -> Result<()> {
    dotenv().ok();

    let loaded = rom_curator_core::config::load_configuration();
    // A broken config still gets logged, using default log settings.
    let _guard = logging::init_logger(&loaded.as_ref().ok().cloned().unwrap_or_default());

    let config = match loaded {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Scan {
            system,
            folder,
            store,
            missing,
            json,
        }) => run_scan(&config, &system, &folder, store, missing, json),
        Some(Commands::Summary { system }) => run_summary(&config, &system),
        Some(Commands::List {
            system,
            status,
            json,
        }) => run_list(&config, &system, status, json),
        Some(Commands::Ignore { system, target }) => run_ignore(&config, &system, target, true),
        Some(Commands::Unignore { system, target }) => {
            run_ignore(&config, &system, target, false)
        }
        Some(Commands::Clear { system }) => run_clear(&config, &system),
        Some(Commands::Systems) => run_systems(&config),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:?}", config);
            Ok(())
        }
        None => {
            Cli::command().print_long_help()?;
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }

    Ok(())
}

fn open_database(config: &AppConfig) -> Result<Database> {
    Database::open(&config.database_path)
        .with_context(|| format!("opening database {}", config.database_path))
}

fn lookup_system(db: &Database, name: &str) -> Result<i64> {
    db.get_system_by_name(name)?
        .map(|system| system.id)
        .ok_or_else(|| anyhow!("Unknown system '{}'; import its DAT first", name))
}

fn run_scan(
    config: &AppConfig,
    system: &str,
    folder: &Path,
    store: bool,
    record_missing: bool,
    json: bool,
) -> Result<()> {
    let db = open_database(config)?;
    let system_id = lookup_system(&db, system)?;
    let engine = ScanEngine::new(config.clone())?;
    let reporter = CliReporter::new();

    let outcomes = match engine.scan(&db, folder, system_id, &reporter) {
        Ok(outcomes) => outcomes,
        Err(err) => {
            reporter.clear();
            return Err(err.into());
        }
    };
    let missing = find_missing(&db, system_id, &outcomes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            print_outcome(outcome);
        }
        let mut summary = ScanSummary::from_outcomes(&outcomes);
        summary.add(RomStatus::Missing, missing.len());
        print_summary(system, &summary);
    }

    if store {
        let stored = db.store_scan_results(system_id, &outcomes)?;
        info!("Stored {} records for {}", stored, system);
        if record_missing {
            let recorded = db.record_missing(system_id, &missing)?;
            info!("Recorded {} missing entries for {}", recorded, system);
        }
    }

    Ok(())
}

fn run_summary(config: &AppConfig, system: &str) -> Result<()> {
    let db = open_database(config)?;
    let system_id = lookup_system(&db, system)?;
    print_summary(system, &db.get_scan_summary(system_id)?);
    Ok(())
}

fn run_list(config: &AppConfig, system: &str, status: Option<RomStatus>, json: bool) -> Result<()> {
    let db = open_database(config)?;
    let system_id = lookup_system(&db, system)?;
    let records = match status {
        Some(status) => db.get_scanned_roms_by_status(system_id, status)?,
        None => db.get_all_scanned_roms(system_id)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for record in &records {
            print_record(record);
        }
        println!("{} records", records.len());
    }
    Ok(())
}

fn run_ignore(config: &AppConfig, system: &str, target: Target, ignore: bool) -> Result<()> {
    let db = open_database(config)?;
    let system_id = lookup_system(&db, system)?;
    let key = RomKey::from_parts(target.path.as_deref(), target.crc)?;

    if ignore {
        let changed = db.mark_ignored(system_id, &key)?;
        println!("{} record(s) ignored", changed.to_string().yellow());
    } else {
        let changed = db.unignore(system_id, &key)?;
        println!("{} record(s) restored", changed.to_string().green());
    }
    Ok(())
}

fn run_clear(config: &AppConfig, system: &str) -> Result<()> {
    let db = open_database(config)?;
    let system_id = lookup_system(&db, system)?;

    let prompt = format!(
        "Are you SURE you want to delete every stored record for {}?",
        system
    );
    if !prompt_confirm(&prompt, Some(false))? {
        return Ok(());
    }
    let deleted = db.clear_system_scans(system_id)?;
    println!("{} records deleted", deleted);
    Ok(())
}

fn run_systems(config: &AppConfig) -> Result<()> {
    let db = open_database(config)?;
    for system in db.get_all_systems()? {
        println!(
            "{:>4}  {}  ({} games)",
            system.id,
            system.name.bold(),
            system.game_count
        );
    }
    Ok(())
}

fn colorize(status: RomStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        RomStatus::Correct => label.green(),
        RomStatus::WrongFilename => label.yellow(),
        RomStatus::Duplicate => label.cyan(),
        RomStatus::Broken => label.red(),
        RomStatus::NotRecognized => label.magenta(),
        RomStatus::Missing => label.red().dimmed(),
        RomStatus::Ignored => label.dimmed(),
        RomStatus::MovedExtra | RomStatus::MovedBroken => label.blue(),
    }
}

fn print_outcome(outcome: &ScanOutcome) {
    let crc = outcome
        .crc32
        .map(|crc| crc.to_string())
        .unwrap_or_else(|| "--------".to_string());
    let detail = match (&outcome.matched, &outcome.closest_name, &outcome.error_message) {
        (_, _, Some(err)) => format!("  ({})", err),
        (Some(entry), _, _) => format!("  -> {}", entry.name),
        (None, Some(closest), _) => format!("  ~ {}", closest),
        _ => String::new(),
    };
    println!(
        "{:<16} {}  {}{}",
        colorize(outcome.status),
        crc,
        outcome.path.display(),
        detail
    );
}

fn print_record(record: &ClassificationRecord) {
    let crc = record
        .crc32
        .map(|crc| crc.to_string())
        .unwrap_or_else(|| "--------".to_string());
    let path = record.file_path.as_deref().unwrap_or("<no file>");
    let matched = record
        .matched
        .as_ref()
        .map(|game| format!("  -> {}", game.name))
        .unwrap_or_default();
    println!("{:<16} {}  {}{}", colorize(record.status), crc, path, matched);
}

fn print_summary(system: &str, summary: &ScanSummary) {
    println!();
    info!("{}: {} files", system.bold(), summary.total);
    for status in RomStatus::ALL {
        let count = summary.count(status);
        if count > 0 {
            info!("  {:<16} {}", colorize(status), count);
        }
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
