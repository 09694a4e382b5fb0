use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;

use crate::error::Error;
use crate::hasher::DEFAULT_CHUNK_SIZE;
use crate::scanner::ScanPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub chunk_size: usize,
    pub recursive: bool,
    pub excluded_dirs: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub extensions: Vec<String>,
    pub hash_threads: usize,
    pub similarity_threshold: f64,
    /// Log file written by the CLI. `LOG_FILE_PATH` overrides it.
    pub log_file_path: String,
    /// Level for this app's own log targets; dependencies stay at `warn`.
    /// `TRACING_LEVEL` replaces the whole filter.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "rom_curator.db".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            recursive: false,
            excluded_dirs: [
                "extra", "_extra", "broken", "_broken", "missing", "_missing", "filtered",
                "_filtered", "multi", "_multi",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ignore_patterns: Vec::new(),
            extensions: Vec::new(),
            hash_threads: 1,
            similarity_threshold: 0.7,
            log_file_path: "logs/rom-curator.log".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Extensions commonly used for ROM and disc images.
    pub fn default_rom_extensions() -> Vec<String> {
        [
            "zip", "7z", "rar", "bin", "rom", "img", "nes", "smc", "sfc", "gb", "gbc", "gba",
            "md", "smd", "gen", "32x", "a26", "a52", "a78", "pce", "tg16", "ngp", "ngc", "ws",
            "wsc", "chd", "cue", "iso", "pbp", "n64", "z64", "v64", "nds", "3ds", "psp", "cso",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::InvalidArgument(format!(
                "similarity_threshold must be within 0.0..=1.0, got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }

    pub fn scan_policy(&self) -> ScanPolicy {
        ScanPolicy::new(
            self.recursive,
            &self.excluded_dirs,
            &self.ignore_patterns,
            &self.extensions,
        )
    }
}

/// Load `Config.toml` (optional) overlaid with `ROM_CURATOR_*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("ROM_CURATOR")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("excluded_dirs")
                .with_list_parse_key("ignore_patterns")
                .with_list_parse_key("extensions"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AppConfig = Config::builder()
            .add_source(ConfigFile::from_str(
                "database_path = \"/tmp/roms.db\"\nhash_threads = 4\n",
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.database_path, "/tmp/roms.db");
        assert_eq!(config.hash_threads, 4);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.log_file_path, "logs/rom-curator.log");
        assert!(config.excluded_dirs.contains(&"broken".to_string()));
        assert!(config.extensions.is_empty());
    }

    #[test]
    fn test_toml_round_trip_of_lists() {
        let config: AppConfig = toml::from_str(
            "excluded_dirs = [\"junk\"]\nextensions = [\"nes\", \"zip\"]\nrecursive = true\n",
        )
        .unwrap();
        assert_eq!(config.excluded_dirs, vec!["junk".to_string()]);
        assert_eq!(config.extensions.len(), 2);
        assert!(config.recursive);
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = AppConfig {
            chunk_size: 0,
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let config = AppConfig {
            similarity_threshold: 1.5,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
