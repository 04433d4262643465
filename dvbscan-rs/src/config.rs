//! Optional TOML configuration file.
//!
//! Every value is optional; the command line overrides the file and the
//! file overrides the built-in defaults.
//!
//! ```toml
//! [scan]
//! other_nits = true
//! initial_tuning = "/usr/share/dvb/dvb-t/de-Berlin"
//!
//! [output]
//! format = "zap"
//!
//! [bouquet]
//! options = "lang=eng,deu;ignore=Test*"
//!
//! [logging]
//! level = "debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::output::OutputFormat;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "dvbscan.toml";

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub bouquet: BouquetSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct ScanSection {
    pub initial_tuning: Option<PathBuf>,
    pub ts_file: Option<PathBuf>,
    pub current_only: Option<bool>,
    pub other_nits: Option<bool>,
    pub long_timeout: Option<bool>,
    pub skip_count: Option<usize>,
    pub uk_ordering: Option<bool>,
    pub no_psip: Option<bool>,
    pub atsc_type: Option<u8>,
    /// "S1" or "S2".
    pub disable: Option<String>,
    pub noauto: Option<bool>,
    /// 0 off, 1 on, 2 auto.
    pub inversion: Option<u8>,
    pub iterations: Option<u32>,
    pub rotor_conf: Option<PathBuf>,
    pub rotor_position: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct OutputSection {
    pub format: Option<OutputFormat>,
    pub serv_select: Option<u32>,
    pub ca_select: Option<i32>,
    pub unique_anon: Option<bool>,
    pub provider: Option<bool>,
    pub channel_numbers: Option<bool>,
    pub orbital_override: Option<String>,
    pub sat_number: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct BouquetSection {
    pub options: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LoggingSection {
    pub level: Option<String>,
}

impl ConfigFile {
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ConfigFile::parse(path, &contents)
}

/// Explicit path > auto-detect > none.
pub fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit.map(Path::to_path_buf).or_else(|| {
        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Some(default_path)
        } else {
            None
        }
    })
}
