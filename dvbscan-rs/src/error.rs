//! Error types for the scanner.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors in user supplied configuration: bouquet directives, the TOML
/// file and rotor positions. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Bouquet directive name not in the directive table.
    #[error("Invalid bouquet option: '{0}'")]
    UnknownBouquetOption(String),

    /// Argument count outside the directive's bounds.
    #[error("Invalid number of arguments for bouquet option '{0}'")]
    BouquetArity(String),

    /// Name pattern that is not a valid shell pattern.
    #[error("Invalid pattern in bouquet option: '{0}'")]
    BouquetPattern(String),

    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Rotor position not found in the rotor table.
    #[error("Invalid rotor position: '{0}'")]
    RotorPosition(String),

    /// Invalid value for a scan option.
    #[error("Invalid value for {option}: {value}")]
    InvalidValue { option: &'static str, value: String },
}

/// An initial tuning data line that could not be used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TuningFileError {
    #[error("line {line}: cannot parse '{text}'")]
    Syntax { line: usize, text: String },

    #[error("line {line}: {source}")]
    Value {
        line: usize,
        #[source]
        source: dvbscan_model::ModelError,
    },
}

/// Errors that end a scan.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Tuner or demux I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Nothing could be tuned from the initial data.
    #[error("Initial tuning failed: {0}")]
    InitialTuning(String),

    /// More filters were started than the demux can run.
    #[error("Too many running section filters (max: {0})")]
    FilterCapacity(usize),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TuningFile(#[from] TuningFileError),
}

pub type Result<T> = std::result::Result<T, ScanError>;
