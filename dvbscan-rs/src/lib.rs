//! dvbscan library - DVB/ATSC network scanning
//!
//! Decodes the PSI/SI tables of tuned transponders, follows the NIT to
//! every transponder of a network and writes the services it finds as a
//! channels.conf list.

pub mod bouquet;
pub mod config;
pub mod demux;
pub mod error;
pub mod output;
pub mod registry;
pub mod rotor;
pub mod scan;
pub mod si;
pub mod tuner;
pub mod tuning_file;

// Re-export commonly used types
pub use error::{ConfigError, Result, ScanError, TuningFileError};
pub use scan::{ScanContext, ScanOptions};
pub use tuner::{Tunable, TuneStatus};
