//! Data model for the dvbscan transponder/service scanner.
//!
//! This crate holds the records shared by the section decoders, the
//! transponder registry, the bouquet engine and the output writers.
//!
//! # Example
//!
//! ```rust
//! use dvbscan_model::{CodeRate, Transponder};
//!
//! let mut known = Transponder::new(11_778_000);
//! known.fec = CodeRate::Fec3_4;
//!
//! // A NIT entry re-announcing the same transponder with a different FEC
//! // does not clobber the value confirmed by tuning.
//! let mut from_nit = Transponder::new(11_778_500);
//! from_nit.fec = CodeRate::Fec5_6;
//! assert!(known.is_same_transponder(&from_nit));
//!
//! known.merge_from(&from_nit, false);
//! assert_eq!(known.fec, CodeRate::Fec3_4);
//! assert_eq!(known.frequency, 11_778_500);
//! ```

pub mod error;
pub mod types;

pub use error::ModelError;
pub use types::{
    is_same_frequency, AudioStream, Bandwidth, CodeRate, DeliverySystem, GuardInterval,
    Hierarchy, Inversion, Modulation, Polarisation, Rolloff, RunningStatus, Service,
    TransmissionMode, Transponder, AUDIO_CHAN_MAX, CA_SYSTEM_ID_MAX, FREQUENCY_TOLERANCE,
};
