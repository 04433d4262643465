//! Network scan.
//!
//! A [`ScanContext`] carries everything a scan mutates: the transponder
//! registry, the bouquet engine and the set of PMT filters already asked
//! for on the current transponder. Decoded tables are applied to it by
//! [`apply`]; [`driver`] tunes transponders and runs the section filters.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;

use crate::bouquet::BouquetEngine;
use crate::demux::scheduler::POLL_INTERVAL;
use crate::output::{write_output, OutputOptions, OutputSummary, ServiceSink};
use crate::registry::TransponderRegistry;
use crate::rotor::RotorState;
use crate::tuner::DEFAULT_LOCK_ITERATIONS;
use crate::tuning_file::InitialTuningOptions;

pub mod apply;
pub mod driver;

pub use apply::apply_section;
pub use driver::{scan_current, scan_network, scan_tp};

/// Bit of [`ScanOptions::atsc_type`] selecting the terrestrial VCT.
pub const ATSC_TERRESTRIAL: u8 = 1;
/// Bit of [`ScanOptions::atsc_type`] selecting the cable VCT.
pub const ATSC_CABLE: u8 = 2;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Scan the transponder the frontend is tuned to, nothing else.
    pub current_only: bool,
    /// Follow NIT-other entries to other transponders.
    pub other_nits: bool,
    pub long_timeout: bool,
    /// Sections dropped at the start of every filter.
    pub skip_count: usize,
    /// Apply UK logical channel numbers from the NIT.
    pub uk_ordering: bool,
    /// ATSC: read PAT/PMT only, no PSIP.
    pub no_psip: bool,
    /// ATSC_TERRESTRIAL and/or ATSC_CABLE.
    pub atsc_type: u8,
    pub tuning: InitialTuningOptions,
    pub lock_iterations: u32,
    pub output: OutputOptions,
}

impl Default for ScanOptions {
    fn default() -> Self {
        ScanOptions {
            current_only: false,
            other_nits: false,
            long_timeout: false,
            skip_count: 0,
            uk_ordering: false,
            no_psip: false,
            atsc_type: ATSC_TERRESTRIAL,
            tuning: InitialTuningOptions::default(),
            lock_iterations: DEFAULT_LOCK_ITERATIONS,
            output: OutputOptions::default(),
        }
    }
}

pub struct ScanContext {
    pub options: ScanOptions,
    pub registry: TransponderRegistry,
    /// Present when bouquet options were given; BATs are only read then.
    pub bouquets: Option<BouquetEngine>,
    pub rotor: Option<RotorState>,
    /// Services of the current transponder whose PMT filter was requested.
    pmt_requested: HashSet<u16>,
    cancel: Arc<AtomicBool>,
    progress: Option<ProgressBar>,
    poll_interval: Duration,
}

impl ScanContext {
    pub fn new(options: ScanOptions) -> Self {
        ScanContext {
            registry: TransponderRegistry::new(options.current_only),
            options,
            bouquets: None,
            rotor: None,
            pmt_requested: HashSet::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            progress: None,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_bouquets(mut self, engine: BouquetEngine) -> Self {
        self.bouquets = Some(engine);
        self
    }

    pub fn with_rotor(mut self, rotor: RotorState) -> Self {
        self.rotor = Some(rotor);
        self
    }

    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Flag that stops the scan once set, for signal handlers.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Forget the PMT requests of the previous transponder.
    pub(crate) fn reset_pmt_requests(&mut self) {
        self.pmt_requested.clear();
    }

    /// Returns false when a PMT filter was already requested for this
    /// service.
    pub(crate) fn request_pmt(&mut self, service_id: u16) -> bool {
        self.pmt_requested.insert(service_id)
    }

    pub(crate) fn progress(&self, message: String) {
        if let Some(bar) = &self.progress {
            bar.set_message(message);
        }
    }

    pub fn finish_progress(&self) {
        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }
    }

    /// Write everything scanned so far.
    pub fn write_output(&mut self, sink: &mut dyn ServiceSink) -> io::Result<OutputSummary> {
        write_output(
            self.registry.scanned_mut(),
            &self.options.output,
            self.bouquets.as_mut(),
            sink,
        )
    }
}
