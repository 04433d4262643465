//! Section filters and the sources that feed them.
//!
//! A scan registers one [`FilterSpec`] per table it wants to see. The
//! [`FilterScheduler`] starts them on a [`SectionSource`], validates every
//! section it reads back and tracks per-filter completion through
//! [`SectionAssembly`].

use std::io;
use std::time::Duration;

use crate::si::{pid, table_id};

pub mod assembly;
pub mod scheduler;
pub mod ts_file;

pub use assembly::{Progress, SectionAssembly};
pub use scheduler::{FilterScheduler, ReadySection, MAX_RUNNING};
pub use ts_file::TsFileSource;

/// Handle of a filter opened on a [`SectionSource`].
pub type FilterId = usize;

/// Timeout of PAT, PMT, SDT and VCT filters.
pub const SHORT_TIMEOUT: Duration = Duration::from_secs(5);
/// Timeout of NIT and BAT filters. Those tables repeat at most every 10 s.
pub const LONG_TIMEOUT: Duration = Duration::from_secs(15);
/// Multiplier applied to every timeout with `--long-timeout`.
pub const LONG_TIMEOUT_FACTOR: u32 = 5;

/// What a filter collects. Every filter is torn down once it is complete
/// or timed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSpec {
    pub pid: u16,
    pub table_id: u8,
    /// Only sections with this table_id_extension pass the filter.
    pub table_id_ext: Option<u16>,
    /// Several sub-tables keyed by table_id_extension share the PID.
    pub segmented: bool,
    pub timeout: Duration,
}

impl FilterSpec {
    pub fn new(pid: u16, table_id: u8, table_id_ext: Option<u16>, timeout: Duration) -> Self {
        FilterSpec {
            pid,
            table_id,
            table_id_ext,
            segmented: false,
            timeout,
        }
    }

    pub fn segmented(mut self) -> Self {
        self.segmented = true;
        self
    }

    fn scaled(timeout: Duration, long_timeout: bool) -> Duration {
        if long_timeout {
            timeout * LONG_TIMEOUT_FACTOR
        } else {
            timeout
        }
    }

    pub fn pat(long_timeout: bool) -> Self {
        Self::new(
            pid::PAT,
            table_id::PAT,
            None,
            Self::scaled(SHORT_TIMEOUT, long_timeout),
        )
    }

    /// PMT of one program, matched on the program number.
    pub fn pmt(pmt_pid: u16, service_id: u16, long_timeout: bool) -> Self {
        Self::new(
            pmt_pid,
            table_id::PMT,
            Some(service_id),
            Self::scaled(SHORT_TIMEOUT, long_timeout),
        )
    }

    pub fn sdt_actual(long_timeout: bool) -> Self {
        Self::new(
            pid::SDT_BAT,
            table_id::SDT_ACTUAL,
            None,
            Self::scaled(SHORT_TIMEOUT, long_timeout),
        )
    }

    pub fn nit_actual(long_timeout: bool) -> Self {
        Self::new(
            pid::NIT,
            table_id::NIT_ACTUAL,
            None,
            Self::scaled(LONG_TIMEOUT, long_timeout),
        )
    }

    /// NIT of other networks. Every network ID is its own sub-table.
    pub fn nit_other(long_timeout: bool) -> Self {
        Self::new(
            pid::NIT,
            table_id::NIT_OTHER,
            None,
            Self::scaled(LONG_TIMEOUT, long_timeout),
        )
        .segmented()
    }

    /// BAT of every bouquet on the SDT/BAT PID.
    pub fn bat(long_timeout: bool) -> Self {
        Self::new(
            pid::SDT_BAT,
            table_id::BAT,
            None,
            Self::scaled(LONG_TIMEOUT, long_timeout),
        )
        .segmented()
    }

    /// Terrestrial (0xC8) or cable (0xC9) virtual channel table.
    pub fn vct(table_id: u8, long_timeout: bool) -> Self {
        Self::new(
            pid::ATSC_PSIP,
            table_id,
            None,
            Self::scaled(SHORT_TIMEOUT, long_timeout),
        )
    }

    /// Whether a section header passes this filter.
    pub fn matches(&self, pid: u16, table_id: u8, table_id_ext: u16) -> bool {
        self.pid == pid
            && self.table_id == table_id
            && self.table_id_ext.map_or(true, |ext| ext == table_id_ext)
    }
}

/// A demultiplexer delivering whole sections per filter.
///
/// Every read must return exactly one section starting at table_id; the
/// scheduler checks length and CRC itself.
pub trait SectionSource {
    fn open(&mut self, spec: &FilterSpec) -> io::Result<FilterId>;

    fn close(&mut self, id: FilterId);

    /// Wait up to `timeout` for sections on any open filter.
    fn poll(&mut self, timeout: Duration) -> io::Result<Vec<(FilterId, Vec<u8>)>>;

    /// The source can never deliver anything more to this filter.
    fn is_drained(&self, _id: FilterId) -> bool {
        false
    }
}
