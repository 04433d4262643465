//! Running/waiting filter sets on top of a [`SectionSource`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use super::assembly::{Progress, SectionAssembly};
use super::{FilterId, FilterSpec, SectionSource};
use crate::error::{Result, ScanError};
use crate::si::psi::LONG_HEADER_LEN;
use crate::si::{get_bits, PsiHeader, PsiSection};

/// Most filters the demux runs at once.
pub const MAX_RUNNING: usize = 128;

/// How long one poll round waits for sections.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A validated section seen for the first time by its filter.
#[derive(Debug, Clone)]
pub struct ReadySection {
    pub spec: FilterSpec,
    pub header: PsiHeader,
    bytes: Vec<u8>,
}

impl ReadySection {
    /// Section body between the header and the CRC.
    pub fn section(&self) -> PsiSection<'_> {
        let start = if self.header.section_syntax_indicator {
            LONG_HEADER_LEN
        } else {
            3
        };
        let end = self.bytes.len() - 4;
        PsiSection {
            header: self.header,
            data: &self.bytes[start..end],
            crc32: get_bits(&self.bytes[end..], 0, 32),
        }
    }
}

#[derive(Debug)]
struct RunningFilter {
    id: FilterId,
    spec: FilterSpec,
    assembly: SectionAssembly,
    started: Instant,
    skip_remaining: usize,
}

#[derive(Debug)]
pub struct FilterScheduler {
    running: Vec<RunningFilter>,
    waiting: VecDeque<FilterSpec>,
    skip_count: usize,
    poll_interval: Duration,
}

impl FilterScheduler {
    /// `skip_count` sections are discarded at the start of every filter.
    pub fn new(skip_count: usize) -> Self {
        FilterScheduler {
            running: Vec::new(),
            waiting: VecDeque::new(),
            skip_count,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn has_running(&self) -> bool {
        !self.running.is_empty()
    }

    /// Start a filter, or queue it when it cannot be started now.
    pub fn add<S: SectionSource + ?Sized>(&mut self, source: &mut S, spec: FilterSpec) {
        trace!("add filter pid 0x{:04X}", spec.pid);
        if let Err(err) = self.try_start(source, spec.clone()) {
            debug!("filter pid 0x{:04X} waiting: {}", spec.pid, err);
            self.waiting.push_back(spec);
        }
    }

    /// Start a filter right away.
    pub fn try_start<S: SectionSource + ?Sized>(
        &mut self,
        source: &mut S,
        spec: FilterSpec,
    ) -> Result<FilterId> {
        if self.running.len() >= MAX_RUNNING {
            return Err(ScanError::FilterCapacity(MAX_RUNNING));
        }

        let id = source.open(&spec)?;
        trace!(
            "start filter pid 0x{:04X} table_id 0x{:02X}",
            spec.pid,
            spec.table_id
        );
        self.running.push(RunningFilter {
            id,
            assembly: SectionAssembly::new(spec.table_id, spec.table_id_ext, spec.segmented),
            spec,
            started: Instant::now(),
            skip_remaining: self.skip_count,
        });
        Ok(id)
    }

    fn start_waiting<S: SectionSource + ?Sized>(&mut self, source: &mut S) {
        while let Some(spec) = self.waiting.pop_front() {
            if self.try_start(source, spec.clone()).is_err() {
                self.waiting.push_front(spec);
                break;
            }
        }
    }

    /// Wait for sections once, then retire filters that are complete or
    /// timed out and start queued ones in their place.
    pub fn poll_round<S: SectionSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<Vec<ReadySection>> {
        let mut ready = Vec::new();

        for (id, bytes) in source.poll(self.poll_interval)? {
            let Some(filter) = self.running.iter_mut().find(|f| f.id == id) else {
                continue;
            };
            if let Some(section) = filter.read(bytes) {
                ready.push(section);
            }
        }

        let now = Instant::now();
        let mut removed = false;
        let mut i = 0;
        while i < self.running.len() {
            let filter = &self.running[i];
            let done = filter.assembly.is_complete();
            let expired =
                now.duration_since(filter.started) > filter.spec.timeout || source.is_drained(filter.id);

            if done || expired {
                if done {
                    debug!("filter done pid 0x{:04X}", filter.spec.pid);
                } else {
                    warn!("filter timeout pid 0x{:04X}", filter.spec.pid);
                }
                let filter = self.running.remove(i);
                trace!("stop filter pid 0x{:04X}", filter.spec.pid);
                source.close(filter.id);
                removed = true;
            } else {
                i += 1;
            }
        }

        if removed {
            self.start_waiting(source);
        }

        Ok(ready)
    }

    /// Stop every filter and forget the queued ones.
    pub fn clear<S: SectionSource + ?Sized>(&mut self, source: &mut S) {
        for filter in self.running.drain(..) {
            source.close(filter.id);
        }
        if !self.waiting.is_empty() {
            debug!("dropping {} waiting filters", self.waiting.len());
            self.waiting.clear();
        }
    }
}

impl RunningFilter {
    fn read(&mut self, bytes: Vec<u8>) -> Option<ReadySection> {
        if self.assembly.is_complete() {
            return None;
        }

        if self.skip_remaining > 0 {
            info!(
                "skipping section, table_id {:X}, pid {:X}",
                self.spec.table_id, self.spec.pid
            );
            self.skip_remaining -= 1;
            return None;
        }

        if bytes.len() < 4 {
            return None;
        }

        let section_length = get_bits(&bytes, 12, 12) as usize;
        if bytes.len() != section_length + 3 {
            error!(
                "Ignoring section, read {}, while section length + 3 = {}",
                bytes.len(),
                section_length + 3
            );
            return None;
        }

        let header = match PsiSection::parse(&bytes) {
            Ok(section) if section.header.section_syntax_indicator && !section.verify_crc(&bytes) => {
                warn!(
                    "CRC error, pid 0x{:04X} table_id 0x{:02X}, section dropped",
                    self.spec.pid, section.header.table_id
                );
                return None;
            }
            Ok(section) => section.header,
            Err(e) => {
                warn!("{} (PID 0x{:04X}, length {})", e, self.spec.pid, bytes.len());
                return None;
            }
        };

        match self.assembly.offer(&header) {
            Progress::Fresh => {
                debug!(
                    "pid 0x{:02X} tid 0x{:02X} table_id_ext 0x{:04X}, {}/{} (version {})",
                    self.spec.pid,
                    header.table_id,
                    header.table_id_extension,
                    header.section_number,
                    header.last_section_number,
                    header.version_number
                );
                Some(ReadySection {
                    spec: self.spec.clone(),
                    header,
                    bytes,
                })
            }
            Progress::Repeat | Progress::Rejected => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::si::psi::seal_section;
    use crate::si::table_id;
    use std::collections::HashMap;
    use std::io;

    /// Source that hands out queued sections and reports drain on demand.
    #[derive(Default)]
    struct MockSource {
        next_id: FilterId,
        open: HashMap<FilterId, FilterSpec>,
        queued: Vec<(u16, Vec<u8>)>,
        drained: bool,
        closed: Vec<FilterId>,
    }

    impl SectionSource for MockSource {
        fn open(&mut self, spec: &FilterSpec) -> io::Result<FilterId> {
            let id = self.next_id;
            self.next_id += 1;
            self.open.insert(id, spec.clone());
            Ok(id)
        }

        fn close(&mut self, id: FilterId) {
            self.open.remove(&id);
            self.closed.push(id);
        }

        fn poll(&mut self, _timeout: Duration) -> io::Result<Vec<(FilterId, Vec<u8>)>> {
            let mut out = Vec::new();
            for (pid, bytes) in self.queued.drain(..) {
                for (&id, spec) in &self.open {
                    if spec.pid == pid && spec.table_id == bytes[0] {
                        out.push((id, bytes.clone()));
                    }
                }
            }
            Ok(out)
        }

        fn is_drained(&self, _id: FilterId) -> bool {
            self.drained
        }
    }

    /// PAT, TSID 1, section `number` of `last`.
    fn pat(number: u8, last: u8) -> Vec<u8> {
        seal_section(vec![
            0x00, // table_id
            0xB0, 0x0D, // section_length = 13
            0x00, 0x01, // transport_stream_id
            0xC1, // version 0, current
            number, last, //
            0x01, 0x01, 0xE2, 0x00, // program 0x0101 -> PMT PID 0x200
        ])
    }

    fn scheduler() -> FilterScheduler {
        FilterScheduler::new(0).with_poll_interval(Duration::ZERO)
    }

    #[test]
    fn test_filters_beyond_capacity_wait() {
        let mut source = MockSource::default();
        let mut sched = scheduler();

        for sid in 0..(MAX_RUNNING as u16 + 2) {
            sched.add(&mut source, FilterSpec::pmt(0x100 + sid, sid, false));
        }
        assert_eq!(sched.running_count(), MAX_RUNNING);
        assert_eq!(sched.waiting_count(), 2);
        assert!(matches!(
            sched.try_start(&mut source, FilterSpec::pat(false)),
            Err(ScanError::FilterCapacity(MAX_RUNNING))
        ));

        // draining retires everything; the queue moves up
        source.drained = true;
        sched.poll_round(&mut source).unwrap();
        assert_eq!(sched.running_count(), 2);
        assert_eq!(sched.waiting_count(), 0);
    }

    #[test]
    fn test_complete_table_closes_filter() {
        let mut source = MockSource::default();
        let mut sched = scheduler();
        sched.add(&mut source, FilterSpec::pat(false));

        source.queued.push((0x0000, pat(0, 1)));
        let ready = sched.poll_round(&mut source).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].section().data, &[0x01, 0x01, 0xE2, 0x00]);
        assert!(sched.has_running());

        // repeat is not delivered twice
        source.queued.push((0x0000, pat(0, 1)));
        source.queued.push((0x0000, pat(1, 1)));
        let ready = sched.poll_round(&mut source).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].header.section_number, 1);
        assert!(!sched.has_running());
        assert_eq!(source.closed, vec![0]);
    }

    #[test]
    fn test_skip_count_length_and_crc_checks() {
        let mut source = MockSource::default();
        let mut sched = FilterScheduler::new(1).with_poll_interval(Duration::ZERO);
        sched.add(&mut source, FilterSpec::pat(false));

        let mut bad_crc = pat(0, 0);
        let last = bad_crc.len() - 1;
        bad_crc[last] ^= 0xFF;
        let mut bad_length = pat(0, 0);
        bad_length.push(0xFF);

        source.queued.push((0x0000, pat(0, 0))); // skipped
        source.queued.push((0x0000, bad_length));
        source.queued.push((0x0000, bad_crc));
        assert!(sched.poll_round(&mut source).unwrap().is_empty());
        assert!(sched.has_running());

        source.queued.push((0x0000, pat(0, 0)));
        let ready = sched.poll_round(&mut source).unwrap();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].spec.table_id, table_id::PAT);
        assert!(!sched.has_running());
    }

    #[test]
    fn test_segmented_filter_ends_only_on_timeout() {
        let mut source = MockSource::default();
        let mut sched = scheduler();
        sched.add(&mut source, FilterSpec::nit_other(false));

        let nit = |ext: u8| {
            seal_section(vec![
                0x41, 0xF0, 0x0D, // NIT other, section_length = 13
                0x30, ext, 0xC1, 0x00, 0x00, //
                0xF0, 0x00, 0xF0, 0x00,
            ])
        };
        source.queued.push((0x0010, nit(0x10)));
        source.queued.push((0x0010, nit(0x20)));
        assert_eq!(sched.poll_round(&mut source).unwrap().len(), 2);
        assert!(sched.has_running());

        source.drained = true;
        assert!(sched.poll_round(&mut source).unwrap().is_empty());
        assert!(!sched.has_running());
    }
}
