//! Pending and scanned transponder sets.
//!
//! Transponders are identified by frequency within
//! [`FREQUENCY_TOLERANCE`](dvbscan_model::FREQUENCY_TOLERANCE), polarisation
//! and stream id, never by their network/transport stream ids: real
//! networks reuse those.

use dvbscan_model::{is_same_frequency, Polarisation, Transponder};
use log::{debug, info};

/// Location of a transponder in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpRef {
    Pending(usize),
    Scanned(usize),
}

#[derive(Debug, Default)]
pub struct TransponderRegistry {
    /// Not tuned yet, in discovery order.
    pending: Vec<Transponder>,
    /// Tuning attempted, in tuning order.
    scanned: Vec<Transponder>,
    /// Index in `scanned` of the transponder being scanned.
    current: Option<usize>,
    current_only: bool,
}

impl TransponderRegistry {
    /// With `current_only`, every lookup resolves to the first scanned
    /// transponder.
    pub fn new(current_only: bool) -> Self {
        TransponderRegistry {
            current_only,
            ..Default::default()
        }
    }

    pub fn pending(&self) -> &[Transponder] {
        &self.pending
    }

    pub fn scanned(&self) -> &[Transponder] {
        &self.scanned
    }

    pub fn scanned_mut(&mut self) -> &mut [Transponder] {
        &mut self.scanned
    }

    pub fn get(&self, r: TpRef) -> &Transponder {
        match r {
            TpRef::Pending(i) => &self.pending[i],
            TpRef::Scanned(i) => &self.scanned[i],
        }
    }

    pub fn get_mut(&mut self, r: TpRef) -> &mut Transponder {
        match r {
            TpRef::Pending(i) => &mut self.pending[i],
            TpRef::Scanned(i) => &mut self.scanned[i],
        }
    }

    pub fn current(&self) -> Option<&Transponder> {
        self.current.map(|i| &self.scanned[i])
    }

    pub fn current_mut(&mut self) -> Option<&mut Transponder> {
        match self.current {
            Some(i) => Some(&mut self.scanned[i]),
            None => None,
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Append a new transponder to the pending set.
    pub fn allocate(&mut self, frequency: u32) -> &mut Transponder {
        self.push_pending(Transponder::new(frequency))
    }

    pub fn push_pending(&mut self, t: Transponder) -> &mut Transponder {
        self.pending.push(t);
        let last = self.pending.len() - 1;
        &mut self.pending[last]
    }

    /// Register an already tuned transponder as the current one.
    pub fn push_current(&mut self, mut t: Transponder) -> &mut Transponder {
        t.scan_done = true;
        self.scanned.push(t);
        let last = self.scanned.len() - 1;
        self.current = Some(last);
        &mut self.scanned[last]
    }

    fn lookup<F>(&self, matches: F) -> Option<TpRef>
    where
        F: Fn(&Transponder) -> bool,
    {
        if self.current_only && !self.scanned.is_empty() {
            return Some(TpRef::Scanned(0));
        }
        if let Some(i) = self.scanned.iter().position(&matches) {
            return Some(TpRef::Scanned(i));
        }
        self.pending.iter().position(&matches).map(TpRef::Pending)
    }

    /// Any transponder on this frequency, scanned ones first.
    pub fn find_by_freq(&self, frequency: u32) -> Option<TpRef> {
        self.lookup(|t| is_same_frequency(t.frequency, frequency))
    }

    /// Transponder on this frequency and polarisation, scanned ones first.
    pub fn find(&self, frequency: u32, polarisation: Polarisation) -> Option<TpRef> {
        self.lookup(|t| is_same_frequency(t.frequency, frequency) && t.polarisation == polarisation)
    }

    /// Drop pending entries that are the same transponder as `t`.
    pub fn remove_duplicates(&mut self, t: &Transponder) {
        let before = self.pending.len();
        self.pending.retain(|p| !p.is_same_transponder(t));
        if self.pending.len() != before {
            debug!(
                "dropped {} pending duplicates of f = {}",
                before - self.pending.len(),
                t.frequency
            );
        }
    }

    /// Move the first pending transponder to the scanned set and make it
    /// current.
    pub fn take_next_pending(&mut self) -> Option<usize> {
        if self.pending.is_empty() {
            return None;
        }
        let mut t = self.pending.remove(0);
        t.scan_done = true;
        self.scanned.push(t);
        let index = self.scanned.len() - 1;
        self.current = Some(index);
        Some(index)
    }

    /// Switch a scanned transponder that failed to tune to its next
    /// untried alternate frequency, last listed first.
    ///
    /// The failed frequency stays behind as a wrong-frequency record so
    /// it is not tuned again. Returns None once the alternates are used up.
    pub fn next_alternate(&mut self, index: usize) -> Option<u32> {
        loop {
            let t = &mut self.scanned[index];
            if !t.other_frequency_flag {
                return None;
            }
            let freq = t.other_frequencies.pop()?;

            if self.find_by_freq(freq).is_some() {
                continue;
            }

            let t = &self.scanned[index];
            let mut wrong = Transponder::new(t.frequency);
            wrong.merge_from(t, false);
            wrong.wrong_frequency = true;
            self.scanned.push(wrong);

            self.scanned[index].frequency = freq;
            info!("retrying with f={}", freq);
            return Some(freq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dvbscan_model::DeliverySystem;

    fn sat(frequency: u32, pol: Polarisation, system: DeliverySystem) -> Transponder {
        Transponder {
            frequency,
            polarisation: pol,
            delivery_system: system,
            ..Default::default()
        }
    }

    #[test]
    fn test_find_within_tolerance() {
        let mut reg = TransponderRegistry::new(false);
        reg.allocate(11_778_000);

        assert_eq!(reg.find_by_freq(11_779_999), Some(TpRef::Pending(0)));
        assert_eq!(reg.find_by_freq(11_776_001), Some(TpRef::Pending(0)));
        assert_eq!(reg.find_by_freq(11_780_000), None);
        assert_eq!(reg.find(11_778_000, Polarisation::Horizontal), Some(TpRef::Pending(0)));
        assert_eq!(reg.find(11_778_000, Polarisation::Vertical), None);
    }

    #[test]
    fn test_scanned_set_searched_first() {
        let mut reg = TransponderRegistry::new(false);
        reg.allocate(474_000_000);
        reg.allocate(474_000_500);
        assert_eq!(reg.take_next_pending(), Some(0));

        assert_eq!(reg.find_by_freq(474_000_500), Some(TpRef::Scanned(0)));
        assert!(reg.current().unwrap().scan_done);
        assert_eq!(reg.pending().len(), 1);
    }

    #[test]
    fn test_current_only_resolves_everything_to_current() {
        let mut reg = TransponderRegistry::new(true);
        reg.push_current(Transponder::new(538_000_000));
        assert_eq!(reg.find_by_freq(11_000_000), Some(TpRef::Scanned(0)));
        assert_eq!(
            reg.find(12_000_000, Polarisation::CircularLeft),
            Some(TpRef::Scanned(0))
        );
    }

    #[test]
    fn test_lock_removes_speculative_twin() {
        let mut reg = TransponderRegistry::new(false);
        reg.push_pending(sat(11_778_000, Polarisation::Vertical, DeliverySystem::DvbS));
        reg.push_pending(sat(11_778_000, Polarisation::Vertical, DeliverySystem::DvbS2));
        reg.push_pending(sat(11_778_000, Polarisation::Horizontal, DeliverySystem::DvbS));

        let index = reg.take_next_pending().unwrap();
        let tuned = reg.scanned()[index].clone();
        reg.remove_duplicates(&tuned);

        assert_eq!(reg.pending().len(), 1);
        assert_eq!(reg.pending()[0].polarisation, Polarisation::Horizontal);
    }

    #[test]
    fn test_alternate_frequencies_consumed_from_end() {
        let mut reg = TransponderRegistry::new(false);
        reg.allocate(650_000_000);
        let t = reg.allocate(506_000_000);
        t.other_frequency_flag = true;
        t.other_frequencies = vec![522_000_000, 650_001_000];

        let index = reg.take_next_pending().unwrap();
        assert_eq!(reg.scanned()[index].frequency, 650_000_000);
        let index = reg.take_next_pending().unwrap();

        // 650.001 MHz is known, so 522 MHz is tried next
        assert_eq!(reg.next_alternate(index), Some(522_000_000));
        assert_eq!(reg.scanned()[index].frequency, 522_000_000);

        let wrong = reg.scanned().last().unwrap();
        assert!(wrong.wrong_frequency);
        assert_eq!(wrong.frequency, 506_000_000);
        assert!(wrong.services.is_empty());

        assert_eq!(reg.next_alternate(index), None);
    }

    #[test]
    fn test_no_alternates_without_flag() {
        let mut reg = TransponderRegistry::new(false);
        let t = reg.allocate(506_000_000);
        t.other_frequencies = vec![522_000_000];
        let index = reg.take_next_pending().unwrap();
        assert_eq!(reg.next_alternate(index), None);
        assert_eq!(reg.scanned().len(), 1);
    }
}
