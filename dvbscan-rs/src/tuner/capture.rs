use std::io;

use dvbscan_model::Transponder;
use log::debug;

use crate::tuner::{LockPolicy, Tunable, TuneStatus};

/// Frontend of a replayed capture. The signal is always there; the
/// parameters are the ones the capture was recorded with.
#[derive(Debug, Clone)]
pub struct CaptureFrontend {
    transponder: Transponder,
    lock: LockPolicy,
}

impl CaptureFrontend {
    pub fn new(transponder: Transponder, lock: LockPolicy) -> Self {
        CaptureFrontend { transponder, lock }
    }
}

impl Tunable for CaptureFrontend {
    fn tune(&mut self, t: &Transponder) -> io::Result<TuneStatus> {
        debug!(
            "capture frontend: {} {} (recorded at {})",
            t.delivery_system, t.frequency, self.transponder.frequency
        );
        self.lock.wait(|| Ok(true))
    }

    fn read_current_parameters(&mut self) -> io::Result<Transponder> {
        Ok(self.transponder.clone())
    }
}
