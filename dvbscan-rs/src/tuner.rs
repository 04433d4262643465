use std::io;
use std::thread;
use std::time::Duration;

use dvbscan_model::Transponder;

pub use self::capture::CaptureFrontend;
pub use self::unsupported::UnsupportedFrontend;

mod capture;
mod unsupported;

/// Lock polls per tuning attempt.
pub const DEFAULT_LOCK_ITERATIONS: u32 = 10;
/// Pause between two lock polls.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneStatus {
    Locked,
    Failed,
}

pub trait Tunable {
    /// Tune to `t` and wait for the lock within the frontend's budget.
    fn tune(&mut self, t: &Transponder) -> io::Result<TuneStatus>;

    /// Parameters the frontend is currently tuned to.
    fn read_current_parameters(&mut self) -> io::Result<Transponder>;
}

/// Bounded lock polling: `iterations` checks, `interval` apart.
#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    pub iterations: u32,
    pub interval: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        LockPolicy {
            iterations: DEFAULT_LOCK_ITERATIONS,
            interval: LOCK_POLL_INTERVAL,
        }
    }
}

impl LockPolicy {
    pub fn new(iterations: u32) -> Self {
        LockPolicy {
            iterations,
            ..Default::default()
        }
    }

    pub fn wait<F>(&self, mut has_lock: F) -> io::Result<TuneStatus>
    where
        F: FnMut() -> io::Result<bool>,
    {
        for i in 0..self.iterations {
            if has_lock()? {
                return Ok(TuneStatus::Locked);
            }
            if i + 1 < self.iterations {
                thread::sleep(self.interval);
            }
        }
        Ok(TuneStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(iterations: u32) -> LockPolicy {
        LockPolicy {
            iterations,
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_lock_after_some_polls() {
        let mut polls = 0;
        let status = policy(10)
            .wait(|| {
                polls += 1;
                Ok(polls == 3)
            })
            .unwrap();
        assert_eq!(status, TuneStatus::Locked);
        assert_eq!(polls, 3);
    }

    #[test]
    fn test_no_lock_within_budget() {
        let mut polls = 0;
        let status = policy(4)
            .wait(|| {
                polls += 1;
                Ok(false)
            })
            .unwrap();
        assert_eq!(status, TuneStatus::Failed);
        assert_eq!(polls, 4);
    }
}
