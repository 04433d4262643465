use std::io;
use std::io::ErrorKind;

use dvbscan_model::Transponder;

use crate::tuner::{Tunable, TuneStatus};

const UNSUPPORTED_MSG: &str =
    "Frontend device access is not supported on this build (use --ts-file to replay a capture)";

/// Stand-in for a hardware frontend.
pub struct UnsupportedFrontend;

impl UnsupportedFrontend {
    pub fn open(_adapter: u32, _frontend: u32) -> Result<Self, io::Error> {
        Err(io::Error::new(ErrorKind::Unsupported, UNSUPPORTED_MSG))
    }
}

impl Tunable for UnsupportedFrontend {
    fn tune(&mut self, _t: &Transponder) -> Result<TuneStatus, io::Error> {
        Err(io::Error::new(ErrorKind::Unsupported, UNSUPPORTED_MSG))
    }

    fn read_current_parameters(&mut self) -> Result<Transponder, io::Error> {
        Err(io::Error::new(ErrorKind::Unsupported, UNSUPPORTED_MSG))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_reports_unsupported() {
        let err = UnsupportedFrontend::open(0, 0).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unsupported);

        let mut fe = UnsupportedFrontend;
        let err = fe.tune(&Transponder::new(474_000_000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
