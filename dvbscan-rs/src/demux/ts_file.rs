//! Section source replaying a captured transport stream.
//!
//! The capture is read like a carousel: at end of file it is rewound, so a
//! filter opened late still sees every table once. A filter is drained as
//! soon as it has been fed as many bytes as the file holds.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

use log::{debug, trace};

use super::{FilterId, FilterSpec, SectionSource};
use crate::si::packet::{TsPacket, SYNC_BYTE, TS_PACKET_SIZE};
use crate::si::psi::SectionCollector;
use crate::si::PsiHeader;

/// Packets read per poll round.
const PACKETS_PER_POLL: usize = 4096;

#[derive(Debug)]
struct OpenFilter {
    spec: FilterSpec,
    bytes_seen: u64,
}

#[derive(Debug)]
pub struct TsFileSource<R> {
    reader: R,
    file_len: u64,
    filters: HashMap<FilterId, OpenFilter>,
    collectors: HashMap<u16, SectionCollector>,
    next_id: FilterId,
}

impl TsFileSource<BufReader<File>> {
    pub fn open_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!("replaying {}", path.as_ref().display());
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> TsFileSource<R> {
    pub fn new(mut reader: R) -> io::Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(TsFileSource {
            reader,
            file_len: file_len - file_len % TS_PACKET_SIZE as u64,
            filters: HashMap::new(),
            collectors: HashMap::new(),
            next_id: 0,
        })
    }

    fn rewind(&mut self) -> io::Result<()> {
        trace!("end of capture, rewinding");
        self.reader.seek(SeekFrom::Start(0))?;
        self.collectors.clear();
        Ok(())
    }

    fn wanted(&self, pid: u16) -> bool {
        self.filters.values().any(|f| f.spec.pid == pid)
    }

    fn dispatch(&self, pid: u16, section: Vec<u8>, out: &mut Vec<(FilterId, Vec<u8>)>) {
        let Ok(header) = PsiHeader::peek(&section) else {
            return;
        };
        for (&id, filter) in &self.filters {
            if filter
                .spec
                .matches(pid, header.table_id, header.table_id_extension)
            {
                out.push((id, section.clone()));
            }
        }
    }
}

impl<R: Read + Seek> SectionSource for TsFileSource<R> {
    fn open(&mut self, spec: &FilterSpec) -> io::Result<FilterId> {
        let id = self.next_id;
        self.next_id += 1;
        self.filters.insert(
            id,
            OpenFilter {
                spec: spec.clone(),
                bytes_seen: 0,
            },
        );
        Ok(id)
    }

    fn close(&mut self, id: FilterId) {
        self.filters.remove(&id);
    }

    fn poll(&mut self, _timeout: Duration) -> io::Result<Vec<(FilterId, Vec<u8>)>> {
        let mut out = Vec::new();
        if self.filters.is_empty() || self.file_len == 0 {
            return Ok(out);
        }

        let mut packet = [0u8; TS_PACKET_SIZE];
        let mut rewound = false;
        for _ in 0..PACKETS_PER_POLL {
            match self.reader.read_exact(&mut packet) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    if rewound {
                        break;
                    }
                    self.rewind()?;
                    rewound = true;
                    continue;
                }
                Err(e) => return Err(e),
            }

            for filter in self.filters.values_mut() {
                filter.bytes_seen += TS_PACKET_SIZE as u64;
            }

            if packet[0] != SYNC_BYTE {
                if let Some(pos) = packet[1..].iter().position(|&b| b == SYNC_BYTE) {
                    let back = (TS_PACKET_SIZE - 1 - pos) as i64;
                    self.reader.seek(SeekFrom::Current(-back))?;
                }
                continue;
            }

            let Ok(ts) = TsPacket::parse(&packet) else {
                continue;
            };
            let pid = ts.header.pid;
            if ts.header.transport_error || ts.payload.is_empty() || !self.wanted(pid) {
                continue;
            }

            let sections = self.collectors.entry(pid).or_default().push(
                ts.payload,
                ts.header.continuity_counter,
                ts.header.payload_unit_start,
            );
            for section in sections {
                self.dispatch(pid, section, &mut out);
            }
        }

        Ok(out)
    }

    fn is_drained(&self, id: FilterId) -> bool {
        self.filters
            .get(&id)
            .map_or(true, |f| f.bytes_seen >= self.file_len)
    }
}
