//! PAT (Program Association Table) parsing.
//!
//! The PAT is transmitted on PID 0x0000 and maps each program number to
//! the PID carrying its PMT.

use super::psi::PsiSection;
use super::table_id;

/// A single PAT entry (program number and PMT PID).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatEntry {
    /// Program number (service ID).
    pub program_number: u16,
    /// PID of the PMT for this program.
    pub pmt_pid: u16,
}

/// Parsed PAT (Program Association Table).
#[derive(Debug, Clone, Default)]
pub struct PatTable {
    /// Transport stream ID.
    pub transport_stream_id: u16,
    /// Version number.
    pub version_number: u8,
    /// Programs, in section order. The network PID entry is excluded.
    pub programs: Vec<PatEntry>,
    /// NIT PID (if present in PAT).
    pub nit_pid: Option<u16>,
}

impl PatTable {
    /// Parse a PAT from a PSI section. A trailing partial entry is ignored.
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        if section.header.table_id != table_id::PAT {
            return Err("Not a PAT section");
        }

        let mut pat = PatTable {
            transport_stream_id: section.header.table_id_extension,
            version_number: section.header.version_number,
            ..Default::default()
        };

        for chunk in section.data.chunks_exact(4) {
            let program_number = u16::from_be_bytes([chunk[0], chunk[1]]);
            let pid = ((chunk[2] as u16 & 0x1F) << 8) | chunk[3] as u16;

            if program_number == 0 {
                pat.nit_pid = Some(pid);
            } else {
                pat.programs.push(PatEntry {
                    program_number,
                    pmt_pid: pid,
                });
            }
        }

        Ok(pat)
    }

    /// Get PMT PID for a specific program number.
    pub fn pmt_pid(&self, program_number: u16) -> Option<u16> {
        self.programs
            .iter()
            .find(|p| p.program_number == program_number)
            .map(|p| p.pmt_pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::si::psi::PsiHeader;

    fn section(data: &[u8]) -> PsiSection<'_> {
        PsiSection {
            header: PsiHeader {
                table_id: table_id::PAT,
                section_syntax_indicator: true,
                section_length: 9 + data.len() as u16,
                table_id_extension: 0x1234, // TSID
                version_number: 1,
                current_next_indicator: true,
                section_number: 0,
                last_section_number: 0,
            },
            data,
            crc32: 0,
        }
    }

    #[test]
    fn test_parse_pat() {
        let data = [
            // Program 1: number=0x0101, PID=0x0200
            0x01, 0x01, 0xE2, 0x00,
            // Program 2: number=0x0102, PID=0x0300
            0x01, 0x02, 0xE3, 0x00,
        ];

        let pat = PatTable::parse(&section(&data)).unwrap();

        assert_eq!(pat.transport_stream_id, 0x1234);
        assert_eq!(pat.version_number, 1);
        assert_eq!(pat.programs.len(), 2);
        assert_eq!(pat.programs[0].program_number, 0x0101);
        assert_eq!(pat.programs[0].pmt_pid, 0x0200);
        assert_eq!(pat.pmt_pid(0x0102), Some(0x0300));
        assert_eq!(pat.pmt_pid(0x0103), None);
    }

    #[test]
    fn test_pat_with_nit() {
        let data = [
            // NIT: number=0x0000, PID=0x0010
            0x00, 0x00, 0xE0, 0x10,
            // Program 1: number=0x0101, PID=0x0100
            0x01, 0x01, 0xE1, 0x00,
            // partial entry
            0x01, 0x02,
        ];

        let pat = PatTable::parse(&section(&data)).unwrap();

        assert_eq!(pat.nit_pid, Some(0x0010));
        assert_eq!(pat.programs.len(), 1);
    }

    #[test]
    fn test_rejects_other_table() {
        let mut s = section(&[]);
        s.header.table_id = table_id::PMT;
        assert!(PatTable::parse(&s).is_err());
    }
}
