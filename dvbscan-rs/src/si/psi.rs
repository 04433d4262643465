//! PSI (Program Specific Information) section parsing.
//!
//! This module handles the common section header, CRC validation and the
//! reassembly of sections spread over several TS packets.

use crc::{Crc, CRC_32_MPEG_2};

const CRC_MPEG: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Header bytes of a long-form section, counting table_id through
/// last_section_number.
pub const LONG_HEADER_LEN: usize = 8;

/// Largest section a demux filter ever delivers.
pub const MAX_SECTION_LEN: usize = 4096;

/// PSI section header (common to all PSI tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PsiHeader {
    /// Table ID.
    pub table_id: u8,
    /// Section syntax indicator.
    pub section_syntax_indicator: bool,
    /// Section length (12 bits).
    pub section_length: u16,
    /// Table ID extension (for long sections).
    pub table_id_extension: u16,
    /// Version number (5 bits).
    pub version_number: u8,
    /// Current/next indicator.
    pub current_next_indicator: bool,
    /// Section number.
    pub section_number: u8,
    /// Last section number.
    pub last_section_number: u8,
}

impl PsiHeader {
    /// Read the header fields without validating the body.
    pub fn peek(data: &[u8]) -> Result<Self, &'static str> {
        if data.len() < 3 {
            return Err("Section too short for header");
        }

        let table_id = data[0];
        let section_syntax_indicator = data[1] & 0x80 != 0;
        let section_length = ((data[1] as u16 & 0x0F) << 8) | data[2] as u16;

        if !section_syntax_indicator {
            return Ok(PsiHeader {
                table_id,
                section_syntax_indicator,
                section_length,
                table_id_extension: 0,
                version_number: 0,
                current_next_indicator: true,
                section_number: 0,
                last_section_number: 0,
            });
        }

        if data.len() < LONG_HEADER_LEN {
            return Err("Section too short for extended header");
        }

        Ok(PsiHeader {
            table_id,
            section_syntax_indicator,
            section_length,
            table_id_extension: ((data[3] as u16) << 8) | data[4] as u16,
            version_number: (data[5] >> 1) & 0x1F,
            current_next_indicator: data[5] & 0x01 != 0,
            section_number: data[6],
            last_section_number: data[7],
        })
    }

    /// Body length of a long section, after the extended header and
    /// before the CRC. Negative for a truncated section.
    pub fn body_len(&self) -> isize {
        self.section_length as isize - 4 - 5
    }
}

/// A parsed PSI section.
#[derive(Debug, Clone)]
pub struct PsiSection<'a> {
    /// Section header.
    pub header: PsiHeader,
    /// Section data (after header, before CRC).
    pub data: &'a [u8],
    /// CRC32 value.
    pub crc32: u32,
}

impl<'a> PsiSection<'a> {
    /// Parse a PSI section from raw bytes.
    ///
    /// # Arguments
    /// * `data` - Slice containing the section data starting from table_id
    ///
    /// # Returns
    /// Parsed section or error message. A long section whose body is empty
    /// is accepted; one too short to hold its header and CRC is not.
    pub fn parse(data: &'a [u8]) -> Result<Self, &'static str> {
        let header = PsiHeader::peek(data)?;

        let total_length = 3 + header.section_length as usize;
        if data.len() < total_length {
            return Err("Incomplete section data");
        }

        let data_start = if header.section_syntax_indicator {
            if header.body_len() < 0 {
                return Err("Truncated section");
            }
            LONG_HEADER_LEN
        } else {
            if header.section_length < 4 {
                return Err("Section length too small");
            }
            3
        };
        let data_end = total_length - 4;

        let crc32 = u32::from_be_bytes([
            data[data_end],
            data[data_end + 1],
            data[data_end + 2],
            data[data_end + 3],
        ]);

        Ok(PsiSection {
            header,
            data: &data[data_start..data_end],
            crc32,
        })
    }

    /// Verify CRC32 of the section.
    pub fn verify_crc(&self, full_data: &[u8]) -> bool {
        let total_length = self.total_length();
        if full_data.len() < total_length {
            return false;
        }

        crc32_mpeg2(&full_data[..total_length - 4]) == self.crc32
    }

    /// Get the total section length including header and CRC.
    pub fn total_length(&self) -> usize {
        3 + self.header.section_length as usize
    }
}

/// Section collector for multi-packet sections.
#[derive(Debug, Default)]
pub struct SectionCollector {
    /// Buffer for collecting section data.
    buffer: Vec<u8>,
    /// Expected section length.
    expected_length: Option<usize>,
    /// Last continuity counter.
    last_cc: Option<u8>,
}

impl SectionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.expected_length = None;
        self.last_cc = None;
    }

    /// Add the payload of one TS packet.
    ///
    /// Returns every section completed by this packet. Sections packed
    /// back to back after a pointer field are all returned.
    pub fn push(&mut self, payload: &[u8], cc: u8, payload_unit_start: bool) -> Vec<Vec<u8>> {
        if let Some(last) = self.last_cc {
            if cc == last {
                // duplicate packet
                return Vec::new();
            }
            if cc != (last + 1) & 0x0F && !payload_unit_start {
                self.clear();
            }
        }
        self.last_cc = Some(cc);

        let mut sections = Vec::new();

        if payload_unit_start {
            let Some((&pointer, rest)) = payload.split_first() else {
                return sections;
            };
            let pointer = pointer as usize;
            if pointer > rest.len() {
                self.buffer.clear();
                self.expected_length = None;
                return sections;
            }

            // tail of the previous section
            if !self.buffer.is_empty() {
                self.buffer.extend_from_slice(&rest[..pointer]);
                self.take_complete(&mut sections);
            }

            self.buffer.clear();
            self.expected_length = None;
            self.buffer.extend_from_slice(&rest[pointer..]);
        } else if !self.buffer.is_empty() {
            self.buffer.extend_from_slice(payload);
        } else {
            return sections;
        }

        self.take_complete(&mut sections);
        sections
    }

    fn take_complete(&mut self, out: &mut Vec<Vec<u8>>) {
        loop {
            // stuffing after the last section
            if self.buffer.first().map_or(true, |&b| b == 0xFF) {
                self.buffer.clear();
                self.expected_length = None;
                return;
            }

            if self.expected_length.is_none() && self.buffer.len() >= 3 {
                let section_length =
                    ((self.buffer[1] as usize & 0x0F) << 8) | self.buffer[2] as usize;
                self.expected_length = Some(3 + section_length);
            }

            match self.expected_length {
                Some(expected) if self.buffer.len() >= expected => {
                    out.push(self.buffer[..expected].to_vec());
                    self.buffer.drain(..expected);
                    self.expected_length = None;
                }
                _ => return,
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Calculate CRC32 for MPEG-2 (polynomial 0x04C11DB7).
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    CRC_MPEG.checksum(data)
}

/// Append the MPEG-2 CRC to a section body. Used to build sections for
/// replay and in tests.
pub fn seal_section(mut section: Vec<u8>) -> Vec<u8> {
    let crc = crc32_mpeg2(&section);
    section.extend_from_slice(&crc.to_be_bytes());
    section
}
