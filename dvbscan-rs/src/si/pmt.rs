//! PMT (Program Map Table) parsing.

use super::descriptors::DescriptorKind;
use super::psi::PsiSection;
use super::table_id;

/// One elementary stream of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryStream {
    /// stream_type (ISO/IEC 13818-1 table 2-34).
    pub stream_type: u8,
    /// Elementary PID.
    pub pid: u16,
    /// ES info descriptors.
    pub descriptors: Vec<DescriptorKind>,
}

impl ElementaryStream {
    /// MPEG-1/2 or H.264 video.
    pub fn is_video(&self) -> bool {
        matches!(self.stream_type, 0x01 | 0x02 | 0x1B)
    }

    /// MPEG audio, or AC-3 audio per ATSC A/53.
    pub fn is_audio(&self) -> bool {
        matches!(self.stream_type, 0x03 | 0x04 | 0x81)
    }

    /// PES private data, classified by its descriptors.
    pub fn is_private_pes(&self) -> bool {
        self.stream_type == 0x06
    }

    pub fn has(&self, tag: u8) -> bool {
        self.descriptors.iter().any(|d| d.tag() == tag)
    }

    /// First ISO 639 language of the stream.
    pub fn language(&self) -> Option<&str> {
        self.descriptors.iter().find_map(|d| match d {
            DescriptorKind::Iso639Language(lang) => Some(lang.as_str()),
            _ => None,
        })
    }
}

/// Parsed PMT (Program Map Table).
#[derive(Debug, Clone, Default)]
pub struct PmtTable {
    /// Program number (service ID) from the table ID extension.
    pub program_number: u16,
    pub version_number: u8,
    pub pcr_pid: u16,
    /// Program info descriptors.
    pub program_descriptors: Vec<DescriptorKind>,
    /// Elementary streams, in section order.
    pub streams: Vec<ElementaryStream>,
}

impl PmtTable {
    /// Parse a PMT from a PSI section.
    ///
    /// An ES_info_length running past the section end is clipped to the
    /// available bytes; parsing stops once fewer than 5 bytes remain.
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        if section.header.table_id != table_id::PMT {
            return Err("Not a PMT section");
        }

        let data = section.data;
        if data.len() < 4 {
            return Err("PMT data too short");
        }

        let pcr_pid = ((data[0] as u16 & 0x1F) << 8) | data[1] as u16;
        let program_info_length = ((data[2] as usize & 0x0F) << 8) | data[3] as usize;
        let program_info_end = (4 + program_info_length).min(data.len());

        let mut pmt = PmtTable {
            program_number: section.header.table_id_extension,
            version_number: section.header.version_number,
            pcr_pid,
            program_descriptors: DescriptorKind::parse_loop(&data[4..program_info_end]),
            streams: Vec::new(),
        };

        let mut rest = &data[program_info_end..];
        while rest.len() >= 5 {
            let stream_type = rest[0];
            let pid = ((rest[1] as u16 & 0x1F) << 8) | rest[2] as u16;
            let es_info_length = ((rest[3] as usize & 0x0F) << 8) | rest[4] as usize;
            let es_end = (5 + es_info_length).min(rest.len());

            pmt.streams.push(ElementaryStream {
                stream_type,
                pid,
                descriptors: DescriptorKind::parse_loop(&rest[5..es_end]),
            });

            rest = &rest[es_end..];
        }

        Ok(pmt)
    }
}
