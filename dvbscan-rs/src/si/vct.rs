//! ATSC PSIP virtual channel table (terrestrial 0xC8, cable 0xC9).

use super::bits::get_bits;
use super::descriptors::DescriptorKind;
use super::psi::PsiSection;
use super::table_id;

/// Fixed part of a channel record.
const CHANNEL_RECORD_LEN: usize = 32;

/// One virtual channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VctChannel {
    /// Seven UTF-16 code units, reduced to their low bytes.
    pub short_name: String,
    pub major_channel_number: u16,
    pub minor_channel_number: u16,
    pub modulation_mode: u8,
    pub carrier_frequency: u32,
    pub channel_tsid: u16,
    pub program_number: u16,
    pub access_controlled: bool,
    pub hidden: bool,
    /// 1 analog TV, 2 ATSC TV, 3 ATSC audio, 4 ATSC data.
    pub service_type: u8,
    pub source_id: u16,
    pub descriptors: Vec<DescriptorKind>,
}

impl VctChannel {
    /// Channel number packed as major << 10 | minor.
    pub fn channel_number(&self) -> u32 {
        (self.major_channel_number as u32) << 10 | self.minor_channel_number as u32
    }
}

/// Parsed terrestrial or cable VCT.
#[derive(Debug, Clone, Default)]
pub struct VctTable {
    pub transport_stream_id: u16,
    pub version_number: u8,
    pub protocol_version: u8,
    pub channels: Vec<VctChannel>,
}

impl VctTable {
    /// Parse a VCT from a PSI section. Records that do not fit in the
    /// section end the channel loop.
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        let table = section.header.table_id;
        if table != table_id::ATSC_TVCT && table != table_id::ATSC_CVCT {
            return Err("Not a VCT section");
        }

        let data = section.data;
        if data.len() < 2 {
            return Err("VCT data too short");
        }

        let mut vct = VctTable {
            transport_stream_id: section.header.table_id_extension,
            version_number: section.header.version_number,
            protocol_version: data[0],
            channels: Vec::with_capacity(data[1] as usize),
        };

        let mut rest = &data[2..];
        for _ in 0..data[1] {
            if rest.len() < CHANNEL_RECORD_LEN {
                break;
            }
            let r = &rest[..CHANNEL_RECORD_LEN];
            let descriptors_length = get_bits(r, 246, 10) as usize;
            let end = (CHANNEL_RECORD_LEN + descriptors_length).min(rest.len());

            let short_name = r[..14]
                .chunks_exact(2)
                .map(|unit| unit[1])
                .take_while(|&b| b != 0)
                .map(char::from)
                .collect();

            vct.channels.push(VctChannel {
                short_name,
                major_channel_number: get_bits(r, 116, 10) as u16,
                minor_channel_number: get_bits(r, 126, 10) as u16,
                modulation_mode: r[17],
                carrier_frequency: get_bits(r, 144, 32),
                channel_tsid: get_bits(r, 176, 16) as u16,
                program_number: get_bits(r, 192, 16) as u16,
                access_controlled: get_bits(r, 210, 1) != 0,
                hidden: get_bits(r, 211, 1) != 0,
                service_type: get_bits(r, 218, 6) as u8,
                source_id: get_bits(r, 224, 16) as u16,
                descriptors: DescriptorKind::parse_loop(&rest[CHANNEL_RECORD_LEN..end]),
            });

            rest = &rest[end..];
        }

        Ok(vct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::si::psi::PsiHeader;

    fn section(data: &[u8]) -> PsiSection<'_> {
        PsiSection {
            header: PsiHeader {
                table_id: table_id::ATSC_TVCT,
                section_syntax_indicator: true,
                section_length: 9 + data.len() as u16,
                table_id_extension: 0x0815,
                version_number: 0,
                current_next_indicator: true,
                section_number: 0,
                last_section_number: 0,
            },
            data,
            crc32: 0,
        }
    }

    #[test]
    fn test_parse_vct() {
        let mut data = vec![
            0x00, // protocol_version
            0x01, // num_channels_in_section
            // short_name "WGBH" in UTF-16
            0x00, b'W', 0x00, b'G', 0x00, b'B', 0x00, b'H', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // reserved(4) major=2 (10) minor=1 (10) modulation_mode
            0xF0, 0x08, 0x01, 0x04,
            0x00, 0x00, 0x00, 0x00, // carrier_frequency
            0x08, 0x15, // channel_TSID
            0x00, 0x03, // program_number
            0x10, // ETM 0, access_controlled 0, hidden 1
            0xC2, // hide_guide, service_type = 2
            0x00, 0x01, // source_id
            0xFC, 0x04, // descriptors_length = 4
        ];
        data.extend_from_slice(&[0xA0, 0x02, 0x00, 0x00]);

        let vct = VctTable::parse(&section(&data)).unwrap();
        assert_eq!(vct.channels.len(), 1);

        let ch = &vct.channels[0];
        assert_eq!(ch.short_name, "WGBH");
        assert_eq!(ch.major_channel_number, 2);
        assert_eq!(ch.minor_channel_number, 1);
        assert_eq!(ch.channel_number(), 2 << 10 | 1);
        assert_eq!(ch.channel_tsid, 0x0815);
        assert_eq!(ch.program_number, 3);
        assert!(ch.hidden);
        assert!(!ch.access_controlled);
        assert_eq!(ch.service_type, 2);
        assert_eq!(ch.source_id, 1);
        assert_eq!(ch.descriptors.len(), 1);
    }

    #[test]
    fn test_truncated_record_ends_loop() {
        let data = [0x00, 0x03, 0x00, b'A'];
        let vct = VctTable::parse(&section(&data)).unwrap();
        assert!(vct.channels.is_empty());
    }
}
