//! SDT (Service Description Table) parsing.
//!
//! The SDT is transmitted on PID 0x0011. Table ID 0x42 describes the
//! services of the actual transport stream, 0x46 of other streams.

use dvbscan_model::RunningStatus;
use log::warn;

use super::bits::get_bits;
use super::descriptors::{DescriptorKind, ServiceDescriptor};
use super::psi::PsiSection;
use super::table_id;

/// Service entry in the SDT.
#[derive(Debug, Clone)]
pub struct SdtService {
    pub service_id: u16,
    pub eit_schedule: bool,
    pub eit_present_following: bool,
    pub running_status: RunningStatus,
    /// free_CA_mode.
    pub scrambled: bool,
    pub descriptors: Vec<DescriptorKind>,
}

impl SdtService {
    /// Service descriptor, if present.
    pub fn service_descriptor(&self) -> Option<&ServiceDescriptor> {
        self.descriptors.iter().find_map(|d| match d {
            DescriptorKind::Service(sd) => Some(sd),
            _ => None,
        })
    }
}

/// Parsed SDT (Service Description Table).
#[derive(Debug, Clone, Default)]
pub struct SdtTable {
    /// Transport stream ID.
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub version_number: u8,
    /// Table ID 0x42.
    pub actual: bool,
    pub services: Vec<SdtService>,
}

impl SdtTable {
    /// Parse an SDT from a PSI section.
    ///
    /// The service loop ends with a warning at the first entry whose
    /// descriptor loop is empty or longer than the remaining data.
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        let table = section.header.table_id;
        if table != table_id::SDT_ACTUAL && table != table_id::SDT_OTHER {
            return Err("Not an SDT section");
        }

        let data = section.data;
        if data.len() < 3 {
            return Err("SDT data too short");
        }

        let mut sdt = SdtTable {
            transport_stream_id: section.header.table_id_extension,
            original_network_id: get_bits(data, 0, 16) as u16,
            version_number: section.header.version_number,
            actual: table == table_id::SDT_ACTUAL,
            services: Vec::new(),
        };

        // original_network_id + reserved_future_use
        let mut rest = &data[3..];
        while rest.len() >= 5 {
            let service_id = get_bits(rest, 0, 16) as u16;
            let descriptors_length = get_bits(rest, 28, 12) as usize;

            if descriptors_length == 0 || rest.len() < descriptors_length + 5 {
                warn!(
                    "section too short: service_id == 0x{:02X}, section_length == {}, \
                     descriptors_loop_len == {}",
                    service_id,
                    rest.len(),
                    descriptors_length
                );
                break;
            }

            sdt.services.push(SdtService {
                service_id,
                eit_schedule: get_bits(rest, 22, 1) != 0,
                eit_present_following: get_bits(rest, 23, 1) != 0,
                running_status: RunningStatus::from_bits(get_bits(rest, 24, 3) as u8),
                scrambled: get_bits(rest, 27, 1) != 0,
                descriptors: DescriptorKind::parse_loop(&rest[5..5 + descriptors_length]),
            });

            rest = &rest[5 + descriptors_length..];
        }

        Ok(sdt)
    }

    /// Find a service by ID.
    pub fn find_service(&self, service_id: u16) -> Option<&SdtService> {
        self.services.iter().find(|s| s.service_id == service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::si::psi::PsiHeader;

    fn section(table: u8, data: &[u8]) -> PsiSection<'_> {
        PsiSection {
            header: PsiHeader {
                table_id: table,
                section_syntax_indicator: true,
                section_length: 9 + data.len() as u16,
                table_id_extension: 0x0402,
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
    fn test_parse_sdt() {
        let data = [
            0x00, 0x01, // original_network_id
            0xFF, // reserved
            0x01, 0x01, // service_id
            0xFF, // EIT schedule + p/f
            0x90, 0x0B, // running, scrambled, descriptors_loop_length = 11
            0x48, 0x09, // service descriptor
            0x01, // digital television
            0x02, b'O', b'P', // provider
            0x04, b'O', b'N', b'E', b' ',
        ];

        let sdt = SdtTable::parse(&section(table_id::SDT_ACTUAL, &data)).unwrap();
        assert!(sdt.actual);
        assert_eq!(sdt.transport_stream_id, 0x0402);
        assert_eq!(sdt.original_network_id, 0x0001);
        assert_eq!(sdt.services.len(), 1);

        let s = sdt.find_service(0x0101).unwrap();
        assert!(s.eit_schedule);
        assert!(s.eit_present_following);
        assert_eq!(s.running_status, RunningStatus::Running);
        assert!(s.scrambled);

        let sd = s.service_descriptor().unwrap();
        assert_eq!(sd.provider_name, "OP");
        assert_eq!(sd.service_name, "ONE ");
    }

    #[test]
    fn test_empty_descriptor_loop_ends_parsing() {
        let data = [
            0x00, 0x01, 0xFF, //
            0x01, 0x01, 0xFC, 0x80, 0x00, // no descriptors
            0x01, 0x02, 0xFC, 0x80, 0x02, 0x56, 0x00,
        ];

        let sdt = SdtTable::parse(&section(table_id::SDT_OTHER, &data)).unwrap();
        assert!(!sdt.actual);
        assert!(sdt.services.is_empty());
    }
}
