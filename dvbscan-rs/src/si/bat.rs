//! BAT (Bouquet Association Table) parsing.
//!
//! The BAT shares PID 0x0011 with the SDT and uses table ID 0x4A. The
//! table ID extension carries the bouquet ID.

use log::warn;

use super::bits::get_bits;
use super::descriptors::{DescriptorKind, MultilingualName, ServiceListEntry, TricolorService};
use super::psi::PsiSection;
use super::table_id;

/// Transport stream entry of a bouquet.
#[derive(Debug, Clone, Default)]
pub struct BatTransportStream {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    /// Services from the service list descriptors of this entry.
    pub services: Vec<ServiceListEntry>,
}

/// Parsed BAT.
#[derive(Debug, Clone, Default)]
pub struct BatTable {
    pub bouquet_id: u16,
    pub version_number: u8,
    /// Bouquet descriptors.
    pub descriptors: Vec<DescriptorKind>,
    pub transport_streams: Vec<BatTransportStream>,
}

impl BatTable {
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        if section.header.table_id != table_id::BAT {
            return Err("Not a BAT section");
        }

        let bouquet_id = section.header.table_id_extension;
        let data = section.data;

        let bouquet_descriptors_length = get_bits(data, 4, 12) as usize;
        if data.len() < bouquet_descriptors_length + 2 {
            warn!(
                "section too short: bouquet_id == 0x{:04X}, section_length == {}, \
                 descriptors_loop_len == {}",
                bouquet_id,
                data.len(),
                bouquet_descriptors_length
            );
            return Err("Invalid bouquet descriptors length");
        }

        let mut bat = BatTable {
            bouquet_id,
            version_number: section.header.version_number,
            descriptors: DescriptorKind::parse_loop(&data[2..2 + bouquet_descriptors_length]),
            transport_streams: Vec::new(),
        };

        let rest = &data[2 + bouquet_descriptors_length..];
        let ts_loop_length = get_bits(rest, 4, 12) as usize;
        if rest.len() < ts_loop_length + 2 {
            warn!(
                "section too short: bouquet_id == 0x{:04X}, section_length == {}, \
                 streams_loop_len == {}",
                bouquet_id,
                rest.len(),
                ts_loop_length
            );
            return Ok(bat);
        }

        let mut ts_loop = &rest[2..2 + ts_loop_length];
        while ts_loop.len() >= 6 {
            let transport_stream_id = get_bits(ts_loop, 0, 16) as u16;
            let descriptors_length = get_bits(ts_loop, 36, 12) as usize;
            if ts_loop.len() < descriptors_length + 6 {
                warn!(
                    "section too short: transport_stream_id == 0x{:04X}, \
                     stream_loop_len == {}, streams descriptors_loop_len == {}",
                    transport_stream_id,
                    ts_loop.len(),
                    descriptors_length
                );
                break;
            }

            let services = DescriptorKind::parse_loop(&ts_loop[6..6 + descriptors_length])
                .into_iter()
                .filter_map(|d| match d {
                    DescriptorKind::ServiceList(list) => Some(list),
                    _ => None,
                })
                .flatten()
                .collect();

            bat.transport_streams.push(BatTransportStream {
                transport_stream_id,
                original_network_id: get_bits(ts_loop, 16, 16) as u16,
                services,
            });

            ts_loop = &ts_loop[6 + descriptors_length..];
        }

        Ok(bat)
    }

    /// Name from the bouquet name descriptor.
    pub fn bouquet_name(&self) -> Option<&str> {
        self.descriptors.iter().find_map(|d| match d {
            DescriptorKind::BouquetName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// All multilingual bouquet names, in descriptor order.
    pub fn multilingual_names(&self) -> impl Iterator<Item = &MultilingualName> {
        self.descriptors
            .iter()
            .filter_map(|d| match d {
                DescriptorKind::MultilingualBouquetName(names) => Some(names),
                _ => None,
            })
            .flatten()
    }

    /// Services listed by Tricolor TV private descriptors.
    pub fn tricolor_services(&self) -> impl Iterator<Item = &TricolorService> {
        self.descriptors
            .iter()
            .filter_map(|d| match d {
                DescriptorKind::TricolorServiceList(list) => Some(list),
                _ => None,
            })
            .flatten()
    }
}
