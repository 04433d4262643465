//! NIT (Network Information Table) parsing.
//!
//! The NIT is transmitted on PID 0x0010 and describes the physical
//! parameters of every transport stream of a network. Table ID 0x40
//! carries the actual network, 0x41 other networks.

use log::warn;

use super::bits::get_bits;
use super::descriptors::DescriptorKind;
use super::psi::PsiSection;
use super::table_id;

/// Transport stream entry in the NIT.
#[derive(Debug, Clone, Default)]
pub struct NitTransportStream {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    /// Transport descriptors.
    pub descriptors: Vec<DescriptorKind>,
}

/// Parsed NIT (Network Information Table).
#[derive(Debug, Clone, Default)]
pub struct NitTable {
    /// Network ID.
    pub network_id: u16,
    pub version_number: u8,
    /// Table ID 0x40.
    pub actual: bool,
    /// Network descriptors.
    pub network_descriptors: Vec<DescriptorKind>,
    /// Transport stream loop.
    pub transport_streams: Vec<NitTransportStream>,
}

impl NitTable {
    /// Parse a NIT from a PSI section.
    ///
    /// A network descriptor loop longer than the section is an error. A
    /// transport stream loop that runs past the section yields the network
    /// descriptors only, and an entry whose descriptors overrun the loop
    /// ends the loop; both are logged.
    pub fn parse(section: &PsiSection) -> Result<Self, &'static str> {
        let table = section.header.table_id;
        if table != table_id::NIT_ACTUAL && table != table_id::NIT_OTHER {
            return Err("Not a NIT section");
        }

        let network_id = section.header.table_id_extension;
        let data = section.data;

        let network_descriptors_length = get_bits(data, 4, 12) as usize;
        if data.len() < network_descriptors_length + 2 {
            warn!(
                "section too short: network_id == 0x{:04X}, section_length == {}, \
                 descriptors_loop_len == {}",
                network_id,
                data.len(),
                network_descriptors_length
            );
            return Err("Invalid network descriptors length");
        }

        let mut nit = NitTable {
            network_id,
            version_number: section.header.version_number,
            actual: table == table_id::NIT_ACTUAL,
            network_descriptors: DescriptorKind::parse_loop(
                &data[2..2 + network_descriptors_length],
            ),
            transport_streams: Vec::new(),
        };

        let rest = &data[2 + network_descriptors_length..];
        let ts_loop_length = get_bits(rest, 4, 12) as usize;
        if rest.len() < ts_loop_length + 2 {
            warn!(
                "section too short: network_id == 0x{:04X}, section_length == {}, \
                 streams_loop_len == {}",
                network_id,
                rest.len(),
                ts_loop_length
            );
            return Ok(nit);
        }

        let mut ts_loop = &rest[2..2 + ts_loop_length];
        while ts_loop.len() > 6 {
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

            nit.transport_streams.push(NitTransportStream {
                transport_stream_id,
                original_network_id: get_bits(ts_loop, 16, 16) as u16,
                descriptors: DescriptorKind::parse_loop(&ts_loop[6..6 + descriptors_length]),
            });

            ts_loop = &ts_loop[6 + descriptors_length..];
        }

        Ok(nit)
    }

    /// Network name from the network descriptors.
    pub fn network_name(&self) -> Option<&str> {
        self.network_descriptors.iter().find_map(|d| match d {
            DescriptorKind::NetworkName(name) => Some(name.as_str()),
            _ => None,
        })
    }
}
