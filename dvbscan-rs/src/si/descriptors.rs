//! Descriptor decoding.
//!
//! Each descriptor tag the scanner understands maps to one variant of
//! [`DescriptorKind`] carrying a typed payload. Payload slices passed to
//! the parsers exclude the tag and length bytes.

use dvbscan_model::{
    Bandwidth, CodeRate, GuardInterval, Hierarchy, Modulation, Polarisation, Rolloff,
    TransmissionMode,
};
use log::debug;

use super::bits::{bcd32_to_cpu, get_bits, DescriptorLoop};
use super::descriptor_tag as tag;
use super::text::decode_text;

/// A decoded descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorKind {
    NetworkName(String),
    ServiceList(Vec<ServiceListEntry>),
    SatelliteDelivery(SatelliteDelivery),
    CableDelivery(CableDelivery),
    TerrestrialDelivery(TerrestrialDelivery),
    S2SatelliteDelivery(S2SatelliteDelivery),
    BouquetName(String),
    Service(ServiceDescriptor),
    CaIdentifier(CaIdentifier),
    Ca(CaDescriptor),
    Iso639Language(String),
    Teletext,
    Subtitling,
    Ac3,
    MultilingualBouquetName(Vec<MultilingualName>),
    FrequencyList(FrequencyList),
    UkChannelNumbers(Vec<LogicalChannel>),
    TricolorServiceList(Vec<TricolorService>),
    AtscServiceLocation(ServiceLocation),
    AtscExtendedChannelName(ExtendedChannelName),
    Unknown { tag: u8, data: Vec<u8> },
}

impl DescriptorKind {
    /// Decode one descriptor payload.
    pub fn parse(descriptor_tag: u8, payload: &[u8]) -> Result<Self, &'static str> {
        let kind = match descriptor_tag {
            tag::CA => DescriptorKind::Ca(CaDescriptor::parse(payload)?),
            tag::ISO_639_LANGUAGE => {
                if payload.len() < 4 {
                    return Err("ISO 639 descriptor too short");
                }
                DescriptorKind::Iso639Language(String::from_utf8_lossy(&payload[..3]).into_owned())
            }
            tag::NETWORK_NAME => DescriptorKind::NetworkName(decode_text(payload)),
            tag::SERVICE_LIST => DescriptorKind::ServiceList(
                payload
                    .chunks_exact(3)
                    .map(|c| ServiceListEntry {
                        service_id: u16::from_be_bytes([c[0], c[1]]),
                        service_type: c[2],
                    })
                    .collect(),
            ),
            tag::SATELLITE_DELIVERY => {
                DescriptorKind::SatelliteDelivery(SatelliteDelivery::parse(payload)?)
            }
            tag::CABLE_DELIVERY => DescriptorKind::CableDelivery(CableDelivery::parse(payload)?),
            tag::TERRESTRIAL_DELIVERY => {
                DescriptorKind::TerrestrialDelivery(TerrestrialDelivery::parse(payload)?)
            }
            tag::S2_SATELLITE_DELIVERY => {
                DescriptorKind::S2SatelliteDelivery(S2SatelliteDelivery::parse(payload)?)
            }
            tag::BOUQUET_NAME => DescriptorKind::BouquetName(decode_text(payload)),
            tag::SERVICE => DescriptorKind::Service(ServiceDescriptor::parse(payload)?),
            tag::CA_IDENTIFIER => DescriptorKind::CaIdentifier(CaIdentifier::parse(payload)),
            tag::TELETEXT => DescriptorKind::Teletext,
            tag::SUBTITLING => DescriptorKind::Subtitling,
            tag::AC3 => DescriptorKind::Ac3,
            tag::MULTILINGUAL_BOUQUET_NAME => {
                DescriptorKind::MultilingualBouquetName(MultilingualName::parse_list(payload))
            }
            tag::FREQUENCY_LIST => DescriptorKind::FrequencyList(FrequencyList::parse(payload)?),
            tag::UK_CHANNEL_NUMBER => DescriptorKind::UkChannelNumbers(
                payload
                    .chunks_exact(4)
                    .map(|c| LogicalChannel {
                        service_id: u16::from_be_bytes([c[0], c[1]]),
                        channel_number: ((c[2] as u16 & 0x03) << 8) | c[3] as u16,
                    })
                    .collect(),
            ),
            tag::TRICOLOR_SERVICE_LIST => DescriptorKind::TricolorServiceList(
                payload
                    .chunks_exact(6)
                    .map(|c| TricolorService {
                        transport_stream_id: u16::from_be_bytes([c[0], c[1]]),
                        original_network_id: u16::from_be_bytes([c[2], c[3]]),
                        service_id: u16::from_be_bytes([c[4], c[5]]),
                    })
                    .collect(),
            ),
            tag::ATSC_SERVICE_LOCATION => {
                DescriptorKind::AtscServiceLocation(ServiceLocation::parse(payload)?)
            }
            tag::ATSC_EXTENDED_CHANNEL_NAME => {
                DescriptorKind::AtscExtendedChannelName(ExtendedChannelName::parse(payload)?)
            }
            other => DescriptorKind::Unknown {
                tag: other,
                data: payload.to_vec(),
            },
        };
        Ok(kind)
    }

    /// Decode every descriptor of a loop. Descriptors that fail to decode
    /// are dropped.
    pub fn parse_loop(data: &[u8]) -> Vec<DescriptorKind> {
        DescriptorLoop::new(data)
            .filter_map(|(t, payload)| match DescriptorKind::parse(t, payload) {
                Ok(kind) => Some(kind),
                Err(e) => {
                    debug!("skip descriptor 0x{:02X}: {}", t, e);
                    None
                }
            })
            .collect()
    }

    /// Tag byte this descriptor was decoded from.
    pub fn tag(&self) -> u8 {
        match self {
            DescriptorKind::NetworkName(_) => tag::NETWORK_NAME,
            DescriptorKind::ServiceList(_) => tag::SERVICE_LIST,
            DescriptorKind::SatelliteDelivery(_) => tag::SATELLITE_DELIVERY,
            DescriptorKind::CableDelivery(_) => tag::CABLE_DELIVERY,
            DescriptorKind::TerrestrialDelivery(_) => tag::TERRESTRIAL_DELIVERY,
            DescriptorKind::S2SatelliteDelivery(_) => tag::S2_SATELLITE_DELIVERY,
            DescriptorKind::BouquetName(_) => tag::BOUQUET_NAME,
            DescriptorKind::Service(_) => tag::SERVICE,
            DescriptorKind::CaIdentifier(_) => tag::CA_IDENTIFIER,
            DescriptorKind::Ca(_) => tag::CA,
            DescriptorKind::Iso639Language(_) => tag::ISO_639_LANGUAGE,
            DescriptorKind::Teletext => tag::TELETEXT,
            DescriptorKind::Subtitling => tag::SUBTITLING,
            DescriptorKind::Ac3 => tag::AC3,
            DescriptorKind::MultilingualBouquetName(_) => tag::MULTILINGUAL_BOUQUET_NAME,
            DescriptorKind::FrequencyList(_) => tag::FREQUENCY_LIST,
            DescriptorKind::UkChannelNumbers(_) => tag::UK_CHANNEL_NUMBER,
            DescriptorKind::TricolorServiceList(_) => tag::TRICOLOR_SERVICE_LIST,
            DescriptorKind::AtscServiceLocation(_) => tag::ATSC_SERVICE_LOCATION,
            DescriptorKind::AtscExtendedChannelName(_) => tag::ATSC_EXTENDED_CHANNEL_NAME,
            DescriptorKind::Unknown { tag, .. } => *tag,
        }
    }
}

/// Service list descriptor entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceListEntry {
    pub service_id: u16,
    pub service_type: u8,
}

/// Satellite delivery system descriptor (0x43).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatelliteDelivery {
    /// Frequency in kHz.
    pub frequency: u32,
    /// Orbital position in tenths of a degree.
    pub orbital_position: u16,
    pub east: bool,
    pub polarisation: Polarisation,
    /// Roll-off, `None` for the reserved code.
    pub rolloff: Option<Rolloff>,
    /// modulation_system: DVB-S2 when set.
    pub s2: bool,
    pub modulation: Modulation,
    /// Symbol rate in symbols per second.
    pub symbol_rate: u32,
    /// Inner FEC, `None` for reserved codes.
    pub fec: Option<CodeRate>,
}

impl SatelliteDelivery {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        if p.len() < 11 {
            return Err("Satellite delivery descriptor too short");
        }

        let rolloff = match get_bits(p, 51, 2) {
            0 => Some(Rolloff::R35),
            1 => Some(Rolloff::R25),
            2 => Some(Rolloff::R20),
            _ => None,
        };

        let modulation = match get_bits(p, 54, 2) {
            0 => Modulation::Auto,
            1 => Modulation::Qpsk,
            2 => Modulation::Psk8,
            _ => Modulation::Qam16,
        };

        let fec = match p[10] & 0x0F {
            0 => Some(CodeRate::Auto),
            1 => Some(CodeRate::Fec1_2),
            2 => Some(CodeRate::Fec2_3),
            3 => Some(CodeRate::Fec3_4),
            4 => Some(CodeRate::Fec5_6),
            5 => Some(CodeRate::Fec7_8),
            6 => Some(CodeRate::Fec8_9),
            7 => Some(CodeRate::Fec3_5),
            8 => Some(CodeRate::Fec4_5),
            9 => Some(CodeRate::Fec9_10),
            15 => Some(CodeRate::None),
            _ => None,
        };

        Ok(SatelliteDelivery {
            frequency: 10 * bcd32_to_cpu(p[0], p[1], p[2], p[3]),
            orbital_position: bcd32_to_cpu(0, 0, p[4], p[5]) as u16,
            east: p[6] >> 7 != 0,
            polarisation: Polarisation::from_bits(p[6] >> 5),
            rolloff,
            s2: get_bits(p, 53, 1) != 0,
            modulation,
            symbol_rate: 10 * bcd32_to_cpu(p[7], p[8], p[9], p[10] & 0xF0),
            fec,
        })
    }
}

/// Cable delivery system descriptor (0x44).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CableDelivery {
    /// Frequency in Hz.
    pub frequency: u32,
    pub modulation: Modulation,
    pub symbol_rate: u32,
    pub fec: CodeRate,
}

impl CableDelivery {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        const FEC: [CodeRate; 8] = [
            CodeRate::Auto,
            CodeRate::Fec1_2,
            CodeRate::Fec2_3,
            CodeRate::Fec3_4,
            CodeRate::Fec5_6,
            CodeRate::Fec7_8,
            CodeRate::None,
            CodeRate::None,
        ];
        const QAM: [Modulation; 6] = [
            Modulation::Auto,
            Modulation::Qam16,
            Modulation::Qam32,
            Modulation::Qam64,
            Modulation::Qam128,
            Modulation::Qam256,
        ];

        if p.len() < 11 {
            return Err("Cable delivery descriptor too short");
        }

        Ok(CableDelivery {
            frequency: bcd32_to_cpu(p[0], p[1], p[2], p[3]).saturating_mul(100),
            modulation: QAM
                .get((p[6] & 0x0F) as usize)
                .copied()
                .unwrap_or(Modulation::Auto),
            symbol_rate: 10 * bcd32_to_cpu(p[7], p[8], p[9], p[10] & 0xF0),
            fec: FEC[(p[10] & 0x07) as usize],
        })
    }
}

/// Terrestrial delivery system descriptor (0x5A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrestrialDelivery {
    /// Centre frequency in Hz.
    pub frequency: u32,
    pub bandwidth: Bandwidth,
    pub modulation: Modulation,
    pub hierarchy: Hierarchy,
    pub fec_hp: CodeRate,
    pub fec_lp: CodeRate,
    pub guard_interval: GuardInterval,
    pub transmission_mode: TransmissionMode,
    pub other_frequency_flag: bool,
}

impl TerrestrialDelivery {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        fn code_rate(bits: u8) -> CodeRate {
            match bits {
                0 => CodeRate::Fec1_2,
                1 => CodeRate::Fec2_3,
                2 => CodeRate::Fec3_4,
                3 => CodeRate::Fec5_6,
                4 => CodeRate::Fec7_8,
                _ => CodeRate::Auto,
            }
        }

        if p.len() < 11 {
            return Err("Terrestrial delivery descriptor too short");
        }

        let bandwidth = match (p[4] >> 5) & 0x03 {
            0 => Bandwidth::Bw8Mhz,
            1 => Bandwidth::Bw7Mhz,
            2 => Bandwidth::Bw6Mhz,
            _ => Bandwidth::Bw5Mhz,
        };

        let modulation = match (p[5] >> 6) & 0x03 {
            0 => Modulation::Qpsk,
            1 => Modulation::Qam16,
            2 => Modulation::Qam64,
            _ => Modulation::Auto,
        };

        let hierarchy = match (p[5] >> 3) & 0x03 {
            0 => Hierarchy::None,
            1 => Hierarchy::Alpha1,
            2 => Hierarchy::Alpha2,
            _ => Hierarchy::Alpha4,
        };

        let guard_interval = match (p[6] >> 3) & 0x03 {
            0 => GuardInterval::Gi1_32,
            1 => GuardInterval::Gi1_16,
            2 => GuardInterval::Gi1_8,
            _ => GuardInterval::Gi1_4,
        };

        let transmission_mode = match (p[6] >> 1) & 0x03 {
            0 => TransmissionMode::Mode2k,
            1 => TransmissionMode::Mode8k,
            2 => TransmissionMode::Mode4k,
            _ => TransmissionMode::Auto,
        };

        Ok(TerrestrialDelivery {
            frequency: u32::from_be_bytes([p[0], p[1], p[2], p[3]]).saturating_mul(10),
            bandwidth,
            modulation,
            hierarchy,
            fec_hp: code_rate(p[5] & 0x07),
            fec_lp: code_rate((p[6] >> 5) & 0x07),
            guard_interval,
            transmission_mode,
            other_frequency_flag: p[6] & 0x01 != 0,
        })
    }
}

/// S2 satellite delivery system descriptor (0x79).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct S2SatelliteDelivery {
    pub scrambling_sequence_index: Option<u32>,
    /// Input stream identifier when multiple input streams are signalled.
    pub input_stream_id: Option<u8>,
}

impl S2SatelliteDelivery {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        let Some(&flags) = p.first() else {
            return Err("S2 delivery descriptor too short");
        };
        let mut offset = 1;

        let scrambling_sequence_index = if flags & 0x80 != 0 {
            if p.len() < offset + 3 {
                return Err("S2 delivery descriptor too short");
            }
            let index = get_bits(&p[offset..], 6, 18);
            offset += 3;
            Some(index)
        } else {
            None
        };

        let input_stream_id = if flags & 0x40 != 0 {
            Some(*p.get(offset).ok_or("S2 delivery descriptor too short")?)
        } else {
            None
        };

        Ok(S2SatelliteDelivery {
            scrambling_sequence_index,
            input_stream_id,
        })
    }
}

/// Service descriptor (0x48).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub service_type: u8,
    pub provider_name: String,
    pub service_name: String,
}

impl ServiceDescriptor {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        const SHORT: &str = "Service descriptor too short";

        let service_type = *p.first().ok_or(SHORT)?;
        let provider_len = *p.get(1).ok_or(SHORT)? as usize;
        let provider = p.get(2..2 + provider_len).ok_or(SHORT)?;

        let name_at = 2 + provider_len;
        let name_len = *p.get(name_at).ok_or(SHORT)? as usize;
        let name = p.get(name_at + 1..name_at + 1 + name_len).ok_or(SHORT)?;

        Ok(ServiceDescriptor {
            service_type,
            provider_name: decode_text(provider),
            service_name: decode_text(name),
        })
    }
}

/// CA identifier descriptor (0x53).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaIdentifier {
    pub ca_system_ids: Vec<u16>,
}

impl CaIdentifier {
    pub fn parse(p: &[u8]) -> Self {
        CaIdentifier {
            ca_system_ids: p
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect(),
        }
    }
}

/// CA descriptor (0x09).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaDescriptor {
    pub ca_system_id: u16,
    pub ca_pid: u16,
}

impl CaDescriptor {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        if p.len() < 4 {
            return Err("CA descriptor too short");
        }
        Ok(CaDescriptor {
            ca_system_id: u16::from_be_bytes([p[0], p[1]]),
            ca_pid: ((p[2] as u16 & 0x1F) << 8) | p[3] as u16,
        })
    }
}

/// One entry of a multilingual bouquet name descriptor (0x5C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultilingualName {
    /// ISO 639-2 language code.
    pub language: String,
    pub name: String,
}

impl MultilingualName {
    fn parse_list(mut p: &[u8]) -> Vec<Self> {
        let mut names = Vec::new();
        while p.len() >= 4 {
            let language = String::from_utf8_lossy(&p[..3]).into_owned();
            let len = (p[3] as usize).min(p.len() - 4);
            names.push(MultilingualName {
                language,
                name: decode_text(&p[4..4 + len]),
            });
            p = &p[4 + len..];
        }
        names
    }
}

/// Frequency list descriptor (0x62).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyList {
    /// 1 satellite, 2 cable, 3 terrestrial.
    pub coding_type: u8,
    /// Raw centre frequencies scaled to Hz for terrestrial coding.
    pub frequencies: Vec<u32>,
}

impl FrequencyList {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        let Some((&first, rest)) = p.split_first() else {
            return Err("Frequency list descriptor too short");
        };
        Ok(FrequencyList {
            coding_type: first & 0x03,
            frequencies: rest
                .chunks_exact(4)
                .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]).saturating_mul(10))
                .collect(),
        })
    }

    /// Only terrestrial coding carries plain binary frequencies.
    pub fn is_terrestrial(&self) -> bool {
        self.coding_type == 3
    }
}

/// Logical channel number record (UK DTT, 0x83).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalChannel {
    pub service_id: u16,
    pub channel_number: u16,
}

/// Tricolor TV inline service list record (0x86).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TricolorService {
    pub transport_stream_id: u16,
    pub original_network_id: u16,
    pub service_id: u16,
}

/// ATSC service location element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLocationElement {
    pub stream_type: u8,
    pub elementary_pid: u16,
    /// ISO 639 language, empty when all three bytes are zero.
    pub language: String,
}

/// ATSC service location descriptor (0xA1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceLocation {
    pub pcr_pid: u16,
    pub elements: Vec<ServiceLocationElement>,
}

impl ServiceLocation {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        if p.len() < 3 {
            return Err("Service location descriptor too short");
        }

        let count = p[2] as usize;
        let elements = p[3..]
            .chunks_exact(6)
            .take(count)
            .map(|e| ServiceLocationElement {
                stream_type: e[0],
                elementary_pid: ((e[1] as u16 & 0x1F) << 8) | e[2] as u16,
                language: e[3..6]
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| b as char)
                    .collect(),
            })
            .collect();

        Ok(ServiceLocation {
            pcr_pid: ((p[0] as u16 & 0x1F) << 8) | p[1] as u16,
            elements,
        })
    }
}

/// One segment of an ATSC multiple string structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringSegment {
    pub language: String,
    pub compression_type: u8,
    pub mode: u8,
    pub bytes: Vec<u8>,
}

/// ATSC extended channel name descriptor (0xA0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedChannelName {
    pub segments: Vec<StringSegment>,
}

impl ExtendedChannelName {
    pub fn parse(p: &[u8]) -> Result<Self, &'static str> {
        const SHORT: &str = "Extended channel name descriptor too short";

        let num_strings = *p.first().ok_or(SHORT)?;
        let mut at = 1;
        let mut segments = Vec::new();

        for _ in 0..num_strings {
            let header = p.get(at..at + 4).ok_or(SHORT)?;
            let language = String::from_utf8_lossy(&header[..3]).into_owned();
            let num_segments = header[3];
            at += 4;

            for _ in 0..num_segments {
                let seg = p.get(at..at + 3).ok_or(SHORT)?;
                let (compression_type, mode, len) = (seg[0], seg[1], seg[2] as usize);
                let bytes = p.get(at + 3..at + 3 + len).ok_or(SHORT)?;
                segments.push(StringSegment {
                    language: language.clone(),
                    compression_type,
                    mode,
                    bytes: bytes.to_vec(),
                });
                at += 3 + len;
            }
        }

        Ok(ExtendedChannelName { segments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_satellite_delivery() {
        // Astra 19.2E, 11.778 GHz V, 27500 kS/s, DVB-S2 8PSK 3/4, roll-off 0.35
        let payload = [
            0x01, 0x17, 0x78, 0x00, // frequency (BCD, 10 kHz units)
            0x01, 0x92, // orbital position 19.2
            0b1010_0110, // east, vertical, roll-off 0.35, S2, 8PSK
            0x02, 0x75, 0x00, 0x03, // symbol rate (BCD) + FEC 3/4
        ];

        let sat = SatelliteDelivery::parse(&payload).unwrap();
        assert_eq!(sat.frequency, 11_778_000);
        assert_eq!(sat.orbital_position, 192);
        assert!(sat.east);
        assert_eq!(sat.polarisation, Polarisation::Vertical);
        assert!(sat.s2);
        assert_eq!(sat.rolloff, Some(Rolloff::R35));
        assert_eq!(sat.modulation, Modulation::Psk8);
        assert_eq!(sat.symbol_rate, 27_500_000);
        assert_eq!(sat.fec, Some(CodeRate::Fec3_4));
    }

    #[test]
    fn test_parse_satellite_delivery_dvbs() {
        let payload = [
            0x01, 0x23, 0x45, 0x00, //
            0x01, 0x30, // 13.0
            0b0000_1001, // west, horizontal, roll-off 25, DVB-S, QPSK
            0x02, 0x75, 0x00, 0x0F, // FEC none
        ];

        let sat = SatelliteDelivery::parse(&payload).unwrap();
        assert!(!sat.east);
        assert!(!sat.s2);
        assert_eq!(sat.polarisation, Polarisation::Horizontal);
        assert_eq!(sat.rolloff, Some(Rolloff::R25));
        assert_eq!(sat.modulation, Modulation::Qpsk);
        assert_eq!(sat.fec, Some(CodeRate::None));
        assert!(SatelliteDelivery::parse(&payload[..10]).is_err());
    }

    #[test]
    fn test_parse_cable_delivery() {
        let payload = [
            0x03, 0x46, 0x00, 0x00, // 0346.0000 MHz
            0xFF, 0xF2, // reserved, FEC outer
            0x03, // 64-QAM
            0x00, 0x69, 0x00, 0x03, // 6900 kS/s, FEC 3/4
        ];

        let cable = CableDelivery::parse(&payload).unwrap();
        assert_eq!(cable.frequency, 346_000_000);
        assert_eq!(cable.modulation, Modulation::Qam64);
        assert_eq!(cable.symbol_rate, 6_900_000);
        assert_eq!(cable.fec, CodeRate::Fec3_4);

        let mut reserved = payload;
        reserved[6] = 0x07;
        reserved[10] = 0x06;
        let cable = CableDelivery::parse(&reserved).unwrap();
        assert_eq!(cable.modulation, Modulation::Auto);
        assert_eq!(cable.fec, CodeRate::None);
    }

    #[test]
    fn test_parse_terrestrial_delivery() {
        let payload = [
            0x02, 0xD3, 0x44, 0x40, // 474 MHz in 10 Hz units
            0b0001_1111, // 8 MHz
            0b1000_0010, // 64-QAM, hierarchy none, HP 3/4
            0b1110_0011, // LP auto, 1/32, 8k, other frequencies
            0xFF, 0xFF, 0xFF, 0xFF,
        ];

        let t = TerrestrialDelivery::parse(&payload).unwrap();
        assert_eq!(t.frequency, 474_000_000);
        assert_eq!(t.bandwidth, Bandwidth::Bw8Mhz);
        assert_eq!(t.modulation, Modulation::Qam64);
        assert_eq!(t.hierarchy, Hierarchy::None);
        assert_eq!(t.fec_hp, CodeRate::Fec3_4);
        assert_eq!(t.fec_lp, CodeRate::Auto);
        assert_eq!(t.guard_interval, GuardInterval::Gi1_32);
        assert_eq!(t.transmission_mode, TransmissionMode::Mode8k);
        assert!(t.other_frequency_flag);
    }

    #[test]
    fn test_parse_s2_delivery() {
        let s2 = S2SatelliteDelivery::parse(&[0x40, 0x05]).unwrap();
        assert_eq!(s2.input_stream_id, Some(5));
        assert_eq!(s2.scrambling_sequence_index, None);

        let s2 = S2SatelliteDelivery::parse(&[0xC0, 0x00, 0x01, 0x02, 0x07]).unwrap();
        assert_eq!(s2.scrambling_sequence_index, Some(0x0102));
        assert_eq!(s2.input_stream_id, Some(7));

        assert!(S2SatelliteDelivery::parse(&[0x40]).is_err());
    }

    #[test]
    fn test_parse_service_descriptor() {
        let payload = [
            0x01, // digital television
            0x03, b'B', b'B', b'C', // provider
            0x07, b'B', b'B', b'C', b' ', b'O', b'N', b'E', // service name
        ];

        let sd = ServiceDescriptor::parse(&payload).unwrap();
        assert_eq!(sd.service_type, 0x01);
        assert_eq!(sd.provider_name, "BBC");
        assert_eq!(sd.service_name, "BBC ONE");

        // service name length runs past the end
        assert!(ServiceDescriptor::parse(&payload[..10]).is_err());
    }

    #[test]
    fn test_parse_frequency_list() {
        let payload = [
            0xFF, // coding type 3 (terrestrial)
            0x02, 0xD3, 0x44, 0x40, //
            0x03, 0x10, 0x4D, 0x40,
        ];

        let list = FrequencyList::parse(&payload).unwrap();
        assert!(list.is_terrestrial());
        assert_eq!(list.frequencies, vec![474_000_000, 514_000_000]);
    }

    #[test]
    fn test_parse_uk_channel_numbers() {
        let payload = [
            0x10, 0xBF, 0xFC, 0x01, // sid 0x10BF -> LCN 1
            0x11, 0x00, 0xFE, 0x65, // sid 0x1100 -> LCN 613
        ];

        let kind = DescriptorKind::parse(tag::UK_CHANNEL_NUMBER, &payload).unwrap();
        assert_eq!(
            kind,
            DescriptorKind::UkChannelNumbers(vec![
                LogicalChannel {
                    service_id: 0x10BF,
                    channel_number: 1
                },
                LogicalChannel {
                    service_id: 0x1100,
                    channel_number: 613
                },
            ])
        );
    }

    #[test]
    fn test_parse_multilingual_bouquet_name() {
        let payload = [
            b'e', b'n', b'g', 0x04, b'S', b'k', b'y', b'!', //
            b'd', b'e', b'u', 0x03, b'S', b'k', b'y',
        ];

        let names = MultilingualName::parse_list(&payload);
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].language, "eng");
        assert_eq!(names[0].name, "Sky!");
        assert_eq!(names[1].language, "deu");
        assert_eq!(names[1].name, "Sky");
    }

    #[test]
    fn test_parse_ca_descriptors() {
        let ca = CaDescriptor::parse(&[0x09, 0x8C, 0xE1, 0x23]).unwrap();
        assert_eq!(ca.ca_system_id, 0x098C);
        assert_eq!(ca.ca_pid, 0x0123);
        assert!(CaDescriptor::parse(&[0x09, 0x8C, 0xE1]).is_err());

        let ids = CaIdentifier::parse(&[0x09, 0x8C, 0x18, 0x02, 0xFF]);
        assert_eq!(ids.ca_system_ids, vec![0x098C, 0x1802]);
    }

    #[test]
    fn test_parse_service_location() {
        let payload = [
            0xE0, 0x31, // PCR PID 0x31
            0x02, // two elements
            0x02, 0xE0, 0x31, 0x00, 0x00, 0x00, // video
            0x81, 0xE0, 0x34, b'e', b'n', b'g', // AC-3 audio
        ];

        let sl = ServiceLocation::parse(&payload).unwrap();
        assert_eq!(sl.pcr_pid, 0x31);
        assert_eq!(sl.elements.len(), 2);
        assert_eq!(sl.elements[0].language, "");
        assert_eq!(sl.elements[1].elementary_pid, 0x34);
        assert_eq!(sl.elements[1].language, "eng");
    }

    #[test]
    fn test_parse_extended_channel_name() {
        let payload = [
            0x01, // one string
            b'e', b'n', b'g', 0x01, // one segment
            0x00, 0x00, 0x04, b'W', b'G', b'B', b'H',
        ];

        let name = ExtendedChannelName::parse(&payload).unwrap();
        assert_eq!(name.segments.len(), 1);
        assert_eq!(name.segments[0].compression_type, 0);
        assert_eq!(name.segments[0].bytes, b"WGBH");

        assert!(ExtendedChannelName::parse(&payload[..8]).is_err());
    }

    #[test]
    fn test_parse_loop_keeps_unknown_and_drops_malformed() {
        let data = [
            0x56, 0x05, b'e', b'n', b'g', 0x09, 0x00, // teletext
            0x0A, 0x02, b'e', b'n', // ISO 639, too short
            0xF0, 0x01, 0x7F, // private
        ];

        let kinds = DescriptorKind::parse_loop(&data);
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[0], DescriptorKind::Teletext);
        assert_eq!(
            kinds[1],
            DescriptorKind::Unknown {
                tag: 0xF0,
                data: vec![0x7F]
            }
        );
        assert_eq!(kinds[1].tag(), 0xF0);
    }
}
