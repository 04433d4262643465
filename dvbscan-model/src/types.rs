//! Tuning parameter enumerations and the transponder/service records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Maximum number of audio streams recorded per service.
pub const AUDIO_CHAN_MAX: usize = 32;

/// Maximum number of CA system ids recorded per service.
pub const CA_SYSTEM_ID_MAX: usize = 16;

/// Two frequencies closer than this are the same transponder.
pub const FREQUENCY_TOLERANCE: u32 = 2000;

/// Declares a tuning enumeration together with its textual name table.
///
/// The names are the ones accepted in initial tuning data files and printed
/// in log output. Matching is exact and case sensitive.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// All values, in name table order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Textual name of the value.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.name() == s)
                    .ok_or_else(|| ModelError::UnknownValue {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

named_enum! {
    /// Broadcast delivery system of a transponder.
    DeliverySystem, "delivery system" {
        /// Not yet known.
        Undefined => "UNDEFINED",
        /// DVB-C annex A/C.
        DvbCAnnexAC => "DVB-C",
        /// DVB-C annex B (J.83B).
        DvbCAnnexB => "DVB-C/B",
        /// DVB-T.
        DvbT => "DVB-T",
        /// DirecTV DSS.
        Dss => "DSS",
        /// DVB-S.
        DvbS => "DVB-S",
        /// DVB-S2.
        DvbS2 => "DVB-S2",
        /// ATSC (8VSB / QAM).
        Atsc => "ATSC",
        /// DVB-T2.
        DvbT2 => "DVB-T2",
    }
}

impl DeliverySystem {
    /// Numeric value of the system in the Linux DVB API.
    pub fn api_value(self) -> u32 {
        match self {
            DeliverySystem::Undefined => 0,
            DeliverySystem::DvbCAnnexAC => 1,
            DeliverySystem::DvbCAnnexB => 2,
            DeliverySystem::DvbT => 3,
            DeliverySystem::Dss => 4,
            DeliverySystem::DvbS => 5,
            DeliverySystem::DvbS2 => 6,
            DeliverySystem::Atsc => 11,
            DeliverySystem::DvbT2 => 16,
        }
    }

    /// Satellite systems carry polarisation and orbital position.
    pub fn is_satellite(self) -> bool {
        matches!(
            self,
            DeliverySystem::DvbS | DeliverySystem::DvbS2 | DeliverySystem::Dss
        )
    }
}

impl Default for DeliverySystem {
    fn default() -> Self {
        DeliverySystem::Undefined
    }
}

named_enum! {
    /// Modulation / constellation.
    Modulation, "modulation" {
        Qpsk => "QPSK",
        Qam16 => "QAM16",
        Qam32 => "QAM32",
        Qam64 => "QAM64",
        Qam128 => "QAM128",
        Qam256 => "QAM256",
        Auto => "AUTO",
        Vsb8 => "8VSB",
        Vsb16 => "16VSB",
        Psk8 => "8PSK",
        Apsk16 => "16APSK",
        Apsk32 => "32APSK",
    }
}

named_enum! {
    /// Inner forward error correction rate.
    CodeRate, "FEC" {
        None => "NONE",
        Fec1_2 => "1/2",
        Fec2_3 => "2/3",
        Fec3_4 => "3/4",
        Fec4_5 => "4/5",
        Fec5_6 => "5/6",
        Fec6_7 => "6/7",
        Fec7_8 => "7/8",
        Fec8_9 => "8/9",
        Auto => "AUTO",
        Fec3_5 => "3/5",
        Fec9_10 => "9/10",
    }
}

named_enum! {
    /// Terrestrial channel bandwidth.
    Bandwidth, "bandwidth" {
        Bw8Mhz => "8MHz",
        Bw7Mhz => "7MHz",
        Bw6Mhz => "6MHz",
        Auto => "AUTO",
        Bw5Mhz => "5MHz",
        Bw10Mhz => "10MHz",
    }
}

named_enum! {
    /// OFDM transmission mode (FFT size).
    TransmissionMode, "transmission mode" {
        Mode2k => "2k",
        Mode8k => "8k",
        Auto => "AUTO",
        Mode4k => "4k",
        Mode1k => "1k",
        Mode16k => "16k",
        Mode32k => "32k",
    }
}

named_enum! {
    /// OFDM guard interval.
    GuardInterval, "guard interval" {
        Gi1_32 => "1/32",
        Gi1_16 => "1/16",
        Gi1_8 => "1/8",
        Gi1_4 => "1/4",
        Auto => "AUTO",
        Gi1_128 => "1/128",
        Gi19_128 => "19/128",
        Gi19_256 => "19/256",
    }
}

named_enum! {
    /// DVB-T hierarchy information.
    Hierarchy, "hierarchy" {
        None => "NONE",
        Alpha1 => "1",
        Alpha2 => "2",
        Alpha4 => "4",
        Auto => "AUTO",
    }
}

named_enum! {
    /// DVB-S2 roll-off factor.
    Rolloff, "rolloff" {
        R35 => "35",
        R20 => "20",
        R25 => "25",
        Auto => "AUTO",
    }
}

named_enum! {
    /// Satellite polarisation, in descriptor bit order.
    Polarisation, "polarisation" {
        Horizontal => "H",
        Vertical => "V",
        CircularLeft => "L",
        CircularRight => "R",
    }
}

impl Polarisation {
    /// Map the two polarisation bits of a satellite delivery descriptor.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Polarisation::Horizontal,
            1 => Polarisation::Vertical,
            2 => Polarisation::CircularLeft,
            _ => Polarisation::CircularRight,
        }
    }
}

named_enum! {
    /// Spectral inversion.
    Inversion, "inversion" {
        Off => "OFF",
        On => "ON",
        Auto => "AUTO",
    }
}

impl Inversion {
    /// Map the numeric command line value (0 off, 1 on, 2 auto).
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Inversion::Off),
            1 => Some(Inversion::On),
            2 => Some(Inversion::Auto),
            _ => None,
        }
    }
}

/// SDT running status of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RunningStatus {
    #[default]
    Undefined,
    NotRunning,
    StartsSoon,
    Pausing,
    Running,
    OffAir,
    Reserved(u8),
}

impl RunningStatus {
    /// Decode the 3-bit running_status field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => RunningStatus::Undefined,
            1 => RunningStatus::NotRunning,
            2 => RunningStatus::StartsSoon,
            3 => RunningStatus::Pausing,
            4 => RunningStatus::Running,
            5 => RunningStatus::OffAir,
            other => RunningStatus::Reserved(other),
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RunningStatus::NotRunning => "not running",
            RunningStatus::StartsSoon => "starts soon",
            RunningStatus::Pausing => "pausing",
            RunningStatus::Running => "running",
            RunningStatus::OffAir => "off air",
            _ => "???",
        }
    }
}

/// Returns true when two frequencies fall within [`FREQUENCY_TOLERANCE`].
pub fn is_same_frequency(f1: u32, f2: u32) -> bool {
    f1.abs_diff(f2) < FREQUENCY_TOLERANCE
}

/// One audio elementary stream of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStream {
    /// Elementary PID.
    pub pid: u16,
    /// ISO-639 language code, empty when not signalled.
    pub language: String,
}

/// A broadcast service (channel) carried on one transponder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service ID (program_number), unique within the owning transponder.
    pub service_id: u16,
    /// Service type from the service descriptor.
    pub service_type: u8,
    /// Provider name (decoded).
    pub provider_name: Option<String>,
    /// Service name (decoded).
    pub service_name: Option<String>,
    /// PMT PID announced in the PAT.
    pub pmt_pid: u16,
    /// PCR PID.
    pub pcr_pid: u16,
    /// First video PID.
    pub video_pid: u16,
    /// Audio streams, in PMT order.
    pub audio: Vec<AudioStream>,
    /// AC-3 PID.
    pub ac3_pid: u16,
    /// Teletext PID.
    pub teletext_pid: u16,
    /// DVB subtitling PID.
    pub subtitling_pid: u16,
    /// Conditional access system IDs.
    pub ca_ids: Vec<u16>,
    /// Running status.
    pub running: RunningStatus,
    /// free_CA_mode flag from the SDT.
    pub scrambled: bool,
    /// Logical channel number (UK LCN or ATSC major << 10 | minor).
    pub channel_num: Option<u32>,
}

impl Service {
    pub fn new(service_id: u16) -> Self {
        Service {
            service_id,
            ..Default::default()
        }
    }

    /// PID of the first audio stream, or 0.
    pub fn primary_audio_pid(&self) -> u16 {
        self.audio.first().map(|a| a.pid).unwrap_or(0)
    }

    /// Service name, or an empty string when none was received.
    pub fn name(&self) -> &str {
        self.service_name.as_deref().unwrap_or("")
    }
}

/// A physical RF channel and the services discovered on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transponder {
    /// Network ID.
    pub network_id: u16,
    /// Original network ID.
    pub original_network_id: u16,
    /// Transport stream ID.
    pub transport_stream_id: u16,
    /// Frequency (Hz for terrestrial/cable, kHz for satellite).
    pub frequency: u32,
    /// Symbol rate.
    pub symbol_rate: u32,
    pub inversion: Inversion,
    /// Inner FEC (satellite / cable).
    pub fec: CodeRate,
    /// High priority stream code rate (terrestrial).
    pub fec_hp: CodeRate,
    /// Low priority stream code rate (terrestrial).
    pub fec_lp: CodeRate,
    pub modulation: Modulation,
    pub bandwidth: Bandwidth,
    pub hierarchy: Hierarchy,
    pub guard_interval: GuardInterval,
    pub transmission_mode: TransmissionMode,
    pub polarisation: Polarisation,
    /// Orbital position in tenths of a degree.
    pub orbital_position: u16,
    /// West/east flag (true = east).
    pub east: bool,
    pub delivery_system: DeliverySystem,
    pub rolloff: Rolloff,
    /// Stream / PLP id for multi-stream carriers.
    pub stream_id: Option<u8>,
    /// Tuning has been attempted.
    pub scan_done: bool,
    /// The last tuning attempt failed to lock.
    pub last_tuning_failed: bool,
    /// Record kept only to remember a frequency that did not lock.
    pub wrong_frequency: bool,
    /// Alternate frequencies are in use (terrestrial other_frequency_flag).
    pub other_frequency_flag: bool,
    /// Alternate frequencies not yet tried, consumed from the end.
    pub other_frequencies: Vec<u32>,
    /// Services, in discovery order.
    pub services: Vec<Service>,
}

impl Default for Transponder {
    fn default() -> Self {
        Transponder {
            network_id: 0,
            original_network_id: 0,
            transport_stream_id: 0,
            frequency: 0,
            symbol_rate: 0,
            inversion: Inversion::Auto,
            fec: CodeRate::Auto,
            fec_hp: CodeRate::Auto,
            fec_lp: CodeRate::Auto,
            modulation: Modulation::Auto,
            bandwidth: Bandwidth::Auto,
            hierarchy: Hierarchy::Auto,
            guard_interval: GuardInterval::Auto,
            transmission_mode: TransmissionMode::Auto,
            polarisation: Polarisation::Horizontal,
            orbital_position: 0,
            east: false,
            delivery_system: DeliverySystem::Undefined,
            rolloff: Rolloff::Auto,
            stream_id: None,
            scan_done: false,
            last_tuning_failed: false,
            wrong_frequency: false,
            other_frequency_flag: false,
            other_frequencies: Vec::new(),
            services: Vec::new(),
        }
    }
}

impl Transponder {
    pub fn new(frequency: u32) -> Self {
        Transponder {
            frequency,
            ..Default::default()
        }
    }

    /// Same physical transponder: frequency within tolerance, same
    /// polarisation and same stream id.
    pub fn is_same_transponder(&self, other: &Transponder) -> bool {
        is_same_frequency(self.frequency, other.frequency)
            && self.polarisation == other.polarisation
            && self.stream_id == other.stream_id
    }

    /// Merge the parameters of `src` into `self`.
    ///
    /// Identity, frequency, symbol rate and the status flags are always
    /// copied. The tunable fields (roll-off, FEC rates, modulation,
    /// bandwidth, hierarchy, guard interval, transmission mode) are copied
    /// only when `override_known` is set or the current value is AUTO.
    /// Services are left untouched.
    pub fn merge_from(&mut self, src: &Transponder, override_known: bool) {
        self.network_id = src.network_id;
        self.original_network_id = src.original_network_id;
        self.transport_stream_id = src.transport_stream_id;
        self.frequency = src.frequency;
        self.symbol_rate = src.symbol_rate;
        self.inversion = src.inversion;

        if override_known || self.rolloff == Rolloff::Auto {
            self.rolloff = src.rolloff;
        }
        if override_known || self.fec == CodeRate::Auto {
            self.fec = src.fec;
        }
        if override_known || self.fec_hp == CodeRate::Auto {
            self.fec_hp = src.fec_hp;
        }
        if override_known || self.fec_lp == CodeRate::Auto {
            self.fec_lp = src.fec_lp;
        }
        if override_known || self.modulation == Modulation::Auto {
            self.modulation = src.modulation;
        }
        if override_known || self.bandwidth == Bandwidth::Auto {
            self.bandwidth = src.bandwidth;
        }
        if override_known || self.hierarchy == Hierarchy::Auto {
            self.hierarchy = src.hierarchy;
        }
        if override_known || self.guard_interval == GuardInterval::Auto {
            self.guard_interval = src.guard_interval;
        }
        if override_known || self.transmission_mode == TransmissionMode::Auto {
            self.transmission_mode = src.transmission_mode;
        }

        self.polarisation = src.polarisation;
        self.orbital_position = src.orbital_position;
        self.delivery_system = src.delivery_system;
        self.east = src.east;
        self.scan_done = src.scan_done;
        self.last_tuning_failed = src.last_tuning_failed;
        self.other_frequency_flag = src.other_frequency_flag;
        self.other_frequencies = src.other_frequencies.clone();
    }

    pub fn find_service(&self, service_id: u16) -> Option<&Service> {
        self.services.iter().find(|s| s.service_id == service_id)
    }

    pub fn find_service_mut(&mut self, service_id: u16) -> Option<&mut Service> {
        self.services.iter_mut().find(|s| s.service_id == service_id)
    }

    /// Find a service by id, appending a new one if it is not known yet.
    pub fn service_entry(&mut self, service_id: u16) -> &mut Service {
        let index = match self.services.iter().position(|s| s.service_id == service_id) {
            Some(index) => index,
            None => {
                self.services.push(Service::new(service_id));
                self.services.len() - 1
            }
        };
        &mut self.services[index]
    }
}
