//! PSI/SI table decoding.
//!
//! This module turns validated section payloads into typed tables.
//! Nothing here touches the transponder registry; applying a table to the
//! scan state happens in [`crate::scan`].
//!
//! # Supported Tables
//! - PAT (Program Association Table) - PID 0x0000
//! - PMT (Program Map Table) - PIDs announced by the PAT
//! - NIT (Network Information Table), actual and other - PID 0x0010
//! - SDT (Service Description Table), actual and other - PID 0x0011
//! - BAT (Bouquet Association Table) - PID 0x0011
//! - ATSC PSIP terrestrial and cable VCT - PID 0x1FFB

pub mod bat;
pub mod bits;
pub mod descriptors;
pub mod nit;
pub mod packet;
pub mod pat;
pub mod pmt;
pub mod psi;
pub mod sdt;
pub mod text;
pub mod vct;

pub use bat::{BatTable, BatTransportStream};
pub use bits::{bcd32_to_cpu, find_descriptor, get_bits, DescriptorLoop};
pub use descriptors::DescriptorKind;
pub use nit::{NitTable, NitTransportStream};
pub use pat::{PatEntry, PatTable};
pub use pmt::{ElementaryStream, PmtTable};
pub use psi::{PsiHeader, PsiSection};
pub use sdt::{SdtService, SdtTable};
pub use text::decode_text;
pub use vct::{VctChannel, VctTable};

/// Well-known PIDs.
pub mod pid {
    /// Program Association Table PID.
    pub const PAT: u16 = 0x0000;
    /// Network Information Table PID.
    pub const NIT: u16 = 0x0010;
    /// Service Description / Bouquet Association Table PID.
    pub const SDT_BAT: u16 = 0x0011;
    /// ATSC PSIP base PID.
    pub const ATSC_PSIP: u16 = 0x1FFB;
}

/// Table IDs.
pub mod table_id {
    /// Program Association Table.
    pub const PAT: u8 = 0x00;
    /// Program Map Table.
    pub const PMT: u8 = 0x02;
    /// NIT (actual network).
    pub const NIT_ACTUAL: u8 = 0x40;
    /// NIT (other network).
    pub const NIT_OTHER: u8 = 0x41;
    /// SDT (actual transport stream).
    pub const SDT_ACTUAL: u8 = 0x42;
    /// SDT (other transport stream).
    pub const SDT_OTHER: u8 = 0x46;
    /// Bouquet Association Table.
    pub const BAT: u8 = 0x4A;
    /// ATSC terrestrial virtual channel table.
    pub const ATSC_TVCT: u8 = 0xC8;
    /// ATSC cable virtual channel table.
    pub const ATSC_CVCT: u8 = 0xC9;
}

/// Descriptor tags.
pub mod descriptor_tag {
    /// CA descriptor.
    pub const CA: u8 = 0x09;
    /// ISO 639 language descriptor.
    pub const ISO_639_LANGUAGE: u8 = 0x0A;
    /// Network name descriptor.
    pub const NETWORK_NAME: u8 = 0x40;
    /// Service list descriptor.
    pub const SERVICE_LIST: u8 = 0x41;
    /// Satellite delivery system descriptor.
    pub const SATELLITE_DELIVERY: u8 = 0x43;
    /// Cable delivery system descriptor.
    pub const CABLE_DELIVERY: u8 = 0x44;
    /// Bouquet name descriptor.
    pub const BOUQUET_NAME: u8 = 0x47;
    /// Service descriptor.
    pub const SERVICE: u8 = 0x48;
    /// CA identifier descriptor.
    pub const CA_IDENTIFIER: u8 = 0x53;
    /// Teletext descriptor.
    pub const TELETEXT: u8 = 0x56;
    /// Subtitling descriptor.
    pub const SUBTITLING: u8 = 0x59;
    /// Terrestrial delivery system descriptor.
    pub const TERRESTRIAL_DELIVERY: u8 = 0x5A;
    /// Multilingual bouquet name descriptor.
    pub const MULTILINGUAL_BOUQUET_NAME: u8 = 0x5C;
    /// Frequency list descriptor.
    pub const FREQUENCY_LIST: u8 = 0x62;
    /// AC-3 descriptor.
    pub const AC3: u8 = 0x6A;
    /// S2 satellite delivery system descriptor.
    pub const S2_SATELLITE_DELIVERY: u8 = 0x79;
    /// Logical channel number descriptor (UK DTT, private range).
    pub const UK_CHANNEL_NUMBER: u8 = 0x83;
    /// Tricolor TV inline service list (private range).
    pub const TRICOLOR_SERVICE_LIST: u8 = 0x86;
    /// ATSC extended channel name descriptor.
    pub const ATSC_EXTENDED_CHANNEL_NAME: u8 = 0xA0;
    /// ATSC service location descriptor.
    pub const ATSC_SERVICE_LOCATION: u8 = 0xA1;
}
