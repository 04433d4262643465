//! Applying decoded tables to the scan state.
//!
//! Every function here takes a parsed table and updates the transponder
//! being scanned, or for the NIT the registry as a whole. Filters a table
//! asks for, the PMTs announced in a PAT, are returned to the caller.

use dvbscan_model::{
    AudioStream, DeliverySystem, Rolloff, RunningStatus, Service, Transponder, AUDIO_CHAN_MAX,
    CA_SYSTEM_ID_MAX,
};
use log::{debug, error, info, warn};

use super::{ScanContext, ScanOptions};
use crate::demux::FilterSpec;
use crate::registry::TransponderRegistry;
use crate::si::descriptors::{ExtendedChannelName, LogicalChannel, ServiceLocation};
use crate::si::{
    descriptor_tag, table_id, BatTable, DescriptorKind, NitTable, PatTable, PmtTable, PsiSection,
    SdtTable, VctTable,
};

/// VCT service types.
const VCT_ANALOG_TV: u8 = 0x01;
const VCT_ATSC_TV: u8 = 0x02;
const VCT_ATSC_AUDIO: u8 = 0x03;

/// Stream types of the ATSC service location descriptor.
const ATSC_VIDEO_STREAM: u8 = 0x02;
const ATSC_AC3_STREAM: u8 = 0x81;

/// Decode `section` and apply it. Returns the filters it asks for.
pub fn apply_section(ctx: &mut ScanContext, section: &PsiSection) -> Vec<FilterSpec> {
    if ctx.registry.current().is_none() {
        warn!(
            "section 0x{:02X} received without a current transponder",
            section.header.table_id
        );
        return Vec::new();
    }

    match section.header.table_id {
        table_id::PAT => match PatTable::parse(section) {
            Ok(pat) => return apply_pat(ctx, &pat),
            Err(e) => warn!("PAT: {}", e),
        },
        table_id::PMT => match PmtTable::parse(section) {
            Ok(pmt) => apply_pmt(ctx, &pmt),
            Err(e) => warn!("PMT: {}", e),
        },
        table_id::NIT_ACTUAL | table_id::NIT_OTHER => match NitTable::parse(section) {
            Ok(nit) => apply_nit(ctx, &nit),
            Err(e) => warn!("NIT: {}", e),
        },
        table_id::SDT_ACTUAL | table_id::SDT_OTHER => match SdtTable::parse(section) {
            Ok(sdt) => apply_sdt(ctx, &sdt),
            Err(e) => warn!("SDT: {}", e),
        },
        table_id::BAT => match BatTable::parse(section) {
            Ok(bat) => {
                if let Some(engine) = ctx.bouquets.as_mut() {
                    engine.apply_bat(&bat);
                }
            }
            Err(e) => warn!("BAT: {}", e),
        },
        table_id::ATSC_TVCT | table_id::ATSC_CVCT => match VctTable::parse(section) {
            Ok(vct) => apply_vct(ctx, &vct),
            Err(e) => warn!("VCT: {}", e),
        },
        other => debug!("unhandled table_id 0x{:02X}", other),
    }
    Vec::new()
}

/// Record the PMT pid of every program and request its PMT once.
pub fn apply_pat(ctx: &mut ScanContext, pat: &PatTable) -> Vec<FilterSpec> {
    let long_timeout = ctx.options.long_timeout;
    let mut filters = Vec::new();
    for program in &pat.programs {
        let Some(t) = ctx.registry.current_mut() else {
            break;
        };
        info!("service_id = 0x{:X}", program.program_number);
        t.service_entry(program.program_number).pmt_pid = program.pmt_pid;
        info!("pmt_pid = 0x{:X}", program.pmt_pid);

        if program.pmt_pid != 0 && ctx.request_pmt(program.program_number) {
            filters.push(FilterSpec::pmt(
                program.pmt_pid,
                program.program_number,
                long_timeout,
            ));
        }
    }
    filters
}

fn add_ca_id(s: &mut Service, ca_system_id: u16) {
    if s.ca_ids.contains(&ca_system_id) {
        return;
    }
    if s.ca_ids.len() + 1 >= CA_SYSTEM_ID_MAX {
        warn!("TOO MANY CA SYSTEM IDs.");
        return;
    }
    info!("  CA ID     : PID 0x{:04X}", ca_system_id);
    s.ca_ids.push(ca_system_id);
}

fn add_audio(s: &mut Service, pid: u16, language: &str) {
    if s.audio.len() >= AUDIO_CHAN_MAX {
        warn!("more than {} audio channels, truncating", AUDIO_CHAN_MAX);
        return;
    }
    s.audio.push(AudioStream {
        pid,
        language: language.to_string(),
    });
}

/// Fill in the streams of a service announced in the PAT.
pub fn apply_pmt(ctx: &mut ScanContext, pmt: &PmtTable) {
    let Some(t) = ctx.registry.current_mut() else {
        return;
    };
    let tsid = t.transport_stream_id;
    let Some(s) = t.find_service_mut(pmt.program_number) else {
        error!(
            "PMT for service_id 0x{:04X} was not in PAT",
            pmt.program_number
        );
        return;
    };

    s.pcr_pid = pmt.pcr_pid;
    for d in &pmt.program_descriptors {
        if let DescriptorKind::Ca(ca) = d {
            add_ca_id(s, ca.ca_system_id);
        }
    }

    for es in &pmt.streams {
        if es.is_video() {
            if s.video_pid == 0 {
                s.video_pid = es.pid;
            }
            info!("  VIDEO     : PID 0x{:04X}", es.pid);
        } else if es.is_audio() {
            add_audio(s, es.pid, es.language().unwrap_or(""));
            for d in &es.descriptors {
                if let DescriptorKind::Ca(ca) = d {
                    add_ca_id(s, ca.ca_system_id);
                }
            }
            info!("  AUDIO     : PID 0x{:04X}", es.pid);
        } else if es.is_private_pes() && es.has(descriptor_tag::TELETEXT) {
            s.teletext_pid = es.pid;
            info!("  TELETEXT  : PID 0x{:04X}", es.pid);
        } else if es.is_private_pes() && es.has(descriptor_tag::SUBTITLING) {
            s.subtitling_pid = es.pid;
            info!("  SUBTITLING: PID 0x{:04X}", es.pid);
        } else if es.is_private_pes() && es.has(descriptor_tag::AC3) {
            s.ac3_pid = es.pid;
            info!("  AC3       : PID 0x{:04X}", es.pid);
        } else {
            info!(
                "  OTHER     : PID 0x{:04X} TYPE 0x{:02X}",
                es.pid, es.stream_type
            );
        }
    }

    let audio: Vec<String> = s
        .audio
        .iter()
        .map(|a| match a.language.as_str() {
            "" => format!("0x{:04X}", a.pid),
            lang => format!("0x{:04X} ({})", a.pid, lang),
        })
        .collect();
    debug!(
        "0x{:04X} 0x{:04X}: {} -- {}, pmt_pid 0x{:04X}, vpid 0x{:04X}, apid {}",
        tsid,
        s.service_id,
        s.provider_name.as_deref().unwrap_or(""),
        s.name(),
        s.pmt_pid,
        s.video_pid,
        audio.join(" ")
    );
}

/// Copy the tuning parameters of a delivery system descriptor into `t`.
/// Returns false for any other descriptor.
fn apply_delivery(t: &mut Transponder, d: &DescriptorKind, opts: &ScanOptions) -> bool {
    match d {
        DescriptorKind::SatelliteDelivery(sat) => {
            if sat.s2 {
                t.delivery_system = DeliverySystem::DvbS2;
                if let Some(rolloff) = sat.rolloff {
                    t.rolloff = rolloff;
                }
            } else {
                t.delivery_system = DeliverySystem::DvbS;
                if opts.tuning.noauto {
                    t.rolloff = Rolloff::R35;
                }
            }
            t.frequency = sat.frequency;
            if let Some(fec) = sat.fec {
                t.fec = fec;
            }
            t.symbol_rate = sat.symbol_rate;
            t.inversion = opts.tuning.inversion;
            t.polarisation = sat.polarisation;
            t.orbital_position = sat.orbital_position;
            t.east = sat.east;
            t.modulation = sat.modulation;
            debug!(
                "{} f={} {} {}.{}{} sr={} fec={}",
                t.delivery_system,
                t.frequency,
                t.polarisation,
                t.orbital_position / 10,
                t.orbital_position % 10,
                if t.east { 'E' } else { 'W' },
                t.symbol_rate,
                t.fec
            );
        }
        DescriptorKind::S2SatelliteDelivery(s2) => {
            t.delivery_system = DeliverySystem::DvbS2;
            if let Some(id) = s2.input_stream_id {
                t.stream_id = Some(id);
            }
        }
        DescriptorKind::CableDelivery(cable) => {
            t.delivery_system = DeliverySystem::DvbCAnnexAC;
            t.frequency = cable.frequency;
            t.fec = cable.fec;
            t.symbol_rate = cable.symbol_rate;
            t.modulation = cable.modulation;
            t.inversion = opts.tuning.inversion;
            debug!(
                "DVB-C f={} sr={} fec={} {}",
                t.frequency, t.symbol_rate, t.fec, t.modulation
            );
        }
        DescriptorKind::TerrestrialDelivery(ter) => {
            t.delivery_system = DeliverySystem::DvbT;
            t.frequency = ter.frequency;
            t.inversion = opts.tuning.inversion;
            t.bandwidth = ter.bandwidth;
            t.modulation = ter.modulation;
            t.hierarchy = ter.hierarchy;
            t.fec_hp = ter.fec_hp;
            t.fec_lp = ter.fec_lp;
            t.guard_interval = ter.guard_interval;
            t.transmission_mode = ter.transmission_mode;
            t.other_frequency_flag = ter.other_frequency_flag;
            debug!(
                "DVB-T f={} {} {} {} {}",
                t.frequency, t.bandwidth, t.modulation, t.transmission_mode, t.guard_interval
            );
        }
        _ => return false,
    }
    true
}

/// Apply UK logical channel numbers to every scanned service they name.
fn set_channel_numbers(registry: &mut TransponderRegistry, channels: &[LogicalChannel]) {
    for lcn in channels {
        for t in registry.scanned_mut() {
            for s in t.services.iter_mut().filter(|s| s.service_id == lcn.service_id) {
                s.channel_num = Some(u32::from(lcn.channel_number));
                debug!(
                    "Service ID 0x{:04X} has channel number {}",
                    lcn.service_id, lcn.channel_number
                );
            }
        }
    }
}

/// Merge the transport streams of a NIT into the registry.
pub fn apply_nit(ctx: &mut ScanContext, nit: &NitTable) {
    if nit.actual {
        if let Some(cur) = ctx.registry.current_mut() {
            cur.network_id = nit.network_id;
        }
    }

    for d in &nit.network_descriptors {
        match d {
            DescriptorKind::NetworkName(name) => info!("Network Name '{}'", name),
            DescriptorKind::UkChannelNumbers(channels) => {
                if ctx.options.uk_ordering {
                    set_channel_numbers(&mut ctx.registry, channels);
                }
            }
            d if nit.actual => {
                if let Some(cur) = ctx.registry.current_mut() {
                    apply_delivery(cur, d, &ctx.options);
                }
            }
            d => {
                let mut probe = Transponder::default();
                if apply_delivery(&mut probe, d, &ctx.options) {
                    warn!("delivery system descriptor outside transport stream definition (ignored)");
                }
            }
        }
    }

    for ts in &nit.transport_streams {
        let mut tn = Transponder {
            network_id: nit.network_id,
            original_network_id: ts.original_network_id,
            transport_stream_id: ts.transport_stream_id,
            inversion: ctx.options.tuning.inversion,
            ..Default::default()
        };

        let mut located = false;
        for d in &ts.descriptors {
            match d {
                DescriptorKind::FrequencyList(list) => {
                    if list.is_terrestrial() && tn.other_frequencies.is_empty() {
                        tn.other_frequencies = list.frequencies.clone();
                    }
                }
                DescriptorKind::UkChannelNumbers(channels) => {
                    if ctx.options.uk_ordering {
                        set_channel_numbers(&mut ctx.registry, channels);
                    }
                }
                d => located |= apply_delivery(&mut tn, d, &ctx.options),
            }
        }
        if !located {
            debug!(
                "transport stream 0x{:04X} without delivery system descriptor",
                ts.transport_stream_id
            );
            continue;
        }

        match ctx.registry.find(tn.frequency, tn.polarisation) {
            Some(r) => ctx.registry.get_mut(r).merge_from(&tn, false),
            None if ctx.options.other_nits => {
                let satellite = ctx
                    .registry
                    .current()
                    .map_or(false, |cur| cur.delivery_system.is_satellite());
                if satellite {
                    // the legacy satellite descriptor cannot tell DVB-S from DVB-S2
                    for system in [DeliverySystem::DvbS, DeliverySystem::DvbS2] {
                        tn.delivery_system = system;
                        ctx.registry.allocate(tn.frequency).merge_from(&tn, true);
                    }
                } else {
                    ctx.registry.allocate(tn.frequency).merge_from(&tn, true);
                }
            }
            None => {}
        }
    }
}

/// Record names, running state and CA systems of the services.
pub fn apply_sdt(ctx: &mut ScanContext, sdt: &SdtTable) {
    let Some(t) = ctx.registry.current_mut() else {
        return;
    };
    if sdt.actual {
        t.transport_stream_id = sdt.transport_stream_id;
        t.original_network_id = sdt.original_network_id;
    }

    for entry in &sdt.services {
        let s = t.service_entry(entry.service_id);
        s.running = entry.running_status;
        s.scrambled = entry.scrambled;

        for d in &entry.descriptors {
            match d {
                DescriptorKind::Service(sd) => {
                    s.service_type = sd.service_type;
                    s.provider_name = Some(sd.provider_name.clone());
                    s.service_name = Some(sd.service_name.clone());
                    info!(
                        "0x{:04X} 0x{:04X}: pmt_pid 0x{:04X} {} -- {} ({}{})",
                        sdt.transport_stream_id,
                        s.service_id,
                        s.pmt_pid,
                        sd.provider_name,
                        sd.service_name,
                        s.running.description(),
                        if s.scrambled { ", scrambled" } else { "" }
                    );
                }
                DescriptorKind::CaIdentifier(ids) => {
                    s.ca_ids.clear();
                    for &id in &ids.ca_system_ids {
                        if s.ca_ids.len() >= CA_SYSTEM_ID_MAX {
                            warn!("too many CA system ids");
                            break;
                        }
                        s.ca_ids.push(id);
                        info!("  CA ID 0x{:04X}", id);
                    }
                }
                _ => {}
            }
        }
    }
}

fn apply_service_location(s: &mut Service, location: &ServiceLocation) {
    s.pcr_pid = location.pcr_pid;
    for element in &location.elements {
        match element.stream_type {
            ATSC_VIDEO_STREAM => {
                s.video_pid = element.elementary_pid;
                info!("  VIDEO     : PID 0x{:04X}", element.elementary_pid);
            }
            ATSC_AC3_STREAM => {
                add_audio(s, element.elementary_pid, &element.language);
                info!(
                    "  AUDIO     : PID 0x{:04X} lang: {}",
                    element.elementary_pid, element.language
                );
            }
            other => warn!("unhandled stream_type: {:X}", other),
        }
    }
}

fn apply_extended_name(s: &mut Service, name: &ExtendedChannelName) {
    for segment in &name.segments {
        if segment.compression_type != 0 {
            warn!("compressed strings are not supported yet");
            continue;
        }
        let text: String = segment.bytes.iter().map(|&b| char::from(b)).collect();
        s.service_name = Some(text);
    }
}

/// Turn the virtual channels of an ATSC VCT into services.
pub fn apply_vct(ctx: &mut ScanContext, vct: &VctTable) {
    let Some(t) = ctx.registry.current_mut() else {
        return;
    };
    let mut pseudo_id: u16 = 0xFFFF;

    for ch in &vct.channels {
        match ch.service_type {
            VCT_ATSC_TV | VCT_ATSC_AUDIO => {}
            VCT_ANALOG_TV => {
                info!("analog channels won't be put info channels.conf");
                continue;
            }
            other => {
                debug!("skipping VCT service type 0x{:02X}", other);
                continue;
            }
        }

        let service_id = if ch.program_number == 0 {
            pseudo_id -= 1;
            pseudo_id
        } else {
            ch.program_number
        };

        let s = t.service_entry(service_id);
        s.service_name = Some(ch.short_name.clone());

        for d in &ch.descriptors {
            match d {
                DescriptorKind::AtscServiceLocation(location) => {
                    apply_service_location(s, location)
                }
                DescriptorKind::AtscExtendedChannelName(name) => apply_extended_name(s, name),
                other => warn!("unhandled psip descriptor: {:02x}", other.tag()),
            }
        }

        s.channel_num = Some(ch.channel_number());
        if ch.hidden {
            s.running = RunningStatus::NotRunning;
            info!("service is not running, pseudo program_number.");
        } else {
            s.running = RunningStatus::Running;
            info!("service is running.");
        }
        info!(
            " Channel number: {}:{}. Name: '{}'",
            ch.major_channel_number,
            ch.minor_channel_number,
            s.name()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bouquet::{BouquetEngine, BouquetOptions};
    use crate::si::psi::seal_section;
    use dvbscan_model::{CodeRate, Modulation, Polarisation};

    fn context(options: ScanOptions, current: Transponder) -> ScanContext {
        let mut ctx = ScanContext::new(options);
        ctx.registry.push_current(current);
        ctx
    }

    fn apply(ctx: &mut ScanContext, raw: Vec<u8>) -> Vec<FilterSpec> {
        let raw = seal_section(raw);
        let section = PsiSection::parse(&raw).unwrap();
        apply_section(ctx, &section)
    }

    fn current(ctx: &ScanContext) -> &Transponder {
        ctx.registry.current().unwrap()
    }

    fn pat_section() -> Vec<u8> {
        vec![
            0x00, // table_id
            0xB0, 0x11, // syntax=1, section_length=17
            0x04, 0x02, // transport_stream_id
            0xC1, // version 0, current_next 1
            0x00, 0x00, // section 0 of 0
            0x00, 0x00, 0xE0, 0x10, // program 0 -> network PID 0x10
            0x01, 0x01, 0xE2, 0x00, // program 0x101 -> PID 0x200
        ]
    }

    fn pmt_section() -> Vec<u8> {
        vec![
            0x02, // table_id
            0xB0, 0x28, // syntax=1, section_length=40
            0x01, 0x01, // program_number
            0xC3, // version 1, current_next 1
            0x00, 0x00, // section 0 of 0
            0xE0, 0x44, // PCR PID 0x44
            0xF0, 0x06, // program_info_length = 6
            0x09, 0x04, 0x17, 0x02, 0xE1, 0x00, // CA descriptor, Betacrypt
            0x02, 0xE0, 0x44, 0xF0, 0x00, // video, PID 0x44
            // audio, PID 0x45, ISO 639 "eng"
            0x04, 0xE0, 0x45, 0xF0, 0x06, 0x0A, 0x04, b'e', b'n', b'g', 0x00,
            0x06, 0xE0, 0x47, 0xF0, 0x00, // private data without descriptors
        ]
    }

    #[test]
    fn test_pat_pmt_linkage() {
        let mut ctx = context(ScanOptions::default(), Transponder::new(506_000_000));

        let filters = apply(&mut ctx, pat_section());
        assert_eq!(filters.len(), 1);
        assert_eq!(filters[0].pid, 0x200);
        assert_eq!(filters[0].table_id_ext, Some(0x101));
        assert_eq!(current(&ctx).services.len(), 1);
        assert_eq!(current(&ctx).services[0].pmt_pid, 0x200);

        // a repeated PAT does not ask for the PMT again
        assert!(apply(&mut ctx, pat_section()).is_empty());

        assert!(apply(&mut ctx, pmt_section()).is_empty());
        let s = current(&ctx).find_service(0x101).unwrap();
        assert_eq!(s.pcr_pid, 0x44);
        assert_eq!(s.video_pid, 0x44);
        assert_eq!(s.audio.len(), 1);
        assert_eq!(s.audio[0].pid, 0x45);
        assert_eq!(s.audio[0].language, "eng");
        assert_eq!(s.ca_ids, vec![0x1702]);
        assert_eq!(s.teletext_pid, 0);
    }

    #[test]
    fn test_pmt_without_pat_entry() {
        let mut ctx = context(ScanOptions::default(), Transponder::new(506_000_000));
        apply(&mut ctx, pmt_section());
        assert!(current(&ctx).services.is_empty());
    }

    #[test]
    fn test_pmt_private_streams() {
        let mut ctx = context(ScanOptions::default(), Transponder::new(506_000_000));
        ctx.registry.current_mut().unwrap().service_entry(0x0102);
        apply(
            &mut ctx,
            vec![
                0x02, // table_id
                0xB0, 0x30, // syntax=1, section_length=48
                0x01, 0x02, // program_number
                0xC1, // version 0, current_next 1
                0x00, 0x00, // section 0 of 0
                0xE1, 0x00, // PCR PID 0x100
                0xF0, 0x00, // no program descriptors
                // private data, PID 0x104, AC-3
                0x06, 0xE1, 0x04, 0xF0, 0x03, 0x6A, 0x01, 0x00,
                // private data, PID 0x105, teletext
                0x06, 0xE1, 0x05, 0xF0, 0x07, 0x56, 0x05, b'd', b'e', b'u', 0x09, 0x00,
                // private data, PID 0x106, subtitling
                0x06, 0xE1, 0x06, 0xF0, 0x0A,
                // subtitling: "deu", type 0x10, composition page 1, ancillary page 1
                0x59, 0x08, b'd', b'e', b'u', 0x10, 0x00, 0x01, 0x00, 0x01,
            ],
        );
        let s = current(&ctx).find_service(0x0102).unwrap();
        assert_eq!(s.ac3_pid, 0x104);
        assert_eq!(s.teletext_pid, 0x105);
        assert_eq!(s.subtitling_pid, 0x106);
        assert!(s.audio.is_empty());
    }

    #[test]
    fn test_audio_channels_capped() {
        let mut s = Service::new(1);
        for pid in 0..(AUDIO_CHAN_MAX as u16 + 3) {
            add_audio(&mut s, 0x100 + pid, "");
        }
        assert_eq!(s.audio.len(), AUDIO_CHAN_MAX);
    }

    #[test]
    fn test_ca_ids_unique_and_capped() {
        let mut s = Service::new(1);
        add_ca_id(&mut s, 0x0500);
        add_ca_id(&mut s, 0x0500);
        assert_eq!(s.ca_ids, vec![0x0500]);
        for id in 0..40 {
            add_ca_id(&mut s, 0x1000 + id);
        }
        assert_eq!(s.ca_ids.len(), CA_SYSTEM_ID_MAX - 1);
    }

    fn sdt_section() -> Vec<u8> {
        vec![
            0x42, // table_id SDT actual
            0xF0, 0x20, // syntax=1, section_length=32
            0x04, 0x02, // transport_stream_id
            0xC1, // version 0, current_next 1
            0x00, 0x00, // section 0 of 0
            0x00, 0x01, // original_network_id
            0xFF, // reserved
            0x01, 0x01, // service_id
            0xFC, // EIT flags
            0x90, 0x0F, // running, scrambled, descriptors_loop_length = 15
            0x48, 0x09, // service descriptor
            0x01, // digital television
            0x02, b'O', b'P', // provider
            0x04, b'O', b'N', b'E', b'!', //
            0x53, 0x02, 0x17, 0x02, // CA identifier
        ]
    }

    #[test]
    fn test_sdt_names_services() {
        let mut ctx = context(ScanOptions::default(), Transponder::new(506_000_000));
        ctx.registry.current_mut().unwrap().service_entry(0x0101).ca_ids = vec![0x0500, 0x0600];
        apply(&mut ctx, sdt_section());

        let t = current(&ctx);
        assert_eq!(t.transport_stream_id, 0x0402);
        assert_eq!(t.original_network_id, 0x0001);
        let s = t.find_service(0x0101).unwrap();
        assert_eq!(s.provider_name.as_deref(), Some("OP"));
        assert_eq!(s.service_name.as_deref(), Some("ONE!"));
        assert_eq!(s.service_type, 0x01);
        assert_eq!(s.running, RunningStatus::Running);
        assert!(s.scrambled);
        // CA identifier replaces what the PMT reported
        assert_eq!(s.ca_ids, vec![0x1702]);
    }

    /// NIT with one transport stream on a terrestrial frequency.
    fn nit_section(table: u8, frequency: [u8; 4], other_frequencies: bool) -> Vec<u8> {
        let mut raw = vec![
            table, // table_id
            0xF0, 0x00, // syntax=1, section_length patched below
            0x30, 0x01, // network_id
            0xC1, // version 0, current_next 1
            0x00, 0x00, // section 0 of 0
            0xF0, 0x05, // network_descriptors_length = 5
            0x40, 0x03, b'D', b'T', b'T', // network name
            0xF0, 0x00, // transport_stream_loop_length patched below
            0x10, 0x00, // TSID
            0x23, 0x3A, // ONID
            0xF0, 0x00, // descriptors length patched below
            0x5A, 0x0B, // terrestrial delivery
        ];
        raw.extend_from_slice(&frequency);
        raw.extend_from_slice(&[
            0x1F, // 8 MHz, priority, no time slicing, no MPE-FEC
            0x81, // QAM64, hierarchy none, HP 2/3
            if other_frequencies { 0xE3 } else { 0xE2 }, // LP none, 1/32, 8k, other_frequency_flag
            0xFF, 0xFF, 0xFF, 0xFF,
        ]);
        if other_frequencies {
            raw.extend_from_slice(&[
                0x62, 0x09, // frequency list
                0xFF, // coding_type 3: terrestrial
                0x02, 0xD3, 0x44, 0x40, // 474 MHz
                0x03, 0x0A, 0x32, 0xC0, // 510 MHz
            ]);
        }
        let descriptors_len = raw.len() - 23;
        raw[21] = 0xF0 | (descriptors_len >> 8) as u8;
        raw[22] = descriptors_len as u8;
        let loop_len = raw.len() - 17;
        raw[15] = 0xF0 | (loop_len >> 8) as u8;
        raw[16] = loop_len as u8;
        // everything after section_length plus the CRC
        let section_len = raw.len() - 3 + 4;
        raw[1] = 0xF0 | (section_len >> 8) as u8;
        raw[2] = section_len as u8;
        raw
    }

    fn terrestrial(frequency: u32) -> Transponder {
        let mut t = Transponder::new(frequency);
        t.delivery_system = DeliverySystem::DvbT;
        t
    }

    #[test]
    fn test_nit_actual_updates_known_transponder() {
        let mut ctx = context(ScanOptions::default(), terrestrial(474_000_000));
        apply(
            &mut ctx,
            nit_section(table_id::NIT_ACTUAL, [0x02, 0xD3, 0x44, 0x40], false),
        );

        let t = current(&ctx);
        assert_eq!(t.network_id, 0x3001);
        assert_eq!(t.original_network_id, 0x233A);
        assert_eq!(t.transport_stream_id, 0x1000);
        assert_eq!(t.modulation, Modulation::Qam64);
        assert_eq!(t.fec_hp, CodeRate::Fec2_3);
        assert!(ctx.registry.pending().is_empty());
    }

    #[test]
    fn test_nit_other_allocates_only_with_other_nits() {
        // 482 MHz
        let freq = [0x02, 0xDF, 0x79, 0x40];

        let mut ctx = context(ScanOptions::default(), terrestrial(474_000_000));
        apply(&mut ctx, nit_section(table_id::NIT_OTHER, freq, false));
        assert!(ctx.registry.pending().is_empty());

        let options = ScanOptions {
            other_nits: true,
            ..Default::default()
        };
        let mut ctx = context(options, terrestrial(474_000_000));
        apply(&mut ctx, nit_section(table_id::NIT_OTHER, freq, true));
        let pending = ctx.registry.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].frequency, 482_000_000);
        assert_eq!(pending[0].delivery_system, DeliverySystem::DvbT);
        assert!(pending[0].other_frequency_flag);
        assert_eq!(pending[0].other_frequencies, vec![474_000_000, 510_000_000]);
        // NIT-other leaves the current network id alone
        assert_eq!(current(&ctx).network_id, 0);
    }

    #[test]
    fn test_nit_satellite_allocates_both_systems() {
        let options = ScanOptions {
            other_nits: true,
            ..Default::default()
        };
        let mut cur = Transponder::new(11_778_000);
        cur.delivery_system = DeliverySystem::DvbS;
        let mut ctx = context(options, cur);

        apply(
            &mut ctx,
            vec![
                0x41, // table_id NIT other
                0xF0, 0x20, // syntax=1, section_length=32
                0x00, 0x01, // network_id
                0xC1, // version 0, current_next 1
                0x00, 0x00, // section 0 of 0
                0xF0, 0x00, // no network descriptors
                0xF0, 0x13, // transport_stream_loop_length = 19
                0x04, 0x4D, // TSID
                0x00, 0x01, // ONID
                0xF0, 0x0D, // descriptors length = 13
                0x43, 0x0B, // satellite delivery
                0x01, 0x21, 0x76, 0x00, // 12.17600 GHz
                0x01, 0x92, // 19.2
                0x81, // east, horizontal, roll-off 0.35, DVB-S, QPSK
                0x02, 0x75, 0x00, 0x03, // 27.500 Msym/s, FEC 3/4
            ],
        );

        let pending = ctx.registry.pending();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].delivery_system, DeliverySystem::DvbS);
        assert_eq!(pending[1].delivery_system, DeliverySystem::DvbS2);
        for t in pending {
            assert_eq!(t.frequency, 12_176_000);
            assert_eq!(t.polarisation, Polarisation::Horizontal);
            assert_eq!(t.orbital_position, 192);
            assert!(t.east);
            assert_eq!(t.symbol_rate, 27_500_000);
            assert_eq!(t.fec, CodeRate::Fec3_4);
            assert_eq!(t.transport_stream_id, 0x044D);
        }
    }

    #[test]
    fn test_uk_channel_numbers() {
        let options = ScanOptions {
            uk_ordering: true,
            ..Default::default()
        };
        let mut ctx = context(options, terrestrial(474_000_000));
        ctx.registry.current_mut().unwrap().service_entry(0x1041);

        set_channel_numbers(
            &mut ctx.registry,
            &[LogicalChannel {
                service_id: 0x1041,
                channel_number: 1,
            }],
        );
        assert_eq!(
            current(&ctx).find_service(0x1041).unwrap().channel_num,
            Some(1)
        );
    }

    fn vct_section(program_number: u16, service_type: u8, hidden: bool) -> Vec<u8> {
        let [pn_hi, pn_lo] = program_number.to_be_bytes();
        let mut raw = vec![
            0xC8, // table_id TVCT
            0xF0, 0x00, // syntax=1, section_length patched below
            0x08, 0x15, // transport_stream_id
            0xC1, // version 0, current_next 1
            0x00, 0x00, // section 0 of 0
            0x00, // protocol_version
            0x01, // num_channels_in_section
            // short_name "WGBH" in UTF-16
            0x00, b'W', 0x00, b'G', 0x00, b'B', 0x00, b'H', 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            // reserved(4) major=2 (10) minor=1 (10) modulation_mode
            0xF0, 0x08, 0x01, 0x04,
            0x00, 0x00, 0x00, 0x00, // carrier_frequency
            0x08, 0x15, // channel_TSID
            pn_hi, pn_lo, // program_number
            if hidden { 0x10 } else { 0x00 }, // ETM, access_controlled, hidden
            0xC0 | service_type, // hide_guide, service_type
            0x00, 0x01, // source_id
            0xFC, 0x11, // descriptors_length = 17
            0xA1, 0x0F, // service location
            0xE0, 0x31, // PCR PID 0x31
            0x02, // number_elements
            0x02, 0xE0, 0x31, 0x00, 0x00, 0x00, // video, PID 0x31
            0x81, 0xE0, 0x34, b'e', b'n', b'g', // AC-3, PID 0x34
        ];
        raw.extend_from_slice(&[0xFC, 0x00]); // additional_descriptors_length
        let section_len = raw.len() - 3 + 4;
        raw[1] = 0xF0 | (section_len >> 8) as u8;
        raw[2] = section_len as u8;
        raw
    }

    #[test]
    fn test_vct_channels() {
        let mut ctx = context(ScanOptions::default(), Transponder::new(57_028_615));
        apply(&mut ctx, vct_section(3, 0x02, false));

        let s = current(&ctx).find_service(3).unwrap();
        assert_eq!(s.service_name.as_deref(), Some("WGBH"));
        assert_eq!(s.pcr_pid, 0x31);
        assert_eq!(s.video_pid, 0x31);
        assert_eq!(s.audio[0].pid, 0x34);
        assert_eq!(s.audio[0].language, "eng");
        assert_eq!(s.channel_num, Some(2 << 10 | 1));
        assert_eq!(s.running, RunningStatus::Running);
    }

    #[test]
    fn test_vct_pseudo_ids_and_skipped_types() {
        let mut ctx = context(ScanOptions::default(), Transponder::new(57_028_615));
        apply(&mut ctx, vct_section(0, 0x02, true));
        apply(&mut ctx, vct_section(5, 0x01, false));
        apply(&mut ctx, vct_section(6, 0x04, false));

        let services = &current(&ctx).services;
        assert_eq!(services.len(), 1);
        assert_eq!(services[0].service_id, 0xFFFE);
        assert_eq!(services[0].running, RunningStatus::NotRunning);
    }

    #[test]
    fn test_bat_reaches_bouquet_engine() {
        let options: BouquetOptions = "lang=eng".parse().unwrap();
        let mut ctx = context(ScanOptions::default(), Transponder::new(11_778_000))
            .with_bouquets(BouquetEngine::new(options));
        apply(
            &mut ctx,
            vec![
                0x4A, // table_id BAT
                0xF0, 0x1C, // syntax=1, section_length=28
                0x00, 0x10, // bouquet_id
                0xC1, // version 0, current_next 1
                0x00, 0x00, // section 0 of 0
                0xF0, 0x06, // bouquet_descriptors_length = 6
                0x47, 0x04, b'N', b'e', b'w', b's', // bouquet name
                0xF0, 0x09, // transport_stream_loop_length = 9
                0x04, 0x4D, 0x00, 0x01, // TSID, ONID
                0xF0, 0x05, // descriptors length = 5
                0x41, 0x03, 0x00, 0x65, 0x01, // service list: 0x65 TV
            ],
        );
        assert_eq!(ctx.bouquets.as_ref().unwrap().bouquet_count(), 1);
    }
}
