//! VDR channels.conf writer.

use std::fmt::Write as _;
use std::io::{self, Write};

use dvbscan_model::{
    Bandwidth, CodeRate, DeliverySystem, GuardInterval, Hierarchy, Inversion, Modulation,
    Polarisation, Rolloff, Service, TransmissionMode, Transponder,
};

use super::{output_audio_pid, OutputFormat, OutputOptions, ServiceSink};

fn inversion(v: Inversion) -> &'static str {
    match v {
        Inversion::Off => "0",
        Inversion::On => "1",
        Inversion::Auto => "999",
    }
}

fn fec(v: CodeRate) -> &'static str {
    match v {
        CodeRate::None => "0",
        CodeRate::Fec1_2 => "12",
        CodeRate::Fec2_3 => "23",
        CodeRate::Fec3_4 => "34",
        CodeRate::Fec4_5 => "45",
        CodeRate::Fec5_6 => "56",
        CodeRate::Fec6_7 => "67",
        CodeRate::Fec7_8 => "78",
        CodeRate::Fec8_9 => "89",
        CodeRate::Auto => "999",
        CodeRate::Fec3_5 => "35",
        CodeRate::Fec9_10 => "910",
    }
}

fn qam(v: Modulation) -> &'static str {
    match v {
        Modulation::Qpsk => "0",
        Modulation::Qam16 => "16",
        Modulation::Qam32 => "32",
        Modulation::Qam64 => "64",
        Modulation::Qam128 => "128",
        Modulation::Qam256 => "256",
        _ => "999",
    }
}

fn bandwidth(v: Bandwidth) -> &'static str {
    match v {
        Bandwidth::Bw8Mhz => "8",
        Bandwidth::Bw7Mhz => "7",
        Bandwidth::Bw6Mhz => "6",
        Bandwidth::Auto => "999",
        Bandwidth::Bw5Mhz => "5",
        Bandwidth::Bw10Mhz => "10",
    }
}

fn mode(v: TransmissionMode) -> &'static str {
    match v {
        TransmissionMode::Mode2k => "2",
        TransmissionMode::Mode8k => "8",
        TransmissionMode::Auto => "999",
        TransmissionMode::Mode4k => "4",
        TransmissionMode::Mode1k => "1",
        TransmissionMode::Mode16k => "16",
        TransmissionMode::Mode32k => "32",
    }
}

fn guard(v: GuardInterval) -> &'static str {
    match v {
        GuardInterval::Gi1_32 => "32",
        GuardInterval::Gi1_16 => "16",
        GuardInterval::Gi1_8 => "8",
        GuardInterval::Gi1_4 => "4",
        GuardInterval::Auto => "999",
        GuardInterval::Gi1_128 => "1128",
        GuardInterval::Gi19_128 => "19128",
        GuardInterval::Gi19_256 => "19256",
    }
}

fn hierarchy(v: Hierarchy) -> &'static str {
    match v {
        Hierarchy::None => "0",
        Hierarchy::Alpha1 => "1",
        Hierarchy::Alpha2 => "2",
        Hierarchy::Alpha4 => "4",
        Hierarchy::Auto => "999",
    }
}

/// Satellite parameter letters: FEC, modulation, roll-off and the DVB-S2
/// stream selection. VDR 1.6 only knows the FEC.
fn satellite_flags(t: &Transponder, vdr16x: bool, out: &mut String) {
    let fec_code = match t.fec {
        CodeRate::None | CodeRate::Auto => None,
        other => Some(fec(other)),
    };
    if let Some(code) = fec_code {
        let _ = write!(out, "C{}", code);
    }
    if vdr16x {
        return;
    }

    let modulation = match t.modulation {
        Modulation::Qpsk => Some("2"),
        Modulation::Qam16 => Some("16"),
        Modulation::Qam32 => Some("32"),
        Modulation::Qam64 => Some("64"),
        Modulation::Qam128 => Some("128"),
        Modulation::Qam256 => Some("256"),
        Modulation::Vsb8 => Some("10"),
        Modulation::Vsb16 => Some("11"),
        Modulation::Psk8 => Some("5"),
        Modulation::Apsk16 => Some("6"),
        Modulation::Apsk32 => Some("7"),
        Modulation::Auto => None,
    };
    if let Some(m) = modulation {
        let _ = write!(out, "M{}", m);
    }

    match t.rolloff {
        Rolloff::R20 => out.push_str("O20"),
        Rolloff::R25 => out.push_str("O25"),
        Rolloff::R35 => out.push_str("O35"),
        Rolloff::Auto => {}
    }

    if t.delivery_system == DeliverySystem::DvbS2 {
        out.push_str("S1");
        if let Some(stream_id) = t.stream_id {
            let _ = write!(out, "P{}", stream_id);
        }
    }
}

/// The frequency, parameter, source and symbol rate fields of a channel
/// line, each followed by ':'. `vdr16x` selects the VDR 1.6 satellite
/// parameters.
pub fn tuning_parameters(t: &Transponder, orbital_override: Option<&str>, vdr16x: bool) -> String {
    let mut out = String::new();
    match t.delivery_system {
        DeliverySystem::DvbS | DeliverySystem::DvbS2 => {
            let pol = if t.polarisation == Polarisation::Vertical {
                'V'
            } else {
                'H'
            };
            let _ = write!(out, "{}:{}", t.frequency / 1000, pol);
            satellite_flags(t, vdr16x, &mut out);
            out.push(':');
            match orbital_override.filter(|o| !o.is_empty()) {
                Some(source) => {
                    let _ = write!(out, "{}:", source);
                }
                None => {
                    let _ = write!(
                        out,
                        "S{}.{}{}:",
                        t.orbital_position / 10,
                        t.orbital_position % 10,
                        if t.east { "E" } else { "W" }
                    );
                }
            }
            let _ = write!(out, "{}:", t.symbol_rate / 1000);
        }
        DeliverySystem::DvbCAnnexAC | DeliverySystem::DvbCAnnexB => {
            let _ = write!(
                out,
                "{}:M{}:C:{}:",
                t.frequency / 1_000_000,
                qam(t.modulation),
                t.symbol_rate / 1000
            );
        }
        DeliverySystem::DvbT => {
            let _ = write!(
                out,
                "{}:I{}B{}C{}D{}M{}T{}G{}Y{}:T:27500:",
                t.frequency / 1000,
                inversion(t.inversion),
                bandwidth(t.bandwidth),
                fec(t.fec_hp),
                fec(t.fec_lp),
                qam(t.modulation),
                mode(t.transmission_mode),
                guard(t.guard_interval),
                hierarchy(t.hierarchy)
            );
        }
        DeliverySystem::DvbT2 => {
            let _ = write!(
                out,
                "{}:B{}C{}M{}T{}G{}S1P{}:T:27500:",
                t.frequency / 1000,
                bandwidth(t.bandwidth),
                fec(t.fec_hp),
                qam(t.modulation),
                mode(t.transmission_mode),
                guard(t.guard_interval),
                t.stream_id.unwrap_or(0)
            );
        }
        DeliverySystem::Atsc => {
            let _ = write!(out, "{}:M{}:A:", t.frequency / 1000, qam(t.modulation));
        }
        DeliverySystem::Undefined | DeliverySystem::Dss => {}
    }
    out
}

fn language_suffix(language: &str) -> String {
    if language.is_empty() {
        String::new()
    } else {
        format!("={}", language.chars().take(4).collect::<String>())
    }
}

/// Writes VDR 1.7+ channel lines.
pub struct VdrSink<W> {
    out: W,
    orbital_override: Option<String>,
    provider: bool,
    channel_numbers: bool,
    ca_select: i32,
    vdr16x: bool,
}

impl<W: Write> VdrSink<W> {
    pub fn new(out: W, opts: &OutputOptions) -> Self {
        VdrSink {
            out,
            orbital_override: opts.orbital_override.clone(),
            provider: opts.provider,
            channel_numbers: opts.channel_numbers,
            ca_select: opts.selection.ca_select,
            vdr16x: opts.format == OutputFormat::Vdr16x,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn ca_field(&self, s: &Service) -> String {
        match self.ca_select {
            -1 | 0 => "0".to_string(),
            -2 => {
                let first = s.ca_ids.first().copied().unwrap_or(0);
                let mut field = format!("{:X}", first);
                for id in s.ca_ids.iter().skip(1).filter(|&&id| id != 0) {
                    let _ = write!(field, ",{:X}", id);
                }
                field
            }
            other => other.to_string(),
        }
    }

    /// One channels.conf line, without the newline.
    pub fn format_service(&self, t: &Transponder, s: &Service) -> String {
        let provider = s.provider_name.as_deref().unwrap_or("");
        let mut line = String::new();

        if self.provider {
            let _ = write!(line, "{} - ", provider);
        }
        let _ = write!(line, "{};{}:", s.name(), provider);
        line.push_str(&tuning_parameters(
            t,
            self.orbital_override.as_deref(),
            self.vdr16x,
        ));

        if s.pcr_pid != s.video_pid && s.video_pid > 0 {
            let _ = write!(line, "{}+{}:", s.video_pid, s.pcr_pid);
        } else {
            let _ = write!(line, "{}:", s.video_pid);
        }

        let first_language = s.audio.first().map(|a| a.language.as_str()).unwrap_or("");
        let _ = write!(line, "{}{}", output_audio_pid(s), language_suffix(first_language));
        for audio in s.audio.iter().skip(1) {
            let _ = write!(line, ",{}{}", audio.pid, language_suffix(&audio.language));
        }
        if s.ac3_pid != 0 {
            let _ = write!(line, ";{}{}", s.ac3_pid, language_suffix(first_language));
        }

        let _ = write!(
            line,
            ":{}:{}:{}:{}:{}:0",
            s.teletext_pid,
            self.ca_field(s),
            s.service_id,
            t.original_network_id,
            t.transport_stream_id
        );
        line
    }
}

impl<W: Write> ServiceSink for VdrSink<W> {
    fn bouquet(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, ":{}", name)
    }

    fn service(&mut self, t: &Transponder, s: &Service) -> io::Result<()> {
        let has_av = s.video_pid != 0 || output_audio_pid(s) != 0;
        if !has_av || (self.ca_select == 0 && s.scrambled) {
            return Ok(());
        }
        if self.vdr16x && t.delivery_system == DeliverySystem::DvbS2 {
            return Ok(());
        }
        if self.channel_numbers {
            if let Some(n) = s.channel_num.filter(|&n| n > 0) {
                writeln!(self.out, ":@{}", n)?;
            }
        }
        let line = self.format_service(t, s);
        writeln!(self.out, "{}", line)
    }
}
