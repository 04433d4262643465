//! szap/czap/tzap channels.conf writer.

use std::io::{self, Write};

use dvbscan_model::{
    Bandwidth, CodeRate, DeliverySystem, GuardInterval, Hierarchy, Inversion, Modulation,
    Polarisation, Service, TransmissionMode, Transponder,
};

use super::{output_audio_pid, ServiceSink};

fn inversion(v: Inversion) -> &'static str {
    match v {
        Inversion::Off => "INVERSION_OFF",
        Inversion::On => "INVERSION_ON",
        Inversion::Auto => "INVERSION_AUTO",
    }
}

fn fec(v: CodeRate) -> &'static str {
    match v {
        CodeRate::None => "FEC_NONE",
        CodeRate::Fec1_2 => "FEC_1_2",
        CodeRate::Fec2_3 => "FEC_2_3",
        CodeRate::Fec3_4 => "FEC_3_4",
        CodeRate::Fec4_5 => "FEC_4_5",
        CodeRate::Fec5_6 => "FEC_5_6",
        CodeRate::Fec6_7 => "FEC_6_7",
        CodeRate::Fec7_8 => "FEC_7_8",
        CodeRate::Fec8_9 => "FEC_8_9",
        CodeRate::Auto => "FEC_AUTO",
        CodeRate::Fec3_5 => "FEC_3_5",
        CodeRate::Fec9_10 => "FEC_9_10",
    }
}

fn qam(v: Modulation) -> &'static str {
    match v {
        Modulation::Qpsk => "QPSK",
        Modulation::Qam16 => "QAM_16",
        Modulation::Qam32 => "QAM_32",
        Modulation::Qam64 => "QAM_64",
        Modulation::Qam128 => "QAM_128",
        Modulation::Qam256 => "QAM_256",
        Modulation::Auto => "QAM_AUTO",
        Modulation::Vsb8 => "8VSB",
        Modulation::Vsb16 => "16VSB",
        Modulation::Psk8 => "PSK_8",
        Modulation::Apsk16 => "APSK_16",
        Modulation::Apsk32 => "APSK_32",
    }
}

fn bandwidth(v: Bandwidth) -> &'static str {
    match v {
        Bandwidth::Bw8Mhz => "BANDWIDTH_8_MHZ",
        Bandwidth::Bw7Mhz => "BANDWIDTH_7_MHZ",
        Bandwidth::Bw6Mhz => "BANDWIDTH_6_MHZ",
        Bandwidth::Auto => "BANDWIDTH_AUTO",
        Bandwidth::Bw5Mhz => "BANDWIDTH_5_MHZ",
        Bandwidth::Bw10Mhz => "BANDWIDTH_10_MHZ",
    }
}

fn mode(v: TransmissionMode) -> &'static str {
    match v {
        TransmissionMode::Mode2k => "TRANSMISSION_MODE_2K",
        TransmissionMode::Mode8k => "TRANSMISSION_MODE_8K",
        TransmissionMode::Auto => "TRANSMISSION_MODE_AUTO",
        TransmissionMode::Mode4k => "TRANSMISSION_MODE_4K",
        TransmissionMode::Mode1k => "TRANSMISSION_MODE_1K",
        TransmissionMode::Mode16k => "TRANSMISSION_MODE_16K",
        TransmissionMode::Mode32k => "TRANSMISSION_MODE_32K",
    }
}

fn guard(v: GuardInterval) -> &'static str {
    match v {
        GuardInterval::Gi1_32 => "GUARD_INTERVAL_1_32",
        GuardInterval::Gi1_16 => "GUARD_INTERVAL_1_16",
        GuardInterval::Gi1_8 => "GUARD_INTERVAL_1_8",
        GuardInterval::Gi1_4 => "GUARD_INTERVAL_1_4",
        GuardInterval::Auto => "GUARD_INTERVAL_AUTO",
        GuardInterval::Gi1_128 => "GUARD_INTERVAL_1_128",
        GuardInterval::Gi19_128 => "GUARD_INTERVAL_19_128",
        GuardInterval::Gi19_256 => "GUARD_INTERVAL_19_256",
    }
}

fn hierarchy(v: Hierarchy) -> &'static str {
    match v {
        Hierarchy::None => "HIERARCHY_NONE",
        Hierarchy::Alpha1 => "HIERARCHY_1",
        Hierarchy::Alpha2 => "HIERARCHY_2",
        Hierarchy::Alpha4 => "HIERARCHY_4",
        Hierarchy::Auto => "HIERARCHY_AUTO",
    }
}

/// Tuning fields of a zap line, ':' separated, without the trailing ':'.
pub fn tuning_parameters(t: &Transponder, sat_number: u32) -> String {
    match t.delivery_system {
        DeliverySystem::DvbS | DeliverySystem::DvbS2 => {
            let pol = if t.polarisation == Polarisation::Vertical {
                'v'
            } else {
                'h'
            };
            // MHz and kBaud
            format!(
                "{}:{}:{}:{}",
                t.frequency / 1000,
                pol,
                sat_number,
                t.symbol_rate / 1000
            )
        }
        DeliverySystem::DvbCAnnexAC | DeliverySystem::DvbCAnnexB => format!(
            "{}:{}:{}:{}:{}",
            t.frequency,
            inversion(t.inversion),
            t.symbol_rate,
            fec(t.fec),
            qam(t.modulation)
        ),
        DeliverySystem::DvbT | DeliverySystem::DvbT2 => format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:{}",
            t.frequency,
            inversion(t.inversion),
            bandwidth(t.bandwidth),
            fec(t.fec_hp),
            fec(t.fec_lp),
            qam(t.modulation),
            mode(t.transmission_mode),
            guard(t.guard_interval),
            hierarchy(t.hierarchy)
        ),
        DeliverySystem::Atsc => format!("{}:{}", t.frequency, qam(t.modulation)),
        DeliverySystem::Undefined | DeliverySystem::Dss => String::new(),
    }
}

/// Writes one `name:parameters:vpid:apid:sid:system` line per service.
pub struct ZapSink<W> {
    out: W,
    sat_number: u32,
}

impl<W: Write> ZapSink<W> {
    pub fn new(out: W, sat_number: u32) -> Self {
        ZapSink { out, sat_number }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ServiceSink for ZapSink<W> {
    fn bouquet(&mut self, name: &str) -> io::Result<()> {
        writeln!(self.out, ":{}", name)
    }

    fn service(&mut self, t: &Transponder, s: &Service) -> io::Result<()> {
        writeln!(
            self.out,
            "{}:{}:{}:{}:{}:{}",
            s.name(),
            tuning_parameters(t, self.sat_number),
            s.video_pid,
            output_audio_pid(s),
            s.service_id,
            t.delivery_system.api_value()
        )
    }
}
