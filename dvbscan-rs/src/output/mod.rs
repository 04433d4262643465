//! Channel list output.
//!
//! The scanned transponders are written through a [`ServiceSink`], one
//! implementation per channels.conf dialect. Without bouquet options every
//! selected service is written in scan order; with them the
//! [`BouquetEngine`](crate::bouquet::BouquetEngine) groups the services
//! first.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use dvbscan_model::{Service, Transponder};
use log::{debug, info, warn};
use serde::Deserialize;

use crate::bouquet::{BouquetEngine, BouquetSummary};

pub mod vdr;
pub mod zap;

pub use vdr::VdrSink;
pub use zap::ZapSink;

/// Receives the finished channel list.
pub trait ServiceSink {
    /// Start a new group of services.
    fn bouquet(&mut self, name: &str) -> io::Result<()>;

    /// Write one service of transponder `t`.
    fn service(&mut self, t: &Transponder, s: &Service) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// VDR channels.conf
    #[default]
    Vdr,
    /// VDR 1.6 channels.conf: no DVB-S2 channels, no modulation, roll-off or
    /// stream parameters
    #[value(name = "vdr16x")]
    #[serde(rename = "vdr16x")]
    Vdr16x,
    /// szap/tzap/czap channels.conf
    Zap,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Vdr => write!(f, "vdr"),
            OutputFormat::Vdr16x => write!(f, "vdr16x"),
            OutputFormat::Zap => write!(f, "zap"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vdr" => Ok(OutputFormat::Vdr),
            "vdr16x" => Ok(OutputFormat::Vdr16x),
            "zap" => Ok(OutputFormat::Zap),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Which services make it into the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSelection {
    /// Bit 0 TV, bit 1 radio, bit 2 other services.
    pub serv_select: u32,
    /// 0 free-to-air only, -1 all, -2 all with real CA ids, any other
    /// value all with that CA id written out.
    pub ca_select: i32,
}

impl Default for ServiceSelection {
    fn default() -> Self {
        ServiceSelection {
            serv_select: 7,
            ca_select: -1,
        }
    }
}

impl ServiceSelection {
    pub const TV: u32 = 1;
    pub const RADIO: u32 = 2;
    pub const OTHER: u32 = 4;

    fn ca_allows(&self, s: &Service) -> bool {
        !(self.ca_select == 0 && s.scrambled)
    }

    /// Services the bouquet engine works on: audio or video only.
    pub fn accepts_av(&self, s: &Service) -> bool {
        let kinds = (s.video_pid != 0) as u32 | ((s.primary_audio_pid() != 0) as u32) << 1;
        kinds & self.serv_select != 0 && self.ca_allows(s)
    }

    /// Services written by a plain dump.
    pub fn accepts(&self, s: &Service) -> bool {
        let kind = if s.video_pid != 0 {
            Self::TV
        } else if !s.audio.is_empty() {
            Self::RADIO
        } else {
            Self::OTHER
        };
        if kind & self.serv_select == 0 {
            debug!(
                "0x{:04X} {}: not selected (serv_select {})",
                s.service_id,
                s.name(),
                self.serv_select
            );
            return false;
        }
        self.ca_allows(s)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub selection: ServiceSelection,
    /// Name services missing from the SDT `[NNN-SSSS]` instead of `[SSSS]`.
    pub unique_anon: bool,
    /// VDR: prefix the service name with the provider name.
    pub provider: bool,
    /// VDR: emit `:@N` channel number markers.
    pub channel_numbers: bool,
    /// VDR: orbital position written instead of the transponder's.
    pub orbital_override: Option<String>,
    /// zap: DiSEqC satellite number.
    pub sat_number: u32,
}

impl OutputOptions {
    pub fn sink<'a, W: Write + 'a>(&self, out: W) -> Box<dyn ServiceSink + 'a> {
        match self.format {
            OutputFormat::Vdr | OutputFormat::Vdr16x => Box::new(VdrSink::new(out, self)),
            OutputFormat::Zap => Box::new(ZapSink::new(out, self.sat_number)),
        }
    }

    /// Tuning parameters of `t` in the selected dialect.
    pub fn describe(&self, t: &Transponder) -> String {
        match self.format {
            OutputFormat::Vdr => vdr::tuning_parameters(t, self.orbital_override.as_deref(), false),
            OutputFormat::Vdr16x => {
                vdr::tuning_parameters(t, self.orbital_override.as_deref(), true)
            }
            OutputFormat::Zap => zap::tuning_parameters(t, self.sat_number),
        }
    }
}

/// Audio PID written for `s`: the first audio stream, else the AC-3 stream.
pub(crate) fn output_audio_pid(s: &Service) -> u16 {
    match s.primary_audio_pid() {
        0 => s.ac3_pid,
        pid => pid,
    }
}

/// Name anonymous services and make names safe for ':' separated lists.
pub fn prepare_names(scanned: &mut [Transponder], unique_anon: bool) {
    let mut anon_services = 0u32;
    for t in scanned.iter_mut().filter(|t| !t.wrong_frequency) {
        for s in &mut t.services {
            if s.service_name.is_none() {
                let name = if unique_anon {
                    format!("[{:03x}-{:04x}]", anon_services, s.service_id)
                } else {
                    format!("[{:04x}]", s.service_id)
                };
                s.service_name = Some(name);
                anon_services += 1;
            }
            if let Some(name) = s.service_name.as_mut() {
                *name = name.replace(':', " ");
            }
            if let Some(provider) = s.provider_name.as_mut() {
                *provider = provider.replace(':', " ");
            }
        }
    }
}

/// Write every selected service of every scanned transponder, in scan
/// order. Returns the number of services written.
pub fn dump_lists(
    scanned: &mut [Transponder],
    opts: &OutputOptions,
    sink: &mut dyn ServiceSink,
) -> io::Result<usize> {
    let total: usize = scanned
        .iter()
        .filter(|t| !t.wrong_frequency)
        .map(|t| t.services.len())
        .sum();
    info!("dumping lists ({} services)", total);

    prepare_names(scanned, opts.unique_anon);

    let mut written = 0;
    for t in scanned.iter() {
        if t.wrong_frequency {
            debug!("skipping wrong frequency {}", t.frequency);
            continue;
        }
        for s in t.services.iter().filter(|s| opts.selection.accepts(s)) {
            sink.service(t, s)?;
            written += 1;
        }
    }
    info!("Done.");
    Ok(written)
}

/// What was written, for the closing summary.
#[derive(Debug, Clone, Default)]
pub struct OutputSummary {
    pub services: usize,
    pub bouquets: Option<BouquetSummary>,
}

/// Write the channel list, through the bouquet engine when one is given.
pub fn write_output(
    scanned: &mut [Transponder],
    opts: &OutputOptions,
    bouquets: Option<&mut BouquetEngine>,
    sink: &mut dyn ServiceSink,
) -> io::Result<OutputSummary> {
    match bouquets {
        Some(engine) => {
            prepare_names(scanned, opts.unique_anon);
            let summary = engine.dump(scanned, &opts.selection, sink)?;
            if summary.mapped + summary.unmapped == 0 {
                warn!("no services selected for output");
            }
            Ok(OutputSummary {
                services: summary.mapped + summary.unmapped,
                bouquets: Some(summary),
            })
        }
        None => Ok(OutputSummary {
            services: dump_lists(scanned, opts, sink)?,
            bouquets: None,
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use dvbscan_model::AudioStream;

    /// Sink recording every call as a line.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingSink {
        pub lines: Vec<String>,
    }

    impl ServiceSink for RecordingSink {
        fn bouquet(&mut self, name: &str) -> io::Result<()> {
            self.lines.push(format!(":{}", name));
            Ok(())
        }

        fn service(&mut self, _t: &Transponder, s: &Service) -> io::Result<()> {
            self.lines.push(s.name().to_string());
            Ok(())
        }
    }

    fn service(id: u16, name: Option<&str>, video: u16, audio: u16) -> Service {
        let mut s = Service::new(id);
        s.service_name = name.map(str::to_string);
        s.video_pid = video;
        if audio != 0 {
            s.audio.push(AudioStream {
                pid: audio,
                language: String::new(),
            });
        }
        s
    }

    #[test]
    fn test_selection_by_kind() {
        let tv = service(1, Some("tv"), 0x100, 0x101);
        let radio = service(2, Some("radio"), 0, 0x201);
        let data = service(3, Some("data"), 0, 0);

        let radio_only = ServiceSelection {
            serv_select: ServiceSelection::RADIO,
            ca_select: -1,
        };
        assert!(!radio_only.accepts(&tv));
        assert!(radio_only.accepts(&radio));
        assert!(!radio_only.accepts(&data));

        let all = ServiceSelection::default();
        assert!(all.accepts(&data));
        assert!(!all.accepts_av(&data));
    }

    #[test]
    fn test_free_to_air_only() {
        let mut s = service(1, Some("pay"), 0x100, 0x101);
        s.scrambled = true;
        let fta = ServiceSelection {
            serv_select: 7,
            ca_select: 0,
        };
        assert!(!fta.accepts(&s));
        assert!(!fta.accepts_av(&s));
        assert!(ServiceSelection::default().accepts(&s));
    }

    #[test]
    fn test_dump_names_anonymous_services() {
        let mut t = Transponder::new(474_000_000);
        t.services.push(service(0x0102, None, 0x100, 0));
        t.services.push(service(0x0103, Some("News: 24"), 0x110, 0));
        t.services.push(service(0x0104, None, 0x120, 0));
        let mut wrong = Transponder::new(482_000_000);
        wrong.wrong_frequency = true;
        wrong.services.push(service(0x0201, Some("ghost"), 0x100, 0));

        let mut scanned = vec![t, wrong];
        let mut sink = RecordingSink::default();
        let opts = OutputOptions {
            unique_anon: true,
            ..Default::default()
        };
        assert_eq!(dump_lists(&mut scanned, &opts, &mut sink).unwrap(), 3);
        assert_eq!(sink.lines, vec!["[000-0102]", "News  24", "[001-0104]"]);

        let mut plain = vec![Transponder::new(474_000_000)];
        plain[0].services.push(service(0x0102, None, 0x100, 0));
        let mut sink = RecordingSink::default();
        dump_lists(&mut plain, &OutputOptions::default(), &mut sink).unwrap();
        assert_eq!(sink.lines, vec!["[0102]"]);
    }

    #[test]
    fn test_ac3_pid_stands_in_for_audio() {
        let mut s = service(1, Some("ac3 only"), 0x100, 0);
        s.ac3_pid = 0x104;
        assert_eq!(output_audio_pid(&s), 0x104);
        s.audio.push(AudioStream {
            pid: 0x103,
            language: "deu".to_string(),
        });
        assert_eq!(output_audio_pid(&s), 0x103);
    }
}
