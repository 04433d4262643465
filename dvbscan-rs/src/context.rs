use std::path::PathBuf;

use clap::{ArgAction, Parser};
use clap_num::maybe_hex;
use dvbscan::bouquet::options::HELP as BOUQUET_HELP;
use dvbscan::config::ConfigFile;
use dvbscan::output::{OutputFormat, OutputOptions, ServiceSelection};
use dvbscan::scan::ScanOptions;
use dvbscan::tuner::DEFAULT_LOCK_ITERATIONS;
use dvbscan::tuning_file::InitialTuningOptions;
use dvbscan::ConfigError;
use dvbscan_model::Inversion;

/// Rotor table read when a rotor position is given without `--rotor-conf`.
pub(crate) const DEFAULT_ROTOR_CONF: &str = "rotor.conf";

#[derive(Debug, Parser)]
#[clap(name = "dvbscan")]
#[clap(about = "dvbscan scans DVB-S/S2, DVB-C, DVB-T and ATSC networks and writes the services it finds as channels.conf.", long_about = None)]
#[clap(version)]
#[clap(after_help = BOUQUET_HELP)]
pub(crate) struct Cli {
    /// Initial tuning data file.{n}
    /// One transponder per line, e.g. `T 474000000 8MHz 2/3 NONE QAM64 8k 1/32 NONE`.
    #[clap(value_name = "INITIAL_TUNING_FILE")]
    pub initial: Option<PathBuf>,

    /// Adapter number.
    #[clap(short, long, value_parser = maybe_hex::<u32>, default_value = "0")]
    pub adapter: u32,

    /// Frontend number.
    #[clap(short, long, value_parser = maybe_hex::<u32>, default_value = "0")]
    pub frontend: u32,

    /// Replay a captured transport stream instead of tuning a frontend.
    #[clap(long, value_name = "FILE")]
    pub ts_file: Option<PathBuf>,

    /// Scan only the transponder the frontend is tuned to.
    #[clap(short, long)]
    pub current: bool,

    /// Follow NIT-other entries to every transponder of the network.
    #[clap(short = 'n', long)]
    pub other_nits: bool,

    /// Multiply every filter timeout by 5.
    #[clap(short = '5', long)]
    pub long_timeout: bool,

    /// Skip the first N sections of every filter.
    #[clap(short = 'k', long, value_name = "N")]
    pub skip_count: Option<usize>,

    /// 0 free-to-air only, -1 all, -2 all with CA ids, or a CA id to write.
    #[clap(short = 'x', long, value_name = "N", allow_negative_numbers = true)]
    pub ca_select: Option<i32>,

    /// Service types to write: 1 TV, 2 radio, 4 other, added up.
    #[clap(short = 't', long, value_name = "N")]
    pub serv_select: Option<u32>,

    /// Read UK logical channel numbers from the NIT.
    #[clap(short, long)]
    pub uk_ordering: bool,

    /// ATSC: read PAT/PMT only, no PSIP.
    #[clap(short = 'P', long)]
    pub no_psip: bool,

    /// ATSC: 1 terrestrial, 2 cable, 3 both.
    #[clap(short = 'A', long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub atsc_type: Option<u8>,

    /// Name services missing from the SDT `[NNN-SSSS]`.
    #[clap(short = 'U', long)]
    pub unique_anon: bool,

    /// Do not try this satellite system for `S` lines.
    #[clap(short = 'D', long, value_parser = ["S1", "S2"])]
    pub disable: Option<String>,

    /// Do not put AUTO into tuning parameters the network leaves open.
    #[clap(short = 'X', long)]
    pub noauto: bool,

    /// Spectral inversion: 0 off, 1 on, 2 auto.
    #[clap(short, long, value_parser = clap::value_parser!(u8).range(0..=2))]
    pub inversion: Option<u8>,

    /// Lock polls per tuning attempt.
    #[clap(long, value_name = "N")]
    pub iterations: Option<u32>,

    /// Output format: vdr, vdr16x (VDR 1.6) or zap.
    #[clap(value_enum, short, long)]
    pub output: Option<OutputFormat>,

    /// VDR: prefix service names with the provider name.
    #[clap(short, long)]
    pub provider: bool,

    /// VDR: write `:@N` channel number markers.
    #[clap(short = 'e', long)]
    pub channel_numbers: bool,

    /// VDR: orbital position written instead of the scanned one, e.g. `S19.2E`.
    #[clap(short = 'O', long)]
    pub orbital_override: Option<String>,

    /// zap: DiSEqC satellite number.
    #[clap(short = 's', long, value_name = "N")]
    pub sat_number: Option<u32>,

    /// Rotor position table.
    #[clap(short = 'r', long, value_name = "FILE")]
    pub rotor_conf: Option<PathBuf>,

    /// Rotor position: a number or a name listed in the rotor table.
    #[clap(short = 'R', long)]
    pub rotor_position: Option<String>,

    /// Bouquet option string, see below.
    #[clap(short, long, value_name = "OPTSTRING")]
    pub bouquets: Option<String>,

    /// Configuration file. Defaults to `dvbscan.toml` when present.
    #[clap(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More log output, repeatable.
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output, repeatable. Shows a progress spinner instead.
    #[clap(short, long, action = ArgAction::Count)]
    pub quiet: u8,
}

fn flag(cli: bool, file: Option<bool>) -> bool {
    cli || file.unwrap_or(false)
}

impl Cli {
    pub(crate) fn initial_tuning(&self, file: &ConfigFile) -> Option<PathBuf> {
        self.initial
            .clone()
            .or_else(|| file.scan.initial_tuning.clone())
    }

    pub(crate) fn ts_file(&self, file: &ConfigFile) -> Option<PathBuf> {
        self.ts_file.clone().or_else(|| file.scan.ts_file.clone())
    }

    pub(crate) fn bouquets(&self, file: &ConfigFile) -> Option<String> {
        self.bouquets
            .clone()
            .or_else(|| file.bouquet.options.clone())
    }

    pub(crate) fn rotor(&self, file: &ConfigFile) -> Option<(PathBuf, String)> {
        let position = self
            .rotor_position
            .clone()
            .or_else(|| file.scan.rotor_position.clone())?;
        let conf = self
            .rotor_conf
            .clone()
            .or_else(|| file.scan.rotor_conf.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROTOR_CONF));
        Some((conf, position))
    }

    /// Merge the command line over the config file.
    pub(crate) fn scan_options(&self, file: &ConfigFile) -> Result<ScanOptions, ConfigError> {
        let scan = &file.scan;
        let out = &file.output;

        let disable = match self.disable.as_deref().or(scan.disable.as_deref()) {
            None => None,
            Some(v @ ("S1" | "S2")) => Some(v),
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    option: "disable",
                    value: other.to_string(),
                })
            }
        };

        let inversion = match self.inversion.or(scan.inversion) {
            None => Inversion::Auto,
            Some(index) => {
                Inversion::from_index(index).ok_or_else(|| ConfigError::InvalidValue {
                    option: "inversion",
                    value: index.to_string(),
                })?
            }
        };

        let atsc_type = self.atsc_type.or(scan.atsc_type).unwrap_or(1);
        if !(1..=3).contains(&atsc_type) {
            return Err(ConfigError::InvalidValue {
                option: "atsc_type",
                value: atsc_type.to_string(),
            });
        }

        let defaults = ServiceSelection::default();
        let output = OutputOptions {
            format: self.output.or(out.format).unwrap_or_default(),
            selection: ServiceSelection {
                serv_select: self
                    .serv_select
                    .or(out.serv_select)
                    .unwrap_or(defaults.serv_select),
                ca_select: self
                    .ca_select
                    .or(out.ca_select)
                    .unwrap_or(defaults.ca_select),
            },
            unique_anon: flag(self.unique_anon, out.unique_anon),
            provider: flag(self.provider, out.provider),
            channel_numbers: flag(self.channel_numbers, out.channel_numbers),
            orbital_override: self
                .orbital_override
                .clone()
                .or_else(|| out.orbital_override.clone()),
            sat_number: self.sat_number.or(out.sat_number).unwrap_or(0),
        };

        Ok(ScanOptions {
            current_only: flag(self.current, scan.current_only),
            other_nits: flag(self.other_nits, scan.other_nits),
            long_timeout: flag(self.long_timeout, scan.long_timeout),
            skip_count: self.skip_count.or(scan.skip_count).unwrap_or(0),
            uk_ordering: flag(self.uk_ordering, scan.uk_ordering),
            no_psip: flag(self.no_psip, scan.no_psip),
            atsc_type,
            tuning: InitialTuningOptions {
                inversion,
                disable_s1: disable == Some("S1"),
                disable_s2: disable == Some("S2"),
                noauto: flag(self.noauto, scan.noauto),
            },
            lock_iterations: self
                .iterations
                .or(scan.iterations)
                .unwrap_or(DEFAULT_LOCK_ITERATIONS),
            output,
        })
    }
}
