//! dvbscan: DVB/ATSC network scanner.

use std::io;
use std::path::Path;
use std::sync::atomic::Ordering;

use clap::Parser;
use colored::Colorize;
use dvbscan::bouquet::BouquetEngine;
use dvbscan::config::{config_path, load_config, ConfigFile};
use dvbscan::demux::TsFileSource;
use dvbscan::output::OutputSummary;
use dvbscan::rotor::{RotorState, RotorTable};
use dvbscan::scan::{scan_current, scan_network, ScanContext};
use dvbscan::tuner::{CaptureFrontend, LockPolicy, UnsupportedFrontend};
use dvbscan::tuning_file::read_initial_tuning;
use dvbscan_model::Transponder;
use log::{error, info};

mod context;
mod logging;

use context::Cli;

/// Where distributions install initial tuning data.
const TUNING_DATA_DIRS: [&str; 3] = [
    "/usr/local/share/dvb",
    "/etc/dvb",
    "/usr/local/share/doc/packages/dvb",
];

fn list_initial_tuning_files() {
    let mut found = Vec::new();
    for dir in TUNING_DATA_DIRS {
        if let Ok(paths) = glob::glob(&format!("{}/dvb-?/*", dir)) {
            found.extend(paths.flatten());
        }
    }
    if found.is_empty() {
        return;
    }
    eprintln!("initial tuning data files found:");
    for path in found {
        eprintln!("  {}", path.display());
    }
}

fn print_summary(summary: &OutputSummary, ctx: &ScanContext) {
    let scanned = ctx.registry.scanned();
    let failed = scanned.iter().filter(|t| t.last_tuning_failed).count();
    eprintln!(
        "{} {} transponders, {} services written",
        "Done:".green().bold(),
        scanned.len() - failed,
        summary.services
    );
    if failed > 0 {
        eprintln!(
            "{} {} transponders could not be tuned",
            "Warning:".yellow().bold(),
            failed
        );
    }
    if let Some(b) = &summary.bouquets {
        eprintln!(
            "  {} bouquets, {} services mapped, {} unmapped, {} channels",
            b.bouquets, b.mapped, b.unmapped, b.channels
        );
    }
}

fn load_file_config(cli: &Cli) -> Result<ConfigFile, Box<dyn std::error::Error>> {
    match config_path(cli.config.as_deref()) {
        Some(path) => {
            let config = load_config(&path)?;
            eprintln!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(ConfigFile::default()),
    }
}

fn read_initial(
    path: Option<&Path>,
    ctx: &ScanContext,
) -> Result<Vec<Transponder>, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        if ctx.options.current_only {
            return Ok(Vec::new());
        }
        list_initial_tuning_files();
        return Err("no initial tuning data file given".into());
    };
    match read_initial_tuning(path, &ctx.options.tuning) {
        Ok(initial) => Ok(initial),
        Err(e) => {
            list_initial_tuning_files();
            Err(e.into())
        }
    }
}

fn run(cli: &Cli, file: &ConfigFile) -> Result<(), Box<dyn std::error::Error>> {
    let options = cli.scan_options(file)?;
    let lock = LockPolicy::new(options.lock_iterations);
    let mut ctx = ScanContext::new(options);

    if let Some(optstring) = cli.bouquets(file) {
        ctx = ctx.with_bouquets(BouquetEngine::parse(&optstring)?);
    }
    if let Some((conf, position)) = cli.rotor(file) {
        let table = RotorTable::load(&conf)?;
        let nn = table.resolve(&position)?;
        info!("rotor position {} from {}", nn, conf.display());
        ctx = ctx.with_rotor(RotorState::new(table, nn));
    }
    if cli.quiet > 0 {
        ctx = ctx.with_progress(logging::spinner());
    }

    let cancel = ctx.cancel_flag();
    ctrlc::set_handler(move || cancel.store(true, Ordering::SeqCst))?;

    let initial = read_initial(cli.initial_tuning(file).as_deref(), &ctx)?;

    let Some(ts_file) = cli.ts_file(file) else {
        // hardware frontends are not available, open reports why
        let err = match UnsupportedFrontend::open(cli.adapter, cli.frontend) {
            Err(e) => e,
            Ok(_) => io::Error::new(io::ErrorKind::Unsupported, "no demux for frontend"),
        };
        error!("adapter {} frontend {}: {}", cli.adapter, cli.frontend, err);
        return Err(err.into());
    };

    let mut source = TsFileSource::open_path(&ts_file)?;
    let recorded = initial
        .first()
        .cloned()
        .unwrap_or_else(|| Transponder::new(0));
    let mut tuner = CaptureFrontend::new(recorded, lock);

    let scanned = if ctx.options.current_only {
        scan_current(&mut ctx, &mut tuner, &mut source)
    } else {
        scan_network(&mut ctx, &mut tuner, &mut source, initial)
    };
    ctx.finish_progress();

    // partial results are written even when the scan ended early
    let stdout = io::stdout();
    let mut sink = ctx.options.output.sink(stdout.lock());
    let summary = ctx.write_output(sink.as_mut())?;
    drop(sink);
    print_summary(&summary, &ctx);

    scanned?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let file = match load_file_config(&cli) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            return Err(e);
        }
    };
    logging::init_logging(cli.verbose, cli.quiet, file.logging.level.as_deref());

    if let Err(e) = run(&cli, &file) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        return Err(e);
    }
    Ok(())
}
