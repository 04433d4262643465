//! Tuning and filter loop.

use dvbscan_model::{DeliverySystem, Transponder};
use log::{debug, error, info, warn};

use super::{apply_section, ScanContext, ATSC_CABLE, ATSC_TERRESTRIAL};
use crate::demux::{FilterScheduler, FilterSpec, SectionSource};
use crate::error::{Result, ScanError};
use crate::si::table_id;
use crate::tuner::{Tunable, TuneStatus};

fn interrupted() {
    error!("interrupted by SIGINT, dumping partial result...");
}

/// Scan every transponder reachable from `initial`.
///
/// Transponders found in NITs are appended to the pending set and scanned
/// in turn until nothing is left. A set cancel flag ends the scan early
/// with the results collected so far.
pub fn scan_network<T, S>(
    ctx: &mut ScanContext,
    tuner: &mut T,
    source: &mut S,
    initial: Vec<Transponder>,
) -> Result<()>
where
    T: Tunable + ?Sized,
    S: SectionSource + ?Sized,
{
    if initial.is_empty() {
        return Err(ScanError::InitialTuning(
            "no usable initial tuning data".to_string(),
        ));
    }
    for t in initial {
        ctx.registry.push_pending(t);
    }

    if !tune_to_next_transponder(ctx, tuner) {
        error!("initial tuning failed");
        return Err(ScanError::InitialTuning(
            "no transponder of the initial tuning data could be tuned".to_string(),
        ));
    }

    loop {
        if ctx.is_cancelled() {
            interrupted();
            break;
        }
        scan_tp(ctx, source)?;
        if ctx.is_cancelled() {
            interrupted();
            break;
        }
        if !tune_to_next_transponder(ctx, tuner) {
            break;
        }
    }
    Ok(())
}

/// Scan only the transponder the frontend is tuned to.
pub fn scan_current<T, S>(ctx: &mut ScanContext, tuner: &mut T, source: &mut S) -> Result<()>
where
    T: Tunable + ?Sized,
    S: SectionSource + ?Sized,
{
    let t = tuner.read_current_parameters()?;
    info!("scanning current transponder: {}", ctx.options.output.describe(&t));
    ctx.registry.push_current(t);
    scan_tp(ctx, source)?;
    if ctx.is_cancelled() {
        interrupted();
    }
    Ok(())
}

fn initial_filters(ctx: &ScanContext, system: DeliverySystem) -> Vec<FilterSpec> {
    let opts = &ctx.options;
    let long = opts.long_timeout;
    let mut filters = Vec::new();

    match system {
        DeliverySystem::Atsc | DeliverySystem::DvbCAnnexB => {
            if !opts.no_psip {
                if opts.atsc_type & ATSC_TERRESTRIAL != 0 {
                    filters.push(FilterSpec::vct(table_id::ATSC_TVCT, long));
                }
                if opts.atsc_type & ATSC_CABLE != 0 {
                    filters.push(FilterSpec::vct(table_id::ATSC_CVCT, long));
                }
            }
            filters.push(FilterSpec::pat(long));
        }
        _ => {
            filters.push(FilterSpec::pat(long));
            filters.push(FilterSpec::sdt_actual(long));
            if !opts.current_only {
                filters.push(FilterSpec::nit_actual(long));
            }
            if opts.other_nits {
                filters.push(FilterSpec::nit_other(long));
            }
            if ctx.bouquets.is_some() {
                filters.push(FilterSpec::bat(long));
            }
        }
    }
    filters
}

/// Read the tables of the current transponder until every filter is done.
pub fn scan_tp<S: SectionSource + ?Sized>(ctx: &mut ScanContext, source: &mut S) -> Result<()> {
    let Some(current) = ctx.registry.current() else {
        warn!("no transponder to scan");
        return Ok(());
    };
    let system = current.delivery_system;
    let frequency = current.frequency;

    ctx.reset_pmt_requests();
    let mut sched = FilterScheduler::new(ctx.options.skip_count)
        .with_poll_interval(ctx.poll_interval());
    for spec in initial_filters(ctx, system) {
        sched.add(source, spec);
    }

    while sched.has_running() {
        if ctx.is_cancelled() {
            sched.clear(source);
            return Ok(());
        }
        for ready in sched.poll_round(source)? {
            for spec in apply_section(ctx, &ready.section()) {
                sched.add(source, spec);
            }
        }
        let services = ctx.registry.current().map_or(0, |t| t.services.len());
        ctx.progress(format!(
            "f={} {} services, {} transponders pending",
            frequency,
            services,
            ctx.registry.pending().len()
        ));
    }
    sched.clear(source);
    Ok(())
}

/// Tune to the scanned transponder at `index`, retrying once.
fn tune_to_transponder<T: Tunable + ?Sized>(
    ctx: &mut ScanContext,
    tuner: &mut T,
    index: usize,
) -> bool {
    let t = ctx.registry.scanned()[index].clone();

    if t.delivery_system == DeliverySystem::Undefined {
        error!("Unsupported Delivery system {}", t.delivery_system);
        ctx.registry.scanned_mut()[index].last_tuning_failed = true;
        return false;
    }
    info!("----------------------------------> Using {}", t.delivery_system);

    if let Some(rotor) = ctx.rotor.as_mut() {
        rotor.rotate_for(&t);
    }

    for attempt in 0..2 {
        info!(">>> tune to: {}", ctx.options.output.describe(&t));
        let status = match tuner.tune(&t) {
            Ok(status) => status,
            Err(e) => {
                warn!("tuning f={} failed: {}", t.frequency, e);
                TuneStatus::Failed
            }
        };
        match status {
            TuneStatus::Locked => {
                ctx.registry.scanned_mut()[index].last_tuning_failed = false;
                ctx.registry.remove_duplicates(&t);
                return true;
            }
            TuneStatus::Failed => {
                warn!(">>> tuning failed!!!");
                if attempt == 0 {
                    debug!("retrying f={}", t.frequency);
                }
            }
        }
    }
    ctx.registry.scanned_mut()[index].last_tuning_failed = true;
    false
}

/// Move pending transponders to the scanned set until one locks, trying
/// the alternate frequencies of each before giving up on it.
fn tune_to_next_transponder<T: Tunable + ?Sized>(ctx: &mut ScanContext, tuner: &mut T) -> bool {
    while let Some(index) = ctx.registry.take_next_pending() {
        loop {
            if tune_to_transponder(ctx, tuner, index) {
                return true;
            }
            if ctx.registry.next_alternate(index).is_none() {
                break;
            }
        }
    }
    false
}
