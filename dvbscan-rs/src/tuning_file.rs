//! Initial tuning data files.
//!
//! One transponder per line, the first letter selecting the delivery
//! system:
//!
//! ```text
//! # freq pol sr fec rolloff mod stream_id
//! S1 11778000 V 27500000 3/4
//! S2 12551500 V 22000000 5/6 35 8PSK
//! # freq sr fec mod
//! C 346000000 6900000 NONE QAM64
//! # freq bw fec_hi fec_lo mod mode guard hierarchy plp
//! T 506000000 8MHz 2/3 NONE QAM64 8k 1/4 NONE
//! T2 546000000 8MHz AUTO AUTO AUTO AUTO AUTO AUTO 1
//! # freq mod
//! A 57028615 8VSB
//! ```
//!
//! Satellite frequencies are in kHz, all others in Hz. Lines that cannot be
//! used are reported and skipped.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use dvbscan_model::{
    Bandwidth, CodeRate, DeliverySystem, GuardInterval, Hierarchy, Inversion, Modulation,
    ModelError, Polarisation, Rolloff, TransmissionMode, Transponder,
};
use log::{debug, error, info};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_till1},
    character::complete::{char, digit1, hex_digit1, one_of, space0, space1},
    combinator::{eof, map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{pair, preceded, terminated},
    IResult,
};

use crate::error::{Result, ScanError, TuningFileError};

/// Code rates tried for satellite entries without a FEC when automatic
/// values are disabled. Only the first six are valid for DVB-S.
const SATELLITE_FECS: [CodeRate; 9] = [
    CodeRate::Fec1_2,
    CodeRate::Fec2_3,
    CodeRate::Fec3_4,
    CodeRate::Fec5_6,
    CodeRate::Fec7_8,
    CodeRate::Fec8_9,
    CodeRate::Fec3_5,
    CodeRate::Fec4_5,
    CodeRate::Fec9_10,
];
const DVBS_FEC_COUNT: usize = 6;

/// Settings that shape the transponders built from the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitialTuningOptions {
    pub inversion: Inversion,
    /// Do not try satellite entries as DVB-S.
    pub disable_s1: bool,
    /// Do not try satellite entries as DVB-S2.
    pub disable_s2: bool,
    /// Enumerate the values a satellite entry leaves open instead of
    /// tuning with AUTO.
    pub noauto: bool,
}

impl Default for InitialTuningOptions {
    fn default() -> Self {
        InitialTuningOptions {
            inversion: Inversion::Auto,
            disable_s1: false,
            disable_s2: false,
            noauto: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    /// `S`, `S1` or `S2`: which of DVB-S and DVB-S2 the line asks for.
    Satellite { s1: bool, s2: bool },
    Cable,
    Terrestrial { t2: bool },
    Atsc,
}

fn entry_kind(input: &str) -> IResult<&str, EntryKind> {
    alt((
        value(EntryKind::Satellite { s1: true, s2: false }, tag("S1")),
        value(EntryKind::Satellite { s1: false, s2: true }, tag("S2")),
        value(EntryKind::Satellite { s1: true, s2: true }, char('S')),
        value(EntryKind::Terrestrial { t2: true }, tag("T2")),
        value(EntryKind::Terrestrial { t2: false }, char('T')),
        value(EntryKind::Cable, char('C')),
        value(EntryKind::Atsc, char('A')),
    ))(input)
}

fn field(input: &str) -> IResult<&str, &str> {
    preceded(space1, take_till1(char::is_whitespace))(input)
}

/// Entry kind followed by its whitespace separated fields.
fn entry(input: &str) -> IResult<&str, (EntryKind, Vec<&str>)> {
    terminated(pair(entry_kind, many0(field)), pair(space0, eof))(input)
}

fn decimal(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

/// `%i` style integer: decimal, optionally negative, or `0x` hex.
fn integer(input: &str) -> IResult<&str, i64> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |h| {
            i64::from_str_radix(h, 16)
        }),
        map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>),
    ))(input)
}

fn polarisation(input: &str) -> IResult<&str, Polarisation> {
    map(one_of("HVLR"), |c| match c {
        'H' | 'L' => Polarisation::Horizontal,
        _ => Polarisation::Vertical,
    })(input)
}

fn whole<'a, T, F>(mut parser: F, text: &'a str) -> Option<T>
where
    F: FnMut(&'a str) -> IResult<&'a str, T>,
{
    match parser(text) {
        Ok(("", v)) => Some(v),
        _ => None,
    }
}

/// Stream / PLP ids outside 0..=255 mean "no stream id".
fn stream_id(text: Option<&&str>) -> Option<u8> {
    text.and_then(|t| whole(integer, t))
        .and_then(|v| u8::try_from(v).ok())
}

struct LineParser<'a> {
    line: usize,
    text: &'a str,
}

impl<'a> LineParser<'a> {
    fn syntax(&self) -> TuningFileError {
        TuningFileError::Syntax {
            line: self.line,
            text: self.text.to_string(),
        }
    }

    fn number(&self, field: Option<&&str>) -> std::result::Result<u32, TuningFileError> {
        field
            .and_then(|f| whole(decimal, f))
            .ok_or_else(|| self.syntax())
    }

    fn named<T>(&self, field: Option<&&str>) -> std::result::Result<Option<T>, TuningFileError>
    where
        T: FromStr<Err = ModelError>,
    {
        field
            .map(|f| f.parse::<T>())
            .transpose()
            .map_err(|source| TuningFileError::Value {
                line: self.line,
                source,
            })
    }
}

/// Transponders described by one line; comments and blank lines give none.
pub fn parse_line(
    line: usize,
    text: &str,
    opts: &InitialTuningOptions,
) -> std::result::Result<Vec<Transponder>, TuningFileError> {
    let text = text.trim_end();
    if text.is_empty() || text.starts_with('#') {
        return Ok(Vec::new());
    }
    let p = LineParser { line, text };
    let (_, (kind, fields)) = entry(text).map_err(|_| p.syntax())?;

    match kind {
        EntryKind::Satellite { s1, s2 } => satellite(&p, s1, s2, &fields, opts),
        EntryKind::Cable => cable(&p, &fields, opts).map(|t| vec![t]),
        EntryKind::Terrestrial { t2 } => terrestrial(&p, t2, &fields, opts).map(|t| vec![t]),
        EntryKind::Atsc => atsc(&p, &fields).map(|t| vec![t]),
    }
}

fn satellite(
    p: &LineParser<'_>,
    s1: bool,
    s2: bool,
    fields: &[&str],
    opts: &InitialTuningOptions,
) -> std::result::Result<Vec<Transponder>, TuningFileError> {
    let frequency = p.number(fields.first())?;
    let (pol_char, pol) = fields
        .get(1)
        .and_then(|f| Some((f.chars().next()?, whole(polarisation, f)?)))
        .ok_or_else(|| p.syntax())?;
    let symbol_rate = p.number(fields.get(2))?;
    let fec = p.named::<CodeRate>(fields.get(3))?;
    let rolloff = p.named::<Rolloff>(fields.get(4))?;
    let modulation = p.named::<Modulation>(fields.get(5))?;
    let stream_id = stream_id(fields.get(6));

    let s1 = s1 && !opts.disable_s1;
    let s2 = s2 && !opts.disable_s2;
    if !s1 && !s2 {
        debug!("line {}: satellite entry disabled", p.line);
        return Ok(Vec::new());
    }
    let s1_only = s1 && !s2;

    let mut systems = Vec::with_capacity(2);
    if s1 {
        systems.push(DeliverySystem::DvbS);
    }
    if s2 {
        systems.push(DeliverySystem::DvbS2);
    }

    let modulations = match modulation {
        Some(m) => vec![m],
        None if opts.noauto && s1_only => vec![Modulation::Qpsk],
        None if opts.noauto => vec![Modulation::Qpsk, Modulation::Psk8],
        None => vec![Modulation::Auto],
    };
    let rolloffs = match rolloff {
        Some(r) => vec![r],
        None if opts.noauto && s1_only => vec![Rolloff::R35],
        None if opts.noauto => vec![Rolloff::R35, Rolloff::R25, Rolloff::R20],
        None => vec![Rolloff::Auto],
    };
    let fecs: &[CodeRate] = match fec {
        Some(ref f) => std::slice::from_ref(f),
        None if opts.noauto && s2 => &SATELLITE_FECS,
        None if opts.noauto => &SATELLITE_FECS[..DVBS_FEC_COUNT],
        None => &[CodeRate::Auto],
    };

    let mut out = Vec::new();
    for &system in &systems {
        let dvbs = system == DeliverySystem::DvbS;
        for (ifec, &fec) in fecs.iter().enumerate() {
            if dvbs && ifec >= DVBS_FEC_COUNT {
                continue;
            }
            for &rolloff in &rolloffs {
                if dvbs && matches!(rolloff, Rolloff::R25 | Rolloff::R20) {
                    continue;
                }
                for &modulation in &modulations {
                    if dvbs && modulation == Modulation::Psk8 {
                        continue;
                    }
                    let t = Transponder {
                        frequency,
                        symbol_rate,
                        polarisation: pol,
                        inversion: opts.inversion,
                        delivery_system: system,
                        fec,
                        rolloff,
                        modulation,
                        stream_id,
                        ..Default::default()
                    };
                    info!(
                        "initial transponder DVB-S{} {} {} {} {} {} {} {}",
                        if dvbs { " " } else { "2" },
                        t.frequency,
                        pol_char,
                        t.symbol_rate,
                        t.fec,
                        t.rolloff,
                        t.modulation,
                        stream_id.map_or(-1, i32::from)
                    );
                    out.push(t);
                }
            }
        }
    }
    Ok(out)
}

fn cable(
    p: &LineParser<'_>,
    fields: &[&str],
    opts: &InitialTuningOptions,
) -> std::result::Result<Transponder, TuningFileError> {
    let t = Transponder {
        frequency: p.number(fields.first())?,
        symbol_rate: p.number(fields.get(1))?,
        delivery_system: DeliverySystem::DvbCAnnexAC,
        inversion: opts.inversion,
        fec: p.named(fields.get(2))?.unwrap_or(CodeRate::Auto),
        modulation: p.named(fields.get(3))?.unwrap_or(Modulation::Auto),
        ..Default::default()
    };
    info!(
        "initial transponder {} {} {} {}",
        t.frequency, t.symbol_rate, t.fec, t.modulation
    );
    Ok(t)
}

fn terrestrial(
    p: &LineParser<'_>,
    t2: bool,
    fields: &[&str],
    opts: &InitialTuningOptions,
) -> std::result::Result<Transponder, TuningFileError> {
    // FEC NONE is tuned as AUTO
    let code_rate = |c: Option<CodeRate>| match c {
        None | Some(CodeRate::None) => CodeRate::Auto,
        Some(c) => c,
    };
    let t = Transponder {
        frequency: p.number(fields.first())?,
        delivery_system: if t2 {
            DeliverySystem::DvbT2
        } else {
            DeliverySystem::DvbT
        },
        inversion: opts.inversion,
        bandwidth: p.named(fields.get(1))?.unwrap_or(Bandwidth::Auto),
        fec_hp: code_rate(p.named(fields.get(2))?),
        fec_lp: code_rate(p.named(fields.get(3))?),
        modulation: p.named(fields.get(4))?.unwrap_or(Modulation::Auto),
        transmission_mode: p.named(fields.get(5))?.unwrap_or(TransmissionMode::Auto),
        guard_interval: p.named(fields.get(6))?.unwrap_or(GuardInterval::Auto),
        hierarchy: p.named(fields.get(7))?.unwrap_or(Hierarchy::Auto),
        stream_id: stream_id(fields.get(8)),
        ..Default::default()
    };
    info!(
        "initial transponder {} {} {} {} {} {} {} {} {}",
        t.frequency,
        t.bandwidth,
        t.fec_hp,
        t.fec_lp,
        t.modulation,
        t.transmission_mode,
        t.guard_interval,
        t.hierarchy,
        t.stream_id.map_or(-1, i32::from)
    );
    Ok(t)
}

fn atsc(p: &LineParser<'_>, fields: &[&str]) -> std::result::Result<Transponder, TuningFileError> {
    let t = Transponder {
        frequency: p.number(fields.first())?,
        delivery_system: DeliverySystem::Atsc,
        modulation: p.named(fields.get(1))?.unwrap_or(Modulation::Auto),
        ..Default::default()
    };
    info!("initial transponder {} {}", t.frequency, t.modulation);
    Ok(t)
}

/// Parse a whole file, collecting the transponders of every usable line
/// and the errors of the others.
pub fn parse_str(
    text: &str,
    opts: &InitialTuningOptions,
) -> (Vec<Transponder>, Vec<TuningFileError>) {
    let mut transponders = Vec::new();
    let mut errors = Vec::new();
    for (index, line) in text.lines().enumerate() {
        match parse_line(index + 1, line, opts) {
            Ok(mut t) => transponders.append(&mut t),
            Err(e) => errors.push(e),
        }
    }
    (transponders, errors)
}

/// Read an initial tuning data file. Bad lines are logged and skipped.
pub fn read_initial_tuning<P: AsRef<Path>>(
    path: P,
    opts: &InitialTuningOptions,
) -> Result<Vec<Transponder>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        error!("cannot open '{}': {}", path.display(), e);
        ScanError::Io(e)
    })?;
    let (transponders, errors) = parse_str(&text, opts);
    for e in &errors {
        error!("{}: {}", path.display(), e);
    }
    Ok(transponders)
}
