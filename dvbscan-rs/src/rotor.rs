//! Rotor position table.
//!
//! `rotor.conf` maps rotor step numbers to orbital positions, one
//! `<number> <angle><W|E>` pair per line:
//!
//! ```text
//! # Astra, Hotbird
//! 1 19.2E
//! 2 13.0E
//! 3 30.0W
//! ```

use std::fs;
use std::path::Path;

use dvbscan_model::Transponder;
use log::{error, info};

use crate::error::ConfigError;

/// Number of positions a rotor table can hold.
pub const ROTOR_SLOTS: usize = 49;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotorSlot {
    pub nn: u32,
    /// Angle as written in the file, e.g. `19.2E`.
    pub name: String,
    /// Tenths of a degree.
    pub orbital_position: u16,
    pub east: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotorTable {
    slots: Vec<RotorSlot>,
}

impl RotorTable {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Lines that do not start with a number and an angle are ignored, as
    /// is everything past the last slot.
    pub fn parse(text: &str) -> Self {
        let mut slots = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if slots.len() == ROTOR_SLOTS {
                break;
            }
            let mut fields = line.split_whitespace();
            let (Some(nn), Some(name)) = (fields.next(), fields.next()) else {
                continue;
            };
            let Ok(nn) = nn.parse::<u32>() else {
                continue;
            };
            let Some((orbital_position, east)) = parse_angle(name) else {
                continue;
            };
            slots.push(RotorSlot {
                nn,
                name: name.to_string(),
                orbital_position,
                east,
            });
        }
        RotorTable { slots }
    }

    pub fn slots(&self) -> &[RotorSlot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rotor number of an orbital position.
    pub fn nn(&self, orbital_position: u16, east: bool) -> Option<u32> {
        let found = self
            .slots
            .iter()
            .find(|s| s.orbital_position == orbital_position && s.east == east)
            .map(|s| s.nn);
        if found.is_none() {
            error!(
                "rotor_nn: orbital_pos={}, we_flag={} not found.",
                orbital_position, east as u8
            );
        }
        found
    }

    /// Rotor number of a position written as in the file, e.g. `19.2E`.
    pub fn name_to_nn(&self, name: &str) -> Option<u32> {
        let found = self.slots.iter().find(|s| s.name == name).map(|s| s.nn);
        if found.is_none() {
            error!("rotor_name2nn: '{}' not found.", name);
        }
        found
    }

    /// Angle of rotor number `nn` in whole degrees east, 0..360.
    pub fn angle(&self, nn: u32) -> Option<u32> {
        let found = self.slots.iter().find(|s| s.nn == nn).map(|s| {
            let degrees = u32::from(s.orbital_position) / 10;
            if s.east {
                degrees
            } else {
                360 - degrees
            }
        });
        if found.is_none() {
            error!("rotor_angle: nn={} not found", nn);
        }
        found
    }

    /// Resolve a `--rotor-position` argument: a rotor number or a name
    /// listed in the table.
    pub fn resolve(&self, position: &str) -> Result<u32, ConfigError> {
        if let Ok(nn) = position.parse::<u32>() {
            return Ok(nn);
        }
        self.name_to_nn(position)
            .ok_or_else(|| ConfigError::RotorPosition(position.to_string()))
    }
}

/// `19.2E` -> (192, true), `30W` -> (300, false).
fn parse_angle(name: &str) -> Option<(u16, bool)> {
    let split = name.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (degrees, direction) = name.split_at(split);
    let degrees: f32 = degrees.parse().ok()?;
    let east = !direction.starts_with(['W', 'w']);
    Some(((degrees * 10.0).round() as u16, east))
}

/// Rotor movement across a scan.
#[derive(Debug, Clone)]
pub struct RotorState {
    table: RotorTable,
    /// Position requested on the command line, 0 when the rotor is not
    /// driven.
    target: u32,
    current: u32,
}

impl RotorState {
    pub fn new(table: RotorTable, target: u32) -> Self {
        RotorState {
            table,
            target,
            current: 0,
        }
    }

    pub fn table(&self) -> &RotorTable {
        &self.table
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    /// Work out the rotor position for tuning `t` and record it as reached.
    /// Returns the new position when the rotor has to turn.
    pub fn rotate_for(&mut self, t: &Transponder) -> Option<u32> {
        if self.target == 0 {
            return None;
        }
        if t.orbital_position != 0 {
            self.target = self.table.nn(t.orbital_position, t.east).unwrap_or(0);
        }
        if self.target == 0 || self.target == self.current {
            return None;
        }
        match (self.table.angle(self.current), self.table.angle(self.target)) {
            (Some(from), Some(to)) => info!(
                "rotating rotor from {} ({}) to {} ({})",
                self.current, from, self.target, to
            ),
            _ => info!("rotating rotor from {} to {}", self.current, self.target),
        }
        self.current = self.target;
        Some(self.current)
    }
}
