//! Marshal report projection.
//!
//! A [`Report`] is a pure function of the current race session and roster:
//! nothing here mutates engine state, so a report can be projected on every
//! frame (the live `output.json` view) as well as once at race end.
//!
//! The shape matches what the report renderers consume: a per-lap table of
//! position-ordered entries with sector and lap times, and a per-driver table
//! with aggregates and that driver's full lap list. Lap 0 is the starting
//! grid row. Missing values stay `null` — an absent sector must never read as
//! a zero-second sector.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::roster::{Participant, RosterManager};
use crate::session::{RaceMode, RaceSession, Standing, TrackInfo};
use crate::{MarshalError, Result};

/// Race identity attached to a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceSummary {
    pub race_number: u32,
    pub track: Option<TrackInfo>,
    #[serde(flatten)]
    pub mode: Option<RaceMode>,
}

/// One driver's row within a lap table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEntry {
    pub name: Option<String>,
    pub position: Option<u8>,
    pub sector_1: Option<f32>,
    pub sector_2: Option<f32>,
    pub sector_3: Option<f32>,
    pub lap_time: Option<f32>,
    pub invalid_lap: bool,
}

/// One lap's position-ordered table plus the lap's fastest valid times.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapReport {
    pub lap_number: u8,
    pub positions: Vec<PositionEntry>,
    pub best_sector_1: Option<f32>,
    pub best_sector_2: Option<f32>,
    pub best_sector_3: Option<f32>,
    pub best_lap_time: Option<f32>,
}

/// One lap from a single driver's perspective.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverLap {
    pub lap_number: u8,
    pub position: Option<u8>,
    pub sector_1: Option<f32>,
    pub sector_2: Option<f32>,
    pub sector_3: Option<f32>,
    pub lap_time: Option<f32>,
    pub invalid_lap: bool,
}

/// One driver's aggregates and lap list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriverReport {
    pub driver: Option<String>,
    pub position: Option<u8>,
    pub best_sector_1: Option<f32>,
    pub best_sector_2: Option<f32>,
    pub best_sector_3: Option<f32>,
    pub best_lap_time: Option<f32>,
    pub laps: Vec<DriverLap>,
}

/// The full marshal report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub race: RaceSummary,
    pub laps: Vec<LapReport>,
    pub drivers: Vec<DriverReport>,
}

impl Report {
    /// Project the current race state into a report.
    pub fn project(session: &RaceSession, roster: &RosterManager) -> Self {
        let race = RaceSummary {
            race_number: session.race_number(),
            track: session.track().cloned(),
            mode: session.mode(),
        };

        let mut laps = Vec::new();
        if session.current_lap() > 0 {
            laps.push(grid_row(session.starting_grid()));
            for lap in 1..session.current_lap() {
                laps.push(lap_report(lap, roster));
            }
        }

        let drivers = ordered(roster).into_iter().map(driver_report).collect();

        Report { race, laps, drivers }
    }

    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as JSON, the file the live timing page polls.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|source| MarshalError::file_error(path.to_path_buf(), source))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|source| {
            MarshalError::file_error(path.to_path_buf(), std::io::Error::other(source))
        })?;
        writer
            .flush()
            .map_err(|source| MarshalError::file_error(path.to_path_buf(), source))
    }
}

/// Lap 0: the starting grid, no times yet.
fn grid_row(grid: &[Standing]) -> LapReport {
    let positions = grid
        .iter()
        .map(|standing| PositionEntry {
            name: standing.name.clone(),
            position: standing.position,
            sector_1: None,
            sector_2: None,
            sector_3: None,
            lap_time: None,
            invalid_lap: false,
        })
        .collect();
    LapReport {
        lap_number: 0,
        positions,
        best_sector_1: None,
        best_sector_2: None,
        best_sector_3: None,
        best_lap_time: None,
    }
}

fn lap_report(lap: u8, roster: &RosterManager) -> LapReport {
    let positions: Vec<PositionEntry> = ordered_at_lap(lap, roster)
        .into_iter()
        .map(|participant| {
            let timing = participant.timing();
            PositionEntry {
                name: participant.name().map(str::to_owned),
                position: participant.position_at_lap(lap),
                sector_1: timing.sector_time(lap, 1),
                sector_2: timing.sector_time(lap, 2),
                sector_3: timing.sector_time(lap, 3),
                lap_time: timing.lap_time(lap),
                invalid_lap: timing.invalid_lap(lap),
            }
        })
        .collect();

    let best_sector = |sector: u8| {
        roster
            .participants()
            .filter_map(|p| p.timing().record(lap, sector))
            .filter(|r| !r.invalid)
            .map(|r| r.time)
            .min_by(f32::total_cmp)
    };
    let best_lap_time = roster
        .participants()
        .filter(|p| !p.timing().invalid_lap(lap))
        .filter_map(|p| p.timing().lap_time(lap))
        .min_by(f32::total_cmp);

    LapReport {
        lap_number: lap,
        positions,
        best_sector_1: best_sector(1),
        best_sector_2: best_sector(2),
        best_sector_3: best_sector(3),
        best_lap_time,
    }
}

fn driver_report(participant: &Participant) -> DriverReport {
    let timing = participant.timing();
    let last_lap = match timing.planned_laps() {
        Some(planned) => planned.max(timing.last_recorded_lap()),
        None => timing.last_recorded_lap(),
    };
    let laps = (1..=last_lap)
        .map(|lap| DriverLap {
            lap_number: lap,
            position: participant.position_at_lap(lap),
            sector_1: timing.sector_time(lap, 1),
            sector_2: timing.sector_time(lap, 2),
            sector_3: timing.sector_time(lap, 3),
            lap_time: timing.lap_time(lap),
            invalid_lap: timing.invalid_lap(lap),
        })
        .collect();

    DriverReport {
        driver: participant.name().map(str::to_owned),
        position: participant.position(),
        best_sector_1: timing.best_sector_time(1),
        best_sector_2: timing.best_sector_time(2),
        best_sector_3: timing.best_sector_time(3),
        best_lap_time: timing.best_lap_time(),
        laps,
    }
}

/// Roster ordered by current position; unplaced drivers keep roster order at
/// the back.
fn ordered(roster: &RosterManager) -> Vec<&Participant> {
    let (mut placed, unplaced): (Vec<_>, Vec<_>) =
        roster.participants().partition(|p| p.position().is_some());
    placed.sort_by_key(|p| p.position());
    placed.extend(unplaced);
    placed
}

/// Roster ordered by the position held at `lap`.
fn ordered_at_lap(lap: u8, roster: &RosterManager) -> Vec<&Participant> {
    let (mut placed, unplaced): (Vec<_>, Vec<_>) =
        roster.participants().partition(|p| p.position_at_lap(lap).is_some());
    placed.sort_by_key(|p| p.position_at_lap(lap));
    placed.extend(unplaced);
    placed
}
