//! Race session state machine.
//!
//! The game reports two nibbles per telemetry frame: a game state and a
//! session state. A race is in progress only while the game is `Racing` and
//! the session is `GreenFlag`; every other combination is "between sessions"
//! regardless of what came before. The tracker owns the per-race mutable
//! state and the transitions around it: mode and duration are decided once at
//! race start, the starting grid is captured exactly once while the clock has
//! not started, and the running classification is recomputed every frame once
//! it has.

use serde::Serialize;
use tracing::{debug, info};

use crate::packet::{RosterPacket, TelemetryPacket};
use crate::roster::RosterManager;

/// Threshold above which a reported time-remaining is garbage, not a duration.
const IMPLAUSIBLE_SECONDS: f32 = 100_000_000.0;

/// How a race ends: after a lap count or after a clock runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RaceMode {
    Laps { total: u8 },
    /// Timed race. Ending a timed race is signalled only by the session-state
    /// transition; no finish lap is inferred from the clock.
    Time { seconds: u32 },
}

/// Event identity strings carried by the primary roster frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub car_name: String,
    pub car_class: String,
    pub location: String,
    pub variation: String,
}

impl TrackInfo {
    pub fn from_packet(packet: &RosterPacket) -> Self {
        Self {
            car_name: packet.car_name.clone(),
            car_class: packet.car_class.clone(),
            location: packet.track_location.clone(),
            variation: packet.track_variation.clone(),
        }
    }
}

/// One entry of a position ordering (grid or classification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub position: Option<u8>,
    pub name: Option<String>,
}

/// Mutable per-race state. Reset to empty when the engine leaves "in
/// progress", after the race's report is finalized.
#[derive(Debug, Clone)]
pub struct RaceSession {
    race_number: u32,
    track: Option<TrackInfo>,
    mode: Option<RaceMode>,
    current_lap: u8,
    starting_grid: Vec<Standing>,
    classification: Vec<Standing>,
}

impl RaceSession {
    fn new(race_number: u32) -> Self {
        Self {
            race_number,
            track: None,
            mode: None,
            current_lap: 0,
            starting_grid: Vec::new(),
            classification: Vec::new(),
        }
    }

    pub fn race_number(&self) -> u32 {
        self.race_number
    }

    pub fn track(&self) -> Option<&TrackInfo> {
        self.track.as_ref()
    }

    pub fn mode(&self) -> Option<RaceMode> {
        self.mode
    }

    /// Lap the leader is currently on.
    pub fn current_lap(&self) -> u8 {
        self.current_lap
    }

    pub fn starting_grid(&self) -> &[Standing] {
        &self.starting_grid
    }

    pub fn classification(&self) -> &[Standing] {
        &self.classification
    }
}

/// Transition reported by [`SessionTracker::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Continue,
    RaceStarted,
    /// The race just left "in progress". The caller finalizes the report and
    /// then calls [`SessionTracker::conclude`].
    RaceFinished,
}

/// Tracks race-in-progress transitions and the per-race session state.
#[derive(Debug)]
pub struct SessionTracker {
    in_progress: bool,
    session: RaceSession,
    /// Most recent event identity seen, adopted by the next race to start.
    latest_track: Option<TrackInfo>,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self { in_progress: false, session: RaceSession::new(1), latest_track: None }
    }

    pub fn race_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn session(&self) -> &RaceSession {
        &self.session
    }

    /// Observe a telemetry frame's state nibbles and report the transition.
    pub fn transition(&mut self, frame: &TelemetryPacket) -> SessionEvent {
        let now = frame.race_in_progress();
        let event = match (self.in_progress, now) {
            (false, true) => {
                self.begin_race(frame);
                SessionEvent::RaceStarted
            }
            (true, false) => SessionEvent::RaceFinished,
            _ => SessionEvent::Continue,
        };
        self.in_progress = now;
        event
    }

    /// Per-frame update while the race is in progress. The roster has already
    /// absorbed this frame's samples.
    pub fn update(&mut self, frame: &TelemetryPacket, roster: &RosterManager) {
        self.session.current_lap = frame.leader_current_lap();

        if let Some(RaceMode::Time { seconds }) = self.session.mode {
            // The game occasionally reports garbage until the event
            // configuration settles; the duration only ever grows.
            let remaining = frame.event_time_remaining;
            if (0.0..IMPLAUSIBLE_SECONDS).contains(&remaining) {
                let whole_minutes = (remaining / 60.0).floor() as u32 * 60;
                if whole_minutes > seconds {
                    self.session.mode = Some(RaceMode::Time { seconds: whole_minutes });
                    debug!(seconds = whole_minutes, "timed race duration raised");
                }
            }
        }

        if frame.clock_started() {
            self.session.classification = standings(roster);
        } else if self.session.starting_grid.is_empty()
            && frame.participants.iter().any(|p| p.active && p.race_position > 0)
            && roster.participants().any(|p| p.name().is_some())
        {
            self.session.starting_grid = standings(roster);
            info!(entries = self.session.starting_grid.len(), "starting grid captured");
        }
    }

    /// Adopt event identity strings from a roster frame.
    pub fn set_track(&mut self, info: TrackInfo) {
        if self.in_progress {
            self.session.track = Some(info.clone());
        }
        self.latest_track = Some(info);
    }

    /// Close out a finished race after its report has been flushed: bump the
    /// race number and present a fresh, empty session.
    pub fn conclude(&mut self) {
        let next = self.session.race_number + 1;
        info!(race_number = next, "session reset; accepting a new race");
        self.session = RaceSession::new(next);
    }

    fn begin_race(&mut self, frame: &TelemetryPacket) {
        self.session.track = self.latest_track.clone();
        self.session.mode = Some(if frame.laps_in_event > 0 {
            RaceMode::Laps { total: frame.laps_in_event }
        } else {
            // Duration fills in from event_time_remaining as frames arrive.
            RaceMode::Time { seconds: 0 }
        });
        self.session.current_lap = 0;
        self.session.starting_grid.clear();
        self.session.classification.clear();
        info!(
            race_number = self.session.race_number,
            mode = ?self.session.mode,
            "race in progress"
        );
    }
}

/// Position ordering of the current roster: assigned positions first in
/// ascending order, then unplaced participants in roster order.
fn standings(roster: &RosterManager) -> Vec<Standing> {
    let mut placed: Vec<Standing> = Vec::new();
    let mut unplaced: Vec<Standing> = Vec::new();
    for participant in roster.participants() {
        let standing = Standing {
            position: participant.position(),
            name: participant.name().map(str::to_owned),
        };
        match standing.position {
            Some(_) => placed.push(standing),
            None => unplaced.push(standing),
        }
    }
    placed.sort_by_key(|s| s.position);
    placed.extend(unplaced);
    placed
}
