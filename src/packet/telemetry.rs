//! Telemetry frame decoding (1367-byte datagrams).
//!
//! The telemetry frame is the workhorse of the protocol: it carries the
//! game/session state machine nibbles, event configuration, and one 16-byte
//! sample per participant slot. Only the fields the reconciliation engine
//! consumes are decoded; the rest of the layout is skipped positionally.
//!
//! # Frame Layout (decoded fields)
//!
//! ```text
//! offset  type  field
//! 0       u16   build version
//! 2       u8    packet type (0)
//! 3       u8    game state (low nibble) / session state (high nibble)
//! 4       i16   num participants (-1 = unknown/unchanged)
//! 10      u8    race state flags
//! 11      u8    laps in event (0 = timed event)
//! 20      f32   current time (-1.0 until the clock starts)
//! 36      f32   event time remaining
//! 464     16B   participant sample array, 56 slots
//! 1360    f32   track length
//! ```
//!
//! Each participant sample packs three bitfields:
//! - race position byte: low 7 bits position, high bit active flag
//! - laps completed byte: low 7 bits count, high bit invalid-lap flag
//! - sector byte: low 3 bits sector index (legal values 1-3), rest reserved

use super::cursor::PacketCursor;
use crate::Result;

/// Exact length of a telemetry datagram.
pub const TELEMETRY_FRAME_LEN: usize = 1367;

/// Number of participant slots carried by every telemetry frame.
pub const PARTICIPANT_SLOTS: usize = 56;

/// Wire marker for "no time recorded yet".
pub const NO_TIME: f32 = -123.0;

const NUM_PARTICIPANTS_OFFSET: usize = 4;
const RACE_STATE_OFFSET: usize = 10;
const CURRENT_TIME_OFFSET: usize = 20;
const EVENT_TIME_REMAINING_OFFSET: usize = 36;
const PARTICIPANT_ARRAY_OFFSET: usize = 464;
const PARTICIPANT_SAMPLE_LEN: usize = 16;
const TRACK_LENGTH_OFFSET: usize = 1360;

const POSITION_MASK: u8 = 0x7F;
const ACTIVE_FLAG: u8 = 0x80;
const LAPS_MASK: u8 = 0x7F;
const INVALID_LAP_FLAG: u8 = 0x80;
const SECTOR_MASK: u8 = 0x07;

/// Game state from the low nibble of the state byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Exited,
    FrontEnd,
    Racing,
    Paused,
    Unknown(u8),
}

impl GameState {
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble {
            0 => GameState::Exited,
            1 => GameState::FrontEnd,
            2 => GameState::Racing,
            3 => GameState::Paused,
            other => GameState::Unknown(other),
        }
    }
}

/// Session state from the high nibble of the state byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Invalid,
    Practice,
    Test,
    Qualify,
    FormationLap,
    GreenFlag,
    TimeAttack,
    Unknown(u8),
}

impl SessionState {
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble {
            0 => SessionState::Invalid,
            1 => SessionState::Practice,
            2 => SessionState::Test,
            3 => SessionState::Qualify,
            4 => SessionState::FormationLap,
            5 => SessionState::GreenFlag,
            6 => SessionState::TimeAttack,
            other => SessionState::Unknown(other),
        }
    }
}

/// One participant slot's sample within a telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticipantSample {
    /// High bit of the race position byte: slot currently holds a participant.
    pub active: bool,
    /// Race position, 1-based; 0 until the game assigns one.
    pub race_position: u8,
    pub laps_completed: u8,
    /// High bit of the laps byte: the lap in progress has been invalidated.
    pub lap_invalidated: bool,
    /// Lap currently being driven, 1-based.
    pub current_lap: u8,
    /// Sector currently being driven, legal values 1-3.
    pub sector: u8,
    /// Completion time of the most recently finished sector; [`NO_TIME`] until
    /// the first sector of the event is complete.
    pub last_sector_time: f32,
}

/// Decoded telemetry frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPacket {
    pub build_version: u16,
    pub packet_type: u8,
    pub game_state: GameState,
    pub session_state: SessionState,
    /// Signed: -1 means the count is unknown/unchanged this frame.
    pub num_participants: i16,
    pub race_state_flags: u8,
    /// Lap target for the event; 0 means the event is time-based.
    pub laps_in_event: u8,
    /// In-game clock; -1.0 until the race clock starts.
    pub current_time: f32,
    pub event_time_remaining: f32,
    pub track_length: f32,
    /// All 56 slots, in wire order. Slots beyond the active roster carry
    /// garbage and must be gated on [`ParticipantSample::active`].
    pub participants: Vec<ParticipantSample>,
}

impl TelemetryPacket {
    /// Decode a telemetry frame. The caller has already classified the buffer
    /// by its exact length.
    pub fn decode(data: &[u8]) -> Result<Self> {
        debug_assert_eq!(data.len(), TELEMETRY_FRAME_LEN);
        let mut cursor = PacketCursor::new(data, "telemetry");

        let build_version = cursor.u16_le()?;
        let packet_type = cursor.u8()?;
        let state = cursor.u8()?;
        let game_state = GameState::from_nibble(state & 0x0F);
        let session_state = SessionState::from_nibble(state >> 4);

        cursor.seek(NUM_PARTICIPANTS_OFFSET)?;
        let num_participants = cursor.i16_le()?;

        cursor.seek(RACE_STATE_OFFSET)?;
        let race_state_flags = cursor.u8()?;
        let laps_in_event = cursor.u8()?;

        cursor.seek(CURRENT_TIME_OFFSET)?;
        let current_time = cursor.f32_le()?;
        cursor.seek(EVENT_TIME_REMAINING_OFFSET)?;
        let event_time_remaining = cursor.f32_le()?;

        let mut participants = Vec::with_capacity(PARTICIPANT_SLOTS);
        for slot in 0..PARTICIPANT_SLOTS {
            cursor.seek(PARTICIPANT_ARRAY_OFFSET + slot * PARTICIPANT_SAMPLE_LEN + 8)?;
            let position_byte = cursor.u8()?;
            let laps_byte = cursor.u8()?;
            let current_lap = cursor.u8()?;
            let sector_byte = cursor.u8()?;
            let last_sector_time = cursor.f32_le()?;
            participants.push(ParticipantSample {
                active: position_byte & ACTIVE_FLAG != 0,
                race_position: position_byte & POSITION_MASK,
                laps_completed: laps_byte & LAPS_MASK,
                lap_invalidated: laps_byte & INVALID_LAP_FLAG != 0,
                current_lap,
                sector: sector_byte & SECTOR_MASK,
                last_sector_time,
            });
        }

        cursor.seek(TRACK_LENGTH_OFFSET)?;
        let track_length = cursor.f32_le()?;

        Ok(Self {
            build_version,
            packet_type,
            game_state,
            session_state,
            num_participants,
            race_state_flags,
            laps_in_event,
            current_time,
            event_time_remaining,
            track_length,
            participants,
        })
    }

    /// A race is in progress only while the game is racing under green flag.
    pub fn race_in_progress(&self) -> bool {
        self.game_state == GameState::Racing && self.session_state == SessionState::GreenFlag
    }

    /// Whether the in-game race clock has started counting.
    pub fn clock_started(&self) -> bool {
        self.current_time >= 0.0
    }

    /// Number of slots currently flagged active by the game.
    pub fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| p.active).count()
    }

    /// Lap the race leader is on: the maximum current lap over active slots.
    pub fn leader_current_lap(&self) -> u8 {
        self.participants
            .iter()
            .filter(|p| p.active)
            .map(|p| p.current_lap)
            .max()
            .unwrap_or(0)
    }
}
