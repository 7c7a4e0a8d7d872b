//! Wire frame classification and decoding.
//!
//! The protocol carries no magic number; datagrams are classified purely by
//! their exact byte length and decoded into one of three typed frames:
//!
//! | Length | Frame |
//! |--------|-------|
//! | 1367   | [`TelemetryPacket`] |
//! | 1347   | [`RosterPacket`] |
//! | 1028   | [`AdditionalRosterPacket`] |
//!
//! Any other length is rejected with
//! [`MarshalError::UnrecognizedFrame`](crate::MarshalError::UnrecognizedFrame).
//! Decoding is pure: it never touches shared state, so a failed decode leaves
//! the engine exactly as it was.

mod cursor;
mod roster;
mod telemetry;

pub use cursor::PacketCursor;
pub use roster::{
    ADDITIONAL_ROSTER_FRAME_LEN, AdditionalRosterPacket, NAMES_PER_FRAME, ROSTER_FRAME_LEN,
    RosterPacket,
};
pub use telemetry::{
    GameState, NO_TIME, PARTICIPANT_SLOTS, ParticipantSample, SessionState, TELEMETRY_FRAME_LEN,
    TelemetryPacket,
};

use crate::{MarshalError, Result};

/// One decoded datagram payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Telemetry(TelemetryPacket),
    Roster(RosterPacket),
    AdditionalRoster(AdditionalRosterPacket),
}

impl Packet {
    /// Classify a raw datagram by exact length and decode it.
    pub fn decode(data: &[u8]) -> Result<Self> {
        match data.len() {
            TELEMETRY_FRAME_LEN => TelemetryPacket::decode(data).map(Packet::Telemetry),
            ROSTER_FRAME_LEN => RosterPacket::decode(data).map(Packet::Roster),
            ADDITIONAL_ROSTER_FRAME_LEN => {
                AdditionalRosterPacket::decode(data).map(Packet::AdditionalRoster)
            }
            other => Err(MarshalError::unrecognized_frame(other)),
        }
    }

    /// Frame kind for log and error context.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Telemetry(_) => "telemetry",
            Packet::Roster(_) => "roster",
            Packet::AdditionalRoster(_) => "additional roster",
        }
    }
}
