//! Marshal report engine for Project CARS UDP telemetry.
//!
//! Marshal ingests the fixed-layout binary telemetry the game broadcasts over
//! UDP and reconstructs a consistent, time-ordered view of race state:
//! participant roster, lap and sector timing, and running classification,
//! projected into a JSON marshal report.
//!
//! # Features
//!
//! - **Frame decoding**: length-classified binary frames into typed records
//! - **Race reconciliation**: timing history survives mid-race roster changes
//! - **Live or replay**: a UDP socket and a `pdata` capture directory are
//!   indistinguishable to the engine
//! - **Streamed reports**: throttleable live snapshots plus one finalized
//!   report per race
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use marshal::{Marshal, UpdateRate};
//!
//! #[tokio::main]
//! async fn main() -> marshal::Result<()> {
//!     let connection = Marshal::replay("packetdata-20150720-hockenheim").await?;
//!     let mut reports = connection.report_stream(UpdateRate::Max(1));
//!
//!     while let Some(report) = reports.next().await {
//!         println!("race {} lap {:?}", report.race.race_number, report.laps.last());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For synchronous, frame-at-a-time control (tests, tooling), drive a
//! [`MarshalEngine`] directly with raw datagrams.

// Core decoding and reconciliation
pub mod engine;
mod error;
pub mod packet;
pub mod report;
pub mod roster;
pub mod session;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod timing;

// Stream-based pipeline
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;

// Core exports
pub use engine::MarshalEngine;
pub use error::{MarshalError, Result};
pub use packet::{
    AdditionalRosterPacket, GameState, Packet, ParticipantSample, RosterPacket, SessionState,
    TelemetryPacket,
};
pub use report::Report;
pub use roster::{Participant, ParticipantId, RosterManager};
pub use session::{RaceMode, RaceSession, SessionEvent, SessionTracker, TrackInfo};
pub use timing::{SectorRecord, SectorTimes};

// Pipeline exports
pub use connection::Connection;
pub use provider::PacketSource;
pub use providers::{CaptureSource, UdpSource};
pub use stream::UpdateRate;

/// Unified entry point for marshal report connections.
///
/// # Examples
///
/// ## Live telemetry
/// ```rust,no_run
/// use marshal::Marshal;
///
/// #[tokio::main]
/// async fn main() -> marshal::Result<()> {
///     let connection = Marshal::listen(marshal::providers::live::DEFAULT_PORT).await?;
///     // Use connection...
///     Ok(())
/// }
/// ```
///
/// ## Capture replay
/// ```rust,no_run
/// use marshal::Marshal;
///
/// #[tokio::main]
/// async fn main() -> marshal::Result<()> {
///     let connection = Marshal::replay("packetdata-20150720-113200").await?;
///     // Use connection...
///     Ok(())
/// }
/// ```
pub struct Marshal;

impl Marshal {
    /// Listen for live telemetry on a UDP port.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be bound.
    pub async fn listen(port: u16) -> Result<Connection> {
        Connection::listen(port).await
    }

    /// Replay a capture directory of `pdata<N>` files.
    ///
    /// The capture replays in numeric-suffix order, exactly as recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub async fn replay<P: AsRef<std::path::Path>>(directory: P) -> Result<Connection> {
        Connection::replay(directory).await
    }
}
