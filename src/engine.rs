//! Race-state reconciliation engine.
//!
//! One engine owns one session tracker and one roster manager, and consumes
//! raw datagrams strictly in arrival order. Each `apply_*` call is atomic
//! with respect to the state it touches: an undecodable datagram is discarded
//! with prior state untouched, while sequence and reconciliation violations
//! surface as fatal errors because continuing would attribute lap history to
//! the wrong driver.

use tracing::{debug, trace, warn};

use crate::packet::{Packet, TelemetryPacket};
use crate::report::Report;
use crate::roster::RosterManager;
use crate::session::{RaceMode, SessionEvent, SessionTracker, TrackInfo};
use crate::Result;

/// Decodes frames and reconciles race state.
///
/// Single-threaded by design: exactly one owner feeds it frames, and no call
/// suspends mid-reconciliation. A pending roster change spans multiple frames
/// but is carried as state, never as a blocking wait.
#[derive(Debug, Default)]
pub struct MarshalEngine {
    tracker: SessionTracker,
    roster: RosterManager,
}

impl MarshalEngine {
    pub fn new() -> Self {
        Self { tracker: SessionTracker::new(), roster: RosterManager::new() }
    }

    /// Classify, decode and apply one raw datagram.
    ///
    /// Returns the finalized report when this frame ended a race. Decode
    /// failures are reported and swallowed (the datagram is discarded, state
    /// is untouched); fatal errors propagate.
    pub fn apply_bytes(&mut self, data: &[u8]) -> Result<Option<Report>> {
        match Packet::decode(data) {
            Ok(packet) => self.apply_packet(packet),
            Err(error) => {
                warn!(%error, length = data.len(), "discarding undecodable datagram");
                Ok(None)
            }
        }
    }

    /// Apply one decoded frame.
    pub fn apply_packet(&mut self, packet: Packet) -> Result<Option<Report>> {
        trace!(kind = packet.kind(), "applying frame");
        match packet {
            Packet::Telemetry(frame) => self.apply_telemetry(&frame),
            Packet::Roster(frame) => {
                self.tracker.set_track(TrackInfo::from_packet(&frame));
                self.roster.apply_roster(&frame)?;
                Ok(None)
            }
            Packet::AdditionalRoster(frame) => {
                self.roster.apply_additional_roster(&frame)?;
                Ok(None)
            }
        }
    }

    /// Project the current race state. Pure; safe to call on every frame.
    pub fn snapshot(&self) -> Report {
        Report::project(self.tracker.session(), &self.roster)
    }

    pub fn race_in_progress(&self) -> bool {
        self.tracker.race_in_progress()
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn roster(&self) -> &RosterManager {
        &self.roster
    }

    fn apply_telemetry(&mut self, frame: &TelemetryPacket) -> Result<Option<Report>> {
        match self.tracker.transition(frame) {
            SessionEvent::RaceFinished => {
                // Project before anything resets; the report owns its data.
                let report = self.snapshot();
                debug!(
                    race_number = report.race.race_number,
                    laps = report.laps.len(),
                    "race finished; report finalized"
                );
                self.tracker.conclude();
                self.roster.reset();
                return Ok(Some(report));
            }
            SessionEvent::RaceStarted => {
                if let Some(RaceMode::Laps { total }) = self.tracker.session().mode() {
                    self.roster.set_planned_laps(total);
                }
            }
            SessionEvent::Continue => {}
        }

        // The roster follows the declared count whether or not a race is
        // running, so names arriving between sessions have somewhere to land.
        self.roster.reconcile_count(frame.num_participants, frame.active_count())?;

        if self.tracker.race_in_progress() {
            self.apply_samples(frame);
            self.tracker.update(frame, &self.roster);
        }
        Ok(None)
    }

    /// Fold one frame's participant samples into the active roster.
    fn apply_samples(&mut self, frame: &TelemetryPacket) {
        let slots = self.roster.len().min(frame.participants.len());
        for slot in 0..slots {
            let sample = frame.participants[slot];
            let Some(participant) = self.roster.participant_mut(slot) else {
                continue;
            };
            if sample.race_position > 0 {
                participant.record_position(sample.current_lap, sample.race_position);
            }
            match sample.sector {
                1..=3 => participant.timing_mut().add_sector_time(
                    sample.current_lap,
                    sample.sector,
                    sample.last_sector_time,
                    sample.lap_invalidated,
                ),
                other => debug!(slot, sector = other, "ignoring sample with illegal sector"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MarshalError;
    use crate::test_utils::{TelemetryFrameBuilder, roster_frame};

    #[test]
    fn undecodable_datagram_leaves_state_untouched() {
        let mut engine = MarshalEngine::new();
        let frame =
            TelemetryFrameBuilder::new().num_participants(3).grid(3).build();
        engine.apply_bytes(&frame).unwrap();
        let before = engine.snapshot();

        assert!(engine.apply_bytes(&[0u8; 500]).unwrap().is_none());

        assert_eq!(engine.snapshot(), before);
        assert_eq!(engine.roster().len(), 3);
    }

    #[test]
    fn names_before_any_telemetry_are_fatal() {
        let mut engine = MarshalEngine::new();
        let names = roster_frame("Car", "Class", "Track", "Variant", &["A"]);
        let err = engine.apply_bytes(&names).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, MarshalError::Sequence { .. }));
    }

    #[test]
    fn race_end_emits_report_and_resets_roster() {
        let mut engine = MarshalEngine::new();
        engine
            .apply_bytes(&TelemetryFrameBuilder::new().num_participants(2).grid(2).build())
            .unwrap();
        engine
            .apply_bytes(&roster_frame("Car", "Class", "Track", "Variant", &["A", "B"]))
            .unwrap();
        engine
            .apply_bytes(
                &TelemetryFrameBuilder::racing().num_participants(2).laps_in_event(3).grid(2).build(),
            )
            .unwrap();
        assert!(engine.race_in_progress());

        let finished = engine
            .apply_bytes(&TelemetryFrameBuilder::new().game_session(2, 0).build())
            .unwrap()
            .expect("leaving green flag finalizes the race");
        assert_eq!(finished.race.race_number, 1);
        assert!(!engine.race_in_progress());
        assert_eq!(engine.tracker().session().race_number(), 2);
        assert_eq!(engine.roster().len(), 0);
    }

    #[test]
    fn lap_race_presizes_new_participants() {
        let mut engine = MarshalEngine::new();
        engine
            .apply_bytes(
                &TelemetryFrameBuilder::racing().num_participants(2).laps_in_event(8).grid(2).build(),
            )
            .unwrap();
        assert_eq!(
            engine.roster().participant(0).unwrap().timing().planned_laps(),
            Some(8)
        );
    }

    #[test]
    fn illegal_sector_samples_are_skipped() {
        let mut engine = MarshalEngine::new();
        let frame = TelemetryFrameBuilder::racing()
            .num_participants(1)
            .sample(0, |s| {
                s.active = true;
                s.race_position = 1;
                s.current_lap = 1;
                s.sector = 0;
                s.last_sector_time = 30.0;
            })
            .build();
        engine.apply_bytes(&frame).unwrap();
        assert!(engine.roster().participant(0).unwrap().timing().records().is_empty());
    }
}
