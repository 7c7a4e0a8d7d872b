//! Roster ownership and slot reconciliation.
//!
//! Slots in the wire protocol are positional, not identities: when a
//! participant drops out mid-race the game moves the *last* slot's driver into
//! the vacated slot and shrinks the count, so every subsequent frame indexes
//! drivers differently. The roster manager keeps timing history attached to
//! the driver rather than the slot.
//!
//! Participants live in an arena and are referenced by stable
//! [`ParticipantId`]s; rosters are slot-to-identity maps, so archiving a
//! roster is a cheap snapshot and no history is ever destroyed.
//!
//! A size decrease cannot be resolved immediately: names for the shrunken
//! roster trickle in over several frames. The manager stages a temporary
//! roster, routes all lookups to it, and once every staged slot is named,
//! diffs the old and new name lists to discover which driver departed, then
//! folds the staged timing data into the surviving identities.

use std::collections::BTreeMap;

use tracing::{debug, trace, warn};

use crate::packet::{AdditionalRosterPacket, RosterPacket};
use crate::timing::SectorTimes;
use crate::{MarshalError, Result};

/// Stable identity of a participant within one engine run.
///
/// Slots hold identifiers, not values; identity (and its timing history)
/// follows the driver across slot reassignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId(usize);

/// One driver's state: name, current position, per-lap positions and timing.
#[derive(Debug, Clone, Default)]
pub struct Participant {
    name: Option<String>,
    position: Option<u8>,
    lap_positions: BTreeMap<u8, u8>,
    timing: SectorTimes,
}

impl Participant {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Most recently observed race position.
    pub fn position(&self) -> Option<u8> {
        self.position
    }

    /// Record the position observed while driving `lap`. Last write wins, so
    /// the stored value is the position held when the lap ended.
    pub fn record_position(&mut self, lap: u8, position: u8) {
        self.position = Some(position);
        self.lap_positions.insert(lap, position);
    }

    pub fn position_at_lap(&self, lap: u8) -> Option<u8> {
        self.lap_positions.get(&lap).copied()
    }

    pub fn timing(&self) -> &SectorTimes {
        &self.timing
    }

    pub fn timing_mut(&mut self) -> &mut SectorTimes {
        &mut self.timing
    }

    /// Fold a staged, historyless participant's freshly-seen data into this
    /// identity. Timing replays through the tracker's own dedup; positions
    /// merge with the staged observations winning.
    fn absorb(&mut self, staged: &Participant) {
        self.timing.merge(&staged.timing);
        for (&lap, &position) in &staged.lap_positions {
            self.lap_positions.insert(lap, position);
        }
        if let Some(position) = staged.position {
            self.position = Some(position);
        }
        if let Some(name) = &staged.name {
            self.name = Some(name.clone());
        }
    }
}

/// Roster lifecycle: structurally at most one pending change in flight.
#[derive(Debug, Clone)]
enum RosterState {
    /// No telemetry has declared a participant count yet.
    Unsized,
    Stable {
        slots: Vec<ParticipantId>,
    },
    PendingMerge {
        archived: Vec<ParticipantId>,
        staging: Vec<ParticipantId>,
    },
}

/// Owns the authoritative participant list and resolves slot-count changes.
#[derive(Debug)]
pub struct RosterManager {
    arena: Vec<Participant>,
    state: RosterState,
    /// Slot maps superseded by count changes, oldest first.
    history: Vec<Vec<ParticipantId>>,
    /// Last nonnegative count declared by telemetry.
    declared: Option<usize>,
    planned_laps: Option<u8>,
}

impl Default for RosterManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterManager {
    pub fn new() -> Self {
        Self {
            arena: Vec::new(),
            state: RosterState::Unsized,
            history: Vec::new(),
            declared: None,
            planned_laps: None,
        }
    }

    /// Discard all participants and start from an unsized roster.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Whether telemetry has established a roster size.
    pub fn size_established(&self) -> bool {
        self.declared.is_some()
    }

    /// Whether a size decrease is awaiting name resolution.
    pub fn change_pending(&self) -> bool {
        matches!(self.state, RosterState::PendingMerge { .. })
    }

    /// Number of active slots (staged slots while a change is pending).
    pub fn len(&self) -> usize {
        self.active_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active_slots().is_empty()
    }

    /// Number of superseded rosters retained in history.
    pub fn archived_roster_count(&self) -> usize {
        self.history.len()
    }

    /// Lap-table hint for lap-limited races, applied to current and future
    /// participants.
    pub fn set_planned_laps(&mut self, laps: u8) {
        self.planned_laps = Some(laps);
        for participant in self.arena.iter_mut() {
            participant.timing.prepare_laps(laps);
        }
    }

    pub fn participant(&self, slot: usize) -> Option<&Participant> {
        self.active_slots().get(slot).map(|id| &self.arena[id.0])
    }

    pub fn participant_mut(&mut self, slot: usize) -> Option<&mut Participant> {
        let id = *self.active_slots().get(slot)?;
        Some(&mut self.arena[id.0])
    }

    /// Active roster in slot order.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.active_slots().iter().map(|id| &self.arena[id.0])
    }

    /// Reconcile the count declared by a telemetry frame.
    ///
    /// `active_count` is the number of slots the frame flags active; the
    /// initial roster is sized to `min(active_count, declared)` because slots
    /// past the active set carry garbage samples.
    pub fn reconcile_count(&mut self, num_participants: i16, active_count: usize) -> Result<()> {
        if num_participants < 0 {
            return Ok(());
        }
        let target = num_participants as usize;

        match self.declared {
            None => {
                let size = target.min(active_count);
                let slots = (0..size).map(|_| self.create_participant()).collect();
                self.state = RosterState::Stable { slots };
                self.declared = Some(target);
                debug!(declared = target, created = size, "roster size established");
                Ok(())
            }
            Some(previous) if target == previous => Ok(()),
            Some(previous) => {
                if self.change_pending() {
                    // A second count change before names resolved the first
                    // one: the stream can no longer be attributed safely.
                    return Err(MarshalError::reconciliation(format!(
                        "participant count changed {previous} -> {target} while a \
                         roster change was still pending"
                    )));
                }
                if target > previous {
                    self.grow(target);
                } else {
                    self.shrink(target);
                }
                self.declared = Some(target);
                Ok(())
            }
        }
    }

    /// Apply a primary roster frame: names for slots 0..16 plus event identity
    /// strings (handled by the session tracker).
    pub fn apply_roster(&mut self, packet: &RosterPacket) -> Result<()> {
        self.assign_names(0, &packet.names)
    }

    /// Apply an additional roster frame: names for slots offset..offset+16.
    pub fn apply_additional_roster(&mut self, packet: &AdditionalRosterPacket) -> Result<()> {
        self.assign_names(packet.offset as usize, &packet.names)
    }

    fn assign_names(&mut self, start: usize, names: &[String]) -> Result<()> {
        if self.declared.is_none() {
            return Err(MarshalError::sequence(format!(
                "roster names for slots {start}..{} arrived before telemetry \
                 established a roster size",
                start + names.len()
            )));
        }

        let slot_count = self.len();
        for (index, name) in names.iter().enumerate() {
            let slot = start + index;
            if slot >= slot_count || name.is_empty() {
                continue;
            }
            if let Some(participant) = self.participant_mut(slot) {
                trace!(slot, name = %name, "naming roster slot");
                participant.set_name(name);
            }
        }

        self.try_resolve_pending()
    }

    fn grow(&mut self, target: usize) {
        let RosterState::Stable { slots } = &self.state else {
            unreachable!("grow is only reached from a stable roster");
        };
        let mut new_slots = slots.clone();
        self.history.push(slots.clone());
        while new_slots.len() < target {
            new_slots.push(self.create_participant());
        }
        debug!(target, "roster grew; existing identities kept in place");
        self.state = RosterState::Stable { slots: new_slots };
    }

    fn shrink(&mut self, target: usize) {
        let RosterState::Stable { slots } = &self.state else {
            unreachable!("shrink is only reached from a stable roster");
        };
        let archived = slots.clone();
        self.history.push(slots.clone());
        let staging = (0..target).map(|_| self.create_participant()).collect();
        warn!(
            from = archived.len(),
            to = target,
            "roster shrank; staging a temporary roster until names resolve"
        );
        self.state = RosterState::PendingMerge { archived, staging };
    }

    /// Resolve a pending shrink once every staged slot has a name.
    ///
    /// The old and new name lists are compared pairwise. The first differing
    /// index marks the departed driver's old slot; the protocol moves the old
    /// roster's last driver down into that slot, so the surviving identity
    /// there is the old roster's final participant. More than one differing
    /// index means the wire did something this reconciliation cannot explain,
    /// and guessing would attribute lap history to the wrong driver.
    fn try_resolve_pending(&mut self) -> Result<()> {
        let RosterState::PendingMerge { archived, staging } = &self.state else {
            return Ok(());
        };
        if staging.iter().any(|id| self.arena[id.0].name.is_none()) {
            return Ok(());
        }

        let old_names: Vec<Option<&str>> =
            archived.iter().map(|id| self.arena[id.0].name()).collect();
        let new_names: Vec<Option<&str>> =
            staging.iter().map(|id| self.arena[id.0].name()).collect();

        let differing: Vec<usize> =
            (0..staging.len()).filter(|&i| old_names[i] != new_names[i]).collect();

        let survivors: Vec<ParticipantId> = match differing.as_slice() {
            [] => archived[..staging.len()].to_vec(),
            [changed] => {
                let mut mapped = archived[..staging.len()].to_vec();
                mapped[*changed] = *archived.last().expect("shrink implies a nonempty roster");
                mapped
            }
            _ => {
                return Err(MarshalError::reconciliation(format!(
                    "roster diff has {} differing slots {:?} (old names {:?}, new names {:?})",
                    differing.len(),
                    differing,
                    old_names,
                    new_names,
                )));
            }
        };

        let staged: Vec<Participant> =
            staging.iter().map(|id| self.arena[id.0].clone()).collect();
        for (slot, survivor) in survivors.iter().enumerate() {
            self.arena[survivor.0].absorb(&staged[slot]);
        }

        debug!(
            slots = survivors.len(),
            departed_slot = ?differing.first(),
            "pending roster change resolved"
        );
        self.state = RosterState::Stable { slots: survivors };
        Ok(())
    }

    fn create_participant(&mut self) -> ParticipantId {
        let id = ParticipantId(self.arena.len());
        let mut participant = Participant::default();
        if let Some(laps) = self.planned_laps {
            participant.timing.prepare_laps(laps);
        }
        self.arena.push(participant);
        id
    }

    fn active_slots(&self) -> &[ParticipantId] {
        match &self.state {
            RosterState::Unsized => &[],
            RosterState::Stable { slots } => slots,
            RosterState::PendingMerge { staging, .. } => staging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{additional_roster_frame, roster_frame};

    fn named_roster(names: &[&str]) -> RosterManager {
        let mut roster = RosterManager::new();
        roster.reconcile_count(names.len() as i16, names.len()).unwrap();
        let frame = roster_frame("Car", "Class", "Track", "Variant", names);
        roster.apply_roster(&RosterPacket::decode(&frame).unwrap()).unwrap();
        roster
    }

    fn complete_lap(participant: &mut Participant, lap: u8, sectors: [f32; 3]) {
        participant.timing_mut().add_sector_time(lap, 2, sectors[0], false);
        participant.timing_mut().add_sector_time(lap, 3, sectors[1], false);
        participant.timing_mut().add_sector_time(lap + 1, 1, sectors[2], false);
    }

    #[test]
    fn first_observation_sizes_to_active_slots() {
        let mut roster = RosterManager::new();
        roster.reconcile_count(20, 12).unwrap();
        assert_eq!(roster.len(), 12);
        assert!(roster.size_established());
    }

    #[test]
    fn unknown_count_is_ignored() {
        let mut roster = RosterManager::new();
        roster.reconcile_count(-1, 0).unwrap();
        assert!(!roster.size_established());
    }

    #[test]
    fn repeat_count_is_a_no_op() {
        let mut roster = named_roster(&["A", "B"]);
        roster.reconcile_count(2, 2).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.archived_roster_count(), 0);
    }

    #[test]
    fn names_before_size_is_a_sequence_error() {
        let mut roster = RosterManager::new();
        let frame = roster_frame("Car", "Class", "Track", "Variant", &["A"]);
        let err = roster.apply_roster(&RosterPacket::decode(&frame).unwrap()).unwrap_err();
        assert!(matches!(err, MarshalError::Sequence { .. }));
    }

    #[test]
    fn additional_roster_window_leaves_other_slots_intact() {
        let mut roster = RosterManager::new();
        roster.reconcile_count(18, 18).unwrap();
        let names: Vec<String> = (0..18).map(|i| format!("Driver {i}")).collect();
        let first: Vec<&str> = names[..16].iter().map(String::as_str).collect();
        let rest: Vec<&str> = names[16..].iter().map(String::as_str).collect();

        let frame = roster_frame("Car", "Class", "Track", "Variant", &first);
        roster.apply_roster(&RosterPacket::decode(&frame).unwrap()).unwrap();
        let frame = additional_roster_frame(16, &rest);
        roster.apply_additional_roster(&AdditionalRosterPacket::decode(&frame).unwrap()).unwrap();

        for (slot, expected) in names.iter().enumerate() {
            assert_eq!(roster.participant(slot).unwrap().name(), Some(expected.as_str()));
        }

        // Overlapping reapplication of the first window changes nothing else.
        let frame = roster_frame("Car", "Class", "Track", "Variant", &["Replacement"]);
        roster.apply_roster(&RosterPacket::decode(&frame).unwrap()).unwrap();
        assert_eq!(roster.participant(0).unwrap().name(), Some("Replacement"));
        assert_eq!(roster.participant(17).unwrap().name(), Some("Driver 17"));
    }

    #[test]
    fn growth_keeps_existing_identities() {
        let mut roster = named_roster(&["A", "B"]);
        complete_lap(roster.participant_mut(0).unwrap(), 1, [25.0, 26.0, 27.0]);

        roster.reconcile_count(3, 3).unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.archived_roster_count(), 1);
        assert_eq!(roster.participant(0).unwrap().name(), Some("A"));
        assert_eq!(roster.participant(0).unwrap().timing().lap_time(1), Some(78.0));
        assert!(roster.participant(2).unwrap().name().is_none());
    }

    #[test]
    fn shrink_stages_a_historyless_roster() {
        let mut roster = named_roster(&["A", "B", "C"]);
        complete_lap(roster.participant_mut(0).unwrap(), 1, [25.0, 26.0, 27.0]);

        roster.reconcile_count(2, 2).unwrap();
        assert!(roster.change_pending());
        assert_eq!(roster.len(), 2);
        // Lookups route to the staged roster, which has no history yet.
        assert!(roster.participant(0).unwrap().name().is_none());
        assert!(roster.participant(0).unwrap().timing().records().is_empty());
    }

    #[test]
    fn middle_dropout_reattaches_shifted_history() {
        let mut roster = named_roster(&["A", "B", "C"]);
        complete_lap(roster.participant_mut(0).unwrap(), 1, [25.0, 26.0, 27.0]);
        complete_lap(roster.participant_mut(1).unwrap(), 1, [24.0, 25.0, 26.0]);
        complete_lap(roster.participant_mut(2).unwrap(), 1, [23.0, 24.0, 25.0]);
        let records_before: usize = [0, 2]
            .iter()
            .map(|&slot| roster.participant(slot).unwrap().timing().records().len())
            .sum();

        // B departs: C shifts down into slot 1.
        roster.reconcile_count(2, 2).unwrap();
        complete_lap(roster.participant_mut(1).unwrap(), 2, [22.0, 23.0, 24.0]);
        let staged_records = roster.participant(1).unwrap().timing().records().len();

        let frame = roster_frame("Car", "Class", "Track", "Variant", &["A", "C"]);
        roster.apply_roster(&RosterPacket::decode(&frame).unwrap()).unwrap();

        assert!(!roster.change_pending());
        let a = roster.participant(0).unwrap();
        let c = roster.participant(1).unwrap();
        assert_eq!(a.name(), Some("A"));
        assert_eq!(c.name(), Some("C"));
        // C kept its pre-shrink lap and gained the staged lap.
        assert_eq!(c.timing().lap_time(1), Some(72.0));
        assert_eq!(c.timing().lap_time(2), Some(69.0));
        // Conservation: nothing lost, nothing double counted.
        let records_after =
            a.timing().records().len() + c.timing().records().len();
        assert_eq!(records_after, records_before + staged_records);
    }

    #[test]
    fn last_slot_dropout_maps_one_to_one() {
        let mut roster = named_roster(&["A", "B", "C"]);
        complete_lap(roster.participant_mut(1).unwrap(), 1, [24.0, 25.0, 26.0]);

        roster.reconcile_count(2, 2).unwrap();
        let frame = roster_frame("Car", "Class", "Track", "Variant", &["A", "B"]);
        roster.apply_roster(&RosterPacket::decode(&frame).unwrap()).unwrap();

        assert!(!roster.change_pending());
        assert_eq!(roster.participant(0).unwrap().name(), Some("A"));
        assert_eq!(roster.participant(1).unwrap().name(), Some("B"));
        assert_eq!(roster.participant(1).unwrap().timing().lap_time(1), Some(75.0));
    }

    #[test]
    fn ambiguous_diff_is_fatal() {
        let mut roster = named_roster(&["A", "B", "C", "D"]);
        roster.reconcile_count(3, 3).unwrap();

        // Two differing slots cannot come from a single dropout.
        let frame = roster_frame("Car", "Class", "Track", "Variant", &["A", "X", "Y"]);
        let err = roster.apply_roster(&RosterPacket::decode(&frame).unwrap()).unwrap_err();
        assert!(matches!(err, MarshalError::Reconciliation { .. }));
    }

    #[test]
    fn second_count_change_while_pending_fails_fast() {
        let mut roster = named_roster(&["A", "B", "C"]);
        roster.reconcile_count(2, 2).unwrap();
        let err = roster.reconcile_count(1, 1).unwrap_err();
        assert!(matches!(err, MarshalError::Reconciliation { .. }));
    }

    #[test]
    fn planned_laps_reach_existing_and_future_participants() {
        let mut roster = named_roster(&["A", "B"]);
        roster.set_planned_laps(10);
        assert_eq!(roster.participant(0).unwrap().timing().planned_laps(), Some(10));
        roster.reconcile_count(3, 3).unwrap();
        assert_eq!(roster.participant(2).unwrap().timing().planned_laps(), Some(10));
    }

    #[test]
    fn positions_merge_with_staged_observations_winning() {
        let mut roster = named_roster(&["A", "B", "C"]);
        roster.participant_mut(2).unwrap().record_position(1, 3);

        roster.reconcile_count(2, 2).unwrap();
        roster.participant_mut(1).unwrap().record_position(2, 2);
        let frame = roster_frame("Car", "Class", "Track", "Variant", &["A", "C"]);
        roster.apply_roster(&RosterPacket::decode(&frame).unwrap()).unwrap();

        let c = roster.participant(1).unwrap();
        assert_eq!(c.position_at_lap(1), Some(3));
        assert_eq!(c.position_at_lap(2), Some(2));
        assert_eq!(c.position(), Some(2));
    }
}
