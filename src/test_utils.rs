//! Test utilities for constructing synthetic wire frames.
//!
//! Real captures are the gold standard, but unit tests and benches need
//! precise control over individual fields. These builders emit byte-exact
//! frames for all three datagram kinds.

#![cfg(any(test, feature = "benchmark"))]

use crate::packet::{
    ADDITIONAL_ROSTER_FRAME_LEN, NO_TIME, PARTICIPANT_SLOTS, ParticipantSample, ROSTER_FRAME_LEN,
    TELEMETRY_FRAME_LEN,
};

const BUILD_VERSION: u16 = 1234;

/// Builder for 1367-byte telemetry frames.
pub struct TelemetryFrameBuilder {
    game: u8,
    session: u8,
    num_participants: i16,
    race_state_flags: u8,
    laps_in_event: u8,
    current_time: f32,
    event_time_remaining: f32,
    track_length: f32,
    samples: Vec<ParticipantSample>,
}

impl Default for TelemetryFrameBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryFrameBuilder {
    /// A frame in the front-end menus with no participants and a stopped clock.
    pub fn new() -> Self {
        Self {
            game: 1,
            session: 0,
            num_participants: -1,
            race_state_flags: 0,
            laps_in_event: 0,
            current_time: -1.0,
            event_time_remaining: 0.0,
            track_length: 0.0,
            samples: vec![
                ParticipantSample {
                    active: false,
                    race_position: 0,
                    laps_completed: 0,
                    lap_invalidated: false,
                    current_lap: 1,
                    sector: 1,
                    last_sector_time: NO_TIME,
                };
                PARTICIPANT_SLOTS
            ],
        }
    }

    /// A frame racing under green flag, the shape most tests start from.
    pub fn racing() -> Self {
        let mut builder = Self::new();
        builder.game = 2;
        builder.session = 5;
        builder
    }

    pub fn game_session(mut self, game: u8, session: u8) -> Self {
        self.game = game;
        self.session = session;
        self
    }

    pub fn num_participants(mut self, count: i16) -> Self {
        self.num_participants = count;
        self
    }

    pub fn race_state_flags(mut self, flags: u8) -> Self {
        self.race_state_flags = flags;
        self
    }

    pub fn laps_in_event(mut self, laps: u8) -> Self {
        self.laps_in_event = laps;
        self
    }

    pub fn current_time(mut self, time: f32) -> Self {
        self.current_time = time;
        self
    }

    pub fn event_time_remaining(mut self, seconds: f32) -> Self {
        self.event_time_remaining = seconds;
        self
    }

    pub fn track_length(mut self, meters: f32) -> Self {
        self.track_length = meters;
        self
    }

    /// Edit one participant slot's sample in place.
    pub fn sample(mut self, slot: usize, edit: impl FnOnce(&mut ParticipantSample)) -> Self {
        edit(&mut self.samples[slot]);
        self
    }

    /// Mark the first `count` slots active with positions 1..=count.
    pub fn grid(mut self, count: usize) -> Self {
        for (slot, sample) in self.samples.iter_mut().enumerate().take(count) {
            sample.active = true;
            sample.race_position = (slot + 1) as u8;
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut frame = vec![0u8; TELEMETRY_FRAME_LEN];
        frame[0..2].copy_from_slice(&BUILD_VERSION.to_le_bytes());
        frame[2] = 0;
        frame[3] = (self.game & 0x0F) | (self.session << 4);
        frame[4..6].copy_from_slice(&self.num_participants.to_le_bytes());
        frame[10] = self.race_state_flags;
        frame[11] = self.laps_in_event;
        frame[20..24].copy_from_slice(&self.current_time.to_le_bytes());
        frame[36..40].copy_from_slice(&self.event_time_remaining.to_le_bytes());
        for (slot, sample) in self.samples.iter().enumerate() {
            let base = 464 + slot * 16;
            frame[base + 8] =
                (sample.race_position & 0x7F) | if sample.active { 0x80 } else { 0 };
            frame[base + 9] =
                (sample.laps_completed & 0x7F) | if sample.lap_invalidated { 0x80 } else { 0 };
            frame[base + 10] = sample.current_lap;
            frame[base + 11] = sample.sector & 0x07;
            frame[base + 12..base + 16].copy_from_slice(&sample.last_sector_time.to_le_bytes());
        }
        frame[1360..1364].copy_from_slice(&self.track_length.to_le_bytes());
        frame
    }
}

/// Build a 1347-byte primary roster frame naming slots 0..names.len().
pub fn roster_frame(
    car_name: &str,
    car_class: &str,
    track_location: &str,
    track_variation: &str,
    names: &[&str],
) -> Vec<u8> {
    assert!(names.len() <= 16);
    let mut frame = vec![0u8; ROSTER_FRAME_LEN];
    frame[0..2].copy_from_slice(&BUILD_VERSION.to_le_bytes());
    frame[2] = 1;
    write_fixed_string(&mut frame, 3, car_name);
    write_fixed_string(&mut frame, 67, car_class);
    write_fixed_string(&mut frame, 131, track_location);
    write_fixed_string(&mut frame, 195, track_variation);
    for (index, name) in names.iter().enumerate() {
        write_fixed_string(&mut frame, 259 + index * 64, name);
    }
    frame
}

/// Build a 1028-byte additional roster frame for slots offset..offset+names.len().
pub fn additional_roster_frame(offset: u8, names: &[&str]) -> Vec<u8> {
    assert!(names.len() <= 16);
    let mut frame = vec![0u8; ADDITIONAL_ROSTER_FRAME_LEN];
    frame[0..2].copy_from_slice(&BUILD_VERSION.to_le_bytes());
    frame[2] = 2;
    frame[3] = offset;
    for (index, name) in names.iter().enumerate() {
        write_fixed_string(&mut frame, 4 + index * 64, name);
    }
    frame
}

fn write_fixed_string(frame: &mut [u8], offset: usize, text: &str) {
    let bytes = text.as_bytes();
    assert!(bytes.len() <= 64, "fixed string field overflow: {text}");
    frame[offset..offset + bytes.len()].copy_from_slice(bytes);
}
