//! Per-participant sector timing.
//!
//! The wire protocol reports a sector's completion time while the car is
//! already driving the *next* sector: a frame flagged "sector 1" carries the
//! time for sector 3 of the previous lap, "sector 2" carries sector 1 of the
//! current lap, and "sector 3" carries sector 2 of the current lap. The
//! tracker resolves that one-ahead encoding into `(lap, sector)` records and
//! guards against the same value being captured on every telemetry tick.

use crate::packet::NO_TIME;

/// One recorded sector completion.
///
/// Records for a participant are strictly ordered by lap then sector, and
/// each `(lap, sector)` pair is recorded at most once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorRecord {
    /// Lap the sector belongs to. Lap 0 holds only the synthetic start marker.
    pub lap: u8,
    /// Sector within the lap, 1-3.
    pub sector: u8,
    pub time: f32,
    pub invalid: bool,
}

impl SectorRecord {
    fn key(&self) -> (u8, u8) {
        (self.lap, self.sector)
    }
}

/// Accumulates sector completions for one participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectorTimes {
    records: Vec<SectorRecord>,
    /// Last observed (wire sector, time bits), for per-transition dedup.
    last_seen: Option<(u8, u32)>,
    planned_laps: Option<u8>,
}

impl SectorTimes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the lap table for a lap-limited race. Purely a projection hint;
    /// records are still accepted for any lap the wire reports.
    pub fn prepare_laps(&mut self, laps: u8) {
        self.planned_laps = Some(laps);
    }

    pub fn planned_laps(&self) -> Option<u8> {
        self.planned_laps
    }

    /// Ingest one telemetry observation.
    ///
    /// `current_lap` and `observed_sector` are the sample's raw values; the
    /// one-ahead conversion happens here. The sentinel time is ignored except
    /// that the first one seeds a start marker at lap 0 so position queries
    /// before the first completed sector resolve.
    pub fn add_sector_time(
        &mut self,
        current_lap: u8,
        observed_sector: u8,
        time: f32,
        invalid: bool,
    ) {
        if time == NO_TIME {
            if self.records.is_empty() {
                self.records.push(SectorRecord { lap: 0, sector: 3, time: 0.0, invalid: false });
            }
            return;
        }

        if self.last_seen == Some((observed_sector, time.to_bits())) {
            return;
        }

        let (lap, sector) = match observed_sector {
            1 => (current_lap.saturating_sub(1), 3),
            2 => (current_lap, 1),
            3 => (current_lap, 2),
            _ => return,
        };
        self.last_seen = Some((observed_sector, time.to_bits()));

        let record = SectorRecord { lap, sector, time, invalid };
        match self.records.binary_search_by_key(&record.key(), SectorRecord::key) {
            Ok(_) => {}
            Err(index) => self.records.insert(index, record),
        }
    }

    /// Fold another tracker's records into this one.
    ///
    /// Each record is replayed through [`add_sector_time`](Self::add_sector_time)
    /// (via the inverse of the one-ahead conversion) so the ordering and
    /// at-most-once invariants hold across the merge. Used when roster
    /// reconciliation folds a displaced identity's fresh data into the
    /// surviving participant.
    pub fn merge(&mut self, other: &SectorTimes) {
        let previous_seen = self.last_seen;
        for record in &other.records {
            let (current_lap, observed_sector) = match record.sector {
                3 => (record.lap.saturating_add(1), 1),
                1 => (record.lap, 2),
                2 => (record.lap, 3),
                _ => continue,
            };
            // Replaying must not be suppressed by this tracker's last live
            // observation.
            self.last_seen = None;
            self.add_sector_time(current_lap, observed_sector, record.time, record.invalid);
        }
        self.last_seen = other.last_seen.or(previous_seen);
        if self.planned_laps.is_none() {
            self.planned_laps = other.planned_laps;
        }
    }

    pub fn records(&self) -> &[SectorRecord] {
        &self.records
    }

    pub fn sector_time(&self, lap: u8, sector: u8) -> Option<f32> {
        self.record(lap, sector).map(|r| r.time)
    }

    /// The record for one `(lap, sector)` pair, if captured.
    pub fn record(&self, lap: u8, sector: u8) -> Option<&SectorRecord> {
        self.records
            .binary_search_by_key(&(lap, sector), SectorRecord::key)
            .ok()
            .map(|index| &self.records[index])
    }

    /// Total lap time: defined only when all three sectors are recorded.
    pub fn lap_time(&self, lap: u8) -> Option<f32> {
        let s1 = self.sector_time(lap, 1)?;
        let s2 = self.sector_time(lap, 2)?;
        let s3 = self.sector_time(lap, 3)?;
        Some(s1 + s2 + s3)
    }

    /// A lap is invalid if any of its recorded sectors was flagged invalid.
    pub fn invalid_lap(&self, lap: u8) -> bool {
        self.records.iter().filter(|r| r.lap == lap).any(|r| r.invalid)
    }

    /// Highest lap with at least one recorded sector (start marker excluded).
    pub fn last_recorded_lap(&self) -> u8 {
        self.records.iter().map(|r| r.lap).max().unwrap_or(0)
    }

    /// Fastest time for one sector across all valid laps.
    pub fn best_sector_time(&self, sector: u8) -> Option<f32> {
        self.records
            .iter()
            .filter(|r| r.lap >= 1 && r.sector == sector && !r.invalid)
            .map(|r| r.time)
            .min_by(f32::total_cmp)
    }

    /// Fastest complete, valid lap.
    pub fn best_lap_time(&self) -> Option<f32> {
        (1..=self.last_recorded_lap())
            .filter(|&lap| !self.invalid_lap(lap))
            .filter_map(|lap| self.lap_time(lap))
            .min_by(f32::total_cmp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn one_ahead_conversion_maps_to_owning_sector() {
        let mut times = SectorTimes::new();
        // Crossing into sector 2 of lap 3 delivers sector 1 of lap 3.
        times.add_sector_time(3, 2, 30.0, false);
        // Crossing into sector 3 of lap 3 delivers sector 2 of lap 3.
        times.add_sector_time(3, 3, 31.0, false);
        // Crossing the line into lap 4 delivers sector 3 of lap 3.
        times.add_sector_time(4, 1, 32.0, false);

        assert_eq!(times.sector_time(3, 1), Some(30.0));
        assert_eq!(times.sector_time(3, 2), Some(31.0));
        assert_eq!(times.sector_time(3, 3), Some(32.0));
        assert_eq!(times.lap_time(3), Some(93.0));
    }

    #[test]
    fn repeated_observation_records_once() {
        let mut times = SectorTimes::new();
        for _ in 0..50 {
            times.add_sector_time(2, 2, 30.0, false);
        }
        assert_eq!(times.records().len(), 1);
    }

    #[test]
    fn same_pair_never_recorded_twice() {
        let mut times = SectorTimes::new();
        times.add_sector_time(2, 2, 30.0, false);
        times.add_sector_time(2, 3, 31.0, false);
        // A stale repeat of the sector-1 value after the transition.
        times.add_sector_time(2, 2, 30.5, false);
        assert_eq!(times.sector_time(2, 1), Some(30.0));
        assert_eq!(times.records().len(), 2);
    }

    #[test]
    fn sentinel_seeds_start_marker_once() {
        let mut times = SectorTimes::new();
        times.add_sector_time(1, 1, NO_TIME, false);
        times.add_sector_time(1, 1, NO_TIME, false);
        assert_eq!(times.records().len(), 1);
        assert_eq!(times.records()[0], SectorRecord { lap: 0, sector: 3, time: 0.0, invalid: false });

        // Later sentinels never reseed.
        times.add_sector_time(1, 2, 25.0, false);
        times.add_sector_time(1, 2, NO_TIME, false);
        assert_eq!(times.records().len(), 2);
    }

    #[test]
    fn lap_time_requires_all_three_sectors() {
        let mut times = SectorTimes::new();
        times.add_sector_time(1, 2, 25.0, false);
        times.add_sector_time(1, 3, 26.0, false);
        assert_eq!(times.lap_time(1), None);
        times.add_sector_time(2, 1, 27.0, false);
        assert_eq!(times.lap_time(1), Some(78.0));
    }

    #[test]
    fn invalid_flag_propagates_to_lap() {
        let mut times = SectorTimes::new();
        times.add_sector_time(1, 2, 25.0, false);
        times.add_sector_time(1, 3, 26.0, true);
        times.add_sector_time(2, 1, 27.0, false);
        assert!(times.invalid_lap(1));
        assert!(!times.invalid_lap(2));
    }

    #[test]
    fn bests_skip_invalid_laps_and_start_marker() {
        let mut times = SectorTimes::new();
        times.add_sector_time(1, 1, NO_TIME, false); // start marker at time 0
        complete_lap(&mut times, 1, [25.0, 26.0, 27.0], false);
        complete_lap(&mut times, 2, [20.0, 21.0, 22.0], true);
        complete_lap(&mut times, 3, [24.0, 25.0, 26.0], false);

        // Lap 2 was faster but invalid.
        assert_eq!(times.best_lap_time(), Some(75.0));
        assert_eq!(times.best_sector_time(1), Some(24.0));
        // The lap-0 marker's 0.0 never wins a best.
        assert_eq!(times.best_sector_time(3), Some(26.0));
    }

    #[test]
    fn merge_preserves_history_without_double_counting() {
        let mut survivor = SectorTimes::new();
        complete_lap(&mut survivor, 1, [25.0, 26.0, 27.0], false);

        let mut fresh = SectorTimes::new();
        complete_lap(&mut fresh, 2, [24.0, 25.5, 26.5], false);
        // Overlap: fresh also saw lap 1 sector 3.
        fresh.add_sector_time(2, 1, 27.0, false);

        let before = survivor.records().len() + fresh.records().len();
        survivor.merge(&fresh);

        assert_eq!(survivor.lap_time(1), Some(78.0));
        assert_eq!(survivor.lap_time(2), Some(76.0));
        // One overlapping record deduplicated, nothing else lost.
        assert_eq!(survivor.records().len(), before - 1);
    }

    #[test]
    fn merge_carries_start_marker() {
        let mut survivor = SectorTimes::new();
        let mut fresh = SectorTimes::new();
        fresh.add_sector_time(1, 1, NO_TIME, false);
        survivor.merge(&fresh);
        assert_eq!(survivor.records().len(), 1);
        assert_eq!(survivor.records()[0].lap, 0);
    }

    #[test]
    fn records_stay_ordered_after_merge() {
        let mut survivor = SectorTimes::new();
        complete_lap(&mut survivor, 2, [24.0, 25.0, 26.0], false);
        let mut fresh = SectorTimes::new();
        complete_lap(&mut fresh, 1, [25.0, 26.0, 27.0], false);
        survivor.merge(&fresh);

        let keys: Vec<_> = survivor.records().iter().map(|r| (r.lap, r.sector)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    proptest! {
        #[test]
        fn duplicate_observations_never_duplicate_records(
            observations in prop::collection::vec(
                (1u8..5u8, 1u8..4u8, 20.0f32..120.0f32, any::<bool>()),
                0..60,
            )
        ) {
            let mut times = SectorTimes::new();
            for (lap, sector, time, invalid) in observations {
                // Feed every observation twice in a row.
                times.add_sector_time(lap, sector, time, invalid);
                times.add_sector_time(lap, sector, time, invalid);
            }
            let mut keys: Vec<_> = times.records().iter().map(|r| (r.lap, r.sector)).collect();
            let total = keys.len();
            keys.dedup();
            prop_assert_eq!(total, keys.len());
        }
    }

    fn complete_lap(times: &mut SectorTimes, lap: u8, sectors: [f32; 3], invalid: bool) {
        times.add_sector_time(lap, 2, sectors[0], invalid);
        times.add_sector_time(lap, 3, sectors[1], invalid);
        times.add_sector_time(lap + 1, 1, sectors[2], invalid);
    }
}
