//! Report stream rate control.

mod throttle;

pub use throttle::{Throttle, ThrottleExt};

use serde::{Deserialize, Serialize};

/// Update rate for report streams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Full speed from the source (typically 60Hz live).
    Native,

    /// Throttled to at most this many updates per second.
    /// If the requested rate meets or exceeds the source rate, Native is used.
    Max(u32),
}

impl UpdateRate {
    /// Normalize the rate against the source frequency.
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
        }
    }

    /// Throttle interval, if throttling is needed at all.
    pub fn throttle_interval(self, source_hz: f64) -> Option<std::time::Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(std::time::Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}
