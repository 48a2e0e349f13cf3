//! Poll interval derived from a frame rate.

use crate::{Error, Result};
use std::time::Duration;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Highest accepted frame rate. Any faster rate would floor to a zero
/// interval.
pub const MAX_FRAME_RATE: i64 = MICROS_PER_SEC as i64;

/// Time between two polls, split into whole seconds and microseconds.
///
/// Always floor-derived from a frame rate: `secs = ⌊1/rate⌋` and
/// `micros = ⌊(1/rate − secs)·10⁶⌋`. The computation is done in integer
/// microseconds, so the floor is exact (rate 3 gives 333333 µs, never
/// 333334).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PollInterval {
    secs: u64,
    micros: u32,
}

impl PollInterval {
    /// Derives the interval for `rate` frames per second.
    ///
    /// Fails for a zero or negative rate, and for rates above
    /// [`MAX_FRAME_RATE`] whose period is shorter than one microsecond.
    pub fn from_frame_rate(rate: i64) -> Result<Self> {
        let rate = u64::try_from(rate)
            .ok()
            .filter(|r| (1..=MICROS_PER_SEC).contains(r))
            .ok_or(Error::InvalidFrameRate(rate))?;
        let total = MICROS_PER_SEC / rate;
        Ok(Self {
            secs: total / MICROS_PER_SEC,
            micros: (total % MICROS_PER_SEC) as u32,
        })
    }

    /// Whole seconds.
    #[must_use]
    pub const fn secs(&self) -> u64 {
        self.secs
    }

    /// Remaining microseconds, always below one second.
    #[must_use]
    pub const fn micros(&self) -> u32 {
        self.micros
    }

    /// The interval as a [`Duration`].
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.secs) + Duration::from_micros(u64::from(self.micros))
    }
}

impl Default for PollInterval {
    /// One second, the interval of a freshly created stream.
    fn default() -> Self {
        Self { secs: 1, micros: 0 }
    }
}

impl From<PollInterval> for Duration {
    fn from(interval: PollInterval) -> Self {
        interval.as_duration()
    }
}
