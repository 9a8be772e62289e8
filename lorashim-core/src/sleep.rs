//! Long sleeps around the watchdog
//!
//! The independent watchdog runs with a 32 s period and cannot be paused,
//! so a sleep longer than that is cut into chunks with a release after
//! each one.

/// Chunks of a long sleep, in the unit it was planned in
///
/// Every chunk except the last is exactly `period` long. A zero duration
/// yields no chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SleepPlan {
    remaining: u32,
    period: u32,
}

impl SleepPlan {
    /// Plan a sleep of `duration` seconds
    ///
    /// # Arguments
    /// - `duration`: Total sleep (s)
    /// - `period`: Longest chunk between two watchdog releases (s), at least 1
    pub fn seconds(duration: u32, period: u32) -> Self {
        Self {
            remaining: duration,
            period: period.max(1),
        }
    }

    /// Plan a sleep of `duration` milliseconds
    ///
    /// # Arguments
    /// - `duration`: Total sleep (ms)
    /// - `period`: Longest chunk (ms), at least 1
    pub fn millis(duration: u32, period: u32) -> Self {
        Self::seconds(duration, period)
    }

    /// Duration not yet handed out
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

impl Iterator for SleepPlan {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.remaining == 0 {
            return None;
        }
        let chunk = self.remaining.min(self.period);
        self.remaining -= chunk;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining.div_ceil(self.period) as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for SleepPlan {}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::Vec;

    fn chunks(duration: u32, period: u32) -> Vec<u32, 16> {
        SleepPlan::seconds(duration, period).collect()
    }

    #[test]
    fn test_short_sleep_is_one_chunk() {
        assert_eq!(chunks(10, 30).as_slice(), &[10]);
        assert_eq!(chunks(30, 30).as_slice(), &[30]);
    }

    #[test]
    fn test_long_sleep_is_split() {
        assert_eq!(chunks(75, 30).as_slice(), &[30, 30, 15]);
        assert_eq!(chunks(60, 30).as_slice(), &[30, 30]);
        assert_eq!(SleepPlan::seconds(75, 30).len(), 3);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(chunks(0, 30).is_empty());
        assert_eq!(chunks(3, 0).as_slice(), &[1, 1, 1]);
    }

    #[test]
    fn test_chunks_add_up() {
        let plan = SleepPlan::seconds(1_000_000, 30);
        assert_eq!(plan.clone().sum::<u32>(), 1_000_000);
        assert!(plan.clone().all(|chunk| chunk <= 30));
        assert_eq!(plan.remaining(), 1_000_000);
    }

    #[test]
    fn test_millis_plan() {
        let plan: Vec<u32, 4> = SleepPlan::millis(40_000, 30_000).collect();
        assert_eq!(plan.as_slice(), &[30_000, 10_000]);
    }
}
