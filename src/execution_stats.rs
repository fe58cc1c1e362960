// Loss of precision is allowable in this module's use cases.
#![allow(clippy::cast_precision_loss)]

use std::time::Duration;

use humantime::format_duration;
use log::info;
use serde::Serialize;

/// Counts and timings of the recomputes performed by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeStatistics {
    pub recomputes: usize,
    pub failures: usize,
    pub total_time: Duration,
    pub longest: Duration,
}

impl RecomputeStatistics {
    pub fn record(&mut self, elapsed: Duration, succeeded: bool) {
        self.recomputes += 1;
        if !succeeded {
            self.failures += 1;
        }
        self.total_time += elapsed;
        self.longest = self.longest.max(elapsed);
    }

    #[must_use]
    pub fn mean_time(&self) -> Duration {
        if self.recomputes == 0 {
            return Duration::ZERO;
        }
        self.total_time.div_f64(self.recomputes as f64)
    }

    /// Logs a summary at `info` level.
    pub fn log(&self) {
        info!(
            "{} recomputes ({} failed) in {}, mean {}, longest {}",
            self.recomputes,
            self.failures,
            format_duration(truncate_to_micros(self.total_time)),
            format_duration(truncate_to_micros(self.mean_time())),
            format_duration(truncate_to_micros(self.longest)),
        );
    }
}

/// `humantime` prints every unit down to nanoseconds; microseconds are plenty here.
fn truncate_to_micros(duration: Duration) -> Duration {
    Duration::from_micros(u64::try_from(duration.as_micros()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_successes_and_failures() {
        let mut statistics = RecomputeStatistics::default();
        statistics.record(Duration::from_millis(2), true);
        statistics.record(Duration::from_millis(4), false);
        assert_eq!(statistics.recomputes, 2);
        assert_eq!(statistics.failures, 1);
        assert_eq!(statistics.total_time, Duration::from_millis(6));
        assert_eq!(statistics.longest, Duration::from_millis(4));
        assert_eq!(statistics.mean_time(), Duration::from_millis(3));
    }

    #[test]
    fn mean_of_nothing_is_zero() {
        assert_eq!(RecomputeStatistics::default().mean_time(), Duration::ZERO);
    }

    #[test]
    fn durations_format_to_microseconds() {
        let duration = truncate_to_micros(Duration::new(1, 2_345_678));
        assert_eq!(format_duration(duration).to_string(), "1s 2ms 345us");
    }
}
