use std::time::Duration as StdDuration;

pub(crate) trait TimeDurationExt {
    /// Negative durations saturate to `Duration::ZERO`.
    fn to_std_duration(self) -> StdDuration;
}

impl TimeDurationExt for time::Duration {
    fn to_std_duration(self) -> StdDuration {
        StdDuration::try_from(self).unwrap_or(StdDuration::ZERO)
    }
}
