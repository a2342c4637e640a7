use std::time::Duration;

use time::{Duration as TimeDuration, OffsetDateTime, Time, UtcOffset};

/// Time until the next occurrence of `hour`:00 in the sweep's local
/// offset. Running exactly at the boundary schedules the following day.
pub fn next_sweep_delay(now_utc: OffsetDateTime, hour: u8, offset: UtcOffset) -> Duration {
    let local = now_utc.to_offset(offset);
    let target = Time::from_hms(hour, 0, 0).unwrap_or(Time::MIDNIGHT);
    let mut next = local.replace_time(target);
    if next <= local {
        next += TimeDuration::days(1);
    }
    let seconds = (next - local).whole_seconds().max(0) as u64;
    Duration::from_secs(seconds)
}
