//! Wall-clock → instant conversion for the generators.
//!
//! Digest targets are expressed as a local time in the user's IANA zone;
//! everything downstream compares absolute UTC instants only, so the host's
//! default timezone never influences which jobs are due.

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Next occurrence of `hour:minute` local time in `tz`, as a UTC instant.
///
/// If the target time has already passed today (relative to `now` in that
/// zone), the occurrence rolls forward to tomorrow. A target that falls into
/// a DST gap rolls forward to the next day it exists; an ambiguous target
/// (clocks rolled back) resolves to the earlier of the two instants.
///
/// Returns `None` for an invalid hour/minute.
pub fn next_local_occurrence(
    now: DateTime<Utc>,
    tz: Tz,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Utc>> {
    let target = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let mut date = now.with_timezone(&tz).date_naive();

    // Two extra days cover a target swallowed by a DST transition.
    for _ in 0..3 {
        if let Some(candidate) = resolve_local(date.and_time(target), tz)
            && candidate > now
        {
            return Some(candidate);
        }
        date = date.succ_opt()?;
    }
    None
}

/// Map a naive local datetime onto the UTC timeline.
fn resolve_local(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Time remaining until the next `hour:00` UTC, used to anchor the daily
/// generation loop.
pub fn until_next_utc_hour(now: DateTime<Utc>, hour: u32) -> std::time::Duration {
    let target = NaiveTime::from_hms_opt(hour % 24, 0, 0).unwrap_or(NaiveTime::MIN);
    let mut candidate = now.date_naive().and_time(target).and_utc();
    if candidate <= now {
        candidate += Duration::days(1);
    }
    (candidate - now).to_std().unwrap_or_default()
}
