//! The snapshot time base: 100-nanosecond ticks since 0001-01-01T00:00:00 UTC.
//!
//! Everything a snapshot records about time (its own creation, file access
//! and modification) is a u64 of these ticks, and snapshot file names are a
//! rendering of them chosen so lexicographic order is chronological order.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use jiff::Timestamp;

pub const TICKS_PER_SECOND: u64 = 10_000_000;

/// 0001-01-01 to 1970-01-01 in the proleptic Gregorian calendar.
pub const UNIX_EPOCH_TICKS: u64 = 62_135_596_800 * TICKS_PER_SECOND;

/// The current wall clock, in ticks.
pub fn now() -> u64 {
    from_timestamp(Timestamp::now())
}

pub fn from_timestamp(ts: Timestamp) -> u64 {
    // Timestamps before year 1 aren't representable; pin them to the epoch.
    let ticks = ts.as_nanosecond() / 100 + UNIX_EPOCH_TICKS as i128;
    ticks.clamp(0, u64::MAX as i128) as u64
}

pub fn from_system_time(t: SystemTime) -> u64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => {
            UNIX_EPOCH_TICKS + d.as_secs() * TICKS_PER_SECOND + u64::from(d.subsec_nanos()) / 100
        }
        // Pre-1970 mtimes are a curiosity; saturate rather than panic.
        Err(e) => UNIX_EPOCH_TICKS.saturating_sub(
            e.duration().as_secs() * TICKS_PER_SECOND + u64::from(e.duration().subsec_nanos()) / 100,
        ),
    }
}

/// Seconds and nanoseconds relative to the Unix epoch.
pub fn to_unix_parts(ticks: u64) -> (i64, i64) {
    let rel = ticks as i128 - UNIX_EPOCH_TICKS as i128;
    let secs = rel.div_euclid(TICKS_PER_SECOND as i128) as i64;
    let nanos = (rel.rem_euclid(TICKS_PER_SECOND as i128) * 100) as i64;
    (secs, nanos)
}

#[cfg(windows)]
pub fn to_system_time(ticks: u64) -> SystemTime {
    use std::time::Duration;

    let (secs, nanos) = to_unix_parts(ticks);
    if secs >= 0 {
        UNIX_EPOCH + Duration::new(secs as u64, nanos as u32)
    } else {
        UNIX_EPOCH - Duration::new(secs.unsigned_abs(), 0) + Duration::from_nanos(nanos as u64)
    }
}

pub fn to_timestamp(ticks: u64) -> Result<Timestamp> {
    let nanos = (ticks as i128 - UNIX_EPOCH_TICKS as i128) * 100;
    Ok(Timestamp::from_nanosecond(nanos)?)
}

/// `YYYYMMDD_HHMMSS_fffffff` (UTC, 7-digit tick fraction).
///
/// Snapshot files are named this way so that sorting their names sorts them
/// by creation time.
pub fn snapshot_name(ticks: u64) -> Result<String> {
    let zdt = to_timestamp(ticks)?.to_zoned(jiff::tz::TimeZone::UTC);
    Ok(format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}_{:07}",
        zdt.year(),
        zdt.month(),
        zdt.day(),
        zdt.hour(),
        zdt.minute(),
        zdt.second(),
        ticks % TICKS_PER_SECOND
    ))
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn epoch_conversions() {
        assert_eq!(from_system_time(UNIX_EPOCH), UNIX_EPOCH_TICKS);
        assert_eq!(to_unix_parts(UNIX_EPOCH_TICKS), (0, 0));

        let later = UNIX_EPOCH + Duration::new(1_000_000_000, 123_456_700);
        let ticks = from_system_time(later);
        assert_eq!(ticks, UNIX_EPOCH_TICKS + 1_000_000_000 * TICKS_PER_SECOND + 1_234_567);
        assert_eq!(to_unix_parts(ticks), (1_000_000_000, 123_456_700));
    }

    #[test]
    fn sub_tick_precision_is_dropped() {
        // 150ns is one and a half ticks; the half rounds down.
        let t = UNIX_EPOCH + Duration::from_nanos(150);
        assert_eq!(from_system_time(t), UNIX_EPOCH_TICKS + 1);
    }

    #[test]
    fn names_sort_chronologically() -> Result<()> {
        assert_eq!(snapshot_name(UNIX_EPOCH_TICKS)?, "19700101_000000_0000000");

        // 2001-09-09T01:46:40Z, one gigasecond past the epoch.
        let giga = UNIX_EPOCH_TICKS + 1_000_000_000 * TICKS_PER_SECOND;
        assert_eq!(snapshot_name(giga)?, "20010909_014640_0000000");
        assert_eq!(snapshot_name(giga + 42)?, "20010909_014640_0000042");

        let mut names = vec![
            snapshot_name(giga + 42)?,
            snapshot_name(giga)?,
            snapshot_name(UNIX_EPOCH_TICKS)?,
        ];
        names.sort();
        assert_eq!(
            names,
            vec![
                snapshot_name(UNIX_EPOCH_TICKS)?,
                snapshot_name(giga)?,
                snapshot_name(giga + 42)?,
            ]
        );
        Ok(())
    }
}
