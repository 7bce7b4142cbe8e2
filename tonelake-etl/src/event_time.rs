//! Event-time decomposition.
//!
//! Activity events carry `ts`, milliseconds since the Unix epoch. The `time`
//! dimension and the fact table's partition columns derive from that instant
//! interpreted in UTC.
//!
//! `weekday` keeps the upstream warehouse numbering: 1 = Sunday through
//! 7 = Saturday. `week` is the ISO week of year.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// Interpret epoch milliseconds as a UTC instant.
///
/// Returns `None` for values outside chrono's representable range; such a
/// `ts` decomposes to nulls rather than aborting the run.
pub fn from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Calendar fields of one event instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeParts {
    pub hour: i64,
    pub day: i64,
    /// ISO week of year
    pub week: i64,
    pub month: i64,
    pub year: i64,
    /// 1 = Sunday .. 7 = Saturday
    pub weekday: i64,
}

/// Decompose epoch milliseconds into calendar fields.
pub fn decompose(ms: i64) -> Option<TimeParts> {
    let dt = from_epoch_ms(ms)?;
    Some(TimeParts {
        hour: i64::from(dt.hour()),
        day: i64::from(dt.day()),
        week: i64::from(dt.iso_week().week()),
        month: i64::from(dt.month()),
        year: i64::from(dt.year()),
        weekday: i64::from(dt.weekday().num_days_from_sunday()) + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decompose_known_instant() {
        // 2018-11-05T17:49:36.796Z, a Monday
        let parts = decompose(1_541_440_176_796).unwrap();
        assert_eq!(parts.year, 2018);
        assert_eq!(parts.month, 11);
        assert_eq!(parts.day, 5);
        assert_eq!(parts.hour, 17);
        assert_eq!(parts.week, 45);
        assert_eq!(parts.weekday, 2);
    }

    #[test]
    fn test_decompose_month_start() {
        // 2018-11-01T00:00:00Z, a Thursday
        let parts = decompose(1_541_030_400_000).unwrap();
        assert_eq!(parts.year, 2018);
        assert_eq!(parts.month, 11);
        assert_eq!(parts.day, 1);
        assert_eq!(parts.hour, 0);
        assert_eq!(parts.weekday, 5);
    }

    #[test]
    fn test_roundtrip_consistency() {
        // Recomputing fields from the stored start_time must agree with the
        // stored derived fields
        for ms in [0_i64, 1_541_440_176_796, 1_546_300_800_000] {
            let parts = decompose(ms).unwrap();
            let dt = from_epoch_ms(ms).unwrap();
            assert_eq!(parts.hour, i64::from(dt.hour()));
            assert_eq!(parts.day, i64::from(dt.day()));
            assert_eq!(parts.week, i64::from(dt.iso_week().week()));
            assert_eq!(parts.month, i64::from(dt.month()));
            assert_eq!(parts.year, i64::from(dt.year()));
        }
    }

    #[test]
    fn test_millisecond_precision_preserved() {
        let dt = from_epoch_ms(1_541_440_176_796).unwrap();
        assert_eq!(dt.timestamp_millis(), 1_541_440_176_796);
    }
}
