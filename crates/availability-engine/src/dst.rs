//! DST policies for turning a center's local wall-clock times into UTC.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Policy for local times that fall in a DST gap or overlap.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DstPolicy {
    /// Drop local times that do not exist (e.g. 2:30 AM during spring forward)
    Skip,
    /// Move to the first valid minute after the gap
    ShiftForward,
    /// Read the time with the offset in force before the transition
    #[default]
    WallClock,
}

/// Resolve `local` in `tz` to a UTC instant. Ambiguous times (fall back) take
/// the earlier instant under every policy.
pub fn resolve_local(tz: Tz, local: NaiveDateTime, policy: DstPolicy) -> Option<DateTime<Utc>> {
    if let Some(dt) = tz.from_local_datetime(&local).earliest() {
        return Some(dt.with_timezone(&Utc));
    }

    match policy {
        DstPolicy::Skip => None,
        DstPolicy::ShiftForward => (1..=180)
            .map(|m| local + Duration::minutes(m))
            .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
            .map(|dt| dt.with_timezone(&Utc)),
        DstPolicy::WallClock => {
            let before = local - Duration::hours(1);
            tz.from_local_datetime(&before)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc) + Duration::hours(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn local(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 8)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn gap_time_is_skipped_or_shifted() {
        let tz: Tz = "America/Los_Angeles".parse().unwrap();
        assert!(resolve_local(tz, local(2, 30), DstPolicy::Skip).is_none());

        // 03:00 PDT == 10:00 UTC
        let shifted = resolve_local(tz, local(2, 30), DstPolicy::ShiftForward).unwrap();
        assert_eq!(shifted, Utc.with_ymd_and_hms(2026, 3, 8, 10, 0, 0).unwrap());

        // 02:30 read at PST (-8) == 10:30 UTC
        let wall = resolve_local(tz, local(2, 30), DstPolicy::WallClock).unwrap();
        assert_eq!(wall, Utc.with_ymd_and_hms(2026, 3, 8, 10, 30, 0).unwrap());
    }

    #[test]
    fn regular_time_resolves_directly() {
        let tz: Tz = "America/Los_Angeles".parse().unwrap();
        let dt = resolve_local(tz, local(9, 0), DstPolicy::Skip).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2026, 3, 8, 16, 0, 0).unwrap());
    }
}
