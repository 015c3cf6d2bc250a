//! Time utilities: conversion between UTC instants and wall-clock times in
//! named IANA zones.
//!
//! Resolution policy for local times that don't map to exactly one instant:
//! - spring-forward gap: the first instant after the gap (the transition itself)
//! - fall-back overlap: the earlier of the two occurrences

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, SecondsFormat,
    TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::TimezoneProvider;
use crate::error::ConvertError;

/// Shown wherever a stored value can't be rendered.
pub const PLACEHOLDER: &str = "--";

const DATE_FORMAT: &str = "%Y-%m-%d";

const NAIVE_INSTANT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Calendar date + wall-clock time, with no zone attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalDateTime {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl LocalDateTime {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }

    /// Parse form values like `"2026-01-06"` and `"14:57"` (seconds optional).
    pub fn parse(date: &str, time: &str) -> Option<Self> {
        Some(Self::new(parse_date(date)?, parse_time(time)?))
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn date_string(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// `HH:MM`, or `HH:MM:SS` when the time carries seconds.
    pub fn time_string(&self) -> String {
        if self.time.second() == 0 {
            self.time.format("%H:%M").to_string()
        } else {
            self.time.format("%H:%M:%S").to_string()
        }
    }
}

impl From<NaiveDateTime> for LocalDateTime {
    fn from(ndt: NaiveDateTime) -> Self {
        Self::new(ndt.date(), ndt.time())
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

pub fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Look up any IANA name chrono-tz knows about (not only the catalog).
pub fn parse_tz(name: &str) -> Result<Tz, ConvertError> {
    name.trim()
        .parse()
        .map_err(|_| ConvertError::InvalidTimezone(name.to_string()))
}

/// Interpret `local` as experienced by an observer in `tz`, returning UTC.
pub fn to_utc(local: &LocalDateTime, tz: &str) -> Result<DateTime<Utc>, ConvertError> {
    let tz = parse_tz(tz)?;
    Ok(resolve_local(tz, local.naive()))
}

/// Same as [`to_utc`] for an already-parsed zone. Never fails.
pub fn resolve_local(tz: Tz, ndt: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&ndt) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, latest) => {
            debug!(%tz, %ndt, %earliest, %latest, "ambiguous local time, using earlier occurrence");
            earliest.with_timezone(&Utc)
        }
        LocalResult::None => {
            let resolved = gap_end(tz, ndt);
            debug!(%tz, %ndt, %resolved, "local time falls in a DST gap, using end of gap");
            resolved
        }
    }
}

/// First instant after the gap containing `ndt`.
///
/// Read with the pre-gap offset `ndt` lands after the transition, read with the
/// post-gap offset it lands before it; bisect between the two.
fn gap_end(tz: Tz, ndt: NaiveDateTime) -> DateTime<Utc> {
    let before = tz.offset_from_utc_datetime(&(ndt - Duration::days(1))).fix();
    let after = tz.offset_from_utc_datetime(&(ndt + Duration::days(1))).fix();

    let mut lo = (ndt - Duration::seconds(after.local_minus_utc().into()))
        .and_utc()
        .timestamp();
    let mut hi = (ndt - Duration::seconds(before.local_minus_utc().into()))
        .and_utc()
        .timestamp();

    let offset_at = |ts: i64| {
        DateTime::from_timestamp(ts, 0).map(|dt| tz.offset_from_utc_datetime(&dt.naive_utc()).fix())
    };

    let lo_offset = offset_at(lo);
    if lo >= hi || lo_offset.is_none() {
        return ndt.and_utc() - Duration::seconds(before.local_minus_utc().into());
    }

    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if offset_at(mid) == lo_offset {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    DateTime::from_timestamp(hi, 0).unwrap_or_else(|| ndt.and_utc())
}

/// Wall-clock time of `instant` in `tz`.
pub fn to_local(instant: DateTime<Utc>, tz: &str) -> Result<LocalDateTime, ConvertError> {
    let tz = parse_tz(tz)?;
    Ok(instant.with_timezone(&tz).naive_local().into())
}

/// Wall-clock time of `instant` in the display context's zone. Display only.
pub fn to_browser_local(instant: DateTime<Utc>, zone: &dyn TimezoneProvider) -> LocalDateTime {
    instant.with_timezone(&zone.detected()).naive_local().into()
}

/// Parse an API timestamp. Strings without an offset are UTC by convention.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, ConvertError> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_INSTANT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|ndt| ndt.and_utc())
        .ok_or_else(|| ConvertError::InvalidInstant(raw.to_string()))
}

/// RFC 3339 with a `Z` suffix and whole seconds, e.g. `2100-01-01T04:59:00Z`.
pub fn format_instant(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// `GMT-05:00` style offset of `tz` at `at`.
pub fn utc_offset_label(tz: Tz, at: DateTime<Utc>) -> String {
    let secs = tz.offset_from_utc_datetime(&at.naive_utc()).fix().local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!("GMT{sign}{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
}

/// A stored instant rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTime {
    pub date: String,
    pub time: String,
    /// Zone actually used (UTC when the requested one was unknown).
    pub zone: String,
    pub instant: Option<DateTime<Utc>>,
}

impl DisplayTime {
    fn placeholder(zone: String) -> Self {
        Self {
            date: PLACEHOLDER.to_string(),
            time: PLACEHOLDER.to_string(),
            zone,
            instant: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.instant.is_some()
    }
}

/// Render a persisted instant in its reminder's zone.
///
/// Unknown zones fall back to UTC and malformed instants to [`PLACEHOLDER`];
/// a corrupt record must still render.
pub fn display_local(raw_instant: &str, tz: &str) -> DisplayTime {
    let zone = match parse_tz(tz) {
        Ok(zone) => zone,
        Err(_) => {
            debug!(tz, "unknown timezone on stored reminder, displaying in UTC");
            chrono_tz::UTC
        }
    };
    display_in(raw_instant, zone)
}

/// Render a persisted instant in the display context's zone.
pub fn display_browser_local(raw_instant: &str, zone: &dyn TimezoneProvider) -> DisplayTime {
    display_in(raw_instant, zone.detected())
}

fn display_in(raw_instant: &str, zone: Tz) -> DisplayTime {
    match parse_instant(raw_instant) {
        Ok(instant) => {
            let local: LocalDateTime = instant.with_timezone(&zone).naive_local().into();
            DisplayTime {
                date: local.date_string(),
                time: local.time.format("%H:%M").to_string(),
                zone: zone.name().to_string(),
                instant: Some(instant),
            }
        }
        Err(err) => {
            debug!(%err, "stored instant not displayable");
            DisplayTime::placeholder(zone.name().to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TIMEZONES;
    use crate::clock::FixedTimezone;

    fn ldt(date: &str, time: &str) -> LocalDateTime {
        LocalDateTime::parse(date, time).unwrap()
    }

    #[test]
    fn test_new_york_winter_is_est() {
        let utc = to_utc(&ldt("2099-12-31", "23:59"), "America/New_York").unwrap();
        assert_eq!(format_instant(utc), "2100-01-01T04:59:00Z");
    }

    #[test]
    fn test_parse_chicago_deadline() {
        // Feb is CST (UTC-6)
        let utc = to_utc(&ldt("2026-02-20", "23:59"), "America/Chicago").unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-21T05:59:00+00:00");
    }

    #[test]
    fn round_trip_over_catalog() {
        let instants = [
            Utc.with_ymd_and_hms(2026, 1, 6, 19, 57, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 7, 15, 3, 30, 15).unwrap(),
            Utc.with_ymd_and_hms(2030, 12, 31, 23, 59, 59).unwrap(),
        ];
        for entry in TIMEZONES {
            let tz = parse_tz(entry.name).unwrap();
            for &i in &instants {
                let local = to_local(i, entry.name).unwrap();
                if !matches!(tz.from_local_datetime(&local.naive()), LocalResult::Single(_)) {
                    continue;
                }
                assert_eq!(to_utc(&local, entry.name).unwrap(), i, "{}", entry.name);
            }
        }
    }

    #[test]
    fn spring_forward_gap_resolves_to_end_of_gap() {
        // 2026-03-08 02:00 EST jumps to 03:00 EDT (07:00Z).
        let utc = to_utc(&ldt("2026-03-08", "02:30"), "America/New_York").unwrap();
        assert_eq!(format_instant(utc), "2026-03-08T07:00:00Z");

        let local = to_local(utc, "America/New_York").unwrap();
        assert_eq!(local.time_string(), "03:00");
    }

    #[test]
    fn gap_with_half_hour_zone() {
        // Adelaide springs forward 2026-10-04 02:00 ACST -> 03:00 ACDT (16:30Z prior day).
        let utc = to_utc(&ldt("2026-10-04", "02:15"), "Australia/Adelaide").unwrap();
        assert_eq!(format_instant(utc), "2026-10-03T16:30:00Z");
    }

    #[test]
    fn fall_back_overlap_is_deterministic() {
        // 01:30 happens twice on 2026-11-01 in New York; earlier one is EDT.
        let local = ldt("2026-11-01", "01:30");
        let first = to_utc(&local, "America/New_York").unwrap();
        let second = to_utc(&local, "America/New_York").unwrap();
        assert_eq!(first, second);
        assert_eq!(format_instant(first), "2026-11-01T05:30:00Z");
    }

    #[test]
    fn unknown_zone_fails_conversion() {
        let err = to_utc(&ldt("2026-01-01", "10:00"), "Mars/Olympus").unwrap_err();
        assert_eq!(err, ConvertError::InvalidTimezone("Mars/Olympus".into()));
    }

    #[test]
    fn conversion_accepts_zones_outside_catalog() {
        let utc = to_utc(&ldt("2026-01-06", "12:00"), "Europe/Bucharest").unwrap();
        assert_eq!(format_instant(utc), "2026-01-06T10:00:00Z");
    }

    #[test]
    fn naive_instant_is_utc() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 6, 19, 57, 0).unwrap();
        for raw in [
            "2026-01-06T19:57:00",
            "2026-01-06T19:57:00.000000",
            "2026-01-06 19:57:00",
            "2026-01-06T19:57",
            "2026-01-06T19:57:00Z",
            "2026-01-06T21:57:00+02:00",
        ] {
            assert_eq!(parse_instant(raw).unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn malformed_instant_is_rejected() {
        assert!(matches!(
            parse_instant("next tuesday"),
            Err(ConvertError::InvalidInstant(_))
        ));
    }

    #[test]
    fn display_degrades_instead_of_failing() {
        let shown = display_local("garbage", "America/New_York");
        assert_eq!(shown.date, PLACEHOLDER);
        assert!(!shown.is_valid());

        let shown = display_local("2026-01-06T19:57:00", "Not/AZone");
        assert_eq!(shown.zone, "UTC");
        assert_eq!(shown.time, "19:57");
    }

    #[test]
    fn browser_local_uses_detected_zone() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 6, 19, 57, 0).unwrap();
        let local = to_browser_local(instant, &FixedTimezone(chrono_tz::Asia::Tokyo));
        assert_eq!(local.date_string(), "2026-01-07");
        assert_eq!(local.time_string(), "04:57");
    }

    #[test]
    fn offset_labels() {
        let winter = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        assert_eq!(utc_offset_label(chrono_tz::America::New_York, winter), "GMT-05:00");
        assert_eq!(utc_offset_label(chrono_tz::Asia::Kathmandu, winter), "GMT+05:45");
    }
}
