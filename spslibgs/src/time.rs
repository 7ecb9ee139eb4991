//! Time representations for procedures
//!
//! `SpecificTime` is an absolute instant with microsecond resolution and
//! `TimeInterval` is a signed duration. Both have their own string grammar.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Sub;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{SpsError, SpsResult};

const MICROS_PER_SECOND: i64 = 1_000_000;
const SECONDS_PER_DAY: i64 = 86_400;
const MICROS_PER_DAY: i64 = SECONDS_PER_DAY * MICROS_PER_SECOND;

/// Longest string parsed as a bare date
const DATE_ONLY_MAX_LEN: usize = 10;
/// Longest string parsed as date plus hours and minutes
const DATE_MINUTES_MAX_LEN: usize = 16;

/// An absolute instant used for timetags and time expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecificTime(NaiveDateTime);

impl SpecificTime {
    /// Build an instant from calendar fields
    pub fn new(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
        microsecond: u32,
    ) -> SpsResult<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .and_then(|date| date.and_hms_micro_opt(hour, minute, second, microsecond))
            .map(Self)
            .ok_or_else(|| {
                SpsError::InvalidTime(format!(
                    "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06} is not a valid instant",
                    year, month, day, hour, minute, second, microsecond
                ))
            })
    }

    /// Midnight at the start of the given date
    pub fn from_ymd(year: i32, month: u32, day: u32) -> SpsResult<Self> {
        Self::new(year, month, day, 0, 0, 0, 0)
    }

    fn from_naive(datetime: NaiveDateTime) -> Self {
        let micros = datetime.nanosecond() / 1_000;
        Self(datetime.with_nanosecond(micros * 1_000).unwrap_or(datetime))
    }

    /// The current local time
    pub fn now() -> Self {
        Self::from_naive(Local::now().naive_local())
    }

    /// The first instant of the current local day
    pub fn today() -> Self {
        Self(Local::now().date_naive().and_time(NaiveTime::MIN))
    }

    /// Day of the year, with January 1 as 1
    pub fn day_of_year(&self) -> u32 {
        self.0.ordinal()
    }

    pub fn microsecond(&self) -> u32 {
        self.0.nanosecond() / 1_000
    }

    /// Sub-second part in nanoseconds, derived from the microseconds
    pub fn nanos(&self) -> i64 {
        i64::from(self.microsecond()) * 1_000
    }

    /// Whole seconds since the POSIX epoch, reading the instant as UTC
    pub fn epoch_seconds(&self) -> i64 {
        self.0.and_utc().timestamp()
    }

    pub fn checked_add(&self, interval: TimeInterval) -> Option<Self> {
        self.0
            .checked_add_signed(TimeDelta::microseconds(interval.total_micros()))
            .map(Self)
    }

    pub fn checked_sub(&self, interval: TimeInterval) -> Option<Self> {
        self.0
            .checked_sub_signed(TimeDelta::microseconds(interval.total_micros()))
            .map(Self)
    }
}

impl FromStr for SpecificTime {
    type Err = SpsError;

    /// The grammar is chosen by the length of the trimmed string:
    /// up to 10 characters `YYYY-MM-DD`, up to 16 `YYYY-MM-DDTHH:MM`,
    /// anything longer `YYYY-MM-DDTHH:MM:SS.ffffff`.
    fn from_str(text: &str) -> SpsResult<Self> {
        let text = text.trim();
        let length = text.chars().count();
        let parsed = if length <= DATE_ONLY_MAX_LEN {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .map(|date| date.and_time(NaiveTime::MIN))
                .map_err(|e| e.to_string())
        } else if length <= DATE_MINUTES_MAX_LEN {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M").map_err(|e| e.to_string())
        } else {
            parse_with_fraction(text)
        };
        parsed
            .map(Self::from_naive)
            .map_err(|e| SpsError::InvalidTime(format!("'{}' is not a specific time: {}", text, e)))
    }
}

/// `YYYY-MM-DDTHH:MM:SS.ffffff` with one to six fraction digits, padded
/// on the right
fn parse_with_fraction(text: &str) -> Result<NaiveDateTime, String> {
    let (clock, fraction) = text.rsplit_once('.').ok_or("missing fractional seconds")?;
    if fraction.is_empty() || fraction.len() > 6 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("fraction '{}' is not 1 to 6 digits", fraction));
    }
    let micros: u32 = format!("{:0<6}", fraction).parse().map_err(|e| format!("{}", e))?;
    NaiveDateTime::parse_from_str(clock, "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| e.to_string())?
        .with_nanosecond(micros * 1_000)
        .ok_or_else(|| format!("fraction '{}' is out of range", fraction))
}

impl fmt::Display for SpecificTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.6f"))
    }
}

impl Sub for SpecificTime {
    type Output = TimeInterval;

    fn sub(self, rhs: SpecificTime) -> TimeInterval {
        let delta = self.0.signed_duration_since(rhs.0);
        let micros = delta.num_microseconds().unwrap_or(if delta < TimeDelta::zero() {
            i64::MIN
        } else {
            i64::MAX
        });
        TimeInterval::from_micros(micros)
    }
}

impl Serialize for SpecificTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpecificTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A signed relative time. Positive intervals point to the future and
/// negative ones to elapsed time.
///
/// The day, second and microsecond components all carry the sign of the
/// whole interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeInterval {
    micros: i64,
}

impl TimeInterval {
    pub fn new(days: i64, seconds: i64, microseconds: i64) -> Self {
        Self {
            micros: days
                .saturating_mul(MICROS_PER_DAY)
                .saturating_add(seconds.saturating_mul(MICROS_PER_SECOND))
                .saturating_add(microseconds),
        }
    }

    pub fn from_seconds(seconds: i64) -> Self {
        Self::new(0, seconds, 0)
    }

    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    pub fn days(&self) -> i64 {
        self.micros / MICROS_PER_DAY
    }

    /// Seconds within the day
    pub fn seconds(&self) -> i64 {
        (self.micros % MICROS_PER_DAY) / MICROS_PER_SECOND
    }

    /// Microseconds within the second
    pub fn microseconds(&self) -> i64 {
        self.micros % MICROS_PER_SECOND
    }

    pub fn total_micros(&self) -> i64 {
        self.micros
    }

    /// The entire interval in seconds
    pub fn as_seconds(&self) -> f64 {
        self.micros as f64 / MICROS_PER_SECOND as f64
    }

    /// Nanoseconds within the second, derived from the microseconds. Unlike
    /// the signed components this is always in `0..1_000_000_000`, counting
    /// forward from the whole second below the interval.
    pub fn nanos(&self) -> i64 {
        self.micros.rem_euclid(MICROS_PER_SECOND) * 1_000
    }

    pub fn is_negative(&self) -> bool {
        self.micros < 0
    }

    /// Convert to a std duration; `None` for negative intervals
    pub fn to_std(&self) -> Option<Duration> {
        u64::try_from(self.micros).ok().map(Duration::from_micros)
    }
}

fn parse_field(field: &str, text: &str) -> SpsResult<i64> {
    field
        .trim()
        .parse::<i64>()
        .map_err(|e| SpsError::InvalidTime(format!("'{}' is not a time interval: {}", text, e)))
}

impl FromStr for TimeInterval {
    type Err = SpsError;

    /// Grammar: `[+|-][D T][[HH:]MM:]SS[.fffffffff]`, read right to left
    /// after the day count. A bare number with no colon is taken as hours.
    fn from_str(text: &str) -> SpsResult<Self> {
        let mut rest = text.trim();
        if rest.is_empty() {
            return Err(SpsError::InvalidTime("empty time interval".to_string()));
        }
        if !rest.is_ascii() {
            return Err(SpsError::InvalidTime(format!("'{}' is not a time interval", text)));
        }

        let negative = rest.starts_with('-');
        if negative || rest.starts_with('+') {
            rest = &rest[1..];
        }

        let out_of_range = || SpsError::InvalidTime(format!("'{}' is out of range", text));

        let mut days = 0;
        if let Some(end) = rest.find('T').filter(|&end| end > 0) {
            days = parse_field(&rest[..end], text)?;
            if negative {
                days = days.checked_neg().ok_or_else(out_of_range)?;
            }
            rest = &rest[end + 1..];
        }

        let mut nanos = 0;
        if let Some(dot) = rest.rfind('.') {
            let fraction = &rest[dot + 1..];
            let digits = fraction.len().min(9);
            nanos = parse_field(&fraction[..digits], text)? * 10_i64.pow((9 - digits) as u32);
            rest = &rest[..dot];
        }

        let mut seconds = 0;
        if let Some(colon) = rest.rfind(':') {
            seconds = parse_field(&rest[colon + 1..], text)?;
            rest = &rest[..colon];
        }
        let mut minutes = 0;
        if let Some(colon) = rest.rfind(':') {
            minutes = parse_field(&rest[colon + 1..], text)?;
            rest = &rest[..colon];
        }
        let mut hours = 0;
        if !rest.is_empty() {
            hours = parse_field(rest, text)?;
        }

        let mut seconds = hours
            .checked_mul(3_600)
            .and_then(|s| s.checked_add(minutes.checked_mul(60)?))
            .and_then(|s| s.checked_add(seconds))
            .ok_or_else(out_of_range)?;
        // A zero day count cannot carry the sign, so it moves to the seconds.
        if days == 0 && negative {
            seconds = seconds.checked_neg().ok_or_else(out_of_range)?;
        }
        days
            .checked_mul(MICROS_PER_DAY)
            .and_then(|micros| micros.checked_add(seconds.checked_mul(MICROS_PER_SECOND)?))
            .and_then(|micros| micros.checked_add(nanos / 1_000))
            .map(Self::from_micros)
            .ok_or_else(out_of_range)
    }
}

impl fmt::Display for TimeInterval {
    /// Renders `{days}T{HH}:{MM}:{SS}.{ffffff}`. No sign is written for the
    /// clock fields, so a negative interval under one day loses its sign.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.seconds().abs();
        write!(
            f,
            "{}T{:02}:{:02}:{:02}.{:06}",
            self.days(),
            seconds / 3_600,
            (seconds % 3_600) / 60,
            seconds % 60,
            self.microseconds().abs()
        )
    }
}

impl Serialize for TimeInterval {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeInterval {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_time_grammars() {
        let date: SpecificTime = "2024-04-25".parse().unwrap();
        let minutes: SpecificTime = "2024-04-25T12:10".parse().unwrap();
        let full: SpecificTime = "2024-04-25T12:10:00.000000".parse().unwrap();

        assert_eq!(date, SpecificTime::from_ymd(2024, 4, 25).unwrap());
        assert_eq!(minutes, SpecificTime::new(2024, 4, 25, 12, 10, 0, 0).unwrap());
        assert_eq!(minutes, full);
        assert!(date < minutes);
    }

    #[test]
    fn test_specific_time_trims_before_dispatch() {
        let padded: SpecificTime = "  2024-04-25  ".parse().unwrap();
        assert_eq!(padded, SpecificTime::from_ymd(2024, 4, 25).unwrap());
    }

    #[test]
    fn test_specific_time_length_dispatch_rejects_mismatched_form() {
        // 19 characters selects the full grammar, which needs a fraction.
        assert!("2024-04-25T12:10:00x".parse::<SpecificTime>().is_err());
        // 13 characters selects the minutes grammar.
        assert!("2024-04-25T12".parse::<SpecificTime>().is_err());
    }

    #[test]
    fn test_specific_time_fraction_is_one_to_six_digits() {
        assert!("2024-04-25T12:10:00".parse::<SpecificTime>().is_err());
        assert!("2024-04-25T12:10:00.".parse::<SpecificTime>().is_err());
        assert!("2024-04-25T12:10:00.1234567".parse::<SpecificTime>().is_err());
        assert!("2024-04-25T12:10:00.12a".parse::<SpecificTime>().is_err());

        let short: SpecificTime = "2024-04-25T12:10:00.5".parse().unwrap();
        assert_eq!(short.microsecond(), 500_000);
        let full: SpecificTime = "2024-04-25T12:10:00.000042".parse().unwrap();
        assert_eq!(full.microsecond(), 42);
    }

    #[test]
    fn test_specific_time_display() {
        let t = SpecificTime::new(2024, 4, 25, 12, 10, 5, 42).unwrap();
        assert_eq!(t.to_string(), "2024-04-25T12:10:05.000042");
        let date: SpecificTime = "2024-04-25".parse().unwrap();
        assert_eq!(date.to_string(), "2024-04-25T00:00:00.000000");
    }

    #[test]
    fn test_specific_time_nanos_and_day_of_year() {
        let t: SpecificTime = "2024-03-01T00:00:00.250000".parse().unwrap();
        assert_eq!(t.nanos(), 250_000_000);
        // 2024 is a leap year: 31 + 29 + 1
        assert_eq!(t.day_of_year(), 61);
        assert_eq!(SpecificTime::from_ymd(2023, 1, 1).unwrap().day_of_year(), 1);
    }

    #[test]
    fn test_specific_time_epoch_seconds() {
        let t: SpecificTime = "1970-01-02T00:00:01.900000".parse().unwrap();
        assert_eq!(t.epoch_seconds(), 86_401);
    }

    #[test]
    fn test_specific_time_arithmetic() {
        let start = SpecificTime::from_ymd(2024, 4, 25).unwrap();
        let later = start.checked_add(TimeInterval::new(1, 30, 0)).unwrap();
        assert_eq!(later.to_string(), "2024-04-26T00:00:30.000000");
        assert_eq!(later - start, TimeInterval::new(1, 30, 0));
        assert_eq!(later.checked_sub(TimeInterval::new(1, 30, 0)), Some(start));
    }

    #[test]
    fn test_interval_round_trip() {
        let interval = TimeInterval::new(1, 2 * 3600 + 3 * 60 + 4, 500_000);
        let text = interval.to_string();
        assert_eq!(text, "1T02:03:04.500000");

        let parsed: TimeInterval = text.parse().unwrap();
        assert_eq!(parsed.days(), 1);
        assert_eq!(parsed.seconds(), 7384);
        assert_eq!(parsed.microseconds(), 500_000);
        assert_eq!(parsed, interval);
    }

    #[test]
    fn test_interval_partial_clock_fields() {
        let seconds: TimeInterval = ":30.0".parse().unwrap();
        assert_eq!(seconds, TimeInterval::from_seconds(30));

        let minutes: TimeInterval = "2:03".parse().unwrap();
        assert_eq!(minutes, TimeInterval::from_seconds(123));

        // No colon at all: the number is hours
        let hours: TimeInterval = "2".parse().unwrap();
        assert_eq!(hours, TimeInterval::from_seconds(7200));
    }

    #[test]
    fn test_interval_fraction_truncated_to_micros() {
        let interval: TimeInterval = ":1.123456789".parse().unwrap();
        assert_eq!(interval.microseconds(), 123_456);
        assert_eq!(interval.nanos(), 123_456_000);

        let short: TimeInterval = ":1.5".parse().unwrap();
        assert_eq!(short.microseconds(), 500_000);
    }

    #[test]
    fn test_interval_negative_without_days_moves_sign_to_seconds() {
        let interval: TimeInterval = "-1:00:00".parse().unwrap();
        assert_eq!(interval, TimeInterval::from_seconds(-3600));
        assert!(interval.is_negative());

        // The fraction keeps its own (positive) sign
        let odd: TimeInterval = "-:30.5".parse().unwrap();
        assert_eq!(odd.total_micros(), -29_500_000);
        assert_eq!(odd.seconds(), -29);
        assert_eq!(odd.microseconds(), -500_000);
        // The sub-second remainder counts forward from -30 s
        assert_eq!(odd.nanos(), 500_000_000);
        assert_eq!(TimeInterval::from_micros(-250).nanos(), 999_750_000);
    }

    #[test]
    fn test_interval_overflow_is_an_error() {
        for text in [
            "9999999999999999",
            "1:9223372036854775807:00",
            "106751991167T00:00:00",
            "-9223372036854775807T00:00:00",
        ] {
            let result = text.parse::<TimeInterval>();
            assert!(matches!(result, Err(SpsError::InvalidTime(_))), "{} gave {:?}", text, result);
        }
    }

    #[test]
    fn test_interval_negative_days_only_sign_days() {
        let interval: TimeInterval = "-1T01:00:00".parse().unwrap();
        assert_eq!(interval, TimeInterval::new(-1, 3600, 0));
    }

    #[test]
    fn test_negative_interval_round_trip_is_lossy() {
        let interval = TimeInterval::from_seconds(-30);
        let text = interval.to_string();
        assert_eq!(text, "0T00:00:30.000000");

        let reparsed: TimeInterval = text.parse().unwrap();
        assert_eq!(reparsed, TimeInterval::from_seconds(30));
        assert_ne!(reparsed, interval);
    }

    #[test]
    fn test_interval_rejects_garbage() {
        assert!("".parse::<TimeInterval>().is_err());
        assert!("1:xx".parse::<TimeInterval>().is_err());
        assert!(":30.".parse::<TimeInterval>().is_err());
    }

    #[test]
    fn test_interval_to_std() {
        assert_eq!(TimeInterval::new(0, 5, 0).to_std(), Some(Duration::from_secs(5)));
        assert_eq!(TimeInterval::from_seconds(-5).to_std(), None);
    }

    #[test]
    fn test_time_serialization() {
        let t = SpecificTime::new(2024, 4, 25, 12, 10, 0, 0).unwrap();
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, "\"2024-04-25T12:10:00.000000\"");
        let decoded: SpecificTime = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, t);
    }
}
