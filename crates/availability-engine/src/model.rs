//! Normalized scheduling types shared by every stage of the engine.
//!
//! Values of these types have already passed boundary validation (see
//! [`crate::dto`]); the pure functions in this crate trust their invariants.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Time of day encoded as a 24h `HHMM` integer (`930` is 09:30, `1400` is 14:00).
///
/// Ordering follows the integer, which matches chronological order because
/// minutes never exceed 59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct ClockTime(u16);

impl ClockTime {
    /// Build from an `HHMM` integer, rejecting hours above 23 or minutes above 59.
    pub fn from_hhmm(hhmm: u16) -> Result<Self> {
        let (hour, minute) = (hhmm / 100, hhmm % 100);
        if hour > 23 || minute > 59 {
            return Err(EngineError::InvalidClockTime(i64::from(hhmm)));
        }
        Ok(Self(hhmm))
    }

    /// Build from minutes since midnight. Values past 23:59 are clamped.
    pub fn from_minutes(minutes: u32) -> Self {
        let minutes = minutes.min(23 * 60 + 59);
        Self(((minutes / 60) * 100 + minutes % 60) as u16)
    }

    pub fn hhmm(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0 / 100)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0 % 100)
    }

    /// Minutes elapsed since midnight.
    pub fn minutes(self) -> u32 {
        self.hour() * 60 + self.minute()
    }

    pub fn to_naive_time(self) -> NaiveTime {
        // hour/minute were range-checked on construction
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }
}

impl TryFrom<u16> for ClockTime {
    type Error = EngineError;

    fn try_from(value: u16) -> Result<Self> {
        Self::from_hhmm(value)
    }
}

impl From<ClockTime> for u16 {
    fn from(value: ClockTime) -> Self {
        value.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Who a declaration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostType {
    Center,
    User,
}

/// Role of a user-hosted declaration's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Consultant,
    Admin,
    Patient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// RFC 5545 `FREQ` token.
    pub fn as_rrule(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
        }
    }
}

/// A compact recurrence description anchored at `start_date`.
///
/// `count == Some(1)` encodes a one-time event through the same representation
/// as repeating schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    pub interval: u32,
    #[serde(default)]
    pub by_weekday: Vec<Weekday>,
    pub count: Option<u32>,
    /// Last calendar day (inclusive) on which the rule may occur.
    pub until: Option<NaiveDate>,
    pub start_date: DateTime<Utc>,
}

impl RecurrenceRule {
    /// A rule that occurs exactly once, on the UTC date of `start_date`.
    pub fn once(start_date: DateTime<Utc>) -> Self {
        Self {
            frequency: Frequency::Daily,
            interval: 1,
            by_weekday: Vec::new(),
            count: Some(1),
            until: None,
            start_date,
        }
    }

    pub fn weekly(start_date: DateTime<Utc>, by_weekday: Vec<Weekday>) -> Self {
        Self {
            frequency: Frequency::Weekly,
            interval: 1,
            by_weekday,
            count: None,
            until: None,
            start_date,
        }
    }

    pub fn daily(start_date: DateTime<Utc>) -> Self {
        Self {
            frequency: Frequency::Daily,
            interval: 1,
            by_weekday: Vec::new(),
            count: None,
            until: None,
            start_date,
        }
    }

    pub fn with_until(mut self, until: NaiveDate) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn is_one_time(&self) -> bool {
        self.count == Some(1)
    }
}

/// Display details of the host carried alongside its declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostProfile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub specialty: Option<String>,
    pub avatar_url: Option<String>,
}

/// A staff-authored statement of availability (or blackout), possibly recurring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityDeclaration {
    pub id: String,
    pub host_type: HostType,
    pub user_type: Option<UserType>,
    pub host_id: String,
    /// Center the declaration is scoped to. Legacy declarations omit it.
    pub center_id: Option<String>,
    /// Centers the host consultant is assigned to (legacy filtering path).
    #[serde(default)]
    pub host_center_ids: Vec<String>,
    pub center_name: Option<String>,
    pub host_profile: Option<HostProfile>,
    pub is_available: bool,
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub rule: RecurrenceRule,
    pub title: String,
}

impl AvailabilityDeclaration {
    pub fn is_consultant_hosted(&self) -> bool {
        self.host_type == HostType::User && self.user_type == Some(UserType::Consultant)
    }

    pub fn host_key(&self) -> HostKey {
        HostKey {
            host_type: self.host_type,
            host_id: self.host_id.clone(),
        }
    }
}

/// Identity of a schedule row: one per host.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostKey {
    pub host_type: HostType,
    pub host_id: String,
}

/// Day-aligned date range, inclusive of both ends. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "WindowBounds")]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

/// Unchecked wire form of a [`DateWindow`].
#[derive(Deserialize)]
struct WindowBounds {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<WindowBounds> for DateWindow {
    type Error = EngineError;

    fn try_from(bounds: WindowBounds) -> Result<Self> {
        Self::try_new(bounds.start, bounds.end)
    }
}

impl DateWindow {
    /// `start` and `end` are swapped if given out of order.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// Like [`DateWindow::new`] but rejects a reversed range.
    pub fn try_new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(EngineError::InvalidWindow {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Single-day view.
    pub fn day(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    /// Seven-day view starting on the Monday of `date`'s week.
    pub fn week_of(date: NaiveDate) -> Self {
        let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn len_days(&self) -> usize {
        usize::try_from((self.end - self.start).num_days() + 1).unwrap_or(0)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.start.iter_days().take(self.len_days())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Half-open UTC bounds: midnight of `start` to midnight after `end`.
    pub fn utc_bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            self.start.and_time(NaiveTime::MIN).and_utc(),
            (self.end + Duration::days(1)).and_time(NaiveTime::MIN).and_utc(),
        )
    }
}

/// One typed span of a host's day after splitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_time: ClockTime,
    pub end_time: ClockTime,
    pub is_available: bool,
    pub title: String,
    pub source: AvailabilityDeclaration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

/// An existing booking. Cancelled appointments never block a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub consultant_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn blocks_time(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}
