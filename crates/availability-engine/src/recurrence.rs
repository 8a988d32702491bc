//! Recurrence expansion -- decides whether a declaration's rule occurs on a date
//! or inside a window.
//!
//! Wraps the `rrule` crate (v0.13). All arithmetic is done in UTC so that the
//! same rule yields the same dates regardless of the host's local offset; a
//! `DTSTART;TZID=...` start is converted to UTC when parsed.
//! One-time rules (`count == 1`) never reach the rule engine: they match on the
//! UTC calendar date of their start only.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use rrule::{RRuleSet, Tz};
use tracing::warn;

use crate::dst::{resolve_local, DstPolicy};
use crate::error::{EngineError, Result};
use crate::model::{DateWindow, Frequency, RecurrenceRule};

/// Upper bound on instances pulled from the engine for a single window.
const MAX_OCCURRENCES: u16 = 500;

/// Capability to parse and expand recurrence rules.
///
/// [`RRuleEngine`] is the default; any RFC 5545 implementation can stand in.
pub trait RecurrenceEngine {
    /// Parse `DTSTART:...` / `RRULE:...` text into a rule.
    fn parse(&self, text: &str) -> Result<RecurrenceRule>;

    /// Occurrence instants in `[start, end)`, ascending.
    fn occurrences_between(
        &self,
        rule: &RecurrenceRule,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>>;
}

/// [`RecurrenceEngine`] backed by the `rrule` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RRuleEngine;

impl RecurrenceEngine for RRuleEngine {
    fn parse(&self, text: &str) -> Result<RecurrenceRule> {
        let mut start_date = None;
        let mut rule_line = None;

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let upper = line.to_ascii_uppercase();
            if upper.starts_with("DTSTART") {
                start_date = Some(parse_dtstart(line)?);
            } else if upper.starts_with("RRULE:") {
                rule_line = Some(&line["RRULE:".len()..]);
            } else if upper.starts_with("FREQ=") {
                rule_line = Some(line);
            } else {
                return Err(EngineError::MalformedRule(format!("unexpected line: {}", line)));
            }
        }

        let start_date =
            start_date.ok_or_else(|| EngineError::MalformedRule("missing DTSTART".to_string()))?;
        let rule_line =
            rule_line.ok_or_else(|| EngineError::MalformedRule("missing RRULE".to_string()))?;
        parse_rule_line(rule_line, start_date)
    }

    fn occurrences_between(
        &self,
        rule: &RecurrenceRule,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        if rule.interval == 0 {
            return Err(EngineError::MalformedRule("interval must be positive".to_string()));
        }
        // Zero instances requested, or an empty window.
        if rule.count == Some(0) || start >= end {
            return Ok(Vec::new());
        }

        let rrule_set: RRuleSet = to_rrule_text(rule)
            .parse()
            .map_err(|e| EngineError::MalformedRule(format!("{}", e)))?;

        // When COUNT owns the RRULE, `until` is applied here instead.
        let until_cutoff = rule.until.map(|d| start_of_day(d + Duration::days(1)));

        // Widen the engine bounds by a second; exact bounds are applied below.
        let instances = rrule_set
            .after((start - Duration::seconds(1)).with_timezone(&Tz::UTC))
            .before(end.with_timezone(&Tz::UTC))
            .all(MAX_OCCURRENCES);

        Ok(instances
            .dates
            .into_iter()
            .map(|dt| dt.with_timezone(&Utc))
            .filter(|dt| *dt >= start && *dt < end)
            .filter(|dt| until_cutoff.is_none_or(|cutoff| *dt < cutoff))
            .collect())
    }
}

/// Parse the body of an `RRULE` line (`FREQ=WEEKLY;BYDAY=MO,WE;...`) anchored at
/// `start_date`.
///
/// Only the parts the scheduling model can represent are accepted; anything
/// else (`BYSETPOS`, ordinal `BYDAY`, `YEARLY`, ...) is reported as malformed.
pub fn parse_rule_line(line: &str, start_date: DateTime<Utc>) -> Result<RecurrenceRule> {
    let mut frequency = None;
    let mut interval = 1u32;
    let mut by_weekday = Vec::new();
    let mut count = None;
    let mut until = None;

    for part in line.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| EngineError::MalformedRule(format!("bad rule part: {}", part)))?;
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => {
                frequency = Some(match value.to_ascii_uppercase().as_str() {
                    "DAILY" => Frequency::Daily,
                    "WEEKLY" => Frequency::Weekly,
                    "MONTHLY" => Frequency::Monthly,
                    other => {
                        return Err(EngineError::MalformedRule(format!(
                            "unsupported FREQ: {}",
                            other
                        )))
                    }
                });
            }
            "INTERVAL" => {
                interval = value
                    .parse()
                    .map_err(|_| EngineError::MalformedRule(format!("bad INTERVAL: {}", value)))?;
            }
            "BYDAY" => {
                for code in value.split(',') {
                    let day = parse_weekday_code(code.trim()).ok_or_else(|| {
                        EngineError::MalformedRule(format!("bad BYDAY code: {}", code))
                    })?;
                    by_weekday.push(day);
                }
            }
            "COUNT" => {
                count = Some(
                    value
                        .parse()
                        .map_err(|_| EngineError::MalformedRule(format!("bad COUNT: {}", value)))?,
                );
            }
            "UNTIL" => until = Some(parse_ical_datetime(value)?.date_naive()),
            "WKST" => {}
            other => {
                return Err(EngineError::MalformedRule(format!(
                    "unsupported rule part: {}",
                    other
                )))
            }
        }
    }

    let frequency =
        frequency.ok_or_else(|| EngineError::MalformedRule("missing FREQ".to_string()))?;
    if interval == 0 {
        return Err(EngineError::MalformedRule("interval must be positive".to_string()));
    }

    Ok(RecurrenceRule {
        frequency,
        interval,
        by_weekday,
        count,
        until,
        start_date,
    })
}

/// Whether `rule` occurs on the UTC calendar day of `at`. Malformed rules never occur.
pub fn occurs_on(rule: &RecurrenceRule, at: DateTime<Utc>) -> bool {
    occurs_on_with(&RRuleEngine, rule, at)
}

/// Whether `rule` has an occurrence in `[window_start, window_end)`. Malformed
/// rules never occur.
pub fn occurs_within(
    rule: &RecurrenceRule,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> bool {
    match try_occurs_within(&RRuleEngine, rule, window_start, window_end) {
        Ok(found) => found,
        Err(e) => {
            warn!("Skipping recurrence rule starting {}: {}", rule.start_date, e);
            false
        }
    }
}

/// [`occurs_on`] with an explicit engine.
pub fn occurs_on_with<E: RecurrenceEngine + ?Sized>(
    engine: &E,
    rule: &RecurrenceRule,
    at: DateTime<Utc>,
) -> bool {
    let day = at.date_naive();
    if rule.is_one_time() {
        return rule.start_date.date_naive() == day;
    }
    let start = start_of_day(day);
    match try_occurs_within(engine, rule, start, start + Duration::days(1)) {
        Ok(found) => found,
        Err(e) => {
            warn!("Skipping recurrence rule starting {}: {}", rule.start_date, e);
            false
        }
    }
}

/// Fallible form of [`occurs_within`] for callers that want to see the error.
pub fn try_occurs_within<E: RecurrenceEngine + ?Sized>(
    engine: &E,
    rule: &RecurrenceRule,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<bool> {
    if window_start >= window_end {
        return Ok(false);
    }
    if rule.is_one_time() {
        let day = rule.start_date.date_naive();
        return Ok(window_start.date_naive() <= day && start_of_day(day) < window_end);
    }
    Ok(!engine
        .occurrences_between(rule, window_start, window_end)?
        .is_empty())
}

/// Days of `window` on which `rule` occurs, ascending.
pub fn occurrences_in(rule: &RecurrenceRule, window: DateWindow) -> Vec<NaiveDate> {
    if rule.is_one_time() {
        let day = rule.start_date.date_naive();
        return if window.contains(day) { vec![day] } else { Vec::new() };
    }

    let (start, end) = window.utc_bounds();
    match RRuleEngine.occurrences_between(rule, start, end) {
        Ok(instants) => {
            let mut days: Vec<NaiveDate> = instants.iter().map(|dt| dt.date_naive()).collect();
            days.dedup();
            days
        }
        Err(e) => {
            warn!("Skipping recurrence rule starting {}: {}", rule.start_date, e);
            Vec::new()
        }
    }
}

/// Two-letter RFC 5545 weekday code.
pub fn weekday_code(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code.to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Render the rule as iCalendar text for the `rrule` crate.
///
/// RFC 5545 forbids COUNT together with UNTIL, so UNTIL is only written when
/// there is no COUNT.
fn to_rrule_text(rule: &RecurrenceRule) -> String {
    let mut parts = vec![
        format!("FREQ={}", rule.frequency.as_rrule()),
        format!("INTERVAL={}", rule.interval),
    ];
    if !rule.by_weekday.is_empty() {
        let codes: Vec<&str> = rule.by_weekday.iter().map(|d| weekday_code(*d)).collect();
        parts.push(format!("BYDAY={}", codes.join(",")));
    }
    match (rule.count, rule.until) {
        (Some(count), _) => parts.push(format!("COUNT={}", count)),
        (None, Some(until)) => parts.push(format!("UNTIL={}T235959Z", until.format("%Y%m%d"))),
        (None, None) => {}
    }

    format!(
        "DTSTART:{}\nRRULE:{}",
        rule.start_date.format("%Y%m%dT%H%M%SZ"),
        parts.join(";")
    )
}

/// Parse a `DTSTART[;TZID=zone|;VALUE=DATE]:value` line to a UTC instant.
///
/// A `TZID` value is local time in that zone and is converted to UTC; any other
/// parameter is rejected.
fn parse_dtstart(line: &str) -> Result<DateTime<Utc>> {
    let (head, value) = line
        .split_once(':')
        .ok_or_else(|| EngineError::MalformedRule(format!("bad DTSTART line: {}", line)))?;

    let mut zone = None;
    for param in head.split(';').skip(1) {
        let (key, param_value) = param
            .split_once('=')
            .ok_or_else(|| EngineError::MalformedRule(format!("bad DTSTART parameter: {}", param)))?;
        match key.trim().to_ascii_uppercase().as_str() {
            "TZID" => zone = Some(param_value.trim()),
            "VALUE" if param_value.trim().eq_ignore_ascii_case("DATE") => {}
            _ => {
                return Err(EngineError::MalformedRule(format!(
                    "unsupported DTSTART parameter: {}",
                    param
                )))
            }
        }
    }

    let Some(zone) = zone else {
        return parse_ical_datetime(value);
    };
    if value.trim().ends_with('Z') {
        return Err(EngineError::MalformedRule(format!(
            "DTSTART with TZID must be local time: {}",
            value
        )));
    }
    let tz: chrono_tz::Tz = zone
        .parse()
        .map_err(|_| EngineError::MalformedRule(format!("unknown TZID: {}", zone)))?;
    let local = parse_ical_datetime(value)?.naive_utc();
    resolve_local(tz, local, DstPolicy::default())
        .ok_or_else(|| EngineError::MalformedRule(format!("DTSTART {} does not exist in {}", value, zone)))
}

/// Accepts `20260302T090000Z`, `20260302T090000` (read as UTC) and `20260302`.
fn parse_ical_datetime(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim().trim_end_matches('Z');
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        return Ok(ndt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .map(start_of_day)
        .map_err(|_| EngineError::MalformedRule(format!("bad date-time: {}", value)))
}

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}
