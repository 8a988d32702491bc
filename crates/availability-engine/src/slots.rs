//! Bookable slot generation from split time ranges.
//!
//! Each available range is cut into back-to-back windows of exactly the service
//! duration, anchored at the range start. Windows that would run past the range
//! end are dropped, as are windows overlapping a non-cancelled appointment of
//! the same consultant.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::conflict::is_unbooked;
use crate::dst::{resolve_local, DstPolicy};
use crate::model::{Appointment, TimeRange};
use crate::staff::display_name;

/// Longest slot, in minutes, still treated as an online session.
pub const ONLINE_MAX_MINUTES: i64 = 30;

/// How a session is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeliveryMode {
    Online,
    InPerson,
}

impl DeliveryMode {
    /// Heuristic: slots of 30 minutes or less are online, longer ones in person.
    ///
    /// Nothing stores the delivery mode of a slot; it is inferred from the raw
    /// duration only.
    pub fn from_duration(minutes: i64) -> Self {
        if minutes <= ONLINE_MAX_MINUTES {
            DeliveryMode::Online
        } else {
            DeliveryMode::InPerson
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryMode::Online => "online",
            DeliveryMode::InPerson => "in-person",
        }
    }
}

/// A concrete bookable window of exactly the requested service duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookableSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub consultant_id: String,
    pub center_id: String,
    pub center_name: String,
}

impl BookableSlot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        DeliveryMode::from_duration(self.duration_minutes())
    }
}

/// One consultant's slots for the requested window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultantAvailability {
    pub consultant_id: String,
    pub consultant_name: String,
    pub slots: Vec<BookableSlot>,
}

/// Cut the available consultant ranges of `date` into bookable slots.
///
/// Range times are wall-clock times in `tz`. Center-hosted and unavailable
/// ranges produce nothing. Overlapping available ranges of one consultant
/// yield each distinct slot once.
pub fn generate_slots(
    ranges: &[TimeRange],
    date: NaiveDate,
    tz: Tz,
    duration_minutes: u32,
    appointments: &[Appointment],
    policy: DstPolicy,
) -> Vec<BookableSlot> {
    if duration_minutes == 0 {
        return Vec::new();
    }
    let step = Duration::minutes(i64::from(duration_minutes));

    let mut slots: Vec<BookableSlot> = Vec::new();
    for range in ranges
        .iter()
        .filter(|r| r.is_available && r.source.is_consultant_hosted())
    {
        let decl = &range.source;
        let center_id = decl
            .center_id
            .clone()
            .or_else(|| decl.host_center_ids.first().cloned())
            .unwrap_or_default();
        let center_name = decl.center_name.clone().unwrap_or_default();

        let range_end = date.and_time(range.end_time.to_naive_time());
        let mut cursor = date.and_time(range.start_time.to_naive_time());

        while cursor + step <= range_end {
            let start = resolve_local(tz, cursor, policy);
            let end = resolve_local(tz, cursor + step, policy);
            if let (Some(start), Some(end)) = (start, end) {
                if start < end {
                    slots.push(BookableSlot {
                        start,
                        end,
                        consultant_id: decl.host_id.clone(),
                        center_id: center_id.clone(),
                        center_name: center_name.clone(),
                    });
                }
            }
            cursor += step;
        }
    }

    slots.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then_with(|| a.consultant_id.cmp(&b.consultant_id))
            .then(a.end.cmp(&b.end))
    });
    slots.dedup_by(|a, b| {
        a.start == b.start && a.end == b.end && a.consultant_id == b.consultant_id
    });
    slots.retain(|slot| is_unbooked(slot, appointments));
    slots
}

/// [`generate_slots`] grouped per consultant, in consultant id order.
pub fn consultant_availability(
    ranges: &[TimeRange],
    date: NaiveDate,
    tz: Tz,
    duration_minutes: u32,
    appointments: &[Appointment],
    policy: DstPolicy,
) -> Vec<ConsultantAvailability> {
    let mut names: BTreeMap<&str, String> = BTreeMap::new();
    for range in ranges {
        let decl = &range.source;
        names
            .entry(decl.host_id.as_str())
            .or_insert_with(|| display_name(decl.host_profile.as_ref(), &decl.host_id));
    }

    let mut grouped: BTreeMap<String, Vec<BookableSlot>> = BTreeMap::new();
    for slot in generate_slots(ranges, date, tz, duration_minutes, appointments, policy) {
        grouped.entry(slot.consultant_id.clone()).or_default().push(slot);
    }

    grouped
        .into_iter()
        .map(|(consultant_id, slots)| ConsultantAvailability {
            consultant_name: names
                .get(consultant_id.as_str())
                .cloned()
                .unwrap_or_else(|| consultant_id.clone()),
            consultant_id,
            slots,
        })
        .collect()
}

/// Drop slots that collide with a blocking appointment.
///
/// Server-provided slots are already filtered; this keeps any client-side
/// re-derivation from offering a conflicting slot again.
pub fn exclude_booked(
    consultants: Vec<ConsultantAvailability>,
    appointments: &[Appointment],
) -> Vec<ConsultantAvailability> {
    consultants
        .into_iter()
        .map(|mut c| {
            c.slots.retain(|slot| is_unbooked(slot, appointments));
            c
        })
        .collect()
}

/// Keep only slots of `mode`; consultants left without slots are dropped.
pub fn filter_by_delivery_mode(
    consultants: &[ConsultantAvailability],
    mode: DeliveryMode,
) -> Vec<ConsultantAvailability> {
    consultants
        .iter()
        .filter_map(|c| {
            let slots: Vec<BookableSlot> = c
                .slots
                .iter()
                .filter(|s| s.delivery_mode() == mode)
                .cloned()
                .collect();
            (!slots.is_empty()).then(|| ConsultantAvailability {
                consultant_id: c.consultant_id.clone(),
                consultant_name: c.consultant_name.clone(),
                slots,
            })
        })
        .collect()
}
