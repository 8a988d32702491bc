//! Wire-format DTOs and their normalization into the core model.
//!
//! Payloads from the scheduling and availability services are loosely shaped.
//! Everything is validated here, at the boundary; the rest of the crate only
//! sees [`crate::model`] types. Invalid declarations are logged and dropped one
//! at a time so a single bad record cannot empty the schedule.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dst::{resolve_local, DstPolicy};
use crate::error::{EngineError, Result};
use crate::generator::{SlotQuery, SlotScope};
use crate::model::{
    Appointment, AppointmentStatus, AvailabilityDeclaration, ClockTime, Frequency, HostProfile,
    HostType, RecurrenceRule, UserType,
};
use crate::recurrence::{parse_weekday_code, RRuleEngine, RecurrenceEngine};
use crate::slots::{BookableSlot, ConsultantAvailability, DeliveryMode};

/// Anything at or above this is taken to be milliseconds (it is year 5138 in
/// seconds).
const MAX_EPOCH_SECONDS: i64 = 100_000_000_000;

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDto {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub specialty: Option<String>,
    pub avatar_url: Option<String>,
}

/// Recurrence as sent by the scheduling service: either RFC 5545 text or a
/// structured object.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecurrenceDto {
    Text(String),
    Structured(StructuredRuleDto),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredRuleDto {
    pub frequency: String,
    pub interval: Option<u32>,
    #[serde(default)]
    pub by_weekday: Vec<String>,
    pub count: Option<u32>,
    pub until: Option<NaiveDate>,
    pub start_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationDto {
    pub id: String,
    pub host_type: HostType,
    pub user_type: Option<UserType>,
    pub host_id: String,
    pub center_id: Option<String>,
    #[serde(default)]
    pub host_center_ids: Vec<String>,
    pub center_name: Option<String>,
    pub host: Option<HostDto>,
    pub is_available: bool,
    pub start_time: i64,
    pub end_time: i64,
    pub recurrence_rule: RecurrenceDto,
    #[serde(default)]
    pub title: String,
}

impl From<HostDto> for HostProfile {
    fn from(dto: HostDto) -> Self {
        Self {
            first_name: dto.first_name,
            last_name: dto.last_name,
            email: dto.email,
            specialty: dto.specialty,
            avatar_url: dto.avatar_url,
        }
    }
}

impl TryFrom<StructuredRuleDto> for RecurrenceRule {
    type Error = EngineError;

    fn try_from(dto: StructuredRuleDto) -> Result<Self> {
        let frequency = match dto.frequency.to_ascii_uppercase().as_str() {
            "DAILY" => Frequency::Daily,
            "WEEKLY" => Frequency::Weekly,
            "MONTHLY" => Frequency::Monthly,
            other => {
                return Err(EngineError::MalformedRule(format!(
                    "unsupported frequency: {}",
                    other
                )))
            }
        };
        let interval = dto.interval.unwrap_or(1);
        if interval == 0 {
            return Err(EngineError::MalformedRule("interval must be positive".to_string()));
        }
        let by_weekday = dto
            .by_weekday
            .iter()
            .map(|code| {
                parse_weekday_code(code)
                    .ok_or_else(|| EngineError::MalformedRule(format!("bad weekday: {}", code)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RecurrenceRule {
            frequency,
            interval,
            by_weekday,
            count: dto.count,
            until: dto.until,
            start_date: dto.start_date,
        })
    }
}

impl TryFrom<DeclarationDto> for AvailabilityDeclaration {
    type Error = EngineError;

    fn try_from(dto: DeclarationDto) -> Result<Self> {
        let invalid = |reason: String| EngineError::InvalidDeclaration {
            id: dto.id.clone(),
            reason,
        };

        let start_time = clock_time(dto.start_time).map_err(|e| invalid(e.to_string()))?;
        let end_time = clock_time(dto.end_time).map_err(|e| invalid(e.to_string()))?;
        if start_time >= end_time {
            return Err(invalid(format!(
                "start {} is not before end {}",
                start_time, end_time
            )));
        }

        let rule = match dto.recurrence_rule.clone() {
            RecurrenceDto::Text(text) => RRuleEngine.parse(&text),
            RecurrenceDto::Structured(structured) => RecurrenceRule::try_from(structured),
        }
        .map_err(|e| invalid(e.to_string()))?;

        Ok(AvailabilityDeclaration {
            id: dto.id,
            host_type: dto.host_type,
            user_type: dto.user_type,
            host_id: dto.host_id,
            center_id: dto.center_id,
            host_center_ids: dto.host_center_ids,
            center_name: dto.center_name,
            host_profile: dto.host.map(HostProfile::from),
            is_available: dto.is_available,
            start_time,
            end_time,
            rule,
            title: dto.title,
        })
    }
}

/// Normalize a batch, dropping (and logging) the records that fail validation.
pub fn normalize_declarations(dtos: Vec<DeclarationDto>) -> Vec<AvailabilityDeclaration> {
    dtos.into_iter()
        .filter_map(|dto| match AvailabilityDeclaration::try_from(dto) {
            Ok(decl) => Some(decl),
            Err(e) => {
                warn!("Dropping availability declaration: {}", e);
                None
            }
        })
        .collect()
}

fn clock_time(raw: i64) -> Result<ClockTime> {
    let hhmm = u16::try_from(raw).map_err(|_| EngineError::InvalidClockTime(raw))?;
    ClockTime::from_hhmm(hhmm)
}

// ---------------------------------------------------------------------------
// Appointments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDto {
    pub id: String,
    pub consultant_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
}

fn parse_status(raw: &str) -> AppointmentStatus {
    match raw.to_ascii_uppercase().as_str() {
        "CANCELLED" | "CANCELED" => AppointmentStatus::Cancelled,
        "CONFIRMED" => AppointmentStatus::Confirmed,
        "COMPLETED" => AppointmentStatus::Completed,
        "SCHEDULED" => AppointmentStatus::Scheduled,
        other => {
            // Unknown statuses keep blocking their time.
            warn!("Unknown appointment status '{}', treating as scheduled", other);
            AppointmentStatus::Scheduled
        }
    }
}

/// Normalize appointments and drop the cancelled ones.
pub fn normalize_appointments(dtos: Vec<AppointmentDto>) -> Vec<Appointment> {
    dtos.into_iter()
        .map(|dto| Appointment {
            status: parse_status(&dto.status),
            id: dto.id,
            consultant_id: dto.consultant_id,
            start: dto.start_time,
            end: dto.end_time,
        })
        .filter(Appointment::blocks_time)
        .collect()
}

// ---------------------------------------------------------------------------
// Slot availability
// ---------------------------------------------------------------------------

/// Body of an availability query. Dates are epoch **seconds**.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    pub start_date: i64,
    pub end_date: i64,
    pub service_duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consultant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub designation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_mode: Option<DeliveryMode>,
}

impl AvailabilityRequest {
    /// Build the request for `query`, taking the window's days as local days in `tz`.
    pub fn from_query(query: &SlotQuery, tz: Tz) -> Result<Self> {
        let (center_id, organization_id) = match &query.scope {
            SlotScope::Center(id) => (Some(id.clone()), None),
            SlotScope::Organization(id) => (None, Some(id.clone())),
        };

        let day_bound = |date: NaiveDate| {
            resolve_local(tz, date.and_time(NaiveTime::MIN), DstPolicy::ShiftForward)
                .map(|dt| dt.timestamp())
                .ok_or_else(|| EngineError::InvalidTimezone(format!("no local midnight on {}", date)))
        };

        Ok(Self {
            center_id,
            organization_id,
            start_date: day_bound(query.window.start())?,
            end_date: day_bound(query.window.end() + chrono::Duration::days(1))?,
            service_duration_minutes: query.service_duration_minutes,
            consultant_id: query.consultant_id.clone(),
            designation: query.designation.clone(),
            delivery_mode: query.delivery_mode,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDto {
    pub start_time: i64,
    pub end_time: i64,
    pub center_id: String,
    #[serde(default)]
    pub center_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantSlotsDto {
    pub consultant_id: String,
    #[serde(default)]
    pub consultant_name: String,
    #[serde(default)]
    pub available_slots: Vec<SlotDto>,
}

/// Interpret `raw` as epoch seconds, rejecting values that can only be
/// milliseconds.
pub fn epoch_seconds(raw: i64) -> Result<DateTime<Utc>> {
    if raw.abs() >= MAX_EPOCH_SECONDS {
        return Err(EngineError::InvalidTimestamp(raw));
    }
    DateTime::from_timestamp(raw, 0).ok_or(EngineError::InvalidTimestamp(raw))
}

/// Normalize an availability response. A timestamp in the wrong unit fails the
/// whole response: it means every slot in it is wrong.
pub fn normalize_consultants(dtos: Vec<ConsultantSlotsDto>) -> Result<Vec<ConsultantAvailability>> {
    dtos.into_iter()
        .map(|dto| {
            let slots = dto
                .available_slots
                .into_iter()
                .map(|slot| {
                    let start = epoch_seconds(slot.start_time)?;
                    let end = epoch_seconds(slot.end_time)?;
                    if end <= start {
                        return Err(EngineError::InvalidTimestamp(slot.end_time));
                    }
                    Ok(BookableSlot {
                        start,
                        end,
                        consultant_id: dto.consultant_id.clone(),
                        center_id: slot.center_id,
                        center_name: slot.center_name,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let consultant_name = if dto.consultant_name.trim().is_empty() {
                dto.consultant_id.clone()
            } else {
                dto.consultant_name.trim().to_string()
            };

            Ok(ConsultantAvailability {
                consultant_id: dto.consultant_id,
                consultant_name,
                slots,
            })
        })
        .collect()
}
