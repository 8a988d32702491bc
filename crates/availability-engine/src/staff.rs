//! Staff and center rosters for the schedule grid, derived from filtered events.
//!
//! Nothing here is stored; rosters are recomputed whenever the inputs change.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{AvailabilityDeclaration, HostProfile, HostType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaffStatus {
    Available,
    Unavailable,
}

/// A consultant known to the clinic, whether or not they have declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consultant {
    pub id: String,
    #[serde(flatten)]
    pub profile: HostProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
    pub avatar_url: Option<String>,
    pub status: StaffStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CenterAvailability {
    pub center_id: String,
    pub name: String,
    pub has_availability: bool,
    pub declaration_count: usize,
}

/// `first last` trimmed, else the email, else `fallback_id`.
pub fn display_name(profile: Option<&HostProfile>, fallback_id: &str) -> String {
    let Some(profile) = profile else {
        return fallback_id.to_string();
    };

    let full = format!(
        "{} {}",
        profile.first_name.as_deref().unwrap_or(""),
        profile.last_name.as_deref().unwrap_or("")
    );
    let full = full.trim();
    if !full.is_empty() {
        return full.to_string();
    }

    match profile.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => email.to_string(),
        _ => fallback_id.to_string(),
    }
}

/// Merge the full consultant list with the consultants seen in `events`.
///
/// Deduplicated by id; the first occurrence supplies name, specialty and
/// avatar. Status comes from the consultant's events when there are any
/// (available if any of them is), and is `Available` otherwise.
pub fn project_staff(
    all_consultants: &[Consultant],
    events: &[AvailabilityDeclaration],
) -> Vec<StaffMember> {
    let mut event_status: HashMap<&str, StaffStatus> = HashMap::new();
    for event in events.iter().filter(|e| e.is_consultant_hosted()) {
        let status = event_status
            .entry(event.host_id.as_str())
            .or_insert(StaffStatus::Unavailable);
        if event.is_available {
            *status = StaffStatus::Available;
        }
    }

    let candidates = all_consultants
        .iter()
        .map(|c| (c.id.as_str(), Some(&c.profile)))
        .chain(
            events
                .iter()
                .filter(|e| e.is_consultant_hosted())
                .map(|e| (e.host_id.as_str(), e.host_profile.as_ref())),
        );

    let mut staff: Vec<StaffMember> = Vec::new();
    for (id, profile) in candidates {
        if staff.iter().any(|s| s.id == id) {
            continue;
        }
        staff.push(StaffMember {
            id: id.to_string(),
            name: display_name(profile, id),
            specialty: profile.and_then(|p| p.specialty.clone()),
            avatar_url: profile.and_then(|p| p.avatar_url.clone()),
            status: event_status
                .get(id)
                .copied()
                .unwrap_or(StaffStatus::Available),
        });
    }

    staff
}

/// Distinct centers referenced by `events`, in first-seen order.
///
/// Center-hosted events name their host; consultant events name their
/// `center_id`, or every assigned center when that is missing.
pub fn project_centers(events: &[AvailabilityDeclaration]) -> Vec<CenterAvailability> {
    let mut centers: Vec<CenterAvailability> = Vec::new();

    for event in events {
        let ids: Vec<&str> = match event.host_type {
            HostType::Center => vec![event.host_id.as_str()],
            HostType::User if event.is_consultant_hosted() => match &event.center_id {
                Some(id) => vec![id.as_str()],
                None => event.host_center_ids.iter().map(String::as_str).collect(),
            },
            HostType::User => Vec::new(),
        };

        for id in ids {
            match centers.iter_mut().find(|c| c.center_id == id) {
                Some(center) => {
                    center.declaration_count += 1;
                    center.has_availability |= event.is_available;
                    if center.name == center.center_id {
                        if let Some(name) = &event.center_name {
                            center.name = name.clone();
                        }
                    }
                }
                None => centers.push(CenterAvailability {
                    center_id: id.to_string(),
                    name: event.center_name.clone().unwrap_or_else(|| id.to_string()),
                    has_availability: event.is_available,
                    declaration_count: 1,
                }),
            }
        }
    }

    centers
}
