//! Center and consultant filtering of availability declarations.
//!
//! These are the real-time filters behind the schedule grid: they only narrow
//! the input, never reorder it, and an empty center selection is a valid query
//! whose answer is "nothing".

use chrono::NaiveDate;
use tracing::debug;

use crate::model::{AvailabilityDeclaration, HostType};
use crate::recurrence;

/// Keep the declarations relevant to `selected_center_ids`.
///
/// - Center-hosted: kept when the hosting center is selected.
/// - Consultant-hosted: kept when `center_id` is selected. Declarations without
///   a `center_id` fall back to the consultant's assigned centers.
/// - Any other host/user combination is dropped.
pub fn filter_by_centers(
    declarations: &[AvailabilityDeclaration],
    selected_center_ids: &[String],
) -> Vec<AvailabilityDeclaration> {
    if selected_center_ids.is_empty() {
        return Vec::new();
    }

    let selected = |id: &str| selected_center_ids.iter().any(|c| c == id);

    declarations
        .iter()
        .filter(|decl| match decl.host_type {
            HostType::Center => selected(&decl.host_id),
            HostType::User if decl.is_consultant_hosted() => match &decl.center_id {
                Some(center_id) => selected(center_id),
                None => decl.host_center_ids.iter().any(|c| selected(c)),
            },
            HostType::User => {
                if decl.user_type.is_none() {
                    debug!(
                        "Dropping declaration {}: user host {} has no user type",
                        decl.id, decl.host_id
                    );
                }
                false
            }
        })
        .cloned()
        .collect()
}

/// Narrow to the listed consultants. Center-hosted declarations always pass;
/// an empty list applies no narrowing.
pub fn filter_by_consultants(
    declarations: &[AvailabilityDeclaration],
    consultant_ids: &[String],
) -> Vec<AvailabilityDeclaration> {
    if consultant_ids.is_empty() {
        return declarations.to_vec();
    }

    declarations
        .iter()
        .filter(|decl| {
            decl.host_type == HostType::Center
                || consultant_ids.iter().any(|id| *id == decl.host_id)
        })
        .cloned()
        .collect()
}

/// Declarations whose recurrence rule occurs on `date`.
pub fn occurring_on(
    declarations: &[AvailabilityDeclaration],
    date: NaiveDate,
) -> Vec<AvailabilityDeclaration> {
    let at = date.and_time(chrono::NaiveTime::MIN).and_utc();
    declarations
        .iter()
        .filter(|decl| recurrence::occurs_on(&decl.rule, at))
        .cloned()
        .collect()
}
