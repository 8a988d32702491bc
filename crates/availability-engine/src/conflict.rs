//! Detect bookable slots that collide with existing appointments.
//!
//! Adjacent intervals (one ends exactly when the other starts) are NOT conflicts.
//! Cancelled appointments and appointments of other consultants never conflict.

use crate::model::Appointment;
use crate::slots::BookableSlot;

/// A slot that overlaps a booking of the same consultant.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingConflict {
    pub slot: BookableSlot,
    pub appointment: Appointment,
    pub overlap_minutes: i64,
}

/// Find every (slot, appointment) pair that overlaps.
///
/// Two intervals overlap when `a.start < b.end && b.start < a.end`.
pub fn find_booking_conflicts(
    slots: &[BookableSlot],
    appointments: &[Appointment],
) -> Vec<BookingConflict> {
    let mut conflicts = Vec::new();

    for slot in slots {
        for appt in appointments.iter().filter(|a| a.blocks_time()) {
            if appt.consultant_id != slot.consultant_id {
                continue;
            }
            if slot.start < appt.end && appt.start < slot.end {
                let overlap_start = slot.start.max(appt.start);
                let overlap_end = slot.end.min(appt.end);
                conflicts.push(BookingConflict {
                    slot: slot.clone(),
                    appointment: appt.clone(),
                    overlap_minutes: (overlap_end - overlap_start).num_minutes(),
                });
            }
        }
    }

    conflicts
}

/// Whether `slot` is free of every blocking appointment of its consultant.
pub fn is_unbooked(slot: &BookableSlot, appointments: &[Appointment]) -> bool {
    !appointments.iter().any(|appt| {
        appt.blocks_time()
            && appt.consultant_id == slot.consultant_id
            && slot.start < appt.end
            && appt.start < slot.end
    })
}
