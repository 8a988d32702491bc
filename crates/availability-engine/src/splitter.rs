//! Split a day's declarations into typed, sorted time ranges.
//!
//! Unavailable declarations are emitted whole. Each available declaration is
//! carved around the unavailable declarations that *start* inside it, walking a
//! cursor from its start to its end. Available declarations are processed
//! independently and never merged with one another.
//!
//! An unavailable declaration that begins before an available one is not
//! clipped from it, even if it ends inside it: only the start time decides
//! whether the two interact.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::model::{AvailabilityDeclaration, ClockTime, HostKey, TimeRange};

/// Split declarations already known to occur on the same day.
///
/// The result is sorted by `start_time`. Ties put unavailable ranges first, then
/// order by end time and declaration id so that the output does not depend on
/// input order.
pub fn split_day(declarations: &[AvailabilityDeclaration]) -> Vec<TimeRange> {
    let (available, unavailable): (Vec<&AvailabilityDeclaration>, Vec<&AvailabilityDeclaration>) =
        declarations.iter().partition(|d| d.is_available);

    let mut ranges: Vec<TimeRange> = unavailable
        .iter()
        .map(|u| range(u.start_time, u.end_time, false, u))
        .collect();

    for avail in &available {
        let mut blocking: Vec<&AvailabilityDeclaration> = unavailable
            .iter()
            .copied()
            .filter(|u| u.start_time >= avail.start_time && u.start_time < avail.end_time)
            .collect();

        if blocking.is_empty() {
            ranges.push(range(avail.start_time, avail.end_time, true, avail));
            continue;
        }

        blocking.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then(a.end_time.cmp(&b.end_time))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut cursor = avail.start_time;
        for block in blocking {
            if cursor < block.start_time {
                ranges.push(range(cursor, block.start_time, true, avail));
            }
            // A block nested inside an earlier one must not pull the cursor back.
            cursor = cursor.max(block.end_time);
        }
        if cursor < avail.end_time {
            ranges.push(range(cursor, avail.end_time, true, avail));
        }
    }

    ranges.sort_by(compare_ranges);
    ranges
}

/// [`split_day`] applied to each host's declarations separately, keyed by host.
pub fn split_day_by_host(
    declarations: &[AvailabilityDeclaration],
) -> BTreeMap<HostKey, Vec<TimeRange>> {
    let mut by_host: BTreeMap<HostKey, Vec<AvailabilityDeclaration>> = BTreeMap::new();
    for decl in declarations {
        by_host.entry(decl.host_key()).or_default().push(decl.clone());
    }

    by_host
        .into_iter()
        .map(|(host, decls)| (host, split_day(&decls)))
        .collect()
}

fn range(
    start_time: ClockTime,
    end_time: ClockTime,
    is_available: bool,
    source: &AvailabilityDeclaration,
) -> TimeRange {
    TimeRange {
        start_time,
        end_time,
        is_available,
        title: source.title.clone(),
        source: source.clone(),
    }
}

fn compare_ranges(a: &TimeRange, b: &TimeRange) -> Ordering {
    a.start_time
        .cmp(&b.start_time)
        .then(a.is_available.cmp(&b.is_available))
        .then(a.end_time.cmp(&b.end_time))
        .then_with(|| a.source.id.cmp(&b.source.id))
}
