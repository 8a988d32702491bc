//! Tests for splitting a day's declarations into typed time ranges.

use availability_engine::model::{
    AvailabilityDeclaration, ClockTime, HostType, RecurrenceRule, TimeRange, UserType,
};
use availability_engine::splitter::{split_day, split_day_by_host};
use chrono::{TimeZone, Utc};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn decl(id: &str, host: &str, start: u16, end: u16, available: bool) -> AvailabilityDeclaration {
    AvailabilityDeclaration {
        id: id.to_string(),
        host_type: HostType::User,
        user_type: Some(UserType::Consultant),
        host_id: host.to_string(),
        center_id: Some("C1".to_string()),
        host_center_ids: vec![],
        center_name: Some("Main clinic".to_string()),
        host_profile: None,
        is_available: available,
        start_time: ClockTime::from_hhmm(start).unwrap(),
        end_time: ClockTime::from_hhmm(end).unwrap(),
        rule: RecurrenceRule::once(Utc.with_ymd_and_hms(2026, 3, 16, 0, 0, 0).unwrap()),
        title: if available { "Open".to_string() } else { "Blocked".to_string() },
    }
}

fn avail(id: &str, start: u16, end: u16) -> AvailabilityDeclaration {
    decl(id, "u1", start, end, true)
}

fn unavail(id: &str, start: u16, end: u16) -> AvailabilityDeclaration {
    decl(id, "u1", start, end, false)
}

/// `(start, end, is_available)` triples for compact assertions.
fn spans(ranges: &[TimeRange]) -> Vec<(u16, u16, bool)> {
    ranges
        .iter()
        .map(|r| (r.start_time.hhmm(), r.end_time.hhmm(), r.is_available))
        .collect()
}

// ── Test 1: Worked example ──────────────────────────────────────────────────

#[test]
fn carves_two_blackouts_out_of_working_day() {
    let input = vec![
        avail("a", 900, 1700),
        unavail("lunch", 1200, 1300),
        unavail("meeting", 1500, 1530),
    ];

    let result = split_day(&input);

    assert_eq!(
        spans(&result),
        vec![
            (900, 1200, true),
            (1200, 1300, false),
            (1300, 1500, true),
            (1500, 1530, false),
            (1530, 1700, true),
        ]
    );
    // Carved pieces keep the available declaration as their source.
    assert_eq!(result[0].source.id, "a");
    assert_eq!(result[2].title, "Open");
    assert_eq!(result[1].source.id, "lunch");
}

// ── Test 2: No blackouts ────────────────────────────────────────────────────

#[test]
fn available_without_blackouts_is_emitted_whole() {
    let result = split_day(&[avail("a", 800, 1200)]);
    assert_eq!(spans(&result), vec![(800, 1200, true)]);
}

// ── Test 3: Blackout at the very start / end ────────────────────────────────

#[test]
fn blackout_at_range_start_leaves_no_empty_piece() {
    let result = split_day(&[avail("a", 900, 1200), unavail("u", 900, 1000)]);
    assert_eq!(spans(&result), vec![(900, 1000, false), (1000, 1200, true)]);
}

#[test]
fn blackout_running_past_range_end_consumes_the_tail() {
    let result = split_day(&[avail("a", 900, 1200), unavail("u", 1100, 1400)]);
    assert_eq!(spans(&result), vec![(900, 1100, true), (1100, 1400, false)]);
}

// ── Test 4: Blackout starting before the range is not clipped ───────────────

#[test]
fn blackout_starting_earlier_is_not_carved() {
    // Only the start time decides; this one starts before 09:00.
    let result = split_day(&[avail("a", 900, 1200), unavail("u", 800, 1000)]);
    assert_eq!(spans(&result), vec![(800, 1000, false), (900, 1200, true)]);
}

// ── Test 5: Unavailable-only and unrelated blackouts ────────────────────────

#[test]
fn unavailable_declarations_are_emitted_as_is() {
    let result = split_day(&[unavail("u2", 1400, 1500), unavail("u1", 1000, 1100)]);
    assert_eq!(spans(&result), vec![(1000, 1100, false), (1400, 1500, false)]);
}

#[test]
fn empty_input_gives_empty_output() {
    assert!(split_day(&[]).is_empty());
}

// ── Test 6: Independent available declarations ──────────────────────────────

#[test]
fn overlapping_available_declarations_are_not_merged() {
    let result = split_day(&[avail("a", 900, 1200), avail("b", 1100, 1300)]);
    assert_eq!(spans(&result), vec![(900, 1200, true), (1100, 1300, true)]);
}

// ── Test 7: Nested blackouts ────────────────────────────────────────────────

#[test]
fn nested_blackout_does_not_rewind_cursor() {
    let result = split_day(&[
        avail("a", 900, 1700),
        unavail("outer", 1000, 1400),
        unavail("inner", 1100, 1200),
    ]);

    assert_eq!(
        spans(&result),
        vec![
            (900, 1000, true),
            (1000, 1400, false),
            (1100, 1200, false),
            (1400, 1700, true),
        ]
    );
}

// ── Test 8: Input order does not matter ─────────────────────────────────────

#[test]
fn output_is_independent_of_input_order() {
    let forward = vec![
        avail("a", 900, 1700),
        unavail("x", 1200, 1300),
        unavail("y", 1500, 1530),
    ];
    let mut reversed = forward.clone();
    reversed.reverse();

    assert_eq!(split_day(&forward), split_day(&reversed));
}

// ── Test 9: Per-host rows ───────────────────────────────────────────────────

#[test]
fn split_by_host_keeps_hosts_apart() {
    let input = vec![
        decl("a1", "u1", 900, 1200, true),
        decl("b1", "u2", 900, 1200, true),
        decl("b-block", "u2", 1000, 1100, false),
    ];

    let rows = split_day_by_host(&input);
    assert_eq!(rows.len(), 2);

    let u1 = rows.iter().find(|(k, _)| k.host_id == "u1").unwrap().1;
    let u2 = rows.iter().find(|(k, _)| k.host_id == "u2").unwrap().1;
    // u2's blackout does not touch u1.
    assert_eq!(spans(u1), vec![(900, 1200, true)]);
    assert_eq!(
        spans(u2),
        vec![(900, 1000, true), (1000, 1100, false), (1100, 1200, true)]
    );
}
