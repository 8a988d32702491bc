//! Integration tests for the `slots` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to run the day, week, occurs,
//! slots, staff, centers and fetch subcommands through the actual binary,
//! including stdin piping, file I/O and error reporting.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: path to the declarations fixture.
fn declarations_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/declarations.json")
}

/// Helper: path to the appointments fixture.
fn appointments_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/appointments.json")
}

/// Helper: run the binary with `args` and parse stdout as JSON.
fn run_json(args: &[&str]) -> serde_json::Value {
    let output = Command::cargo_bin("slots")
        .unwrap()
        .args(args)
        .output()
        .expect("binary must run");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// day / week
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn day_splits_consultant_row_around_blackout() {
    let day = run_json(&[
        "day",
        "-i",
        declarations_path(),
        "--date",
        "2026-03-16",
        "--centers",
        "C1",
    ]);

    let rows = day["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2, "center row and u1; admin and C2 consultant excluded");
    assert_eq!(rows[0]["hostType"], "CENTER");
    assert_eq!(rows[0]["ranges"][0]["start"], "08:00");

    let u1 = &rows[1];
    assert_eq!(u1["hostId"], "u1");
    let spans: Vec<(String, String, bool)> = u1["ranges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["start"].as_str().unwrap().to_string(),
                r["end"].as_str().unwrap().to_string(),
                r["available"].as_bool().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        spans,
        vec![
            ("09:00".to_string(), "12:00".to_string(), true),
            ("12:00".to_string(), "13:00".to_string(), false),
            ("13:00".to_string(), "17:00".to_string(), true),
        ]
    );
}

#[test]
fn day_without_centers_is_empty() {
    let day = run_json(&["day", "-i", declarations_path(), "--date", "2026-03-16"]);
    assert_eq!(day["rows"], serde_json::json!([]));
}

#[test]
fn day_reads_declarations_from_stdin() {
    let input = std::fs::read_to_string(declarations_path()).unwrap();

    Command::cargo_bin("slots")
        .unwrap()
        .args(["day", "--date", "2026-03-17", "--centers", "C2"])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"u2\""))
        .stdout(predicate::str::contains("Walk-ins"));
}

#[test]
fn week_lists_seven_days_from_monday() {
    let week = run_json(&[
        "week",
        "-i",
        declarations_path(),
        "--date",
        "2026-03-18",
        "--centers",
        "C1",
    ]);

    let days = week.as_array().unwrap();
    assert_eq!(days.len(), 7);
    assert_eq!(days[0]["date"], "2026-03-16");
    assert_eq!(days[6]["date"], "2026-03-22");
    assert_eq!(days[6]["rows"], serde_json::json!([]), "no weekend hours");
}

#[test]
fn day_writes_output_file() {
    let output_path = std::env::temp_dir().join("slots-test-day-output.json");
    let _ = std::fs::remove_file(&output_path);

    Command::cargo_bin("slots")
        .unwrap()
        .args(["day", "-i", declarations_path(), "--date", "2026-03-16", "--centers", "C1"])
        .arg("-o")
        .arg(&output_path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let content = std::fs::read_to_string(&output_path).expect("output file must exist");
    let value: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(value["date"], "2026-03-16");

    let _ = std::fs::remove_file(&output_path);
}

// ─────────────────────────────────────────────────────────────────────────────
// occurs
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn occurs_lists_declarations_on_tuesday() {
    let result = run_json(&["occurs", "-i", declarations_path(), "--date", "2026-03-17"]);

    assert_eq!(
        result["declarations"],
        serde_json::json!(["c1-hours", "u2-legacy", "admin-desk"])
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// slots
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn slots_skip_booked_time_but_not_cancelled() {
    let result = run_json(&[
        "slots",
        "-i",
        declarations_path(),
        "--date",
        "2026-03-16",
        "--centers",
        "C1",
        "--duration",
        "60",
        "--appointments",
        appointments_path(),
    ]);

    let consultants = result.as_array().unwrap();
    assert_eq!(consultants.len(), 1);
    assert_eq!(consultants[0]["consultant_name"], "Ada Okafor");

    let starts: Vec<&str> = consultants[0]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["start"].as_str().unwrap())
        .collect();
    assert_eq!(
        starts,
        vec![
            "2026-03-16T09:00:00Z",
            "2026-03-16T11:00:00Z",
            "2026-03-16T13:00:00Z",
            "2026-03-16T14:00:00Z",
            "2026-03-16T15:00:00Z",
            "2026-03-16T16:00:00Z",
        ]
    );
}

#[test]
fn slots_resolve_wall_clock_in_timezone() {
    Command::cargo_bin("slots")
        .unwrap()
        .args([
            "slots",
            "-i",
            declarations_path(),
            "--date",
            "2026-03-16",
            "--centers",
            "C1",
            "--duration",
            "30",
            "--tz",
            "America/New_York",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2026-03-16T13:00:00Z"));
}

#[test]
fn slots_reject_unknown_timezone() {
    Command::cargo_bin("slots")
        .unwrap()
        .args([
            "slots",
            "-i",
            declarations_path(),
            "--date",
            "2026-03-16",
            "--centers",
            "C1",
            "--duration",
            "30",
            "--tz",
            "Mars/Olympus_Mons",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown timezone"));
}

#[test]
fn slots_reject_zero_duration() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["slots", "-i", declarations_path(), "--date", "2026-03-16", "--duration", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--duration"));
}

// ─────────────────────────────────────────────────────────────────────────────
// staff / centers
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn staff_roster_for_selected_centers() {
    let staff = run_json(&[
        "staff",
        "-i",
        declarations_path(),
        "--centers",
        "C1,C2",
        "--date",
        "2026-03-16",
    ]);

    let names: Vec<&str> = staff
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Ada Okafor", "sam.reyes@example.com"]);
    assert_eq!(staff[0]["specialty"], "Physiotherapy");
    assert_eq!(staff[0]["status"], "Available");
}

#[test]
fn centers_are_counted_in_first_seen_order() {
    let centers = run_json(&["centers", "-i", declarations_path()]);

    assert_eq!(centers[0]["center_id"], "C1");
    assert_eq!(centers[0]["name"], "Riverside Clinic");
    assert_eq!(centers[0]["declaration_count"], 3);
    assert_eq!(centers[1]["center_id"], "C2");
    assert_eq!(centers[1]["declaration_count"], 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn invalid_json_reports_context() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["day", "--date", "2026-03-16", "--centers", "C1"])
        .write_stdin("not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse declarations JSON"));
}

#[test]
fn missing_file_reports_path() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["occurs", "-i", "/nonexistent/declarations.json", "--date", "2026-03-16"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read file"));
}

#[test]
fn invalid_date_is_rejected_by_parser() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["occurs", "-i", declarations_path(), "--date", "2026-13-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--date"));
}

#[test]
fn fetch_requires_configuration() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["fetch", "--center", "C1", "--date", "2026-03-16", "--duration", "30"])
        .env_remove("AVAILABILITY_API_URL")
        .env_remove("SCHEDULE_API_URL")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not configured"));
}

#[test]
fn no_subcommand_shows_usage() {
    Command::cargo_bin("slots")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
