//! Tests for the slot generator: caching, supersession, error state and retry.
//!
//! A fake [`AvailabilityService`] stands in for the network; it counts calls,
//! can fail on demand, and stalls on one chosen day so that a newer fetch can
//! overtake it.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use availability_engine::cache::CacheKey;
use availability_engine::client::AvailabilityService;
use availability_engine::dto::{AvailabilityRequest, ConsultantSlotsDto, SlotDto};
use availability_engine::error::Result;
use availability_engine::generator::{SlotGenerator, SlotQuery};
use availability_engine::model::{Appointment, AppointmentStatus, DateWindow};
use availability_engine::slots::DeliveryMode;
use availability_engine::tracking::{TrackEvent, Tracker};
use availability_engine::EngineError;
use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

// ── Helpers ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeService {
    calls: AtomicUsize,
    fail: AtomicBool,
    /// Requests starting at this epoch second hang until aborted.
    stall_on: Option<i64>,
    /// Stalled requests that have not been dropped yet.
    stalled: AtomicUsize,
}

/// Decrements the live-stall count when the request future is dropped.
struct StallGuard<'a>(&'a AtomicUsize);

impl Drop for StallGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeService {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AvailabilityService for FakeService {
    async fn query_availability(
        &self,
        request: &AvailabilityRequest,
    ) -> Result<Vec<ConsultantSlotsDto>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_on == Some(request.start_date) {
            self.stalled.fetch_add(1, Ordering::SeqCst);
            let _guard = StallGuard(&self.stalled);
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(EngineError::Network("connection reset".to_string()));
        }

        // One 30-minute slot at 09:00 on the requested day.
        let nine = request.start_date + 9 * 3600;
        Ok(vec![ConsultantSlotsDto {
            consultant_id: "u1".to_string(),
            consultant_name: format!("day-{}", request.start_date),
            available_slots: vec![SlotDto {
                start_time: nine,
                end_time: nine + 1800,
                center_id: "C1".to_string(),
                center_name: "Main clinic".to_string(),
            }],
        }])
    }
}

#[derive(Default)]
struct RecordingTracker {
    events: Mutex<Vec<TrackEvent>>,
}

impl RecordingTracker {
    fn events(&self) -> Vec<TrackEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Tracker for RecordingTracker {
    fn track(&self, event: TrackEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

fn midnight(d: u32) -> i64 {
    Utc.with_ymd_and_hms(2026, 3, d, 0, 0, 0).unwrap().timestamp()
}

fn query(d: u32) -> SlotQuery {
    SlotQuery::for_center("C1", DateWindow::day(date(d)), 30)
}

fn generator(service: &Arc<FakeService>) -> (SlotGenerator, Arc<RecordingTracker>) {
    let tracker = Arc::new(RecordingTracker::default());
    let generator = SlotGenerator::with_tracker(service.clone(), Tz::UTC, tracker.clone());
    (generator, tracker)
}

// ── Caching ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn repeated_query_is_served_from_cache() {
    let service = Arc::new(FakeService::default());
    let (generator, tracker) = generator(&service);

    let first = generator.fetch_and_wait(query(16)).await;
    let second = generator.fetch_and_wait(query(16)).await;

    assert_eq!(service.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first.consultants[0].slots.len(), 1);
    assert!(tracker
        .events()
        .iter()
        .any(|e| matches!(e, TrackEvent::CacheHit { .. })));
}

#[tokio::test]
async fn designation_and_consultant_split_the_cache() {
    let service = Arc::new(FakeService::default());
    let (generator, _) = generator(&service);

    generator.fetch_and_wait(query(16)).await;
    generator.fetch_and_wait(query(16).with_designation("physio")).await;
    generator.fetch_and_wait(query(16).with_consultant("u1")).await;
    generator.fetch_and_wait(query(17)).await;

    assert_eq!(service.calls(), 4);
    assert_eq!(generator.cache().len(), 4);
}

#[tokio::test]
async fn delivery_mode_filters_cached_data_without_refetch() {
    let service = Arc::new(FakeService::default());
    let (generator, _) = generator(&service);

    let in_person = generator
        .fetch_and_wait(query(16).with_delivery_mode(DeliveryMode::InPerson))
        .await;
    assert!(in_person.consultants.is_empty());
    assert!(in_person.is_empty());

    let online = generator
        .fetch_and_wait(query(16).with_delivery_mode(DeliveryMode::Online))
        .await;
    assert_eq!(online.consultants.len(), 1);
    assert_eq!(service.calls(), 1);
}

// ── Supersession ────────────────────────────────────────────────────────────

#[tokio::test]
async fn superseded_fetch_never_reaches_state() {
    let service = Arc::new(FakeService {
        stall_on: Some(midnight(16)),
        ..FakeService::default()
    });
    let (generator, tracker) = generator(&service);

    let stale = generator.fetch(query(16));
    let fresh = generator.fetch(query(17));
    fresh.wait().await;
    stale.wait().await;

    let state = generator.state();
    assert!(!state.loading);
    assert_eq!(
        state.consultants[0].consultant_name,
        format!("day-{}", midnight(17))
    );

    let stale_key = CacheKey::for_query(&query(16));
    assert!(generator.cache().get(&stale_key).is_none());

    let events = tracker.events();
    assert!(events.contains(&TrackEvent::RequestSuperseded { generation: 1 }));
    assert!(!events
        .iter()
        .any(|e| matches!(e, TrackEvent::SlotsLoaded { key, .. } if *key == stale_key)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fetches_leave_no_stalled_request_running() {
    let service = Arc::new(FakeService {
        stall_on: Some(midnight(16)),
        ..FakeService::default()
    });
    let (generator, _) = generator(&service);
    let generator = Arc::new(generator);

    let racers: Vec<_> = (0..16)
        .map(|_| {
            let generator = Arc::clone(&generator);
            tokio::spawn(async move {
                drop(generator.fetch(query(16)));
            })
        })
        .collect();
    for racer in racers {
        racer.await.unwrap();
    }

    generator.fetch(query(17)).wait().await;
    // Aborted tasks are dropped on their next scheduling.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(service.stalled.load(Ordering::SeqCst), 0);
    assert_eq!(
        generator.state().consultants[0].consultant_name,
        format!("day-{}", midnight(17))
    );
}

#[tokio::test]
async fn loading_flag_tracks_in_flight_request() {
    let service = Arc::new(FakeService::default());
    let (generator, _) = generator(&service);

    let handle = generator.fetch(query(16));
    assert!(generator.state().loading);
    handle.wait().await;
    assert!(!generator.state().loading);
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn failure_sets_error_and_retry_recovers() {
    let service = Arc::new(FakeService::default());
    service.fail.store(true, Ordering::SeqCst);
    let (generator, tracker) = generator(&service);

    let failed = generator.fetch_and_wait(query(16)).await;
    assert!(!failed.loading);
    assert!(failed.error.as_deref().unwrap_or("").contains("connection reset"));
    assert!(generator.cache().is_empty(), "failures are not cached");
    assert!(tracker
        .events()
        .iter()
        .any(|e| matches!(e, TrackEvent::SlotsFailed { .. })));

    service.fail.store(false, Ordering::SeqCst);
    generator.retry().unwrap().wait().await;

    let recovered = generator.state();
    assert!(recovered.error.is_none());
    assert_eq!(recovered.consultants.len(), 1);
    assert_eq!(service.calls(), 2);
}

#[tokio::test]
async fn retry_without_prior_query_does_nothing() {
    let service = Arc::new(FakeService::default());
    let (generator, _) = generator(&service);

    assert!(generator.retry().is_none());
    assert_eq!(service.calls(), 0);
}

// ── Bookings and observers ──────────────────────────────────────────────────

#[tokio::test]
async fn known_appointments_hide_booked_slots() {
    let service = Arc::new(FakeService::default());
    let (generator, _) = generator(&service);
    generator.set_appointments(vec![Appointment {
        id: "a1".to_string(),
        consultant_id: "u1".to_string(),
        start: Utc.with_ymd_and_hms(2026, 3, 16, 9, 0, 0).unwrap(),
        end: Utc.with_ymd_and_hms(2026, 3, 16, 9, 30, 0).unwrap(),
        status: AppointmentStatus::Scheduled,
    }]);

    let state = generator.fetch_and_wait(query(16)).await;
    assert!(state.consultants[0].slots.is_empty());
    assert!(state.is_empty());
}

#[tokio::test]
async fn subscribers_see_published_state() {
    let service = Arc::new(FakeService::default());
    let (generator, _) = generator(&service);
    let mut rx = generator.subscribe();

    generator.fetch_and_wait(query(16)).await;

    assert!(rx.has_changed().unwrap());
    let seen = rx.borrow_and_update().clone();
    assert_eq!(seen, generator.state());
}
