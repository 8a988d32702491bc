//! Slot generator: cached, cancellable loading of bookable slots.
//!
//! A [`SlotGenerator`] owns at most one in-flight request. Starting a new fetch
//! aborts the previous task, which drops its transport future, and bumps a
//! generation counter. A response is applied only if its generation is still
//! current, so a late answer to a superseded request can never overwrite newer
//! state. Errors land in [`SlotState::error`]; nothing is retried automatically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error};

use crate::cache::{AvailabilityCache, CacheKey};
use crate::client::AvailabilityService;
use crate::dto::{normalize_consultants, AvailabilityRequest};
use crate::error::Result;
use crate::model::{Appointment, DateWindow};
use crate::slots::{exclude_booked, filter_by_delivery_mode, ConsultantAvailability, DeliveryMode};
use crate::tracking::{NoopTracker, TrackEvent, Tracker};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SlotScope {
    Center(String),
    Organization(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotQuery {
    pub scope: SlotScope,
    pub window: DateWindow,
    pub service_duration_minutes: u32,
    pub consultant_id: Option<String>,
    pub designation: Option<String>,
    /// Applied client-side through [`DeliveryMode::from_duration`].
    pub delivery_mode: Option<DeliveryMode>,
}

impl SlotQuery {
    pub fn for_center(center_id: impl Into<String>, window: DateWindow, duration: u32) -> Self {
        Self {
            scope: SlotScope::Center(center_id.into()),
            window,
            service_duration_minutes: duration,
            consultant_id: None,
            designation: None,
            delivery_mode: None,
        }
    }

    pub fn with_consultant(mut self, consultant_id: impl Into<String>) -> Self {
        self.consultant_id = Some(consultant_id.into());
        self
    }

    pub fn with_designation(mut self, designation: impl Into<String>) -> Self {
        self.designation = Some(designation.into());
        self
    }

    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = Some(mode);
        self
    }
}

/// What the booking UI renders: data, a loading flag, or an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotState {
    pub consultants: Vec<ConsultantAvailability>,
    pub loading: bool,
    pub error: Option<String>,
}

impl SlotState {
    /// Loaded successfully but nothing is bookable.
    pub fn is_empty(&self) -> bool {
        !self.loading && self.error.is_none() && self.consultants.iter().all(|c| c.slots.is_empty())
    }
}

/// Completion handle for one fetch.
pub struct FetchHandle {
    task: Option<JoinHandle<()>>,
}

impl FetchHandle {
    /// Wait for the fetch to settle. A fetch aborted by a newer one settles
    /// silently.
    pub async fn wait(self) {
        let Some(task) = self.task else { return };
        if let Err(e) = task.await {
            if e.is_panic() {
                error!("Slot fetch task panicked: {}", e);
            }
        }
    }
}

/// State shared with spawned fetch tasks.
struct Shared {
    service: Arc<dyn AvailabilityService>,
    tracker: Arc<dyn Tracker>,
    cache: AvailabilityCache,
    state: watch::Sender<SlotState>,
    generation: AtomicU64,
    booked: Mutex<Vec<Appointment>>,
    timezone: Tz,
}

pub struct SlotGenerator {
    shared: Arc<Shared>,
    in_flight: Mutex<Option<AbortHandle>>,
    last_query: Mutex<Option<SlotQuery>>,
}

impl SlotGenerator {
    pub fn new(service: Arc<dyn AvailabilityService>, timezone: Tz) -> Self {
        Self::with_tracker(service, timezone, Arc::new(NoopTracker))
    }

    pub fn with_tracker(
        service: Arc<dyn AvailabilityService>,
        timezone: Tz,
        tracker: Arc<dyn Tracker>,
    ) -> Self {
        let (state, _) = watch::channel(SlotState::default());
        Self {
            shared: Arc::new(Shared {
                service,
                tracker,
                cache: AvailabilityCache::new(),
                state,
                generation: AtomicU64::new(0),
                booked: Mutex::new(Vec::new()),
                timezone,
            }),
            in_flight: Mutex::new(None),
            last_query: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SlotState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SlotState> {
        self.shared.state.subscribe()
    }

    pub fn cache(&self) -> &AvailabilityCache {
        &self.shared.cache
    }

    /// Appointments known to the client. Slots overlapping them are withheld
    /// from every state applied after this call.
    pub fn set_appointments(&self, appointments: Vec<Appointment>) {
        *lock(&self.shared.booked) = appointments
            .into_iter()
            .filter(Appointment::blocks_time)
            .collect();
    }

    /// Start loading slots for `query`, superseding any fetch in flight.
    ///
    /// Must be called from within a tokio runtime.
    pub fn fetch(&self, query: SlotQuery) -> FetchHandle {
        let shared = &self.shared;
        let key = CacheKey::for_query(&query);

        // Held until the new task's abort handle is stored.
        let mut in_flight = lock(&self.in_flight);
        let generation = shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.last_query) = Some(query.clone());

        if let Some(previous) = in_flight.take() {
            if !previous.is_finished() {
                previous.abort();
                debug!("Aborted slot fetch superseded by generation {}", generation);
                shared.tracker.track(TrackEvent::RequestSuperseded {
                    generation: generation - 1,
                });
            }
        }

        if let Some(cached) = shared.cache.get(&key) {
            debug!("Slot cache hit for {:?}", key);
            shared.tracker.track(TrackEvent::CacheHit { key });
            let consultants = shared.present(cached, query.delivery_mode);
            shared.state.send_modify(|state| {
                state.consultants = consultants;
                state.loading = false;
                state.error = None;
            });
            return FetchHandle { task: None };
        }

        shared.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
        });
        shared.tracker.track(TrackEvent::RequestStarted {
            key: key.clone(),
            generation,
        });

        let task_shared = Arc::clone(shared);
        let task = tokio::spawn(async move {
            let result = task_shared.load(&query).await;
            task_shared.apply(generation, key, query.delivery_mode, result);
        });
        *in_flight = Some(task.abort_handle());

        FetchHandle { task: Some(task) }
    }

    /// Fetch and wait for the result.
    pub async fn fetch_and_wait(&self, query: SlotQuery) -> SlotState {
        self.fetch(query).wait().await;
        self.state()
    }

    /// Re-issue the most recent query, if any. Failed queries are never cached,
    /// so this goes back to the service after an error.
    pub fn retry(&self) -> Option<FetchHandle> {
        let query = lock(&self.last_query).clone()?;
        Some(self.fetch(query))
    }
}

impl Shared {
    async fn load(&self, query: &SlotQuery) -> Result<Vec<ConsultantAvailability>> {
        let mut request = AvailabilityRequest::from_query(query, self.timezone)?;
        // Cache entries must not depend on the delivery mode.
        request.delivery_mode = None;
        let dtos = self.service.query_availability(&request).await?;
        normalize_consultants(dtos)
    }

    fn apply(
        &self,
        generation: u64,
        key: CacheKey,
        mode: Option<DeliveryMode>,
        result: Result<Vec<ConsultantAvailability>>,
    ) {
        let is_current = || self.generation.load(Ordering::SeqCst) == generation;

        match result {
            Ok(consultants) => {
                let presented = self.present(consultants.clone(), mode);
                let applied = self.state.send_if_modified(|state| {
                    if !is_current() {
                        return false;
                    }
                    state.consultants = presented;
                    state.loading = false;
                    state.error = None;
                    true
                });
                if applied {
                    self.tracker.track(TrackEvent::SlotsLoaded {
                        key: key.clone(),
                        consultants: consultants.len(),
                    });
                    self.cache.insert(key, consultants);
                } else {
                    debug!("Discarding slots from superseded generation {}", generation);
                }
            }
            Err(e) => {
                let message = e.to_string();
                let applied = self.state.send_if_modified(|state| {
                    if !is_current() {
                        return false;
                    }
                    state.loading = false;
                    state.error = Some(message.clone());
                    true
                });
                if applied {
                    error!("Failed to load slots for {:?}: {}", key, message);
                    self.tracker.track(TrackEvent::SlotsFailed { key, message });
                }
            }
        }
    }

    fn present(
        &self,
        consultants: Vec<ConsultantAvailability>,
        mode: Option<DeliveryMode>,
    ) -> Vec<ConsultantAvailability> {
        let consultants = exclude_booked(consultants, &lock(&self.booked));
        match mode {
            Some(mode) => filter_by_delivery_mode(&consultants, mode),
            None => consultants,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
