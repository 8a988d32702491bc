//! # availability-engine
//!
//! Availability computation for clinic booking: recurring schedule expansion,
//! center/consultant filtering, slot splitting around blackout overrides, and
//! bookable slot generation with a cancellable, cached loader.
//!
//! Data flows leaf-first: declarations are filtered by center, expanded per
//! date, split into typed ranges per host, then cut into bookable slots.
//!
//! ## Modules
//!
//! - [`model`] — Declarations, recurrence rules, HHMM times, date windows, appointments
//! - [`recurrence`] — Does a rule occur on a date / within a window (wraps `rrule`)
//! - [`filter`] — Center and consultant filters
//! - [`splitter`] — Carve unavailable ranges out of available ones
//! - [`schedule`] — Day and week grid views
//! - [`slots`] — Fixed-duration bookable slots and delivery mode inference
//! - [`conflict`] — Slot/appointment overlap detection
//! - [`staff`] — Staff and center rosters for the grid
//! - [`dst`] — Local wall-clock to UTC resolution across DST transitions
//! - [`dto`] — Wire formats and boundary validation
//! - [`client`] — Availability and schedule service collaborators (HTTP)
//! - [`cache`] — Per-date slot response cache
//! - [`generator`] — Cancellable, cached slot loading with observable state
//! - [`tracking`] — Injected event tracking seam
//! - [`config`] — Environment configuration
//! - [`error`] — Error types

pub mod cache;
pub mod client;
pub mod config;
pub mod conflict;
pub mod dst;
pub mod dto;
pub mod error;
pub mod filter;
pub mod generator;
pub mod model;
pub mod recurrence;
pub mod schedule;
pub mod slots;
pub mod splitter;
pub mod staff;
pub mod tracking;

pub use cache::{AvailabilityCache, CacheKey};
pub use client::{AvailabilityService, HttpScheduleClient, ScheduleQuery, ScheduleSource};
pub use config::EngineConfig;
pub use conflict::find_booking_conflicts;
pub use error::EngineError;
pub use filter::{filter_by_centers, filter_by_consultants};
pub use generator::{SlotGenerator, SlotQuery, SlotScope, SlotState};
pub use model::{
    Appointment, AvailabilityDeclaration, ClockTime, DateWindow, HostType, RecurrenceRule,
    TimeRange,
};
pub use recurrence::{occurs_on, occurs_within};
pub use schedule::{day_schedule, week_schedule, DaySchedule};
pub use slots::{generate_slots, BookableSlot, ConsultantAvailability, DeliveryMode};
pub use splitter::{split_day, split_day_by_host};
pub use staff::{project_centers, project_staff, StaffMember};
pub use tracking::{NoopTracker, Tracker};
