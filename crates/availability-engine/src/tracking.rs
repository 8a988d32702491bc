//! Tracking seam for slot-loading events.
//!
//! The engine reports what happened through an injected [`Tracker`]; it never
//! reaches for a global. [`NoopTracker`] is the default.

use crate::cache::CacheKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEvent {
    /// Served from the cache, no request issued.
    CacheHit { key: CacheKey },
    /// A request was sent for `key`.
    RequestStarted { key: CacheKey, generation: u64 },
    /// A response was applied to state.
    SlotsLoaded { key: CacheKey, consultants: usize },
    /// A request failed and its error was applied to state.
    SlotsFailed { key: CacheKey, message: String },
    /// A superseded request was aborted.
    RequestSuperseded { generation: u64 },
}

pub trait Tracker: Send + Sync {
    fn track(&self, event: TrackEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracker;

impl Tracker for NoopTracker {
    fn track(&self, _event: TrackEvent) {}
}
