//! Per-date response cache for slot availability.
//!
//! Keys are `(date of window start, designation, consultant)`. The map sits
//! behind a `std::sync::Mutex`; it is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::generator::SlotQuery;
use crate::slots::ConsultantAvailability;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub date_key: NaiveDate,
    pub designation: Option<String>,
    pub consultant_id: Option<String>,
}

impl CacheKey {
    pub fn for_query(query: &SlotQuery) -> Self {
        Self {
            date_key: query.window.start(),
            designation: query.designation.clone(),
            consultant_id: query.consultant_id.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AvailabilityCache {
    entries: Mutex<HashMap<CacheKey, Vec<ConsultantAvailability>>>,
}

impl AvailabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Vec<ConsultantAvailability>> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, consultants: Vec<ConsultantAvailability>) {
        self.lock().insert(key, consultants);
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Vec<ConsultantAvailability>>> {
        // A poisoned map still holds valid entries.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
