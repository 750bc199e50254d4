//! Per-page-load session state: current location and the navigation cache.
//!
//! One `Session` is created per page load and handed to the detector,
//! resolver and injector. It is the only writer of CurrentLocation and of the
//! Location -> ResourceRef cache; all updates happen inside a single lock
//! section, never across an await.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::location::Location;
use crate::navigation::Navigation;

/// Address of a discovered downloadable media resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRef(String);

impl ResourceRef {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceRef {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// What [`NavigationCache::record`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Inserted,
    /// Same value already recorded.
    Unchanged,
    Overwritten { previous: ResourceRef },
}

/// Location -> ResourceRef for the lifetime of the page load. No eviction.
#[derive(Debug, Default, Clone)]
pub struct NavigationCache {
    entries: HashMap<Location, ResourceRef>,
}

impl NavigationCache {
    pub fn lookup(&self, location: &Location) -> Option<&ResourceRef> {
        self.entries.get(location)
    }

    pub fn record(&mut self, location: Location, resource: ResourceRef) -> RecordOutcome {
        match self.entries.insert(location, resource.clone()) {
            None => RecordOutcome::Inserted,
            Some(previous) if previous == resource => RecordOutcome::Unchanged,
            Some(previous) => RecordOutcome::Overwritten { previous },
        }
    }

    /// True iff `candidate` is what was recorded for `previous`, i.e. the
    /// element still shows the resource of the page we navigated away from.
    pub fn is_stale_candidate(
        &self,
        candidate: &ResourceRef,
        _location: &Location,
        previous: Option<&Location>,
    ) -> bool {
        previous
            .and_then(|p| self.entries.get(p))
            .is_some_and(|r| r == candidate)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    current: Option<Location>,
    cache: NavigationCache,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last location seen by the navigation detector (`None` before the first batch).
    pub fn current_location(&self) -> Option<Location> {
        self.lock().current.clone()
    }

    /// Compare, update and report in one step. Returns the transition if
    /// `observed` differs from the stored location.
    pub fn observe_location(&self, observed: &Location) -> Option<Navigation> {
        let mut state = self.lock();
        if state.current.as_ref() == Some(observed) {
            return None;
        }
        let old = state.current.replace(observed.clone());
        Some(Navigation {
            new: observed.clone(),
            old,
        })
    }

    pub fn lookup(&self, location: &Location) -> Option<ResourceRef> {
        self.lock().cache.lookup(location).cloned()
    }

    pub fn record(&self, location: &Location, resource: &ResourceRef) -> RecordOutcome {
        let outcome = self.lock().cache.record(location.clone(), resource.clone());
        log_record(location, resource, &outcome);
        outcome
    }

    /// Record only while `location` is still the current location. Returns
    /// `None`, leaving the cache untouched, once a newer navigation has been
    /// observed.
    pub fn record_if_current(&self, location: &Location, resource: &ResourceRef) -> Option<RecordOutcome> {
        let outcome = {
            let mut state = self.lock();
            if state.current.as_ref() != Some(location) {
                return None;
            }
            state.cache.record(location.clone(), resource.clone())
        };
        log_record(location, resource, &outcome);
        Some(outcome)
    }

    pub fn is_stale_candidate(
        &self,
        candidate: &ResourceRef,
        location: &Location,
        previous: Option<&Location>,
    ) -> bool {
        self.lock()
            .cache
            .is_stale_candidate(candidate, location, previous)
    }

    /// Sorted copy of the cache, for reporting.
    pub fn cache_snapshot(&self) -> BTreeMap<Location, ResourceRef> {
        self.lock()
            .cache
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn log_record(location: &Location, resource: &ResourceRef, outcome: &RecordOutcome) {
    match outcome {
        RecordOutcome::Inserted => {
            tracing::debug!(%location, %resource, "cached clip resource");
        }
        RecordOutcome::Unchanged => {}
        RecordOutcome::Overwritten { previous } => {
            tracing::warn!(
                %location,
                %previous,
                %resource,
                "overwriting cached clip resource for location"
            );
        }
    }
}
