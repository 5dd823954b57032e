//! Request-id replay cache.
//!
//! A client that retries a request with the same id gets the recorded
//! outcome back instead of applying the action twice.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Completed results keyed by request id, each valid for `ttl` after insertion.
#[derive(Debug)]
pub struct RequestCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, T)>>,
}

impl<T: Clone> RequestCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, (Instant, T)>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached result for `request_id` if it has not expired.
    pub fn get(&self, request_id: &str) -> Option<T> {
        self.get_at(request_id, Instant::now())
    }

    fn get_at(&self, request_id: &str, now: Instant) -> Option<T> {
        let mut entries = self.guard();
        match entries.get(request_id) {
            Some((at, value)) if now.duration_since(*at) < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(request_id);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, request_id: impl Into<String>, value: T) {
        self.insert_at(request_id.into(), value, Instant::now());
    }

    fn insert_at(&self, request_id: String, value: T, now: Instant) {
        let mut entries = self.guard();
        let ttl = self.ttl;
        entries.retain(|_, (at, _)| now.duration_since(*at) < ttl);
        entries.insert(request_id, (now, value));
    }

    /// Drops expired entries and returns how many remain.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.guard();
        let ttl = self.ttl;
        entries.retain(|_, (at, _)| now.duration_since(*at) < ttl);
        entries.len()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
