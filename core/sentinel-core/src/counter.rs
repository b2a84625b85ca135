//! Update counter kept by the monitored app's heartbeat responder.
//!
//! The runtime calls back into the app after every applied patch; the app
//! bumps this counter and serves it on `/heartbeat`. It is an owned object
//! rather than process-wide static state, so tests create and reset their
//! own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::heartbeat::HeartbeatPayload;

#[derive(Debug, Default)]
pub struct UpdateCounter {
    count: AtomicU64,
    last_update: Mutex<Option<DateTime<Utc>>>,
}

impl UpdateCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one applied update and returns the new count.
    pub fn increment(&self) -> u64 {
        let count = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut last) = self.last_update.lock() {
            *last = Some(Utc::now());
        }
        count
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update.lock().ok().and_then(|last| *last)
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
        if let Ok(mut last) = self.last_update.lock() {
            *last = None;
        }
    }

    pub fn payload(&self, pid: u32) -> HeartbeatPayload {
        HeartbeatPayload {
            pid: Some(pid),
            update_count: Some(self.count()),
            last_update_timestamp_utc: self
                .last_update()
                .map(|ts| ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn increments_are_atomic_across_threads() {
        let counter = Arc::new(UpdateCounter::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..100 {
                        counter.increment();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counter.count(), 400);
        assert!(counter.last_update().is_some());
    }

    #[test]
    fn reset_clears_count_and_timestamp() {
        let counter = UpdateCounter::new();
        counter.increment();
        counter.reset();

        assert_eq!(counter.count(), 0);
        assert_eq!(counter.last_update(), None);
    }

    #[test]
    fn payload_matches_heartbeat_contract() {
        let counter = UpdateCounter::new();
        assert_eq!(counter.payload(9).last_update_timestamp_utc, None);

        counter.increment();
        let json = serde_json::to_value(counter.payload(9)).unwrap();

        assert_eq!(json["pid"], 9);
        assert_eq!(json["updateCount"], 1);
        assert!(json["lastUpdateTimestampUtc"].as_str().unwrap().ends_with('Z'));
    }
}
