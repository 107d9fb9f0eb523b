//! Assisted-conversation sessions.
//!
//! A session record existing is the only signal that assisted chat is on for
//! a correspondent. Sessions do not time out; they end on an explicit stop or
//! when the process exits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::clock::Clock;
use crate::error::StoreError;
use crate::observability::ObservabilitySink;

/// One active assisted-conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub started_at: DateTime<Utc>,
    /// Best-effort label captured at start.
    pub display_name: String,
}

impl Session {
    pub fn duration(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.started_at
    }
}

pub struct SessionTracker {
    sessions: Mutex<HashMap<String, Session>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ObservabilitySink>,
}

impl SessionTracker {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn ObservabilitySink>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            sink,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, StoreError> {
        self.sessions
            .lock()
            .map_err(|_| StoreError::Poisoned { store: "sessions" })
    }

    /// Start (or restart) a session with a fresh start time.
    pub fn start(&self, key: &str, display_name: &str) -> Result<Session, StoreError> {
        let session = Session {
            started_at: self.clock.now(),
            display_name: display_name.to_string(),
        };
        self.lock()?.insert(key.to_string(), session.clone());
        self.sink.info(&format!("Started assisted chat for {key}"));
        Ok(session)
    }

    /// End the session if any. Returns the ended session.
    pub fn stop(&self, key: &str) -> Result<Option<Session>, StoreError> {
        let ended = self.lock()?.remove(key);
        if let Some(ref session) = ended {
            let minutes = session.duration(self.clock.now()).num_minutes();
            self.sink
                .info(&format!("Stopped assisted chat for {key} after {minutes} min"));
        }
        Ok(ended)
    }

    pub fn is_active(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.contains_key(key))
    }

    pub fn info(&self, key: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }

    #[cfg(test)]
    pub(crate) fn poison_for_test(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.sessions.lock();
            panic!("poison session store");
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::observability::MemorySink;

    fn tracker() -> (SessionTracker, Arc<ManualClock>, Arc<MemorySink>) {
        let clock = Arc::new(ManualClock::starting_now());
        let sink = Arc::new(MemorySink::new());
        (SessionTracker::new(clock.clone(), sink.clone()), clock, sink)
    }

    #[test]
    fn start_and_stop() {
        let (tracker, _, _) = tracker();
        assert!(!tracker.is_active("u1").unwrap());

        tracker.start("u1", "Alice").unwrap();
        assert!(tracker.is_active("u1").unwrap());
        assert_eq!(tracker.info("u1").unwrap().unwrap().display_name, "Alice");

        let ended = tracker.stop("u1").unwrap();
        assert!(ended.is_some());
        assert!(!tracker.is_active("u1").unwrap());
        assert!(tracker.info("u1").unwrap().is_none());
    }

    #[test]
    fn restart_refreshes_start_time() {
        let (tracker, clock, _) = tracker();
        let first = tracker.start("u1", "Alice").unwrap();
        clock.advance_secs(600);
        let second = tracker.start("u1", "Alice B.").unwrap();

        assert_eq!(second.started_at - first.started_at, TimeDelta::seconds(600));
        assert_eq!(tracker.len().unwrap(), 1);
        assert_eq!(tracker.info("u1").unwrap().unwrap(), second);
    }

    #[test]
    fn stop_on_absent_session_is_noop() {
        let (tracker, _, sink) = tracker();
        assert!(tracker.stop("nobody").unwrap().is_none());
        assert!(tracker.is_empty().unwrap());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn sessions_do_not_expire() {
        let (tracker, clock, _) = tracker();
        tracker.start("u1", "Alice").unwrap();
        clock.advance_secs(365 * 86_400);
        assert!(tracker.is_active("u1").unwrap());
        let session = tracker.info("u1").unwrap().unwrap();
        assert_eq!(session.duration(clock.now()), TimeDelta::days(365));
    }
}
