//! Observability sink for policy transitions (rate warnings, grants, sessions).

use std::sync::Mutex;

/// Receives human-readable policy events.
pub trait ObservabilitySink: Send + Sync {
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
}

/// Default sink: forwards to `tracing` under the `chat_gate::policy` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "chat_gate::policy", "{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!(target: "chat_gate::policy", "{}", message);
    }
}

/// Level of a captured event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Warn,
    Info,
}

/// Sink that keeps every event in memory. Used by tests and the CLI harness.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<(EventLevel, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured events, oldest first.
    pub fn events(&self) -> Vec<(EventLevel, String)> {
        self.events
            .lock()
            .map(|e| e.to_vec())
            .unwrap_or_default()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|(level, _)| *level == EventLevel::Warn)
            .map(|(_, msg)| msg)
            .collect()
    }

    fn push(&self, level: EventLevel, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push((level, message.to_string()));
        }
    }
}

impl ObservabilitySink for MemorySink {
    fn warn(&self, message: &str) {
        self.push(EventLevel::Warn, message);
    }

    fn info(&self, message: &str) {
        self.push(EventLevel::Info, message);
    }
}
