//! Sliding-window rate limiter with a short cooldown.
//!
//! Each correspondent keeps an ascending list of recorded event instants
//! covering the trailing 24 hours. Admission checks the cooldown first, then
//! the minute, hour, and day windows in that order. Entries older than a day
//! are pruned lazily on access; the sweeper only bounds memory for silent
//! correspondents.
//!
//! Admission fails open: if the limiter's own state is unusable the message
//! is admitted.

mod config;

pub use config::{GracePolicy, RateLimitConfig};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::clock::Clock;
use crate::error::StoreError;
use crate::observability::ObservabilitySink;

const MINUTE_SECS: i64 = 60;
const HOUR_SECS: i64 = 3_600;
const DAY_SECS: i64 = 86_400;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Cooldown { remaining: TimeDelta },
    MinuteCap { count: usize },
    HourCap { count: usize },
    DayCap { count: usize },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Aggregate counters across all tracked correspondents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub total_tracked: usize,
    pub active_last_hour: usize,
    pub events_last_hour: usize,
    pub events_last_day: usize,
}

#[derive(Debug)]
struct WindowState {
    timestamps: VecDeque<DateTime<Utc>>,
    last_event_at: DateTime<Utc>,
    warning_issued: bool,
}

impl WindowState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            timestamps: VecDeque::new(),
            last_event_at: now,
            warning_issued: false,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while self
            .timestamps
            .front()
            .is_some_and(|t| now - *t > TimeDelta::seconds(DAY_SECS))
        {
            self.timestamps.pop_front();
        }
    }

    /// Events within `window` of `now`, boundary inclusive.
    fn count_within(&self, now: DateTime<Utc>, window: TimeDelta) -> usize {
        self.timestamps
            .iter()
            .rev()
            .take_while(|t| now - **t <= window)
            .count()
    }
}

/// Per-correspondent sliding-window limiter.
pub struct RateLimiter {
    histories: Mutex<HashMap<String, WindowState>>,
    config: RwLock<RateLimitConfig>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ObservabilitySink>,
}

impl RateLimiter {
    pub fn new(
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self {
            histories: Mutex::new(HashMap::new()),
            config: RwLock::new(config),
            clock,
            sink,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, WindowState>>, StoreError> {
        self.histories
            .lock()
            .map_err(|_| StoreError::Poisoned {
                store: "rate limiter",
            })
    }

    /// Current settings.
    pub fn config(&self) -> Result<RateLimitConfig, StoreError> {
        self.config
            .read()
            .map(|c| c.clone())
            .map_err(|_| StoreError::Poisoned {
                store: "rate limiter config",
            })
    }

    /// Replace the settings. Recorded history is kept.
    pub fn update_config(&self, config: RateLimitConfig) -> Result<(), StoreError> {
        let mut current = self.config.write().map_err(|_| StoreError::Poisoned {
            store: "rate limiter config",
        })?;
        *current = config;
        self.sink.info("Rate limiter settings updated");
        Ok(())
    }

    /// May a message from `key` be processed now?
    ///
    /// Never records an event. Any internal fault admits the message.
    pub fn admit(&self, key: &str) -> bool {
        match self.check(key) {
            Ok(admission) => admission.is_admitted(),
            Err(e) => {
                error!(sender = %key, error = %e, "Rate limiter check failed, admitting");
                true
            }
        }
    }

    /// Admission check with the reason for a refusal.
    ///
    /// Drops day-old entries and may latch the approaching-limits warning,
    /// but never appends to the history.
    pub fn check(&self, key: &str) -> Result<Admission, StoreError> {
        let now = self.clock.now();
        let config = self.config()?;

        let (admission, warn_now) = {
            let mut histories = self.lock()?;
            let Some(state) = histories.get_mut(key) else {
                return Ok(Admission::Admitted);
            };
            state.prune(now);

            let since_last = now - state.last_event_at;
            if since_last < config.cooldown {
                if since_last >= config.grace.min_elapsed
                    && state.timestamps.len() < config.grace.max_events
                {
                    return Ok(Admission::Admitted);
                }
                debug!(sender = %key, "Correspondent is in cooldown");
                return Ok(Admission::Cooldown {
                    remaining: config.cooldown - since_last,
                });
            }

            let minute = state.count_within(now, TimeDelta::seconds(MINUTE_SECS));
            let hour = state.count_within(now, TimeDelta::seconds(HOUR_SECS));
            let day = state.count_within(now, TimeDelta::seconds(DAY_SECS));

            if minute >= config.max_per_minute {
                warn!(sender = %key, count = minute, "Rate limit exceeded (per minute)");
                return Ok(Admission::MinuteCap { count: minute });
            }
            if hour >= config.max_per_hour {
                warn!(sender = %key, count = hour, "Rate limit exceeded (per hour)");
                return Ok(Admission::HourCap { count: hour });
            }
            if day >= config.max_per_day {
                warn!(sender = %key, count = day, "Rate limit exceeded (per day)");
                return Ok(Admission::DayCap { count: day });
            }

            let approaching = config.near_cap(minute, config.max_per_minute)
                || config.near_cap(hour, config.max_per_hour)
                || config.near_cap(day, config.max_per_day);
            let warn_now = approaching && !state.warning_issued;
            if warn_now {
                state.warning_issued = true;
            }
            (Admission::Admitted, warn_now)
        };

        if warn_now {
            self.sink
                .warn(&format!("Correspondent {key} is approaching rate limits"));
        }
        Ok(admission)
    }

    /// Count an event for `key` at the current instant.
    pub fn record(&self, key: &str) {
        if let Err(e) = self.try_record(key) {
            error!(sender = %key, error = %e, "Failed to record rate limiter event");
        }
    }

    fn try_record(&self, key: &str) -> Result<(), StoreError> {
        let now = self.clock.now();
        let config = self.config()?;
        let mut histories = self.lock()?;

        let state = histories
            .entry(key.to_string())
            .or_insert_with(|| WindowState::new(now));
        state.prune(now);
        state.timestamps.push_back(now);
        state.last_event_at = now;

        if state.warning_issued {
            let hour = state.count_within(now, TimeDelta::seconds(HOUR_SECS));
            if !config.near_cap(hour, config.max_per_hour) {
                state.warning_issued = false;
            }
        }
        Ok(())
    }

    /// Forget everything recorded for `key`. Returns whether a record existed.
    pub fn reset(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.lock()?.remove(key).is_some();
        if removed {
            self.sink.info(&format!("Reset rate limits for {key}"));
        }
        Ok(removed)
    }

    /// Evict correspondents idle past the configured threshold and prune the rest.
    /// Returns the number evicted.
    pub fn sweep(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let idle = self.config()?.idle_eviction;
        let mut histories = self.lock()?;

        let before = histories.len();
        histories.retain(|_, state| {
            if now - state.last_event_at > idle {
                return false;
            }
            state.prune(now);
            true
        });
        let evicted = before - histories.len();

        debug!(
            evicted,
            tracked = histories.len(),
            "Rate limiter sweep completed"
        );
        Ok(evicted)
    }

    /// Number of correspondents with a history.
    pub fn tracked(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn stats(&self) -> Result<LimiterStats, StoreError> {
        let now = self.clock.now();
        let histories = self.lock()?;

        let mut stats = LimiterStats {
            total_tracked: histories.len(),
            ..LimiterStats::default()
        };
        for state in histories.values() {
            if now - state.last_event_at <= TimeDelta::seconds(HOUR_SECS) {
                stats.active_last_hour += 1;
            }
            stats.events_last_hour += state.count_within(now, TimeDelta::seconds(HOUR_SECS));
            stats.events_last_day += state.count_within(now, TimeDelta::seconds(DAY_SECS));
        }
        Ok(stats)
    }
}
