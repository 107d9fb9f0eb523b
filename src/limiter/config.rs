//! Rate limiter settings.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

/// Narrow carve-out from the cooldown rule.
///
/// A correspondent still inside the cooldown is admitted anyway when at least
/// `min_elapsed` has passed since their last recorded event **and** fewer than
/// `max_events` events are retained in their rolling day history. Short
/// back-and-forth exchanges pass; sustained bursts hit the full cooldown.
///
/// Both thresholds interact with the per-minute cap: a grace admission skips
/// the window checks, so a burst can land slightly above the nominal cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GracePolicy {
    #[serde(with = "delta_millis")]
    pub min_elapsed: TimeDelta,
    pub max_events: usize,
}

impl Default for GracePolicy {
    fn default() -> Self {
        Self {
            min_elapsed: TimeDelta::seconds(3),
            max_events: 5,
        }
    }
}

/// Caps, cooldown, and housekeeping settings for [`super::RateLimiter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_per_minute: usize,
    pub max_per_hour: usize,
    pub max_per_day: usize,
    /// Minimum spacing between recorded events before the next admission.
    #[serde(with = "delta_millis")]
    pub cooldown: TimeDelta,
    pub grace: GracePolicy,
    /// Fraction of a cap at which the one-shot warning fires.
    pub warning_threshold: f64,
    /// Correspondents silent for longer than this are evicted by the sweeper.
    #[serde(with = "delta_millis")]
    pub idle_eviction: TimeDelta,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 30,
            max_per_hour: 200,
            max_per_day: 1000,
            cooldown: TimeDelta::seconds(5),
            grace: GracePolicy::default(),
            warning_threshold: 0.9,
            idle_eviction: TimeDelta::days(7),
        }
    }
}

impl RateLimitConfig {
    /// Caps only; no cooldown. Handy when exercising the windows directly.
    pub fn without_cooldown(self) -> Self {
        Self {
            cooldown: TimeDelta::zero(),
            ..self
        }
    }

    pub(crate) fn near_cap(&self, count: usize, cap: usize) -> bool {
        count as f64 >= cap as f64 * self.warning_threshold
    }
}

mod delta_millis {
    use chrono::TimeDelta;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delta: &TimeDelta, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(delta.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<TimeDelta, D::Error> {
        let millis = i64::deserialize(d)?;
        Ok(TimeDelta::milliseconds(millis))
    }
}
