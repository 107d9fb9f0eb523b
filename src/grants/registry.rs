//! Grant registry: at most one grant per correspondent, lazily expired.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info};

use super::model::{Grant, GrantKind, GrantSpec};
use crate::clock::Clock;
use crate::error::{CommandError, StoreError};
use crate::observability::ObservabilitySink;

/// Why a grant issuance failed.
#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error(transparent)]
    Invalid(#[from] CommandError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// In-memory grant store guarded by a single mutex.
pub struct GrantRegistry {
    grants: Mutex<HashMap<String, Grant>>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ObservabilitySink>,
}

impl GrantRegistry {
    pub fn new(clock: Arc<dyn Clock>, sink: Arc<dyn ObservabilitySink>) -> Self {
        Self {
            grants: Mutex::new(HashMap::new()),
            clock,
            sink,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Grant>>, StoreError> {
        self.grants
            .lock()
            .map_err(|_| StoreError::Poisoned { store: "grants" })
    }

    /// Issue a grant, replacing any existing one for `key`. Durations are not merged.
    pub fn grant(&self, key: &str, spec: GrantSpec) -> Result<Grant, GrantError> {
        let now = self.clock.now();
        let grant = Grant {
            kind: spec.resolve(now)?,
            granted_at: now,
        };

        let replaced = self
            .lock()?
            .insert(key.to_string(), grant.clone())
            .is_some();

        info!(target_key = %key, spec = %spec, replaced, "Grant issued");
        self.sink.info(&format!("Granted {key} access ({spec})"));
        Ok(grant)
    }

    /// Remove any grant for `key`. Returns whether one existed; absent is not an error.
    pub fn revoke(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.lock()?.remove(key).is_some();
        if removed {
            self.sink.info(&format!("Revoked access for {key}"));
        }
        Ok(removed)
    }

    /// Is `key` authorized right now?
    ///
    /// **Mutates.** A message-count grant loses one use per call, and the call
    /// that spends the last use still returns `true` before the grant is
    /// removed. A lapsed time-boxed grant is removed by the call that finds
    /// it lapsed. Call this exactly once per inbound message and reuse the
    /// answer.
    pub fn is_authorized(&self, key: &str) -> Result<bool, StoreError> {
        let now = self.clock.now();

        let (authorized, removed) = {
            let mut grants = self.lock()?;
            let Some(grant) = grants.get_mut(key) else {
                return Ok(false);
            };

            let (authorized, remove) = match &mut grant.kind {
                GrantKind::Permanent => (true, false),
                GrantKind::ExpiresAt(expires_at) => {
                    let valid = now < *expires_at;
                    (valid, !valid)
                }
                GrantKind::RemainingUses(0) => (false, true),
                GrantKind::RemainingUses(remaining) => {
                    *remaining -= 1;
                    (true, *remaining == 0)
                }
            };
            if remove {
                grants.remove(key);
            }
            (authorized, remove)
        };

        if removed {
            debug!(target_key = %key, "Grant lapsed");
            self.sink.info(&format!("Grant for {key} expired"));
        }
        Ok(authorized)
    }

    /// Read the current grant without consuming or expiring it.
    pub fn peek(&self, key: &str) -> Result<Option<Grant>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    /// Drop lapsed time-boxed grants. Returns how many were removed.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut grants = self.lock()?;
        let before = grants.len();
        grants.retain(|_, grant| match grant.kind {
            GrantKind::ExpiresAt(expires_at) => now < expires_at,
            GrantKind::RemainingUses(remaining) => remaining > 0,
            GrantKind::Permanent => true,
        });
        Ok(before - grants.len())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.lock()?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;
    use crate::clock::ManualClock;
    use crate::grants::DurationUnit;
    use crate::observability::MemorySink;

    fn registry() -> (GrantRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let registry = GrantRegistry::new(clock.clone(), Arc::new(MemorySink::new()));
        (registry, clock)
    }

    fn hours(amount: u32) -> GrantSpec {
        GrantSpec::Duration {
            unit: DurationUnit::Hour,
            amount,
        }
    }

    #[test]
    fn absent_grant_is_unauthorized() {
        let (registry, _) = registry();
        assert!(!registry.is_authorized("u1").unwrap());
    }

    #[test]
    fn permanent_grant_never_changes() {
        let (registry, clock) = registry();
        registry.grant("u1", GrantSpec::Forever).unwrap();
        for _ in 0..10 {
            assert!(registry.is_authorized("u1").unwrap());
            clock.advance_secs(400 * 86_400);
        }
        assert_eq!(registry.peek("u1").unwrap().unwrap().kind, GrantKind::Permanent);
    }

    #[test]
    fn single_use_grant_is_spent_by_first_check() {
        let (registry, _) = registry();
        registry.grant("u1", GrantSpec::Messages { count: 1 }).unwrap();
        assert!(registry.is_authorized("u1").unwrap());
        assert!(registry.peek("u1").unwrap().is_none());
        assert!(!registry.is_authorized("u1").unwrap());
    }

    #[test]
    fn count_grant_decrements_per_check() {
        let (registry, _) = registry();
        registry.grant("u1", GrantSpec::Messages { count: 3 }).unwrap();
        assert!(registry.is_authorized("u1").unwrap());
        assert_eq!(
            registry.peek("u1").unwrap().unwrap().kind,
            GrantKind::RemainingUses(2)
        );
        assert!(registry.is_authorized("u1").unwrap());
        assert!(registry.is_authorized("u1").unwrap());
        assert!(!registry.is_authorized("u1").unwrap());
    }

    #[test]
    fn zero_use_record_is_removed_defensively() {
        let (registry, _) = registry();
        registry.lock().unwrap().insert(
            "u1".into(),
            Grant {
                kind: GrantKind::RemainingUses(0),
                granted_at: chrono::Utc::now(),
            },
        );
        assert!(!registry.is_authorized("u1").unwrap());
        assert!(registry.peek("u1").unwrap().is_none());
    }

    #[test]
    fn timed_grant_expires_at_deadline() {
        let (registry, clock) = registry();
        registry.grant("u1", hours(1)).unwrap();

        clock.advance_secs(3_599);
        assert!(registry.is_authorized("u1").unwrap());
        assert!(registry.is_authorized("u1").unwrap());

        clock.advance_secs(1);
        assert!(!registry.is_authorized("u1").unwrap());
        assert!(registry.peek("u1").unwrap().is_none());
    }

    #[test]
    fn timed_grant_is_expired_exactly_at_its_instant() {
        let (registry, clock) = registry();
        registry.grant("u1", hours(3)).unwrap();
        let Some(GrantKind::ExpiresAt(deadline)) = registry.peek("u1").unwrap().map(|g| g.kind)
        else {
            panic!("expected a timed grant");
        };

        clock.set(deadline - TimeDelta::milliseconds(1));
        assert!(registry.is_authorized("u1").unwrap());

        clock.set(deadline);
        assert!(!registry.is_authorized("u1").unwrap());
    }

    #[test]
    fn new_grant_replaces_old_without_merging() {
        let (registry, clock) = registry();
        registry.grant("u1", hours(5)).unwrap();
        registry.grant("u1", hours(1)).unwrap();
        clock.advance_secs(2 * 3_600);
        assert!(!registry.is_authorized("u1").unwrap());

        registry.grant("u1", GrantSpec::Messages { count: 5 }).unwrap();
        registry.grant("u1", GrantSpec::Forever).unwrap();
        assert_eq!(registry.len().unwrap(), 1);
        assert_eq!(registry.peek("u1").unwrap().unwrap().kind, GrantKind::Permanent);
    }

    #[test]
    fn invalid_spec_leaves_existing_grant() {
        let (registry, _) = registry();
        registry.grant("u1", GrantSpec::Forever).unwrap();
        let err = registry
            .grant("u1", GrantSpec::Messages { count: 0 })
            .unwrap_err();
        assert!(matches!(err, GrantError::Invalid(CommandError::ZeroAmount)));
        assert!(registry.is_authorized("u1").unwrap());
    }

    #[test]
    fn revoke_is_idempotent() {
        let (registry, _) = registry();
        assert!(!registry.revoke("u1").unwrap());
        assert!(registry.is_empty().unwrap());

        registry.grant("u1", GrantSpec::Forever).unwrap();
        assert!(registry.revoke("u1").unwrap());
        assert!(!registry.revoke("u1").unwrap());
        assert!(!registry.is_authorized("u1").unwrap());
    }

    #[test]
    fn purge_removes_only_lapsed_grants() {
        let (registry, clock) = registry();
        registry.grant("timed", hours(1)).unwrap();
        registry.grant("forever", GrantSpec::Forever).unwrap();
        registry.grant("counted", GrantSpec::Messages { count: 2 }).unwrap();

        clock.advance_secs(2 * 3_600);
        assert_eq!(registry.purge_expired().unwrap(), 1);
        assert_eq!(registry.len().unwrap(), 2);
        assert!(registry.peek("timed").unwrap().is_none());
    }

    #[test]
    fn concurrent_checks_never_oversubscribe() {
        let (registry, _) = registry();
        let registry = Arc::new(registry);
        registry.grant("u1", GrantSpec::Messages { count: 50 }).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| registry.is_authorized("u1").unwrap())
                        .count()
                })
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 50);
    }
}
