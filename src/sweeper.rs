//! Periodic reclamation of idle rate-limiter records and lapsed grants.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::grants::GrantRegistry;
use crate::limiter::RateLimiter;

/// Outcome of a single sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted_correspondents: usize,
    pub purged_grants: usize,
}

/// Run one sweep. Each store's lock is held only for its own pass.
pub fn sweep_once(limiter: &RateLimiter, grants: &GrantRegistry) -> SweepReport {
    let mut report = SweepReport::default();

    match limiter.sweep() {
        Ok(evicted) => report.evicted_correspondents = evicted,
        Err(e) => error!(error = %e, "Rate limiter sweep failed"),
    }
    match grants.purge_expired() {
        Ok(purged) => report.purged_grants = purged,
        Err(e) => error!(error = %e, "Grant janitor failed"),
    }

    if report != SweepReport::default() {
        info!(
            evicted = report.evicted_correspondents,
            purged = report.purged_grants,
            "Sweep reclaimed state"
        );
    } else {
        debug!("Sweep found nothing to reclaim");
    }
    report
}

/// Spawn a background task that sweeps on a fixed interval.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    grants: Arc<GrantRegistry>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            sweep_once(&limiter, &grants);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::grants::{DurationUnit, GrantSpec};
    use crate::limiter::RateLimitConfig;
    use crate::observability::MemorySink;

    fn stores() -> (Arc<RateLimiter>, Arc<GrantRegistry>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let sink = Arc::new(MemorySink::new());
        let limiter = Arc::new(RateLimiter::new(
            RateLimitConfig::default(),
            clock.clone(),
            sink.clone(),
        ));
        let grants = Arc::new(GrantRegistry::new(clock.clone(), sink));
        (limiter, grants, clock)
    }

    #[test]
    fn sweep_reclaims_both_stores() {
        let (limiter, grants, clock) = stores();
        limiter.record("idle");
        grants
            .grant(
                "timed",
                GrantSpec::Duration {
                    unit: DurationUnit::Day,
                    amount: 1,
                },
            )
            .unwrap();
        grants.grant("forever", GrantSpec::Forever).unwrap();

        clock.advance_secs(8 * 86_400);
        let report = sweep_once(&limiter, &grants);
        assert_eq!(
            report,
            SweepReport {
                evicted_correspondents: 1,
                purged_grants: 1,
            }
        );
        assert_eq!(limiter.tracked().unwrap(), 0);
        assert_eq!(grants.len().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_sweeper_runs_on_interval() {
        let (limiter, grants, clock) = stores();
        limiter.record("idle");
        clock.advance_secs(8 * 86_400);

        let handle = spawn_sweeper(limiter.clone(), grants, Duration::from_secs(300));
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(limiter.tracked().unwrap(), 0);
        handle.abort();
    }
}
