//! "Next refresh in N s" projection for the flood-risk feed.

use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle, time::Instant};

use crate::{state::RefreshState, visibility::VisibilitySignal};

/// Whole seconds until the next scheduled refresh.
///
/// Before the first snapshot lands the full cadence is reported. Partial
/// seconds round up so the display reaches 0 only when the refresh is due.
#[must_use]
pub fn seconds_remaining(cadence: Duration, since_refresh: Option<Duration>) -> u64 {
    let Some(elapsed) = since_refresh else {
        return cadence.as_secs();
    };
    let remaining = cadence.saturating_sub(elapsed);
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}

/// Background task publishing [`seconds_remaining`] once per second while
/// the surface is visible.
///
/// The value is recomputed from the feed's refresh instant on every tick,
/// every state change, and every visibility edge, so it never drifts and
/// resets to the full cadence as soon as a new snapshot is accepted.
#[derive(Debug)]
pub struct Countdown {
    rx: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl Countdown {
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(
        cadence: Duration,
        state: watch::Receiver<RefreshState>,
        visibility: VisibilitySignal,
    ) -> Self {
        let (tx, rx) = watch::channel(cadence.as_secs());
        let task = tokio::spawn(run(cadence, state, visibility, tx));
        Self { rx, task }
    }

    /// The most recently published value.
    #[must_use]
    pub fn seconds(&self) -> u64 {
        *self.rx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.rx.clone()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    cadence: Duration,
    mut state: watch::Receiver<RefreshState>,
    mut visibility: VisibilitySignal,
    tx: watch::Sender<u64>,
) {
    loop {
        if !visibility.current().visible {
            if visibility.changed().await.is_none() {
                return;
            }
            continue;
        }

        let refreshed_at = state.borrow_and_update().flood_risk.refreshed_at;
        let seconds = seconds_remaining(cadence, refreshed_at.map(|at| Instant::now() - at));
        tx.send_if_modified(|current| {
            let changed = *current != seconds;
            *current = seconds;
            changed
        });

        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(1)) => {}
            changed = state.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            edge = visibility.changed() => {
                if edge.is_none() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    };

    use floodwatch_feed_models::{
        CommunityUpdatesPayload, FloodRiskSnapshot, GeoCoordinate, LocationFix, WeatherSnapshot,
    };
    use floodwatch_gateway::{FeedGateway, GatewayError};
    use floodwatch_location::{flood_risk_for, weather_for};

    use super::*;
    use crate::{RefreshConfig, RefreshScheduler, VisibilityTracker};

    const CADENCE: Duration = Duration::from_secs(30);

    #[derive(Default)]
    struct SlowGateway {
        delay_ms: AtomicU64,
    }

    #[async_trait::async_trait]
    impl FeedGateway for SlowGateway {
        async fn flood_risk(&self, at: GeoCoordinate) -> Result<FloodRiskSnapshot, GatewayError> {
            let delay = self.delay_ms.load(Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(flood_risk_for(at))
        }

        async fn weather(&self, at: GeoCoordinate) -> Result<WeatherSnapshot, GatewayError> {
            Ok(weather_for(at))
        }

        async fn community_updates(
            &self,
            _at: GeoCoordinate,
            _radius_km: f64,
        ) -> Result<CommunityUpdatesPayload, GatewayError> {
            Ok(CommunityUpdatesPayload::default())
        }
    }

    fn scheduler(tracker: &VisibilityTracker) -> RefreshScheduler {
        RefreshScheduler::start(
            Arc::new(SlowGateway::default()),
            RefreshConfig::default(),
            LocationFix::fallback(),
            tracker.subscribe(),
        )
    }

    #[test]
    fn full_cadence_before_first_snapshot() {
        assert_eq!(seconds_remaining(CADENCE, None), 30);
    }

    #[test]
    fn rounds_partial_seconds_up() {
        assert_eq!(seconds_remaining(CADENCE, Some(Duration::ZERO)), 30);
        assert_eq!(seconds_remaining(CADENCE, Some(Duration::from_millis(100))), 30);
        assert_eq!(seconds_remaining(CADENCE, Some(Duration::from_millis(29_001))), 1);
        assert_eq!(seconds_remaining(CADENCE, Some(Duration::from_secs(30))), 0);
    }

    #[test]
    fn never_negative_when_a_refresh_is_overdue() {
        assert_eq!(seconds_remaining(CADENCE, Some(Duration::from_secs(95))), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn counts_down_and_resets_on_refresh() {
        let tracker = VisibilityTracker::new(true);
        let scheduler = scheduler(&tracker);
        let countdown = Countdown::spawn(CADENCE, scheduler.subscribe(), tracker.subscribe());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(countdown.seconds(), 30);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!((19..=21).contains(&countdown.seconds()), "{}", countdown.seconds());

        // the scheduled refresh at 30s lands immediately
        tokio::time::sleep(Duration::from_millis(20_500)).await;
        assert!((29..=30).contains(&countdown.seconds()), "{}", countdown.seconds());
    }

    #[tokio::test(start_paused = true)]
    async fn stays_within_bounds() {
        let tracker = VisibilityTracker::new(true);
        let scheduler = scheduler(&tracker);
        let countdown = Countdown::spawn(CADENCE, scheduler.subscribe(), tracker.subscribe());

        for _ in 0..120 {
            tokio::time::sleep(Duration::from_millis(750)).await;
            assert!(countdown.seconds() <= 30);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn resume_recomputes_instead_of_unfreezing() {
        let gateway = Arc::new(SlowGateway::default());
        let tracker = VisibilityTracker::new(true);
        let scheduler = RefreshScheduler::start(
            gateway.clone(),
            RefreshConfig::default(),
            LocationFix::fallback(),
            tracker.subscribe(),
        );
        let countdown = Countdown::spawn(CADENCE, scheduler.subscribe(), tracker.subscribe());
        tokio::time::sleep(Duration::from_secs(5)).await;

        tracker.set_visible(false);
        tokio::time::sleep(Duration::from_secs(12)).await;
        let frozen = countdown.seconds();
        assert!((25..=26).contains(&frozen), "{frozen}");

        // keep the old snapshot current while the catch-up fetch is pending
        gateway.delay_ms.store(5_000, Ordering::SeqCst);
        tracker.set_visible(true);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(scheduler.snapshot().flood_risk.loading);
        assert!((12..=13).contains(&countdown.seconds()), "{}", countdown.seconds());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!((29..=30).contains(&countdown.seconds()), "{}", countdown.seconds());
    }
}
