//! Per-feed polling with visibility gating and response ordering.
//!
//! Each feed has at most one timer task and at most one fetch task. A tick
//! that arrives while a fetch is still outstanding is skipped. Fetches carry
//! a per-feed sequence number; a response is applied only if it belongs to
//! the fetch currently registered for that feed, so an aborted or superseded
//! request can never overwrite newer data.
//!
//! Control state lives behind a `std::sync::Mutex` that is never held across
//! an `.await`. Lock order is always control first, then the watch channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use floodwatch_feed_models::{Feed, GeoCoordinate, LocationFix};
use floodwatch_gateway::{FeedGateway, GatewayError};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    RefreshConfig,
    state::{FeedData, RefreshState},
    visibility::{Visibility, VisibilitySignal},
};

struct InFlight {
    seq: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct FeedSlot {
    next_seq: u64,
    applied_seq: u64,
    in_flight: Option<InFlight>,
    timer: Option<JoinHandle<()>>,
}

impl FeedSlot {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn cancel_fetch(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.handle.abort();
        }
    }
}

struct Control {
    location: LocationFix,
    /// Position the current data was fetched for. Moves are measured from
    /// here so a walk in small steps still invalidates once it adds up.
    anchor: GeoCoordinate,
    visible: bool,
    transitions: u64,
    disposed: bool,
    slots: [FeedSlot; 3],
    visibility_task: Option<JoinHandle<()>>,
}

impl Control {
    fn slot(&mut self, feed: Feed) -> &mut FeedSlot {
        match feed {
            Feed::FloodRisk => &mut self.slots[0],
            Feed::Weather => &mut self.slots[1],
            Feed::CommunityUpdates => &mut self.slots[2],
        }
    }
}

struct Inner {
    gateway: Arc<dyn FeedGateway>,
    config: RefreshConfig,
    state: watch::Sender<RefreshState>,
    control: Mutex<Control>,
}

/// Owns the feed timers and publishes [`RefreshState`] snapshots.
///
/// Dropping the scheduler disposes it.
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl RefreshScheduler {
    /// Starts polling from `location`.
    ///
    /// If `visibility` currently reports visible, every feed is fetched
    /// immediately and its timer armed before this returns.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn start(
        gateway: Arc<dyn FeedGateway>,
        config: RefreshConfig,
        location: LocationFix,
        mut visibility: VisibilitySignal,
    ) -> Self {
        let initial = visibility.current();
        let (state, _rx) = watch::channel(RefreshState::new(location, false));

        let inner = Arc::new(Inner {
            gateway,
            config,
            state,
            control: Mutex::new(Control {
                location,
                anchor: location.coordinate,
                visible: false,
                transitions: initial.transitions,
                disposed: false,
                slots: Default::default(),
                visibility_task: None,
            }),
        });

        log::info!("Starting refresh scheduler at {}", location.coordinate);

        {
            let mut control = inner.lock();
            if initial.visible {
                inner.resume(&mut control);
            }
            let weak = Arc::downgrade(&inner);
            control.visibility_task = Some(tokio::spawn(follow_visibility(weak, visibility)));
        }

        Self { inner }
    }

    /// A receiver that always holds the latest state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<RefreshState> {
        self.inner.state.subscribe()
    }

    /// A clone of the latest state.
    #[must_use]
    pub fn snapshot(&self) -> RefreshState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn config(&self) -> &RefreshConfig {
        &self.inner.config
    }

    /// Fetches `feed` now and waits for it to settle.
    ///
    /// Joins the outstanding request instead of issuing a second one, and
    /// leaves the feed's timer untouched.
    pub async fn refresh(&self, feed: Feed) {
        self.refresh_feeds(&[feed]).await;
    }

    /// Fetches every feed now and waits until all have settled.
    pub async fn refresh_all(&self) {
        self.refresh_feeds(Feed::all()).await;
    }

    async fn refresh_feeds(&self, feeds: &[Feed]) {
        let mut rx = self.inner.state.subscribe();
        {
            let mut control = self.inner.lock();
            if control.disposed {
                return;
            }
            log::debug!("Manual refresh of {feeds:?}");
            for feed in feeds {
                self.inner.start_fetch(&mut control, *feed, false);
            }
        }
        let settled = rx
            .wait_for(|state| feeds.iter().all(|feed| !state.is_loading(*feed)))
            .await
            .is_ok();
        if !settled {
            log::debug!("State channel closed during refresh");
        }
    }

    /// Reports a new position.
    ///
    /// A move beyond [`RefreshConfig::relocation_threshold_km`] discards all
    /// data and outstanding requests, then refetches every feed for the new
    /// position (once visible). Smaller moves only update the published
    /// location.
    pub fn set_location(&self, fix: LocationFix) {
        self.inner.relocate(fix);
    }

    /// Stops every timer and outstanding request. Responses that arrive
    /// afterwards are dropped. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_visibility(self: &Arc<Self>, visibility: Visibility) {
        let mut control = self.lock();
        if control.disposed || visibility.transitions == control.transitions {
            return;
        }
        control.transitions = visibility.transitions;

        if visibility.visible {
            self.resume(&mut control);
        } else {
            self.pause(&mut control);
        }
    }

    /// Fetches every feed and re-arms every timer.
    fn resume(self: &Arc<Self>, control: &mut Control) {
        log::info!("View visible; resuming feed timers");
        control.visible = true;
        self.state.send_modify(|state| state.visible = true);
        for feed in Feed::all() {
            control.slot(*feed).cancel_timer();
            self.start_fetch(control, *feed, false);
            self.arm(control, *feed);
        }
    }

    fn pause(&self, control: &mut Control) {
        log::info!("View hidden; pausing feed timers");
        control.visible = false;
        for slot in &mut control.slots {
            slot.cancel_timer();
        }
        self.state.send_modify(|state| state.visible = false);
    }

    fn arm(self: &Arc<Self>, control: &mut Control, feed: Feed) {
        let cadence = self.config.cadence(feed);
        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + cadence, cadence);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.tick(feed);
            }
        });

        let slot = control.slot(feed);
        slot.cancel_timer();
        slot.timer = Some(timer);
    }

    fn tick(self: &Arc<Self>, feed: Feed) {
        let mut control = self.lock();
        if control.disposed || !control.visible {
            return;
        }
        self.start_fetch(&mut control, feed, false);
    }

    /// Issues a fetch for `feed` at the current location.
    ///
    /// With `replace` unset, an outstanding request is left alone and no new
    /// one is issued. With `replace` set, the outstanding request is aborted
    /// first.
    fn start_fetch(self: &Arc<Self>, control: &mut Control, feed: Feed, replace: bool) {
        let at = control.location.coordinate;
        let slot = control.slot(feed);

        if let Some(outstanding) = slot.in_flight.as_ref().map(|f| f.seq) {
            if !replace {
                log::trace!("{feed} fetch #{outstanding} still outstanding; skipping");
                return;
            }
            slot.cancel_fetch();
        }

        slot.next_seq += 1;
        let seq = slot.next_seq;
        log::debug!("Fetching {feed} #{seq} at {at}");

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let result = inner.fetch(feed, at).await;
            inner.settle(feed, seq, result);
        });
        slot.in_flight = Some(InFlight { seq, handle });

        self.state.send_modify(|state| state.set_loading(feed, true));
    }

    async fn fetch(&self, feed: Feed, at: GeoCoordinate) -> Result<FeedData, GatewayError> {
        let request = async {
            match feed {
                Feed::FloodRisk => self.gateway.flood_risk(at).await.map(FeedData::FloodRisk),
                Feed::Weather => self.gateway.weather(at).await.map(FeedData::Weather),
                Feed::CommunityUpdates => self
                    .gateway
                    .community_updates(at, self.config.community_radius_km)
                    .await
                    .map(FeedData::CommunityUpdates),
            }
        };

        tokio::time::timeout(self.config.request_timeout, request)
            .await
            .unwrap_or(Err(GatewayError::Timeout(self.config.request_timeout)))
    }

    fn settle(&self, feed: Feed, seq: u64, result: Result<FeedData, GatewayError>) {
        let mut control = self.lock();
        if control.disposed {
            log::debug!("Dropping {feed} #{seq}: scheduler disposed");
            return;
        }

        let slot = control.slot(feed);
        let current = slot.in_flight.as_ref().is_some_and(|f| f.seq == seq);
        if !current || seq < slot.applied_seq {
            log::debug!("Dropping superseded {feed} #{seq}");
            return;
        }
        slot.in_flight = None;
        slot.applied_seq = seq;

        match result {
            Ok(data) => {
                log::debug!("{feed} #{seq} refreshed");
                let (at, now) = (Utc::now(), Instant::now());
                self.state.send_modify(|state| state.accept(data, at, now));
            }
            Err(e) => {
                log::warn!("{feed} refresh failed: {e}");
                self.state
                    .send_modify(|state| state.reject(feed, e.to_string()));
            }
        }
    }

    fn relocate(self: &Arc<Self>, fix: LocationFix) {
        let mut control = self.lock();
        if control.disposed {
            return;
        }

        let distance_km = control.anchor.distance_km(&fix.coordinate);
        control.location = fix;

        if distance_km <= self.config.relocation_threshold_km {
            self.state.send_modify(|state| state.location = fix);
            return;
        }

        log::info!(
            "Location moved {distance_km:.2} km to {}; refetching all feeds",
            fix.coordinate
        );
        control.anchor = fix.coordinate;

        for slot in &mut control.slots {
            slot.cancel_fetch();
        }
        self.state.send_modify(|state| {
            state.location = fix;
            state.invalidate_all();
        });

        if control.visible {
            for feed in Feed::all() {
                self.start_fetch(&mut control, *feed, true);
            }
        }
    }

    fn dispose(&self) {
        let mut control = self.lock();
        if control.disposed {
            return;
        }
        control.disposed = true;

        for slot in &mut control.slots {
            slot.cancel_timer();
            slot.cancel_fetch();
        }
        if let Some(task) = control.visibility_task.take() {
            task.abort();
        }

        self.state.send_modify(|state| {
            for feed in Feed::all() {
                state.set_loading(*feed, false);
            }
        });
        log::info!("Refresh scheduler disposed");
    }
}

/// Forwards visibility edges to the scheduler until either side goes away.
async fn follow_visibility(weak: Weak<Inner>, mut signal: VisibilitySignal) {
    while let Some(visibility) = signal.changed().await {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        inner.on_visibility(visibility);
    }
}
