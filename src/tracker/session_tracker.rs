//! Inactivity tracker with warning and expiry timers.
//!
//! The tracker keeps a single `last_activity` instant and two one-shot
//! Tokio timers derived from it. Qualifying activity (subject to the
//! debounce window) moves `last_activity` forward and re-arms both timers.

use super::types::{format_remaining, SessionCallback, SessionPhase, TrackerSnapshot};
use crate::activity::{ActivityKind, ActivitySource, SubscriptionId};
use crate::config::TimeoutConfig;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Tracks user inactivity and fires warning/expiry callbacks.
///
/// Cloning is cheap and yields another handle to the same tracker. Timers
/// are cancelled when the last handle is dropped.
#[derive(Clone)]
pub struct SessionTracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    config: TimeoutConfig,
    source: Arc<dyn ActivitySource>,
    runtime: Handle,
    state: Mutex<TrackerState>,
}

struct TrackerState {
    last_activity: Instant,
    last_activity_at: DateTime<Utc>,

    /// `None` while stopped.
    timers: Option<ArmedTimers>,

    on_expiry: Option<SessionCallback>,
    on_warning: Option<SessionCallback>,
    subscription: Option<SubscriptionId>,
}

/// Live timer tasks. Dropping this aborts them.
struct ArmedTimers {
    warning: Option<JoinHandle<()>>,
    expiry: JoinHandle<()>,
}

impl Drop for ArmedTimers {
    fn drop(&mut self) {
        if let Some(warning) = &self.warning {
            warning.abort();
        }
        self.expiry.abort();
    }
}

impl SessionTracker {
    /// Creates a stopped tracker that schedules its timers on the current
    /// Tokio runtime.
    ///
    /// # Panics
    /// Panics if called outside a Tokio runtime. Use
    /// [`SessionTracker::with_runtime`] to pass a handle explicitly.
    pub fn new(config: TimeoutConfig, source: Arc<dyn ActivitySource>) -> Self {
        Self::with_runtime(config, source, Handle::current())
    }

    /// Creates a stopped tracker that schedules its timers on `runtime`.
    pub fn with_runtime(
        config: TimeoutConfig,
        source: Arc<dyn ActivitySource>,
        runtime: Handle,
    ) -> Self {
        let state = TrackerState {
            last_activity: Instant::now(),
            last_activity_at: Utc::now(),
            timers: None,
            on_expiry: None,
            on_warning: None,
            subscription: None,
        };

        Self {
            inner: Arc::new(TrackerInner {
                config,
                source,
                runtime,
                state: Mutex::new(state),
            }),
        }
    }

    /// Registers callbacks and arms the tracker from now.
    ///
    /// Calling this again replaces the callbacks and re-arms from the new
    /// instant. The tracker subscribes to its activity source here and
    /// unsubscribes in [`stop`](Self::stop).
    pub fn initialize(&self, on_expiry: SessionCallback, on_warning: Option<SessionCallback>) {
        let previous = {
            let mut state = self.inner.lock_state();
            state.on_expiry = Some(on_expiry);
            state.on_warning = on_warning;
            self.inner.arm(&mut state, Instant::now());
            state.subscription.take()
        };

        if let Some(id) = previous {
            self.inner.source.unsubscribe(id);
        }

        let weak = Arc::downgrade(&self.inner);
        let id = self.inner.source.subscribe(Arc::new(move |kind: ActivityKind| {
            if let Some(inner) = weak.upgrade() {
                inner.record_activity(kind);
            }
        }));

        // A concurrent stop may have run since arming, and a concurrent
        // initialize may have stored its own subscription.
        let stale = {
            let mut state = self.inner.lock_state();
            if state.timers.is_some() {
                state.subscription.replace(id)
            } else {
                Some(id)
            }
        };
        if let Some(stale) = stale {
            self.inner.source.unsubscribe(stale);
        }

        tracing::info!(
            timeout_secs = self.inner.config.timeout().as_secs(),
            warning_before_secs = self.inner.config.warning_before().as_secs(),
            "Session tracker armed"
        );
    }

    /// Handles one activity signal.
    ///
    /// Resets the clock and re-arms both timers if the tracker is armed and
    /// at least the debounce window has passed since the last recorded
    /// activity. Returns whether a reset happened.
    pub fn record_activity(&self, kind: ActivityKind) -> bool {
        self.inner.record_activity(kind)
    }

    /// Inactivity budget left before expiry, clamped at zero.
    pub fn remaining_time(&self) -> Duration {
        let state = self.inner.lock_state();
        self.inner.remaining_from(state.last_activity)
    }

    /// [`remaining_time`](Self::remaining_time) rendered as `MM:SS`.
    pub fn formatted_remaining_time(&self) -> String {
        format_remaining(self.remaining_time())
    }

    /// Cancels both timers and detaches from the activity source.
    ///
    /// Callbacks stay registered but will not fire until the next
    /// [`initialize`](Self::initialize). Safe to call when already stopped.
    pub fn stop(&self) {
        let (timers, subscription) = {
            let mut state = self.inner.lock_state();
            (state.timers.take(), state.subscription.take())
        };

        let was_armed = timers.is_some();
        drop(timers);

        if let Some(id) = subscription {
            self.inner.source.unsubscribe(id);
        }

        if was_armed {
            tracing::info!("Session tracker stopped");
        }
    }

    /// Invokes the expiry callback right away on the calling thread.
    ///
    /// Timer state is left untouched; callers usually follow up with
    /// [`stop`](Self::stop).
    pub fn logout(&self) {
        let on_expiry = self.inner.lock_state().on_expiry.clone();

        match on_expiry {
            Some(on_expiry) => {
                tracing::info!("Manual logout, firing expiry callback");
                on_expiry();
            }
            None => tracing::debug!("Logout requested before initialize, nothing to notify"),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock_state().timers.is_some()
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.inner.config
    }

    /// Point-in-time view for status endpoints.
    pub fn snapshot(&self) -> TrackerSnapshot {
        let state = self.inner.lock_state();
        let config = &self.inner.config;
        let armed = state.timers.is_some();
        let remaining = self.inner.remaining_from(state.last_activity);

        TrackerSnapshot {
            armed,
            phase: SessionPhase::from_remaining(armed, remaining, config.warning_before()),
            remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            remaining: format_remaining(remaining),
            last_activity_at: state.last_activity_at,
            timeout_secs: config.timeout().as_secs(),
            warning_before_secs: config.warning_before().as_secs(),
        }
    }
}

impl TrackerInner {
    fn lock_state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remaining_from(&self, last_activity: Instant) -> Duration {
        self.config
            .timeout()
            .saturating_sub(Instant::now().duration_since(last_activity))
    }

    fn record_activity(&self, kind: ActivityKind) -> bool {
        let mut state = self.lock_state();

        if state.timers.is_none() {
            tracing::trace!(kind = %kind, "Activity ignored, tracker stopped");
            return false;
        }

        let now = Instant::now();
        if now.duration_since(state.last_activity) < self.config.debounce() {
            return false;
        }

        self.arm(&mut state, now);
        tracing::debug!(kind = %kind, "Activity recorded, session timers re-armed");
        true
    }

    /// Resets the clock to `now` and replaces both timers.
    fn arm(&self, state: &mut TrackerState, now: Instant) {
        drop(state.timers.take());

        state.last_activity = now;
        state.last_activity_at = Utc::now();

        let Some(on_expiry) = state.on_expiry.clone() else {
            return;
        };

        let (Some(warning_deadline), Some(deadline)) = (
            now.checked_add(self.config.warning_delay()),
            now.checked_add(self.config.timeout()),
        ) else {
            tracing::error!(
                timeout_secs = self.config.timeout().as_secs(),
                "Session deadline out of clock range, tracker left stopped"
            );
            return;
        };

        let warning = state.on_warning.clone().map(|on_warning| {
            self.runtime.spawn(async move {
                sleep_until(warning_deadline).await;
                tracing::info!("Session inactivity warning");
                on_warning();
            })
        });

        let expiry = self.runtime.spawn(async move {
            sleep_until(deadline).await;
            tracing::info!("Session expired after inactivity");
            on_expiry();
        });

        state.timers = Some(ArmedTimers { warning, expiry });
    }
}

impl Drop for TrackerInner {
    fn drop(&mut self) {
        let subscription = self
            .state
            .get_mut()
            .map(|state| state.subscription.take())
            .unwrap_or_else(|e| e.into_inner().subscription.take());

        if let Some(id) = subscription {
            self.source.unsubscribe(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityHub;
    use crate::tracker::callback;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{advance, sleep};

    const MINUTE: Duration = Duration::from_secs(60);
    const WARNING_LEAD: Duration = Duration::from_secs(5 * 60);

    struct Fired {
        warnings: Arc<AtomicUsize>,
        expiries: Arc<AtomicUsize>,
    }

    impl Fired {
        fn new() -> Self {
            Self {
                warnings: Arc::new(AtomicUsize::new(0)),
                expiries: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn on_expiry(&self) -> SessionCallback {
            let expiries = Arc::clone(&self.expiries);
            callback(move || {
                expiries.fetch_add(1, Ordering::SeqCst);
            })
        }

        fn on_warning(&self) -> Option<SessionCallback> {
            let warnings = Arc::clone(&self.warnings);
            Some(callback(move || {
                warnings.fetch_add(1, Ordering::SeqCst);
            }))
        }

        fn warnings(&self) -> usize {
            self.warnings.load(Ordering::SeqCst)
        }

        fn expiries(&self) -> usize {
            self.expiries.load(Ordering::SeqCst)
        }
    }

    fn tracker_with_hub() -> (SessionTracker, Arc<ActivityHub>) {
        let hub = Arc::new(ActivityHub::new());
        let source: Arc<dyn ActivitySource> = hub.clone();
        (SessionTracker::new(TimeoutConfig::default(), source), hub)
    }

    #[tokio::test(start_paused = true)]
    async fn test_warning_then_expiry_fire_once() {
        let (tracker, _hub) = tracker_with_hub();
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());

        sleep(25 * MINUTE - Duration::from_secs(1)).await;
        assert_eq!(fired.warnings(), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.warnings(), 1);
        assert_eq!(fired.expiries(), 0);

        sleep(5 * MINUTE).await;
        assert_eq!(fired.warnings(), 1);
        assert_eq!(fired.expiries(), 1);

        sleep(120 * MINUTE).await;
        assert_eq!(fired.warnings(), 1);
        assert_eq!(fired.expiries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_pushes_expiry_back() {
        let (tracker, _hub) = tracker_with_hub();
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());

        sleep(10 * MINUTE).await;
        assert!(tracker.record_activity(ActivityKind::KeyPress));

        // The first deadlines have passed without firing.
        sleep(20 * MINUTE + Duration::from_secs(1)).await;
        assert_eq!(fired.warnings(), 0);
        assert_eq!(fired.expiries(), 0);

        // Warning at t=35min, expiry at t=40min.
        sleep(5 * MINUTE).await;
        assert_eq!(fired.warnings(), 1);
        assert_eq!(fired.expiries(), 0);

        sleep(5 * MINUTE).await;
        assert_eq!(fired.expiries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_suppresses_close_signals() {
        let (tracker, _hub) = tracker_with_hub();
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());

        // Within a second of initialize.
        advance(Duration::from_millis(500)).await;
        assert!(!tracker.record_activity(ActivityKind::PointerMove));

        advance(Duration::from_millis(1500)).await;
        assert!(tracker.record_activity(ActivityKind::PointerMove));

        advance(Duration::from_millis(400)).await;
        assert!(!tracker.record_activity(ActivityKind::PointerMove));

        // 900ms since the last recorded signal, not since the last attempt.
        advance(Duration::from_millis(500)).await;
        assert!(!tracker.record_activity(ActivityKind::PointerMove));

        advance(Duration::from_millis(200)).await;
        assert!(tracker.record_activity(ActivityKind::PointerMove));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_time_decreases_and_clamps() {
        let (tracker, _hub) = tracker_with_hub();
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), None);

        assert_eq!(tracker.remaining_time(), 30 * MINUTE);
        assert_eq!(tracker.formatted_remaining_time(), "30:00");

        let mut previous = tracker.remaining_time();
        for _ in 0..5 {
            advance(4 * MINUTE).await;
            let current = tracker.remaining_time();
            assert!(current <= previous);
            previous = current;
        }
        assert_eq!(tracker.remaining_time(), 10 * MINUTE);

        advance(5 * MINUTE + Duration::from_secs(1)).await;
        assert_eq!(tracker.formatted_remaining_time(), "04:59");

        advance(60 * MINUTE).await;
        assert_eq!(tracker.remaining_time(), Duration::ZERO);
        assert_eq!(tracker.formatted_remaining_time(), "00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_prevents_callbacks() {
        let (tracker, hub) = tracker_with_hub();
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());
        assert_eq!(hub.listener_count(), 1);

        sleep(MINUTE).await;
        tracker.stop();
        assert!(!tracker.is_armed());
        assert_eq!(hub.listener_count(), 0);

        sleep(120 * MINUTE).await;
        assert_eq!(fired.warnings(), 0);
        assert_eq!(fired.expiries(), 0);

        // Activity while stopped does not re-arm.
        assert!(!tracker.record_activity(ActivityKind::Click));
        assert!(!tracker.is_armed());

        // Stopping twice is harmless.
        tracker.stop();

        tracker.initialize(fired.on_expiry(), fired.on_warning());
        sleep(30 * MINUTE + Duration::from_secs(1)).await;
        assert_eq!(fired.warnings(), 1);
        assert_eq!(fired.expiries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_fires_expiry_synchronously() {
        let (tracker, _hub) = tracker_with_hub();
        let fired = Fired::new();

        // Nothing registered yet.
        tracker.logout();

        tracker.initialize(fired.on_expiry(), fired.on_warning());
        tracker.logout();
        assert_eq!(fired.expiries(), 1);

        tracker.stop();
        tracker.logout();
        assert_eq!(fired.expiries(), 2);
        assert_eq!(fired.warnings(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hub_activity_resets_tracker() {
        let (tracker, hub) = tracker_with_hub();
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());

        advance(20 * MINUTE).await;
        assert_eq!(hub.emit(ActivityKind::Scroll), 1);
        assert_eq!(tracker.remaining_time(), 30 * MINUTE);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinitialize_replaces_callbacks() {
        let (tracker, hub) = tracker_with_hub();
        let first = Fired::new();
        let second = Fired::new();

        tracker.initialize(first.on_expiry(), first.on_warning());
        sleep(10 * MINUTE).await;
        tracker.initialize(second.on_expiry(), None);
        assert_eq!(hub.listener_count(), 1);

        sleep(30 * MINUTE + Duration::from_secs(1)).await;
        assert_eq!(first.warnings(), 0);
        assert_eq!(first.expiries(), 0);
        assert_eq!(second.warnings(), 0);
        assert_eq!(second.expiries(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_phases() {
        let (tracker, _hub) = tracker_with_hub();
        let fired = Fired::new();
        assert_eq!(tracker.snapshot().phase, SessionPhase::Stopped);

        tracker.initialize(fired.on_expiry(), fired.on_warning());
        let snapshot = tracker.snapshot();
        assert!(snapshot.armed);
        assert_eq!(snapshot.phase, SessionPhase::Active);
        assert_eq!(snapshot.remaining, "30:00");
        assert_eq!(snapshot.timeout_secs, 1800);
        assert_eq!(snapshot.warning_before_secs, 300);

        sleep(26 * MINUTE).await;
        assert_eq!(tracker.snapshot().phase, SessionPhase::Warning);

        sleep(5 * MINUTE).await;
        assert_eq!(tracker.snapshot().phase, SessionPhase::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timers() {
        let (tracker, hub) = tracker_with_hub();
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());

        drop(tracker);
        assert_eq!(hub.listener_count(), 0);

        sleep(60 * MINUTE).await;
        assert_eq!(fired.expiries(), 0);
        assert_eq!(fired.warnings(), 0);
    }

    /// Source that stops the tracker while the tracker is subscribing.
    struct StopOnSubscribe {
        hub: ActivityHub,
        tracker: Mutex<Option<SessionTracker>>,
    }

    impl ActivitySource for StopOnSubscribe {
        fn subscribe(&self, listener: crate::activity::ActivityListener) -> SubscriptionId {
            let id = self.hub.subscribe(listener);
            let tracker = self.tracker.lock().unwrap().take();
            if let Some(tracker) = tracker {
                tracker.stop();
            }
            id
        }

        fn unsubscribe(&self, id: SubscriptionId) -> bool {
            self.hub.unsubscribe(id)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_initialize_leaves_no_listener() {
        let source = Arc::new(StopOnSubscribe {
            hub: ActivityHub::new(),
            tracker: Mutex::new(None),
        });
        let dyn_source: Arc<dyn ActivitySource> = source.clone();
        let tracker = SessionTracker::new(TimeoutConfig::default(), dyn_source);
        *source.tracker.lock().unwrap() = Some(tracker.clone());

        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());

        assert!(!tracker.is_armed());
        assert_eq!(source.hub.listener_count(), 0);

        sleep(60 * MINUTE).await;
        assert_eq!(fired.expiries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_longest_timeout_arms() {
        let hub = Arc::new(ActivityHub::new());
        let config = TimeoutConfig::new(
            crate::config::MAX_TIMEOUT,
            WARNING_LEAD,
            Duration::ZERO,
        )
        .unwrap();
        let tracker = SessionTracker::new(config, hub);
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());

        let snapshot = tracker.snapshot();
        assert!(snapshot.armed);
        assert_eq!(
            snapshot.remaining_ms,
            crate::config::MAX_TIMEOUT.as_millis() as u64
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_config() {
        let hub = Arc::new(ActivityHub::new());
        let config = TimeoutConfig::new(
            Duration::from_secs(10),
            Duration::from_secs(3),
            Duration::ZERO,
        )
        .unwrap();
        let tracker = SessionTracker::new(config, hub);
        let fired = Fired::new();
        tracker.initialize(fired.on_expiry(), fired.on_warning());

        // Zero debounce accepts back-to-back signals.
        assert!(tracker.record_activity(ActivityKind::TouchStart));
        assert!(tracker.record_activity(ActivityKind::TouchStart));

        sleep(Duration::from_millis(7_500)).await;
        assert_eq!(fired.warnings(), 1);
        sleep(Duration::from_secs(3)).await;
        assert_eq!(fired.expiries(), 1);
    }
}
