//! Notification throttling with a per-identity cooldown window.
//!
//! The throttle is an explicitly constructed object owned by the caller,
//! with an injectable clock so tests can drive time deterministically.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Default cooldown between two notifications for the same identity.
pub const DEFAULT_COOLDOWN_SECS: u64 = 60;
/// Default short-memory window at the live-detection layer, suppressing
/// re-triggers within one multi-frame detection burst.
pub const DEFAULT_BURST_SECS: u64 = 10;

/// Time source, injectable so tests control the clock.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Person-level notify preference gate: explicit `false` suppresses, `true`
/// and unset both permit. Checked before the throttle is even consulted, so
/// an explicit `false` always wins over cooldown state.
pub fn notify_permitted(pref: Option<bool>) -> bool {
    pref != Some(false)
}

/// Deduplicates recognition events per identity within a cooldown window.
///
/// The map lives for the process lifetime and starts empty on restart.
pub struct Throttle<C: Clock = SystemClock> {
    window: Duration,
    last_notified: HashMap<String, DateTime<Utc>>,
    clock: C,
}

impl Throttle<SystemClock> {
    pub fn new(window_secs: u64) -> Self {
        Self::with_clock(window_secs, SystemClock)
    }
}

impl<C: Clock> Throttle<C> {
    pub fn with_clock(window_secs: u64, clock: C) -> Self {
        Self {
            window: Duration::seconds(window_secs as i64),
            last_notified: HashMap::new(),
            clock,
        }
    }

    /// Whether a recognition of `id` may notify right now.
    ///
    /// A `true` result does NOT start the cooldown: the caller invokes
    /// [`record_notified`](Self::record_notified) after the event actually
    /// went out, so a failed send can retry and a concurrent caller cannot
    /// race the check against the send.
    pub fn should_notify(&mut self, id: &str) -> bool {
        let now = self.clock.now();
        let decision = match self.last_notified.get(id) {
            Some(last) => now - *last >= self.window,
            None => true,
        };
        // Prune only after deciding; expiring entries must not change the
        // answer for the current call.
        self.prune(now);
        decision
    }

    /// Start the cooldown for `id`.
    pub fn record_notified(&mut self, id: &str) {
        let now = self.clock.now();
        self.last_notified.insert(id.to_string(), now);
    }

    /// Number of identities currently inside their cooldown window.
    pub fn active(&self) -> usize {
        self.last_notified.len()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        self.last_notified.retain(|_, last| now - *last < self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Clone)]
    struct ManualClock(Rc<Cell<DateTime<Utc>>>);

    impl ManualClock {
        fn start() -> Self {
            Self(Rc::new(Cell::new(Utc::now())))
        }

        fn advance_secs(&self, secs: i64) {
            self.0.set(self.0.get() + Duration::seconds(secs));
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.0.get()
        }
    }

    #[test]
    fn test_first_notification_allowed() {
        let mut throttle = Throttle::new(DEFAULT_COOLDOWN_SECS);
        assert!(throttle.should_notify("p1"));
    }

    #[test]
    fn test_true_then_false_within_window_then_true_after() {
        let clock = ManualClock::start();
        let mut throttle = Throttle::with_clock(60, clock.clone());

        assert!(throttle.should_notify("p1"));
        throttle.record_notified("p1");

        clock.advance_secs(30);
        assert!(!throttle.should_notify("p1"));

        clock.advance_secs(30);
        assert!(throttle.should_notify("p1"));
    }

    #[test]
    fn test_check_without_record_does_not_start_cooldown() {
        let clock = ManualClock::start();
        let mut throttle = Throttle::with_clock(60, clock.clone());

        assert!(throttle.should_notify("p1"));
        // Caller never sent the event; a retry is still allowed.
        assert!(throttle.should_notify("p1"));
    }

    #[test]
    fn test_identities_throttled_independently() {
        let clock = ManualClock::start();
        let mut throttle = Throttle::with_clock(60, clock.clone());

        throttle.record_notified("p1");
        assert!(!throttle.should_notify("p1"));
        assert!(throttle.should_notify("p2"));
    }

    #[test]
    fn test_expired_entries_pruned_after_decision() {
        let clock = ManualClock::start();
        let mut throttle = Throttle::with_clock(10, clock.clone());

        throttle.record_notified("p1");
        throttle.record_notified("p2");
        assert_eq!(throttle.active(), 2);

        clock.advance_secs(11);
        // Both entries are expired: the decision is true and the map is
        // purged as a side effect.
        assert!(throttle.should_notify("p1"));
        assert_eq!(throttle.active(), 0);
    }

    #[test]
    fn test_prune_keeps_live_entries() {
        let clock = ManualClock::start();
        let mut throttle = Throttle::with_clock(60, clock.clone());

        throttle.record_notified("old");
        clock.advance_secs(59);
        throttle.record_notified("fresh");
        clock.advance_secs(2); // "old" is now 61s old, "fresh" 2s

        assert!(throttle.should_notify("old"));
        assert_eq!(throttle.active(), 1);
        assert!(!throttle.should_notify("fresh"));
    }

    #[test]
    fn test_notify_permitted_tri_state() {
        assert!(notify_permitted(None));
        assert!(notify_permitted(Some(true)));
        assert!(!notify_permitted(Some(false)));
    }
}
