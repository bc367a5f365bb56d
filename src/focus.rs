//! Gaze/hover focus debouncing.
//!
//! [`FocusStabilizer`] is a hysteresis filter: a candidate becomes stable
//! once it has been observed continuously for at least the threshold.
//! It reports the stable id on every qualifying call.
//!
//! [`FocusTracker`] wraps it and keeps an edge-triggered "current focus"
//! that only changes when a different id becomes stable.
//!
//! | Input | Stabilizer | Tracker `current()` |
//! |-------|------------|---------------------|
//! | `None` | clears pending, returns `None` | unchanged |
//! | new id | restarts pending, returns `None` | unchanged |
//! | same id, held ≥ threshold | returns id | set to id |

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use tracing::{debug, trace};

// ============================================================================
// Constants
// ============================================================================

/// Default hold time before a candidate counts as stable.
pub const DEFAULT_STABLE_AFTER: Duration = Duration::from_millis(200);

// ============================================================================
// FocusStabilizer
// ============================================================================

/// Debounces candidate focus ids.
#[derive(Debug, Clone)]
pub struct FocusStabilizer {
    stable_after: Duration,
    /// Candidate being held and when it was first seen.
    pending: Option<(String, Instant)>,
}

impl Default for FocusStabilizer {
    fn default() -> Self {
        Self::new(DEFAULT_STABLE_AFTER)
    }
}

impl FocusStabilizer {
    /// Creates a stabilizer with the given hold time.
    #[inline]
    #[must_use]
    pub const fn new(stable_after: Duration) -> Self {
        Self {
            stable_after,
            pending: None,
        }
    }

    /// Returns the hold time.
    #[inline]
    #[must_use]
    pub const fn stable_after(&self) -> Duration {
        self.stable_after
    }

    /// Feeds a candidate observed now.
    pub fn feed(&mut self, candidate: Option<&str>) -> Option<String> {
        self.feed_at(candidate, Instant::now())
    }

    /// Feeds a candidate observed at `now`.
    ///
    /// Returns the candidate once it has been held for the threshold,
    /// `None` otherwise.
    pub fn feed_at(&mut self, candidate: Option<&str>, now: Instant) -> Option<String> {
        let Some(candidate) = candidate else {
            self.pending = None;
            return None;
        };

        match &self.pending {
            Some((pending, since)) if pending == candidate => {
                if now.saturating_duration_since(*since) >= self.stable_after {
                    Some(candidate.to_string())
                } else {
                    None
                }
            }
            _ => {
                trace!(candidate, "Focus candidate changed");
                self.pending = Some((candidate.to_string(), now));
                None
            }
        }
    }

    /// Drops any pending candidate.
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

// ============================================================================
// FocusTracker
// ============================================================================

/// Edge-triggered stable focus.
#[derive(Debug, Clone, Default)]
pub struct FocusTracker {
    stabilizer: FocusStabilizer,
    current: Option<String>,
}

impl FocusTracker {
    /// Creates a tracker with the given hold time.
    #[must_use]
    pub const fn new(stable_after: Duration) -> Self {
        Self {
            stabilizer: FocusStabilizer::new(stable_after),
            current: None,
        }
    }

    /// Current stable focus.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Feeds a candidate observed now.
    pub fn feed(&mut self, candidate: Option<&str>) -> Option<&str> {
        self.feed_at(candidate, Instant::now())
    }

    /// Feeds a candidate observed at `now`.
    ///
    /// Returns the new focus only when it differs from the previous one.
    pub fn feed_at(&mut self, candidate: Option<&str>, now: Instant) -> Option<&str> {
        let stable = self.stabilizer.feed_at(candidate, now)?;
        if self.current.as_deref() == Some(stable.as_str()) {
            return None;
        }

        debug!(focus = %stable, "Stable focus changed");
        self.current = Some(stable);
        self.current.as_deref()
    }

    /// Sets the focus directly, bypassing the debounce.
    pub fn force_set(&mut self, id: impl Into<String>) {
        self.stabilizer.reset();
        self.current = Some(id.into());
    }

    /// Drops pending state; the current focus is kept.
    pub fn reset(&mut self) {
        self.stabilizer.reset();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_becomes_stable_after_threshold() {
        let mut stabilizer = FocusStabilizer::default();
        let t0 = Instant::now();

        assert_eq!(stabilizer.feed_at(Some("p1"), t0), None);
        assert_eq!(stabilizer.feed_at(Some("p1"), t0 + ms(250)), Some("p1".to_string()));
    }

    #[test]
    fn test_not_stable_before_threshold() {
        let mut stabilizer = FocusStabilizer::default();
        let t0 = Instant::now();

        stabilizer.feed_at(Some("p1"), t0);
        assert_eq!(stabilizer.feed_at(Some("p1"), t0 + ms(199)), None);
        assert_eq!(stabilizer.feed_at(Some("p1"), t0 + ms(200)), Some("p1".to_string()));
    }

    #[test]
    fn test_stable_reported_on_every_qualifying_call() {
        let mut stabilizer = FocusStabilizer::default();
        let t0 = Instant::now();

        stabilizer.feed_at(Some("p1"), t0);
        assert!(stabilizer.feed_at(Some("p1"), t0 + ms(300)).is_some());
        assert!(stabilizer.feed_at(Some("p1"), t0 + ms(310)).is_some());
    }

    #[test]
    fn test_none_clears_pending() {
        let mut stabilizer = FocusStabilizer::default();
        let t0 = Instant::now();

        stabilizer.feed_at(Some("p1"), t0);
        assert!(stabilizer.feed_at(Some("p1"), t0 + ms(250)).is_some());
        assert_eq!(stabilizer.feed_at(None, t0 + ms(260)), None);
        assert_eq!(stabilizer.feed_at(Some("p1"), t0 + ms(270)), None);
    }

    #[test]
    fn test_reset_clears_pending() {
        let mut stabilizer = FocusStabilizer::new(ms(100));
        let t0 = Instant::now();

        stabilizer.feed_at(Some("p1"), t0);
        stabilizer.reset();
        assert_eq!(stabilizer.feed_at(Some("p1"), t0 + ms(150)), None);
    }

    #[test]
    fn test_tracker_is_edge_triggered() {
        let mut tracker = FocusTracker::default();
        let t0 = Instant::now();

        assert_eq!(tracker.feed_at(Some("a"), t0), None);
        assert_eq!(tracker.feed_at(Some("a"), t0 + ms(250)), Some("a"));
        assert_eq!(tracker.feed_at(Some("a"), t0 + ms(300)), None);
        assert_eq!(tracker.current(), Some("a"));
    }

    #[test]
    fn test_tracker_keeps_focus_on_none() {
        let mut tracker = FocusTracker::default();
        let t0 = Instant::now();

        tracker.feed_at(Some("a"), t0);
        tracker.feed_at(Some("a"), t0 + ms(250));
        tracker.feed_at(None, t0 + ms(260));
        assert_eq!(tracker.current(), Some("a"));

        tracker.feed_at(Some("b"), t0 + ms(270));
        assert_eq!(tracker.current(), Some("a"));
        assert_eq!(tracker.feed_at(Some("b"), t0 + ms(500)), Some("b"));
    }

    #[test]
    fn test_tracker_force_set_drops_pending() {
        let mut tracker = FocusTracker::default();
        let t0 = Instant::now();

        tracker.feed_at(Some("a"), t0);
        tracker.force_set("x");
        assert_eq!(tracker.current(), Some("x"));

        assert_eq!(tracker.feed_at(Some("a"), t0 + ms(250)), None);
        assert_eq!(tracker.current(), Some("x"));
    }

    proptest! {
        #[test]
        fn prop_repeated_feeds_become_stable(
            id in "[a-z]{1,8}",
            gaps in proptest::collection::vec(200u64..1_000, 1..8),
        ) {
            let mut stabilizer = FocusStabilizer::default();
            let mut now = Instant::now();
            stabilizer.feed_at(Some(&id), now);

            for gap in gaps {
                now += ms(gap);
                prop_assert_eq!(stabilizer.feed_at(Some(&id), now), Some(id.clone()));
            }
        }

        #[test]
        fn prop_fast_alternation_never_stable(
            gaps in proptest::collection::vec(0u64..200, 1..64),
        ) {
            let mut stabilizer = FocusStabilizer::default();
            let mut now = Instant::now();

            for (i, gap) in gaps.into_iter().enumerate() {
                now += ms(gap);
                let id = if i % 2 == 0 { "left" } else { "right" };
                prop_assert_eq!(stabilizer.feed_at(Some(id), now), None);
            }
        }
    }
}
