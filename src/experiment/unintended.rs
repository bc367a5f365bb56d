//! Detection of selections the participant probably did not intend.
//!
//! | Kind | Recorded when |
//! |------|---------------|
//! | `dwell_timeout` | Gaze rests on one element for [`DWELL_THRESHOLD`] or longer |
//! | `scroll_accidental` | A tap lands within [`SCROLL_TAP_WINDOW`] of a scroll |
//! | `gaze_drift` | Stable focus moves from one element to another |
//! | `edge_tap` | A tap lands within [`EDGE_MARGIN`] of the view border |
//!
//! Nothing is recorded unless tracking is on. Timing checks take an
//! explicit `Instant` so they can be driven deterministically.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::protocol::InteractionMode;

use super::log::Timestamp;

// ============================================================================
// Constants
// ============================================================================

/// Dwell on one element that counts as excessive.
pub const DWELL_THRESHOLD: Duration = Duration::from_millis(1500);

/// Taps this soon after a scroll count as accidental.
pub const SCROLL_TAP_WINDOW: Duration = Duration::from_millis(500);

/// Border band, in normalized view coordinates, where taps count as edge taps.
pub const EDGE_MARGIN: f64 = 0.05;

// ============================================================================
// Types
// ============================================================================

/// Why a selection was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnintendedKind {
    /// Gaze rested too long on one element.
    DwellTimeout,
    /// Tap right after a scroll.
    ScrollAccidental,
    /// Stable focus jumped to another element.
    GazeDrift,
    /// Tap near the view border.
    EdgeTap,
}

/// One flagged selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnintendedSelection {
    /// When it was flagged.
    pub timestamp: Timestamp,
    /// What was detected.
    #[serde(rename = "type")]
    pub kind: UnintendedKind,
    /// Element involved, if known.
    #[serde(rename = "elementID")]
    pub element_id: Option<String>,
    /// Human-readable detail.
    pub context: String,
    /// Technique in use.
    pub interaction_mode: InteractionMode,
}

/// Element currently under gaze.
#[derive(Debug, Clone)]
struct Dwell {
    element: String,
    since: Instant,
    reported: bool,
}

// ============================================================================
// UnintendedSelectionTracker
// ============================================================================

/// Collects [`UnintendedSelection`]s for one session run.
#[derive(Debug, Clone)]
pub struct UnintendedSelectionTracker {
    mode: InteractionMode,
    tracking: bool,
    records: Vec<UnintendedSelection>,
    dwell: Option<Dwell>,
    last_scroll: Option<Instant>,
}

impl UnintendedSelectionTracker {
    /// Creates an idle tracker for `mode`.
    #[must_use]
    pub fn new(mode: InteractionMode) -> Self {
        Self {
            mode,
            tracking: false,
            records: Vec::new(),
            dwell: None,
            last_scroll: None,
        }
    }

    /// Starts tracking and drops earlier records.
    pub fn start(&mut self) {
        self.tracking = true;
        self.records.clear();
        self.dwell = None;
        self.last_scroll = None;
        debug!(mode = %self.mode, "Unintended selection tracking started");
    }

    /// Stops tracking; records are kept.
    pub fn stop(&mut self) {
        if self.tracking {
            info!(count = self.records.len(), "Unintended selection tracking stopped");
        }
        self.tracking = false;
        self.dwell = None;
    }

    /// Returns `true` while tracking.
    #[inline]
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Flagged selections in order.
    #[inline]
    #[must_use]
    pub fn records(&self) -> &[UnintendedSelection] {
        &self.records
    }
}

// ============================================================================
// UnintendedSelectionTracker - Detection
// ============================================================================

impl UnintendedSelectionTracker {
    /// Notes that gaze rests on `element` at `now`.
    ///
    /// Repeating the same element keeps the original start.
    pub fn start_dwell_at(&mut self, element: &str, now: Instant) {
        if !self.tracking {
            return;
        }
        if self.dwell.as_ref().is_some_and(|d| d.element == element) {
            return;
        }
        self.dwell = Some(Dwell {
            element: element.to_string(),
            since: now,
            reported: false,
        });
    }

    /// Notes that gaze left every element.
    pub fn end_dwell(&mut self) {
        self.dwell = None;
    }

    /// Flags the current dwell once it reaches [`DWELL_THRESHOLD`].
    ///
    /// Each dwell is reported at most once.
    pub fn poll_dwell_at(&mut self, now: Instant) -> bool {
        if !self.tracking {
            return false;
        }
        let Some(dwell) = self.dwell.as_mut() else {
            return false;
        };

        let held = now.saturating_duration_since(dwell.since);
        if dwell.reported || held < DWELL_THRESHOLD {
            return false;
        }

        dwell.reported = true;
        let element = dwell.element.clone();
        self.record(
            UnintendedKind::DwellTimeout,
            Some(element),
            format!("Excessive dwell time: {:.1}s", held.as_secs_f64()),
        );
        true
    }

    /// Notes a scroll at `now`.
    pub fn record_scroll_at(&mut self, now: Instant) {
        self.last_scroll = Some(now);
    }

    /// Flags a tap that lands within [`SCROLL_TAP_WINDOW`] of the last scroll.
    pub fn check_tap_during_scroll_at(&mut self, element: Option<&str>, now: Instant) -> bool {
        if !self.tracking {
            return false;
        }
        let Some(scrolled) = self.last_scroll else {
            return false;
        };

        let since = now.saturating_duration_since(scrolled);
        if since >= SCROLL_TAP_WINDOW {
            return false;
        }

        self.record(
            UnintendedKind::ScrollAccidental,
            element.map(str::to_string),
            format!("Tap during scroll: {:.2}s after scroll", since.as_secs_f64()),
        );
        true
    }

    /// Flags a focus move between two different elements.
    pub fn check_gaze_drift(&mut self, from: Option<&str>, to: Option<&str>) -> bool {
        if !self.tracking {
            return false;
        }
        let (Some(from), Some(to)) = (from, to) else {
            return false;
        };
        if from == to {
            return false;
        }

        self.record(
            UnintendedKind::GazeDrift,
            Some(to.to_string()),
            format!("Gaze shifted from {from} to {to}"),
        );
        true
    }

    /// Flags a tap at normalized `(x, y)` inside the border band.
    pub fn check_edge_tap(&mut self, x: f64, y: f64) -> bool {
        if !self.tracking {
            return false;
        }

        let near_edge = x < EDGE_MARGIN
            || x > 1.0 - EDGE_MARGIN
            || y < EDGE_MARGIN
            || y > 1.0 - EDGE_MARGIN;
        if near_edge {
            self.record(
                UnintendedKind::EdgeTap,
                None,
                format!("Edge tap at ({x:.2}, {y:.2})"),
            );
        }
        near_edge
    }

    fn record(&mut self, kind: UnintendedKind, element_id: Option<String>, context: String) {
        debug!(?kind, element = ?element_id, %context, "Unintended selection");
        self.records.push(UnintendedSelection {
            timestamp: Timestamp::now(),
            kind,
            element_id,
            context,
            interaction_mode: self.mode,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
