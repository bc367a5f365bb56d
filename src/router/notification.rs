//! Typed notification bus for the presentation layer.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::broadcast;
use tracing::trace;

// ============================================================================
// Constants
// ============================================================================

/// Notifications buffered per subscriber before the oldest are dropped.
const BUS_CAPACITY: usize = 64;

// ============================================================================
// Notification
// ============================================================================

/// Input event forwarded from the peer to the UI.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Notification {
    /// Tap. Wire taps carry normalized viewport coordinates; legacy
    /// `EXP_TAP` lines carry none.
    Tap {
        /// Normalized `(x, y)` in `[0, 1]`.
        point: Option<(f64, f64)>,
    },
    /// Horizontal scroll by this many points.
    ScrollHorizontal(f64),
    /// Vertical scroll by this many points.
    ScrollVertical(f64),
    /// Activate whatever is gaze-hovered.
    HoverActivate,
}

// ============================================================================
// NotificationBus
// ============================================================================

/// Fan-out of [`Notification`]s to any number of subscribers.
///
/// Publishing never blocks; a subscriber that falls behind by more than
/// the bus capacity observes `RecvError::Lagged`.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<Notification>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }
}

impl NotificationBus {
    /// Publishes to current subscribers. Dropped if there are none.
    pub fn publish(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            trace!(?notification, "No subscribers");
        }
    }

    /// Subscribes to notifications published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================
