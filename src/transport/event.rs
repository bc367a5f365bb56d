//! Transport-level types shared with the router.
//!
//! The transport reports everything it observes as a [`TransportEvent`]
//! over a channel; the router consumes those events on the single hub
//! task and talks back only through the [`Transport`] trait.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::Result;
use crate::identifiers::PeerId;

// ============================================================================
// PeerIdentity
// ============================================================================

/// A remote device as seen by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerIdentity {
    /// Handle used to address the peer.
    pub id: PeerId,
    /// Human-readable device name announced during the handshake.
    pub display_name: String,
}

impl PeerIdentity {
    /// Creates a new peer identity.
    #[inline]
    #[must_use]
    pub fn new(id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}

// ============================================================================
// TransportEvent
// ============================================================================

/// Notification delivered by the transport from its background tasks.
///
/// Per peer the order is always `Connecting`, `Connected`,
/// `DataReceived`*, `Disconnected`; a failed handshake skips straight from
/// `Connecting` to `Disconnected`.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A peer started the handshake.
    Connecting(PeerIdentity),
    /// Handshake finished; the peer can be addressed.
    Connected(PeerIdentity),
    /// The link to the peer is gone.
    Disconnected(PeerIdentity),
    /// One complete message from a connected peer.
    DataReceived {
        /// Sender.
        peer: PeerId,
        /// Message bytes, exactly as framed by the sender.
        payload: Vec<u8>,
    },
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Coarse connection indicator exposed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No peer.
    #[default]
    Disconnected,
    /// Handshake with this peer in progress.
    Connecting(PeerIdentity),
    /// Linked to this peer.
    Connected(PeerIdentity),
}

impl ConnectionState {
    /// Returns `true` when a peer is linked.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    /// Returns the peer of a connecting or connected state.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> Option<&PeerIdentity> {
        match self {
            Self::Disconnected => None,
            Self::Connecting(peer) | Self::Connected(peer) => Some(peer),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting(peer) => write!(f, "Connecting to {}", peer.display_name),
            Self::Connected(peer) => write!(f, "Connected to {}", peer.display_name),
        }
    }
}

// ============================================================================
// SendOutcome
// ============================================================================

/// Result of a best-effort send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The peer set was empty; nothing was sent.
    NoPeers,
    /// Payload buffered for this many peers.
    Queued {
        /// Number of peers the payload was buffered for.
        peers: usize,
    },
}

// ============================================================================
// Transport
// ============================================================================

/// Outbound seam between the router and a concrete transport.
///
/// Implementations must not block: `send` buffers and returns.
pub trait Transport: Send + Sync {
    /// Peers that can currently be addressed.
    fn connected_peers(&self) -> Vec<PeerId>;

    /// Buffers `payload` for every peer in `peers`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PeerNotConnected`] when none of the
    /// addressed peers is connected.
    fn send(&self, peers: &[PeerId], payload: Vec<u8>) -> Result<SendOutcome>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_peer() {
        let peer = PeerIdentity::new(PeerId::generate(), "iPhone");

        assert!(ConnectionState::Disconnected.peer().is_none());
        assert_eq!(
            ConnectionState::Connecting(peer.clone()).peer(),
            Some(&peer)
        );
        assert!(ConnectionState::Connected(peer.clone()).is_connected());
        assert!(!ConnectionState::Connecting(peer).is_connected());
    }

    #[test]
    fn test_connection_state_display() {
        let peer = PeerIdentity::new(PeerId::generate(), "iPhone");
        assert_eq!(
            ConnectionState::Connected(peer).to_string(),
            "Connected to iPhone"
        );
        assert_eq!(ConnectionState::default().to_string(), "Disconnected");
    }
}
