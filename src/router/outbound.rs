//! Best-effort outbound sends.
//!
//! [`Outbound`] never fails and never waits for a peer: with nobody
//! connected a send is a no-op, and transport errors are logged and
//! dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::experiment::StatusSink;
use crate::identifiers::PeerId;
use crate::protocol::{StatusLine, WireMessage, encode, format_legacy_status};
use crate::transport::{SendOutcome, Transport};

// ============================================================================
// Outbound
// ============================================================================

/// Shared send handle over a [`Transport`].
#[derive(Clone)]
pub struct Outbound {
    transport: Arc<dyn Transport>,
}

impl Outbound {
    /// Wraps a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Peers that can currently be addressed.
    #[must_use]
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.transport.connected_peers()
    }

    /// Sends a wire message to every connected peer.
    pub fn send_wire(&self, message: &WireMessage) {
        self.send_wire_to(&self.transport.connected_peers(), message);
    }

    /// Sends a wire message to `peers`.
    pub fn send_wire_to(&self, peers: &[PeerId], message: &WireMessage) {
        match encode(message) {
            Ok(bytes) => self.deliver(peers, bytes, message.tag()),
            Err(e) => warn!(kind = message.tag(), error = %e, "Failed to encode wire message"),
        }
    }

    /// Sends a legacy line to every connected peer.
    pub fn send_legacy(&self, line: &str) {
        self.deliver(
            &self.transport.connected_peers(),
            line.as_bytes().to_vec(),
            "legacy",
        );
    }

    fn deliver(&self, peers: &[PeerId], payload: Vec<u8>, kind: &str) {
        match self.transport.send(peers, payload) {
            Ok(SendOutcome::NoPeers) => trace!(kind, "No peer connected, send skipped"),
            Ok(SendOutcome::Queued { peers }) => trace!(kind, peers, "Send queued"),
            Err(e) if e.is_recoverable() => debug!(kind, error = %e, "Peer gone, send dropped"),
            Err(e) => warn!(kind, error = %e, "Send failed"),
        }
    }
}

impl StatusSink for Outbound {
    fn broadcast(&self, status: StatusLine) {
        self.send_legacy(&format_legacy_status(&status));
    }
}

// ============================================================================
// Tests
// ============================================================================
