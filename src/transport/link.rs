//! Per-peer WebSocket link and its event loop.
//!
//! Each connected peer gets one tokio task that owns the socket and
//! handles:
//!
//! - Inbound frames, forwarded as [`TransportEvent::DataReceived`]
//! - Outbound payloads queued by [`PeerLink::send`]
//! - Close requests and remote close
//!
//! When the loop ends the peer is removed from the shared table and a
//! [`TransportEvent::Disconnected`] is emitted. A local close emits it
//! immediately instead; each link reports it exactly once.
//!
//! Writes are bounded by a timeout, so a peer that stops reading cannot
//! wedge its loop.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Notify, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::PeerId;

use super::event::{PeerIdentity, TransportEvent};

// ============================================================================
// Constants
// ============================================================================

/// Upper bound on writing one frame to a peer that stopped reading.
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on the closing handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

/// Connected peers by id.
pub(crate) type PeerTable = FxHashMap<PeerId, PeerLink>;

/// Sender half of the transport event channel.
pub(crate) type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// State shared between a link's handles and its event loop.
struct LinkShared {
    identity: PeerIdentity,
    events: EventSender,
    /// Wakes the loop out of a read or a stalled write.
    closing: Notify,
    /// Set once `Disconnected` has been emitted.
    disconnected: AtomicBool,
}

impl LinkShared {
    /// Emits `Disconnected` the first time it is called.
    fn emit_disconnected(&self) {
        if self.disconnected.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(peer = %self.identity, "Peer disconnected");
        let _ = self
            .events
            .send(TransportEvent::Disconnected(self.identity.clone()));
    }
}

// ============================================================================
// PeerLink
// ============================================================================

/// Handle to one peer's event loop.
///
/// Cloning is cheap; all clones feed the same loop.
#[derive(Clone)]
pub(crate) struct PeerLink {
    /// Outbound payloads for the event loop.
    payload_tx: mpsc::UnboundedSender<Vec<u8>>,
    shared: Arc<LinkShared>,
}

impl PeerLink {
    /// Registers a freshly upgraded socket and starts its event loop.
    ///
    /// The link is in `peers` before `Connected` is emitted, so a handler
    /// reacting to `Connected` can address the peer immediately.
    pub(crate) fn open<S>(
        identity: PeerIdentity,
        ws_stream: WebSocketStream<S>,
        peers: Arc<RwLock<PeerTable>>,
        events: EventSender,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (payload_tx, payload_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(LinkShared {
            identity: identity.clone(),
            events,
            closing: Notify::new(),
            disconnected: AtomicBool::new(false),
        });

        peers.write().insert(
            identity.id,
            Self {
                payload_tx,
                shared: Arc::clone(&shared),
            },
        );

        info!(peer = %identity, "Peer connected");
        let _ = shared.events.send(TransportEvent::Connected(identity));

        tokio::spawn(Self::run_event_loop(ws_stream, payload_rx, peers, shared));
    }

    /// Queues one message for the peer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the loop has already ended.
    pub(crate) fn send(&self, payload: Vec<u8>) -> Result<()> {
        self.payload_tx
            .send(payload)
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Closes the link and emits `Disconnected` right away.
    ///
    /// Queued payloads are dropped. The socket is shut down in the
    /// background, even if a write to the peer is stalled.
    pub(crate) fn close(&self) {
        self.shared.closing.notify_one();
        self.shared.emit_disconnected();
    }

    /// Event loop that handles WebSocket I/O for one peer.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut payload_rx: mpsc::UnboundedReceiver<Vec<u8>>,
        peers: Arc<RwLock<PeerTable>>,
        shared: Arc<LinkShared>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();
        let peer = shared.identity.id;

        loop {
            tokio::select! {
                biased;

                () = shared.closing.notified() => {
                    debug!(%peer, "Closing link");
                    break;
                }

                // Incoming frames from the peer
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(%peer, len = text.len(), "Text frame received");
                            let _ = shared.events.send(TransportEvent::DataReceived {
                                peer,
                                payload: text.as_bytes().to_vec(),
                            });
                        }

                        Some(Ok(Message::Binary(data))) => {
                            trace!(%peer, len = data.len(), "Binary frame received");
                            let _ = shared.events.send(TransportEvent::DataReceived {
                                peer,
                                payload: data.to_vec(),
                            });
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!(%peer, "WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            warn!(%peer, error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!(%peer, "WebSocket stream ended");
                            break;
                        }

                        // Ping/Pong are answered by tungstenite
                        _ => {}
                    }
                }

                // Payloads from the session
                payload = payload_rx.recv() => {
                    let Some(payload) = payload else {
                        debug!(%peer, "All link handles dropped");
                        break;
                    };

                    let written = tokio::select! {
                        biased;

                        () = shared.closing.notified() => {
                            debug!(%peer, "Closing link during write");
                            break;
                        }

                        written = timeout(WRITE_TIMEOUT, ws_write.send(frame(payload))) => written,
                    };

                    match written {
                        Ok(Ok(())) => trace!(%peer, "Frame sent"),

                        Ok(Err(e)) => {
                            warn!(%peer, error = %e, "Failed to write frame");
                            break;
                        }

                        Err(_) => {
                            warn!(%peer, timeout_ms = WRITE_TIMEOUT.as_millis() as u64, "Frame write timed out");
                            break;
                        }
                    }
                }
            }
        }

        if timeout(CLOSE_TIMEOUT, ws_write.close()).await.is_err() {
            debug!(%peer, "Close handshake timed out");
        }

        peers.write().remove(&peer);
        shared.emit_disconnected();
    }
}

/// Text frame for UTF-8 payloads, binary otherwise.
fn frame(payload: Vec<u8>) -> Message {
    match String::from_utf8(payload) {
        Ok(text) => Message::Text(text.into()),
        Err(e) => Message::Binary(e.into_bytes().into()),
    }
}

// ============================================================================
// Tests
// ============================================================================
