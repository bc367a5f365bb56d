//! Peer discovery, pairing and best-effort delivery.
//!
//! A [`TransportSession`] can advertise (listen for WebSocket upgrades on
//! `/<service>`) and connect (dial another device's advertised address)
//! at the same time. Every upgrade request on the right path is accepted
//! without user confirmation.
//!
//! # Handshake
//!
//! ```text
//! Initiator                                   Acceptor
//!    │  GET /<service>?name=<display name>       │
//!    │ ─────────────────────────────────────────►│  Connecting
//!    │  101 Switching Protocols                   │
//!    │  x-peer-name: <display name>               │
//!    │ ◄─────────────────────────────────────────│  Connected
//!    │  Connected                                 │
//! ```
//!
//! Any other path is answered with `404 Not Found`, which the initiator
//! reports as [`Error::ServiceMismatch`]. Any other non-101 answer is an
//! [`Error::Connection`].
//!
//! Both directions share `connect_timeout`: an inbound upgrade that does
//! not finish in time is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use tokio_tungstenite::{accept_hdr_async, connect_async};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::PeerId;

use super::event::{PeerIdentity, SendOutcome, Transport, TransportEvent};
use super::link::{EventSender, PeerLink, PeerTable};

// ============================================================================
// Constants
// ============================================================================

/// Response header carrying the acceptor's display name.
pub const PEER_NAME_HEADER: &str = "x-peer-name";

/// Query parameter carrying the initiator's display name.
const NAME_QUERY_KEY: &str = "name";

/// Default listen address: all interfaces, ephemeral port.
const DEFAULT_BIND_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

/// Default service identifier shared by both devices.
pub const DEFAULT_SERVICE_TYPE: &str = "phonaze-service";

/// Default handshake timeout for connects and inbound upgrades.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// First pause after a failed accept.
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(100);

/// Longest pause between failing accepts.
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

// ============================================================================
// TransportConfig
// ============================================================================

/// Settings for a [`TransportSession`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Name announced to peers.
    pub display_name: String,
    /// Service identifier; both sides must agree.
    pub service_type: String,
    /// Listen address used by [`TransportSession::start_advertising`].
    pub bind_addr: SocketAddr,
    /// Upper bound on a handshake, outbound or inbound.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            display_name: "phonaze-device".to_string(),
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            bind_addr: DEFAULT_BIND_ADDR,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

// ============================================================================
// TransportSession
// ============================================================================

/// WebSocket pairing session.
///
/// Cheap to clone; clones share the peer table and the advertiser.
/// Events are delivered on the receiver returned by [`TransportSession::new`].
///
/// # Example
///
/// ```ignore
/// let (session, mut events) = TransportSession::new(TransportConfig::default());
/// let addr = session.start_advertising().await?;
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// ```
#[derive(Clone)]
pub struct TransportSession {
    inner: Arc<SessionInner>,
}

/// Shared state behind a [`TransportSession`].
struct SessionInner {
    /// Static settings.
    config: TransportConfig,
    /// Connected peers by id.
    peers: Arc<RwLock<PeerTable>>,
    /// Running accept loop, if advertising.
    advertiser: Mutex<Option<Advertiser>>,
    /// Event channel to the owner.
    events: EventSender,
}

/// Handle to a running accept loop.
struct Advertiser {
    /// Address the listener is bound to.
    local_addr: SocketAddr,
    /// Dropping or firing stops the accept loop.
    shutdown_tx: oneshot::Sender<()>,
}

// ============================================================================
// TransportSession - Constructor
// ============================================================================

impl TransportSession {
    /// Creates an idle session and the receiver for its events.
    #[must_use]
    pub fn new(config: TransportConfig) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, event_rx) = mpsc::unbounded_channel();

        let session = Self {
            inner: Arc::new(SessionInner {
                config,
                peers: Arc::new(RwLock::new(FxHashMap::default())),
                advertiser: Mutex::new(None),
                events,
            }),
        };

        (session, event_rx)
    }
}

// ============================================================================
// TransportSession - Public API
// ============================================================================

impl TransportSession {
    /// Returns the configured display name.
    #[inline]
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.inner.config.display_name
    }

    /// Returns the configured service identifier.
    #[inline]
    #[must_use]
    pub fn service_type(&self) -> &str {
        &self.inner.config.service_type
    }

    /// Returns the listen address while advertising.
    #[must_use]
    pub fn advertising_addr(&self) -> Option<SocketAddr> {
        self.inner.advertiser.lock().as_ref().map(|a| a.local_addr)
    }

    /// Returns the number of connected peers.
    #[inline]
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.inner.peers.read().len()
    }

    /// Starts accepting peers. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the listener cannot be bound.
    pub async fn start_advertising(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.advertising_addr() {
            return Ok(addr);
        }

        let listener = TcpListener::bind(self.inner.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        {
            let mut advertiser = self.inner.advertiser.lock();
            // A concurrent call won the race; keep its listener
            if let Some(existing) = advertiser.as_ref() {
                return Ok(existing.local_addr);
            }
            *advertiser = Some(Advertiser {
                local_addr,
                shutdown_tx,
            });
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.accept_loop(listener, shutdown_rx).await;
        });

        info!(
            %local_addr,
            service = %self.inner.config.service_type,
            "Advertising started"
        );
        Ok(local_addr)
    }

    /// Stops accepting new peers. Existing peers stay connected. Idempotent.
    pub fn stop_advertising(&self) {
        let advertiser = self.inner.advertiser.lock().take();
        if let Some(advertiser) = advertiser {
            let _ = advertiser.shutdown_tx.send(());
            info!(local_addr = %advertiser.local_addr, "Advertising stopped");
        }
    }

    /// Drops every connected peer. Idempotent.
    ///
    /// Peers leave the table and their `Disconnected` events are emitted
    /// before this returns. Sockets are shut down in the background.
    pub fn disconnect(&self) {
        let links: Vec<_> = {
            let mut peers = self.inner.peers.write();
            peers.drain().collect()
        };

        for (peer, link) in links {
            link.close();
            debug!(%peer, "Link close requested");
        }
    }

    /// Stops advertising and drops every peer. Idempotent.
    pub fn stop(&self) {
        self.stop_advertising();
        self.disconnect();
    }

    /// Dials an advertising device.
    ///
    /// `address` is `host:port` or a `ws://` URL; the service path and
    /// the display name query are filled in.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if `address` is not a valid address
    /// - [`Error::ServiceMismatch`] if the remote serves another service
    /// - [`Error::Connection`] if the remote answers the upgrade with another HTTP status
    /// - [`Error::ConnectionTimeout`] if the handshake does not finish in time
    /// - [`Error::WebSocket`] for any other handshake failure
    pub async fn connect(&self, address: &str) -> Result<PeerId> {
        let url = self.peer_url(address)?;
        let peer_id = PeerId::generate();
        let pending = PeerIdentity::new(peer_id, address);
        let connect_timeout = self.inner.config.connect_timeout;

        debug!(%url, "Connecting to peer");
        let _ = self
            .inner
            .events
            .send(TransportEvent::Connecting(pending.clone()));

        let (ws_stream, response) = match timeout(connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok(pair)) => pair,

            Ok(Err(e)) => {
                let _ = self.inner.events.send(TransportEvent::Disconnected(pending));
                return Err(self.map_connect_error(e));
            }

            Err(_) => {
                let _ = self.inner.events.send(TransportEvent::Disconnected(pending));
                return Err(Error::connection_timeout(connect_timeout.as_millis() as u64));
            }
        };

        let display_name = response
            .headers()
            .get(PEER_NAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| urlencoding::decode(value).ok())
            .map(Cow::into_owned)
            .filter(|name| !name.is_empty())
            .unwrap_or(pending.display_name);

        PeerLink::open(
            PeerIdentity::new(peer_id, display_name),
            ws_stream,
            Arc::clone(&self.inner.peers),
            self.inner.events.clone(),
        );

        Ok(peer_id)
    }
}

// ============================================================================
// TransportSession - Internal
// ============================================================================

impl TransportSession {
    /// Builds `ws://host:port/<service>?name=<display name>`.
    fn peer_url(&self, address: &str) -> Result<Url> {
        let base = if address.contains("://") {
            Cow::Borrowed(address)
        } else {
            Cow::Owned(format!("ws://{address}"))
        };

        let mut url = Url::parse(&base)?;
        url.set_path(&self.inner.config.service_type);
        url.query_pairs_mut()
            .clear()
            .append_pair(NAME_QUERY_KEY, &self.inner.config.display_name);

        Ok(url)
    }

    /// Maps a handshake failure to a crate error.
    fn map_connect_error(&self, e: WsError) -> Error {
        match e {
            WsError::Http(response) if response.status() == StatusCode::NOT_FOUND => {
                Error::service_mismatch(&self.inner.config.service_type)
            }
            WsError::Http(response) => {
                Error::connection(format!("upgrade rejected with HTTP {}", response.status()))
            }
            other => Error::from(other),
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

impl Transport for TransportSession {
    fn connected_peers(&self) -> Vec<PeerId> {
        self.inner.peers.read().keys().copied().collect()
    }

    fn send(&self, peers: &[PeerId], payload: Vec<u8>) -> Result<SendOutcome> {
        if peers.is_empty() {
            return Ok(SendOutcome::NoPeers);
        }

        let table = self.inner.peers.read();
        let mut queued = 0;
        let mut missing = None;

        for peer in peers {
            match table.get(peer) {
                Some(link) if link.send(payload.clone()).is_ok() => queued += 1,
                _ => {
                    missing.get_or_insert(*peer);
                }
            }
        }

        match missing {
            Some(peer) if queued == 0 => Err(Error::peer_not_connected(peer)),
            _ => Ok(SendOutcome::Queued { peers: queued }),
        }
    }
}

// ============================================================================
// SessionInner - Accept Loop
// ============================================================================

impl SessionInner {
    /// Background task that accepts new peers until shut down.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener, mut shutdown_rx: oneshot::Receiver<()>) {
        debug!("Accept loop started");
        let mut failures = 0u32;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("Accept loop shutting down");
                    break;
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            failures = 0;
                            let inner = Arc::clone(&self);
                            tokio::spawn(async move {
                                inner.accept_peer(stream, addr).await;
                            });
                        }

                        Err(e) => {
                            let pause = accept_backoff(failures);
                            failures = failures.saturating_add(1);
                            error!(error = %e, pause_ms = pause.as_millis() as u64, "Accept failed");

                            tokio::select! {
                                _ = &mut shutdown_rx => {
                                    debug!("Accept loop shutting down");
                                    break;
                                }
                                () = tokio::time::sleep(pause) => {}
                            }
                        }
                    }
                }
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades one TCP connection and registers the peer.
    async fn accept_peer(&self, stream: TcpStream, addr: SocketAddr) {
        debug!(?addr, "New TCP connection");

        let peer_id = PeerId::generate();
        let service_path = format!("/{}", self.config.service_type);
        let mut announced: Option<PeerIdentity> = None;

        let callback = |request: &Request, mut response: Response| {
            if request.uri().path() != service_path {
                warn!(?addr, path = request.uri().path(), "Upgrade for unknown service rejected");
                return Err(reject(StatusCode::NOT_FOUND, "unknown service"));
            }

            let display_name = request
                .uri()
                .query()
                .and_then(name_from_query)
                .unwrap_or_else(|| addr.to_string());
            let identity = PeerIdentity::new(peer_id, display_name);

            debug!(peer = %identity, "Invitation accepted");
            let _ = self.events.send(TransportEvent::Connecting(identity.clone()));

            let encoded = urlencoding::encode(&self.config.display_name);
            if let Ok(value) = HeaderValue::from_str(&encoded) {
                response.headers_mut().insert(PEER_NAME_HEADER, value);
            }

            announced = Some(identity);
            Ok(response)
        };

        let upgraded = timeout(self.config.connect_timeout, accept_hdr_async(stream, callback)).await;
        let upgraded = match upgraded {
            Ok(upgraded) => upgraded,

            Err(_) => {
                warn!(
                    ?addr,
                    timeout_ms = self.config.connect_timeout.as_millis() as u64,
                    "WebSocket upgrade timed out"
                );
                if let Some(identity) = announced {
                    let _ = self.events.send(TransportEvent::Disconnected(identity));
                }
                return;
            }
        };

        match (upgraded, announced) {
            (Ok(ws_stream), Some(identity)) => {
                PeerLink::open(identity, ws_stream, Arc::clone(&self.peers), self.events.clone());
            }

            (Ok(_), None) => {
                warn!(?addr, "Upgrade finished without an identity");
            }

            (Err(e), announced) => {
                warn!(error = %e, ?addr, "WebSocket upgrade failed");
                if let Some(identity) = announced {
                    let _ = self.events.send(TransportEvent::Disconnected(identity));
                }
            }
        }
    }
}

/// Pause after `failures` consecutive accept errors, doubling up to a cap.
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_MIN
        .saturating_mul(1 << failures.min(4))
        .min(ACCEPT_BACKOFF_MAX)
}

/// Extracts a non-empty `name` from a query string.
fn name_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == NAME_QUERY_KEY)
        .map(|(_, value)| value.into_owned())
        .filter(|name| !name.is_empty())
}

/// Builds an upgrade rejection.
fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

// ============================================================================
// Tests
// ============================================================================
