//! Single event context owning the router, session and focus state.
//!
//! [`Hub::run`] is the only place link state is mutated. Transport
//! callbacks arrive as [`TransportEvent`]s and UI calls arrive as commands
//! from a [`HubHandle`]; both are processed one at a time on the hub task.
//!
//! ```text
//! TransportSession ──events──►┐
//!                             ├──► Hub::run ──► ConnectivityRouter
//! HubHandle ──────commands───►┘        │
//!     ▲                                ▼
//!     └──────── watch<Snapshot> ◄──── publish
//! ```
//!
//! # Example
//!
//! ```no_run
//! use phonaze_link::{ExperimentConfig, Hub, LinkOptions};
//!
//! # async fn example() -> phonaze_link::Result<()> {
//! let (hub, handle) = Hub::builder(LinkOptions::headset())
//!     .experiment(ExperimentConfig::new("P01").with_target_sequence(["a", "b"]))
//!     .build()?;
//! tokio::spawn(hub.run());
//!
//! let addr = handle.start_advertising().await?;
//! println!("advertising on {addr}");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, trace};

use crate::error::Result;
use crate::experiment::SessionRecords;
use crate::game::{GameCommand, GameState};
use crate::identifiers::{PeerId, SessionId};
use crate::protocol::{ControlCommand, InteractionMode, Phase, WireMessage};
use crate::router::{ConnectivityRouter, Notification, NotificationBus, PeerInfo, RemoteStatus};
use crate::transport::{ConnectionState, TransportEvent, TransportSession};

use super::builder::HubBuilder;
use super::options::LinkOptions;

// ============================================================================
// Snapshot
// ============================================================================

/// Experiment counters as of the last hub step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentStatus {
    /// Current run.
    pub session_id: SessionId,
    /// Current phase.
    pub phase: Phase,
    /// 1-based index of the current trial.
    pub trial_index: u32,
    /// Current target.
    pub target_id: Option<String>,
    /// Successful trials.
    pub success_count: u32,
    /// Errors in the current trial.
    pub error_count: u32,
    /// Goal trial count.
    pub goal_trials: u32,
    /// Stable focus.
    pub focus: Option<String>,
}

/// Observable state published after every hub step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Coarse connection state.
    pub connection_state: ConnectionState,
    /// Last decoded wire message.
    pub last_wire_message: Option<WireMessage>,
    /// Last non-wire text line.
    pub last_received_line: Option<String>,
    /// What the peer announced in `hello`.
    pub peer_info: Option<PeerInfo>,
    /// Last measured round-trip time.
    pub latency: Option<Duration>,
    /// Peer's last announced interaction mode.
    pub remote_mode: Option<InteractionMode>,
    /// Mirror of the peer's session.
    pub remote_status: RemoteStatus,
    /// Local experiment, if one is attached.
    pub experiment: Option<ExperimentStatus>,
    /// Standalone select and scroll games.
    pub game: GameState,
}

impl Snapshot {
    fn capture(router: &ConnectivityRouter) -> Self {
        Self {
            connection_state: router.connection_state().clone(),
            last_wire_message: router.last_wire_message().cloned(),
            last_received_line: router.last_received_line().map(str::to_string),
            peer_info: router.peer_info().cloned(),
            latency: router.latency(),
            remote_mode: router.remote_mode(),
            remote_status: router.remote_status().clone(),
            experiment: router.session().map(|session| ExperimentStatus {
                session_id: session.session_id(),
                phase: session.phase(),
                trial_index: session.trial_index(),
                target_id: session.target_id().map(str::to_string),
                success_count: session.success_count(),
                error_count: session.error_count(),
                goal_trials: session.config().goal_trials,
                focus: session.focus().current().map(str::to_string),
            }),
            game: router.game().clone(),
        }
    }
}

// ============================================================================
// HubCommand
// ============================================================================

/// Request from a [`HubHandle`] to the hub task.
enum HubCommand {
    StartAdvertising(oneshot::Sender<Result<SocketAddr>>),
    Connect {
        address: String,
        reply: oneshot::Sender<Result<PeerId>>,
    },
    StopAdvertising,
    Disconnect,
    SendWire(WireMessage),
    SendLegacy(String),
    Control(ControlCommand),
    EnterSelect,
    SetTarget(String),
    ConfirmSelection,
    FeedFocus(Option<String>),
    ForceFocus(String),
    Game(GameCommand),
    Records(oneshot::Sender<Option<SessionRecords>>),
    Shutdown,
}

// ============================================================================
// Hub
// ============================================================================

/// Owner of all link state; drive it with [`Hub::run`].
pub struct Hub {
    transport: TransportSession,
    transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    command_rx: mpsc::UnboundedReceiver<HubCommand>,
    router: ConnectivityRouter,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("role", &self.router.local_role())
            .field("connection_state", self.router.connection_state())
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Creates a builder for a hub with these options.
    #[inline]
    #[must_use]
    pub fn builder(options: LinkOptions) -> HubBuilder {
        HubBuilder::new(options)
    }

    /// Assembles a hub and its handle from already wired parts.
    pub(crate) fn assemble(
        transport: TransportSession,
        transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
        router: ConnectivityRouter,
    ) -> (Self, HubHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::capture(&router));
        let notifications = router.notifications().clone();

        let hub = Self {
            transport,
            transport_rx,
            command_rx,
            router,
            snapshot_tx,
        };
        let handle = HubHandle {
            command_tx,
            snapshot_rx,
            notifications,
        };

        (hub, handle)
    }

    /// Processes transport events and handle commands until shut down.
    ///
    /// Returns after [`HubHandle::shutdown`] or once every handle is
    /// dropped. The transport is stopped on the way out.
    pub async fn run(mut self) {
        info!(role = %self.router.local_role(), "Hub started");

        loop {
            tokio::select! {
                event = self.transport_rx.recv() => {
                    match event {
                        Some(event) => self.router.handle_event(event),
                        None => break,
                    }
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(HubCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command),
                    }
                }
            }

            self.publish_snapshot();
        }

        self.transport.stop();
        info!("Hub stopped");
    }

    fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::StartAdvertising(reply) => {
                let transport = self.transport.clone();
                tokio::spawn(async move {
                    let _ = reply.send(transport.start_advertising().await);
                });
            }

            HubCommand::Connect { address, reply } => {
                let transport = self.transport.clone();
                tokio::spawn(async move {
                    let _ = reply.send(transport.connect(&address).await);
                });
            }

            HubCommand::StopAdvertising => self.transport.stop_advertising(),
            HubCommand::Disconnect => self.transport.disconnect(),
            HubCommand::SendWire(message) => self.router.send_wire(&message),
            HubCommand::SendLegacy(line) => self.router.send_legacy(&line),
            HubCommand::Control(command) => self.router.apply_command(command),

            HubCommand::EnterSelect => {
                if let Some(session) = self.router.session_mut() {
                    session.enter_select();
                }
            }

            HubCommand::SetTarget(target) => {
                if let Some(session) = self.router.session_mut() {
                    session.set_target(target);
                }
            }

            HubCommand::ConfirmSelection => {
                if let Some(session) = self.router.session_mut() {
                    session.confirm_selection();
                }
            }

            HubCommand::FeedFocus(candidate) => {
                if let Some(session) = self.router.session_mut() {
                    session.feed_focus(candidate.as_deref());
                }
            }

            HubCommand::ForceFocus(id) => {
                if let Some(session) = self.router.session_mut() {
                    session.force_focus(id);
                }
            }

            HubCommand::Game(command) => {
                if let Some(elapsed) = self.router.game_mut().apply_at(command, Instant::now()) {
                    debug!(elapsed_ms = elapsed.as_millis() as u64, "Game round solved locally");
                }
            }

            HubCommand::Records(reply) => {
                let _ = reply.send(self.router.session().map(|s| s.records()));
            }

            HubCommand::Shutdown => {}
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = Snapshot::capture(&self.router);
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

// ============================================================================
// HubHandle
// ============================================================================

/// UI-facing handle to a running [`Hub`].
///
/// Cheap to clone. Calls never block on the peer; after the hub stopped,
/// fire-and-forget calls are dropped and request calls fail with
/// [`crate::Error::ChannelClosed`].
#[derive(Clone)]
pub struct HubHandle {
    command_tx: mpsc::UnboundedSender<HubCommand>,
    snapshot_rx: watch::Receiver<Snapshot>,
    notifications: NotificationBus,
}

impl fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubHandle")
            .field("closed", &self.command_tx.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HubHandle - Link
// ============================================================================

impl HubHandle {
    /// Starts accepting peers and returns the listen address. Idempotent.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Io`] if the listener cannot be bound
    /// - [`crate::Error::ChannelClosed`] if the hub has stopped
    pub async fn start_advertising(&self) -> Result<SocketAddr> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::StartAdvertising(reply));
        rx.await?
    }

    /// Connects to an advertising device at `address` (`host:port` or URL).
    ///
    /// # Errors
    ///
    /// - [`crate::Error::ServiceMismatch`] if the remote serves another service
    /// - [`crate::Error::ConnectionTimeout`] if the handshake times out
    /// - [`crate::Error::ChannelClosed`] if the hub has stopped
    pub async fn connect(&self, address: impl Into<String>) -> Result<PeerId> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Connect {
            address: address.into(),
            reply,
        });
        rx.await?
    }

    /// Stops accepting new peers.
    pub fn stop_advertising(&self) {
        self.send(HubCommand::StopAdvertising);
    }

    /// Drops every connected peer.
    pub fn disconnect(&self) {
        self.send(HubCommand::Disconnect);
    }

    /// Sends a wire message to every connected peer.
    pub fn send_wire(&self, message: WireMessage) {
        self.send(HubCommand::SendWire(message));
    }

    /// Sends a legacy line to every connected peer.
    pub fn send_legacy(&self, line: impl Into<String>) {
        self.send(HubCommand::SendLegacy(line.into()));
    }
}

// ============================================================================
// HubHandle - Experiment
// ============================================================================

impl HubHandle {
    /// Begins a new run.
    pub fn start_or_continue(&self) {
        self.send(HubCommand::Control(ControlCommand::Start));
    }

    /// Advances to the next trial.
    pub fn next_trial(&self) {
        self.send(HubCommand::Control(ControlCommand::Next));
    }

    /// Resets the session to Idle.
    pub fn restart(&self) {
        self.send(HubCommand::Control(ControlCommand::Restart));
    }

    /// Cancels the run.
    pub fn cancel(&self) {
        self.send(HubCommand::Control(ControlCommand::Cancel));
    }

    /// Opens the selection view.
    pub fn enter_select(&self) {
        self.send(HubCommand::EnterSelect);
    }

    /// Supplies the current trial's target.
    pub fn set_target(&self, target: impl Into<String>) {
        self.send(HubCommand::SetTarget(target.into()));
    }

    /// Confirms the selection with the current stable focus.
    pub fn confirm_selection(&self) {
        self.send(HubCommand::ConfirmSelection);
    }

    /// Feeds a focus candidate; `None` when nothing is hovered.
    pub fn feed_focus(&self, candidate: Option<&str>) {
        self.send(HubCommand::FeedFocus(candidate.map(str::to_string)));
    }

    /// Sets the stable focus directly.
    pub fn force_focus(&self, id: impl Into<String>) {
        self.send(HubCommand::ForceFocus(id.into()));
    }

    /// Controls the standalone select and scroll games.
    pub fn game(&self, command: GameCommand) {
        self.send(HubCommand::Game(command));
    }

    /// Copies the current run's logs. `None` without an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ChannelClosed`] if the hub has stopped.
    pub async fn records(&self) -> Result<Option<SessionRecords>> {
        let (reply, rx) = oneshot::channel();
        self.send(HubCommand::Records(reply));
        Ok(rx.await?)
    }
}

// ============================================================================
// HubHandle - Observation
// ============================================================================

impl HubHandle {
    /// Subscribes to input notifications.
    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Latest published state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver notified whenever the state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }

    /// Stops the hub and its transport.
    pub fn shutdown(&self) {
        self.send(HubCommand::Shutdown);
    }

    fn send(&self, command: HubCommand) {
        if self.command_tx.send(command).is_err() {
            trace!("Hub stopped, command dropped");
        } else {
            debug!("Command queued");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
