//! Inbound dispatch and observable link state.
//!
//! Every payload is first tried as a [`WireMessage`]; anything else that
//! is valid UTF-8 goes through the legacy line grammar. Nothing that
//! arrives from the peer can make the router fail: unknown traffic is
//! logged and dropped.
//!
//! | Inbound | Action |
//! |---------|--------|
//! | `hello` | Record peer role, version, capabilities |
//! | `ping` | Reply `pong` with the same timestamp |
//! | `pong` | Update latency |
//! | `modeSet` | Record remote mode, log `mode_switch` |
//! | `webTap` | Publish `Tap`, log `web_tap` |
//! | `webScroll` | Publish scroll per non-zero axis, log `web_scroll` |
//! | `webHoverTap` | Publish `HoverActivate`, log `web_hover_tap` |
//! | `EXP_TAP` | Publish `Tap`, confirm selection |
//! | `EXP_SCROLL_H/V` | Publish scroll, log `scroll_h` / `scroll_v` |
//! | `EXP_CMD:*` | Drive the experiment session |
//! | `EXP_STATE:*` | Update the remote status mirror |
//! | `SELECT:<x>,<y>` | Pick a panel in the select game, log `game_select` |
//! | `SCROLL_SELECT:<n>` | Start or score the scroll game, log `game_scroll` |
//! | `WEB_*` | Kept as last line for the web layer |

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::experiment::{ExperimentSession, Timestamp, event_payload};
use crate::game::{GameState, PanelHit, ScrollPick};
use crate::identifiers::PeerId;
use crate::protocol::{
    ControlCommand, DeviceRole, InteractionMode, LegacyCommand, PROTOCOL_VERSION, Phase,
    StatusLine, WireMessage, decode, parse_legacy,
};
use crate::transport::{ConnectionState, PeerIdentity, TransportEvent};

use super::notification::{Notification, NotificationBus};
use super::outbound::Outbound;

// ============================================================================
// PeerInfo
// ============================================================================

/// What the peer announced in its `hello`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    /// Peer that sent the hello.
    pub peer: PeerId,
    /// Announced role.
    pub role: DeviceRole,
    /// Announced protocol version.
    pub protocol_version: u32,
    /// Announced feature flags.
    pub capabilities: Vec<String>,
    /// Whether the version matches ours.
    pub compatible: bool,
}

// ============================================================================
// RemoteStatus
// ============================================================================

/// Mirror of the headset's session, built from `EXP_STATE:*` lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteStatus {
    /// Last announced phase.
    pub phase: Option<Phase>,
    /// Last announced target.
    pub target: Option<String>,
    /// Last announced stable focus.
    pub focus: Option<String>,
    /// Last announced `(successes, goal)`.
    pub score: Option<(u32, u32)>,
    /// Last announced error count.
    pub errors: Option<u32>,
}

impl RemoteStatus {
    /// Folds one status line into the mirror.
    pub fn apply(&mut self, status: StatusLine) {
        match status {
            StatusLine::Focus(id) => self.focus = Some(id),
            StatusLine::Target(id) => self.target = Some(id),
            StatusLine::Phase(phase) => self.phase = Some(phase),
            StatusLine::Score { successes, goal } => self.score = Some((successes, goal)),
            StatusLine::Error(count) => self.errors = Some(count),
        }
    }
}

// ============================================================================
// ConnectivityRouter
// ============================================================================

/// Bridges transport events to the protocol-aware parts of the crate.
///
/// Owned by a single task; see [`crate::hub::Hub`].
pub struct ConnectivityRouter {
    local_role: DeviceRole,
    capabilities: Vec<String>,
    outbound: Outbound,
    session: Option<ExperimentSession>,
    notifications: NotificationBus,

    connection_state: ConnectionState,
    /// Connected peers, oldest first.
    connected: Vec<PeerIdentity>,
    last_wire_message: Option<WireMessage>,
    last_received_line: Option<String>,
    peer_info: Option<PeerInfo>,
    latency: Option<Duration>,
    remote_mode: Option<InteractionMode>,
    remote_status: RemoteStatus,
    game: GameState,
}

// ============================================================================
// ConnectivityRouter - Constructor
// ============================================================================

impl ConnectivityRouter {
    /// Creates a router with no experiment attached.
    #[must_use]
    pub fn new(local_role: DeviceRole, outbound: Outbound) -> Self {
        Self {
            local_role,
            capabilities: Vec::new(),
            outbound,
            session: None,
            notifications: NotificationBus::default(),
            connection_state: ConnectionState::Disconnected,
            connected: Vec::new(),
            last_wire_message: None,
            last_received_line: None,
            peer_info: None,
            latency: None,
            remote_mode: None,
            remote_status: RemoteStatus::default(),
            game: GameState::default(),
        }
    }

    /// Sets the capabilities announced in `hello`.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Attaches an experiment session.
    #[must_use]
    pub fn with_session(mut self, session: ExperimentSession) -> Self {
        self.session = Some(session);
        self
    }
}

// ============================================================================
// ConnectivityRouter - Observables
// ============================================================================

impl ConnectivityRouter {
    /// Returns the local role.
    #[inline]
    #[must_use]
    pub fn local_role(&self) -> DeviceRole {
        self.local_role
    }

    /// Returns the coarse connection state.
    #[inline]
    #[must_use]
    pub fn connection_state(&self) -> &ConnectionState {
        &self.connection_state
    }

    /// Returns the last decoded wire message.
    #[inline]
    #[must_use]
    pub fn last_wire_message(&self) -> Option<&WireMessage> {
        self.last_wire_message.as_ref()
    }

    /// Returns the last non-wire text line received.
    #[inline]
    #[must_use]
    pub fn last_received_line(&self) -> Option<&str> {
        self.last_received_line.as_deref()
    }

    /// Returns what the current peer announced.
    #[inline]
    #[must_use]
    pub fn peer_info(&self) -> Option<&PeerInfo> {
        self.peer_info.as_ref()
    }

    /// Returns the last measured round-trip time.
    #[inline]
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Returns the peer's last announced interaction mode.
    #[inline]
    #[must_use]
    pub fn remote_mode(&self) -> Option<InteractionMode> {
        self.remote_mode
    }

    /// Returns the mirror of the peer's session.
    #[inline]
    #[must_use]
    pub fn remote_status(&self) -> &RemoteStatus {
        &self.remote_status
    }

    /// Returns the standalone game state.
    #[inline]
    #[must_use]
    pub fn game(&self) -> &GameState {
        &self.game
    }

    /// Returns the standalone game state mutably.
    #[inline]
    pub fn game_mut(&mut self) -> &mut GameState {
        &mut self.game
    }

    /// Returns the attached experiment session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<&ExperimentSession> {
        self.session.as_ref()
    }

    /// Returns the attached experiment session mutably.
    #[inline]
    pub fn session_mut(&mut self) -> Option<&mut ExperimentSession> {
        self.session.as_mut()
    }

    /// Subscribes to input notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Returns the notification bus.
    #[inline]
    #[must_use]
    pub fn notifications(&self) -> &NotificationBus {
        &self.notifications
    }
}

// ============================================================================
// ConnectivityRouter - Outbound
// ============================================================================

impl ConnectivityRouter {
    /// Sends a wire message to every connected peer.
    pub fn send_wire(&self, message: &WireMessage) {
        self.outbound.send_wire(message);
    }

    /// Sends a legacy line to every connected peer.
    pub fn send_legacy(&self, line: &str) {
        self.outbound.send_legacy(line);
    }

    /// Applies a control command to the attached session.
    pub fn apply_command(&mut self, command: ControlCommand) {
        let Some(session) = self.session.as_mut() else {
            debug!(command = command.as_str(), "No experiment attached, command dropped");
            return;
        };

        match command {
            ControlCommand::Start => session.start_or_continue(),
            ControlCommand::Next => session.next_trial(),
            ControlCommand::Restart => session.restart(),
            ControlCommand::Cancel => session.cancel(),
        }
    }
}

// ============================================================================
// ConnectivityRouter - Inbound
// ============================================================================

impl ConnectivityRouter {
    /// Handles one transport event.
    pub fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Connecting(peer) => self.on_connecting(peer),
            TransportEvent::Connected(peer) => self.on_connected(peer),
            TransportEvent::Disconnected(peer) => self.on_disconnected(peer),
            TransportEvent::DataReceived { peer, payload } => self.on_data(peer, &payload),
        }
    }

    fn on_connecting(&mut self, peer: PeerIdentity) {
        debug!(peer = %peer, "Peer connecting");
        if !self.connection_state.is_connected() {
            self.connection_state = ConnectionState::Connecting(peer);
        }
    }

    fn on_connected(&mut self, peer: PeerIdentity) {
        info!(peer = %peer, "Link up, sending handshake");

        self.connected.retain(|p| p.id != peer.id);
        self.connected.push(peer.clone());
        self.connection_state = ConnectionState::Connected(peer.clone());

        let hello = WireMessage::hello(self.local_role, self.capabilities.iter().cloned());
        self.outbound.send_wire_to(&[peer.id], &hello);
        self.outbound.send_wire_to(
            &[peer.id],
            &WireMessage::Ping {
                timestamp: Timestamp::now().as_millis(),
            },
        );
    }

    fn on_disconnected(&mut self, peer: PeerIdentity) {
        info!(peer = %peer, "Link down");
        self.connected.retain(|p| p.id != peer.id);

        if self.peer_info.as_ref().is_some_and(|info| info.peer == peer.id) {
            self.peer_info = None;
            self.latency = None;
        }

        let was_current = self
            .connection_state
            .peer()
            .is_some_and(|current| current.id == peer.id);
        if was_current {
            self.connection_state = match self.connected.last() {
                Some(other) => ConnectionState::Connected(other.clone()),
                None => ConnectionState::Disconnected,
            };
        }
    }

    fn on_data(&mut self, peer: PeerId, payload: &[u8]) {
        match decode(payload) {
            Ok(message) => self.dispatch_wire(peer, message),
            Err(e) => {
                trace!(%peer, error = %e, "Not a wire message");
                match std::str::from_utf8(payload) {
                    Ok(line) => self.dispatch_legacy(line),
                    Err(_) => debug!(%peer, len = payload.len(), "Dropped binary payload"),
                }
            }
        }
    }

    fn dispatch_wire(&mut self, peer: PeerId, message: WireMessage) {
        trace!(%peer, kind = message.tag(), "Wire message");
        self.last_wire_message = Some(message.clone());

        match message {
            WireMessage::Hello {
                role,
                protocol_version,
                capabilities,
            } => {
                let compatible = protocol_version == PROTOCOL_VERSION;
                if compatible {
                    info!(%peer, %role, ?capabilities, "Peer hello");
                } else {
                    warn!(
                        %peer,
                        %role,
                        remote = protocol_version,
                        local = PROTOCOL_VERSION,
                        "Protocol version mismatch"
                    );
                }
                self.peer_info = Some(PeerInfo {
                    peer,
                    role,
                    protocol_version,
                    capabilities,
                    compatible,
                });
            }

            WireMessage::Ping { timestamp } => {
                self.outbound
                    .send_wire_to(&[peer], &WireMessage::Pong { timestamp });
            }

            WireMessage::Pong { timestamp } => {
                let rtt = Timestamp::now().millis_since(Timestamp::from_millis(timestamp));
                debug!(%peer, rtt_ms = rtt, "Latency measured");
                self.latency = Some(Duration::from_millis(rtt));
            }

            WireMessage::ModeSet { mode } => {
                debug!(%peer, %mode, "Remote mode set");
                self.remote_mode = Some(mode);
                self.log_event("mode_switch", event_payload([("mode", mode.to_string())]));
            }

            WireMessage::WebTap {
                normalized_x,
                normalized_y,
            } => {
                self.notifications.publish(Notification::Tap {
                    point: Some((normalized_x, normalized_y)),
                });
                if let Some(session) = self.session.as_mut() {
                    session.record_tap(Some((normalized_x, normalized_y)));
                }
                self.log_event(
                    "web_tap",
                    event_payload([
                        ("x", normalized_x.to_string()),
                        ("y", normalized_y.to_string()),
                    ]),
                );
            }

            WireMessage::WebScroll { delta_x, delta_y } => {
                if delta_x != 0.0 {
                    self.notifications
                        .publish(Notification::ScrollHorizontal(delta_x));
                }
                if delta_y != 0.0 {
                    self.notifications
                        .publish(Notification::ScrollVertical(delta_y));
                }
                if let Some(session) = self.session.as_mut() {
                    session.record_scroll();
                }
                self.log_event(
                    "web_scroll",
                    event_payload([
                        ("dx", delta_x.to_string()),
                        ("dy", delta_y.to_string()),
                    ]),
                );
            }

            WireMessage::HoverTap {} => {
                self.notifications.publish(Notification::HoverActivate);
                if let Some(session) = self.session.as_mut() {
                    session.record_tap(None);
                }
                self.log_event("web_hover_tap", event_payload([]));
            }
        }
    }

    fn dispatch_legacy(&mut self, line: &str) {
        self.last_received_line = Some(line.to_string());

        match parse_legacy(line) {
            LegacyCommand::Tap => {
                self.notifications.publish(Notification::Tap { point: None });
                if let Some(session) = self.session.as_mut() {
                    session.record_tap(None);
                    session.confirm_selection();
                }
            }

            LegacyCommand::ScrollH(dx) => {
                self.notifications.publish(Notification::ScrollHorizontal(dx));
                if let Some(session) = self.session.as_mut() {
                    session.record_scroll();
                }
                self.log_event("scroll_h", event_payload([("dx", dx.to_string())]));
            }

            LegacyCommand::ScrollV(dy) => {
                self.notifications.publish(Notification::ScrollVertical(dy));
                if let Some(session) = self.session.as_mut() {
                    session.record_scroll();
                }
                self.log_event("scroll_v", event_payload([("dy", dy.to_string())]));
            }

            LegacyCommand::Cmd(command) => {
                debug!(command = command.as_str(), "Control command");
                self.apply_command(command);
            }

            LegacyCommand::Status(status) => {
                trace!(%status, "Remote status");
                self.remote_status.apply(status);
            }

            LegacyCommand::SelectPanel { x, y } => {
                let outcome = match self.game.select_normalized_at(x, y, Instant::now()) {
                    Some(PanelHit::Correct { panel, elapsed }) => {
                        format!("correct:{}:{}:{}", panel.row, panel.col, elapsed.as_millis())
                    }
                    Some(PanelHit::Wrong { panel }) => format!("wrong:{}:{}", panel.row, panel.col),
                    None => "ignored".to_string(),
                };
                debug!(x, y, %outcome, "Select game pick");
                self.log_event("game_select", event_payload([("outcome", outcome)]));
            }

            LegacyCommand::ScrollSelect(number) => {
                let outcome = match self.game.scroll_select_at(number, Instant::now()) {
                    ScrollPick::Started => "started".to_string(),
                    ScrollPick::Correct { elapsed } => format!("correct:{}", elapsed.as_millis()),
                    ScrollPick::Wrong => "wrong".to_string(),
                };
                debug!(number, %outcome, "Scroll game pick");
                self.log_event(
                    "game_scroll",
                    event_payload([("number", number.to_string()), ("outcome", outcome)]),
                );
            }

            LegacyCommand::Web(_) => {
                trace!("Web line left for the web layer");
            }

            LegacyCommand::Unknown(line) => {
                debug!(len = line.len(), "Dropped unrecognized line");
            }
        }
    }

    fn log_event(&mut self, kind: &str, payload: crate::experiment::EventPayload) {
        if let Some(session) = self.session.as_mut() {
            session.log_event(kind, payload);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::{Error, Result};
    use crate::experiment::{ExperimentConfig, StatusSink, TaskType};
    use crate::game::Panel;
    use crate::focus::FocusTracker;
    use crate::protocol::encode;
    use crate::transport::{SendOutcome, Transport};

    /// In-memory transport recording every send.
    #[derive(Default)]
    struct MockTransport {
        peers: Mutex<Vec<PeerId>>,
        sent: Mutex<Vec<(PeerId, Vec<u8>)>>,
    }

    impl MockTransport {
        fn sent_to(&self, peer: PeerId) -> Vec<Vec<u8>> {
            self.sent
                .lock()
                .iter()
                .filter(|(p, _)| *p == peer)
                .map(|(_, payload)| payload.clone())
                .collect()
        }

        fn sent_lines(&self) -> Vec<String> {
            self.sent
                .lock()
                .iter()
                .filter_map(|(_, payload)| String::from_utf8(payload.clone()).ok())
                .filter(|line| line.starts_with("EXP_"))
                .collect()
        }
    }

    impl Transport for MockTransport {
        fn connected_peers(&self) -> Vec<PeerId> {
            self.peers.lock().clone()
        }

        fn send(&self, peers: &[PeerId], payload: Vec<u8>) -> Result<SendOutcome> {
            if peers.is_empty() {
                return Ok(SendOutcome::NoPeers);
            }
            let connected = self.peers.lock();
            let mut queued = 0;
            for peer in peers.iter().filter(|p| connected.contains(p)) {
                self.sent.lock().push((*peer, payload.clone()));
                queued += 1;
            }
            if queued == 0 {
                return Err(Error::peer_not_connected(peers[0]));
            }
            Ok(SendOutcome::Queued { peers: queued })
        }
    }

    struct Fixture {
        transport: Arc<MockTransport>,
        router: ConnectivityRouter,
        peer: PeerIdentity,
    }

    fn fixture(with_session: bool) -> Fixture {
        let transport = Arc::new(MockTransport::default());
        let outbound = Outbound::new(transport.clone());
        let mut router = ConnectivityRouter::new(DeviceRole::VisionHeadset, outbound.clone())
            .with_capabilities(vec!["hoverTap".to_string()]);

        if with_session {
            let config = ExperimentConfig::new("P01")
                .with_goal_trials(3)
                .with_target_sequence(["a", "b", "c"]);
            router = router.with_session(ExperimentSession::new(
                config,
                FocusTracker::default(),
                outbound,
            ));
        }

        let peer = PeerIdentity::new(PeerId::generate(), "iPhone");
        transport.peers.lock().push(peer.id);
        router.handle_event(TransportEvent::Connecting(peer.clone()));
        router.handle_event(TransportEvent::Connected(peer.clone()));

        Fixture {
            transport,
            router,
            peer,
        }
    }

    fn data(peer: &PeerIdentity, payload: &[u8]) -> TransportEvent {
        TransportEvent::DataReceived {
            peer: peer.id,
            payload: payload.to_vec(),
        }
    }

    fn wire(peer: &PeerIdentity, message: &WireMessage) -> TransportEvent {
        data(peer, &encode(message).expect("encode"))
    }

    #[test]
    fn test_connect_sends_hello_then_ping() {
        let f = fixture(false);

        assert!(f.router.connection_state().is_connected());
        let sent: Vec<_> = f
            .transport
            .sent_to(f.peer.id)
            .iter()
            .map(|bytes| decode(bytes).expect("wire message"))
            .collect();

        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0],
            WireMessage::hello(DeviceRole::VisionHeadset, ["hoverTap"])
        );
        assert!(matches!(sent[1], WireMessage::Ping { .. }));
    }

    #[test]
    fn test_ping_is_answered_with_same_timestamp() {
        let mut f = fixture(false);
        f.transport.sent.lock().clear();

        f.router
            .handle_event(wire(&f.peer, &WireMessage::Ping { timestamp: 42 }));

        let sent = f.transport.sent_to(f.peer.id);
        assert_eq!(
            decode(&sent[0]).expect("pong"),
            WireMessage::Pong { timestamp: 42 }
        );
    }

    #[test]
    fn test_pong_updates_latency() {
        let mut f = fixture(false);
        let sent_at = Timestamp::now().as_millis().saturating_sub(15);

        f.router
            .handle_event(wire(&f.peer, &WireMessage::Pong { timestamp: sent_at }));

        assert!(f.router.latency().expect("latency") >= Duration::from_millis(15));
    }

    #[test]
    fn test_hello_records_peer_and_version_skew() {
        let mut f = fixture(false);

        f.router.handle_event(wire(
            &f.peer,
            &WireMessage::Hello {
                role: DeviceRole::Phone,
                protocol_version: PROTOCOL_VERSION + 1,
                capabilities: vec!["webScroll".to_string()],
            },
        ));

        let info = f.router.peer_info().expect("peer info");
        assert_eq!(info.role, DeviceRole::Phone);
        assert!(!info.compatible);
        assert_eq!(info.capabilities, ["webScroll"]);
        assert!(matches!(
            f.router.last_wire_message(),
            Some(WireMessage::Hello { .. })
        ));
    }

    #[tokio::test]
    async fn test_web_scroll_publishes_per_axis() {
        let mut f = fixture(true);
        let mut rx = f.router.subscribe();

        f.router.handle_event(wire(
            &f.peer,
            &WireMessage::WebScroll {
                delta_x: 0.0,
                delta_y: -8.5,
            },
        ));
        f.router
            .handle_event(wire(&f.peer, &WireMessage::HoverTap {}));

        assert_eq!(rx.recv().await.ok(), Some(Notification::ScrollVertical(-8.5)));
        assert_eq!(rx.recv().await.ok(), Some(Notification::HoverActivate));

        let kinds: Vec<_> = f
            .router
            .session()
            .expect("session")
            .events()
            .iter()
            .map(|e| e.kind.clone())
            .collect();
        assert_eq!(kinds, ["web_scroll", "web_hover_tap"]);
    }

    #[tokio::test]
    async fn test_diagonal_web_scroll_publishes_both_axes() {
        let mut f = fixture(true);
        let mut rx = f.router.subscribe();

        f.router.handle_event(wire(
            &f.peer,
            &WireMessage::WebScroll {
                delta_x: 3.0,
                delta_y: -4.5,
            },
        ));

        assert_eq!(rx.recv().await.ok(), Some(Notification::ScrollHorizontal(3.0)));
        assert_eq!(rx.recv().await.ok(), Some(Notification::ScrollVertical(-4.5)));
        assert!(rx.try_recv().is_err());

        let session = f.router.session().expect("session");
        assert_eq!(session.events().len(), 1);
        assert_eq!(session.events()[0].kind, "web_scroll");
    }

    #[tokio::test]
    async fn test_web_tap_and_mode_set() {
        let mut f = fixture(true);
        let mut rx = f.router.subscribe();

        f.router
            .handle_event(wire(&f.peer, &WireMessage::web_tap(0.25, 0.75)));
        f.router.handle_event(wire(
            &f.peer,
            &WireMessage::ModeSet {
                mode: InteractionMode::RemotePhone,
            },
        ));

        assert_eq!(
            rx.recv().await.ok(),
            Some(Notification::Tap {
                point: Some((0.25, 0.75))
            })
        );
        assert_eq!(f.router.remote_mode(), Some(InteractionMode::RemotePhone));
        let session = f.router.session().expect("session");
        assert_eq!(session.events()[1].kind, "mode_switch");
        assert_eq!(session.events()[1].payload["mode"], "remotePhone");
    }

    #[test]
    fn test_legacy_commands_drive_session() {
        let mut f = fixture(true);

        f.router.handle_event(data(&f.peer, b"EXP_CMD:START"));
        assert_eq!(
            f.router.session().map(|s| s.phase()),
            Some(Phase::Browse)
        );

        if let Some(session) = f.router.session_mut() {
            session.force_focus("a");
        }
        f.router.handle_event(data(&f.peer, b"EXP_TAP"));

        let session = f.router.session().expect("session");
        assert_eq!(session.phase(), Phase::Play);
        assert_eq!(session.success_count(), 1);
        assert!(
            f.transport
                .sent_lines()
                .contains(&"EXP_STATE:SCORE:1/3".to_string())
        );

        f.router.handle_event(data(&f.peer, b"EXP_CMD:NEXT"));
        assert_eq!(
            f.router.session().and_then(|s| s.target_id().map(str::to_string)),
            Some("b".to_string())
        );

        f.router.handle_event(data(&f.peer, b"EXP_CMD:CANCEL"));
        assert_eq!(f.router.session().map(|s| s.phase()), Some(Phase::End));
    }

    #[test]
    fn test_status_lines_update_mirror() {
        let mut f = fixture(false);

        for line in [
            "EXP_STATE:PHASE:browse",
            "EXP_STATE:TARGET:b",
            "EXP_STATE:SCORE:1/3",
            "EXP_STATE:ERROR:2",
            "EXP_STATE:FOCUS:x",
        ] {
            f.router.handle_event(data(&f.peer, line.as_bytes()));
        }

        assert_eq!(
            *f.router.remote_status(),
            RemoteStatus {
                phase: Some(Phase::Browse),
                target: Some("b".to_string()),
                focus: Some("x".to_string()),
                score: Some((1, 3)),
                errors: Some(2),
            }
        );
    }

    #[test]
    fn test_unknown_traffic_is_tolerated() {
        let mut f = fixture(true);
        f.transport.sent.lock().clear();

        f.router.handle_event(data(&f.peer, b"not json"));
        f.router.handle_event(data(&f.peer, b"WEB_NAV:https://example.org"));
        f.router.handle_event(data(&f.peer, &[0xff, 0xfe]));
        f.router
            .handle_event(data(&f.peer, br#"{"type":"teleport","payload":{}}"#));

        assert_eq!(
            f.router.last_received_line(),
            Some(r#"{"type":"teleport","payload":{}}"#)
        );
        assert!(f.router.last_wire_message().is_none());
        assert!(f.transport.sent.lock().is_empty());
        assert_eq!(f.router.session().map(|s| s.phase()), Some(Phase::Idle));
    }

    #[test]
    fn test_game_lines_drive_game_state() {
        let mut f = fixture(true);

        f.router.handle_event(data(&f.peer, b"SCROLL_SELECT:12"));
        assert_eq!(f.router.game().target_number(), Some(12));
        assert!(f.router.game().is_running(TaskType::Scroll));

        f.router.handle_event(data(&f.peer, b"SCROLL_SELECT:11"));
        assert!(f.router.game().is_running(TaskType::Scroll));

        f.router.handle_event(data(&f.peer, b"SCROLL_SELECT: 12"));
        assert!(!f.router.game().is_running(TaskType::Scroll));
        assert!(f.router.game().last_scroll_time().is_some());

        // Select picks count only inside a round started by the headset
        f.router.handle_event(data(&f.peer, b"SELECT:0.1,0.1"));
        let panel = Panel::new(3, 2).expect("panel");
        f.router.game_mut().start_select_at(panel, Instant::now());
        f.router.handle_event(data(&f.peer, b"SELECT:0.1,0.1"));
        f.router.handle_event(data(&f.peer, b"SELECT:0.6,0.8"));
        assert!(f.router.game().last_select_time().is_some());

        let session = f.router.session().expect("session");
        let outcomes: Vec<_> = session
            .events()
            .iter()
            .map(|e| (e.kind.as_str(), e.payload["outcome"].split(':').next().unwrap_or("")))
            .collect();
        assert_eq!(
            outcomes,
            [
                ("game_scroll", "started"),
                ("game_scroll", "wrong"),
                ("game_scroll", "correct"),
                ("game_select", "ignored"),
                ("game_select", "wrong"),
                ("game_select", "correct"),
            ]
        );
        assert_eq!(f.router.last_received_line(), Some("SELECT:0.6,0.8"));
    }

    #[test]
    fn test_bare_tap_is_left_as_last_line() {
        let mut f = fixture(true);
        f.router.handle_event(data(&f.peer, b"TAP"));

        assert_eq!(f.router.last_received_line(), Some("TAP"));
        assert!(f.router.session().expect("session").events().is_empty());
    }

    #[test]
    fn test_web_line_is_kept_for_web_layer() {
        let mut f = fixture(false);

        f.router
            .handle_event(data(&f.peer, b"WEB_NAV:https://example.org"));

        assert_eq!(
            f.router.last_received_line(),
            Some("WEB_NAV:https://example.org")
        );
    }

    #[test]
    fn test_disconnect_falls_back_to_other_peer() {
        let mut f = fixture(false);
        let second = PeerIdentity::new(PeerId::generate(), "iPad");
        f.transport.peers.lock().push(second.id);
        f.router
            .handle_event(TransportEvent::Connected(second.clone()));

        f.router
            .handle_event(TransportEvent::Disconnected(second.clone()));
        assert_eq!(
            *f.router.connection_state(),
            ConnectionState::Connected(f.peer.clone())
        );

        f.router
            .handle_event(TransportEvent::Disconnected(f.peer.clone()));
        assert_eq!(*f.router.connection_state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_commands_without_session_are_dropped() {
        let mut f = fixture(false);

        f.router.handle_event(data(&f.peer, b"EXP_CMD:START"));
        f.router.handle_event(data(&f.peer, b"EXP_TAP"));

        assert!(f.router.session().is_none());
    }

    #[test]
    fn test_status_sink_round_trip_through_router() {
        let f = fixture(false);
        f.transport.sent.lock().clear();

        let outbound = Outbound::new(f.transport.clone());
        outbound.broadcast(StatusLine::Phase(Phase::Play));

        assert_eq!(f.transport.sent_lines(), ["EXP_STATE:PHASE:play"]);
    }
}
