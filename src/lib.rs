//! Phonaze link - Headset/phone pairing core for gaze-and-pinch studies.
//!
//! This library pairs a visionOS headset with an iPhone acting as a remote
//! controller, and runs the trial-based selection experiment on the headset.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────┐                 ┌──────────────────────┐
//! │ Headset                   │                 │ Phone                │
//! │                           │   WebSocket     │                      │
//! │ Hub ─► ConnectivityRouter │◄───────────────►│ Hub ─► Router        │
//! │          │                │  JSON + legacy  │          │           │
//! │          ▼                │     lines       │          ▼           │
//! │  ExperimentSession        │                 │  RemoteStatus mirror │
//! │   └─ FocusTracker         │                 │                      │
//! └───────────────────────────┘                 └──────────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - One event context ([`Hub::run`]) mutates all link state
//! - Two wire dialects: typed JSON envelopes and plain-text legacy lines
//! - Nothing received from the peer can fail the router
//! - Sends are best-effort; an absent peer is logged, not an error
//!
//! # Quick Start
//!
//! ```no_run
//! use phonaze_link::{ExperimentConfig, Hub, LinkOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let (hub, headset) = Hub::builder(LinkOptions::headset())
//!         .experiment(
//!             ExperimentConfig::new("P01")
//!                 .with_goal_trials(5)
//!                 .with_target_sequence(["poster-1", "poster-2", "poster-3"]),
//!         )
//!         .build()?;
//!     tokio::spawn(hub.run());
//!
//!     let addr = headset.start_advertising().await?;
//!     println!("waiting for the phone on {addr}");
//!
//!     headset.start_or_continue();
//!     headset.feed_focus(Some("poster-1"));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Peer and session ids |
//! | [`protocol`] | Wire envelopes, legacy lines, phases |
//! | [`transport`] | WebSocket pairing transport |
//! | [`router`] | Inbound dispatch, notifications, outbound |
//! | [`focus`] | Dwell-based focus stabilization |
//! | [`game`] | Standalone select and scroll games |
//! | [`experiment`] | Session state machine, logs, export |
//! | [`hub`] | Event loop, handle, builder, options |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Experiment session state machine, logs and export.
pub mod experiment;

/// Dwell-based focus stabilization.
pub mod focus;

/// Standalone select and scroll games driven by legacy lines.
pub mod game;

/// Event loop owning all link state.
///
/// Use [`Hub::builder()`] to create a configured hub.
pub mod hub;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire envelopes and legacy text lines.
pub mod protocol;

/// Inbound dispatch and outbound sends.
pub mod router;

/// WebSocket pairing transport.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Error types
pub use error::{Error, Result};

// Experiment types
pub use experiment::{
    ExperimentConfig, ExperimentSession, ExportReason, ExportSink, SessionRecords, SessionReport,
    SessionSummary, TaskType, TrialResult, UnintendedKind, UnintendedSelection,
};

// Focus types
pub use focus::{FocusStabilizer, FocusTracker};

// Game types
pub use game::{GameCommand, GameState, Panel};

// Hub types
pub use hub::{ExperimentStatus, Hub, HubBuilder, HubHandle, LinkOptions, Snapshot};

// Identifier types
pub use identifiers::{PeerId, SessionId};

// Protocol types
pub use protocol::{ControlCommand, DeviceRole, InteractionMode, Phase, StatusLine, WireMessage};

// Router types
pub use router::{ConnectivityRouter, Notification, RemoteStatus};

// Transport types
pub use transport::{ConnectionState, TransportEvent, TransportSession};
