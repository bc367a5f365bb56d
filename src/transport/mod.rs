//! WebSocket pairing transport.
//!
//! Connects a visionOS headset and an iPhone on the local network. Either
//! side may advertise, connect, or both; the link is symmetric once paired.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                            ┌──────────────────┐
//! │  Headset         │                            │  Phone           │
//! │                  │        WebSocket           │                  │
//! │ TransportSession │◄──────────────────────────►│ TransportSession │
//! │  → PeerLink      │    ws://host:port/service  │  → PeerLink      │
//! └──────────────────┘                            └──────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `TransportSession::start_advertising` - Listen on the bind address
//! 2. `TransportSession::connect` - Dial the other device
//! 3. `TransportEvent::Connected` - Peer can be addressed
//! 4. `Transport::send` - Best-effort delivery
//! 5. `TransportSession::disconnect` - Drop all peers
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Events, peer identity, the `Transport` trait |
//! | `link` | Per-peer event loop |
//! | `session` | Advertise, accept, connect, send |

// ============================================================================
// Submodules
// ============================================================================

/// Events, peer identity and the outbound trait.
pub mod event;

/// Per-peer WebSocket event loop.
mod link;

/// Advertise, accept, connect and send.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{ConnectionState, PeerIdentity, SendOutcome, Transport, TransportEvent};
pub use session::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_SERVICE_TYPE, PEER_NAME_HEADER, TransportConfig,
    TransportSession,
};
