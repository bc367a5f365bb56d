//! Connectivity router.
//!
//! Sits between the transport and the protocol-aware consumers:
//!
//! ```text
//! TransportEvent ──► ConnectivityRouter ──► ExperimentSession
//!                        │        │
//!                        │        └──► NotificationBus ──► UI
//!                        ▼
//!                     Outbound ──► Transport
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | Inbound dispatch, observable state |
//! | `notification` | Typed notification bus |
//! | `outbound` | Best-effort sends, status sink |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound dispatch and observable state.
pub mod core;

/// Typed notification bus.
pub mod notification;

/// Best-effort outbound sends.
pub mod outbound;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{ConnectivityRouter, PeerInfo, RemoteStatus};
pub use notification::{Notification, NotificationBus};
pub use outbound::Outbound;
