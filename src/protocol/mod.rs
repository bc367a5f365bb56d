//! Message protocol carried over the pairing link.
//!
//! Two grammars share the channel:
//!
//! | Grammar | Encoding | Purpose |
//! |---------|----------|---------|
//! | [`WireMessage`] | JSON `{"type", "payload"}` envelope | Current builds |
//! | [`LegacyCommand`] | `PREFIX[:BODY]` text line | Older phone builds, status mirror |
//!
//! Inbound bytes are tried as a wire message first and fall back to the
//! legacy grammar; see [`crate::router`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `wire` | Structured envelope, codec |
//! | `legacy` | Prefix-tagged line grammar |
//! | `phase` | Experiment phase labels |

// ============================================================================
// Submodules
// ============================================================================

/// Prefix-tagged line grammar.
pub mod legacy;

/// Experiment phase labels.
pub mod phase;

/// Structured envelope and codec.
pub mod wire;

// ============================================================================
// Re-exports
// ============================================================================

pub use legacy::{ControlCommand, LegacyCommand, StatusLine, format_legacy_status, parse_legacy};
pub use phase::Phase;
pub use wire::{DeviceRole, InteractionMode, PROTOCOL_VERSION, WireMessage, decode, encode};
