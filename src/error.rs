//! Error types for the pairing link.
//!
//! This module defines all error types used throughout the crate.
//!
//! Most failures on the link are recovered locally and never reach a
//! caller: malformed payloads fall back to the legacy grammar, sends with
//! no connected peer become no-ops, and out-of-order session commands are
//! ignored. The variants below are what the fallible building blocks
//! (codec, transport, builder) return before that recovery happens.
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Protocol | [`Error::Decode`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::PeerNotConnected`], [`Error::ServiceMismatch`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Url`], [`Error::ChannelClosed`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::PeerId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when link options or experiment configuration are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Wire message could not be decoded.
    ///
    /// Returned when bytes do not match the tagged-union schema: missing or
    /// unknown type tag, missing payload field, wrong field type, or a value
    /// outside its allowed range.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Remote end refused the upgrade with an unexpected HTTP status.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection attempt timed out.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Link closed while a command was in flight.
    #[error("Connection closed")]
    ConnectionClosed,

    /// None of the addressed peers is connected.
    #[error("Peer not connected: {peer_id}")]
    PeerNotConnected {
        /// First peer that could not be reached.
        peer_id: PeerId,
    },

    /// Remote end answered the upgrade for a different service.
    #[error("Service mismatch: expected {expected}")]
    ServiceMismatch {
        /// Service identifier this end expected.
        expected: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a peer not connected error.
    #[inline]
    pub fn peer_not_connected(peer_id: PeerId) -> Self {
        Self::PeerNotConnected { peer_id }
    }

    /// Creates a service mismatch error.
    #[inline]
    pub fn service_mismatch(expected: impl Into<String>) -> Self {
        Self::ServiceMismatch {
            expected: expected.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a decode error.
    #[inline]
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed once a peer (re)connects.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::ConnectionClosed | Self::PeerNotConnected { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::connection("upgrade rejected with HTTP 503 Service Unavailable");
        assert_eq!(
            err.to_string(),
            "Connection failed: upgrade rejected with HTTP 503 Service Unavailable"
        );
    }

    #[test]
    fn test_decode_error() {
        let err = Error::decode("unknown variant `teleport`");
        assert!(err.is_decode_error());
        assert!(!Error::connection("x").is_decode_error());
        assert_eq!(err.to_string(), "Decode error: unknown variant `teleport`");
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::peer_not_connected(PeerId::generate()).is_recoverable());
        assert!(Error::connection_timeout(5).is_recoverable());
        assert!(!Error::decode("bad").is_recoverable());
        assert!(!Error::config("bad").is_recoverable());
        assert!(!Error::connection("HTTP 503").is_recoverable());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::AddrInUse, "port busy");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_from_url_error() {
        let url_err = url::Url::parse("not a url").unwrap_err();
        let err: Error = url_err.into();
        assert!(matches!(err, Error::Url(_)));
    }
}
