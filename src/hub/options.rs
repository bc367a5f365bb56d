//! Link configuration.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use phonaze_link::LinkOptions;
//!
//! let options = LinkOptions::headset()
//!     .with_display_name("Lab Vision Pro")
//!     .with_capability("hoverTap")
//!     .with_focus_stable_after(Duration::from_millis(250));
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};
use crate::focus::DEFAULT_STABLE_AFTER;
use crate::protocol::DeviceRole;
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_SERVICE_TYPE, TransportConfig};

// ============================================================================
// Constants
// ============================================================================

/// Service identifier rule: 1-15 of `[a-z0-9-]`, alphanumeric at both ends.
const SERVICE_TYPE_PATTERN: &str = r"^[a-z0-9](?:[a-z0-9-]{0,13}[a-z0-9])?$";

// ============================================================================
// LinkOptions
// ============================================================================

/// Settings of one device's end of the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// Local device role.
    pub role: DeviceRole,
    /// Name announced to the peer.
    pub display_name: String,
    /// Service identifier; both devices must agree.
    pub service_type: String,
    /// Listen address while advertising.
    pub bind_addr: SocketAddr,
    /// Feature flags announced in `hello`.
    pub capabilities: Vec<String>,
    /// Focus hold time before it counts as stable.
    pub focus_stable_after: Duration,
    /// Upper bound on an outbound handshake.
    pub connect_timeout: Duration,
}

// ============================================================================
// Constructors
// ============================================================================

impl LinkOptions {
    /// Creates options for `role` with default settings.
    #[must_use]
    pub fn new(role: DeviceRole) -> Self {
        let display_name = match role {
            DeviceRole::VisionHeadset => "Vision Pro",
            DeviceRole::Phone => "iPhone",
        };

        Self {
            role,
            display_name: display_name.to_string(),
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            capabilities: Vec::new(),
            focus_stable_after: DEFAULT_STABLE_AFTER,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Options for the headset side.
    #[inline]
    #[must_use]
    pub fn headset() -> Self {
        Self::new(DeviceRole::VisionHeadset)
    }

    /// Options for the phone side.
    #[inline]
    #[must_use]
    pub fn phone() -> Self {
        Self::new(DeviceRole::Phone)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LinkOptions {
    /// Sets the display name.
    #[inline]
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Sets the service identifier.
    #[inline]
    #[must_use]
    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = service_type.into();
        self
    }

    /// Sets the listen address.
    #[inline]
    #[must_use]
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Adds an announced capability.
    #[inline]
    #[must_use]
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Adds several announced capabilities.
    #[inline]
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Sets the focus hold time.
    #[inline]
    #[must_use]
    pub fn with_focus_stable_after(mut self, stable_after: Duration) -> Self {
        self.focus_stable_after = stable_after;
        self
    }

    /// Sets the outbound handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

// ============================================================================
// Conversion Methods
// ============================================================================

impl LinkOptions {
    /// Transport settings derived from these options.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            display_name: self.display_name.clone(),
            service_type: self.service_type.clone(),
            bind_addr: self.bind_addr,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty display name, a malformed
    /// service identifier or a zero connect timeout.
    pub fn validate(&self) -> Result<()> {
        if self.display_name.trim().is_empty() {
            return Err(Error::config("display name must not be empty"));
        }

        let pattern = Regex::new(SERVICE_TYPE_PATTERN)
            .map_err(|e| Error::config(format!("invalid service pattern: {e}")))?;
        if !pattern.is_match(&self.service_type) {
            return Err(Error::config(format!(
                "service identifier {:?} must be 1-15 characters of a-z, 0-9 or '-', \
                 starting and ending with a letter or digit",
                self.service_type
            )));
        }

        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect timeout must be greater than zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
