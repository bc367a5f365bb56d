//! Builder for hub instances.
//!
//! Validates options, then wires transport, outbound, session and router
//! together.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::experiment::{ExperimentConfig, ExperimentSession, ExportSink, LogExportSink};
use crate::focus::FocusTracker;
use crate::protocol::DeviceRole;
use crate::router::{ConnectivityRouter, Outbound};
use crate::transport::TransportSession;

use super::core::{Hub, HubHandle};
use super::options::LinkOptions;

// ============================================================================
// HubBuilder
// ============================================================================

/// Builder for a [`Hub`].
///
/// # Example
///
/// ```no_run
/// use phonaze_link::{ExperimentConfig, Hub, LinkOptions, TaskType};
///
/// # fn example() -> phonaze_link::Result<()> {
/// let (hub, handle) = Hub::builder(LinkOptions::headset())
///     .display_name("Lab Vision Pro")
///     .capability("hoverTap")
///     .experiment(ExperimentConfig::new("P07").with_task(TaskType::Media))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct HubBuilder {
    options: LinkOptions,
    experiment: Option<ExperimentConfig>,
    export: Option<Box<dyn ExportSink>>,
}

impl fmt::Debug for HubBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubBuilder")
            .field("options", &self.options)
            .field("experiment", &self.experiment)
            .field("has_export_sink", &self.export.is_some())
            .finish()
    }
}

// ============================================================================
// HubBuilder - Public API
// ============================================================================

impl HubBuilder {
    /// Creates a builder from options.
    #[must_use]
    pub fn new(options: LinkOptions) -> Self {
        Self {
            options,
            experiment: None,
            export: None,
        }
    }

    /// Builder for the headset side with default options.
    #[inline]
    #[must_use]
    pub fn headset() -> Self {
        Self::new(LinkOptions::headset())
    }

    /// Builder for the phone side with default options.
    #[inline]
    #[must_use]
    pub fn phone() -> Self {
        Self::new(LinkOptions::phone())
    }

    /// Current options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    /// Sets the display name announced to the peer.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.options = self.options.with_display_name(name);
        self
    }

    /// Sets the service identifier.
    #[must_use]
    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.options = self.options.with_service_type(service_type);
        self
    }

    /// Sets the listen address.
    #[must_use]
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.options = self.options.with_bind_addr(addr);
        self
    }

    /// Adds an announced capability.
    #[must_use]
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.options = self.options.with_capability(capability);
        self
    }

    /// Sets the focus hold time.
    #[must_use]
    pub fn focus_stable_after(mut self, stable_after: Duration) -> Self {
        self.options = self.options.with_focus_stable_after(stable_after);
        self
    }

    /// Sets the outbound handshake timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_connect_timeout(timeout);
        self
    }

    /// Attaches an experiment session. Headset only.
    #[must_use]
    pub fn experiment(mut self, config: ExperimentConfig) -> Self {
        self.experiment = Some(config);
        self
    }

    /// Sets where finished runs are exported. Defaults to the log.
    #[must_use]
    pub fn export_sink(mut self, sink: impl ExportSink + 'static) -> Self {
        self.export = Some(Box::new(sink));
        self
    }

    /// Validates the options and assembles the hub.
    ///
    /// Building does no I/O; the returned hub needs a Tokio runtime to run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the options or the experiment config
    /// are invalid, or an experiment is attached on the phone side.
    pub fn build(self) -> Result<(Hub, HubHandle)> {
        self.options.validate()?;

        if let Some(config) = &self.experiment {
            config.validate()?;
            if self.options.role != DeviceRole::VisionHeadset {
                return Err(Error::config(
                    "experiment sessions run on the headset side only",
                ));
            }
        }

        let (transport, transport_rx) = TransportSession::new(self.options.transport_config());
        let outbound = Outbound::new(Arc::new(transport.clone()));

        let mut router = ConnectivityRouter::new(self.options.role, outbound.clone())
            .with_capabilities(self.options.capabilities.clone());

        if let Some(config) = self.experiment {
            let focus = FocusTracker::new(self.options.focus_stable_after);
            let export: Box<dyn ExportSink> = match self.export {
                Some(sink) => sink,
                None => Box::new(LogExportSink),
            };
            let session =
                ExperimentSession::new(config, focus, outbound).with_boxed_export_sink(export);
            router = router.with_session(session);
        }

        debug!(
            role = %self.options.role,
            name = %self.options.display_name,
            service = %self.options.service_type,
            "Hub built"
        );

        Ok(Hub::assemble(transport, transport_rx, router))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Phase;

    #[test]
    fn test_builder_forwards_options() {
        let builder = HubBuilder::phone()
            .display_name("Lab iPhone")
            .service_type("lab-link")
            .capability("webTap")
            .connect_timeout(Duration::from_secs(3));

        let options = builder.options();
        assert_eq!(options.role, DeviceRole::Phone);
        assert_eq!(options.display_name, "Lab iPhone");
        assert_eq!(options.service_type, "lab-link");
        assert_eq!(options.capabilities, ["webTap"]);
        assert_eq!(options.connect_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_build_rejects_invalid_options() {
        let result = HubBuilder::headset().service_type("Not Valid").build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_rejects_invalid_experiment() {
        let result = HubBuilder::headset()
            .experiment(ExperimentConfig::new(""))
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_rejects_experiment_on_phone() {
        let result = HubBuilder::phone()
            .experiment(ExperimentConfig::new("P01"))
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_build_initial_snapshot() {
        let (_hub, handle) = HubBuilder::headset()
            .experiment(ExperimentConfig::new("P01").with_goal_trials(3))
            .build()
            .expect("build");

        let snapshot = handle.snapshot();
        assert!(!snapshot.connection_state.is_connected());
        let experiment = snapshot.experiment.expect("experiment attached");
        assert_eq!(experiment.phase, Phase::Idle);
        assert_eq!(experiment.goal_trials, 3);

        let (_hub, handle) = HubBuilder::phone().build().expect("build");
        assert!(handle.snapshot().experiment.is_none());
    }
}
