//! Hub: the single owner of link state.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Hub`] | Event loop owning transport, router and session |
//! | [`HubHandle`] | Cloneable UI handle: commands and snapshots |
//! | [`HubBuilder`] | Validating builder |
//! | [`LinkOptions`] | Role, name, service, timings |
//! | [`Snapshot`] | Observable state after each step |
//!
//! # Example
//!
//! ```no_run
//! use phonaze_link::{Hub, LinkOptions, Result};
//!
//! # async fn example() -> Result<()> {
//! let (hub, phone) = Hub::builder(LinkOptions::phone()).build()?;
//! tokio::spawn(hub.run());
//!
//! phone.connect("192.168.1.20:54321").await?;
//! phone.send_legacy("EXP_CMD:START");
//!
//! let mut changes = phone.watch();
//! while changes.changed().await.is_ok() {
//!     let snapshot = changes.borrow_and_update().clone();
//!     println!("{:?}", snapshot.remote_status);
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Validating builder.
pub mod builder;

/// Hub event loop, handle and snapshot.
pub mod core;

/// Link options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{ExperimentStatus, Hub, HubHandle, Snapshot};
pub use builder::HubBuilder;
pub use options::LinkOptions;
