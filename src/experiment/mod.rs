//! Experiment sessions.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | Participant, goal, task and target sequence |
//! | `session` | Trial state machine |
//! | `log` | Trial results, events, summary |
//! | `export` | Hand-off of finished runs |
//! | `unintended` | Flags dwell, scroll, drift and edge mis-selections |

// ============================================================================
// Submodules
// ============================================================================

/// Experiment configuration.
pub mod config;

/// Export seam.
pub mod export;

/// Trial and event logs.
pub mod log;

/// Trial state machine.
pub mod session;

/// Unintended selection detection.
pub mod unintended;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{DEFAULT_GOAL_TRIALS, ExperimentConfig, TaskType};
pub use export::{ExportReason, ExportSink, LogExportSink, SessionReport};
pub use log::{
    EventLogEntry, EventPayload, ExperimentLog, SessionRecords, SessionSummary, Timestamp,
    TrialResult, event_payload,
};
pub use session::{ExperimentSession, StatusSink};
pub use unintended::{UnintendedKind, UnintendedSelection, UnintendedSelectionTracker};
