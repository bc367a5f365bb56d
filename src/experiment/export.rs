//! Hand-off of finished sessions to a persistence collaborator.
//!
//! The session never writes files. When a run completes or is cancelled it
//! passes a borrowed [`SessionReport`] to its [`ExportSink`]; a sink may
//! render CSV, JSON or anything else from it.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use tracing::info;

use crate::identifiers::SessionId;

use super::config::ExperimentConfig;
use super::log::{EventLogEntry, SessionSummary, TrialResult};
use super::unintended::UnintendedSelection;

// ============================================================================
// Types
// ============================================================================

/// Why a run was exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportReason {
    /// The goal trial count was reached.
    Completed,
    /// The run was cancelled.
    Cancelled,
}

/// Read-only view of a finished run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport<'a> {
    /// Run identifier.
    pub session_id: SessionId,
    /// Config the run used.
    pub config: &'a ExperimentConfig,
    /// Why the run ended.
    pub reason: ExportReason,
    /// Metrics over `trials`.
    pub summary: SessionSummary,
    /// Completed trials in order.
    pub trials: &'a [TrialResult],
    /// Events in order.
    pub events: &'a [EventLogEntry],
    /// Flagged selections in order.
    pub unintended: &'a [UnintendedSelection],
}

// ============================================================================
// ExportSink
// ============================================================================

/// Receives finished runs.
pub trait ExportSink: Send {
    /// Called once per completed or cancelled run.
    fn export(&mut self, report: &SessionReport<'_>);
}

impl<F> ExportSink for F
where
    F: FnMut(&SessionReport<'_>) + Send,
{
    fn export(&mut self, report: &SessionReport<'_>) {
        self(report);
    }
}

/// Sink that only logs the summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogExportSink;

impl ExportSink for LogExportSink {
    fn export(&mut self, report: &SessionReport<'_>) {
        let summary = &report.summary;
        info!(
            session_id = %report.session_id,
            participant = %summary.participant_id,
            reason = ?report.reason,
            successes = summary.success_count,
            goal = summary.goal_trials,
            errors = summary.total_errors,
            accuracy = summary.accuracy,
            duration_ms = summary.total_duration_ms,
            trials = report.trials.len(),
            events = report.events.len(),
            unintended = summary.unintended_selections,
            "Session exported"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
