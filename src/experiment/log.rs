//! Trial results, event log and summary metrics.

// ============================================================================
// Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::identifiers::SessionId;

use super::config::ExperimentConfig;
use super::unintended::UnintendedSelection;

// ============================================================================
// Timestamp
// ============================================================================

/// Wall-clock time in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Current wall-clock time. A clock before the epoch reads as zero.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(millis)
    }

    /// Creates a timestamp from epoch milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Epoch milliseconds.
    #[inline]
    #[must_use]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub const fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

// ============================================================================
// TrialResult
// ============================================================================

/// Outcome of one selection attempt or an abandoned trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    /// 1-based trial number.
    pub trial_index: u32,
    /// Target of the trial.
    #[serde(rename = "targetID")]
    pub target_id: String,
    /// Focused item at confirmation; `None` for an abandoned trial.
    #[serde(rename = "selectedID")]
    pub selected_id: Option<String>,
    /// Whether the selection matched the target.
    pub success: bool,
    /// Errors in this trial before this attempt.
    pub error_count: u32,
    /// Trial start.
    #[serde(rename = "startTS")]
    pub start: Timestamp,
    /// Confirmation or abandonment time.
    #[serde(rename = "endTS")]
    pub end: Timestamp,
}

impl TrialResult {
    /// Milliseconds from trial start to the end of this attempt.
    #[inline]
    #[must_use]
    pub const fn duration_millis(&self) -> u64 {
        self.end.millis_since(self.start)
    }

    /// Returns `true` for a wrong selection, `false` for a success or an
    /// abandoned trial.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        !self.success && self.selected_id.is_some()
    }
}

// ============================================================================
// EventLogEntry
// ============================================================================

/// String-keyed fields of an event.
pub type EventPayload = BTreeMap<String, String>;

/// Builds an [`EventPayload`] from literal keys.
#[must_use]
pub fn event_payload<const N: usize>(fields: [(&str, String); N]) -> EventPayload {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// One entry in the session event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogEntry {
    /// When the event happened.
    pub timestamp: Timestamp,
    /// Free-form tag, e.g. `trial_begin`.
    pub kind: String,
    /// Event fields.
    pub payload: EventPayload,
}

// ============================================================================
// ExperimentLog
// ============================================================================

/// Append-only trial and event logs of one session run.
#[derive(Debug, Clone, Default)]
pub struct ExperimentLog {
    trials: Vec<TrialResult>,
    events: Vec<EventLogEntry>,
}

impl ExperimentLog {
    /// Appends an event stamped now.
    pub fn log_event(&mut self, kind: impl Into<String>, payload: EventPayload) {
        self.events.push(EventLogEntry {
            timestamp: Timestamp::now(),
            kind: kind.into(),
            payload,
        });
    }

    /// Appends a trial result.
    pub fn log_trial(&mut self, result: TrialResult) {
        self.trials.push(result);
    }

    /// Completed trials in order.
    #[inline]
    #[must_use]
    pub fn trials(&self) -> &[TrialResult] {
        &self.trials
    }

    /// Events in order.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[EventLogEntry] {
        &self.events
    }

    /// Drops both logs.
    pub fn clear(&mut self) {
        self.trials.clear();
        self.events.clear();
    }
}

// ============================================================================
// SessionSummary
// ============================================================================

/// Aggregate metrics of one session run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Participant identifier.
    #[serde(rename = "participantID")]
    pub participant_id: String,
    /// Goal trial count.
    pub goal_trials: u32,
    /// Successful trials.
    pub success_count: u32,
    /// Wrong selections across all trials.
    pub total_errors: u32,
    /// Successes plus wrong selections.
    pub attempts: u32,
    /// `success_count / attempts`, zero without attempts.
    pub accuracy: f64,
    /// First trial start to last trial end.
    #[serde(rename = "totalDurationMS")]
    pub total_duration_ms: u64,
    /// Selections flagged as unintended.
    #[serde(default)]
    pub unintended_selections: u32,
}

impl SessionSummary {
    /// Computes the summary of `trials` under `config`.
    #[must_use]
    pub fn from_trials(config: &ExperimentConfig, trials: &[TrialResult]) -> Self {
        let success_count = trials.iter().filter(|t| t.success).count() as u32;
        let total_errors = trials.iter().filter(|t| t.is_error()).count() as u32;
        let attempts = success_count + total_errors;

        let accuracy = if attempts == 0 {
            0.0
        } else {
            f64::from(success_count) / f64::from(attempts)
        };

        let first_start = trials.iter().map(|t| t.start).min();
        let last_end = trials.iter().map(|t| t.end).max();
        let total_duration_ms = match (first_start, last_end) {
            (Some(start), Some(end)) => end.millis_since(start),
            _ => 0,
        };

        Self {
            participant_id: config.participant_id.clone(),
            goal_trials: config.goal_trials,
            success_count,
            total_errors,
            attempts,
            accuracy,
            total_duration_ms,
            unintended_selections: 0,
        }
    }

    /// Sets the unintended selection count.
    #[inline]
    #[must_use]
    pub fn with_unintended_selections(mut self, count: u32) -> Self {
        self.unintended_selections = count;
        self
    }
}

// ============================================================================
// SessionRecords
// ============================================================================

/// Owned copy of a session's logs for a persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecords {
    /// Run the records belong to.
    pub session_id: SessionId,
    /// Metrics over `trials`.
    pub summary: SessionSummary,
    /// Completed trials in order.
    pub trials: Vec<TrialResult>,
    /// Events in order.
    pub events: Vec<EventLogEntry>,
    /// Flagged selections in order.
    pub unintended: Vec<UnintendedSelection>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(index: u32, selected: Option<&str>, success: bool, start: u64, end: u64) -> TrialResult {
        TrialResult {
            trial_index: index,
            target_id: "a".to_string(),
            selected_id: selected.map(str::to_string),
            success,
            error_count: 0,
            start: Timestamp::from_millis(start),
            end: Timestamp::from_millis(end),
        }
    }

    #[test]
    fn test_duration() {
        assert_eq!(trial(1, Some("a"), true, 1_000, 1_750).duration_millis(), 750);
        assert_eq!(trial(1, Some("a"), true, 2_000, 1_000).duration_millis(), 0);
    }

    #[test]
    fn test_summary() {
        let config = ExperimentConfig::new("P01").with_goal_trials(2);
        let trials = [
            trial(1, Some("x"), false, 1_000, 1_200),
            trial(1, Some("a"), true, 1_000, 1_500),
            trial(2, Some("a"), true, 2_000, 2_400),
            trial(3, None, false, 3_000, 3_100),
        ];

        let summary = SessionSummary::from_trials(&config, &trials);

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.total_errors, 1);
        assert_eq!(summary.attempts, 3);
        assert!((summary.accuracy - 2.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_duration_ms, 2_100);
    }

    #[test]
    fn test_summary_without_trials() {
        let summary = SessionSummary::from_trials(&ExperimentConfig::new("P01"), &[]);

        assert_eq!(summary.attempts, 0);
        assert_eq!(summary.accuracy, 0.0);
        assert_eq!(summary.total_duration_ms, 0);
    }

    #[test]
    fn test_log_clear() {
        let mut log = ExperimentLog::default();
        log.log_event("session_begin", event_payload([("participant", "P01".to_string())]));
        log.log_trial(trial(1, Some("a"), true, 0, 1));

        assert_eq!(log.events()[0].payload["participant"], "P01");
        log.clear();
        assert!(log.events().is_empty());
        assert!(log.trials().is_empty());
    }

    #[test]
    fn test_trial_serde_names() {
        let json = serde_json::to_value(trial(1, Some("a"), true, 5, 9)).expect("serialize");

        assert_eq!(json["targetID"], "a");
        assert_eq!(json["selectedID"], "a");
        assert_eq!(json["startTS"], 5);
        assert_eq!(json["errorCount"], 0);
    }
}
