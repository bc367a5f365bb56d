//! Experiment session state machine.
//!
//! Drives a multi-trial run: phase transitions, target selection, scoring
//! and event logging. Every operation has a set of phases it is valid in;
//! outside that set it does nothing. Duplicate or out-of-order control
//! messages from the phone therefore cannot corrupt the run.
//!
//! | Operation | Valid in | Ends in |
//! |-----------|----------|---------|
//! | `start_or_continue` | Idle, End | Browse (or End if goal is reached) |
//! | `next_trial` | Ready, Browse, Select, Play | Browse, or End at goal |
//! | `enter_select` | Browse | Select |
//! | `set_target` | Browse, Select | unchanged |
//! | `confirm_selection` | Browse, Select | Play on match, unchanged otherwise |
//! | `restart` | any | Idle |
//! | `cancel` | any | End |
//!
//! Status changes are mirrored to the peer through a [`StatusSink`].
//!
//! While a run is active, focus, taps and scrolls also feed an
//! [`UnintendedSelectionTracker`]. A stable focus leaving the current
//! target for another element counts as gaze drift.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use tracing::{debug, info};

use crate::focus::FocusTracker;
use crate::identifiers::SessionId;
use crate::protocol::{Phase, StatusLine};

use super::config::ExperimentConfig;
use super::export::{ExportReason, ExportSink, LogExportSink, SessionReport};
use super::log::{
    EventLogEntry, EventPayload, ExperimentLog, SessionRecords, SessionSummary, Timestamp,
    TrialResult, event_payload,
};
use super::unintended::{UnintendedSelection, UnintendedSelectionTracker};

// ============================================================================
// StatusSink
// ============================================================================

/// Outbound mirror of session state.
pub trait StatusSink: Send {
    /// Broadcasts one status change to the peer. Never blocks or fails.
    fn broadcast(&self, status: StatusLine);
}

// ============================================================================
// ExperimentSession
// ============================================================================

/// One participant's experiment.
pub struct ExperimentSession {
    config: ExperimentConfig,
    session_id: SessionId,
    phase: Phase,
    /// Trials drawn so far in this run (1-based index of the current one).
    trial_index: u32,
    target_id: Option<String>,
    success_count: u32,
    /// Errors in the current trial.
    error_count: u32,
    trial_start: Option<Timestamp>,
    focus: FocusTracker,
    log: ExperimentLog,
    unintended: UnintendedSelectionTracker,
    status: Box<dyn StatusSink>,
    export: Box<dyn ExportSink>,
}

impl std::fmt::Debug for ExperimentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentSession")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase)
            .field("trial_index", &self.trial_index)
            .field("target_id", &self.target_id)
            .field("success_count", &self.success_count)
            .field("error_count", &self.error_count)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ExperimentSession - Constructor
// ============================================================================

impl ExperimentSession {
    /// Creates an idle session that exports through [`LogExportSink`].
    pub fn new(config: ExperimentConfig, focus: FocusTracker, status: impl StatusSink + 'static) -> Self {
        let unintended = UnintendedSelectionTracker::new(config.interaction_mode);
        Self {
            config,
            session_id: SessionId::generate(),
            phase: Phase::Idle,
            trial_index: 0,
            target_id: None,
            success_count: 0,
            error_count: 0,
            trial_start: None,
            focus,
            log: ExperimentLog::default(),
            unintended,
            status: Box::new(status),
            export: Box::new(LogExportSink),
        }
    }

    /// Replaces the export sink.
    #[must_use]
    pub fn with_export_sink(self, sink: impl ExportSink + 'static) -> Self {
        self.with_boxed_export_sink(Box::new(sink))
    }

    /// Replaces the export sink with an already boxed one.
    #[must_use]
    pub fn with_boxed_export_sink(mut self, sink: Box<dyn ExportSink>) -> Self {
        self.export = sink;
        self
    }
}

// ============================================================================
// ExperimentSession - Accessors
// ============================================================================

impl ExperimentSession {
    /// Returns the config.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Returns the id of the current run.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns the current phase.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the 1-based index of the current trial, 0 before the first.
    #[inline]
    #[must_use]
    pub fn trial_index(&self) -> u32 {
        self.trial_index
    }

    /// Returns the current target.
    #[inline]
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.target_id.as_deref()
    }

    /// Returns the number of successful trials.
    #[inline]
    #[must_use]
    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// Returns the number of errors in the current trial.
    #[inline]
    #[must_use]
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Returns the stable focus used for confirmation.
    #[inline]
    #[must_use]
    pub fn focus(&self) -> &FocusTracker {
        &self.focus
    }

    /// Completed trials of the current run.
    #[inline]
    #[must_use]
    pub fn trials(&self) -> &[TrialResult] {
        self.log.trials()
    }

    /// Events of the current run.
    #[inline]
    #[must_use]
    pub fn events(&self) -> &[EventLogEntry] {
        self.log.events()
    }

    /// Selections flagged as unintended in the current run.
    #[inline]
    #[must_use]
    pub fn unintended(&self) -> &[UnintendedSelection] {
        self.unintended.records()
    }

    /// Metrics of the current run.
    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_trials(&self.config, self.log.trials())
            .with_unintended_selections(self.unintended.records().len() as u32)
    }

    /// Owned copy of the current run's logs.
    #[must_use]
    pub fn records(&self) -> SessionRecords {
        SessionRecords {
            session_id: self.session_id,
            summary: self.summary(),
            trials: self.log.trials().to_vec(),
            events: self.log.events().to_vec(),
            unintended: self.unintended.records().to_vec(),
        }
    }
}

// ============================================================================
// ExperimentSession - Flow Control
// ============================================================================

impl ExperimentSession {
    /// Begins a new run and draws the first trial.
    pub fn start_or_continue(&mut self) {
        if !matches!(self.phase, Phase::Idle | Phase::End) {
            debug!(phase = %self.phase, "start ignored");
            return;
        }

        self.session_id = SessionId::generate();
        self.log.clear();
        self.unintended.start();
        self.success_count = 0;
        self.error_count = 0;
        self.trial_index = 0;
        self.target_id = None;
        self.trial_start = None;

        info!(
            session_id = %self.session_id,
            participant = %self.config.participant_id,
            goal = self.config.goal_trials,
            "Session started"
        );
        self.log_event(
            "session_begin",
            event_payload([
                ("session_id", self.session_id.to_string()),
                ("participant", self.config.participant_id.clone()),
                ("goal", self.config.goal_trials.to_string()),
                ("task", self.config.task.to_string()),
                ("mode", self.config.interaction_mode.to_string()),
                ("platform", self.config.platform.clone()),
            ]),
        );

        self.set_phase(Phase::Ready);
        self.next_trial();
    }

    /// Draws the next trial, or finishes the run once the goal is met.
    pub fn next_trial(&mut self) {
        if !matches!(
            self.phase,
            Phase::Ready | Phase::Browse | Phase::Select | Phase::Play
        ) {
            debug!(phase = %self.phase, "next trial ignored");
            return;
        }

        if self.success_count >= self.config.goal_trials {
            self.finish();
            return;
        }

        self.target_id = self.config.target_for(self.trial_index).map(str::to_string);
        self.trial_index += 1;
        self.error_count = 0;
        self.trial_start = Some(Timestamp::now());

        debug!(trial = self.trial_index, target = ?self.target_id, "Trial begins");
        self.log_event(
            "trial_begin",
            event_payload([
                ("trial", self.trial_index.to_string()),
                ("target", self.target_id.clone().unwrap_or_default()),
            ]),
        );

        self.set_phase(Phase::Browse);
        if let Some(target) = &self.target_id {
            self.status.broadcast(StatusLine::Target(target.clone()));
        }
    }

    /// Opens the selection view of the current trial.
    pub fn enter_select(&mut self) {
        if self.phase != Phase::Browse {
            debug!(phase = %self.phase, "enter select ignored");
            return;
        }

        self.log_event(
            "select_begin",
            event_payload([("trial", self.trial_index.to_string())]),
        );
        self.set_phase(Phase::Select);
    }

    /// Supplies the target of the current trial from outside.
    pub fn set_target(&mut self, target_id: impl Into<String>) {
        if !self.phase.is_selecting() {
            debug!(phase = %self.phase, "set target ignored");
            return;
        }

        let target_id = target_id.into();
        self.log_event(
            "target_set",
            event_payload([
                ("trial", self.trial_index.to_string()),
                ("target", target_id.clone()),
            ]),
        );
        self.target_id = Some(target_id.clone());
        self.status.broadcast(StatusLine::Target(target_id));
    }

    /// Compares the stable focus with the target and scores the attempt.
    pub fn confirm_selection(&mut self) {
        if !self.phase.is_selecting() {
            self.log_event(
                "trial_select_ignored",
                event_payload([
                    ("reason", "phase".to_string()),
                    ("phase", self.phase.to_string()),
                ]),
            );
            return;
        }

        let (target, selected, start) = match (
            self.target_id.clone(),
            self.focus.current().map(str::to_string),
            self.trial_start,
        ) {
            (Some(target), Some(selected), Some(start)) => (target, selected, start),
            (target, selected, _) => {
                let reason = if target.is_none() {
                    "no_target"
                } else if selected.is_none() {
                    "no_focus"
                } else {
                    "no_start"
                };
                self.log_event(
                    "trial_select_ignored",
                    event_payload([
                        ("reason", reason.to_string()),
                        ("trial", self.trial_index.to_string()),
                    ]),
                );
                return;
            }
        };

        let success = target == selected;
        let result = TrialResult {
            trial_index: self.trial_index,
            target_id: target.clone(),
            selected_id: Some(selected.clone()),
            success,
            error_count: self.error_count,
            start,
            end: Timestamp::now(),
        };
        let duration_ms = result.duration_millis();
        self.log.log_trial(result);

        if success {
            self.success_count += 1;
            info!(
                trial = self.trial_index,
                %target,
                successes = self.success_count,
                "Trial succeeded"
            );
            self.log_event(
                "trial_success",
                event_payload([
                    ("trial", self.trial_index.to_string()),
                    ("target", target),
                    ("selected", selected),
                    ("duration_ms", duration_ms.to_string()),
                ]),
            );
            self.set_phase(Phase::Play);
        } else {
            self.error_count += 1;
            debug!(
                trial = self.trial_index,
                %target,
                %selected,
                errors = self.error_count,
                "Wrong selection"
            );
            self.log_event(
                "trial_error",
                event_payload([
                    ("trial", self.trial_index.to_string()),
                    ("target", target),
                    ("selected", selected),
                    ("errors", self.error_count.to_string()),
                ]),
            );
            self.status.broadcast(StatusLine::Error(self.error_count));
        }

        self.status.broadcast(StatusLine::Score {
            successes: self.success_count,
            goal: self.config.goal_trials,
        });
    }

    /// Resets everything and returns to Idle.
    pub fn restart(&mut self) {
        self.success_count = 0;
        self.error_count = 0;
        self.trial_index = 0;
        self.target_id = None;
        self.trial_start = None;
        self.focus.reset();
        self.unintended.stop();

        info!(session_id = %self.session_id, "Session restarted");
        self.log_event("session_restart", EventPayload::new());
        self.set_phase(Phase::Idle);
    }

    /// Ends the run and exports it.
    pub fn cancel(&mut self) {
        if self.phase.is_selecting()
            && let (Some(target), Some(start)) = (self.target_id.clone(), self.trial_start)
        {
            self.log.log_trial(TrialResult {
                trial_index: self.trial_index,
                target_id: target.clone(),
                selected_id: None,
                success: false,
                error_count: self.error_count,
                start,
                end: Timestamp::now(),
            });
            self.log_event(
                "trial_abandoned",
                event_payload([
                    ("trial", self.trial_index.to_string()),
                    ("target", target),
                ]),
            );
        }

        self.unintended.stop();
        info!(session_id = %self.session_id, phase = %self.phase, "Session cancelled");
        self.log_event(
            "session_cancel",
            event_payload([("phase", self.phase.to_string())]),
        );
        self.set_phase(Phase::End);
        self.export(ExportReason::Cancelled);
    }
}

// ============================================================================
// ExperimentSession - Focus and Logging
// ============================================================================

impl ExperimentSession {
    /// Feeds a focus candidate observed now.
    pub fn feed_focus(&mut self, candidate: Option<&str>) {
        self.feed_focus_at(candidate, Instant::now());
    }

    /// Feeds a focus candidate observed at `now`; broadcasts a new stable focus.
    pub fn feed_focus_at(&mut self, candidate: Option<&str>, now: Instant) {
        match candidate {
            Some(id) => {
                self.unintended.start_dwell_at(id, now);
                self.unintended.poll_dwell_at(now);
            }
            None => self.unintended.end_dwell(),
        }

        let previous = self.focus.current().map(str::to_string);
        if let Some(focused) = self.focus.feed_at(candidate, now) {
            let focused = focused.to_string();
            self.check_gaze_drift(previous.as_deref(), &focused);
            self.status.broadcast(StatusLine::Focus(focused));
        }
    }

    /// Sets the stable focus directly and broadcasts it.
    pub fn force_focus(&mut self, id: impl Into<String>) {
        let id = id.into();
        let previous = self.focus.current().map(str::to_string);
        self.focus.force_set(id.clone());
        self.check_gaze_drift(previous.as_deref(), &id);
        self.status.broadcast(StatusLine::Focus(id));
    }

    /// Notes a tap now; `point` is its normalized position, if known.
    pub fn record_tap(&mut self, point: Option<(f64, f64)>) {
        self.record_tap_at(point, Instant::now());
    }

    /// Checks a tap at `now` against the scroll window and the view border.
    pub fn record_tap_at(&mut self, point: Option<(f64, f64)>, now: Instant) {
        let focused = self.focus.current().map(str::to_string);
        self.unintended
            .check_tap_during_scroll_at(focused.as_deref(), now);
        if let Some((x, y)) = point {
            self.unintended.check_edge_tap(x, y);
        }
    }

    /// Notes a scroll now.
    pub fn record_scroll(&mut self) {
        self.record_scroll_at(Instant::now());
    }

    /// Notes a scroll at `now`.
    pub fn record_scroll_at(&mut self, now: Instant) {
        self.unintended.record_scroll_at(now);
    }

    /// Appends an event to the run's log.
    pub fn log_event(&mut self, kind: impl Into<String>, payload: EventPayload) {
        self.log.log_event(kind, payload);
    }
}

// ============================================================================
// ExperimentSession - Internal
// ============================================================================

impl ExperimentSession {
    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "Phase transition");
        }
        self.phase = phase;
        self.status.broadcast(StatusLine::Phase(phase));
    }

    /// Gaze drift is a stable focus moving off the current target.
    fn check_gaze_drift(&mut self, previous: Option<&str>, focused: &str) {
        if self.phase.is_selecting() && previous.is_some() && previous == self.target_id.as_deref() {
            self.unintended.check_gaze_drift(previous, Some(focused));
        }
    }

    fn finish(&mut self) {
        info!(
            session_id = %self.session_id,
            successes = self.success_count,
            "Session completed"
        );
        self.log_event(
            "session_end",
            event_payload([
                ("successes", self.success_count.to_string()),
                ("trials", self.trial_index.to_string()),
            ]),
        );
        self.unintended.stop();
        self.set_phase(Phase::End);
        self.export(ExportReason::Completed);
    }

    fn export(&mut self, reason: ExportReason) {
        let report = SessionReport {
            session_id: self.session_id,
            config: &self.config,
            reason,
            summary: self.summary(),
            trials: self.log.trials(),
            events: self.log.events(),
            unintended: self.unintended.records(),
        };
        self.export.export(&report);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::experiment::UnintendedKind;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<StatusLine>>>);

    impl Recorder {
        fn take(&self) -> Vec<StatusLine> {
            std::mem::take(&mut *self.0.lock())
        }
    }

    impl StatusSink for Recorder {
        fn broadcast(&self, status: StatusLine) {
            self.0.lock().push(status);
        }
    }

    fn session(goal: u32) -> (ExperimentSession, Recorder) {
        let recorder = Recorder::default();
        let config = ExperimentConfig::new("P01")
            .with_goal_trials(goal)
            .with_target_sequence(["a", "b", "c"]);
        let session = ExperimentSession::new(config, FocusTracker::default(), recorder.clone());
        (session, recorder)
    }

    fn kinds(session: &ExperimentSession) -> Vec<&str> {
        session.events().iter().map(|e| e.kind.as_str()).collect()
    }

    #[test]
    fn test_start_draws_first_trial() {
        let (mut session, recorder) = session(3);

        session.start_or_continue();

        assert_eq!(session.phase(), Phase::Browse);
        assert_eq!(session.target_id(), Some("a"));
        assert_eq!(session.trial_index(), 1);
        assert_eq!(kinds(&session), ["session_begin", "trial_begin"]);
        assert_eq!(
            recorder.take(),
            [
                StatusLine::Phase(Phase::Ready),
                StatusLine::Phase(Phase::Browse),
                StatusLine::Target("a".to_string()),
            ]
        );
    }

    #[test]
    fn test_success_then_next_trial() {
        let (mut session, recorder) = session(3);
        session.start_or_continue();
        recorder.take();

        session.force_focus("a");
        session.confirm_selection();

        assert_eq!(session.success_count(), 1);
        assert_eq!(session.phase(), Phase::Play);
        assert_eq!(
            recorder.take(),
            [
                StatusLine::Focus("a".to_string()),
                StatusLine::Phase(Phase::Play),
                StatusLine::Score { successes: 1, goal: 3 },
            ]
        );

        session.next_trial();
        assert_eq!(session.phase(), Phase::Browse);
        assert_eq!(session.target_id(), Some("b"));
        assert_eq!(session.trial_index(), 2);
    }

    #[test]
    fn test_wrong_then_right_selection() {
        let (mut session, recorder) = session(3);
        session.start_or_continue();
        session.force_focus("a");
        session.confirm_selection();
        session.next_trial();
        recorder.take();

        session.force_focus("x");
        session.confirm_selection();

        assert_eq!(session.error_count(), 1);
        assert_eq!(session.phase(), Phase::Browse);
        assert_eq!(
            recorder.take(),
            [
                StatusLine::Focus("x".to_string()),
                StatusLine::Error(1),
                StatusLine::Score { successes: 1, goal: 3 },
            ]
        );

        session.force_focus("b");
        session.confirm_selection();

        assert_eq!(session.success_count(), 2);
        assert_eq!(session.phase(), Phase::Play);

        let trials = session.trials();
        assert_eq!(trials.len(), 3);
        assert!(!trials[1].success);
        assert_eq!(trials[1].error_count, 0);
        assert_eq!(trials[1].selected_id.as_deref(), Some("x"));
        assert!(trials[2].success);
        assert_eq!(trials[2].error_count, 1);
    }

    #[test]
    fn test_confirm_while_idle_is_logged_noop() {
        let (mut session, recorder) = session(3);

        session.confirm_selection();

        assert_eq!(session.phase(), Phase::Idle);
        assert!(recorder.take().is_empty());
        assert_eq!(kinds(&session), ["trial_select_ignored"]);
        assert_eq!(session.events()[0].payload["reason"], "phase");
    }

    #[test]
    fn test_confirm_without_focus_is_ignored() {
        let (mut session, recorder) = session(3);
        session.start_or_continue();
        recorder.take();

        session.confirm_selection();

        assert_eq!(session.phase(), Phase::Browse);
        assert!(session.trials().is_empty());
        assert!(recorder.take().is_empty());
        let last = session.events().last().expect("event");
        assert_eq!(last.kind, "trial_select_ignored");
        assert_eq!(last.payload["reason"], "no_focus");
    }

    #[test]
    fn test_next_trial_while_idle_changes_nothing() {
        let (mut session, recorder) = session(3);

        session.next_trial();

        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.trial_index(), 0);
        assert_eq!(session.success_count(), 0);
        assert_eq!(session.error_count(), 0);
        assert!(recorder.take().is_empty());
    }

    #[test]
    fn test_double_start_is_ignored() {
        let (mut session, _recorder) = session(3);

        session.start_or_continue();
        let id = session.session_id();
        session.start_or_continue();

        assert_eq!(session.trial_index(), 1);
        assert_eq!(session.session_id(), id);
    }

    #[test]
    fn test_goal_ends_session_and_exports() {
        let exported = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let exported = Arc::clone(&exported);
            move |report: &SessionReport<'_>| {
                exported
                    .lock()
                    .push((report.reason, report.summary.success_count, report.trials.len()));
            }
        };
        let (session, _recorder) = session(3);
        let mut session = session.with_export_sink(sink);

        session.start_or_continue();
        for _ in 0..3 {
            let target = session.target_id().expect("target").to_string();
            session.force_focus(target);
            session.confirm_selection();
            session.next_trial();
        }

        assert_eq!(session.phase(), Phase::End);
        assert_eq!(session.success_count(), 3);
        assert_eq!(kinds(&session).last(), Some(&"session_end"));
        assert_eq!(*exported.lock(), [(ExportReason::Completed, 3, 3)]);
    }

    #[test]
    fn test_restart_from_end_and_start_again() {
        let (mut session, recorder) = session(1);
        session.start_or_continue();
        session.force_focus("a");
        session.confirm_selection();
        session.next_trial();
        assert_eq!(session.phase(), Phase::End);
        let first_run = session.session_id();

        session.start_or_continue();
        assert_eq!(session.phase(), Phase::Browse);
        assert_ne!(session.session_id(), first_run);
        assert!(session.trials().is_empty());

        recorder.take();
        session.restart();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.trial_index(), 0);
        assert_eq!(session.target_id(), None);
        assert_eq!(recorder.take(), [StatusLine::Phase(Phase::Idle)]);
    }

    #[test]
    fn test_cancel_abandons_active_trial() {
        let exported = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let exported = Arc::clone(&exported);
            move |report: &SessionReport<'_>| exported.lock().push(report.reason)
        };
        let (session, _recorder) = session(3);
        let mut session = session.with_export_sink(sink);
        session.start_or_continue();

        session.cancel();

        assert_eq!(session.phase(), Phase::End);
        let abandoned = &session.trials()[0];
        assert!(!abandoned.success);
        assert_eq!(abandoned.selected_id, None);
        assert_eq!(
            kinds(&session)[2..],
            ["trial_abandoned", "session_cancel"]
        );
        assert_eq!(session.summary().attempts, 0);
        assert_eq!(*exported.lock(), [ExportReason::Cancelled]);
    }

    #[test]
    fn test_enter_select_and_set_target() {
        let recorder = Recorder::default();
        let mut session = ExperimentSession::new(
            ExperimentConfig::new("P02"),
            FocusTracker::default(),
            recorder.clone(),
        );
        session.start_or_continue();
        assert_eq!(session.target_id(), None);

        session.enter_select();
        assert_eq!(session.phase(), Phase::Select);
        session.enter_select();
        assert_eq!(session.phase(), Phase::Select);

        recorder.take();
        session.set_target("panel-7");
        assert_eq!(session.target_id(), Some("panel-7"));
        assert_eq!(recorder.take(), [StatusLine::Target("panel-7".to_string())]);

        session.force_focus("panel-7");
        session.confirm_selection();
        assert_eq!(session.phase(), Phase::Play);

        session.set_target("ignored");
        assert_eq!(session.target_id(), Some("panel-7"));
    }

    #[test]
    fn test_feed_focus_broadcasts_on_change() {
        let (mut session, recorder) = session(3);
        let t0 = Instant::now();

        session.feed_focus_at(Some("a"), t0);
        session.feed_focus_at(Some("a"), t0 + Duration::from_millis(250));
        session.feed_focus_at(Some("a"), t0 + Duration::from_millis(300));

        assert_eq!(recorder.take(), [StatusLine::Focus("a".to_string())]);
        assert_eq!(session.focus().current(), Some("a"));
    }

    #[test]
    fn test_long_gaze_is_flagged_once() {
        let (mut session, _recorder) = session(3);
        let t0 = Instant::now();
        session.start_or_continue();

        session.feed_focus_at(Some("a"), t0);
        session.feed_focus_at(Some("a"), t0 + Duration::from_millis(250));
        session.feed_focus_at(Some("a"), t0 + Duration::from_millis(1600));
        session.feed_focus_at(Some("a"), t0 + Duration::from_millis(3000));

        assert_eq!(session.unintended().len(), 1);
        assert_eq!(session.unintended()[0].kind, UnintendedKind::DwellTimeout);
        assert_eq!(session.unintended()[0].element_id.as_deref(), Some("a"));
        assert_eq!(session.summary().unintended_selections, 1);
        assert_eq!(session.records().unintended.len(), 1);
    }

    #[test]
    fn test_tap_right_after_scroll_is_flagged() {
        let (mut session, _recorder) = session(3);
        let t0 = Instant::now();
        session.start_or_continue();
        session.force_focus("a");

        session.record_scroll_at(t0);
        session.record_tap_at(None, t0 + Duration::from_millis(200));
        session.record_tap_at(None, t0 + Duration::from_millis(800));

        assert_eq!(session.unintended().len(), 1);
        let flagged = &session.unintended()[0];
        assert_eq!(flagged.kind, UnintendedKind::ScrollAccidental);
        assert_eq!(flagged.element_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_focus_leaving_target_is_drift() {
        let (mut session, _recorder) = session(3);
        session.start_or_continue();

        session.force_focus("a");
        session.force_focus("b");
        session.force_focus("c");

        assert_eq!(session.unintended().len(), 1);
        assert_eq!(session.unintended()[0].kind, UnintendedKind::GazeDrift);
        assert_eq!(session.unintended()[0].context, "Gaze shifted from a to b");
    }

    #[test]
    fn test_edge_tap_is_exported_and_tracking_stops() {
        let exported = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let exported = Arc::clone(&exported);
            move |report: &SessionReport<'_>| {
                exported
                    .lock()
                    .push((report.summary.unintended_selections, report.unintended.to_vec()));
            }
        };
        let (session, _recorder) = session(3);
        let mut session = session.with_export_sink(sink);
        session.start_or_continue();

        session.record_tap_at(Some((0.98, 0.5)), Instant::now());
        session.record_tap_at(Some((0.5, 0.5)), Instant::now());
        session.cancel();
        session.record_tap_at(Some((0.0, 0.0)), Instant::now());

        let exported = exported.lock();
        assert_eq!(exported.len(), 1);
        assert_eq!(exported[0].0, 1);
        assert_eq!(exported[0].1[0].kind, UnintendedKind::EdgeTap);
        assert_eq!(session.unintended().len(), 1);
    }

    #[test]
    fn test_idle_session_flags_nothing() {
        let (mut session, _recorder) = session(3);
        let t0 = Instant::now();

        session.record_scroll_at(t0);
        session.record_tap_at(Some((0.0, 0.0)), t0);
        session.force_focus("a");
        session.force_focus("b");

        assert!(session.unintended().is_empty());
    }
}
