//! Experiment configuration.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::InteractionMode;

// ============================================================================
// Constants
// ============================================================================

/// Default number of successful trials that ends a session.
pub const DEFAULT_GOAL_TRIALS: u32 = 10;

/// Default platform label.
const DEFAULT_PLATFORM: &str = "visionOS";

// ============================================================================
// TaskType
// ============================================================================

/// Kind of task the participant performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Pick a highlighted panel.
    #[default]
    Select,
    /// Scroll to and pick a panel.
    Scroll,
    /// Browse media and play the target.
    Media,
}

impl TaskType {
    /// Returns the label used in logs and exports.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Scroll => "scroll",
            Self::Media => "media",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// ExperimentConfig
// ============================================================================

/// Parameters of one experiment session. Fixed once the session exists.
///
/// # Example
///
/// ```
/// use phonaze_link::experiment::{ExperimentConfig, TaskType};
///
/// let config = ExperimentConfig::new("P01")
///     .with_goal_trials(3)
///     .with_task(TaskType::Media)
///     .with_target_sequence(["a", "b", "c"]);
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.target_for(4), Some("b"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentConfig {
    /// Participant identifier.
    #[serde(rename = "participantID")]
    pub participant_id: String,
    /// Successful trials needed to finish.
    pub goal_trials: u32,
    /// Task performed.
    pub task: TaskType,
    /// Platform label, e.g. `visionOS`.
    pub platform: String,
    /// Interaction technique.
    pub interaction_mode: InteractionMode,
    /// Targets in presentation order; empty means targets come from the UI.
    #[serde(default)]
    pub target_sequence: Vec<String>,
}

impl ExperimentConfig {
    /// Creates a config with default goal, task, platform and mode.
    #[must_use]
    pub fn new(participant_id: impl Into<String>) -> Self {
        Self {
            participant_id: participant_id.into(),
            goal_trials: DEFAULT_GOAL_TRIALS,
            task: TaskType::default(),
            platform: DEFAULT_PLATFORM.to_string(),
            interaction_mode: InteractionMode::default(),
            target_sequence: Vec::new(),
        }
    }

    /// Sets the goal trial count.
    #[inline]
    #[must_use]
    pub fn with_goal_trials(mut self, goal_trials: u32) -> Self {
        self.goal_trials = goal_trials;
        self
    }

    /// Sets the task type.
    #[inline]
    #[must_use]
    pub fn with_task(mut self, task: TaskType) -> Self {
        self.task = task;
        self
    }

    /// Sets the platform label.
    #[inline]
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Sets the interaction mode.
    #[inline]
    #[must_use]
    pub fn with_interaction_mode(mut self, mode: InteractionMode) -> Self {
        self.interaction_mode = mode;
        self
    }

    /// Sets the target sequence.
    #[must_use]
    pub fn with_target_sequence<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_sequence = targets.into_iter().map(Into::into).collect();
        self
    }

    /// Target for the trial drawn after `completed` trials, cycling
    /// through the sequence. `None` when no sequence is configured.
    #[must_use]
    pub fn target_for(&self, completed: u32) -> Option<&str> {
        if self.target_sequence.is_empty() {
            return None;
        }
        let index = completed as usize % self.target_sequence.len();
        self.target_sequence.get(index).map(String::as_str)
    }

    /// Validates the config.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty participant id, a zero goal
    /// or an empty target id in the sequence.
    pub fn validate(&self) -> Result<()> {
        if self.participant_id.trim().is_empty() {
            return Err(Error::config("participant id must not be empty"));
        }

        if self.goal_trials == 0 {
            return Err(Error::config("goal trials must be at least 1"));
        }

        if self.target_sequence.iter().any(|t| t.is_empty()) {
            return Err(Error::config("target ids must not be empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
