//! Experiment phase shared by the session and the status grammar.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Phase
// ============================================================================

/// Stage of an experiment session.
///
/// ```text
///  Idle ──► Ready ──► Browse ◄──► Select
///   ▲                   │  ▲        │
///   │                   ▼  │        ▼
///   └──── restart ───  End ◄─ Play ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No session running.
    #[default]
    Idle,
    /// Session begun, first trial not yet drawn.
    Ready,
    /// Participant is looking for the target.
    Browse,
    /// Participant opened the selection view.
    Select,
    /// Correct target chosen; feedback or media is playing.
    Play,
    /// Session finished or cancelled.
    End,
}

impl Phase {
    /// All phases in declaration order.
    pub const ALL: [Phase; 6] = [
        Phase::Idle,
        Phase::Ready,
        Phase::Browse,
        Phase::Select,
        Phase::Play,
        Phase::End,
    ];

    /// Returns the lowercase wire label.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ready => "ready",
            Self::Browse => "browse",
            Self::Select => "select",
            Self::Play => "play",
            Self::End => "end",
        }
    }

    /// Returns `true` while a trial is waiting for a selection.
    #[inline]
    #[must_use]
    pub const fn is_selecting(&self) -> bool {
        matches!(self, Self::Browse | Self::Select)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|p| p.as_str() == s).ok_or(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_parse_back() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>(), Ok(phase));
        }
    }

    #[test]
    fn test_labels_are_case_sensitive() {
        assert!("Browse".parse::<Phase>().is_err());
        assert!("".parse::<Phase>().is_err());
    }

    #[test]
    fn test_selecting_phases() {
        assert!(Phase::Browse.is_selecting());
        assert!(Phase::Select.is_selecting());
        assert!(!Phase::Play.is_selecting());
        assert!(!Phase::Idle.is_selecting());
    }
}
