//! Legacy line grammar.
//!
//! Older phone builds speak a prefix-tagged text protocol instead of the
//! structured envelope. It is kept for interoperability and has no framing
//! of its own: one line per transport message.
//!
//! ```text
//! EXP_TAP
//! EXP_SCROLL_H:<float>
//! EXP_SCROLL_V:<float>
//! EXP_CMD:<START|NEXT|RESTART|CANCEL>
//! EXP_STATE:FOCUS:<itemID>
//! EXP_STATE:TARGET:<itemID>
//! EXP_STATE:PHASE:<idle|ready|browse|select|play|end>
//! EXP_STATE:SCORE:<n>/<goal>
//! EXP_STATE:ERROR:<count>
//! SELECT:<x>,<y>
//! SCROLL_SELECT:<n>
//! WEB_*
//! ```
//!
//! `SELECT` and `SCROLL_SELECT` drive the standalone games in
//! [`crate::game`].
//!
//! Parsing is total: anything unrecognized becomes
//! [`LegacyCommand::Unknown`] carrying the original line.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use super::Phase;

// ============================================================================
// Prefixes
// ============================================================================

/// Tap with no coordinates.
pub const TAP: &str = "EXP_TAP";
/// Horizontal scroll delta.
pub const SCROLL_H: &str = "EXP_SCROLL_H:";
/// Vertical scroll delta.
pub const SCROLL_V: &str = "EXP_SCROLL_V:";
/// Session control command.
pub const CMD: &str = "EXP_CMD:";
/// Status: stable focus changed.
pub const STATE_FOCUS: &str = "EXP_STATE:FOCUS:";
/// Status: new trial target.
pub const STATE_TARGET: &str = "EXP_STATE:TARGET:";
/// Status: phase changed.
pub const STATE_PHASE: &str = "EXP_STATE:PHASE:";
/// Status: successes over goal.
pub const STATE_SCORE: &str = "EXP_STATE:SCORE:";
/// Status: per-trial error count.
pub const STATE_ERROR: &str = "EXP_STATE:ERROR:";
/// Select game pick at normalized coordinates.
pub const SELECT: &str = "SELECT:";
/// Scroll game pick.
pub const SCROLL_SELECT: &str = "SCROLL_SELECT:";
/// Reserved for the web layer; opaque here.
pub const WEB: &str = "WEB_";

// ============================================================================
// ControlCommand
// ============================================================================

/// Body of an `EXP_CMD:` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// Begin a session (or a new one after `End`).
    Start,
    /// Advance to the next trial.
    Next,
    /// Reset everything back to `Idle`.
    Restart,
    /// Abort the running session.
    Cancel,
}

impl ControlCommand {
    /// Returns the uppercase wire label.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Next => "NEXT",
            Self::Restart => "RESTART",
            Self::Cancel => "CANCEL",
        }
    }
}

impl FromStr for ControlCommand {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START" => Ok(Self::Start),
            "NEXT" => Ok(Self::Next),
            "RESTART" => Ok(Self::Restart),
            "CANCEL" => Ok(Self::Cancel),
            _ => Err(()),
        }
    }
}

// ============================================================================
// StatusLine
// ============================================================================

/// Outbound status broadcast from the headset so the phone can mirror it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    /// Stable focus changed to this item.
    Focus(String),
    /// Current trial target.
    Target(String),
    /// Session phase.
    Phase(Phase),
    /// Successful trials so far and the goal.
    Score {
        /// Successful trials so far.
        successes: u32,
        /// Goal trial count.
        goal: u32,
    },
    /// Errors in the current trial.
    Error(u32),
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Focus(id) => write!(f, "{STATE_FOCUS}{id}"),
            Self::Target(id) => write!(f, "{STATE_TARGET}{id}"),
            Self::Phase(phase) => write!(f, "{STATE_PHASE}{phase}"),
            Self::Score { successes, goal } => write!(f, "{STATE_SCORE}{successes}/{goal}"),
            Self::Error(count) => write!(f, "{STATE_ERROR}{count}"),
        }
    }
}

/// Formats an outbound status line.
#[inline]
#[must_use]
pub fn format_legacy_status(status: &StatusLine) -> String {
    status.to_string()
}

// ============================================================================
// LegacyCommand
// ============================================================================

/// One parsed legacy line.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyCommand {
    /// `EXP_TAP`
    Tap,
    /// `EXP_SCROLL_H:<dx>`
    ScrollH(f64),
    /// `EXP_SCROLL_V:<dy>`
    ScrollV(f64),
    /// `EXP_CMD:<command>`
    Cmd(ControlCommand),
    /// `EXP_STATE:*`
    Status(StatusLine),
    /// `SELECT:<x>,<y>`
    SelectPanel {
        /// Normalized horizontal position.
        x: f64,
        /// Normalized vertical position.
        y: f64,
    },
    /// `SCROLL_SELECT:<n>`
    ScrollSelect(i64),
    /// `WEB_*`, left for the web layer.
    Web(String),
    /// Anything else, verbatim.
    Unknown(String),
}

impl LegacyCommand {
    /// Returns `true` for lines this grammar did not recognize.
    #[inline]
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for LegacyCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tap => f.write_str(TAP),
            Self::ScrollH(dx) => write!(f, "{SCROLL_H}{dx}"),
            Self::ScrollV(dy) => write!(f, "{SCROLL_V}{dy}"),
            Self::Cmd(command) => write!(f, "{CMD}{}", command.as_str()),
            Self::Status(status) => status.fmt(f),
            Self::SelectPanel { x, y } => write!(f, "{SELECT}{x},{y}"),
            Self::ScrollSelect(n) => write!(f, "{SCROLL_SELECT}{n}"),
            Self::Web(line) | Self::Unknown(line) => f.write_str(line),
        }
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses one legacy line. Never fails.
///
/// A single trailing `\n` / `\r\n` is ignored, for peers that newline-
/// terminate their messages. [`LegacyCommand::Unknown`] keeps the line as
/// received.
#[must_use]
pub fn parse_legacy(line: &str) -> LegacyCommand {
    let body = line
        .strip_suffix('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .unwrap_or(line);
    parse_known(body).unwrap_or_else(|| LegacyCommand::Unknown(line.to_string()))
}

fn parse_known(line: &str) -> Option<LegacyCommand> {
    if line == TAP {
        return Some(LegacyCommand::Tap);
    }
    if let Some(body) = line.strip_prefix(SCROLL_H) {
        return parse_delta(body).map(LegacyCommand::ScrollH);
    }
    if let Some(body) = line.strip_prefix(SCROLL_V) {
        return parse_delta(body).map(LegacyCommand::ScrollV);
    }
    if let Some(body) = line.strip_prefix(CMD) {
        return body.parse().ok().map(LegacyCommand::Cmd);
    }
    if let Some(body) = line.strip_prefix(STATE_FOCUS) {
        return non_empty(body).map(|id| LegacyCommand::Status(StatusLine::Focus(id)));
    }
    if let Some(body) = line.strip_prefix(STATE_TARGET) {
        return non_empty(body).map(|id| LegacyCommand::Status(StatusLine::Target(id)));
    }
    if let Some(body) = line.strip_prefix(STATE_PHASE) {
        return body
            .parse()
            .ok()
            .map(|phase| LegacyCommand::Status(StatusLine::Phase(phase)));
    }
    if let Some(body) = line.strip_prefix(STATE_SCORE) {
        let (successes, goal) = body.split_once('/')?;
        return Some(LegacyCommand::Status(StatusLine::Score {
            successes: successes.parse().ok()?,
            goal: goal.parse().ok()?,
        }));
    }
    if let Some(body) = line.strip_prefix(STATE_ERROR) {
        return body
            .parse()
            .ok()
            .map(|count| LegacyCommand::Status(StatusLine::Error(count)));
    }
    if let Some(body) = line.strip_prefix(SELECT) {
        let (x, y) = body.split_once(',')?;
        return Some(LegacyCommand::SelectPanel {
            x: parse_delta(x)?,
            y: parse_delta(y)?,
        });
    }
    if let Some(body) = line.strip_prefix(SCROLL_SELECT) {
        return body.trim().parse().ok().map(LegacyCommand::ScrollSelect);
    }
    if line.starts_with(WEB) {
        return Some(LegacyCommand::Web(line.to_string()));
    }
    None
}

/// Parses a finite float; `inf`/`NaN` are rejected.
fn parse_delta(body: &str) -> Option<f64> {
    body.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn non_empty(body: &str) -> Option<String> {
    (!body.is_empty()).then(|| body.to_string())
}

// ============================================================================
// Tests
// ============================================================================
