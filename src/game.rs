//! Standalone select and scroll games.
//!
//! Outside the trial-based experiment, the headset can run two quick
//! games that the phone drives with bare legacy lines:
//!
//! | Line | Effect |
//! |------|--------|
//! | `SELECT:<x>,<y>` | Picks the panel under normalized `(x, y)` on the 4×4 grid |
//! | `SCROLL_SELECT:<n>` | Starts a scroll round for `n`, or submits `n` in a running one |
//!
//! A round runs from its start until a correct pick, and the elapsed time
//! is kept as the last result. Picks outside a running round are ignored.
//!
//! ```text
//!            start_*             correct pick
//!   idle ─────────────► round ──────────────► idle (last_*_time set)
//!                         │ ▲
//!                         └─┘ wrong pick
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::experiment::TaskType;

// ============================================================================
// Constants
// ============================================================================

/// Rows and columns of the select grid.
pub const GRID_SIZE: u8 = 4;

// ============================================================================
// Panel
// ============================================================================

/// One cell of the select grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Panel {
    /// Zero-based row, top first.
    pub row: u8,
    /// Zero-based column, left first.
    pub col: u8,
}

impl Panel {
    /// Creates a panel; `None` outside the grid.
    #[must_use]
    pub const fn new(row: u8, col: u8) -> Option<Self> {
        if row < GRID_SIZE && col < GRID_SIZE {
            Some(Self { row, col })
        } else {
            None
        }
    }

    /// Panel under a normalized point, clamped onto the grid.
    ///
    /// Returns `None` for non-finite coordinates.
    #[must_use]
    pub fn from_normalized(x: f64, y: f64) -> Option<Self> {
        Some(Self {
            row: cell(y)?,
            col: cell(x)?,
        })
    }
}

fn cell(ratio: f64) -> Option<u8> {
    if !ratio.is_finite() {
        return None;
    }
    let max = f64::from(GRID_SIZE - 1);
    Some((ratio * f64::from(GRID_SIZE)).clamp(0.0, max) as u8)
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of a pick on the select grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelHit {
    /// Target hit; the round is over.
    Correct {
        /// Panel that was picked.
        panel: Panel,
        /// Time since the round started.
        elapsed: Duration,
    },
    /// Another panel; the round keeps running.
    Wrong {
        /// Panel that was picked.
        panel: Panel,
    },
}

/// Result of a `SCROLL_SELECT` submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPick {
    /// No scroll round was running; one started for this number.
    Started,
    /// Target reached; the round is over.
    Correct {
        /// Time since the round started.
        elapsed: Duration,
    },
    /// Another number; the round keeps running.
    Wrong,
}

// ============================================================================
// GameCommand
// ============================================================================

/// Local control of the games, issued by the headset UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameCommand {
    /// Start a select round for this panel.
    StartSelect(Panel),
    /// Start a scroll round for this number.
    StartScroll(i64),
    /// Switch to the media task; it has no timed round.
    StartMedia,
    /// End the select round as solved.
    CompleteSelect,
    /// End the scroll round as solved.
    CompleteScroll,
    /// Drop targets and the running round.
    Reset,
}

// ============================================================================
// GameState
// ============================================================================

/// Targets and timings of the standalone games.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameState {
    kind: Option<TaskType>,
    target_panel: Option<Panel>,
    target_number: Option<i64>,
    last_select_time: Option<Duration>,
    last_scroll_time: Option<Duration>,
    /// Set while a round is running.
    round_start: Option<Instant>,
}

impl GameState {
    /// Game picked last, kept across resets.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> Option<TaskType> {
        self.kind
    }

    /// Panel to pick in the select game.
    #[inline]
    #[must_use]
    pub fn target_panel(&self) -> Option<Panel> {
        self.target_panel
    }

    /// Number to reach in the scroll game.
    #[inline]
    #[must_use]
    pub fn target_number(&self) -> Option<i64> {
        self.target_number
    }

    /// Duration of the last solved select round.
    #[inline]
    #[must_use]
    pub fn last_select_time(&self) -> Option<Duration> {
        self.last_select_time
    }

    /// Duration of the last solved scroll round.
    #[inline]
    #[must_use]
    pub fn last_scroll_time(&self) -> Option<Duration> {
        self.last_scroll_time
    }

    /// Returns `true` while a round of `kind` is running.
    #[must_use]
    pub fn is_running(&self, kind: TaskType) -> bool {
        self.kind == Some(kind) && self.round_start.is_some()
    }
}

// ============================================================================
// GameState - Rounds
// ============================================================================

impl GameState {
    /// Starts a select round at `now`.
    pub fn start_select_at(&mut self, panel: Panel, now: Instant) {
        info!(row = panel.row, col = panel.col, "Select round started");
        self.kind = Some(TaskType::Select);
        self.target_panel = Some(panel);
        self.target_number = None;
        self.last_select_time = None;
        self.round_start = Some(now);
    }

    /// Starts a scroll round at `now`.
    pub fn start_scroll_at(&mut self, target: i64, now: Instant) {
        info!(target, "Scroll round started");
        self.kind = Some(TaskType::Scroll);
        self.target_panel = None;
        self.target_number = Some(target);
        self.last_scroll_time = None;
        self.round_start = Some(now);
    }

    /// Switches to the media task.
    pub fn start_media(&mut self) {
        info!("Media task started");
        self.kind = Some(TaskType::Media);
        self.target_panel = None;
        self.target_number = None;
        self.round_start = None;
    }

    /// Ends the select round as solved and returns its duration.
    pub fn complete_select_at(&mut self, now: Instant) -> Option<Duration> {
        let elapsed = self.finish_round(TaskType::Select, now)?;
        self.last_select_time = Some(elapsed);
        Some(elapsed)
    }

    /// Ends the scroll round as solved and returns its duration.
    pub fn complete_scroll_at(&mut self, now: Instant) -> Option<Duration> {
        let elapsed = self.finish_round(TaskType::Scroll, now)?;
        self.last_scroll_time = Some(elapsed);
        Some(elapsed)
    }

    /// Drops targets and the running round. The game kind is kept.
    pub fn reset(&mut self) {
        self.target_panel = None;
        self.target_number = None;
        self.round_start = None;
    }

    /// Applies a local command; returns the duration of a solved round.
    pub fn apply_at(&mut self, command: GameCommand, now: Instant) -> Option<Duration> {
        match command {
            GameCommand::StartSelect(panel) => self.start_select_at(panel, now),
            GameCommand::StartScroll(target) => self.start_scroll_at(target, now),
            GameCommand::StartMedia => self.start_media(),
            GameCommand::CompleteSelect => return self.complete_select_at(now),
            GameCommand::CompleteScroll => return self.complete_scroll_at(now),
            GameCommand::Reset => self.reset(),
        }
        None
    }

    fn finish_round(&mut self, kind: TaskType, now: Instant) -> Option<Duration> {
        if self.kind != Some(kind) {
            return None;
        }
        let start = self.round_start.take()?;
        let elapsed = now.saturating_duration_since(start);
        info!(%kind, elapsed_ms = elapsed.as_millis() as u64, "Round complete");
        Some(elapsed)
    }
}

// ============================================================================
// GameState - Remote Picks
// ============================================================================

impl GameState {
    /// Picks the panel under a normalized point in the running select round.
    ///
    /// Returns `None` when no select round is running.
    pub fn select_normalized_at(&mut self, x: f64, y: f64, now: Instant) -> Option<PanelHit> {
        if !self.is_running(TaskType::Select) {
            debug!(x, y, "Select pick outside a round");
            return None;
        }
        let panel = Panel::from_normalized(x, y)?;

        if self.target_panel == Some(panel) {
            let elapsed = self.complete_select_at(now)?;
            return Some(PanelHit::Correct { panel, elapsed });
        }

        debug!(row = panel.row, col = panel.col, "Wrong panel");
        Some(PanelHit::Wrong { panel })
    }

    /// Submits a number from the phone's scroll picker.
    pub fn scroll_select_at(&mut self, number: i64, now: Instant) -> ScrollPick {
        if !self.is_running(TaskType::Scroll) {
            self.start_scroll_at(number, now);
            return ScrollPick::Started;
        }

        if self.target_number == Some(number)
            && let Some(elapsed) = self.complete_scroll_at(now)
        {
            return ScrollPick::Correct { elapsed };
        }

        debug!(number, target = ?self.target_number, "Wrong number");
        ScrollPick::Wrong
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn panel(row: u8, col: u8) -> Panel {
        Panel::new(row, col).expect("on grid")
    }

    #[test]
    fn test_normalized_point_maps_onto_grid() {
        assert_eq!(Panel::from_normalized(0.125, 0.375), Some(panel(1, 0)));
        assert_eq!(Panel::from_normalized(0.99, 0.0), Some(panel(0, 3)));
        assert_eq!(Panel::from_normalized(1.0, 1.0), Some(panel(3, 3)));
        assert_eq!(Panel::from_normalized(-0.5, 7.0), Some(panel(3, 0)));
        assert_eq!(Panel::from_normalized(f64::NAN, 0.5), None);
        assert_eq!(Panel::new(4, 0), None);
    }

    #[test]
    fn test_select_round_records_elapsed() {
        let mut game = GameState::default();
        let t0 = Instant::now();

        game.start_select_at(panel(2, 1), t0);
        assert!(game.is_running(TaskType::Select));

        assert_eq!(
            game.select_normalized_at(0.9, 0.9, t0 + secs(0.5)),
            Some(PanelHit::Wrong { panel: panel(3, 3) })
        );
        assert_eq!(
            game.select_normalized_at(0.3, 0.6, t0 + secs(1.5)),
            Some(PanelHit::Correct {
                panel: panel(2, 1),
                elapsed: secs(1.5)
            })
        );
        assert_eq!(game.last_select_time(), Some(secs(1.5)));
        assert!(!game.is_running(TaskType::Select));

        // Round is over
        assert_eq!(game.select_normalized_at(0.3, 0.6, t0 + secs(2.0)), None);
        assert_eq!(game.complete_select_at(t0 + secs(2.0)), None);
    }

    #[test]
    fn test_select_pick_without_round_is_ignored() {
        let mut game = GameState::default();
        assert_eq!(game.select_normalized_at(0.1, 0.1, Instant::now()), None);
        assert_eq!(game, GameState::default());
    }

    #[test]
    fn test_scroll_select_starts_then_scores() {
        let mut game = GameState::default();
        let t0 = Instant::now();

        assert_eq!(game.scroll_select_at(42, t0), ScrollPick::Started);
        assert_eq!(game.target_number(), Some(42));
        assert_eq!(game.kind(), Some(TaskType::Scroll));

        assert_eq!(game.scroll_select_at(41, t0 + secs(1.0)), ScrollPick::Wrong);
        assert_eq!(
            game.scroll_select_at(42, t0 + secs(2.25)),
            ScrollPick::Correct { elapsed: secs(2.25) }
        );
        assert_eq!(game.last_scroll_time(), Some(secs(2.25)));
        assert!(!game.is_running(TaskType::Scroll));
    }

    #[test]
    fn test_complete_requires_matching_kind() {
        let mut game = GameState::default();
        let t0 = Instant::now();

        game.start_scroll_at(7, t0);
        assert_eq!(game.complete_select_at(t0 + secs(1.0)), None);
        assert_eq!(game.complete_scroll_at(t0 + secs(1.0)), Some(secs(1.0)));
    }

    #[test]
    fn test_starting_a_game_clears_the_other_target() {
        let mut game = GameState::default();
        let t0 = Instant::now();

        game.start_select_at(panel(0, 0), t0);
        game.start_scroll_at(3, t0);
        assert_eq!(game.target_panel(), None);
        assert_eq!(game.target_number(), Some(3));

        game.start_media();
        assert_eq!(game.kind(), Some(TaskType::Media));
        assert_eq!(game.target_number(), None);
        assert!(!game.is_running(TaskType::Media));
    }

    #[test]
    fn test_reset_keeps_kind() {
        let mut game = GameState::default();
        let t0 = Instant::now();

        game.apply_at(GameCommand::StartSelect(panel(1, 1)), t0);
        assert_eq!(game.apply_at(GameCommand::CompleteSelect, t0 + secs(0.75)), Some(secs(0.75)));
        game.apply_at(GameCommand::StartSelect(panel(2, 2)), t0 + secs(1.0));
        game.apply_at(GameCommand::Reset, t0 + secs(1.5));

        assert_eq!(game.kind(), Some(TaskType::Select));
        assert_eq!(game.target_panel(), None);
        assert!(!game.is_running(TaskType::Select));
        assert_eq!(game.apply_at(GameCommand::CompleteSelect, t0 + secs(2.0)), None);
    }
}
