//! Shared utilities for demos.
//!
//! Provides common functionality used by both demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Snapshot printing

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use phonaze_link::Snapshot;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub debug: bool,
    pub addr: Option<String>,
    pub participant: Option<String>,
    pub goal: Option<u32>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            addr: value_of("--addr"),
            participant: value_of("--participant"),
            goal: value_of("--goal").and_then(|g| g.parse().ok()),
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "phonaze_link=debug"
    } else {
        "phonaze_link=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// One-line summary of a snapshot.
pub fn describe(snapshot: &Snapshot) -> String {
    let latency = snapshot
        .latency
        .map_or_else(|| "-".to_string(), |l| format!("{}ms", l.as_millis()));

    match &snapshot.experiment {
        Some(e) => format!(
            "[{}] latency={latency} phase={} trial={} target={} focus={} score={}/{} errors={}",
            snapshot.connection_state,
            e.phase,
            e.trial_index,
            e.target_id.as_deref().unwrap_or("-"),
            e.focus.as_deref().unwrap_or("-"),
            e.success_count,
            e.goal_trials,
            e.error_count,
        ),
        None => {
            let remote = &snapshot.remote_status;
            format!(
                "[{}] latency={latency} remote phase={} target={} focus={} score={} errors={}",
                snapshot.connection_state,
                remote.phase.map_or_else(|| "-".to_string(), |p| p.to_string()),
                remote.target.as_deref().unwrap_or("-"),
                remote.focus.as_deref().unwrap_or("-"),
                remote
                    .score
                    .map_or_else(|| "-".to_string(), |(n, goal)| format!("{n}/{goal}")),
                remote.errors.unwrap_or(0),
            )
        }
    }
}
