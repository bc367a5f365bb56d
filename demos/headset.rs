//! Headset side of the link, running a scripted participant.
//!
//! Demonstrates:
//! - Advertising and waiting for the phone
//! - Running an experiment driven by the phone's commands
//! - Feeding gaze samples through the focus stabilizer
//! - Exporting the finished run as JSON
//!
//! Usage:
//!   cargo run --example headset
//!   cargo run --example headset -- --participant P07 --goal 3 --debug
//!
//! Then start the phone demo with the printed address.

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use common::Args;
use phonaze_link::{ExperimentConfig, Hub, LinkOptions, Notification, Phase, SessionReport};

// ============================================================================
// Constants
// ============================================================================

const TARGETS: [&str; 4] = ["poster-1", "poster-2", "poster-3", "poster-4"];
const GAZE_SAMPLE: Duration = Duration::from_millis(11);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Headset ===\n");

    let config = ExperimentConfig::new(args.participant.as_deref().unwrap_or("P00"))
        .with_goal_trials(args.goal.unwrap_or(3))
        .with_target_sequence(TARGETS);

    let (hub, headset) = Hub::builder(LinkOptions::headset())
        .experiment(config)
        .export_sink(|report: &SessionReport<'_>| match serde_json::to_string_pretty(report) {
            Ok(json) => println!("\n[Export]\n{json}"),
            Err(e) => eprintln!("[Export] failed: {e}"),
        })
        .build()
        .context("building headset hub")?;
    tokio::spawn(hub.run());

    let addr = headset
        .start_advertising()
        .await
        .context("starting to advertise")?;
    println!("[1] Advertising on {addr}");
    println!("    cargo run --example phone -- --addr {addr}\n");

    // ========================================================================
    // Participant Loop
    // ========================================================================

    let mut taps = headset.notifications();
    let mut changes = headset.watch();

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                println!("{}", common::describe(&snapshot));

                let Some(experiment) = snapshot.experiment else { continue };
                match experiment.phase {
                    // Look at the target long enough for focus to settle
                    Phase::Browse if experiment.focus != experiment.target_id => {
                        if let Some(target) = experiment.target_id {
                            for _ in 0..30 {
                                headset.feed_focus(Some(&target));
                                tokio::time::sleep(GAZE_SAMPLE).await;
                            }
                        }
                    }
                    Phase::End => break,
                    _ => {}
                }
            }

            tap = taps.recv() => {
                if let Ok(Notification::Tap { point }) = tap {
                    println!("[Tap] {point:?}");
                }
            }
        }
    }

    if let Some(records) = headset.records().await? {
        println!(
            "\n[Done] {} of {} trials, accuracy {:.2}, {} unintended",
            records.summary.success_count,
            records.summary.goal_trials,
            records.summary.accuracy,
            records.summary.unintended_selections
        );
    }

    headset.shutdown();
    Ok(())
}
