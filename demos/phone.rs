//! Phone side of the link, acting as remote controller.
//!
//! Demonstrates:
//! - Connecting to an advertising headset
//! - Driving the headset's session with legacy commands
//! - Mirroring the headset's status from `EXP_STATE:*` lines
//! - Sending typed wire messages
//!
//! Usage:
//!   cargo run --example phone -- --addr 192.168.1.20:54321
//!   cargo run --example phone -- --addr 127.0.0.1:54321 --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use common::Args;
use phonaze_link::{Hub, InteractionMode, LinkOptions, Phase, WireMessage};

// ============================================================================
// Constants
// ============================================================================

const TAP_DELAY: Duration = Duration::from_millis(400);

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
    println!("=== Phone ===\n");

    let addr = args.addr.context("missing --addr <host:port>")?;

    let (hub, phone) = Hub::builder(LinkOptions::phone())
        .capability("webTap")
        .capability("webScroll")
        .build()
        .context("building phone hub")?;
    tokio::spawn(hub.run());

    println!("[1] Connecting to {addr}...");
    let peer = phone.connect(addr).await.context("connecting to headset")?;
    println!("    ✓ Connected ({peer})\n");

    phone.send_wire(WireMessage::ModeSet {
        mode: InteractionMode::RemotePhone,
    });
    phone.send_legacy("EXP_CMD:START");

    // ========================================================================
    // Remote Control Loop
    // ========================================================================

    let mut changes = phone.watch();
    let mut last_phase = None;

    while changes.changed().await.is_ok() {
        let snapshot = changes.borrow_and_update().clone();
        println!("{}", common::describe(&snapshot));

        if !snapshot.connection_state.is_connected() {
            println!("\n[Done] Headset went away");
            break;
        }

        let remote = &snapshot.remote_status;
        let phase_changed = remote.phase != last_phase;
        last_phase = remote.phase;

        match remote.phase {
            // Confirm once the headset reports focus on the target
            Some(Phase::Browse) if remote.focus.is_some() && remote.focus == remote.target => {
                tokio::time::sleep(TAP_DELAY).await;
                phone.send_legacy("EXP_TAP");
            }
            Some(Phase::Play) if phase_changed => {
                tokio::time::sleep(TAP_DELAY).await;
                phone.send_legacy("EXP_CMD:NEXT");
            }
            Some(Phase::End) => {
                println!("\n[Done] Session ended");
                break;
            }
            _ => {}
        }
    }

    phone.shutdown();
    Ok(())
}
