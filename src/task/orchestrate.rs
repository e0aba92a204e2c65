//! Orchestrator Module
//!
//! This module contains the orchestrator task that turns session events into
//! user feedback and, on battery cutoff, shuts the session down.

use crate::system::event;
use crate::system::{indicator, shutdown};
use defmt::info;
use npg_lite_core::{Indication, Reaction, SessionStatus};

/// Main orchestrator task
///
/// Listens for system events, records what changed and raises the matching
/// indication.
#[embassy_executor::task]
pub async fn orchestrate() {
    info!("Orchestrator started");
    let mut status = SessionStatus::new();
    indicator::update(Indication::Disconnected);

    loop {
        // wait for an event
        let event = event::wait().await;
        // process the event and react to it
        handle_reaction(status.process(event));
    }
}

/// Carries out what the session status decided
fn handle_reaction(reaction: Reaction) {
    if let Some(indication) = reaction.indication {
        indicator::update(indication);
    }
    if reaction.shutdown {
        shutdown::trigger();
    }
}
