//! Session shutdown broadcast
//!
//! Once the battery cutoff fires, the sampler and the wireless host stop for
//! good. Both hold a receiver on this watch and return when it changes.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch::{Receiver, Watch};

/// Number of tasks that stop on shutdown
const SUBSCRIBERS: usize = 2;

static SHUTDOWN: Watch<CriticalSectionRawMutex, (), SUBSCRIBERS> = Watch::new();

/// Broadcasts the shutdown to every subscribed task
pub fn trigger() {
    SHUTDOWN.sender().send(());
}

/// Subscribes to the shutdown broadcast. `None` once all slots are taken.
pub fn subscribe() -> Option<Receiver<'static, CriticalSectionRawMutex, (), SUBSCRIBERS>> {
    SHUTDOWN.receiver()
}
