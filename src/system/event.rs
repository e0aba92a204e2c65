//! System Events
//!
//! Defines events and channels for inter-task communication.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

/// System-wide events
pub use npg_lite_core::SessionEvent as Events;

/// Multi-producer, single-consumer event channel with capacity of 8
pub static EVENT_CHANNEL: Channel<CriticalSectionRawMutex, Events, 8> = Channel::new();

/// Sends an event to the system channel
pub async fn send(event: Events) {
    EVENT_CHANNEL.sender().send(event).await;
}

/// Receives the next event from the system channel
pub async fn wait() -> Events {
    EVENT_CHANNEL.receiver().receive().await
}
