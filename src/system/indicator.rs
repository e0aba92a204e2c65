//! System Indicator Module
//!
//! Carries the latest requested [`Indication`] to the status LED task. Only
//! the most recent one matters, so an embassy-sync Signal is used: a newer
//! update simply replaces one that was not yet displayed.
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use npg_lite_core::Indication;

/// Signal for status indication changes
pub static SYSTEM_INDICATOR_CHANGED: Signal<CriticalSectionRawMutex, Indication> = Signal::new();

/// Requests a new indication. Does not wait for the LED to update.
pub fn update(indication: Indication) {
    SYSTEM_INDICATOR_CHANGED.signal(indication);
}

/// Waits for the next requested indication
pub async fn wait() -> Indication {
    SYSTEM_INDICATOR_CHANGED.wait().await
}
