//! Streaming State
//!
//! The only memory shared between the acquisition loop and the wireless host.
//! The command processor and link handling write it, the acquisition loop
//! reads it once per conversion frame.
//!
//! # State Components
//! - Streaming: host asked for data with `START` and nothing stopped it since
//! - Halted: the low-battery cutoff fired; latched for the rest of the session
//!
//! Both are plain atomics with acquire/release ordering. There is no derived
//! invariant between them that would need a lock: `halted` only ever forces
//! `streaming` off.
//!
//! # Access Pattern
//! ```rust
//! use npg_lite_core::state::StreamState;
//!
//! static STATE: StreamState = StreamState::new();
//! STATE.start();
//! assert!(STATE.is_streaming());
//! ```

use core::sync::atomic::{AtomicBool, Ordering};

/// Streaming flag plus the latched low-battery halt
#[derive(Debug)]
pub struct StreamState {
    streaming: AtomicBool,
    halted: AtomicBool,
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamState {
    /// Boot state: not streaming, not halted
    pub const fn new() -> Self {
        Self {
            streaming: AtomicBool::new(false),
            halted: AtomicBool::new(false),
        }
    }

    /// Enables streaming. Returns whether the flag changed.
    ///
    /// Refused once the session is halted.
    pub fn start(&self) -> bool {
        if self.is_halted() {
            return false;
        }
        !self.streaming.swap(true, Ordering::AcqRel)
    }

    /// Disables streaming. Returns whether the flag changed.
    pub fn stop(&self) -> bool {
        self.streaming.swap(false, Ordering::AcqRel)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Low-battery cutoff: forces streaming off and latches.
    ///
    /// Returns true only for the call that actually halted the session.
    pub fn halt(&self) -> bool {
        let first = !self.halted.swap(true, Ordering::AcqRel);
        self.streaming.store(false, Ordering::Release);
        first
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}
