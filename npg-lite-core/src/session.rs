//! Session Status
//!
//! Records what the user has been shown about the session and decides which
//! indication each session event raises. Once the battery cutoff halts the
//! session only the halt itself is shown; later events are recorded but stay
//! silent.

use crate::battery::BatteryEstimate;
use crate::connection::ConnectionState;
use crate::indication::Indication;

/// Events reported by the link and acquisition activities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    /// The wireless link moved to a new state, optionally asking for an indication
    LinkChanged {
        state: ConnectionState,
        indication: Option<Indication>,
    },
    /// A control command flipped the streaming flag
    StreamingChanged(bool),
    /// The battery crossed the cutoff and acquisition has halted
    LowBattery(BatteryEstimate),
}

/// What to do about one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reaction {
    /// Indication to show
    pub indication: Option<Indication>,
    /// Stop every session activity for good
    pub shutdown: bool,
}

/// What is known about the session
#[derive(Debug)]
pub struct SessionStatus {
    link: ConnectionState,
    streaming: bool,
    halted: bool,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStatus {
    pub const fn new() -> Self {
        Self {
            link: ConnectionState::Advertising,
            streaming: false,
            halted: false,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Records `event` and returns the reaction it calls for
    pub fn process(&mut self, event: SessionEvent) -> Reaction {
        match event {
            SessionEvent::LinkChanged { state, indication } => {
                if state == ConnectionState::Advertising {
                    self.streaming = false;
                }
                let changed = self.link != state;
                self.link = state;
                if !changed || self.halted {
                    return Reaction::default();
                }
                info!("Link: {:?}", state);
                Reaction {
                    indication,
                    shutdown: false,
                }
            }
            SessionEvent::StreamingChanged(streaming) => {
                let changed = self.streaming != streaming;
                self.streaming = streaming;
                if !changed || self.halted {
                    return Reaction::default();
                }
                info!("Streaming: {}", streaming);
                Reaction {
                    indication: Some(if streaming {
                        Indication::Streaming
                    } else {
                        Indication::Stopped
                    }),
                    shutdown: false,
                }
            }
            SessionEvent::LowBattery(estimate) => {
                if self.halted {
                    return Reaction::default();
                }
                warn!(
                    "Battery cutoff at {}% ({} mV), shutting down the session",
                    estimate.percent, estimate.millivolts
                );
                self.halted = true;
                self.streaming = false;
                Reaction {
                    indication: Some(Indication::LowBattery),
                    shutdown: true,
                }
            }
        }
    }
}
