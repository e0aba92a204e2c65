//! Connection Lifecycle Manager
//!
//! Tracks the single wireless link and decides what the host task must do on
//! each link event.
//!
//! # States
//! ```text
//!              link established            host subscribes to data
//! Advertising ------------------> Connected -----------------------> Subscribed
//!    ^  |                          |    ^      host unsubscribes        |
//!    |  | window elapsed /         |    +-------------------------------+
//!    |  | connect failed           |                                    |
//!    +--+                          | link lost                          | link lost
//!    ^                             v                                    |
//!    +-----------------------------+------------------------------------+
//! ```
//! Acquisition never waits for `Subscribed`; packets produced before a host
//! subscribes are simply not delivered.

use crate::config::{
    CONNECTION_INTERVAL_MAX_US, CONNECTION_INTERVAL_MIN_US, CONNECTION_SUPERVISION_TIMEOUT_MS,
    PREFERRED_PERIPHERAL_LATENCY,
};
use crate::indication::Indication;
use crate::state::StreamState;

/// Link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Advertising,
    Connected,
    Subscribed,
}

/// Connection timing as reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkTiming {
    /// Connection interval (µs)
    pub interval_us: u32,
    /// Peripheral latency (connection events)
    pub latency: u16,
    /// Supervision timeout (ms)
    pub supervision_timeout_ms: u32,
}

/// Connection parameters to ask the central for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ParamsRequest {
    /// Acceptable connection interval range (µs)
    pub interval_min_us: u32,
    pub interval_max_us: u32,
    /// Peripheral latency (connection events)
    pub latency: u16,
    /// Supervision timeout (ms)
    pub supervision_timeout_ms: u32,
}

impl ParamsRequest {
    /// Keeps the central's interval and timeout, changes only the latency
    pub const fn keeping(timing: LinkTiming) -> Self {
        Self {
            interval_min_us: timing.interval_us,
            interval_max_us: timing.interval_us,
            latency: PREFERRED_PERIPHERAL_LATENCY,
            supervision_timeout_ms: timing.supervision_timeout_ms,
        }
    }

    /// Any interval the central likes, with the preferred latency
    pub const fn latency_only() -> Self {
        Self {
            interval_min_us: CONNECTION_INTERVAL_MIN_US,
            interval_max_us: CONNECTION_INTERVAL_MAX_US,
            latency: PREFERRED_PERIPHERAL_LATENCY,
            supervision_timeout_ms: CONNECTION_SUPERVISION_TIMEOUT_MS,
        }
    }
}

/// Link events delivered by the wireless host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEvent {
    /// A central connected; timing is included when the stack reports it
    Connected { timing: Option<LinkTiming> },
    /// The central (or our request) changed the connection timing
    ParamsUpdated(LinkTiming),
    /// Notifications on the data characteristic were enabled or disabled
    DataSubscription(bool),
    /// The link was lost
    Disconnected { reason: u8 },
    /// A connection attempt failed before the link came up
    ConnectFailed,
    /// The advertising window elapsed without a connection
    AdvertisingTimeout,
}

/// What the host task must do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkActions {
    /// Indication to raise
    pub indication: Option<Indication>,
    /// Start a fresh advertising set
    pub restart_advertising: bool,
    /// Streaming was forced off by this event
    pub stopped_streaming: bool,
    /// Connection parameter update to request
    pub update_params: Option<ParamsRequest>,
}

/// Single-link state machine
#[derive(Debug)]
pub struct ConnectionManager {
    state: ConnectionState,
    timing: Option<LinkTiming>,
    params_requested: bool,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub const fn new() -> Self {
        Self {
            state: ConnectionState::Advertising,
            timing: None,
            params_requested: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Latest timing observed on the current link
    pub fn timing(&self) -> Option<LinkTiming> {
        self.timing
    }

    /// Applies one link event. Link loss forces streaming off in `stream`.
    pub fn handle(&mut self, event: LinkEvent, stream: &StreamState) -> LinkActions {
        let mut actions = LinkActions::default();

        match (self.state, event) {
            (ConnectionState::Advertising, LinkEvent::Connected { timing }) => {
                info!("Connection established");
                self.state = ConnectionState::Connected;
                self.timing = timing;
                self.params_requested = false;
                actions.indication = Some(Indication::Connected);
                actions.update_params = self.request_for(timing);
            }
            (ConnectionState::Connected | ConnectionState::Subscribed, LinkEvent::ParamsUpdated(timing)) => {
                debug!(
                    "Link timing: interval={}us latency={} timeout={}ms",
                    timing.interval_us, timing.latency, timing.supervision_timeout_ms
                );
                self.timing = Some(timing);
                actions.update_params = self.request_for(Some(timing));
            }
            (ConnectionState::Connected, LinkEvent::DataSubscription(true)) => {
                info!("Data characteristic subscribed");
                self.state = ConnectionState::Subscribed;
            }
            (ConnectionState::Subscribed, LinkEvent::DataSubscription(false)) => {
                info!("Data characteristic unsubscribed");
                self.state = ConnectionState::Connected;
            }
            (ConnectionState::Connected | ConnectionState::Subscribed, LinkEvent::Disconnected { reason }) => {
                info!("Disconnected, reason: {}", reason);
                self.state = ConnectionState::Advertising;
                self.timing = None;
                self.params_requested = false;
                actions.stopped_streaming = stream.stop();
                actions.indication = Some(Indication::Disconnected);
                actions.restart_advertising = true;
            }
            (ConnectionState::Advertising, LinkEvent::AdvertisingTimeout | LinkEvent::ConnectFailed) => {
                info!("Advertising ended without a connection, restarting");
                actions.restart_advertising = true;
            }
            (state, event) => {
                debug!("Ignoring {:?} while {:?}", event, state);
            }
        }

        actions
    }

    /// Asks for the preferred latency at most once per connection. Known
    /// timing is kept as the central chose it; without it any interval in the
    /// fallback range is accepted.
    fn request_for(&mut self, observed: Option<LinkTiming>) -> Option<ParamsRequest> {
        if self.params_requested {
            return None;
        }
        self.params_requested = true;
        match observed {
            Some(timing) if timing.latency == PREFERRED_PERIPHERAL_LATENCY => None,
            Some(timing) => Some(ParamsRequest::keeping(timing)),
            None => Some(ParamsRequest::latency_only()),
        }
    }
}
