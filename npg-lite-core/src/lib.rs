//! NPG-Lite core
//!
//! Everything the biopotential streamer does that does not touch a peripheral:
//! framing samples into wire packets, estimating the battery, the control
//! command protocol, link lifecycle decisions and the acquisition cycle that
//! ties them together. The firmware supplies the ADC driver, the BLE host and
//! the LED strip through the traits in [`acquisition`] and [`indication`].
//!
//! # Modules
//! - [`config`]: protocol constants and conversion frame layout
//! - [`packet`]: Sample Encoder and the matching decoder
//! - [`battery`]: Battery Estimator and cutoff latch
//! - [`command`]: Command Processor for the control characteristic
//! - [`connection`]: Connection Lifecycle Manager
//! - [`state`]: streaming flag shared by both activities
//! - [`session`]: which indication each session event raises
//! - [`acquisition`]: the per-frame sampling cycle
//! - [`indication`]: status pixel palette
//!
//! # Features
//! - `defmt`: log through `defmt` and derive `defmt::Format`
//! - `secondary-channels`: sample ADC inputs 3-5 instead of 0-2

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod acquisition;
pub mod battery;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod indication;
pub mod packet;
pub mod session;
pub mod state;

pub use acquisition::{Acquisition, ConversionSource, CycleOutcome, PacketSink};
pub use battery::{BatteryEstimate, BatteryMonitor};
pub use command::{Command, CommandProcessor, Reply, Response};
pub use config::{AcquisitionConfig, BatteryTap, ChannelSet};
pub use connection::{ConnectionManager, ConnectionState, LinkActions, LinkEvent, LinkTiming, ParamsRequest};
pub use error::{DecodeError, EncodeError, NotifyError};
pub use indication::{Indication, IndicatorSink};
pub use packet::{Packet, PacketRow};
pub use session::{Reaction, SessionEvent, SessionStatus};
pub use state::StreamState;
