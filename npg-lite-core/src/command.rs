//! Command Processor
//!
//! Decodes ASCII commands written to the control characteristic and produces
//! the reply that is notified back on the same characteristic.
//!
//! # Protocol
//! ```text
//! write "START"   -> streaming on,  notify "RUNNING"
//! write "STOP"    -> streaming off, notify "STOPPED"
//! write "WHORU"   ->                notify "NPG-LITE"
//! write "STATUS"  ->                notify "RUNNING" | "STOPPED"
//! write other     ->                notify "UNKNOWN COMMAND"
//! read            ->                "RUNNING" | "STOPPED"
//! ```
//! Matching is case-insensitive and by prefix over the first 19 bytes, so
//! `start\r\n` is `START`. Every write gets exactly one reply.

use crate::config::{COMMAND_MAX_LEN, DEVICE_IDENTITY};
use crate::state::StreamState;

/// Recognized control commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Start,
    Stop,
    WhoAreYou,
    Status,
}

impl Command {
    /// Keywords in match order
    const KEYWORDS: [(&'static [u8], Command); 4] = [
        (b"START", Command::Start),
        (b"STOP", Command::Stop),
        (b"WHORU", Command::WhoAreYou),
        (b"STATUS", Command::Status),
    ];

    /// Decodes a control write, `None` if no keyword matches
    pub fn parse(payload: &[u8]) -> Option<Command> {
        let len = payload.len().min(COMMAND_MAX_LEN);
        let mut upper = [0u8; COMMAND_MAX_LEN];
        for (dst, src) in upper.iter_mut().zip(&payload[..len]) {
            *dst = src.to_ascii_uppercase();
        }
        let text = &upper[..len];

        Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| text.starts_with(keyword))
            .map(|(_, command)| *command)
    }
}

/// ASCII replies sent over the control characteristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    Running,
    Stopped,
    Identity,
    Unknown,
}

impl Response {
    pub fn as_str(self) -> &'static str {
        match self {
            Response::Running => "RUNNING",
            Response::Stopped => "STOPPED",
            Response::Identity => DEVICE_IDENTITY,
            Response::Unknown => "UNKNOWN COMMAND",
        }
    }

    pub fn as_bytes(self) -> &'static [u8] {
        self.as_str().as_bytes()
    }

    /// Current streaming status
    pub fn status(state: &StreamState) -> Self {
        if state.is_streaming() {
            Response::Running
        } else {
            Response::Stopped
        }
    }
}

/// Outcome of one control write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// Decoded command, `None` for unrecognized input
    pub command: Option<Command>,
    /// What to notify back
    pub response: Response,
    /// Whether the streaming flag actually flipped
    pub changed: bool,
}

/// Stateless dispatcher over the shared [`StreamState`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandProcessor;

impl CommandProcessor {
    /// Handles a write to the control characteristic
    pub fn on_write(&self, state: &StreamState, payload: &[u8]) -> Reply {
        let command = Command::parse(payload);
        let (response, changed) = match command {
            Some(Command::Start) => {
                let changed = state.start();
                if state.is_halted() {
                    warn!("START refused, session halted by low battery");
                } else {
                    info!("Command: START, streaming started");
                }
                (Response::status(state), changed)
            }
            Some(Command::Stop) => {
                let changed = state.stop();
                info!("Command: STOP, streaming stopped");
                (Response::Stopped, changed)
            }
            Some(Command::WhoAreYou) => {
                info!("Command: WHORU");
                (Response::Identity, false)
            }
            Some(Command::Status) => {
                info!("Command: STATUS");
                (Response::status(state), false)
            }
            None => {
                debug!("Unknown command ({} bytes)", payload.len());
                (Response::Unknown, false)
            }
        };

        Reply {
            command,
            response,
            changed,
        }
    }

    /// Handles a read of the control characteristic; never mutates state
    pub fn on_read(&self, state: &StreamState) -> Response {
        Response::status(state)
    }
}
