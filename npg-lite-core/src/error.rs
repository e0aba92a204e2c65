//! Error types shared by the sampling pipeline and the wire protocol

use thiserror::Error;

/// A conversion frame could not be turned into a packet
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    #[error("conversion frame holds {actual} codes, expected {expected}")]
    FrameSize { expected: usize, actual: usize },
}

/// Received bytes are not a packet
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    #[error("packet is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
}

/// A packet could not be handed to the wireless layer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyError {
    #[error("no host subscribed to the data characteristic")]
    NoSubscriber,
    #[error("wireless transport busy")]
    Busy,
}
