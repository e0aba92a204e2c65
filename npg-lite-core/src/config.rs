//! Device configuration
//!
//! Compile-time constants for the sampling pipeline and the wireless protocol,
//! plus the [`AcquisitionConfig`] describing how a conversion frame is laid out.
//!
//! # Timing
//! ```text
//! 250 samples/s per channel, 25 rows per packet -> 10 packets/s
//! ```
//!
//! # Conversion Frame Layout
//! The ADC scans the active inputs round-robin. One frame holds 25 strides;
//! a stride is one code per data channel, followed by the battery code when
//! the battery tap is multiplexed:
//! ```text
//! [ch0 ch1 ch2 (bat)] [ch0 ch1 ch2 (bat)] ... x25
//! ```

/// Samples per second per channel
pub const SAMPLING_RATE_HZ: u32 = 250;

/// Rows carried by one wireless packet
pub const ROWS_PER_PACKET: usize = 25;

/// Transmitted analog channels
pub const DATA_CHANNELS: usize = 3;

/// Bytes per packet row: sequence byte + one big-endian u16 per channel
pub const ROW_SIZE: usize = 1 + DATA_CHANNELS * 2;

/// Bytes per packet (175), must stay below the negotiated ATT payload
pub const PACKET_SIZE: usize = ROWS_PER_PACKET * ROW_SIZE;

/// Packets per second while streaming
pub const PACKET_RATE_HZ: u32 = SAMPLING_RATE_HZ / ROWS_PER_PACKET as u32;

/// Widest stride: every data channel plus the battery tap
pub const MAX_STRIDE: usize = DATA_CHANNELS + 1;

/// Largest conversion frame in ADC codes
pub const MAX_FRAME_LEN: usize = MAX_STRIDE * ROWS_PER_PACKET;

/// Valid bits of one ADC conversion result
pub const ADC_CODE_MASK: u16 = 0x0FFF;

/// Rescale applied to every transmitted code: `raw * 4095 / 3329`.
///
/// The front-end saturates at code 3329, this stretches it back over 12 bits.
pub const RESCALE_NUMERATOR: u32 = 4095;
/// See [`RESCALE_NUMERATOR`]
pub const RESCALE_DENOMINATOR: u32 = 3329;

/// Meaningful bytes of a control write, the rest is ignored
pub const COMMAND_MAX_LEN: usize = 19;

/// Advertised device name
pub const DEVICE_NAME: &str = "NPG-LITE";

/// Reply to the `WHORU` command
pub const DEVICE_IDENTITY: &str = "NPG-LITE";

/// Advertising interval bounds (ms)
pub const ADVERTISING_INTERVAL_MIN_MS: u64 = 500;
/// See [`ADVERTISING_INTERVAL_MIN_MS`]
pub const ADVERTISING_INTERVAL_MAX_MS: u64 = 510;

/// Advertising window (s); advertising restarts when it elapses unanswered
pub const ADVERTISING_WINDOW_SECS: u64 = 30;

/// Peripheral latency requested once per connection
pub const PREFERRED_PERIPHERAL_LATENCY: u16 = 3;

/// Connection interval range offered when the central's timing is unknown (µs)
pub const CONNECTION_INTERVAL_MIN_US: u32 = 7_500;
/// See [`CONNECTION_INTERVAL_MIN_US`]
pub const CONNECTION_INTERVAL_MAX_US: u32 = 50_000;

/// Supervision timeout offered when the central's timing is unknown (ms).
///
/// Must exceed `(1 + latency) * interval_max * 2`.
pub const CONNECTION_SUPERVISION_TIMEOUT_MS: u32 = 4_000;

/// Battery percentage below which the session is cut off
pub const BATTERY_CUTOFF_PERCENT: u8 = 5;

/// Which three ADC inputs carry the biopotential signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelSet {
    /// ADC inputs 0, 1, 2
    Primary,
    /// ADC inputs 3, 4, 5
    Secondary,
}

impl ChannelSet {
    /// ADC input numbers in transmission order
    pub const fn adc_inputs(self) -> [u8; DATA_CHANNELS] {
        match self {
            ChannelSet::Primary => [0, 1, 2],
            ChannelSet::Secondary => [3, 4, 5],
        }
    }
}

/// Source of the battery reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryTap {
    /// Battery divider sampled as an extra slot of every stride (never transmitted)
    Multiplexed,
    /// No battery reading; the low-battery cutoff never fires
    None,
}

/// Conversion frame layout used by the acquisition loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquisitionConfig {
    pub channels: ChannelSet,
    pub battery: BatteryTap,
}

impl AcquisitionConfig {
    /// Layout used by the firmware image
    #[cfg(not(feature = "secondary-channels"))]
    pub const ACTIVE: AcquisitionConfig = AcquisitionConfig {
        channels: ChannelSet::Primary,
        battery: BatteryTap::Multiplexed,
    };

    /// Layout used by the firmware image
    #[cfg(feature = "secondary-channels")]
    pub const ACTIVE: AcquisitionConfig = AcquisitionConfig {
        channels: ChannelSet::Secondary,
        battery: BatteryTap::Multiplexed,
    };

    /// ADC codes per row
    pub const fn stride(&self) -> usize {
        match self.battery {
            BatteryTap::Multiplexed => DATA_CHANNELS + 1,
            BatteryTap::None => DATA_CHANNELS,
        }
    }

    /// ADC codes per conversion frame
    pub const fn frame_len(&self) -> usize {
        self.stride() * ROWS_PER_PACKET
    }

    /// Position of the battery code within a stride
    pub const fn battery_slot(&self) -> Option<usize> {
        match self.battery {
            BatteryTap::Multiplexed => Some(DATA_CHANNELS),
            BatteryTap::None => None,
        }
    }

    /// Aggregate conversion rate the ADC must run at
    pub const fn conversion_rate_hz(&self) -> u32 {
        SAMPLING_RATE_HZ * self.stride() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packet_geometry() {
        assert_eq!(ROW_SIZE, 7);
        assert_eq!(PACKET_SIZE, 175);
        assert_eq!(PACKET_RATE_HZ, 10);
    }

    #[test]
    fn fallback_supervision_timeout_covers_skipped_events() {
        let skipped_ms = (1 + PREFERRED_PERIPHERAL_LATENCY as u32) * CONNECTION_INTERVAL_MAX_US * 2 / 1000;
        assert!(CONNECTION_SUPERVISION_TIMEOUT_MS > skipped_ms);
        assert!(CONNECTION_INTERVAL_MIN_US <= CONNECTION_INTERVAL_MAX_US);
    }

    #[test]
    fn multiplexed_battery_widens_the_stride() {
        let config = AcquisitionConfig {
            channels: ChannelSet::Primary,
            battery: BatteryTap::Multiplexed,
        };
        assert_eq!(config.stride(), 4);
        assert_eq!(config.frame_len(), 100);
        assert_eq!(config.battery_slot(), Some(3));
        assert_eq!(config.conversion_rate_hz(), 1000);
    }

    #[test]
    fn without_battery_tap_the_frame_is_data_only() {
        let config = AcquisitionConfig {
            channels: ChannelSet::Secondary,
            battery: BatteryTap::None,
        };
        assert_eq!(config.stride(), 3);
        assert_eq!(config.frame_len(), 75);
        assert_eq!(config.battery_slot(), None);
        assert_eq!(config.channels.adc_inputs(), [3, 4, 5]);
    }
}
