//! Acquisition Loop
//!
//! One cycle per conversion-complete signal:
//! 1. Wait for the hardware driver to report a finished conversion frame
//! 2. Discard it unless streaming is enabled
//! 3. Read the frame; a size mismatch skips the cycle (no packet, counter kept)
//! 4. Encode 25 rows, stamping the rolling counter
//! 5. Assess the averaged battery code; the first critical reading halts the
//!    session instead of sending
//! 6. Hand the packet to the wireless layer, best effort
//!
//! The loop never waits on the wireless layer. A failed notification is
//! logged and forgotten; the host sees it as a counter gap. The counter runs
//! for the whole uptime and is not reset on reconnect.

use crate::battery::{BatteryEstimate, BatteryMonitor, mean_battery_code};
use crate::config::{AcquisitionConfig, MAX_FRAME_LEN, PACKET_SIZE};
use crate::error::NotifyError;
use crate::packet::{Packet, encode_packet};
use crate::state::StreamState;

/// Hardware sampling driver
#[allow(async_fn_in_trait)]
pub trait ConversionSource {
    /// Suspends until the driver signals that a conversion frame is complete
    async fn conversion_done(&mut self);

    /// Copies the completed frame into `frame`, returning how many codes the
    /// driver produced. Anything other than `frame.len()` is a corrupted read.
    fn read(&mut self, frame: &mut [u16]) -> usize;
}

/// Wireless data channel
pub trait PacketSink {
    /// Queues one packet for notification without waiting
    fn notify(&mut self, packet: &Packet) -> Result<(), NotifyError>;
}

/// What one cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// Not streaming, signal discarded
    Idle,
    /// Driver returned the wrong amount of data
    Corrupted { expected: usize, actual: usize },
    /// Packet handed to the wireless layer
    Sent { first_sequence: u8 },
    /// Packet built but the wireless layer refused it
    Dropped { first_sequence: u8, error: NotifyError },
    /// Battery crossed the cutoff; session halted
    Cutoff(BatteryEstimate),
}

/// Sampling cycle state: buffers, rolling counter and battery monitor
pub struct Acquisition<'a, S, N> {
    source: S,
    sink: N,
    stream: &'a StreamState,
    config: AcquisitionConfig,
    frame: [u16; MAX_FRAME_LEN],
    packet: Packet,
    sequence: u8,
    battery: BatteryMonitor,
}

impl<'a, S: ConversionSource, N: PacketSink> Acquisition<'a, S, N> {
    pub fn new(source: S, sink: N, stream: &'a StreamState, config: AcquisitionConfig) -> Self {
        Self {
            source,
            sink,
            stream,
            config,
            frame: [0; MAX_FRAME_LEN],
            packet: [0; PACKET_SIZE],
            sequence: 0,
            battery: BatteryMonitor::new(),
        }
    }

    /// Sequence number the next packet starts at
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Runs cycles until the battery cutoff fires
    pub async fn run(&mut self) -> BatteryEstimate {
        loop {
            if let CycleOutcome::Cutoff(estimate) = self.cycle().await {
                return estimate;
            }
        }
    }

    /// Waits for one conversion-complete signal and processes it
    pub async fn cycle(&mut self) -> CycleOutcome {
        self.source.conversion_done().await;

        if !self.stream.is_streaming() {
            return CycleOutcome::Idle;
        }

        let expected = self.config.frame_len();
        let actual = self.source.read(&mut self.frame[..expected]);
        if actual != expected {
            warn!("Corrupted reading from ADC, size: {} (expected {})", actual, expected);
            return CycleOutcome::Corrupted { expected, actual };
        }

        self.process_frame()
    }

    fn process_frame(&mut self) -> CycleOutcome {
        let frame = &self.frame[..self.config.frame_len()];
        let first_sequence = self.sequence;

        let next_sequence = match encode_packet(frame, &self.config, first_sequence, &mut self.packet) {
            Ok(next) => next,
            Err(e) => {
                error!("Encoding failed: {:?}", e);
                let crate::error::EncodeError::FrameSize { expected, actual } = e;
                return CycleOutcome::Corrupted { expected, actual };
            }
        };

        if let Some(raw) = mean_battery_code(frame, &self.config) {
            let assessment = self.battery.assess(raw);
            if assessment.cutoff {
                self.stream.halt();
                error!(
                    "Battery at {}% ({} mV), halting session",
                    assessment.estimate.percent, assessment.estimate.millivolts
                );
                return CycleOutcome::Cutoff(assessment.estimate);
            }
        }

        self.sequence = next_sequence;

        match self.sink.notify(&self.packet) {
            Ok(()) => {
                debug!("Packet sent, counter: {}", first_sequence);
                CycleOutcome::Sent { first_sequence }
            }
            Err(error) => {
                warn!("Notification failed: {:?}", error);
                CycleOutcome::Dropped { first_sequence, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BatteryTap, ChannelSet};
    use crate::packet::decode_packet;
    use embassy_futures::block_on;
    use std::collections::VecDeque;

    const CONFIG: AcquisitionConfig = AcquisitionConfig {
        channels: ChannelSet::Primary,
        battery: BatteryTap::Multiplexed,
    };

    /// Battery code reading as roughly 4.1 V
    const HEALTHY: u16 = 1700;

    /// Replays queued frames, one per signal
    struct FakeSource(VecDeque<Vec<u16>>);

    impl ConversionSource for FakeSource {
        async fn conversion_done(&mut self) {}

        fn read(&mut self, frame: &mut [u16]) -> usize {
            let next = self.0.pop_front().unwrap_or_default();
            let n = next.len().min(frame.len());
            frame[..n].copy_from_slice(&next[..n]);
            next.len()
        }
    }

    #[derive(Default)]
    struct FakeSink {
        sent: Vec<Packet>,
        refuse: Option<NotifyError>,
    }

    impl PacketSink for &mut FakeSink {
        fn notify(&mut self, packet: &Packet) -> Result<(), NotifyError> {
            if let Some(error) = self.refuse {
                return Err(error);
            }
            self.sent.push(*packet);
            Ok(())
        }
    }

    fn frame(battery: u16) -> Vec<u16> {
        let mut frame: Vec<u16> = (0..CONFIG.frame_len()).map(|i| (i * 13 % 3000) as u16).collect();
        for stride in frame.chunks_exact_mut(CONFIG.stride()) {
            stride[3] = battery;
        }
        frame
    }

    fn source(frames: impl IntoIterator<Item = Vec<u16>>) -> FakeSource {
        FakeSource(frames.into_iter().collect())
    }

    #[test]
    fn idle_when_not_streaming() {
        let stream = StreamState::new();
        let mut sink = FakeSink::default();
        let mut acquisition = Acquisition::new(source([frame(HEALTHY)]), &mut sink, &stream, CONFIG);

        assert_eq!(block_on(acquisition.cycle()), CycleOutcome::Idle);
        assert_eq!(acquisition.sequence(), 0);
        drop(acquisition);
        assert!(sink.sent.is_empty());
    }

    #[test]
    fn successive_packets_continue_the_counter() {
        let stream = StreamState::new();
        stream.start();
        let mut sink = FakeSink::default();
        let frames = (0..11).map(|_| frame(HEALTHY));
        let mut acquisition = Acquisition::new(source(frames), &mut sink, &stream, CONFIG);

        for _ in 0..11 {
            assert!(matches!(block_on(acquisition.cycle()), CycleOutcome::Sent { .. }));
        }
        // 11 x 25 = 275 rows, wrapped once
        assert_eq!(acquisition.sequence(), 19);
        drop(acquisition);

        let mut expected: u8 = 0;
        for packet in &sink.sent {
            for row in decode_packet(packet).unwrap() {
                assert_eq!(row.sequence, expected);
                expected = expected.wrapping_add(1);
            }
        }
    }

    #[test]
    fn corrupted_read_skips_the_cycle() {
        let stream = StreamState::new();
        stream.start();
        let mut sink = FakeSink::default();
        let short = frame(HEALTHY)[..60].to_vec();
        let mut acquisition = Acquisition::new(source([frame(HEALTHY), short, frame(HEALTHY)]), &mut sink, &stream, CONFIG);

        assert_eq!(block_on(acquisition.cycle()), CycleOutcome::Sent { first_sequence: 0 });
        assert_eq!(
            block_on(acquisition.cycle()),
            CycleOutcome::Corrupted {
                expected: 100,
                actual: 60
            }
        );
        assert_eq!(acquisition.sequence(), 25);
        assert!(stream.is_streaming());
        assert_eq!(block_on(acquisition.cycle()), CycleOutcome::Sent { first_sequence: 25 });
        drop(acquisition);
        assert_eq!(sink.sent.len(), 2);
    }

    #[test]
    fn oversized_read_is_corrupted_too() {
        let stream = StreamState::new();
        stream.start();
        let mut sink = FakeSink::default();
        let mut long = frame(HEALTHY);
        long.extend_from_slice(&[0; 4]);
        let mut acquisition = Acquisition::new(source([long]), &mut sink, &stream, CONFIG);

        assert!(matches!(block_on(acquisition.cycle()), CycleOutcome::Corrupted { actual: 104, .. }));
    }

    #[test]
    fn refused_notification_keeps_sampling() {
        let stream = StreamState::new();
        stream.start();
        let mut sink = FakeSink {
            refuse: Some(NotifyError::NoSubscriber),
            ..Default::default()
        };
        let mut acquisition = Acquisition::new(source([frame(HEALTHY), frame(HEALTHY)]), &mut sink, &stream, CONFIG);

        assert_eq!(
            block_on(acquisition.cycle()),
            CycleOutcome::Dropped {
                first_sequence: 0,
                error: NotifyError::NoSubscriber
            }
        );
        assert_eq!(
            block_on(acquisition.cycle()),
            CycleOutcome::Dropped {
                first_sequence: 25,
                error: NotifyError::NoSubscriber
            }
        );
        assert!(stream.is_streaming());
    }

    #[test]
    fn data_only_layout_never_cuts_off() {
        let config = AcquisitionConfig {
            channels: ChannelSet::Primary,
            battery: BatteryTap::None,
        };
        let stream = StreamState::new();
        stream.start();
        let mut sink = FakeSink::default();
        // all-zero codes would read as an empty battery on a multiplexed tap
        let mut acquisition = Acquisition::new(source([vec![0u16; 75], vec![0u16; 75]]), &mut sink, &stream, config);

        assert_eq!(block_on(acquisition.cycle()), CycleOutcome::Sent { first_sequence: 0 });
        assert_eq!(block_on(acquisition.cycle()), CycleOutcome::Sent { first_sequence: 25 });
        assert!(!stream.is_halted());
    }

    #[test]
    fn run_returns_on_cutoff() {
        let stream = StreamState::new();
        stream.start();
        let mut sink = FakeSink::default();
        let frames = [frame(HEALTHY), frame(HEALTHY), frame(1466), frame(HEALTHY)];
        let mut acquisition = Acquisition::new(source(frames), &mut sink, &stream, CONFIG);

        let estimate = block_on(acquisition.run());
        assert_eq!(estimate.percent, 4);
        assert!(stream.is_halted());
        assert!(!stream.is_streaming());
        drop(acquisition);
        assert_eq!(sink.sent.len(), 2);
    }
}
