//! Acquisition task
//!
//! Drives the packet builder from the core crate: frames come from the ADC
//! sampler, finished packets go to the BLE host through a short queue. The
//! queue is never awaited, so a slow or absent host only costs packets, never
//! samples.
//!
//! Returns after the battery cutoff, once the low-battery event is out.

use defmt::*;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use npg_lite_core::config::{AcquisitionConfig, MAX_FRAME_LEN};
use npg_lite_core::{Acquisition, ConversionSource, NotifyError, Packet, PacketSink, StreamState};

use crate::system::event::{self, Events};
use crate::task::sample_adc::{self, ConversionFrame};

/// Packets waiting for the BLE host
const PACKET_QUEUE_SIZE: usize = 2;

/// Finished packets on their way to the data characteristic
static DATA_PACKETS: Channel<CriticalSectionRawMutex, Packet, PACKET_QUEUE_SIZE> = Channel::new();

/// Receives the next packet to notify
pub async fn next_packet() -> Packet {
    DATA_PACKETS.receive().await
}

/// Drops packets queued for a previous connection
pub fn discard_pending() {
    DATA_PACKETS.clear();
}

/// Frames delivered by the sampler task
struct SampledFrames {
    latest: ConversionFrame,
}

impl ConversionSource for SampledFrames {
    async fn conversion_done(&mut self) {
        self.latest = sample_adc::wait_frame().await;
    }

    fn read(&mut self, frame: &mut [u16]) -> usize {
        let len = self.latest.len.min(frame.len());
        frame[..len].copy_from_slice(&self.latest.codes[..len]);
        self.latest.len
    }
}

/// Hands packets to the BLE host without waiting
struct DataQueue;

impl PacketSink for DataQueue {
    fn notify(&mut self, packet: &Packet) -> Result<(), NotifyError> {
        DATA_PACKETS.try_send(*packet).map_err(|_| NotifyError::Busy)
    }
}

/// Builds packets from sampled frames while streaming is enabled
#[embassy_executor::task]
pub async fn acquire(stream: &'static StreamState) {
    info!("Acquisition started");

    let frames = SampledFrames {
        latest: ConversionFrame {
            codes: [0; MAX_FRAME_LEN],
            len: 0,
        },
    };
    let mut acquisition = Acquisition::new(frames, DataQueue, stream, AcquisitionConfig::ACTIVE);

    let estimate = acquisition.run().await;
    warn!(
        "Acquisition halted at {}% ({} mV), counter {}",
        estimate.percent,
        estimate.millivolts,
        acquisition.sequence()
    );
    event::send(Events::LowBattery(estimate)).await;
}
