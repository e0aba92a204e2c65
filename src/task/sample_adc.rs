//! Continuous ADC sampling
//!
//! Runs the ADC in round-robin mode over the active channel set (plus the
//! battery tap), one DMA transfer per frame of 25 rows. Every finished
//! transfer is handed to the acquisition task through a Signal; that is the
//! conversion-complete notification.
//!
//! A failed transfer is reported as an empty frame so the acquisition task
//! sees it as a corrupted read.

use defmt::*;
use embassy_futures::select::{Either, select};
use embassy_rp::adc::{self, Adc, Channel};
use embassy_rp::gpio::Pull;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use npg_lite_core::config::{AcquisitionConfig, ChannelSet, MAX_FRAME_LEN, MAX_STRIDE};

use crate::system::resources::{AcquisitionResources, Irqs};
use crate::system::shutdown;

/// ADC clock (48 MHz USB PLL)
const ADC_CLOCK_HZ: u32 = 48_000_000;

/// One completed DMA transfer
#[derive(Clone)]
pub struct ConversionFrame {
    pub codes: [u16; MAX_FRAME_LEN],
    /// Codes actually produced; 0 for a failed transfer
    pub len: usize,
}

/// Signal for completed conversion frames
static CONVERSION_DONE: Signal<CriticalSectionRawMutex, ConversionFrame> = Signal::new();

/// Waits for the next completed conversion frame
pub async fn wait_frame() -> ConversionFrame {
    CONVERSION_DONE.wait().await
}

/// Round-robin divider for the requested per-input conversion rate.
/// The ADC takes a conversion every `div + 1` cycles of its clock.
const fn clock_divider(conversion_rate_hz: u32) -> u16 {
    (ADC_CLOCK_HZ / conversion_rate_hz - 1) as u16
}

/// Samples the electrode inputs until shutdown
#[embassy_executor::task]
pub async fn sample_adc(mut r: AcquisitionResources) {
    let config = AcquisitionConfig::ACTIVE;
    let Some(mut shutdown) = shutdown::subscribe() else {
        error!("No shutdown slot left for the sampler");
        return;
    };

    let mut adc = Adc::new(r.adc, Irqs, adc::Config::default());
    let [a, b, c] = match config.channels {
        ChannelSet::Primary => [
            Channel::new_pin(r.primary_a, Pull::None),
            Channel::new_pin(r.primary_b, Pull::None),
            Channel::new_pin(r.primary_c, Pull::None),
        ],
        ChannelSet::Secondary => [
            Channel::new_pin(r.secondary_a, Pull::None),
            Channel::new_pin(r.secondary_b, Pull::None),
            Channel::new_pin(r.secondary_c, Pull::None),
        ],
    };
    let mut channels: [Channel<'static>; MAX_STRIDE] = [a, b, c, Channel::new_pin(r.battery, Pull::None)];
    let stride = config.stride();

    // every input is converted at the sampling rate, so the ADC runs `stride` times faster
    let div = clock_divider(config.conversion_rate_hz());
    let frame_len = config.frame_len();
    info!(
        "ADC sampling started: inputs {:?}, stride {}, frame {} codes, divider {}",
        config.channels.adc_inputs(),
        stride,
        frame_len,
        div
    );

    let mut codes = [0u16; MAX_FRAME_LEN];
    loop {
        let transfer = adc.read_many_multichannel(&mut channels[..stride], &mut codes[..frame_len], div, r.dma.reborrow());

        match select(transfer, shutdown.changed()).await {
            Either::First(Ok(())) => CONVERSION_DONE.signal(ConversionFrame { codes, len: frame_len }),
            Either::First(Err(e)) => {
                warn!("ADC transfer failed: {:?}", e);
                CONVERSION_DONE.signal(ConversionFrame { codes, len: 0 });
            }
            Either::Second(_) => {
                info!("ADC sampling stopped");
                return;
            }
        }
    }
}
