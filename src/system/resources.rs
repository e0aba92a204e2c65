//! Hardware Resource Management
//!
//! Allocates pins, DMA channels and peripherals of the RP2350B to the tasks
//! that own them. Nothing is shared: every group is moved into exactly one
//! task at boot.
//!
//! # Resource Groups
//! - Acquisition: ADC with the three electrode inputs of each channel set and
//!   the battery divider tap
//! - Radio: CYW43439 in Bluetooth mode over PIO SPI
//! - Status LED: six-pixel WS2812 strip driven by PIO
//! - Identity: on-chip flash and TRNG for the persistent device address
//!
//! # DMA Channels
//! The radio, the ADC, the LED and the flash each get their own channel so
//! that no transfer ever waits on another peripheral.

use assign_resources::assign_resources;
use embassy_rp::adc::InterruptHandler as AdcInterruptHandler;
use embassy_rp::bind_interrupts;
use embassy_rp::peripherals::{self, PIO0, PIO1, TRNG};
use embassy_rp::pio::InterruptHandler as PioInterruptHandler;
use embassy_rp::trng::InterruptHandler as TrngInterruptHandler;

assign_resources! {
    /// Electrode inputs and battery tap (ADC inputs 0-6 on GPIO 40-46)
    acquisition: AcquisitionResources {
        adc: ADC,
        dma: DMA_CH1,
        primary_a: PIN_40,
        primary_b: PIN_41,
        primary_c: PIN_42,
        secondary_a: PIN_43,
        secondary_b: PIN_44,
        secondary_c: PIN_45,
        // VBAT through a 3:1 divider
        battery: PIN_46,
    },
    /// CYW43439 wireless chip, Bluetooth only
    radio: RadioResources {
        pwr: PIN_23,
        cs: PIN_25,
        dio: PIN_24,
        clk: PIN_29,
        pio: PIO0,
        dma: DMA_CH0,
    },
    /// WS2812 status strip
    status_led: StatusLedResources {
        pin: PIN_15,
        pio: PIO1,
        dma: DMA_CH2,
    },
    /// Persistent identity storage
    identity: IdentityResources {
        flash: FLASH,
        dma: DMA_CH3,
        trng: TRNG,
    },
}

bind_interrupts!(pub struct Irqs {
    ADC_IRQ_FIFO => AdcInterruptHandler;
    PIO0_IRQ_0 => PioInterruptHandler<PIO0>;
    PIO1_IRQ_0 => PioInterruptHandler<PIO1>;
    TRNG_IRQ => TrngInterruptHandler<TRNG>;
});
