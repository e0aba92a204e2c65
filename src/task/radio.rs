//! CYW43439 bring-up in Bluetooth mode
//!
//! The radio firmware, CLM blob and Bluetooth patch are flashed separately to
//! fixed addresses above the program image:
//!
//! ```text
//! probe-rs download 43439A0.bin     --binary-format bin --chip RP235x --base-address 0x10100000
//! probe-rs download 43439A0_clm.bin --binary-format bin --chip RP235x --base-address 0x10140000
//! probe-rs download 43439A0_btfw.bin --binary-format bin --chip RP235x --base-address 0x10141000
//! ```

use bt_hci::controller::ExternalController;
use cyw43::bluetooth::BtDriver;
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use defmt::info;
use embassy_executor::{SpawnError, Spawner};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::Pio;
use static_cell::StaticCell;

use crate::system::resources::{Irqs, RadioResources};

const FIRMWARE_ADDR: usize = 0x1010_0000;
const FIRMWARE_LEN: usize = 231_077;
const CLM_ADDR: usize = 0x1014_0000;
const CLM_LEN: usize = 984;
const BT_FIRMWARE_ADDR: usize = 0x1014_1000;
const BT_FIRMWARE_LEN: usize = 6_164;

/// HCI command slots for the controller
const HCI_SLOTS: usize = 10;

/// Bluetooth controller handed to the host stack
pub type BleController = ExternalController<BtDriver<'static>, HCI_SLOTS>;

/// Runs the CYW43439 driver
#[embassy_executor::task]
async fn cyw43_task(runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>) -> ! {
    runner.run().await
}

/// Powers up the radio, loads its firmware and returns the HCI controller
pub async fn init(spawner: Spawner, r: RadioResources) -> Result<BleController, SpawnError> {
    // SAFETY: the blobs are flashed to these ranges and flash is never written there
    let (fw, clm, btfw) = unsafe {
        (
            core::slice::from_raw_parts(FIRMWARE_ADDR as *const u8, FIRMWARE_LEN),
            core::slice::from_raw_parts(CLM_ADDR as *const u8, CLM_LEN),
            core::slice::from_raw_parts(BT_FIRMWARE_ADDR as *const u8, BT_FIRMWARE_LEN),
        )
    };

    let pwr = Output::new(r.pwr, Level::Low);
    let cs = Output::new(r.cs, Level::High);
    let mut pio = Pio::new(r.pio, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        r.dio,
        r.clk,
        r.dma,
    );

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (_net_device, bt_device, mut control, runner) = cyw43::new_with_bluetooth(state, pwr, spi, fw, btfw).await;
    spawner.spawn(cyw43_task(runner))?;
    control.init(clm).await;
    info!("Radio ready");

    Ok(ExternalController::new(bt_device))
}
