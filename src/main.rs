//! NPG-Lite firmware entry point
//!
//! Brings up persistent identity and the radio, then spawns the session
//! tasks:
//! - `sample_adc` converts the electrode inputs and signals finished frames
//! - `acquire` turns frames into packets while streaming is enabled
//! - `ble_host` serves the GATT database and forwards packets
//! - `orchestrate` turns session events into indications and shutdown
//! - `status_led` shows the latest indication

#![no_std]
#![no_main]

use crate::system::identity;
use crate::task::{
    acquire::acquire, ble_host::ble_host, orchestrate::orchestrate, radio, sample_adc::sample_adc,
    status_led::status_led,
};
use defmt::{Debug2Format, error, info};
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use npg_lite_core::StreamState;
use npg_lite_core::config::{AcquisitionConfig, PACKET_RATE_HZ, SAMPLING_RATE_HZ};
use static_cell::StaticCell;
use system::resources::{
    AcquisitionResources, AssignedResources, IdentityResources, RadioResources, StatusLedResources,
};
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[unsafe(link_section = ".start_block")]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// System core modules
mod system;
/// Task implementations
mod task;

/// Streaming flag shared by the command processor, the link manager and acquisition
static STREAM_STATE: StaticCell<StreamState> = StaticCell::new();

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    // Split the resources into separate groups for each task
    let r = split_resources!(p);

    info!(
        "NPG-Lite starting: {} Hz sampling, {} packets/s, channels {:?}",
        SAMPLING_RATE_HZ,
        PACKET_RATE_HZ,
        AcquisitionConfig::ACTIVE.channels.adc_inputs()
    );

    // Without a working identity store the device must not come up
    let address = match identity::load_or_create(r.identity).await {
        Ok(address) => address,
        Err(e) => {
            error!("Identity storage failed, aborting startup: {}", Debug2Format(&e));
            return;
        }
    };

    let controller = match radio::init(spawner, r.radio).await {
        Ok(controller) => controller,
        Err(e) => {
            error!("Radio bring-up failed, aborting startup: {}", Debug2Format(&e));
            return;
        }
    };

    let stream: &'static StreamState = STREAM_STATE.init(StreamState::new());

    // Consumers first so that no event or frame is lost
    spawner.spawn(orchestrate()).unwrap();
    spawner.spawn(status_led(r.status_led)).unwrap();
    spawner.spawn(ble_host(controller, address, stream)).unwrap();
    spawner.spawn(acquire(stream)).unwrap();
    spawner.spawn(sample_adc(r.acquisition)).unwrap();
}
