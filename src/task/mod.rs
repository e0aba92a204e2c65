//! Task implementations

pub mod acquire;
pub mod ble_host;
pub mod orchestrate;
pub mod radio;
pub mod sample_adc;
pub mod status_led;
