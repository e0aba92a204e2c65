//! BLE Host
//!
//! GATT server with one primary service and two characteristics:
//! - data: notify only, one 175-byte packet per notification
//! - control: read, write and notify; ASCII commands in, ASCII replies out
//!
//! Advertises connectable and scannable for 30 s at a time, restarting until
//! a host connects and again after every disconnect. One connection at a
//! time. The link state machine lives in [`ConnectionManager`]; this task
//! only translates stack events into link events and carries out the
//! resulting actions.
//!
//! Stops for good when the battery cutoff shuts the session down.

use defmt::{Debug2Format, debug, error, info, warn};
use embassy_futures::select::{Either, Either3, select, select3};
use embassy_time::Duration;
use npg_lite_core::config::{
    ADVERTISING_INTERVAL_MAX_MS, ADVERTISING_INTERVAL_MIN_MS, ADVERTISING_WINDOW_SECS, DEVICE_NAME, PACKET_SIZE,
};
use npg_lite_core::{
    CommandProcessor, ConnectionManager, LinkActions, LinkEvent, LinkTiming, ParamsRequest, Response, StreamState,
};
use trouble_host::prelude::*;

use crate::system::event::{self, Events};
use crate::system::identity::DeviceAddress;
use crate::system::shutdown;
use crate::task::acquire;
use crate::task::radio::BleController;

/// Only one host at a time
const CONNECTIONS_MAX: usize = 1;

/// Signal + ATT
const L2CAP_CHANNELS_MAX: usize = 2;

/// Longest control value (replies are at most 15 bytes)
const CONTROL_LEN: usize = 20;

#[gatt_server]
struct Server {
    npg: NpgService,
}

#[gatt_service(uuid = "4fafc201-1fb5-459e-8fcc-c5c9c331914b")]
struct NpgService {
    /// 25 rows of (counter, 3 x big-endian sample)
    #[characteristic(uuid = "beb5483e-36e1-4688-b7f5-ea07361b26a8", notify, value = [0u8; 175])]
    data: [u8; PACKET_SIZE],
    /// START, STOP, WHORU, STATUS
    #[characteristic(uuid = "0000ff01-0000-1000-8000-00805f9b34fb", read, write, notify)]
    control: heapless::Vec<u8, CONTROL_LEN>,
}

/// Serves the GATT database until shutdown
#[embassy_executor::task]
pub async fn ble_host(controller: BleController, address: DeviceAddress, stream: &'static StreamState) {
    let Some(mut shutdown) = shutdown::subscribe() else {
        error!("No shutdown slot left for the BLE host");
        return;
    };

    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> = HostResources::new();
    let stack = trouble_host::new(controller, &mut resources).set_random_address(Address::random(address.0));
    let Host {
        mut peripheral, runner, ..
    } = stack.build();

    let server = match Server::new_with_config(GapConfig::Peripheral(PeripheralConfig {
        name: DEVICE_NAME,
        appearance: &appearance::sensor::GENERIC_SENSOR,
    })) {
        Ok(server) => server,
        Err(e) => {
            error!("GATT server setup failed: {}", e);
            return;
        }
    };
    info!("BLE host started as {}", DEVICE_NAME);

    match select3(run_stack(runner), serve(&stack, &mut peripheral, &server, stream), shutdown.changed()).await {
        Either3::Third(_) => info!("BLE host stopped"),
        _ => error!("BLE host exited unexpectedly"),
    }
}

async fn run_stack<C: Controller>(mut runner: Runner<'_, C, DefaultPacketPool>) {
    if let Err(e) = runner.run().await {
        error!("BLE stack failed: {:?}", Debug2Format(&e));
    }
}

/// Advertise, serve one connection, repeat
async fn serve<'values, C: Controller>(
    stack: &Stack<'_, C, DefaultPacketPool>,
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    server: &Server<'values>,
    stream: &StreamState,
) {
    let mut link = ConnectionManager::new();
    loop {
        match advertise(peripheral, server).await {
            Ok(conn) => {
                acquire::discard_pending();
                // the stack does not report timing with the connection
                let actions = link.handle(LinkEvent::Connected { timing: None }, stream);
                if let Some(request) = actions.update_params {
                    request_params(stack, &conn, request).await;
                }
                report(&link, actions).await;

                let reason = match select(
                    gatt_events(stack, server, &conn, &mut link, stream),
                    forward_packets(server, &conn),
                )
                .await
                {
                    Either::First(reason) => reason,
                    Either::Second(never) => never,
                };

                if let Some(timing) = link.timing() {
                    debug!(
                        "Link closed at interval={}us latency={}",
                        timing.interval_us, timing.latency
                    );
                }
                let actions = link.handle(LinkEvent::Disconnected { reason }, stream);
                report(&link, actions).await;
            }
            Err(BleHostError::BleHost(Error::Timeout)) => {
                let actions = link.handle(LinkEvent::AdvertisingTimeout, stream);
                report(&link, actions).await;
            }
            Err(e) => {
                warn!("Connection attempt failed: {:?}", Debug2Format(&e));
                let actions = link.handle(LinkEvent::ConnectFailed, stream);
                report(&link, actions).await;
            }
        }
    }
}

/// Starts one advertising window and waits for a host to connect
async fn advertise<'values, 'server, C: Controller>(
    peripheral: &mut Peripheral<'values, C, DefaultPacketPool>,
    server: &'server Server<'values>,
) -> Result<GattConnection<'values, 'server, DefaultPacketPool>, BleHostError<C::Error>> {
    let mut adv_data = [0; 31];
    let len = AdStructure::encode_slice(
        &[
            AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
            AdStructure::CompleteLocalName(DEVICE_NAME.as_bytes()),
        ],
        &mut adv_data[..],
    )?;
    let params = AdvertisementParameters {
        interval_min: Duration::from_millis(ADVERTISING_INTERVAL_MIN_MS),
        interval_max: Duration::from_millis(ADVERTISING_INTERVAL_MAX_MS),
        timeout: Some(Duration::from_secs(ADVERTISING_WINDOW_SECS)),
        ..Default::default()
    };
    let advertiser = peripheral
        .advertise(
            &params,
            Advertisement::ConnectableScannableUndirected {
                adv_data: &adv_data[..len],
                scan_data: &[],
            },
        )
        .await?;
    info!("Advertising started");
    let conn = advertiser.accept().await?.with_attribute_server(server)?;
    Ok(conn)
}

/// Handles GATT traffic on one connection; returns the disconnect reason
async fn gatt_events<C: Controller>(
    stack: &Stack<'_, C, DefaultPacketPool>,
    server: &Server<'_>,
    conn: &GattConnection<'_, '_, DefaultPacketPool>,
    link: &mut ConnectionManager,
    stream: &StreamState,
) -> u8 {
    let data = &server.npg.data;
    let control = &server.npg.control;

    loop {
        match conn.next().await {
            GattConnectionEvent::Disconnected { reason } => return reason.into_inner(),
            GattConnectionEvent::ConnectionParamsUpdated {
                conn_interval,
                peripheral_latency,
                supervision_timeout,
            } => {
                let timing = LinkTiming {
                    interval_us: conn_interval.as_micros() as u32,
                    latency: peripheral_latency,
                    supervision_timeout_ms: supervision_timeout.as_millis() as u32,
                };
                let actions = link.handle(LinkEvent::ParamsUpdated(timing), stream);
                if let Some(request) = actions.update_params {
                    request_params(stack, conn, request).await;
                }
            }
            GattConnectionEvent::Gatt { event: request } => {
                let mut reply = None;
                match &request {
                    GattEvent::Read(read) if read.handle() == control.handle => {
                        let status = CommandProcessor.on_read(stream);
                        if let Err(e) = server.set(control, &control_value(status)) {
                            warn!("Control value update failed: {:?}", e);
                        }
                    }
                    GattEvent::Write(write) if write.handle() == control.handle => {
                        reply = Some(CommandProcessor.on_write(stream, write.data()));
                    }
                    GattEvent::Write(write) if Some(write.handle()) == data.cccd_handle => {
                        let enabled = write.data().first().is_some_and(|flags| flags & 0x01 != 0);
                        let actions = link.handle(LinkEvent::DataSubscription(enabled), stream);
                        event::send(Events::LinkChanged {
                            state: link.state(),
                            indication: actions.indication,
                        })
                        .await;
                    }
                    _ => {}
                }

                match request.accept() {
                    Ok(response) => response.send().await,
                    Err(e) => warn!("GATT response failed: {:?}", e),
                }

                if let Some(reply) = reply {
                    if reply.changed {
                        event::send(Events::StreamingChanged(stream.is_streaming())).await;
                    }
                    if let Err(e) = control.notify(conn, &control_value(reply.response)).await {
                        warn!("Control notification failed: {:?}", e);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Notifies queued data packets for as long as the connection lives
async fn forward_packets(server: &Server<'_>, conn: &GattConnection<'_, '_, DefaultPacketPool>) -> ! {
    let data = &server.npg.data;
    loop {
        let packet = acquire::next_packet().await;
        if let Err(e) = data.notify(conn, &packet).await {
            warn!("Data notification failed: {:?}", e);
        }
    }
}

/// Asks the central for the preferred peripheral latency
async fn request_params<C: Controller>(
    stack: &Stack<'_, C, DefaultPacketPool>,
    conn: &GattConnection<'_, '_, DefaultPacketPool>,
    request: ParamsRequest,
) {
    let params = ConnectParams {
        min_connection_interval: Duration::from_micros(request.interval_min_us as u64),
        max_connection_interval: Duration::from_micros(request.interval_max_us as u64),
        max_latency: request.latency,
        supervision_timeout: Duration::from_millis(request.supervision_timeout_ms as u64),
        ..Default::default()
    };
    match conn.raw().update_connection_params(stack, &params).await {
        Ok(()) => info!("Requested peripheral latency {}", request.latency),
        Err(e) => warn!("Connection parameter update failed: {:?}", Debug2Format(&e)),
    }
}

/// Passes link actions on to the orchestrator
async fn report(link: &ConnectionManager, actions: LinkActions) {
    if actions.indication.is_some() || actions.stopped_streaming {
        event::send(Events::LinkChanged {
            state: link.state(),
            indication: actions.indication,
        })
        .await;
    }
}

fn control_value(response: Response) -> heapless::Vec<u8, CONTROL_LEN> {
    heapless::Vec::from_slice(response.as_bytes()).unwrap_or_default()
}
