mod common;

use common::FakeDevice;
use httpmock::prelude::*;
use icedespresso::core::ws2822::{
    address_program_message, tile_frame, ProgrammingTimings, Ws2822, CHANNEL_COUNT_REG,
    DATA_MODE_REG, POWER_REG, SEND_DMX_REG,
};
use icedespresso::{DeviceError, IcedEspresso};
use serde_json::json;
use std::time::Duration;

fn fast_driver(device: FakeDevice) -> Ws2822<FakeDevice> {
    Ws2822::new(device)
        .with_timings(ProgrammingTimings::immediate())
        .with_poll_interval(Duration::ZERO)
}

#[tokio::test]
async fn test_send_dmx_waits_for_send_register() {
    let device = FakeDevice::new();
    let driver = fast_driver(device.clone());

    let frame = tile_frame(1, [255, 0, 0]);
    driver.send_dmx(&frame).await.unwrap();

    let state = device.state.lock().unwrap();
    assert_eq!(state.dmx_frames, vec![frame]);
    assert_eq!(state.register_writes, vec![(SEND_DMX_REG, 1)]);
    assert_eq!(state.send_polls, 1);
    assert_eq!(state.registers[&SEND_DMX_REG], 0);
}

#[tokio::test]
async fn test_send_dmx_rejects_oversized_frame() {
    let device = FakeDevice::new();
    let driver = fast_driver(device.clone());

    let err = tokio_test::assert_err!(driver.send_dmx(&[0u8; 513]).await);
    assert!(matches!(err, DeviceError::InvalidInput { .. }));
    assert!(device.state.lock().unwrap().dmx_frames.is_empty());
}

#[tokio::test]
async fn test_program_address_sequence() {
    let device = FakeDevice::new();
    let driver = fast_driver(device.clone());

    driver.program_address(4).await.unwrap();

    let state = device.state.lock().unwrap();
    assert_eq!(
        state.register_writes,
        vec![
            (DATA_MODE_REG, 0b00),
            (POWER_REG, 0),
            (POWER_REG, 1),
            (DATA_MODE_REG, 0b10),
            (DATA_MODE_REG, 0b00),
            (DATA_MODE_REG, 0b10),
            (CHANNEL_COUNT_REG, 3),
            (SEND_DMX_REG, 1),
            (DATA_MODE_REG, 0b11),
            (DATA_MODE_REG, 0b00),
            (POWER_REG, 0),
            (POWER_REG, 1),
            (DATA_MODE_REG, 0b01),
        ]
    );
    assert_eq!(state.dmx_frames, vec![address_program_message(4).unwrap()]);
}

#[tokio::test]
async fn test_power_reads_low_bit() {
    let device = FakeDevice::new();
    let driver = fast_driver(device.clone());

    tokio_test::assert_ok!(driver.set_power(true).await);
    assert!(driver.power().await.unwrap());
    device.state.lock().unwrap().registers.insert(POWER_REG, 0x0002);
    assert!(!driver.power().await.unwrap());
}

#[tokio::test]
async fn test_stuck_send_register_times_out() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(PUT).path("/dmx");
        then.status(200).json_body(json!({"code": 0, "message": "Ok"}));
    });
    server.mock(|when, then| {
        when.method(PUT).path("/fpga/register").query_param("address", "3");
        then.status(200).json_body(json!({"code": 0, "message": "Ok"}));
    });
    let poll = server.mock(|when, then| {
        when.method(GET).path("/fpga/register").query_param("address", "3");
        then.status(200).json_body(json!({"value": 1}));
    });

    let driver = Ws2822::new(IcedEspresso::new(&server.base_url()).unwrap())
        .with_poll_timeout(Duration::from_millis(50))
        .with_poll_interval(Duration::from_millis(10));

    let err = driver.send_dmx(&[1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, DeviceError::Timeout { .. }));
    assert!(poll.hits() >= 2);
}
