mod common;

use common::FakeDevice;
use httpmock::prelude::*;
use icedespresso::core::bitmap::sweep_frame;
use icedespresso::core::broadcast::broadcast_bitmap;
use icedespresso::{Bitmap, DeviceError, IcedEspresso};
use std::time::Duration;

#[tokio::test]
async fn test_one_failing_device_does_not_stop_the_rest() {
    let healthy = MockServer::start();
    let broken = MockServer::start();
    let healthy_mock = healthy.mock(|when, then| {
        when.method(PUT)
            .path("/bitmap")
            .header("content-type", "application/octet-stream");
        then.status(200).body(r#"{"code":0,"message":"Ok"}"#);
    });
    broken.mock(|when, then| {
        when.method(PUT).path("/bitmap");
        then.status(500).body("panel driver crashed");
    });

    let devices = vec![
        (
            "broken".to_string(),
            IcedEspresso::new(&broken.base_url()).unwrap(),
        ),
        (
            "healthy".to_string(),
            IcedEspresso::new(&healthy.base_url()).unwrap(),
        ),
    ];

    let outcomes = broadcast_bitmap(devices, sweep_frame(3).as_bytes(), 1)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].device, "broken");
    assert_eq!(outcomes[0].result.as_ref().unwrap_err().status(), Some(500));
    assert_eq!(outcomes[1].device, "healthy");
    assert!(outcomes[1].is_ok());
    healthy_mock.assert();
}

#[tokio::test]
async fn test_every_device_gets_the_same_frame() {
    let boards: Vec<FakeDevice> = (0..4).map(|_| FakeDevice::new()).collect();
    let devices = boards
        .iter()
        .enumerate()
        .map(|(i, board)| (format!("panel-{}", i), board.clone()))
        .collect();

    let mut bitmap = Bitmap::new();
    bitmap.draw_line((0, 0), (15, 31), 200);
    let outcomes = broadcast_bitmap(devices, bitmap.as_bytes(), 2).await.unwrap();

    assert!(outcomes.iter().all(|o| o.is_ok()));
    for board in &boards {
        assert_eq!(board.state.lock().unwrap().bitmaps, vec![bitmap.as_bytes().to_vec()]);
    }
}

#[tokio::test]
async fn test_zero_concurrency_is_rejected() {
    let devices = vec![("a".to_string(), FakeDevice::new())];
    let err = broadcast_bitmap(devices, &[0u8; 512], 0).await.unwrap_err();
    assert!(matches!(err, DeviceError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_in_flight_pushes_never_exceed_concurrency() {
    let boards: Vec<FakeDevice> = (0..10)
        .map(|_| FakeDevice::new().with_bitmap_delay(Duration::from_millis(30)))
        .collect();
    // Every board shares one state so the in-flight counter spans the whole broadcast
    let shared = boards[0].state.clone();
    let devices = boards
        .into_iter()
        .enumerate()
        .map(|(i, mut board)| {
            board.state = shared.clone();
            (format!("panel-{}", i), board)
        })
        .collect();

    let outcomes = broadcast_bitmap(devices, &[0u8; 512], 3).await.unwrap();

    assert_eq!(outcomes.len(), 10);
    assert!(outcomes.iter().all(|o| o.is_ok()));
    let state = shared.lock().unwrap();
    assert_eq!(state.max_bitmaps_in_flight, 3);
    assert_eq!(state.bitmaps_in_flight, 0);
    assert_eq!(state.bitmaps.len(), 10);
}

#[tokio::test]
async fn test_elapsed_excludes_waiting_for_a_permit() {
    let devices = (0..4)
        .map(|i| {
            (
                format!("panel-{}", i),
                FakeDevice::new().with_bitmap_delay(Duration::from_millis(40)),
            )
        })
        .collect();

    let outcomes = broadcast_bitmap(devices, &[0u8; 512], 1).await.unwrap();

    // Serialized pushes: the last one waited ~120ms for its permit
    for outcome in &outcomes {
        assert!(
            outcome.elapsed < Duration::from_millis(100),
            "{} took {:?}",
            outcome.device,
            outcome.elapsed
        );
    }
}

#[tokio::test]
async fn test_panicking_push_keeps_other_outcomes() {
    let devices = vec![
        ("left".to_string(), FakeDevice::new()),
        ("crashed".to_string(), FakeDevice::new().panicking_on_bitmap()),
        ("right".to_string(), FakeDevice::new()),
    ];

    let outcomes = broadcast_bitmap(devices, &[0u8; 512], 2).await.unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_ok());
    assert_eq!(outcomes[1].device, "crashed");
    assert!(matches!(outcomes[1].result, Err(DeviceError::TaskError(_))));
    assert!(outcomes[2].is_ok());
}
