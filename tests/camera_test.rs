//! Camera fetch timeout and fallback behaviour.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tentalux::devices::{DeviceState, StatePublisher, TentaluxCamera};
use tentalux::rig::MockTransport;
use tentalux::TentaluxController;

fn camera(mock: &Arc<MockTransport>) -> TentaluxCamera {
    let controller = TentaluxController::new(mock.clone(), Duration::from_millis(500));
    let publisher: Arc<dyn StatePublisher> = Arc::new(|_: &str, _: &DeviceState| {});
    TentaluxCamera::new(controller, "rig camera", publisher)
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_returns_cached_image() {
    let mock = Arc::new(MockTransport::new(1).with_camera_image(Bytes::from_static(b"first")));
    let camera = camera(&mock);
    assert_eq!(camera.image().await, Some(Bytes::from_static(b"first")));

    mock.set_camera_image(Some(Bytes::from_static(b"second")));
    mock.set_camera_latency(Duration::from_secs(11));

    let started = tokio::time::Instant::now();
    let image = camera.image().await;
    assert_eq!(image, Some(Bytes::from_static(b"first")));
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(started.elapsed() < Duration::from_secs(11));
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_without_cache_returns_none() {
    let mock = Arc::new(MockTransport::new(1).with_camera_image(Bytes::from_static(b"late")));
    mock.set_camera_latency(Duration::from_secs(30));
    let camera = camera(&mock);

    assert_eq!(camera.image().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_within_bound_refreshes_cache() {
    let mock = Arc::new(MockTransport::new(1).with_camera_image(Bytes::from_static(b"a")));
    mock.set_camera_latency(Duration::from_secs(9));
    let camera = camera(&mock);
    assert_eq!(camera.image().await, Some(Bytes::from_static(b"a")));

    mock.set_camera_image(Some(Bytes::from_static(b"b")));
    assert_eq!(camera.image().await, Some(Bytes::from_static(b"b")));

    // Camera goes offline: the last good frame is served.
    mock.set_camera_image(None);
    assert_eq!(camera.image().await, Some(Bytes::from_static(b"b")));
}

#[tokio::test(start_paused = true)]
async fn test_custom_timeout() {
    let mock = Arc::new(MockTransport::new(1).with_camera_image(Bytes::from_static(b"x")));
    mock.set_camera_latency(Duration::from_secs(3));
    let camera = camera(&mock).with_timeout(Duration::from_secs(2));

    assert_eq!(camera.image().await, None);
}
