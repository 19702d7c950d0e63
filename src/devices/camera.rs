//! Rig camera adapter
//!
//! Image fetches are bounded by a timeout. On timeout or transport failure the
//! last good image is served instead and the failure is logged; callers never
//! see an error, only `None` when nothing was ever fetched.

use super::{DeviceState, StatePublisher};
use crate::controller::TentaluxController;
use crate::error::{AppResult, TentaluxError};
use crate::rig::protocol::CAMERA_PATH;
use crate::snapshot::Snapshot;
use crate::subscriber::Subscriber;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Default bound on one image fetch
pub const DEFAULT_CAMERA_TIMEOUT: Duration = Duration::from_secs(10);

/// Default still-image rate, frames per second
pub const DEFAULT_FRAMERATE: f64 = 1.0;

/// Still camera on the rig.
pub struct TentaluxCamera {
    controller: TentaluxController,
    name: String,
    url: String,
    timeout: Duration,
    framerate: f64,
    last_image: Mutex<Option<Bytes>>,
    publisher: Arc<dyn StatePublisher>,
}

impl TentaluxCamera {
    /// Camera `name` with the default timeout and frame rate.
    pub fn new(
        controller: TentaluxController,
        name: impl Into<String>,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        let url = controller.camera_url();
        Self {
            controller,
            name: name.into(),
            url,
            timeout: DEFAULT_CAMERA_TIMEOUT,
            framerate: DEFAULT_FRAMERATE,
            last_image: Mutex::new(None),
            publisher,
        }
    }

    /// Override the fetch bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the frame rate. Non-positive values are ignored.
    pub fn with_framerate(mut self, framerate: f64) -> Self {
        if framerate.is_finite() && framerate > 0.0 {
            self.framerate = framerate;
        }
        self
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Still image URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Time between two frames (1 / framerate).
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.framerate)
    }

    /// State as published to the hub.
    pub fn state(&self) -> DeviceState {
        DeviceState::Camera {
            url: self.url.clone(),
        }
    }

    /// Fetch the current image, falling back to the last good one.
    pub async fn image(&self) -> Option<Bytes> {
        match self.fetch().await {
            Ok(image) => {
                *self.last_image.lock() = Some(image.clone());
                Some(image)
            }
            Err(e) => {
                error!(camera = %self.name, error = %e, "Camera image fetch failed");
                self.last_image.lock().clone()
            }
        }
    }

    async fn fetch(&self) -> AppResult<Bytes> {
        let transport = self.controller.transport();
        tokio::time::timeout(self.timeout, transport.get_bytes(CAMERA_PATH))
            .await
            .map_err(|_| TentaluxError::Timeout(self.timeout))?
    }
}

impl Subscriber for TentaluxCamera {
    fn subscriber_id(&self) -> &str {
        &self.name
    }

    // The image is pulled by the hub, not pushed on rig changes.
    fn on_possible_change(&self, _snapshot: &Snapshot) -> bool {
        false
    }

    fn publish(&self) {
        self.publisher.publish(&self.name, &self.state());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::mock::MockTransport;

    fn camera_for(mock: &Arc<MockTransport>) -> TentaluxCamera {
        let controller = TentaluxController::new(mock.clone(), Duration::from_millis(50));
        let publisher: Arc<dyn StatePublisher> = Arc::new(|_: &str, _: &DeviceState| {});
        TentaluxCamera::new(controller, "rig camera", publisher)
    }

    #[test]
    fn test_frame_interval() {
        let mock = Arc::new(MockTransport::new(1));
        let camera = camera_for(&mock);
        assert_eq!(camera.frame_interval(), Duration::from_secs(1));

        let camera = camera.with_framerate(4.0).with_framerate(0.0);
        assert_eq!(camera.frame_interval(), Duration::from_millis(250));
        assert_eq!(camera.url(), "http://mock-tentalux:80/camera");
    }

    #[tokio::test]
    async fn test_transport_error_serves_cached_image() {
        let mock = Arc::new(MockTransport::new(1).with_camera_image(&b"frame-1"[..]));
        let camera = camera_for(&mock);

        assert_eq!(camera.image().await.as_deref(), Some(&b"frame-1"[..]));

        mock.fail_next(1);
        assert_eq!(camera.image().await.as_deref(), Some(&b"frame-1"[..]));
    }

    #[tokio::test]
    async fn test_no_image_without_prior_fetch() {
        let mock = Arc::new(MockTransport::new(1));
        let camera = camera_for(&mock);
        assert!(camera.image().await.is_none());
    }
}
