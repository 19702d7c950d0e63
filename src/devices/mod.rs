//! Hub-facing device adapters
//!
//! Each adapter is a plain struct composed of a controller handle, its identity
//! (arm number or pose) and a [`StatePublisher`] that carries [`DeviceState`]
//! values to the hub. Adapters implement [`Subscriber`](crate::subscriber::Subscriber)
//! so the controller can ask them to diff and publish after every update.
//!
//! - [`TentaluxLight`]: one dimmable light per arm
//! - [`TentaluxScene`]: one stateless trigger per pose
//! - [`TentaluxCamera`]: still images from the rig camera

pub mod camera;
pub mod light;
pub mod scene;

pub use camera::TentaluxCamera;
pub use light::TentaluxLight;
pub use scene::TentaluxScene;

use serde::Serialize;

/// State of one device as published to the hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceState {
    /// Arm light
    Light {
        /// Last observed brightness, 0..=255
        brightness: u8,
        /// `brightness != 0`
        is_on: bool,
    },
    /// Pose trigger
    Scene {
        /// Pose activated by this scene
        pose: String,
    },
    /// Rig camera
    Camera {
        /// Still image URL
        url: String,
    },
}

/// Sink for device state changes (the hub side).
pub trait StatePublisher: Send + Sync {
    /// Publish `state` for the device named `entity`.
    fn publish(&self, entity: &str, state: &DeviceState);
}

impl<F> StatePublisher for F
where
    F: Fn(&str, &DeviceState) + Send + Sync,
{
    fn publish(&self, entity: &str, state: &DeviceState) {
        self(entity, state)
    }
}

/// Publisher forwarding every update into an unbounded channel.
pub fn channel_publisher(
    tx: tokio::sync::mpsc::UnboundedSender<(String, DeviceState)>,
) -> impl StatePublisher {
    move |entity: &str, state: &DeviceState| {
        if tx.send((entity.to_string(), state.clone())).is_err() {
            tracing::debug!(entity, "State receiver closed, dropping update");
        }
    }
}
