//! Hub-side wiring
//!
//! [`TentaluxPlatform::setup`] is what the hub calls at startup: it connects
//! the controller (failing fast if the rig is unreachable), creates one light
//! per arm, one scene per pose and the camera, and subscribes them all.
//! [`TentaluxPlatform::shutdown`] is the stop hook.

use crate::config::TentaluxConfig;
use crate::controller::TentaluxController;
use crate::devices::{StatePublisher, TentaluxCamera, TentaluxLight, TentaluxScene};
use crate::error::AppResult;
use crate::rig::transport::RigTransport;
use crate::subscriber::Subscriber;
use std::sync::Arc;
use tracing::info;

/// A connected rig and its devices.
pub struct TentaluxPlatform {
    controller: TentaluxController,
    lights: Vec<Arc<TentaluxLight>>,
    scenes: Vec<Arc<TentaluxScene>>,
    camera: Arc<TentaluxCamera>,
}

impl TentaluxPlatform {
    /// Connect to the rig behind `transport` and create its devices.
    ///
    /// Devices are named after `config.application.name`:
    /// `"{name} arm {n}"`, `"{name} {pose}"` and `"{name} camera"`.
    ///
    /// # Errors
    /// Connection and pose query failures are returned as-is.
    pub async fn setup(
        config: &TentaluxConfig,
        transport: Arc<dyn RigTransport>,
        publisher: Arc<dyn StatePublisher>,
    ) -> AppResult<Self> {
        let controller = TentaluxController::from_config(transport, config);
        controller.connect().await?;

        let name = &config.application.name;
        let lights: Vec<_> = (0..controller.arms())
            .map(|n| {
                Arc::new(TentaluxLight::new(
                    controller.clone(),
                    format!("{} arm {}", name, n),
                    n,
                    publisher.clone(),
                ))
            })
            .collect();

        let poses = match controller.get_poses().await {
            Ok(poses) => poses,
            Err(e) => {
                controller.close().await;
                return Err(e);
            }
        };
        let scenes: Vec<_> = poses
            .into_iter()
            .map(|pose| {
                Arc::new(TentaluxScene::new(
                    controller.clone(),
                    format!("{} {}", name, pose),
                    pose,
                    publisher.clone(),
                ))
            })
            .collect();

        let camera = Arc::new(
            TentaluxCamera::new(controller.clone(), format!("{} camera", name), publisher)
                .with_timeout(config.camera_timeout())
                .with_framerate(config.camera.framerate),
        );

        let platform = Self {
            controller,
            lights,
            scenes,
            camera,
        };
        for device in platform.devices() {
            platform.controller.subscribe(device);
        }

        info!(
            lights = platform.lights.len(),
            scenes = platform.scenes.len(),
            "Tentalux platform ready"
        );
        Ok(platform)
    }

    fn devices(&self) -> Vec<Arc<dyn Subscriber>> {
        let mut devices: Vec<Arc<dyn Subscriber>> = Vec::new();
        devices.extend(self.lights.iter().map(|l| l.clone() as Arc<dyn Subscriber>));
        devices.extend(self.scenes.iter().map(|s| s.clone() as Arc<dyn Subscriber>));
        devices.push(self.camera.clone());
        devices
    }

    /// The shared controller.
    pub fn controller(&self) -> &TentaluxController {
        &self.controller
    }

    /// One light per arm, in arm order.
    pub fn lights(&self) -> &[Arc<TentaluxLight>] {
        &self.lights
    }

    /// Light for arm `addr`.
    pub fn light(&self, addr: usize) -> Option<&Arc<TentaluxLight>> {
        self.lights.get(addr)
    }

    /// One scene per pose.
    pub fn scenes(&self) -> &[Arc<TentaluxScene>] {
        &self.scenes
    }

    /// Scene for `pose`.
    pub fn scene(&self, pose: &str) -> Option<&Arc<TentaluxScene>> {
        self.scenes.iter().find(|s| s.pose().as_str() == pose)
    }

    /// The rig camera.
    pub fn camera(&self) -> &Arc<TentaluxCamera> {
        &self.camera
    }

    /// Publish every device's current state once.
    pub fn publish_all(&self) {
        for device in self.devices() {
            device.publish();
        }
    }

    /// Stop polling. Devices stay usable for explicit commands.
    pub async fn shutdown(&self) {
        self.controller.close().await;
    }
}
