//! Pose scene adapter

use super::{DeviceState, StatePublisher};
use crate::controller::TentaluxController;
use crate::error::AppResult;
use crate::rig::protocol::Pose;
use crate::snapshot::Snapshot;
use crate::subscriber::Subscriber;
use std::sync::Arc;

/// A stateless trigger that activates one rig pose.
pub struct TentaluxScene {
    controller: TentaluxController,
    name: String,
    pose: Pose,
    publisher: Arc<dyn StatePublisher>,
}

impl TentaluxScene {
    /// Scene `name` activating `pose`.
    pub fn new(
        controller: TentaluxController,
        name: impl Into<String>,
        pose: Pose,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        Self {
            controller,
            name: name.into(),
            pose,
            publisher,
        }
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pose this scene activates.
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// State as published to the hub.
    pub fn state(&self) -> DeviceState {
        DeviceState::Scene {
            pose: self.pose.to_string(),
        }
    }

    /// Activate the pose.
    pub async fn activate(&self) -> AppResult<()> {
        self.controller.set_pose(&self.pose).await?;
        Ok(())
    }
}

impl Subscriber for TentaluxScene {
    fn subscriber_id(&self) -> &str {
        &self.name
    }

    // Scenes track nothing.
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
    use crate::subscriber::Subscriber;
    use std::time::Duration;

    #[tokio::test]
    async fn test_activate_sets_pose() {
        let mock = Arc::new(MockTransport::new(2));
        let controller = TentaluxController::new(mock.clone(), Duration::from_millis(50));
        let publisher: Arc<dyn StatePublisher> = Arc::new(|_: &str, _: &DeviceState| {});
        let scene = TentaluxScene::new(
            controller.clone(),
            "rig party",
            Pose::new("party"),
            publisher,
        );

        scene.activate().await.unwrap();
        assert_eq!(mock.active_pose().as_deref(), Some("party"));
        assert_eq!(controller.snapshot().brightness(1), Some(255));
        assert!(!scene.on_possible_change(&controller.snapshot()));
    }
}
