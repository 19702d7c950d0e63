//! Arm light adapter

use super::{DeviceState, StatePublisher};
use crate::controller::TentaluxController;
use crate::error::AppResult;
use crate::rig::protocol::ArmCommand;
use crate::snapshot::Snapshot;
use crate::subscriber::Subscriber;
use parking_lot::Mutex;
use std::sync::Arc;

/// Brightness used by `turn_on` when none is given
pub const DEFAULT_BRIGHTNESS: u8 = 255;

/// A dimmable light backed by one arm.
///
/// The cached level starts at 0 and follows the controller's snapshot; it is
/// only ever written by [`on_possible_change`](Subscriber::on_possible_change).
pub struct TentaluxLight {
    controller: TentaluxController,
    name: String,
    addr: usize,
    level: Mutex<u8>,
    publisher: Arc<dyn StatePublisher>,
}

impl TentaluxLight {
    /// Light `name` for arm `addr`.
    pub fn new(
        controller: TentaluxController,
        name: impl Into<String>,
        addr: usize,
        publisher: Arc<dyn StatePublisher>,
    ) -> Self {
        Self {
            controller,
            name: name.into(),
            addr,
            level: Mutex::new(0),
            publisher,
        }
    }

    /// Entity name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arm index.
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Last observed brightness.
    pub fn brightness(&self) -> u8 {
        *self.level.lock()
    }

    /// True unless the last observed brightness is 0.
    pub fn is_on(&self) -> bool {
        self.brightness() != 0
    }

    /// Arms are dimmable.
    pub fn supports_brightness(&self) -> bool {
        true
    }

    /// Current state as published to the hub.
    pub fn state(&self) -> DeviceState {
        let brightness = self.brightness();
        DeviceState::Light {
            brightness,
            is_on: brightness != 0,
        }
    }

    /// Set the arm to `brightness`, or full brightness when `None`.
    pub async fn turn_on(&self, brightness: Option<u8>) -> AppResult<()> {
        let brightness = brightness.unwrap_or(DEFAULT_BRIGHTNESS);
        self.controller
            .control_some(&[ArmCommand::new(self.addr, brightness)])
            .await?;
        Ok(())
    }

    /// Set the arm to brightness 0.
    pub async fn turn_off(&self) -> AppResult<()> {
        self.controller
            .control_some(&[ArmCommand::new(self.addr, 0)])
            .await?;
        Ok(())
    }
}

impl Subscriber for TentaluxLight {
    fn subscriber_id(&self) -> &str {
        &self.name
    }

    fn on_possible_change(&self, snapshot: &Snapshot) -> bool {
        let Some(observed) = snapshot.brightness(self.addr) else {
            return false;
        };
        let mut level = self.level.lock();
        if *level == observed {
            return false;
        }
        *level = observed;
        true
    }

    fn publish(&self) {
        self.publisher.publish(&self.name, &self.state());
    }
}
