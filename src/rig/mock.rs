//! Mock rig for testing without hardware
//!
//! [`MockTransport`] answers the rig API from an in-memory model: a set of arms
//! with position and brightness, a pose table and a camera image. Tests (and the
//! `--mock` flag of the command line tool) use it in place of
//! [`HttpTransport`](crate::rig::transport::HttpTransport).
//!
//! Fault injection:
//! - [`fail_next`](MockTransport::fail_next) makes the next N requests fail with
//!   a network error
//! - [`respond_with`](MockTransport::respond_with) queues a raw JSON body that
//!   replaces the next JSON answer
//! - [`set_latency`](MockTransport::set_latency) /
//!   [`set_camera_latency`](MockTransport::set_camera_latency) delay answers
//!   using `tokio::time::sleep`, so paused-clock tests stay fast

use crate::error::{AppResult, TentaluxError};
use crate::rig::protocol::{
    ArmCommand, CAMERA_PATH, CONTROL_FIELD, CONTROL_SOME_PATH, POSE_FIELD, QUERY_POSES_PATH,
    SET_POSE_PATH, STATUS_PATH,
};
use crate::rig::transport::RigTransport;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;

/// Base URL reported by the mock
pub const MOCK_BASE_URL: &str = "http://mock-tentalux:80";

/// One request as seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// "GET" or "POST"
    pub method: &'static str,
    /// Endpoint path
    pub path: String,
    /// Form fields, in order
    pub form: Vec<(String, String)>,
}

/// Simulated arm: x, y, brightness, angle (the ARB layout).
#[derive(Debug, Clone, Copy)]
struct MockArm {
    x: f64,
    y: f64,
    brightness: u8,
    angle: f64,
}

impl MockArm {
    fn to_arb(self) -> Value {
        json!([self.x, self.y, self.brightness, self.angle])
    }
}

struct MockState {
    arms: Vec<MockArm>,
    poses: Vec<(String, u8)>,
    active_pose: Option<String>,
    camera_image: Option<Bytes>,
    failures_remaining: usize,
    scripted: VecDeque<Value>,
    latency: Duration,
    camera_latency: Duration,
    requests: Vec<RecordedRequest>,
}

/// In-process simulated rig.
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(4)
    }
}

impl MockTransport {
    /// Create a mock rig with `arms` dark arms and the default pose table
    /// (`rest` = 0, `reading` = 200, `party` = 255).
    pub fn new(arms: usize) -> Self {
        let arms = (0..arms)
            .map(|n| MockArm {
                x: n as f64,
                y: 0.0,
                brightness: 0,
                angle: 0.0,
            })
            .collect();

        Self {
            state: Mutex::new(MockState {
                arms,
                poses: vec![
                    ("rest".to_string(), 0),
                    ("reading".to_string(), 200),
                    ("party".to_string(), 255),
                ],
                active_pose: None,
                camera_image: None,
                failures_remaining: 0,
                scripted: VecDeque::new(),
                latency: Duration::ZERO,
                camera_latency: Duration::ZERO,
                requests: Vec::new(),
            }),
        }
    }

    /// Replace the pose table. Activating a pose sets every arm to its brightness.
    pub fn with_poses<I, S>(self, poses: I) -> Self
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
    {
        self.state.lock().poses = poses.into_iter().map(|(n, b)| (n.into(), b)).collect();
        self
    }

    /// Serve `image` from `/camera`.
    pub fn with_camera_image(self, image: impl Into<Bytes>) -> Self {
        self.set_camera_image(Some(image.into()));
        self
    }

    /// Change (or remove) the camera image.
    pub fn set_camera_image(&self, image: Option<Bytes>) {
        self.state.lock().camera_image = image;
    }

    /// Change an arm's brightness on the rig side, as a wall switch would.
    pub fn set_brightness(&self, number: usize, brightness: u8) {
        if let Some(arm) = self.state.lock().arms.get_mut(number) {
            arm.brightness = brightness;
        }
    }

    /// Current rig-side brightness of an arm.
    pub fn brightness(&self, number: usize) -> Option<u8> {
        self.state.lock().arms.get(number).map(|a| a.brightness)
    }

    /// Last pose activated on the mock.
    pub fn active_pose(&self) -> Option<String> {
        self.state.lock().active_pose.clone()
    }

    /// Make the next `count` requests fail with a network error.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().failures_remaining = count;
    }

    /// Answer the next JSON request with `body` instead of the simulated state.
    pub fn respond_with(&self, body: Value) {
        self.state.lock().scripted.push_back(body);
    }

    /// Delay every JSON answer.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// Delay camera answers.
    pub fn set_camera_latency(&self, latency: Duration) {
        self.state.lock().camera_latency = latency;
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Number of requests to `path` received so far.
    pub fn request_count_for(&self, path: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    /// Record the request and consume one injected failure if any is pending.
    fn begin(
        &self,
        method: &'static str,
        path: &str,
        form: &[(&str, &str)],
    ) -> AppResult<Duration> {
        let mut state = self.state.lock();
        state.requests.push(RecordedRequest {
            method,
            path: path.to_string(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            tracing::debug!(path, "Mock rig injecting network failure");
            return Err(TentaluxError::Network(format!(
                "mock rig refused connection to {}",
                path
            )));
        }

        Ok(if path == CAMERA_PATH {
            state.camera_latency
        } else {
            state.latency
        })
    }

    fn handle_json(&self, method: &str, path: &str, form: &[(&str, &str)]) -> AppResult<Value> {
        let mut state = self.state.lock();
        if let Some(body) = state.scripted.pop_front() {
            return Ok(body);
        }

        match (method, path) {
            ("POST", STATUS_PATH) => Ok(Self::echo(&state)),
            ("POST", CONTROL_SOME_PATH) => {
                let data = form_value(form, CONTROL_FIELD).ok_or_else(|| {
                    TentaluxError::Network("mock rig: 400 Bad Request (missing data)".into())
                })?;
                let commands: Vec<ArmCommand> = serde_json::from_str(data).map_err(|e| {
                    TentaluxError::Network(format!("mock rig: 400 Bad Request ({})", e))
                })?;
                for command in commands {
                    match state.arms.get_mut(command.number) {
                        Some(arm) => arm.brightness = command.brightness,
                        None => tracing::warn!(arm = command.number, "Mock rig: no such arm"),
                    }
                }
                Ok(Self::echo(&state))
            }
            ("GET", QUERY_POSES_PATH) => Ok(Value::Array(
                state
                    .poses
                    .iter()
                    .map(|(name, _)| Value::String(name.clone()))
                    .collect(),
            )),
            ("POST", SET_POSE_PATH) => {
                let pose = form_value(form, POSE_FIELD).ok_or_else(|| {
                    TentaluxError::Network("mock rig: 400 Bad Request (missing pose)".into())
                })?;
                let level = state
                    .poses
                    .iter()
                    .find(|(name, _)| name == pose)
                    .map(|(_, level)| *level)
                    .ok_or_else(|| {
                        TentaluxError::Network(format!("mock rig: 404 unknown pose '{}'", pose))
                    })?;
                for (n, arm) in state.arms.iter_mut().enumerate() {
                    arm.brightness = level;
                    arm.angle = 15.0 * n as f64;
                }
                state.active_pose = Some(pose.to_string());
                Ok(Self::echo(&state))
            }
            _ => Err(TentaluxError::Network(format!(
                "mock rig: 404 {} {}",
                method, path
            ))),
        }
    }

    fn echo(state: &MockState) -> Value {
        json!({ "ARBs": state.arms.iter().map(|a| a.to_arb()).collect::<Vec<_>>() })
    }
}

fn form_value<'a>(form: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    form.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[async_trait]
impl RigTransport for MockTransport {
    async fn post(&self, path: &str, form: &[(&str, &str)]) -> AppResult<Value> {
        let latency = self.begin("POST", path, form)?;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.handle_json("POST", path, form)
    }

    async fn get(&self, path: &str) -> AppResult<Value> {
        let latency = self.begin("GET", path, &[])?;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.handle_json("GET", path, &[])
    }

    async fn get_bytes(&self, path: &str) -> AppResult<Bytes> {
        let latency = self.begin("GET", path, &[])?;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if path != CAMERA_PATH {
            return Err(TentaluxError::Network(format!("mock rig: 404 GET {}", path)));
        }
        self.state
            .lock()
            .camera_image
            .clone()
            .ok_or_else(|| TentaluxError::Network("mock rig: camera offline".into()))
    }

    fn base_url(&self) -> &str {
        MOCK_BASE_URL
    }
}
