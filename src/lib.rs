//! # Tentalux Bridge Library
//!
//! Bridges a home-automation hub to the Tentalux robotic-arm lighting rig,
//! which exposes a small unauthenticated HTTP API. The heart of the crate is
//! [`controller::TentaluxController`]: it polls the rig, turns commands into
//! requests, keeps the last known state of every arm and tells subscribers when
//! the state they track changed.
//!
//! ## Crate Structure
//!
//! - **`error`**: `TentaluxError` and the `AppResult<T>` alias.
//! - **`config`**: Layered configuration (TOML file + `TENTALUX_` environment).
//! - **`logging`**: `tracing-subscriber` setup (pretty, compact or JSON output).
//! - **`rig`**: Wire protocol, the `RigTransport` seam, the reqwest-backed
//!   `HttpTransport` and the in-process `MockTransport`.
//! - **`snapshot`**: Immutable per-arm state as of one rig answer.
//! - **`subscriber`**: The change-probe interface and the identity-keyed set.
//! - **`controller`**: Poll loop, commands and notification.
//! - **`devices`**: Light, scene and camera adapters plus `DeviceState`.
//! - **`platform`**: Startup and shutdown wiring for the hub.

pub mod config;
pub mod controller;
pub mod devices;
pub mod error;
pub mod logging;
pub mod platform;
pub mod rig;
pub mod snapshot;
pub mod subscriber;

pub use controller::TentaluxController;
pub use error::{AppResult, TentaluxError};
pub use snapshot::{ArmRecord, Snapshot};
