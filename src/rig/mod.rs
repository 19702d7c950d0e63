//! Rig API access
//!
//! - [`protocol`]: endpoint paths, command payloads and response parsing
//! - [`transport`]: the [`RigTransport`] seam and its `reqwest` implementation
//! - [`mock`]: an in-process simulated rig

pub mod mock;
pub mod protocol;
pub mod transport;

pub use mock::MockTransport;
pub use protocol::{ArmCommand, Pose};
pub use transport::{HttpTransport, RigTransport};
