//! Rig HTTP API vocabulary
//!
//! Endpoint paths, the command payloads the rig accepts and the parsing of its
//! JSON answers. The rig echoes its full state (`{"ARBs": [...]}`) on `/status`,
//! `/controlsome` and `/s_pose`; each ARB is an array whose element at index
//! [`ARB_BRIGHTNESS_INDEX`] is the arm brightness. Other elements are positional
//! data that this crate carries along without interpreting.

use crate::error::{AppResult, TentaluxError};
use crate::snapshot::ArmRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Status query (POST, no body)
pub const STATUS_PATH: &str = "/status";
/// Batch brightness command (POST, form field `data`)
pub const CONTROL_SOME_PATH: &str = "/controlsome";
/// Pose listing (GET)
pub const QUERY_POSES_PATH: &str = "/q_poses";
/// Pose activation (POST, form field `pose`)
pub const SET_POSE_PATH: &str = "/s_pose";
/// Still camera image (GET, raw bytes)
pub const CAMERA_PATH: &str = "/camera";

/// Form field carrying the JSON command batch on `/controlsome`
pub const CONTROL_FIELD: &str = "data";
/// Form field carrying the pose identifier on `/s_pose`
pub const POSE_FIELD: &str = "pose";

/// Position of the brightness value inside one ARB
pub const ARB_BRIGHTNESS_INDEX: usize = 2;

/// One entry of a `/controlsome` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmCommand {
    /// Arm index
    pub number: usize,
    /// Target brightness
    pub brightness: u8,
}

impl ArmCommand {
    /// Command setting arm `number` to `brightness`.
    pub fn new(number: usize, brightness: u8) -> Self {
        Self { number, brightness }
    }
}

/// Encode a command batch as the JSON text sent in the `data` form field.
pub fn encode_commands(commands: &[ArmCommand]) -> AppResult<String> {
    Ok(serde_json::to_string(commands)?)
}

/// A named, rig-side preset configuration of all arms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pose(String);

impl Pose {
    /// Wrap a pose identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identifier as sent to the rig.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Pose {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Extract the ARB array from a state echo.
pub fn parse_arbs(body: &Value) -> AppResult<Vec<ArmRecord>> {
    let arbs = body
        .get("ARBs")
        .ok_or_else(|| TentaluxError::Protocol("response has no 'ARBs' field".into()))?
        .as_array()
        .ok_or_else(|| TentaluxError::Protocol("'ARBs' is not an array".into()))?;

    arbs.iter()
        .enumerate()
        .map(|(number, entry)| parse_arb(number, entry))
        .collect()
}

fn parse_arb(number: usize, entry: &Value) -> AppResult<ArmRecord> {
    let fields = entry
        .as_array()
        .ok_or_else(|| TentaluxError::Protocol(format!("ARB {} is not an array", number)))?;

    let raw = fields.get(ARB_BRIGHTNESS_INDEX).ok_or_else(|| {
        TentaluxError::Protocol(format!(
            "ARB {} has {} fields, brightness missing",
            number,
            fields.len()
        ))
    })?;

    let brightness = parse_brightness(raw).ok_or_else(|| {
        TentaluxError::Protocol(format!(
            "ARB {} brightness {} is not an integer in 0..=255",
            number, raw
        ))
    })?;

    Ok(ArmRecord::new(number, brightness, fields.clone()))
}

fn parse_brightness(value: &Value) -> Option<u8> {
    if let Some(int) = value.as_u64() {
        return u8::try_from(int).ok();
    }
    // Integral floats such as 128.0 are accepted
    let float = value.as_f64()?;
    if float.fract() == 0.0 && (0.0..=255.0).contains(&float) {
        Some(float as u8)
    } else {
        None
    }
}

/// Parse the `/q_poses` answer.
pub fn parse_poses(body: &Value) -> AppResult<Vec<Pose>> {
    let entries = body
        .as_array()
        .ok_or_else(|| TentaluxError::Protocol("pose list is not an array".into()))?;

    entries
        .iter()
        .map(|entry| match entry {
            Value::String(name) => Ok(Pose::new(name.clone())),
            Value::Number(n) => Ok(Pose::new(n.to_string())),
            other => Err(TentaluxError::Protocol(format!(
                "pose identifier {} is neither a string nor a number",
                other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_commands_shape() {
        let encoded = encode_commands(&[ArmCommand::new(0, 105)]).unwrap();
        assert_eq!(encoded, r#"[{"number":0,"brightness":105}]"#);
    }

    #[test]
    fn test_parse_arbs() {
        let body = json!({ "ARBs": [[0.5, 1.25, 0, 3], [2.0, -1.0, 255, 0], [0, 0, 128.0, 1]] });
        let arbs = parse_arbs(&body).unwrap();

        assert_eq!(arbs.len(), 3);
        assert_eq!(arbs[0].brightness(), 0);
        assert_eq!(arbs[1].brightness(), 255);
        assert_eq!(arbs[2].brightness(), 128);
        assert_eq!(arbs[1].number(), 1);
        assert_eq!(arbs[0].fields()[1], json!(1.25));
    }

    #[test]
    fn test_parse_arbs_rejects_malformed_bodies() {
        assert!(matches!(
            parse_arbs(&json!({ "status": "ok" })),
            Err(TentaluxError::Protocol(_))
        ));
        assert!(parse_arbs(&json!({ "ARBs": 3 })).is_err());
        assert!(parse_arbs(&json!({ "ARBs": [[0, 1]] })).is_err());
        assert!(parse_arbs(&json!({ "ARBs": [[0, 1, 300]] })).is_err());
        assert!(parse_arbs(&json!({ "ARBs": [[0, 1, -4]] })).is_err());
        assert!(parse_arbs(&json!({ "ARBs": [[0, 1, 12.5]] })).is_err());
        assert!(parse_arbs(&json!({ "ARBs": ["bright"] })).is_err());
    }

    #[test]
    fn test_parse_empty_rig() {
        let arbs = parse_arbs(&json!({ "ARBs": [] })).unwrap();
        assert!(arbs.is_empty());
    }

    #[test]
    fn test_parse_poses() {
        let poses = parse_poses(&json!(["rest", "reading", 7])).unwrap();
        assert_eq!(
            poses,
            vec![Pose::new("rest"), Pose::new("reading"), Pose::new("7")]
        );

        assert!(parse_poses(&json!({ "poses": [] })).is_err());
        assert!(parse_poses(&json!([null])).is_err());
    }
}
