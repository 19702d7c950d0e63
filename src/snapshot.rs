//! Last-known rig state
//!
//! A [`Snapshot`] is the ordered list of arm record blocks (ARBs) from the most
//! recent successful state echo. It is immutable once built; the controller
//! replaces it wholesale and hands readers an `Arc<Snapshot>`, so nobody ever
//! observes a half-updated sequence.

use serde_json::Value;

/// One arm record block: the rig's state tuple for a single arm.
#[derive(Debug, Clone, PartialEq)]
pub struct ArmRecord {
    number: usize,
    brightness: u8,
    fields: Vec<Value>,
}

impl ArmRecord {
    /// Build a record for arm `number`. `fields` is the raw ARB array as sent
    /// by the rig, brightness included.
    pub fn new(number: usize, brightness: u8, fields: Vec<Value>) -> Self {
        Self {
            number,
            brightness,
            fields,
        }
    }

    /// Arm index (position in the ARB array).
    pub fn number(&self) -> usize {
        self.number
    }

    /// Brightness, 0..=255.
    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    /// Raw ARB fields, positional data included.
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }
}

/// Every arm's record as of one rig answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: Vec<ArmRecord>,
}

impl Snapshot {
    /// Wrap records parsed from one state echo.
    pub fn new(records: Vec<ArmRecord>) -> Self {
        Self { records }
    }

    /// Number of arms.
    pub fn arms(&self) -> usize {
        self.records.len()
    }

    /// True before the first successful status fetch (or for an armless rig).
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in arm order.
    pub fn records(&self) -> &[ArmRecord] {
        &self.records
    }

    /// Record for arm `number`.
    pub fn get(&self, number: usize) -> Option<&ArmRecord> {
        self.records.get(number)
    }

    /// Brightness of arm `number`.
    pub fn brightness(&self, number: usize) -> Option<u8> {
        self.get(number).map(ArmRecord::brightness)
    }

    /// Mean brightness over all arms, `None` when there are no arms.
    pub fn average_brightness(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        let total: u32 = self.records.iter().map(|r| u32::from(r.brightness)).sum();
        Some(f64::from(total) / self.records.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(levels: &[u8]) -> Snapshot {
        Snapshot::new(
            levels
                .iter()
                .enumerate()
                .map(|(n, &b)| ArmRecord::new(n, b, vec![json!(0), json!(0), json!(b)]))
                .collect(),
        )
    }

    #[test]
    fn test_lookup_by_arm() {
        let snap = snapshot(&[0, 50, 255]);
        assert_eq!(snap.arms(), 3);
        assert_eq!(snap.brightness(1), Some(50));
        assert_eq!(snap.brightness(3), None);
        assert_eq!(snap.get(2).map(ArmRecord::number), Some(2));
    }

    #[test]
    fn test_average_brightness() {
        assert_eq!(Snapshot::default().average_brightness(), None);

        let snap = snapshot(&[0, 100, 200]);
        let avg = snap.average_brightness().unwrap();
        assert!((avg - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_is_empty() {
        let snap = Snapshot::default();
        assert!(snap.is_empty());
        assert_eq!(snap.arms(), 0);
    }
}
