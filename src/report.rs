//! The record a gateway publishes for each authenticated position.

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// Short keys keep the record small on the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Fix validity flag from the header.
    #[serde(rename = "vl")]
    pub valid: bool,
    /// Device id as 12 hex digits.
    #[serde(rename = "dv")]
    pub device: String,
    #[serde(rename = "ts")]
    pub timestamp: u32,
    #[serde(rename = "lt")]
    pub latitude: f64,
    #[serde(rename = "lg")]
    pub longitude: f64,
    #[serde(rename = "nm")]
    pub name: String,
}

impl From<&Position> for Report {
    fn from(position: &Position) -> Self {
        Self {
            valid: position.is_valid(),
            device: position.device.to_string(),
            timestamp: position.timestamp,
            latitude: position.latitude,
            longitude: position.longitude,
            name: position.name_lossy(),
        }
    }
}

impl Report {
    /// Topic suffix the record is published under.
    pub fn topic(&self) -> String {
        format!("position/{}", self.device)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{header::Header, position::DeviceId};

    #[test]
    fn json_uses_short_keys() {
        let mut position = Position::new(DeviceId([0xa0, 0xb1, 0xc2, 0xd3, 0xe4, 0xf5]));
        position.header = Header::position(true);
        position.latitude = 52.1326;
        position.longitude = 5.2913;
        position.timestamp = 1_700_000_000;
        position.name = b"dev1".to_vec();

        let report = Report::from(&position);
        assert_eq!(report.topic(), "position/a0b1c2d3e4f5");

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "vl": true,
                "dv": "a0b1c2d3e4f5",
                "ts": 1_700_000_000u32,
                "lt": 52.1326,
                "lg": 5.2913,
                "nm": "dev1",
            })
        );
    }

    #[test]
    fn non_utf8_names_are_replaced() {
        let mut position = Position::new(DeviceId::default());
        position.name = vec![b'a', 0xff];

        assert_eq!(Report::from(&position).name, "a\u{fffd}");
    }
}
