//! GNSS fix report sent from the tracker to the gateway.
//!
//! | offset | bytes | field |
//! |---|---|---|
//! | 0 | 1 | header |
//! | 1 | 1 | interval |
//! | 2 | 6 | device id |
//! | 8 | 4 | latitude × 1e7, i32 |
//! | 12 | 4 | longitude × 1e7, i32 |
//! | 16 | 4 | timestamp, u32 seconds since epoch |
//! | 20 | 1 | name length n |
//! | 21 | n | name |
//! | 21+n | 16 | tag |

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    header::Header,
    payload::{Payload, Tag, TAG_LEN},
    wire::{FieldError, FormatError, Reader, Writer},
};

/// Degrees are carried as integers of 1e-7 degree (about 1.1 cm).
pub const SCALE: f64 = 1e7;

/// Hardware identifier of a tracker, usually its MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceId(pub [u8; 6]);

impl Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for DeviceId {
    type Err = DeviceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();

        let bytes = hex::decode(&digits).map_err(|_| DeviceIdError(s.to_owned()))?;
        let octets: [u8; 6] = bytes.try_into().map_err(|_| DeviceIdError(s.to_owned()))?;

        Ok(Self(octets))
    }
}

impl From<[u8; 6]> for DeviceId {
    fn from(value: [u8; 6]) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a device id, expected six hex octets")]
pub struct DeviceIdError(String);

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub header: Header,
    /// Reporting interval in application-defined units.
    pub interval: u8,
    pub device: DeviceId,
    /// Degrees, north positive.
    pub latitude: f64,
    /// Degrees, east positive.
    pub longitude: f64,
    /// Seconds since the Unix epoch.
    pub timestamp: u32,
    pub name: Vec<u8>,
    tag: Tag,
}

impl Position {
    /// An unsigned report for `device` with an invalid fix and every other
    /// field zeroed.
    pub fn new(device: DeviceId) -> Self {
        Self {
            header: Header::position(false),
            interval: 0,
            device,
            latitude: 0.0,
            longitude: 0.0,
            timestamp: 0,
            name: Vec::new(),
            tag: Tag::UNSIGNED,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.header.is_valid()
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.header = Header::position(valid);
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(i64::from(self.timestamp), 0)
    }
}

/// Rounds half away from zero. Anything that does not fit an `i32` is refused
/// rather than saturated.
fn to_fixed(field: &'static str, degrees: f64) -> Result<i32, FieldError> {
    let scaled = (degrees * SCALE).round();

    if !scaled.is_finite() || scaled < f64::from(i32::MIN) || scaled > f64::from(i32::MAX) {
        return Err(FieldError::Coordinate {
            field,
            value: degrees,
        });
    }

    Ok(scaled as i32)
}

fn from_fixed(raw: i32) -> f64 {
    f64::from(raw) / SCALE
}

impl Payload for Position {
    const KIND: &'static str = "position";
    const MIN_LEN: usize = 1 + 1 + 6 + 4 + 4 + 4 + 1 + TAG_LEN;

    fn write_fields(&self, out: &mut Writer) -> Result<(), FieldError> {
        let latitude = to_fixed("latitude", self.latitude)?;
        let longitude = to_fixed("longitude", self.longitude)?;

        out.u8(self.header.into());
        out.u8(self.interval);
        out.bytes(&self.device.0);
        out.i32(latitude);
        out.i32(longitude);
        out.u32(self.timestamp);
        out.prefixed("name", &self.name)
    }

    fn read_fields(input: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            header: Header(input.u8("header")?),
            interval: input.u8("interval")?,
            device: DeviceId(input.array("device")?),
            latitude: from_fixed(input.i32("latitude")?),
            longitude: from_fixed(input.i32("longitude")?),
            timestamp: input.u32("timestamp")?,
            name: input.prefixed("name", TAG_LEN)?.to_vec(),
            tag: Tag::UNSIGNED,
        })
    }

    fn tag(&self) -> Tag {
        self.tag
    }

    fn with_tag(self, tag: Tag) -> Self {
        Self { tag, ..self }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position(header={}, valid={}, interval={}, device={}, lat={:.7}, lon={:.7}, ",
            self.header,
            self.is_valid(),
            self.interval,
            self.device,
            self.latitude,
            self.longitude,
        )?;

        match self.recorded_at() {
            Some(at) => write!(f, "time={}, ", at.format("%Y-%m-%dT%H:%M:%SZ"))?,
            None => write!(f, "time={}, ", self.timestamp)?,
        }

        write!(f, "name={:?}, tag={})", self.name_lossy(), self.tag)
    }
}
