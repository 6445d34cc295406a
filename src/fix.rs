//! Turning GNSS receiver output into position reports.
//!
//! Acquisition itself (power, retries, timeouts) belongs to the receiver
//! driver. This only looks at the NMEA sentences it produced.

use chrono::{DateTime, NaiveDateTime, Utc};
use nmea::Nmea;
use thiserror::Error;

use crate::{
    header::Header,
    position::{DeviceId, Position},
};

/// One position estimate and the metadata a report needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub valid: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub time: Option<DateTime<Utc>>,
}

impl Fix {
    /// Feeds every sentence through one parser and reads the merged result.
    ///
    /// GGA carries the fix quality, RMC the date; send both for a complete fix.
    pub fn from_sentences(sentences: &[&str]) -> Result<Self, FixError> {
        let mut nmea = Nmea::default();

        for sentence in sentences {
            nmea.parse(sentence.trim_end())?;
        }

        let (Some(latitude), Some(longitude)) = (nmea.latitude, nmea.longitude) else {
            return Err(FixError::NoPosition);
        };

        let valid = nmea.fix_type.is_some_and(|fix| fix.is_valid());
        let time = match (nmea.fix_date, nmea.fix_time) {
            (Some(date), Some(time)) => Some(NaiveDateTime::new(date, time).and_utc()),
            _ => None,
        };

        Ok(Self {
            valid,
            latitude,
            longitude,
            time,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FixError {
    #[error("unusable NMEA sentence: {0}")]
    Nmea(String),
    #[error("sentences carry no latitude/longitude")]
    NoPosition,
    #[error("sentences carry no UTC date and time")]
    NoTime,
    #[error("fix time {0} does not fit a 32 bit timestamp")]
    TimeRange(DateTime<Utc>),
}

impl<'a> From<nmea::Error<'a>> for FixError {
    fn from(value: nmea::Error<'a>) -> Self {
        FixError::Nmea(format!("{value:?}"))
    }
}

impl Position {
    /// An unsigned report of `fix`, flagged valid or not to match it.
    pub fn from_fix(
        fix: &Fix,
        device: DeviceId,
        interval: u8,
        name: &str,
    ) -> Result<Self, FixError> {
        let time = fix.time.ok_or(FixError::NoTime)?;
        let timestamp = u32::try_from(time.timestamp()).map_err(|_| FixError::TimeRange(time))?;

        let mut position = Position::new(device);
        position.header = Header::position(fix.valid);
        position.interval = interval;
        position.latitude = fix.latitude;
        position.longitude = fix.longitude;
        position.timestamp = timestamp;
        position.name = name.as_bytes().to_vec();

        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{Payload, Secret};

    const RMC: &str = "$GPRMC,221320,A,5207.956,N,00517.478,E,000.0,000.0,141123,,*1B";
    const GGA: &str = "$GPGGA,221320,5207.956,N,00517.478,E,1,08,0.9,12.0,M,46.9,M,,*79";

    fn device() -> DeviceId {
        DeviceId(waltrac_macros::device_id!("01-02-03-04-05-06"))
    }

    #[test]
    fn rmc_and_gga_make_a_full_fix() {
        let fix = Fix::from_sentences(&[RMC, GGA]).unwrap();

        assert!(fix.valid);
        assert!((fix.latitude - 52.1326).abs() < 1e-9);
        assert!((fix.longitude - 5.2913).abs() < 1e-9);
        assert_eq!(fix.time.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn fix_becomes_signed_position() {
        let fix = Fix::from_sentences(&[RMC, GGA]).unwrap();
        let secret: Secret = "topsecret".parse().unwrap();

        let position = Position::from_fix(&fix, device(), 30, "dev1")
            .unwrap()
            .signed(&secret)
            .unwrap();

        assert_eq!(position.header, Header(0x81));
        assert_eq!(position.timestamp, 1_700_000_000);
        assert_eq!(position.name, b"dev1");
        assert!(position.verify(&secret));

        let bytes = position.encode().unwrap();
        assert_eq!(Position::open(&bytes, &secret).unwrap(), position);
    }

    #[test]
    fn gga_alone_has_no_date() {
        let fix = Fix::from_sentences(&[GGA]).unwrap();

        assert_eq!(fix.time, None);
        assert_eq!(Position::from_fix(&fix, device(), 30, "dev1"), Err(FixError::NoTime));
    }

    #[test]
    fn nothing_parsed_means_no_position() {
        assert_eq!(Fix::from_sentences(&[]), Err(FixError::NoPosition));
    }

    #[test]
    fn broken_checksum_is_reported() {
        let broken = RMC.replace("*1B", "*00");

        assert!(matches!(
            Fix::from_sentences(&[broken.as_str()]),
            Err(FixError::Nmea(_))
        ));
    }

    #[test]
    fn invalid_fix_clears_header_flag() {
        let fix = Fix {
            valid: false,
            latitude: 1.0,
            longitude: 2.0,
            time: DateTime::<Utc>::from_timestamp(60, 0),
        };

        let position = Position::from_fix(&fix, device(), 1, "").unwrap();
        assert_eq!(position.header, Header(0x80));
        assert!(!position.is_valid());
    }
}
