//! Remote instruction sent from the gateway to a tracker.
//!
//! `header(1) | arg length n(1) | arg(n) | tag(16)`. The low nibble of the
//! header selects the [`Action`].

use std::fmt::{self, Display};

use thiserror::Error;

use crate::{
    header::Header,
    payload::{Payload, Tag, TAG_LEN},
    position::DeviceId,
    wire::{FieldError, FormatError, Reader, Writer, MAX_VAR_LEN},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    /// Tracker announces itself, arg is its device id.
    Discover = 1,
    /// Arg is the new reporting interval in seconds, as decimal text.
    SetInterval = 2,
    /// Arg is the new device name.
    SetName = 3,
    /// Leave command mode and resume reporting.
    Exit = 4,
}

impl Action {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        match nibble {
            1 => Some(Self::Discover),
            2 => Some(Self::SetInterval),
            3 => Some(Self::SetName),
            4 => Some(Self::Exit),
            _ => None,
        }
    }

    pub fn nibble(self) -> u8 {
        self as u8
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Discover => "discover",
            Action::SetInterval => "set-interval",
            Action::SetName => "set-name",
            Action::Exit => "exit",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("interval must be at least one second")]
    ZeroInterval,
    #[error(transparent)]
    Field(#[from] FieldError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub header: Header,
    pub arg: Vec<u8>,
    tag: Tag,
}

impl Command {
    pub fn new(action: Action, arg: impl Into<Vec<u8>>) -> Self {
        Self {
            header: Header::command(action.nibble()),
            arg: arg.into(),
            tag: Tag::UNSIGNED,
        }
    }

    pub fn discover(device: DeviceId) -> Self {
        Self::new(Action::Discover, device.to_string())
    }

    pub fn set_interval(seconds: u32) -> Result<Self, CommandError> {
        if seconds == 0 {
            return Err(CommandError::ZeroInterval);
        }

        Ok(Self::new(Action::SetInterval, seconds.to_string()))
    }

    pub fn set_name(name: &str) -> Result<Self, CommandError> {
        if name.len() > MAX_VAR_LEN {
            return Err(FieldError::TooLong {
                field: "arg",
                len: name.len(),
            }
            .into());
        }

        Ok(Self::new(Action::SetName, name))
    }

    pub fn exit() -> Self {
        Self::new(Action::Exit, Vec::<u8>::new())
    }

    /// `None` for nibbles this build does not know; the raw value is still
    /// available through [`Command::nibble`].
    pub fn action(&self) -> Option<Action> {
        Action::from_nibble(self.nibble())
    }

    pub fn nibble(&self) -> u8 {
        self.header.nibble()
    }

    pub fn arg_lossy(&self) -> String {
        String::from_utf8_lossy(&self.arg).into_owned()
    }

    /// The requested interval of a set-interval command.
    pub fn interval_secs(&self) -> Option<u32> {
        if self.action() != Some(Action::SetInterval) {
            return None;
        }

        if self.arg.is_empty() || !self.arg.iter().all(u8::is_ascii_digit) {
            return None;
        }

        std::str::from_utf8(&self.arg)
            .ok()?
            .parse::<u32>()
            .ok()
            .filter(|secs| *secs > 0)
    }
}

impl Payload for Command {
    const KIND: &'static str = "command";
    const MIN_LEN: usize = 1 + 1 + TAG_LEN;

    fn write_fields(&self, out: &mut Writer) -> Result<(), FieldError> {
        out.u8(self.header.into());
        out.prefixed("arg", &self.arg)
    }

    fn read_fields(input: &mut Reader<'_>) -> Result<Self, FormatError> {
        Ok(Self {
            header: Header(input.u8("header")?),
            arg: input.prefixed("arg", TAG_LEN)?.to_vec(),
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

impl Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Command(header={}, action=", self.header)?;

        match self.action() {
            Some(action) => write!(f, "{action}")?,
            None => write!(f, "unknown({})", self.nibble())?,
        }

        write!(
            f,
            ", arglen={}, arg={:?}, tag={})",
            self.arg.len(),
            self.arg_lossy(),
            self.tag
        )
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::payload::Secret;

    fn key(s: &str) -> Secret {
        s.parse().unwrap()
    }

    fn sample() -> Command {
        Command::new(Action::Discover, "60")
    }

    #[test]
    fn sample_layout_and_tag() {
        let cmd = sample();
        assert_eq!(cmd.header, Header(0x81));

        let bytes = cmd.serialize(Some(&key("topsecret"))).unwrap();
        assert_eq!(hex::encode(&bytes[..4]), "81023630");
        assert_eq!(hex::encode(&bytes[4..]), "b32536e4dadf9df0c69ee4d46f8153b1");
    }

    #[test]
    fn round_trip_verifies() {
        let secret = key("topsecret");
        let bytes = sample().serialize(Some(&secret)).unwrap();

        let decoded = Command::decode(&bytes).unwrap();
        assert_eq!(decoded.header, Header(0x81));
        assert_eq!(decoded.action(), Some(Action::Discover));
        assert_eq!(decoded.arg, b"60");
        assert!(decoded.verify(&secret));
    }

    #[test]
    fn any_bit_flip_in_arg_fails() {
        let secret = key("topsecret");
        let bytes = sample().serialize(Some(&secret)).unwrap();

        for i in 2..4 {
            for bit in 0..8 {
                let mut tampered = bytes.clone();
                tampered[i] ^= 1 << bit;

                let decoded = Command::decode(&tampered).unwrap();
                assert!(!decoded.verify(&secret), "bit {bit} of byte {i}");
            }
        }
    }

    #[test]
    fn minimum_is_eighteen_bytes() {
        let bytes = Command::exit().serialize(None).unwrap();
        assert_eq!(bytes.len(), 18);

        assert_eq!(
            Command::decode(&bytes[..17]),
            Err(FormatError::TooShort { kind: "command", expected: 18, actual: 17 })
        );
        assert!(Command::decode(&bytes).is_ok());
    }

    #[test]
    fn declared_arg_longer_than_buffer() {
        let mut bytes = sample().serialize(None).unwrap();
        bytes[1] = 3;

        assert_eq!(
            Command::decode(&bytes),
            Err(FormatError::Truncated {
                field: "arg",
                declared: 3,
                reserved: TAG_LEN,
                remaining: 18,
            })
        );
    }

    #[test]
    fn trailing_byte_is_rejected() {
        let mut bytes = sample().serialize(None).unwrap();
        bytes.push(0xff);

        assert_eq!(Command::decode(&bytes), Err(FormatError::TrailingBytes { extra: 1 }));
    }

    #[test]
    fn overlong_arg_fails_at_encode() {
        let cmd = Command::new(Action::SetName, vec![b'a'; 256]);

        assert_eq!(
            cmd.serialize(None),
            Err(FieldError::TooLong { field: "arg", len: 256 })
        );
        assert!(matches!(
            Command::set_name(&"a".repeat(256)),
            Err(CommandError::Field(FieldError::TooLong { .. }))
        ));
    }

    #[test]
    fn unknown_nibble_is_preserved() {
        let mut cmd = Command::exit();
        cmd.header = Header(0x8c);

        let decoded = Command::decode(&cmd.serialize(None).unwrap()).unwrap();
        assert_eq!(decoded.action(), None);
        assert_eq!(decoded.nibble(), 0x0c);
        assert_eq!(decoded.header, Header(0x8c));
        assert!(decoded.to_string().contains("action=unknown(12)"));
    }

    #[test]
    fn unsigned_command_fails_any_real_key() {
        let decoded = Command::decode(&Command::exit().serialize(None).unwrap()).unwrap();

        assert!(decoded.tag().is_unsigned());
        assert!(!decoded.verify(&key("topsecret")));
    }

    #[test]
    fn builders() {
        let device: DeviceId = "01:02:03:04:05:06".parse().unwrap();
        assert_eq!(Command::discover(device).arg, b"010203040506");

        let cmd = Command::set_interval(60).unwrap();
        assert_eq!(cmd.header, Header(0x82));
        assert_eq!(cmd.interval_secs(), Some(60));
        assert_eq!(Command::set_interval(0), Err(CommandError::ZeroInterval));

        let cmd = Command::set_name("tracker-7").unwrap();
        assert_eq!(cmd.action(), Some(Action::SetName));
        assert_eq!(cmd.interval_secs(), None);

        assert_eq!(Command::exit().header, Header(0x84));
    }

    #[test]
    fn interval_arg_must_be_plain_digits() {
        for arg in ["", "-5", "+5", "0", "1.5", "99999999999"] {
            assert_eq!(Command::new(Action::SetInterval, arg).interval_secs(), None, "{arg}");
        }
    }

    proptest! {
        #[test]
        fn decode_recovers_fields(
            nibble in 0u8..16,
            arg in prop::collection::vec(any::<u8>(), 0..=MAX_VAR_LEN),
            secret in "[ -~]{1,24}",
        ) {
            let secret = key(&secret);
            let mut cmd = Command::new(Action::Exit, arg);
            cmd.header = Header::command(nibble);

            let decoded = Command::decode(&cmd.serialize(Some(&secret)).unwrap()).unwrap();

            prop_assert!(decoded.verify(&secret));
            prop_assert_eq!(decoded.nibble(), nibble);
            prop_assert_eq!(decoded, cmd.signed(&secret).unwrap());
        }

        #[test]
        fn short_buffers_fail(bytes in prop::collection::vec(any::<u8>(), 0..Command::MIN_LEN)) {
            let is_too_short = matches!(Command::decode(&bytes), Err(FormatError::TooShort { .. }));
            prop_assert!(is_too_short);
        }

        #[test]
        fn overrunning_length_fails(arg in prop::collection::vec(any::<u8>(), 0..64), grow in 1u8..=16) {
            let mut bytes = Command::new(Action::SetName, arg.clone()).serialize(None).unwrap();
            bytes[1] = arg.len() as u8 + grow;

            let is_truncated = matches!(Command::decode(&bytes), Err(FormatError::Truncated { .. }));
            prop_assert!(is_truncated);
        }
    }
}
