//! Truncated HMAC-SHA-256 authentication shared by every message kind.
//!
//! A message is its canonical field bytes followed by a 16 byte tag. The tag
//! is the left half of HMAC-SHA-256 over the field bytes, or all zeros when
//! the sender had no secret. The tag itself is never signed.

use std::{
    fmt::{self, Debug, Display},
    str::FromStr,
};

use hmac::{Hmac, Mac};
use log::{debug, trace, warn};
use sha2::Sha256;
use thiserror::Error;

use crate::wire::{FieldError, FormatError, Reader, Writer};

type HmacSha256 = Hmac<Sha256>;

/// Bytes of the digest that go on the wire. Changing this changes the format.
pub const TAG_LEN: usize = 16;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tag(pub [u8; TAG_LEN]);

impl Tag {
    /// Placeholder sent by callers without a secret.
    pub const UNSIGNED: Tag = Tag([0; TAG_LEN]);

    pub fn as_bytes(&self) -> &[u8; TAG_LEN] {
        &self.0
    }

    pub fn is_unsigned(&self) -> bool {
        *self == Self::UNSIGNED
    }
}

impl Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", hex::encode(self.0))
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Shared secret provisioned out of band.
///
/// Never printed; `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, SecretError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(SecretError::Empty);
        }

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Secret {
    type Err = SecretError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

impl Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("secret must not be empty")]
    Empty,
}

/// Why [`Payload::open`] dropped a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReceiveError {
    #[error("malformed message: {0}")]
    Malformed(#[from] FormatError),
    #[error("message failed authentication")]
    Unauthenticated,
}

fn keyed(secret: &Secret, fields: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(fields);

    mac
}

/// Left 16 bytes of HMAC-SHA-256(secret, fields).
pub fn compute_tag(secret: &Secret, fields: &[u8]) -> Tag {
    let digest = keyed(secret, fields).finalize().into_bytes();

    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&digest[..TAG_LEN]);

    Tag(tag)
}

/// A message kind that can be signed, serialized, decoded and verified.
///
/// Implementors only describe their field layout; everything involving the
/// tag lives in the provided methods.
pub trait Payload: Sized {
    /// Name used in errors and logs.
    const KIND: &'static str;

    /// Smallest encoded size with every variable field empty, tag included.
    const MIN_LEN: usize;

    /// Appends the canonical field bytes, tag excluded.
    fn write_fields(&self, out: &mut Writer) -> Result<(), FieldError>;

    /// Parses every field in front of the tag. Variable-length fields must
    /// leave at least [`TAG_LEN`] bytes behind them.
    fn read_fields(input: &mut Reader<'_>) -> Result<Self, FormatError>;

    fn tag(&self) -> Tag;

    fn with_tag(self, tag: Tag) -> Self;

    fn canonical_bytes(&self) -> Result<Vec<u8>, FieldError> {
        let mut out = Writer::with_capacity(Self::MIN_LEN);
        self.write_fields(&mut out)?;

        Ok(out.into_inner())
    }

    /// Computes the tag for the current fields without touching `self`.
    fn sign(&self, secret: &Secret) -> Result<Tag, FieldError> {
        let fields = self.canonical_bytes()?;
        trace!("signing {} canonical bytes of {}", fields.len(), Self::KIND);

        Ok(compute_tag(secret, &fields))
    }

    /// Consumes `self` and hands it back carrying a fresh tag.
    fn signed(self, secret: &Secret) -> Result<Self, FieldError> {
        let tag = self.sign(secret)?;

        Ok(self.with_tag(tag))
    }

    /// Field bytes followed by a freshly computed tag, or sixteen zero bytes
    /// when `secret` is `None`.
    fn serialize(&self, secret: Option<&Secret>) -> Result<Vec<u8>, FieldError> {
        let mut bytes = self.canonical_bytes()?;

        let tag = match secret {
            Some(secret) => compute_tag(secret, &bytes),
            None => Tag::UNSIGNED,
        };
        bytes.extend_from_slice(tag.as_bytes());

        Ok(bytes)
    }

    /// Field bytes followed by whatever tag `self` already carries.
    fn encode(&self) -> Result<Vec<u8>, FieldError> {
        let mut bytes = self.canonical_bytes()?;
        bytes.extend_from_slice(self.tag().as_bytes());

        Ok(bytes)
    }

    /// Parses a complete buffer. The length has to come out exact: short
    /// buffers, overrunning length bytes and trailing garbage all fail.
    fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        decode_exact(bytes).inspect_err(|err| {
            debug!("rejected {} byte {}: {err}", bytes.len(), Self::KIND);
        })
    }

    /// Recomputes the tag and compares it in constant time.
    /// Anything that cannot be re-encoded counts as a mismatch.
    fn verify(&self, secret: &Secret) -> bool {
        let Ok(fields) = self.canonical_bytes() else {
            return false;
        };

        keyed(secret, &fields)
            .verify_truncated_left(self.tag().as_bytes())
            .is_ok()
    }

    /// Decode followed by verify, for receivers that drop anything unauthentic.
    fn open(bytes: &[u8], secret: &Secret) -> Result<Self, ReceiveError> {
        let payload = Self::decode(bytes)?;

        if !payload.verify(secret) {
            warn!("dropping {} that failed authentication", Self::KIND);
            return Err(ReceiveError::Unauthenticated);
        }

        Ok(payload)
    }
}

fn decode_exact<P: Payload>(bytes: &[u8]) -> Result<P, FormatError> {
    if bytes.len() < P::MIN_LEN {
        return Err(FormatError::TooShort {
            kind: P::KIND,
            expected: P::MIN_LEN,
            actual: bytes.len(),
        });
    }

    let mut input = Reader::new(bytes);
    let payload = P::read_fields(&mut input)?;
    let tag = Tag(input.array("tag")?);
    input.finish()?;

    Ok(payload.with_tag(tag))
}
