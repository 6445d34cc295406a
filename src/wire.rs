//! Big-endian field packing shared by every message kind.
//!
//! Integers go out most significant byte first. Variable-length fields carry
//! a single unsigned length byte in front and no terminator.

use thiserror::Error;

/// Longest byte string a single length byte can describe.
pub const MAX_VAR_LEN: usize = u8::MAX as usize;

/// A received buffer that does not match the layout it claims to be.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("{kind} needs at least {expected} bytes, got {actual}")]
    TooShort {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{field} declares {declared} bytes plus {reserved} trailing, but only {remaining} remain")]
    Truncated {
        field: &'static str,
        declared: usize,
        reserved: usize,
        remaining: usize,
    },
    #[error("{extra} unexpected bytes after the tag")]
    TrailingBytes { extra: usize },
}

/// An in-memory field that cannot be put on the wire.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("{field} is {len} bytes long, at most 255 fit behind a length byte")]
    TooLong { field: &'static str, len: usize },
    #[error("{field} of {value} degrees is out of range")]
    Coordinate { field: &'static str, value: f64 },
}

#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn bytes(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    /// Writes `value` behind its one-byte length.
    /// Nothing is written when the value does not fit.
    pub fn prefixed(&mut self, field: &'static str, value: &[u8]) -> Result<(), FieldError> {
        let len = u8::try_from(value.len()).map_err(|_| FieldError::TooLong {
            field,
            len: value.len(),
        })?;

        self.u8(len);
        self.bytes(value);

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a received buffer.
///
/// Every read is bounds checked so a short buffer surfaces as a
/// [`FormatError`] instead of a panic, even if the caller skipped the
/// up-front minimum length check.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn take(&mut self, field: &'static str, len: usize) -> Result<&'a [u8], FormatError> {
        self.take_reserving(field, len, 0)
    }

    fn take_reserving(
        &mut self,
        field: &'static str,
        len: usize,
        reserved: usize,
    ) -> Result<&'a [u8], FormatError> {
        let remaining = self.remaining();
        if remaining < len + reserved {
            return Err(FormatError::Truncated {
                field,
                declared: len,
                reserved,
                remaining,
            });
        }

        let bytes = &self.buf[self.offset..self.offset + len];
        self.offset += len;

        Ok(bytes)
    }

    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);

        Ok(out)
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, FormatError> {
        Ok(self.array::<1>(field)?[0])
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, FormatError> {
        Ok(u32::from_be_bytes(self.array(field)?))
    }

    pub fn i32(&mut self, field: &'static str) -> Result<i32, FormatError> {
        Ok(i32::from_be_bytes(self.array(field)?))
    }

    /// Reads a length byte and the bytes it declares, insisting that
    /// `reserved` more bytes still follow them.
    pub fn prefixed(&mut self, field: &'static str, reserved: usize) -> Result<&'a [u8], FormatError> {
        let len = self.u8(field)? as usize;

        self.take_reserving(field, len, reserved)
    }

    /// Fails if anything is left unread.
    pub fn finish(self) -> Result<(), FormatError> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(FormatError::TrailingBytes { extra }),
        }
    }
}
