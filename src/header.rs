use std::fmt::{self, Display};

/// Bit 7 of every header, set on everything this format produces.
pub const FORMAT_MARKER: u8 = 0x80;

const VALID_FLAG: u8 = 0x01;
const NIBBLE_MASK: u8 = 0x0F;

/// First byte of every message.
///
/// The raw byte is kept as received so unknown flag bits survive a
/// decode/encode cycle and stay covered by the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Header(pub u8);

impl Header {
    /// Position header: marker plus the fix validity flag in bit 0.
    pub fn position(valid: bool) -> Self {
        let mut header = FORMAT_MARKER;
        if valid {
            header |= VALID_FLAG;
        }

        Self(header)
    }

    /// Command header: marker plus the action in the low nibble.
    pub fn command(nibble: u8) -> Self {
        Self(FORMAT_MARKER | (nibble & NIBBLE_MASK))
    }

    pub fn has_marker(self) -> bool {
        self.0 & FORMAT_MARKER != 0
    }

    pub fn is_valid(self) -> bool {
        self.0 & VALID_FLAG != 0
    }

    pub fn nibble(self) -> u8 {
        self.0 & NIBBLE_MASK
    }
}

impl From<u8> for Header {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl From<Header> for u8 {
    fn from(value: Header) -> Self {
        value.0
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}
