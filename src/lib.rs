//! Authenticated position and command messages for a cellular GNSS tracker.
//!
//! Every message is a fixed layout of big-endian fields followed by the
//! first 16 bytes of an HMAC-SHA-256 over those fields. See [`Payload`] for
//! the signing flow and [`Position`] / [`Command`] for the layouts.

pub mod command;
pub mod fix;
pub mod header;
pub mod payload;
pub mod position;
pub mod report;
pub mod wire;

pub use command::{Action, Command, CommandError};
pub use fix::{Fix, FixError};
pub use header::Header;
pub use payload::{Payload, ReceiveError, Secret, SecretError, Tag, TAG_LEN};
pub use position::{DeviceId, DeviceIdError, Position};
pub use report::Report;
pub use waltrac_macros::device_id;
pub use wire::{FieldError, FormatError};
