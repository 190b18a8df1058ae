//! Conversion between register values and their little-endian wire bytes.
//!
//! The packet layer copies payload bytes verbatim, so this module is the only
//! place where byte order is decided. Single writes and sync writes both go
//! through [`encode`], which keeps the two paths byte-for-byte identical.

use crate::error::RangeError;
use crate::register::Width;
use serde::{Deserialize, Serialize};

/// Bytes of one register value, at most 4.
pub type Payload = heapless::Vec<u8, 4>;

/// A value destined for a register, tagged with its natural width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Stored as a single `0`/`1` byte.
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
}

impl Value {
    /// The unsigned integer that goes on the wire.
    #[inline]
    pub const fn raw(self) -> u32 {
        match self {
            Self::Bool(b) => b as u32,
            Self::U8(v) => v as u32,
            Self::U16(v) => v as u32,
            Self::U32(v) => v,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Self::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Self::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::U32(v)
    }
}

/// Encodes `value` on `width` bytes, least significant byte first.
///
/// Values that do not fit are rejected, never truncated.
pub fn encode(value: u32, width: Width) -> Result<Payload, RangeError> {
    if value > width.max_value() {
        return Err(RangeError::Overflow { value, width });
    }
    Ok(value.to_le_bytes()[..width.len()].iter().copied().collect())
}

/// Decodes a 1, 2 or 4 byte little-endian payload.
pub fn decode(bytes: &[u8]) -> Result<u32, RangeError> {
    match *bytes {
        [b0] => Ok(b0 as u32),
        [b0, b1] => Ok(u16::from_le_bytes([b0, b1]) as u32),
        [b0, b1, b2, b3] => Ok(u32::from_le_bytes([b0, b1, b2, b3])),
        _ => Err(RangeError::Length { len: bytes.len() }),
    }
}

/// Splits a 32-bit value into the four sync-write parameter bytes:
/// low byte of the low word, high byte of the low word, low byte of the high
/// word, high byte of the high word.
#[inline]
pub const fn split_u32(value: u32) -> [u8; 4] {
    let low = (value & 0xFFFF) as u16;
    let high = (value >> 16) as u16;
    [
        (low & 0xFF) as u8,
        (low >> 8) as u8,
        (high & 0xFF) as u8,
        (high >> 8) as u8,
    ]
}

/// Reinterprets a raw register value as two's complement at its own width.
///
/// Used for the signed registers (velocities, load). Never sign-extends a
/// narrower value into a wider register.
#[inline]
pub const fn to_signed(raw: u32, width: Width) -> i32 {
    match width {
        Width::Byte => raw as u8 as i8 as i32,
        Width::Word => raw as u16 as i16 as i32,
        Width::DoubleWord => raw as i32,
    }
}

/// Inverse of [`to_signed`]. Fails when `value` does not fit `width` as a
/// signed quantity.
pub fn from_signed(value: i32, width: Width) -> Result<u32, RangeError> {
    let fits = match width {
        Width::Byte => i8::try_from(value).is_ok(),
        Width::Word => i16::try_from(value).is_ok(),
        Width::DoubleWord => true,
    };
    if !fits {
        return Err(RangeError::Overflow {
            value: value as u32,
            width,
        });
    }
    Ok(value as u32 & width.max_value())
}
