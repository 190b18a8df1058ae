//! Local rejections, raised before anything reaches the bus.
//!
//! Transport and device failures are not errors here: they travel as data in
//! [`Outcome`](crate::status::Outcome).

use crate::register::{ActuatorId, Register, Width};
use thiserror::Error;

pub type DxlResult<T> = Result<T, DxlError>;

/// A value or payload that does not fit its register.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("value {value} does not fit in {width}")]
    Overflow { value: u32, width: Width },

    #[error("payload of {len} bytes is not a register width")]
    Length { len: usize },
}

/// Why one participant of a sync write was not staged.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StagingFailure {
    #[error("already staged in this batch")]
    Duplicate,

    #[error("address {found} differs from batch address {expected}")]
    AddressMismatch { expected: u16, found: u16 },

    #[error("width {found} differs from batch width {expected}")]
    WidthMismatch { expected: Width, found: Width },

    #[error("payload is {len} bytes, register is {width}")]
    LengthMismatch { width: Width, len: usize },

    #[error("not a single-actuator id")]
    InvalidId,

    #[error(transparent)]
    Range(#[from] RangeError),
}

/// A sync-write participant that could not be staged, named by id.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("actuator {id} not staged: {reason}")]
pub struct StagingError {
    pub id: ActuatorId,
    pub reason: StagingFailure,
}

impl StagingError {
    pub const fn new(id: ActuatorId, reason: StagingFailure) -> Self {
        Self { id, reason }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DxlError {
    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error("register at address {address} is read-only")]
    ReadOnly { address: u16 },

    #[error("register at address {address} is write-only")]
    WriteOnly { address: u16 },

    #[error("port is not open")]
    PortClosed,

    #[error("could not open {device} at {baud_rate} baud")]
    OpenFailed { device: String, baud_rate: u32 },

    #[error("{0} is not a single-actuator id")]
    InvalidId(ActuatorId),

    #[error("no baud rate code for {0} baud")]
    UnsupportedBaudRate(u32),

    #[error("unknown {register} value {value}")]
    UnknownMode { register: Register, value: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_error_names_the_id() {
        let err = StagingError::new(3, StagingFailure::Duplicate);
        assert_eq!(err.to_string(), "actuator 3 not staged: already staged in this batch");
    }

    #[test]
    fn range_errors_convert() {
        let err: DxlError = RangeError::Overflow {
            value: 256,
            width: Width::Byte,
        }
        .into();
        assert_eq!(err.to_string(), "value 256 does not fit in 1 byte(s)");

        let staged = StagingFailure::from(RangeError::Length { len: 3 });
        assert!(staged.to_string().contains("3 bytes"));
    }

    #[test]
    fn unknown_mode_mentions_register() {
        let err = DxlError::UnknownMode {
            register: Register::OperatingMode,
            value: 9,
        };
        assert_eq!(err.to_string(), "unknown operating_mode value 9");
    }
}
