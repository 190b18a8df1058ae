//! Transport status codes, device error bytes and the transaction outcome
//! that pairs them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of moving a packet across the bus, as reported by the packet layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportStatus {
    Success,
    PortBusy,
    TxFail,
    RxFail,
    TxError,
    RxWaiting,
    RxTimeout,
    RxCorrupt,
    NotAvailable,
    Other(i32),
}

impl TransportStatus {
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            -1000 => Self::PortBusy,
            -1001 => Self::TxFail,
            -1002 => Self::RxFail,
            -2000 => Self::TxError,
            -3000 => Self::RxWaiting,
            -3001 => Self::RxTimeout,
            -3002 => Self::RxCorrupt,
            -9000 => Self::NotAvailable,
            other => Self::Other(other),
        }
    }

    pub const fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::PortBusy => -1000,
            Self::TxFail => -1001,
            Self::RxFail => -1002,
            Self::TxError => -2000,
            Self::RxWaiting => -3000,
            Self::RxTimeout => -3001,
            Self::RxCorrupt => -3002,
            Self::NotAvailable => -9000,
            Self::Other(code) => code,
        }
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Success => "communication success",
            Self::PortBusy => "port is in use",
            Self::TxFail => "failed to transmit instruction packet",
            Self::RxFail => "failed to get status packet from device",
            Self::TxError => "incorrect instruction packet",
            Self::RxWaiting => "still receiving status packet",
            Self::RxTimeout => "no status packet",
            Self::RxCorrupt => "incorrect status packet",
            Self::NotAvailable => "function not supported by the protocol",
            Self::Other(_) => "unknown transport status",
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.description())
    }
}

/// Decoded meaning of the low seven bits of a device error byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceErrorKind {
    ResultFail,
    Instruction,
    Crc,
    DataRange,
    DataLength,
    DataLimit,
    Access,
}

impl DeviceErrorKind {
    pub const fn description(self) -> &'static str {
        match self {
            Self::ResultFail => "failed to process the instruction packet",
            Self::Instruction => "undefined instruction or action without reg_write",
            Self::Crc => "CRC does not match",
            Self::DataRange => "data to be written is out of range",
            Self::DataLength => "data is shorter than the register",
            Self::DataLimit => "data exceeds the configured limit",
            Self::Access => "register is read-only, write-only or torque-locked",
        }
    }
}

/// Error byte of a status packet. Zero means no error and is never wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceError(u8);

impl DeviceError {
    const ALERT: u8 = 0x80;

    /// `None` for a clean status packet.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        if byte == 0 { None } else { Some(Self(byte)) }
    }

    pub const fn byte(self) -> u8 {
        self.0
    }

    /// The device latched a hardware error; see `hardware_error_status`.
    pub const fn hardware_alert(self) -> bool {
        self.0 & Self::ALERT != 0
    }

    pub const fn kind(self) -> Option<DeviceErrorKind> {
        match self.0 & !Self::ALERT {
            1 => Some(DeviceErrorKind::ResultFail),
            2 => Some(DeviceErrorKind::Instruction),
            3 => Some(DeviceErrorKind::Crc),
            4 => Some(DeviceErrorKind::DataRange),
            5 => Some(DeviceErrorKind::DataLength),
            6 => Some(DeviceErrorKind::DataLimit),
            7 => Some(DeviceErrorKind::Access),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{}", kind.description())?,
            None if self.hardware_alert() => {}
            None => write!(f, "unknown device error {:#04x}", self.0)?,
        }
        if self.hardware_alert() {
            if self.kind().is_some() {
                write!(f, ", ")?;
            }
            write!(f, "hardware alert")?;
        }
        Ok(())
    }
}

/// What happened to one transaction.
///
/// The transport status and the device error are independent: a packet can
/// cross the bus fine and still be rejected by the actuator.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub status: TransportStatus,
    pub device_error: Option<DeviceError>,
}

impl Outcome {
    pub const SUCCESS: Self = Self {
        status: TransportStatus::Success,
        device_error: None,
    };

    pub const fn new(status: TransportStatus, error: u8) -> Self {
        Self {
            status,
            device_error: DeviceError::from_byte(error),
        }
    }

    /// Outcome of a transmission that never gets a status packet back.
    pub const fn transmitted(status: TransportStatus) -> Self {
        Self {
            status,
            device_error: None,
        }
    }

    /// Transmitted and accepted.
    #[inline]
    pub const fn is_success(&self) -> bool {
        self.status.is_success() && self.device_error.is_none()
    }

    #[inline]
    pub const fn transport_failed(&self) -> bool {
        !self.status.is_success()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(err) = self.device_error {
            write!(f, "; device error: {err}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for code in [0, -1000, -1001, -1002, -2000, -3000, -3001, -3002, -9000, -42] {
            assert_eq!(TransportStatus::from_code(code).code(), code);
        }
        assert_eq!(TransportStatus::from_code(-42), TransportStatus::Other(-42));
    }

    #[test]
    fn device_error_decoding() {
        assert_eq!(DeviceError::from_byte(0), None);

        let range = DeviceError::from_byte(0x04).unwrap();
        assert_eq!(range.kind(), Some(DeviceErrorKind::DataRange));
        assert!(!range.hardware_alert());
        assert_eq!(range.to_string(), "data to be written is out of range");

        let alert = DeviceError::from_byte(0x80).unwrap();
        assert!(alert.hardware_alert());
        assert_eq!(alert.kind(), None);
        assert_eq!(alert.to_string(), "hardware alert");

        let both = DeviceError::from_byte(0x87).unwrap();
        assert_eq!(both.kind(), Some(DeviceErrorKind::Access));
        assert!(both.to_string().ends_with(", hardware alert"));

        let odd = DeviceError::from_byte(0x0C).unwrap();
        assert_eq!(odd.to_string(), "unknown device error 0x0c");
    }

    #[test]
    fn outcome_keeps_both_failures() {
        let outcome = Outcome::new(TransportStatus::Success, 0x06);
        assert!(!outcome.is_success());
        assert!(!outcome.transport_failed());
        assert_eq!(outcome.device_error.and_then(|e| e.kind()), Some(DeviceErrorKind::DataLimit));

        let outcome = Outcome::new(TransportStatus::RxTimeout, 0x04);
        assert!(outcome.transport_failed());
        assert!(outcome.device_error.is_some());
        assert_eq!(
            outcome.to_string(),
            "[-3001] no status packet; device error: data to be written is out of range"
        );

        assert!(Outcome::SUCCESS.is_success());
    }
}
