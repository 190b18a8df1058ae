//! Bus configuration, stored as JSON next to the application.
//!
//! ```json
//! { "device": "/dev/ttyACM0", "baud_rate": 1000000, "family": "dynamixel_xl" }
//! ```

use crate::error::{DxlError, DxlResult};
use crate::register::{Family, RegisterMap};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Baud rates the actuators support, indexed by their `baud_rate` register
/// code.
pub const BAUD_RATES: [u32; 8] = [
    9_600, 57_600, 115_200, 1_000_000, 2_000_000, 3_000_000, 4_000_000, 4_500_000,
];

/// Register code for `baud_rate`, if the actuators support it.
pub fn baud_rate_code(baud_rate: u32) -> Option<u8> {
    BAUD_RATES
        .iter()
        .position(|&b| b == baud_rate)
        .map(|code| code as u8)
}

/// Baud rate selected by a `baud_rate` register code.
pub fn baud_rate_from_code(code: u8) -> Option<u32> {
    BAUD_RATES.get(code as usize).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Serial device path.
    pub device: String,
    pub baud_rate: u32,
    pub family: Family,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyACM0".to_string(),
            baud_rate: 1_000_000,
            family: Family::default(),
        }
    }
}

impl BusConfig {
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            ..Self::default()
        }
    }

    pub fn with_family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }

    pub fn register_map(&self) -> RegisterMap {
        RegisterMap::new(self.family)
    }

    pub fn validate(&self) -> DxlResult<()> {
        baud_rate_code(self.baud_rate)
            .map(|_| ())
            .ok_or(DxlError::UnsupportedBaudRate(self.baud_rate))
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| std::io::Error::other(format!("bad bus config JSON: {e}")))
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_usb_adapter() {
        let config = BusConfig::default();
        assert_eq!(config.device, "/dev/ttyACM0");
        assert_eq!(config.baud_rate, 1_000_000);
        assert_eq!(config.family, Family::DynamixelXl);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn baud_codes() {
        assert_eq!(baud_rate_code(57_600), Some(1));
        assert_eq!(baud_rate_code(1_000_000), Some(3));
        assert_eq!(baud_rate_code(250_000), None);
        assert_eq!(baud_rate_from_code(7), Some(4_500_000));
        assert_eq!(baud_rate_from_code(8), None);
        assert_eq!(
            BusConfig::new("/dev/ttyUSB0", 250_000).validate(),
            Err(DxlError::UnsupportedBaudRate(250_000))
        );
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.json");
        let config = BusConfig::new("/dev/ttyUSB1", 57_600).with_family(Family::Dynamixel);
        config.save(&path).unwrap();
        assert_eq!(BusConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: BusConfig = serde_json::from_str(r#"{ "baud_rate": 115200 }"#).unwrap();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.device, "/dev/ttyACM0");
        assert_eq!(config.family, Family::DynamixelXl);

        let family: BusConfig = serde_json::from_str(r#"{ "family": "dynamixel" }"#).unwrap();
        assert_eq!(family.register_map(), RegisterMap::DYNAMIXEL);
    }

    #[test]
    fn garbage_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bus.json");
        std::fs::write(&path, "not json").unwrap();
        let err = BusConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("bad bus config JSON"));
    }
}
