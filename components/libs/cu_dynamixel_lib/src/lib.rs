//! Register transaction layer for Dynamixel X-series smart servos.
//!
//! Actuators on one half-duplex serial bus all expose the same control table.
//! This crate maps named parameters to their registers, encodes values to
//! little-endian payloads, and runs single reads/writes and synchronized group
//! writes through a [`Bus`]. Framing and the serial device are left to
//! implementations of [`PacketTransport`] and [`Port`].
//!
//! ```
//! use cu_dynamixel_lib::sim::{SimPort, SimTransport};
//! use cu_dynamixel_lib::{Bus, BusConfig, Register, SyncWrite};
//!
//! let bus = Bus::new(
//!     BusConfig::default(),
//!     SimPort::default(),
//!     SimTransport::with_actuators([1, 2]),
//! );
//! bus.open().unwrap();
//!
//! let mut batch = SyncWrite::for_register(bus.register_map(), Register::GoalVelocity);
//! batch.stage_value(1, 265u32).unwrap();
//! batch.stage_value(2, 0u32).unwrap();
//! assert!(bus.commit(&mut batch).unwrap().is_success());
//! assert!(batch.is_empty());
//!
//! let temperature = bus.read(1, Register::PresentTemperature).unwrap();
//! assert!(temperature.outcome.is_success());
//! ```

pub mod bus;
pub mod codec;
pub mod config;
pub mod control;
pub mod error;
pub mod register;
pub mod report;
pub mod sim;
pub mod status;
pub mod sync_write;
pub mod transport;
pub mod units;

pub use bus::{Bus, Reading};
pub use codec::{Payload, Value};
pub use config::BusConfig;
pub use control::{
    DriveMode, FeedforwardGains, GroupWrite, OperatingMode, PositionGains, VelocityGains,
};
pub use error::{DxlError, DxlResult, RangeError, StagingError, StagingFailure};
pub use register::{
    Access, ActuatorId, BROADCAST_ID, Family, MAX_ACTUATOR_ID, Register, RegisterDescriptor,
    RegisterMap, Width,
};
pub use status::{DeviceError, DeviceErrorKind, Outcome, TransportStatus};
pub use sync_write::SyncWrite;
pub use transport::{PacketTransport, Port, ResetLevel, Response, SyncEntry};
