//! Control table of the X-series actuators (XL430-W250 and siblings).
//!
//! Every actuator on the bus exposes the same table, so the catalogue is a
//! closed enum with `const` descriptors. The EEPROM area (addresses below 64)
//! is only writable while torque is off; that rule is enforced by the device,
//! which answers with an access error.
//!
//! Reference: <https://emanual.robotis.com/docs/en/dxl/x/xl430-w250/>

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::IntoEnumIterator;

/// Bus identifier of one actuator.
pub type ActuatorId = u8;

/// Highest identifier a single actuator may carry.
pub const MAX_ACTUATOR_ID: ActuatorId = 252;

/// Identifier addressing every actuator at once. No status packet comes back.
pub const BROADCAST_ID: ActuatorId = 254;

/// Byte width of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Width {
    /// 1 byte.
    Byte,
    /// 2 bytes.
    Word,
    /// 4 bytes.
    DoubleWord,
}

impl Width {
    /// Number of bytes on the wire.
    #[inline]
    pub const fn len(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::DoubleWord => 4,
        }
    }

    /// Largest unsigned value that fits.
    #[inline]
    pub const fn max_value(self) -> u32 {
        match self {
            Self::Byte => u8::MAX as u32,
            Self::Word => u16::MAX as u32,
            Self::DoubleWord => u32::MAX,
        }
    }

    /// Width for a byte count, if it is one the protocol knows.
    pub const fn from_len(len: usize) -> Option<Self> {
        match len {
            1 => Some(Self::Byte),
            2 => Some(Self::Word),
            4 => Some(Self::DoubleWord),
            _ => None,
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} byte(s)", self.len())
    }
}

/// Who may touch a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    /// Telemetry, reported by the device.
    ReadOnly,
    /// Configuration and set-points.
    ReadWrite,
    /// Commands that read back as nothing meaningful.
    WriteOnly,
}

impl Access {
    #[inline]
    pub const fn readable(self) -> bool {
        !matches!(self, Self::WriteOnly)
    }

    #[inline]
    pub const fn writable(self) -> bool {
        !matches!(self, Self::ReadOnly)
    }
}

/// Where a register lives and how wide it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisterDescriptor {
    pub address: u16,
    pub width: Width,
    pub access: Access,
}

impl RegisterDescriptor {
    pub const fn new(address: u16, width: Width, access: Access) -> Self {
        Self {
            address,
            width,
            access,
        }
    }
}

impl fmt::Display for RegisterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} ({})", self.address, self.width)
    }
}

/// Every named parameter of the control table.
///
/// `Display` and `FromStr` use the snake_case parameter name
/// (`"goal_velocity"`); [`RegisterMap::symbol`] gives the family specific
/// constant name (`"ADDR_XL_GOAL_VELOCITY"`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Register {
    // EEPROM area
    ModelNumber,
    ModelInformation,
    FirmwareVersion,
    Id,
    BaudRate,
    ReturnDelayTime,
    DriveMode,
    OperatingMode,
    ShadowId,
    ProtocolType,
    HomingOffset,
    MovingThreshold,
    TemperatureLimit,
    MaxVoltageLimit,
    MinVoltageLimit,
    PwmLimit,
    VelocityLimit,
    MaxPositionLimit,
    MinPositionLimit,
    Shutdown,
    // RAM area
    #[strum(to_string = "torque", serialize = "torque_enable")]
    Torque,
    Led,
    StatusReturnLevel,
    RegisteredInstruction,
    HardwareErrorStatus,
    #[strum(to_string = "velocity_i_gain")]
    VelocityIGain,
    #[strum(to_string = "velocity_p_gain")]
    VelocityPGain,
    #[strum(to_string = "position_d_gain")]
    PositionDGain,
    #[strum(to_string = "position_i_gain")]
    PositionIGain,
    #[strum(to_string = "position_p_gain")]
    PositionPGain,
    #[strum(to_string = "feedforward_2_gain")]
    Feedforward2Gain,
    #[strum(to_string = "feedforward_1_gain")]
    Feedforward1Gain,
    BusWatchdog,
    GoalPwm,
    GoalVelocity,
    ProfileAcceleration,
    ProfileVelocity,
    GoalPosition,
    RealtimeTick,
    Moving,
    MovingStatus,
    PresentPwm,
    PresentLoad,
    PresentVelocity,
    PresentPosition,
    VelocityTrajectory,
    PositionTrajectory,
    PresentInputVoltage,
    PresentTemperature,
}

impl Register {
    /// Address, width and access class of this register.
    pub const fn descriptor(self) -> RegisterDescriptor {
        use Access::{ReadOnly as R, ReadWrite as RW};
        use Width::{Byte as B1, DoubleWord as B4, Word as B2};

        let (address, width, access) = match self {
            Self::ModelNumber => (0, B2, R),
            Self::ModelInformation => (2, B4, R),
            Self::FirmwareVersion => (6, B1, R),
            Self::Id => (7, B1, RW),
            Self::BaudRate => (8, B1, RW),
            Self::ReturnDelayTime => (9, B1, RW),
            Self::DriveMode => (10, B1, RW),
            Self::OperatingMode => (11, B1, RW),
            Self::ShadowId => (12, B1, RW),
            Self::ProtocolType => (13, B1, RW),
            Self::HomingOffset => (20, B4, RW),
            Self::MovingThreshold => (24, B4, RW),
            Self::TemperatureLimit => (31, B1, RW),
            Self::MaxVoltageLimit => (32, B2, RW),
            Self::MinVoltageLimit => (34, B2, RW),
            Self::PwmLimit => (36, B2, RW),
            Self::VelocityLimit => (44, B4, RW),
            Self::MaxPositionLimit => (48, B4, RW),
            Self::MinPositionLimit => (52, B4, RW),
            Self::Shutdown => (63, B1, RW),
            Self::Torque => (64, B1, RW),
            Self::Led => (65, B1, RW),
            Self::StatusReturnLevel => (68, B1, RW),
            Self::RegisteredInstruction => (69, B1, R),
            Self::HardwareErrorStatus => (70, B1, R),
            Self::VelocityIGain => (76, B2, RW),
            Self::VelocityPGain => (78, B2, RW),
            Self::PositionDGain => (80, B2, RW),
            Self::PositionIGain => (82, B2, RW),
            Self::PositionPGain => (84, B2, RW),
            Self::Feedforward2Gain => (88, B2, RW),
            Self::Feedforward1Gain => (90, B2, RW),
            Self::BusWatchdog => (98, B1, RW),
            Self::GoalPwm => (100, B2, RW),
            Self::GoalVelocity => (104, B4, RW),
            Self::ProfileAcceleration => (108, B4, RW),
            Self::ProfileVelocity => (112, B4, RW),
            Self::GoalPosition => (116, B4, RW),
            Self::RealtimeTick => (120, B2, R),
            Self::Moving => (122, B1, R),
            Self::MovingStatus => (123, B1, R),
            Self::PresentPwm => (124, B2, R),
            Self::PresentLoad => (126, B2, R),
            Self::PresentVelocity => (128, B4, R),
            Self::PresentPosition => (132, B4, R),
            Self::VelocityTrajectory => (136, B4, R),
            Self::PositionTrajectory => (140, B4, R),
            Self::PresentInputVoltage => (144, B2, R),
            Self::PresentTemperature => (146, B1, R),
        };
        RegisterDescriptor::new(address, width, access)
    }

    #[inline]
    pub const fn address(self) -> u16 {
        self.descriptor().address
    }

    #[inline]
    pub const fn width(self) -> Width {
        self.descriptor().width
    }

    /// True for registers in the non-volatile area.
    #[inline]
    pub const fn is_eeprom(self) -> bool {
        self.address() < Self::Torque.address()
    }
}

/// Naming flavour of an actuator family.
///
/// Families share addresses and widths and only differ in the prefix of
/// their constant names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Generic X-series naming, `ADDR_*`.
    Dynamixel,
    /// XL430 naming, `ADDR_XL_*`.
    #[default]
    DynamixelXl,
}

impl Family {
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Dynamixel => "ADDR_",
            Self::DynamixelXl => "ADDR_XL_",
        }
    }
}

/// The control table as seen by one actuator family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterMap {
    family: Family,
}

impl RegisterMap {
    pub const DYNAMIXEL: Self = Self::new(Family::Dynamixel);
    pub const DYNAMIXEL_XL: Self = Self::new(Family::DynamixelXl);

    pub const fn new(family: Family) -> Self {
        Self { family }
    }

    pub const fn family(&self) -> Family {
        self.family
    }

    /// Address, width and access class of `register`.
    #[inline]
    pub const fn resolve(&self, register: Register) -> RegisterDescriptor {
        register.descriptor()
    }

    /// Family specific constant name, e.g. `ADDR_XL_GOAL_VELOCITY`.
    pub fn symbol(&self, register: Register) -> String {
        format!(
            "{}{}",
            self.family.prefix(),
            register.to_string().to_ascii_uppercase()
        )
    }

    /// Looks a register up by constant name (`ADDR_XL_GOAL_VELOCITY`) or by
    /// parameter name (`goal_velocity`).
    ///
    /// Returns `None` for names outside the catalogue or carrying the other
    /// family's prefix.
    pub fn resolve_symbol(&self, name: &str) -> Option<(Register, RegisterDescriptor)> {
        let bare = match name.strip_prefix(self.family.prefix()) {
            Some(rest) => rest,
            None if name.starts_with("ADDR_") => return None,
            None => name,
        };
        let register = Register::from_str(&bare.to_ascii_lowercase()).ok()?;
        Some((register, register.descriptor()))
    }

    /// Every register of the table, in address order.
    pub fn registers(&self) -> impl Iterator<Item = (Register, RegisterDescriptor)> {
        Register::iter().map(|r| (r, r.descriptor()))
    }
}
