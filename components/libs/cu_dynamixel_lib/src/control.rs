//! Typed accessors for the registers applications touch every day.
//!
//! Everything here goes through [`Bus::read`], [`Bus::write`] and
//! [`Bus::commit`]; this module only picks registers and converts values.

use crate::bus::{Bus, Reading};
use crate::codec;
use crate::config::baud_rate_code;
use crate::error::{DxlError, DxlResult, StagingError};
use crate::register::{ActuatorId, MAX_ACTUATOR_ID, Register};
use crate::report;
use crate::status::Outcome;
use crate::sync_write::SyncWrite;
use crate::transport::{PacketTransport, Port};
use crate::units;
use serde::{Deserialize, Serialize};
use uom::si::f64::{Angle, AngularVelocity, ElectricPotential, ThermodynamicTemperature};

/// Value of the `operating_mode` register.
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
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum OperatingMode {
    Velocity = 1,
    Position = 3,
    /// Multi-turn position control.
    ExtendedPosition = 4,
    Pwm = 16,
}

impl TryFrom<u32> for OperatingMode {
    type Error = DxlError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Velocity),
            3 => Ok(Self::Position),
            4 => Ok(Self::ExtendedPosition),
            16 => Ok(Self::Pwm),
            _ => Err(DxlError::UnknownMode {
                register: Register::OperatingMode,
                value,
            }),
        }
    }
}

/// Value of the `drive_mode` register.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum DriveMode {
    #[default]
    Normal = 0,
    Reversed = 1,
}

impl TryFrom<u32> for DriveMode {
    type Error = DxlError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Normal),
            1 => Ok(Self::Reversed),
            _ => Err(DxlError::UnknownMode {
                register: Register::DriveMode,
                value,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VelocityGains {
    pub p: u16,
    pub i: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PositionGains {
    pub p: u16,
    pub i: u16,
    pub d: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedforwardGains {
    /// Velocity feedforward.
    pub first: u16,
    /// Acceleration feedforward.
    pub second: u16,
}

/// Result of a group write built from `(id, value)` pairs.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupWrite {
    /// Outcome of the single transmission.
    pub outcome: Outcome,
    /// Pairs that never made it into the batch.
    pub rejected: Vec<StagingError>,
}

impl GroupWrite {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success() && self.rejected.is_empty()
    }
}

/// First outcome that is not a success, if any.
fn first_failure(outcomes: impl IntoIterator<Item = Outcome>) -> Outcome {
    outcomes
        .into_iter()
        .find(|o| !o.is_success())
        .unwrap_or(Outcome::SUCCESS)
}

/// The status packet data is the register content: the transport worked and
/// the device raised nothing beyond a hardware alert.
fn carries_value(outcome: &Outcome) -> bool {
    !outcome.transport_failed()
        && outcome
            .device_error
            .is_none_or(|e| e.hardware_alert() && e.kind().is_none())
}

impl<P, T> Bus<P, T>
where
    P: Port,
    T: PacketTransport<P>,
{
    pub fn set_torque(&self, id: ActuatorId, enabled: bool) -> DxlResult<Outcome> {
        self.write(id, Register::Torque, enabled)
    }

    pub fn torque(&self, id: ActuatorId) -> DxlResult<Reading<bool>> {
        Ok(self.read(id, Register::Torque)?.map(|v| v != 0))
    }

    pub fn set_led(&self, id: ActuatorId, on: bool) -> DxlResult<Outcome> {
        self.write(id, Register::Led, on)
    }

    pub fn led(&self, id: ActuatorId) -> DxlResult<Reading<bool>> {
        Ok(self.read(id, Register::Led)?.map(|v| v != 0))
    }

    /// Moves actuator `id` to `new_id`. Torque must be off.
    pub fn set_id(&self, id: ActuatorId, new_id: ActuatorId) -> DxlResult<Outcome> {
        if new_id > MAX_ACTUATOR_ID {
            return Err(DxlError::InvalidId(new_id));
        }
        self.write(id, Register::Id, new_id)
    }

    /// Secondary id shared by several actuators; 255 disables it.
    pub fn set_shadow_id(&self, id: ActuatorId, shadow_id: u8) -> DxlResult<Outcome> {
        if shadow_id > MAX_ACTUATOR_ID && shadow_id != u8::MAX {
            return Err(DxlError::InvalidId(shadow_id));
        }
        self.write(id, Register::ShadowId, shadow_id)
    }

    /// Changes the baud rate of actuator `id`. The host port keeps its own
    /// rate until the bus is reconfigured.
    pub fn set_baud_rate(&self, id: ActuatorId, baud_rate: u32) -> DxlResult<Outcome> {
        let code = baud_rate_code(baud_rate).ok_or(DxlError::UnsupportedBaudRate(baud_rate))?;
        self.write(id, Register::BaudRate, code)
    }

    pub fn set_operating_mode(&self, id: ActuatorId, mode: OperatingMode) -> DxlResult<Outcome> {
        self.write(id, Register::OperatingMode, mode as u8)
    }

    /// `None` when the transport failed or the device refused the read.
    pub fn operating_mode(&self, id: ActuatorId) -> DxlResult<Reading<Option<OperatingMode>>> {
        let reading = self.read(id, Register::OperatingMode)?;
        if !carries_value(&reading.outcome) {
            return Ok(reading.map(|_| None));
        }
        let mode = OperatingMode::try_from(reading.value)?;
        Ok(reading.map(|_| Some(mode)))
    }

    pub fn set_drive_mode(&self, id: ActuatorId, mode: DriveMode) -> DxlResult<Outcome> {
        self.write(id, Register::DriveMode, mode as u8)
    }

    /// `None` when the transport failed or the device refused the read.
    pub fn drive_mode(&self, id: ActuatorId) -> DxlResult<Reading<Option<DriveMode>>> {
        let reading = self.read(id, Register::DriveMode)?;
        if !carries_value(&reading.outcome) {
            return Ok(reading.map(|_| None));
        }
        let mode = DriveMode::try_from(reading.value)?;
        Ok(reading.map(|_| Some(mode)))
    }

    /// Writes every gain register, even after a failed one. The outcome is
    /// the first failure.
    pub fn set_velocity_gains(&self, id: ActuatorId, gains: VelocityGains) -> DxlResult<Outcome> {
        Ok(first_failure([
            self.write(id, Register::VelocityPGain, gains.p)?,
            self.write(id, Register::VelocityIGain, gains.i)?,
        ]))
    }

    pub fn velocity_gains(&self, id: ActuatorId) -> DxlResult<Reading<VelocityGains>> {
        let p = self.read(id, Register::VelocityPGain)?;
        let i = self.read(id, Register::VelocityIGain)?;
        Ok(Reading {
            value: VelocityGains {
                p: p.value as u16,
                i: i.value as u16,
            },
            outcome: first_failure([p.outcome, i.outcome]),
        })
    }

    pub fn set_position_gains(&self, id: ActuatorId, gains: PositionGains) -> DxlResult<Outcome> {
        Ok(first_failure([
            self.write(id, Register::PositionPGain, gains.p)?,
            self.write(id, Register::PositionIGain, gains.i)?,
            self.write(id, Register::PositionDGain, gains.d)?,
        ]))
    }

    pub fn position_gains(&self, id: ActuatorId) -> DxlResult<Reading<PositionGains>> {
        let p = self.read(id, Register::PositionPGain)?;
        let i = self.read(id, Register::PositionIGain)?;
        let d = self.read(id, Register::PositionDGain)?;
        Ok(Reading {
            value: PositionGains {
                p: p.value as u16,
                i: i.value as u16,
                d: d.value as u16,
            },
            outcome: first_failure([p.outcome, i.outcome, d.outcome]),
        })
    }

    pub fn set_feedforward_gains(
        &self,
        id: ActuatorId,
        gains: FeedforwardGains,
    ) -> DxlResult<Outcome> {
        Ok(first_failure([
            self.write(id, Register::Feedforward1Gain, gains.first)?,
            self.write(id, Register::Feedforward2Gain, gains.second)?,
        ]))
    }

    pub fn feedforward_gains(&self, id: ActuatorId) -> DxlResult<Reading<FeedforwardGains>> {
        let first = self.read(id, Register::Feedforward1Gain)?;
        let second = self.read(id, Register::Feedforward2Gain)?;
        Ok(Reading {
            value: FeedforwardGains {
                first: first.value as u16,
                second: second.value as u16,
            },
            outcome: first_failure([first.outcome, second.outcome]),
        })
    }

    /// Signed PWM goal, bounded by `pwm_limit` on the device.
    pub fn set_goal_pwm(&self, id: ActuatorId, pwm: i16) -> DxlResult<Outcome> {
        self.write_signed(id, Register::GoalPwm, pwm as i32)
    }

    /// Signed velocity goal in register units (0.229 rpm).
    pub fn set_goal_velocity(&self, id: ActuatorId, velocity: i32) -> DxlResult<Outcome> {
        self.write_signed(id, Register::GoalVelocity, velocity)
    }

    pub fn set_goal_angular_velocity(
        &self,
        id: ActuatorId,
        velocity: AngularVelocity,
    ) -> DxlResult<Outcome> {
        self.set_goal_velocity(id, units::angular_to_velocity(velocity))
    }

    /// Position goal in ticks. Negative goals only make sense in extended
    /// position mode.
    pub fn set_goal_position(&self, id: ActuatorId, position: i32) -> DxlResult<Outcome> {
        self.write_signed(id, Register::GoalPosition, position)
    }

    pub fn set_goal_angle(&self, id: ActuatorId, angle: Angle) -> DxlResult<Outcome> {
        self.set_goal_position(id, units::angle_to_position(angle))
    }

    pub fn goal_velocity(&self, id: ActuatorId) -> DxlResult<Reading<i32>> {
        self.read_signed(id, Register::GoalVelocity)
    }

    pub fn goal_position(&self, id: ActuatorId) -> DxlResult<Reading<i32>> {
        self.read_signed(id, Register::GoalPosition)
    }

    pub fn present_position(&self, id: ActuatorId) -> DxlResult<Reading<i32>> {
        self.read_signed(id, Register::PresentPosition)
    }

    pub fn present_angle(&self, id: ActuatorId) -> DxlResult<Reading<Angle>> {
        Ok(self.present_position(id)?.map(units::position_to_angle))
    }

    pub fn present_velocity(&self, id: ActuatorId) -> DxlResult<Reading<i32>> {
        self.read_signed(id, Register::PresentVelocity)
    }

    pub fn present_angular_velocity(&self, id: ActuatorId) -> DxlResult<Reading<AngularVelocity>> {
        Ok(self.present_velocity(id)?.map(units::velocity_to_angular))
    }

    /// Load in 0.1 % of the maximum torque; negative is clockwise.
    pub fn present_load(&self, id: ActuatorId) -> DxlResult<Reading<i32>> {
        self.read_signed(id, Register::PresentLoad)
    }

    pub fn present_pwm(&self, id: ActuatorId) -> DxlResult<Reading<i32>> {
        self.read_signed(id, Register::PresentPwm)
    }

    pub fn present_temperature(
        &self,
        id: ActuatorId,
    ) -> DxlResult<Reading<ThermodynamicTemperature>> {
        Ok(self.read(id, Register::PresentTemperature)?.map(units::temperature))
    }

    pub fn present_input_voltage(&self, id: ActuatorId) -> DxlResult<Reading<ElectricPotential>> {
        Ok(self.read(id, Register::PresentInputVoltage)?.map(units::input_voltage))
    }

    pub fn moving(&self, id: ActuatorId) -> DxlResult<Reading<bool>> {
        Ok(self.read(id, Register::Moving)?.map(|v| v != 0))
    }

    pub fn model_number(&self, id: ActuatorId) -> DxlResult<Reading<u16>> {
        Ok(self.read(id, Register::ModelNumber)?.map(|v| v as u16))
    }

    pub fn firmware_version(&self, id: ActuatorId) -> DxlResult<Reading<u8>> {
        Ok(self.read(id, Register::FirmwareVersion)?.map(|v| v as u8))
    }

    /// Sets the velocity goal of several actuators in one transmission.
    pub fn sync_goal_velocity(
        &self,
        goals: impl IntoIterator<Item = (ActuatorId, i32)>,
    ) -> DxlResult<GroupWrite> {
        self.sync_signed(Register::GoalVelocity, goals)
    }

    /// Sets the position goal of several actuators in one transmission.
    pub fn sync_goal_position(
        &self,
        goals: impl IntoIterator<Item = (ActuatorId, i32)>,
    ) -> DxlResult<GroupWrite> {
        self.sync_signed(Register::GoalPosition, goals)
    }

    pub fn sync_torque(
        &self,
        ids: impl IntoIterator<Item = ActuatorId>,
        enabled: bool,
    ) -> DxlResult<GroupWrite> {
        let mut batch = SyncWrite::for_register(self.register_map(), Register::Torque);
        let rejected = batch.stage_all(ids.into_iter().map(|id| (id, enabled)));
        let outcome = self.commit(&mut batch)?;
        Ok(GroupWrite { outcome, rejected })
    }

    fn write_signed(&self, id: ActuatorId, register: Register, value: i32) -> DxlResult<Outcome> {
        let raw = codec::from_signed(value, register.width())?;
        self.write(id, register, raw)
    }

    fn read_signed(&self, id: ActuatorId, register: Register) -> DxlResult<Reading<i32>> {
        let width = register.width();
        Ok(self.read(id, register)?.map(|raw| codec::to_signed(raw, width)))
    }

    fn sync_signed(
        &self,
        register: Register,
        goals: impl IntoIterator<Item = (ActuatorId, i32)>,
    ) -> DxlResult<GroupWrite> {
        let mut batch = SyncWrite::for_register(self.register_map(), register);
        let mut rejected = Vec::new();
        for (id, goal) in goals {
            let staged = codec::from_signed(goal, batch.width())
                .map_err(|e| {
                    let err = StagingError::new(id, e.into());
                    report::log_staging(&err);
                    err
                })
                .and_then(|raw| batch.stage_value(id, raw));
            if let Err(err) = staged {
                rejected.push(err);
            }
        }
        let outcome = self.commit(&mut batch)?;
        Ok(GroupWrite { outcome, rejected })
    }
}
