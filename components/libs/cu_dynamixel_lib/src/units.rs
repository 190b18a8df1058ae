//! Raw register units to SI quantities.

use crate::codec;
use crate::register::Width;
use uom::si::angle::revolution;
use uom::si::angular_velocity::revolution_per_minute;
use uom::si::electric_potential::volt;
use uom::si::f64::{Angle, AngularVelocity, ElectricPotential, ThermodynamicTemperature};
use uom::si::thermodynamic_temperature::degree_celsius;

/// Position ticks per output shaft revolution.
pub const TICKS_PER_REVOLUTION: f64 = 4096.0;

/// Velocity register resolution.
pub const RPM_PER_UNIT: f64 = 0.229;

/// Input voltage register resolution.
pub const VOLTS_PER_UNIT: f64 = 0.1;

pub fn position_to_angle(ticks: i32) -> Angle {
    Angle::new::<revolution>(ticks as f64 / TICKS_PER_REVOLUTION)
}

/// Nearest tick count for `angle`. Saturates at the `i32` bounds.
pub fn angle_to_position(angle: Angle) -> i32 {
    (angle.get::<revolution>() * TICKS_PER_REVOLUTION).round() as i32
}

pub fn velocity_to_angular(units: i32) -> AngularVelocity {
    AngularVelocity::new::<revolution_per_minute>(units as f64 * RPM_PER_UNIT)
}

/// Nearest velocity register value for `velocity`.
pub fn angular_to_velocity(velocity: AngularVelocity) -> i32 {
    (velocity.get::<revolution_per_minute>() / RPM_PER_UNIT).round() as i32
}

pub fn input_voltage(raw: u32) -> ElectricPotential {
    ElectricPotential::new::<volt>(raw as f64 * VOLTS_PER_UNIT)
}

pub fn temperature(raw: u32) -> ThermodynamicTemperature {
    ThermodynamicTemperature::new::<degree_celsius>(raw as f64)
}

/// Decodes a raw 4-byte position register.
#[inline]
pub fn position_register_to_angle(raw: u32) -> Angle {
    position_to_angle(codec::to_signed(raw, Width::DoubleWord))
}
