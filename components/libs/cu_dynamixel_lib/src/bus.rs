//! Register transactions against actuators sharing one half-duplex bus.
//!
//! The port and the packet layer sit behind a single lock: the wire cannot
//! carry two overlapping transactions, so every read, write and sync write
//! holds it for the whole exchange.

use crate::codec::{self, Value};
use crate::config::BusConfig;
use crate::error::{DxlError, DxlResult};
use crate::register::{ActuatorId, Register, RegisterDescriptor, RegisterMap, Width};
use crate::report;
use crate::status::{Outcome, TransportStatus};
use crate::sync_write::SyncWrite;
use crate::transport::{PacketTransport, Port, ResetLevel};
use log::{debug, info};
use parking_lot::Mutex;

/// A register value together with the outcome of the read that produced it.
///
/// `value` is zero when the transport failed; check `outcome` first.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading<T = u32> {
    pub value: T,
    pub outcome: Outcome,
}

impl<T> Reading<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        Reading {
            value: f(self.value),
            outcome: self.outcome,
        }
    }

    /// The value, if the read succeeded end to end.
    pub fn ok(self) -> Option<T> {
        self.outcome.is_success().then_some(self.value)
    }
}

struct Link<P, T> {
    port: P,
    transport: T,
    open: bool,
}

impl<P, T> Link<P, T> {
    fn ensure_open(&self) -> DxlResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(DxlError::PortClosed)
        }
    }
}

/// Owner of the port and packet layer for one serial bus.
pub struct Bus<P, T> {
    config: BusConfig,
    map: RegisterMap,
    link: Mutex<Link<P, T>>,
}

impl<P, T> Bus<P, T>
where
    P: Port,
    T: PacketTransport<P>,
{
    pub fn new(config: BusConfig, port: P, transport: T) -> Self {
        let map = config.register_map();
        Self {
            config,
            map,
            link: Mutex::new(Link {
                port,
                transport,
                open: false,
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn register_map(&self) -> &RegisterMap {
        &self.map
    }

    /// Opens the port and applies the configured baud rate.
    pub fn open(&self) -> DxlResult<()> {
        let mut link = self.link.lock();
        if link.open {
            return Ok(());
        }
        let opened = link.port.open();
        if !opened || !link.port.set_baud_rate(self.config.baud_rate) {
            if opened {
                link.port.close();
            }
            return Err(DxlError::OpenFailed {
                device: self.config.device.clone(),
                baud_rate: self.config.baud_rate,
            });
        }
        link.open = true;
        info!(
            "opened {} at {} baud",
            self.config.device,
            link.port.baud_rate()
        );
        Ok(())
    }

    pub fn close(&self) {
        let mut link = self.link.lock();
        if link.open {
            link.port.close();
            link.open = false;
            info!("closed {}", self.config.device);
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.lock().open
    }

    /// Reads `register` from actuator `id`.
    pub fn read(&self, id: ActuatorId, register: Register) -> DxlResult<Reading> {
        self.read_descriptor(id, self.map.resolve(register))
    }

    /// Reads the register described by `descriptor` from actuator `id`.
    pub fn read_descriptor(
        &self,
        id: ActuatorId,
        descriptor: RegisterDescriptor,
    ) -> DxlResult<Reading> {
        if !descriptor.access.readable() {
            return Err(DxlError::WriteOnly {
                address: descriptor.address,
            });
        }
        let mut link = self.link.lock();
        link.ensure_open()?;
        let Link {
            port, transport, ..
        } = &mut *link;
        let address = descriptor.address;
        let (bytes, status, error) = match descriptor.width {
            Width::Byte => {
                let r = transport.read1(port, id, address);
                (codec::decode(&r.data), r.status, r.error)
            }
            Width::Word => {
                let r = transport.read2(port, id, address);
                (codec::decode(&r.data), r.status, r.error)
            }
            Width::DoubleWord => {
                let r = transport.read4(port, id, address);
                (codec::decode(&r.data), r.status, r.error)
            }
        };
        drop(link);

        let outcome = Outcome::new(status, error);
        report::log_outcome("read", id, &outcome);
        let value = if outcome.transport_failed() { 0 } else { bytes? };
        debug!("read id {id} {descriptor} -> {value}");
        Ok(Reading { value, outcome })
    }

    /// Writes `value` to `register` on actuator `id`.
    pub fn write(
        &self,
        id: ActuatorId,
        register: Register,
        value: impl Into<Value>,
    ) -> DxlResult<Outcome> {
        self.write_descriptor(id, self.map.resolve(register), value)
    }

    /// Writes `value` to the register described by `descriptor`.
    ///
    /// The value is encoded before the bus is touched: a value that does not
    /// fit is rejected without any transmission.
    pub fn write_descriptor(
        &self,
        id: ActuatorId,
        descriptor: RegisterDescriptor,
        value: impl Into<Value>,
    ) -> DxlResult<Outcome> {
        if !descriptor.access.writable() {
            return Err(DxlError::ReadOnly {
                address: descriptor.address,
            });
        }
        let raw = value.into().raw();
        let payload = codec::encode(raw, descriptor.width)?;

        let mut link = self.link.lock();
        link.ensure_open()?;
        let Link {
            port, transport, ..
        } = &mut *link;
        let address = descriptor.address;
        let b = payload.as_slice();
        let response = match descriptor.width {
            Width::Byte => transport.write1(port, id, address, [b[0]]),
            Width::Word => transport.write2(port, id, address, [b[0], b[1]]),
            Width::DoubleWord => transport.write4(port, id, address, [b[0], b[1], b[2], b[3]]),
        };
        drop(link);

        debug!("write id {id} {descriptor} <- {raw}");
        let outcome = Outcome::new(response.status, response.error);
        report::log_outcome("write", id, &outcome);
        Ok(outcome)
    }

    pub fn reboot(&self, id: ActuatorId) -> DxlResult<Outcome> {
        let mut link = self.link.lock();
        link.ensure_open()?;
        let Link {
            port, transport, ..
        } = &mut *link;
        let response = transport.reboot(port, id);
        drop(link);

        let outcome = Outcome::new(response.status, response.error);
        report::log_outcome("reboot", id, &outcome);
        Ok(outcome)
    }

    pub fn factory_reset(&self, id: ActuatorId, level: ResetLevel) -> DxlResult<Outcome> {
        let mut link = self.link.lock();
        link.ensure_open()?;
        let Link {
            port, transport, ..
        } = &mut *link;
        let response = transport.factory_reset(port, id, level);
        drop(link);

        let outcome = Outcome::new(response.status, response.error);
        report::log_outcome("factory reset", id, &outcome);
        Ok(outcome)
    }

    /// Sends every entry staged in `batch` as one sync-write transmission.
    ///
    /// The batch is emptied first, whatever happens next. An empty batch
    /// sends nothing and reports [`TransportStatus::NotAvailable`].
    pub fn commit(&self, batch: &mut SyncWrite) -> DxlResult<Outcome> {
        let entries = batch.drain();
        let mut link = self.link.lock();
        link.ensure_open()?;
        if entries.is_empty() {
            return Ok(Outcome::transmitted(TransportStatus::NotAvailable));
        }
        let Link {
            port, transport, ..
        } = &mut *link;
        let status = transport.sync_write(port, batch.address(), batch.width(), &entries);
        drop(link);

        let outcome = Outcome::transmitted(status);
        debug!(
            "sync write @{} to {} actuator(s): {}",
            batch.address(),
            entries.len(),
            outcome.status
        );
        for entry in &entries {
            report::log_outcome("sync write", entry.id, &outcome);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimPort, SimTransport};
    use crate::status::DeviceErrorKind;

    fn open_bus() -> (Bus<SimPort, SimTransport>, SimTransport) {
        let sim = SimTransport::with_actuators([1, 2]);
        let bus = Bus::new(BusConfig::default(), SimPort::default(), sim.clone());
        bus.open().unwrap();
        (bus, sim)
    }

    #[test]
    fn transactions_need_an_open_port() {
        let sim = SimTransport::with_actuators([1]);
        let bus = Bus::new(BusConfig::default(), SimPort::default(), sim.clone());
        assert_eq!(bus.read(1, Register::Led), Err(DxlError::PortClosed));
        assert_eq!(bus.write(1, Register::Led, true), Err(DxlError::PortClosed));
        assert_eq!(bus.reboot(1), Err(DxlError::PortClosed));
        assert_eq!(sim.transmissions(), 0);

        bus.open().unwrap();
        assert!(bus.is_open());
        bus.close();
        assert!(!bus.is_open());
        assert_eq!(bus.read(1, Register::Led), Err(DxlError::PortClosed));
    }

    #[test]
    fn open_failure_is_reported() {
        let bus = Bus::new(
            BusConfig::default(),
            SimPort::unplugged(),
            SimTransport::default(),
        );
        assert_eq!(
            bus.open(),
            Err(DxlError::OpenFailed {
                device: "/dev/ttyACM0".into(),
                baud_rate: 1_000_000
            })
        );
        assert!(!bus.is_open());
    }

    #[test]
    fn open_applies_configured_baud_rate() {
        let sim = SimTransport::default();
        let bus = Bus::new(
            BusConfig::new("/dev/ttyUSB0", 57_600),
            SimPort::default(),
            sim,
        );
        bus.open().unwrap();
        assert_eq!(bus.link.lock().port.baud_rate(), 57_600);
    }

    #[test]
    fn write_then_read_back() {
        let (bus, _) = open_bus();
        assert!(bus.write(1, Register::GoalPosition, 2048u32).unwrap().is_success());
        let reading = bus.read(1, Register::GoalPosition).unwrap();
        assert_eq!(reading.value, 2048);
        assert_eq!(reading.ok(), Some(2048));
    }

    #[test]
    fn width_picks_the_primitive() {
        let (bus, sim) = open_bus();
        let _ = bus.write(1, Register::Led, true).unwrap();
        let _ = bus.write(1, Register::VelocityPGain, 120u16).unwrap();
        let _ = bus.write(1, Register::GoalVelocity, 265u32).unwrap();
        assert_eq!(sim.peek(1, 65, 1), vec![1]);
        assert_eq!(sim.peek(1, 78, 2), vec![120, 0]);
        assert_eq!(sim.peek(1, 104, 4), vec![0x09, 0x01, 0, 0]);
        assert_eq!(sim.last_width(), Some(Width::DoubleWord));
    }

    #[test]
    fn access_rules_are_local() {
        let (bus, sim) = open_bus();
        assert_eq!(
            bus.write(1, Register::PresentPosition, 1u32),
            Err(DxlError::ReadOnly { address: 132 })
        );
        let command = RegisterDescriptor::new(
            200,
            Width::Byte,
            crate::register::Access::WriteOnly,
        );
        assert_eq!(
            bus.read_descriptor(1, command),
            Err(DxlError::WriteOnly { address: 200 })
        );
        assert_eq!(sim.transmissions(), 0);
    }

    #[test]
    fn failed_transport_zeroes_the_value() {
        let (bus, sim) = open_bus();
        sim.poke(1, 146, &[0x2D]);
        sim.inject(TransportStatus::RxTimeout, 0);
        let reading = bus.read(1, Register::PresentTemperature).unwrap();
        assert_eq!(reading.value, 0);
        assert!(reading.outcome.transport_failed());
        assert_eq!(reading.ok(), None);
    }

    #[test]
    fn device_error_keeps_the_value() {
        let (bus, sim) = open_bus();
        sim.poke(1, 146, &[40]);
        sim.inject(TransportStatus::Success, 0x80);
        let reading = bus.read(1, Register::PresentTemperature).unwrap();
        assert_eq!(reading.value, 40);
        assert!(reading.outcome.device_error.unwrap().hardware_alert());
    }

    #[test]
    fn unknown_actuator_times_out() {
        let (bus, _) = open_bus();
        let outcome = bus.write(9, Register::Led, true).unwrap();
        assert_eq!(outcome.status, TransportStatus::RxTimeout);
    }

    #[test]
    fn eeprom_is_locked_while_torque_is_on() {
        let (bus, _) = open_bus();
        assert!(bus.write(1, Register::Torque, true).unwrap().is_success());
        let outcome = bus.write(1, Register::OperatingMode, 1u8).unwrap();
        assert!(outcome.status.is_success());
        assert_eq!(
            outcome.device_error.and_then(|e| e.kind()),
            Some(DeviceErrorKind::Access)
        );
    }

    #[test]
    fn commit_drains_even_on_a_closed_port() {
        let sim = SimTransport::with_actuators([1]);
        let bus = Bus::new(BusConfig::default(), SimPort::default(), sim.clone());
        let mut batch = SyncWrite::for_register(bus.register_map(), Register::GoalVelocity);
        batch.stage_value(1, 10u32).unwrap();
        assert_eq!(bus.commit(&mut batch), Err(DxlError::PortClosed));
        assert!(batch.is_empty());
        assert_eq!(sim.transmissions(), 0);
    }

    #[test]
    fn empty_commit_sends_nothing() {
        let (bus, sim) = open_bus();
        let mut batch = SyncWrite::for_register(bus.register_map(), Register::GoalVelocity);
        let outcome = bus.commit(&mut batch).unwrap();
        assert_eq!(outcome.status, TransportStatus::NotAvailable);
        assert_eq!(sim.transmissions(), 0);
    }

    #[test]
    fn reboot_and_reset_report_outcomes() {
        let (bus, sim) = open_bus();
        let _ = bus.write(1, Register::Torque, true).unwrap();
        assert!(bus.reboot(1).unwrap().is_success());
        assert_eq!(sim.peek(1, 64, 1), vec![0]);

        let _ = bus.write(1, Register::ReturnDelayTime, 10u8).unwrap();
        assert!(bus.factory_reset(1, ResetLevel::KeepId).unwrap().is_success());
        assert_eq!(sim.peek(1, 9, 1), vec![250]);
        assert_eq!(sim.peek(1, 7, 1), vec![1]);

        assert_eq!(
            bus.reboot(42).unwrap().status,
            TransportStatus::RxTimeout
        );
    }
}
