//! In-memory actuators behind a fake port.
//!
//! Each simulated actuator holds a full control table seeded with the
//! XL430-W250 factory defaults and enforces the device-side rules the
//! register layer relies on: unknown ids time out, the EEPROM area is locked
//! while torque is on, goal velocity is bounded by the velocity limit, and an
//! ID change moves the actuator to its new address. With torque on, goals are
//! reached instantly.
//!
//! [`SimTransport`] is a cheap handle; clone it before handing it to a
//! [`Bus`](crate::bus::Bus) to keep inspecting the tables.

use crate::codec;
use crate::register::{Access, ActuatorId, BROADCAST_ID, MAX_ACTUATOR_ID, Register, Width};
use crate::status::TransportStatus;
use crate::transport::{PacketTransport, Port, Response, ResetLevel, SyncEntry};
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use strum::IntoEnumIterator;

/// Bytes in one simulated control table.
pub const TABLE_LEN: usize = 148;

const MODEL_XL430_W250: u32 = 1060;

const ERR_DATA_RANGE: u8 = 4;
const ERR_DATA_LIMIT: u8 = 6;
const ERR_ACCESS: u8 = 7;

type Table = [u8; TABLE_LEN];

fn put(table: &mut Table, register: Register, value: u32) {
    let d = register.descriptor();
    let start = d.address as usize;
    table[start..start + d.width.len()].copy_from_slice(&value.to_le_bytes()[..d.width.len()]);
}

fn get(table: &Table, register: Register) -> u32 {
    let d = register.descriptor();
    let start = d.address as usize;
    codec::decode(&table[start..start + d.width.len()]).unwrap_or(0)
}

fn factory_table(id: ActuatorId) -> Table {
    let mut t = [0u8; TABLE_LEN];
    put(&mut t, Register::ModelNumber, MODEL_XL430_W250);
    put(&mut t, Register::FirmwareVersion, 46);
    put(&mut t, Register::Id, id as u32);
    put(&mut t, Register::BaudRate, 1);
    put(&mut t, Register::ReturnDelayTime, 250);
    put(&mut t, Register::OperatingMode, 3);
    put(&mut t, Register::ShadowId, 255);
    put(&mut t, Register::ProtocolType, 2);
    put(&mut t, Register::MovingThreshold, 10);
    put(&mut t, Register::TemperatureLimit, 72);
    put(&mut t, Register::MaxVoltageLimit, 140);
    put(&mut t, Register::MinVoltageLimit, 60);
    put(&mut t, Register::PwmLimit, 885);
    put(&mut t, Register::VelocityLimit, 265);
    put(&mut t, Register::MaxPositionLimit, 4095);
    put(&mut t, Register::Shutdown, 52);
    reset_ram(&mut t);
    t
}

fn reset_ram(t: &mut Table) {
    let ram = Register::Torque.address() as usize;
    t[ram..].fill(0);
    put(t, Register::StatusReturnLevel, 2);
    put(t, Register::VelocityIGain, 1000);
    put(t, Register::VelocityPGain, 100);
    put(t, Register::PositionDGain, 4000);
    put(t, Register::PositionPGain, 640);
    put(t, Register::GoalPwm, 885);
    put(t, Register::PresentInputVoltage, 120);
    put(t, Register::PresentTemperature, 30);
}

/// Moves present values onto their goals when torque is on.
fn settle(table: &mut Table) {
    if get(table, Register::Torque) == 0 {
        put(table, Register::PresentVelocity, 0);
        return;
    }
    match get(table, Register::OperatingMode) {
        1 => {
            let goal = get(table, Register::GoalVelocity);
            put(table, Register::PresentVelocity, goal);
        }
        3 | 4 => {
            let goal = get(table, Register::GoalPosition);
            put(table, Register::PresentPosition, goal);
        }
        16 => {
            let goal = get(table, Register::GoalPwm);
            put(table, Register::PresentPwm, goal);
        }
        _ => {}
    }
}

fn read_only(address: usize, len: usize) -> bool {
    Register::iter().any(|r| {
        let d = r.descriptor();
        let start = d.address as usize;
        d.access == Access::ReadOnly && start < address + len && address < start + d.width.len()
    })
}

#[derive(Default)]
struct SimState {
    tables: BTreeMap<ActuatorId, Table>,
    faults: VecDeque<(TransportStatus, u8)>,
    transmissions: usize,
    last_width: Option<Width>,
}

impl SimState {
    fn begin(&mut self, width: Option<Width>) -> Option<(TransportStatus, u8)> {
        self.transmissions += 1;
        self.last_width = width;
        self.faults.pop_front()
    }

    /// Applies a write to one actuator and returns the device error byte.
    fn apply_write(&mut self, id: ActuatorId, address: u16, data: &[u8]) -> Option<u8> {
        let mut table = *self.tables.get(&id)?;
        let start = address as usize;
        let end = start + data.len();
        if end > TABLE_LEN || read_only(start, data.len()) {
            return Some(ERR_ACCESS);
        }
        let torque_on = get(&table, Register::Torque) != 0;
        if torque_on && start < Register::Torque.address() as usize {
            return Some(ERR_ACCESS);
        }
        table[start..end].copy_from_slice(data);

        if address == Register::GoalVelocity.address() && data.len() == 4 {
            let velocity = codec::to_signed(get(&table, Register::GoalVelocity), Width::DoubleWord);
            let limit = get(&table, Register::VelocityLimit);
            if velocity.unsigned_abs() > limit {
                return Some(ERR_DATA_LIMIT);
            }
        }
        if address == Register::Id.address() {
            let new_id = get(&table, Register::Id) as ActuatorId;
            if new_id > MAX_ACTUATOR_ID {
                return Some(ERR_DATA_RANGE);
            }
            self.tables.remove(&id);
            settle(&mut table);
            self.tables.insert(new_id, table);
            return Some(0);
        }
        settle(&mut table);
        self.tables.insert(id, table);
        Some(0)
    }

    fn read<const N: usize>(&mut self, id: ActuatorId, address: u16) -> Response<[u8; N]> {
        let width = Width::from_len(N);
        if let Some((status, error)) = self.begin(width) {
            let data = self.peek_array(id, address).unwrap_or([0; N]);
            return Response::new(data, status, error);
        }
        if id == BROADCAST_ID || !self.tables.contains_key(&id) {
            return Response::new([0; N], TransportStatus::RxTimeout, 0);
        }
        match self.peek_array(id, address) {
            Some(data) => Response::new(data, TransportStatus::Success, 0),
            None => Response::new([0; N], TransportStatus::Success, ERR_ACCESS),
        }
    }

    fn write(&mut self, id: ActuatorId, address: u16, data: &[u8]) -> Response<()> {
        let injected = self.begin(Width::from_len(data.len()));
        if id == BROADCAST_ID {
            let ids: Vec<_> = self.tables.keys().copied().collect();
            for id in ids {
                self.apply_write(id, address, data);
            }
            let (status, error) = injected.unwrap_or((TransportStatus::Success, 0));
            return Response::ack(status, error);
        }
        let error = self.apply_write(id, address, data);
        match (injected, error) {
            (Some((status, error)), _) => Response::ack(status, error),
            (None, Some(error)) => Response::ack(TransportStatus::Success, error),
            (None, None) => Response::ack(TransportStatus::RxTimeout, 0),
        }
    }

    fn peek_array<const N: usize>(&self, id: ActuatorId, address: u16) -> Option<[u8; N]> {
        let table = self.tables.get(&id)?;
        let start = address as usize;
        table.get(start..start + N)?.try_into().ok()
    }
}

/// Simulated packet layer. See the module docs.
#[derive(Clone, Default)]
pub struct SimTransport {
    state: Arc<Mutex<SimState>>,
    busy: Arc<AtomicBool>,
    overlaps: Arc<AtomicUsize>,
}

impl SimTransport {
    /// A bus with factory-fresh actuators at `ids`.
    pub fn with_actuators(ids: impl IntoIterator<Item = ActuatorId>) -> Self {
        let sim = Self::default();
        for id in ids {
            sim.add_actuator(id);
        }
        sim
    }

    pub fn add_actuator(&self, id: ActuatorId) {
        self.state.lock().tables.insert(id, factory_table(id));
    }

    pub fn ids(&self) -> Vec<ActuatorId> {
        self.state.lock().tables.keys().copied().collect()
    }

    /// Overwrites raw table bytes, bypassing every device rule.
    pub fn poke(&self, id: ActuatorId, address: u16, bytes: &[u8]) {
        if let Some(table) = self.state.lock().tables.get_mut(&id) {
            let start = address as usize;
            if let Some(dst) = table.get_mut(start..start + bytes.len()) {
                dst.copy_from_slice(bytes);
            }
        }
    }

    /// Raw table bytes, empty for an unknown id or range.
    pub fn peek(&self, id: ActuatorId, address: u16, len: usize) -> Vec<u8> {
        let state = self.state.lock();
        let start = address as usize;
        state
            .tables
            .get(&id)
            .and_then(|t| t.get(start..start + len))
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }

    /// Makes the next exchange report `status` and device error `error`.
    ///
    /// A sync write only takes the status. Faults queue up in order.
    pub fn inject(&self, status: TransportStatus, error: u8) {
        self.state.lock().faults.push_back((status, error));
    }

    /// Number of packets sent so far.
    pub fn transmissions(&self) -> usize {
        self.state.lock().transmissions
    }

    /// Width of the last read or write primitive used.
    pub fn last_width(&self) -> Option<Width> {
        self.state.lock().last_width
    }

    /// Exchanges that started while another one was still in progress.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn exchange<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        if self.busy.swap(true, Ordering::SeqCst) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::yield_now();
        let result = f(&mut *self.state.lock());
        self.busy.store(false, Ordering::SeqCst);
        result
    }
}

impl PacketTransport<SimPort> for SimTransport {
    fn read1(&mut self, _port: &mut SimPort, id: ActuatorId, address: u16) -> Response<[u8; 1]> {
        self.exchange(|s| s.read(id, address))
    }

    fn read2(&mut self, _port: &mut SimPort, id: ActuatorId, address: u16) -> Response<[u8; 2]> {
        self.exchange(|s| s.read(id, address))
    }

    fn read4(&mut self, _port: &mut SimPort, id: ActuatorId, address: u16) -> Response<[u8; 4]> {
        self.exchange(|s| s.read(id, address))
    }

    fn write1(
        &mut self,
        _port: &mut SimPort,
        id: ActuatorId,
        address: u16,
        data: [u8; 1],
    ) -> Response<()> {
        self.exchange(|s| s.write(id, address, &data))
    }

    fn write2(
        &mut self,
        _port: &mut SimPort,
        id: ActuatorId,
        address: u16,
        data: [u8; 2],
    ) -> Response<()> {
        self.exchange(|s| s.write(id, address, &data))
    }

    fn write4(
        &mut self,
        _port: &mut SimPort,
        id: ActuatorId,
        address: u16,
        data: [u8; 4],
    ) -> Response<()> {
        self.exchange(|s| s.write(id, address, &data))
    }

    fn reboot(&mut self, _port: &mut SimPort, id: ActuatorId) -> Response<()> {
        self.exchange(|s| {
            if let Some((status, error)) = s.begin(None) {
                return Response::ack(status, error);
            }
            match s.tables.get_mut(&id) {
                Some(table) => {
                    reset_ram(table);
                    Response::ack(TransportStatus::Success, 0)
                }
                None => Response::ack(TransportStatus::RxTimeout, 0),
            }
        })
    }

    fn factory_reset(
        &mut self,
        _port: &mut SimPort,
        id: ActuatorId,
        level: ResetLevel,
    ) -> Response<()> {
        self.exchange(|s| {
            if let Some((status, error)) = s.begin(None) {
                return Response::ack(status, error);
            }
            let Some(old) = s.tables.remove(&id) else {
                return Response::ack(TransportStatus::RxTimeout, 0);
            };
            let (new_id, table) = match level {
                ResetLevel::All => (1, factory_table(1)),
                ResetLevel::KeepId => (id, factory_table(id)),
                ResetLevel::KeepIdAndBaud => {
                    let mut table = factory_table(id);
                    put(&mut table, Register::BaudRate, get(&old, Register::BaudRate));
                    (id, table)
                }
            };
            s.tables.insert(new_id, table);
            Response::ack(TransportStatus::Success, 0)
        })
    }

    fn sync_write(
        &mut self,
        _port: &mut SimPort,
        address: u16,
        width: Width,
        entries: &[SyncEntry],
    ) -> TransportStatus {
        self.exchange(|s| {
            if let Some((status, _)) = s.begin(Some(width)) {
                return status;
            }
            for entry in entries {
                s.apply_write(entry.id, address, &entry.data);
            }
            TransportStatus::Success
        })
    }
}

/// Serial port stand-in that only tracks its own state.
#[derive(Debug, Clone)]
pub struct SimPort {
    open: bool,
    baud_rate: u32,
    plugged: bool,
}

impl Default for SimPort {
    fn default() -> Self {
        Self {
            open: false,
            baud_rate: 57_600,
            plugged: true,
        }
    }
}

impl SimPort {
    /// A port whose device is missing: `open` always fails.
    pub fn unplugged() -> Self {
        Self {
            plugged: false,
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Port for SimPort {
    fn open(&mut self) -> bool {
        self.open = self.plugged;
        self.open
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> bool {
        if !self.open {
            return false;
        }
        self.baud_rate = baud_rate;
        true
    }

    fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_defaults() {
        let sim = SimTransport::with_actuators([5]);
        assert_eq!(sim.peek(5, 0, 2), vec![0x24, 0x04]);
        assert_eq!(sim.peek(5, 7, 1), vec![5]);
        assert_eq!(sim.peek(5, 44, 4), vec![0x09, 0x01, 0, 0]);
        assert!(sim.peek(6, 0, 2).is_empty());
        assert!(sim.peek(5, 147, 4).is_empty());
    }

    #[test]
    fn writes_respect_device_rules() {
        let sim = SimTransport::with_actuators([1]);
        let mut state = sim.state.lock();

        assert_eq!(state.apply_write(1, 146, &[1]), Some(ERR_ACCESS));
        assert_eq!(state.apply_write(1, 104, &1000u32.to_le_bytes()), Some(ERR_DATA_LIMIT));
        assert_eq!(state.apply_write(2, 65, &[1]), None);

        assert_eq!(state.apply_write(1, 64, &[1]), Some(0));
        assert_eq!(state.apply_write(1, 11, &[1]), Some(ERR_ACCESS));
        assert_eq!(state.apply_write(1, 64, &[0]), Some(0));
        assert_eq!(state.apply_write(1, 11, &[1]), Some(0));
    }

    #[test]
    fn most_negative_velocity_is_over_the_limit() {
        let sim = SimTransport::with_actuators([1]);
        let mut state = sim.state.lock();
        let raw = 0x8000_0000u32.to_le_bytes();
        assert_eq!(state.apply_write(1, 104, &raw), Some(ERR_DATA_LIMIT));
        assert_eq!(get(&state.tables[&1], Register::GoalVelocity), 0);
    }

    #[test]
    fn broadcast_write_takes_the_queued_fault() {
        let mut sim = SimTransport::with_actuators([1, 2]);
        let mut port = SimPort::default();
        sim.inject(TransportStatus::TxFail, 0);

        let response = sim.write1(&mut port, BROADCAST_ID, 65, [1]);
        assert_eq!(response.status, TransportStatus::TxFail);
        assert_eq!(sim.peek(1, 65, 1), vec![1]);
        assert_eq!(sim.peek(2, 65, 1), vec![1]);

        let response = sim.write1(&mut port, 1, 65, [0]);
        assert_eq!(response, Response::ack(TransportStatus::Success, 0));
    }

    #[test]
    fn id_change_moves_the_actuator() {
        let sim = SimTransport::with_actuators([1]);
        let mut state = sim.state.lock();
        assert_eq!(state.apply_write(1, 7, &[9]), Some(0));
        assert!(!state.tables.contains_key(&1));
        assert!(state.tables.contains_key(&9));
        assert_eq!(state.apply_write(9, 7, &[253]), Some(ERR_DATA_RANGE));
    }

    #[test]
    fn torque_on_reaches_goals() {
        let sim = SimTransport::with_actuators([1]);
        let mut state = sim.state.lock();
        state.apply_write(1, 116, &2000u32.to_le_bytes());
        state.apply_write(1, 64, &[1]);
        let table = state.tables[&1];
        assert_eq!(get(&table, Register::PresentPosition), 2000);
    }

    #[test]
    fn port_needs_a_device() {
        let mut port = SimPort::unplugged();
        assert!(!port.open());
        assert!(!port.set_baud_rate(1_000_000));

        let mut port = SimPort::default();
        assert!(port.open());
        assert!(port.set_baud_rate(1_000_000));
        assert_eq!(port.baud_rate(), 1_000_000);
        port.close();
        assert!(!port.is_open());
    }
}
