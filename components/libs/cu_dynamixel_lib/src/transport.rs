//! Collaborator traits: the serial port and the packet layer on top of it.
//!
//! Framing, checksums and instruction encoding live behind
//! [`PacketTransport`]. Payloads cross this boundary as raw little-endian
//! bytes produced by [`codec`](crate::codec).

use crate::codec::Payload;
use crate::register::{ActuatorId, Width};
use crate::status::TransportStatus;
use serde::{Deserialize, Serialize};

/// Physical serial connection.
pub trait Port: Send {
    /// Opens the device. Returns `false` when it cannot be opened.
    fn open(&mut self) -> bool;

    fn close(&mut self);

    /// Returns `false` when the rate is refused by the device driver.
    fn set_baud_rate(&mut self, baud_rate: u32) -> bool;

    fn baud_rate(&self) -> u32;
}

/// Data returned by one request/response exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<T> {
    pub data: T,
    pub status: TransportStatus,
    /// Error byte of the status packet, `0` when clean.
    pub error: u8,
}

impl<T> Response<T> {
    pub const fn new(data: T, status: TransportStatus, error: u8) -> Self {
        Self {
            data,
            status,
            error,
        }
    }
}

impl Response<()> {
    pub const fn ack(status: TransportStatus, error: u8) -> Self {
        Self::new((), status, error)
    }
}

/// One participant of a sync write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEntry {
    pub id: ActuatorId,
    pub data: Payload,
}

/// What a factory reset keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResetLevel {
    /// Resets every register, including ID and baud rate.
    #[default]
    All = 0xFF,
    KeepId = 0x01,
    KeepIdAndBaud = 0x02,
}

/// Packet layer speaking the Dynamixel protocol over a [`Port`].
///
/// Each method is one blocking exchange on the bus.
pub trait PacketTransport<P: Port>: Send {
    fn read1(&mut self, port: &mut P, id: ActuatorId, address: u16) -> Response<[u8; 1]>;
    fn read2(&mut self, port: &mut P, id: ActuatorId, address: u16) -> Response<[u8; 2]>;
    fn read4(&mut self, port: &mut P, id: ActuatorId, address: u16) -> Response<[u8; 4]>;

    fn write1(&mut self, port: &mut P, id: ActuatorId, address: u16, data: [u8; 1])
    -> Response<()>;
    fn write2(&mut self, port: &mut P, id: ActuatorId, address: u16, data: [u8; 2])
    -> Response<()>;
    fn write4(&mut self, port: &mut P, id: ActuatorId, address: u16, data: [u8; 4])
    -> Response<()>;

    fn reboot(&mut self, port: &mut P, id: ActuatorId) -> Response<()>;

    fn factory_reset(&mut self, port: &mut P, id: ActuatorId, level: ResetLevel) -> Response<()>;

    /// Transmits one sync-write instruction carrying every entry.
    ///
    /// There is no per-actuator acknowledgement, only the aggregate status.
    fn sync_write(
        &mut self,
        port: &mut P,
        address: u16,
        width: Width,
        entries: &[SyncEntry],
    ) -> TransportStatus;
}
