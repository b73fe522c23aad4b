//! Streams the raw sectors of an SD-type storage device to a consumer,
//! framed by a 4-byte little-endian length header, over either a serial
//! byte sink or one TCP connection at a time. The payload is opaque: no
//! partition or filesystem interpretation happens on the way out.

pub mod capacity;
pub mod device;
pub mod error;
pub mod mbr;
pub mod registers;
pub mod server;
pub mod session;
pub mod streamer;
pub mod transport;

#[cfg(test)]
pub(crate) mod tests_util;

/// Fixed addressable unit of the storage device.
pub const SECTOR_SIZE: usize = 512;

pub use crate::capacity::Capacity;
pub use crate::device::{Descriptor, DeviceConfig, SectorDevice};
pub use crate::error::ErrorKind;
pub use crate::registers::{Cid, Csd, Ocr, RawCid, RawCsd};
pub use crate::server::NetServer;
pub use crate::session::StorageSession;
pub use crate::streamer::{
    Streamer, TransferObserver, TransferState, NET_CHUNK_SECTORS, SERIAL_CHUNK_SECTORS,
};
pub use crate::transport::{SerialLink, TcpTransport, Transport};
