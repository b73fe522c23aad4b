
use crate::error::ErrorKind;
use crate::registers::{Ocr, RawCid, RawCsd};
use log::info;

/// Raw register contents read from the card before use.
#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub cid: RawCid,
    pub csd: RawCsd,
    pub ocr: Ocr,
}

/// Seam to the storage peripheral. Implementations own the bus; callers
/// must check every result before proceeding.
pub trait SectorDevice {
    fn read_descriptor(&mut self) -> Result<Descriptor, ErrorKind>;

    /// Fill `data` with `count` sectors starting at `lba`. `data` must be
    /// exactly `count * SECTOR_SIZE` bytes.
    fn read_sectors(&mut self, lba: u32, count: u32, data: &mut [u8])
        -> Result<(), ErrorKind>;
}

/// Fixed wiring and link parameters, set at construction and echoed as
/// diagnostics when a session opens.
#[derive(Debug, Clone, Copy)]
pub struct DeviceConfig {
    pub cs_pin: u8,
    /// Chip select of a competing SPI device to hold high, if any.
    pub disable_cs_pin: Option<u8>,
    pub baud_rate: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            cs_pin: 10,
            disable_cs_pin: None,
            baud_rate: 115_200,
        }
    }
}

impl DeviceConfig {
    pub fn announce(&self) {
        match self.disable_cs_pin {
            Some(pin) => info!("disabling competing spi device on pin {}", pin),
            None => info!("assuming the card is the only spi device"),
        }
        info!("card chip select pin: {}", self.cs_pin);
        info!("link baud rate: {}", self.baud_rate);
    }
}
