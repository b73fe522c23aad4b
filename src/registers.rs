
use crate::error::ErrorKind;
use log::error;
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

pub(crate) const CRC7: crc::Crc<u8> = crc::Crc::<u8>::new(&crc::CRC_7_MMC);

/// Card identification register, raw 16 bytes as shifted off the bus.
#[derive(Debug, AsBytes, FromBytes, PartialEq, Eq, Clone, Copy)]
#[repr(C)]
pub struct RawCid(pub [u8; 16]);

/// Card specific data register, raw 16 bytes as shifted off the bus.
#[derive(Debug, AsBytes, FromBytes, PartialEq, Eq, Clone, Copy)]
#[repr(C)]
pub struct RawCsd(pub [u8; 16]);

impl TryFrom<&[u8]> for RawCid {
    type Error = ErrorKind;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let reg: Option<LayoutVerified<_, RawCid>> = LayoutVerified::new(bytes);
        if let Some(reg) = reg {
            return Ok(*reg);
        }

        error!("Failure to create cid register from bytes.");
        return Err(ErrorKind::DescriptorUnreadable);
    }
}

impl TryFrom<&[u8]> for RawCsd {
    type Error = ErrorKind;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let reg: Option<LayoutVerified<_, RawCsd>> = LayoutVerified::new(bytes);
        if let Some(reg) = reg {
            return Ok(*reg);
        }

        error!("Failure to create csd register from bytes.");
        return Err(ErrorKind::DescriptorUnreadable);
    }
}

/// True when the register trailer byte carries a CRC-7 matching the first
/// fifteen bytes. The trailer stores the CRC in its upper seven bits with
/// the end bit set below it.
pub fn crc7_matches(reg: &[u8; 16]) -> bool {
    (CRC7.checksum(&reg[..15]) << 1) | 1 == reg[15]
}

/// Recompute and store the trailer byte of a register image.
pub fn fix_crc7(reg: &mut [u8; 16]) {
    reg[15] = (CRC7.checksum(&reg[..15]) << 1) | 1;
}

/// Card identification fields, decoded from [`RawCid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cid {
    pub manufacturer_id: u8,
    pub oem_id: [u8; 2],
    pub product_name: [u8; 5],
    pub product_revision: (u8, u8),
    pub serial_number: u32,
    pub manufacturing_year: u16,
    pub manufacturing_month: u8,
}

impl From<&RawCid> for Cid {
    fn from(raw: &RawCid) -> Self {
        let b = &raw.0;
        Cid {
            manufacturer_id: b[0],
            oem_id: [b[1], b[2]],
            product_name: [b[3], b[4], b[5], b[6], b[7]],
            product_revision: (b[8] >> 4, b[8] & 0x0f),
            serial_number: (b[9] as u32) << 24
                | (b[10] as u32) << 16
                | (b[11] as u32) << 8
                | (b[12] as u32),
            manufacturing_year: 2000 + (((b[13] & 0x0f) as u16) << 4 | (b[14] >> 4) as u16),
            manufacturing_month: b[14] & 0x0f,
        }
    }
}

/// Capacity and erase fields of the CSD, by layout version. The two
/// layouts place the erase fields at the same bit positions; the capacity
/// fields differ and are decoded bit-for-bit per the published format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Csd {
    V1 {
        read_bl_len: u8,
        c_size: u32,
        c_size_mult: u8,
        erase_single_block: bool,
        sector_size_high: u8,
        sector_size_low: u8,
    },
    V2 {
        c_size: u32,
        erase_single_block: bool,
        sector_size_high: u8,
        sector_size_low: u8,
    },
}

impl TryFrom<&RawCsd> for Csd {
    type Error = ErrorKind;

    fn try_from(raw: &RawCsd) -> Result<Self, Self::Error> {
        let b = &raw.0;
        let erase_single_block = b[10] & 0x40 != 0;
        let sector_size_high = b[10] & 0x3f;
        let sector_size_low = b[11] >> 7;
        match b[0] >> 6 {
            0 => Ok(Csd::V1 {
                read_bl_len: b[5] & 0x0f,
                c_size: ((b[6] & 0x03) as u32) << 10 | (b[7] as u32) << 2 | (b[8] >> 6) as u32,
                c_size_mult: (b[9] & 0x03) << 1 | b[10] >> 7,
                erase_single_block,
                sector_size_high,
                sector_size_low,
            }),
            1 => Ok(Csd::V2 {
                c_size: ((b[7] & 0x3f) as u32) << 16 | (b[8] as u32) << 8 | b[9] as u32,
                erase_single_block,
                sector_size_high,
                sector_size_low,
            }),
            version => {
                error!("unrecognized csd structure version: {}", version);
                Err(ErrorKind::UnknownCsdVersion)
            }
        }
    }
}

impl Csd {
    pub fn version(&self) -> u8 {
        match self {
            Csd::V1 { .. } => 1,
            Csd::V2 { .. } => 2,
        }
    }
}

/// Operating conditions register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ocr(pub u32);

impl Ocr {
    /// Card power-up status bit (busy when clear).
    pub fn powered_up(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Card capacity status; set for high capacity cards.
    pub fn high_capacity(&self) -> bool {
        self.0 & 0x4000_0000 != 0
    }

    /// Supported voltage window, in tenths of a volt, as (min, max).
    pub fn voltage_window(&self) -> (u8, u8) {
        let mut min = 0;
        let mut max = 0;
        for bit in 15u32..=23 {
            if self.0 & (1u32 << bit) != 0 {
                // Bit 15 is the 2.7-2.8V band.
                if min == 0 {
                    min = 27 + (bit - 15) as u8;
                }
                max = 28 + (bit - 15) as u8;
            }
        }
        (min, max)
    }
}
