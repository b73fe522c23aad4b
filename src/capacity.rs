
use crate::error::ErrorKind;
use crate::registers::Csd;
use log::error;

/// Addressable size and erase granularity resolved from the CSD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub total_sectors: u32,
    pub erase_block_sectors: u32,
    pub erase_single_block: bool,
}

/// Resolve total sector count and erase geometry from a decoded CSD.
/// Purely computational; the erase figures are informational and play no
/// part in the transfer itself.
pub fn resolve(csd: &Csd) -> Result<Capacity, ErrorKind> {
    let (erase_single_block, high, low) = match *csd {
        Csd::V1 {
            erase_single_block,
            sector_size_high,
            sector_size_low,
            ..
        }
        | Csd::V2 {
            erase_single_block,
            sector_size_high,
            sector_size_low,
            ..
        } => (erase_single_block, sector_size_high, sector_size_low),
    };
    let erase_block_sectors = (((high as u32) << 1) | low as u32) + 1;

    let total = match *csd {
        Csd::V1 {
            read_bl_len,
            c_size,
            c_size_mult,
            ..
        } => {
            // Sectors are (c_size + 1) * 2^(c_size_mult + 2) blocks of
            // 2^read_bl_len bytes, expressed in 512-byte units.
            let exp = (c_size_mult as u32 + read_bl_len as u32)
                .checked_sub(7)
                .ok_or_else(|| {
                    error!(
                        "csd v1 block length {} below sector size",
                        read_bl_len
                    );
                    ErrorKind::MalformedCsd
                })?;
            (c_size as u64 + 1) << exp
        }
        Csd::V2 { c_size, .. } => (c_size as u64 + 1) * 1024,
    };

    let total_sectors = u32::try_from(total).map_err(|_| {
        error!("sector count {} exceeds addressable range", total);
        ErrorKind::CapacityOverflow
    })?;

    Ok(Capacity {
        total_sectors,
        erase_block_sectors,
        erase_single_block,
    })
}
