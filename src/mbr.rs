
use crate::device::SectorDevice;
use crate::error::ErrorKind;
use crate::SECTOR_SIZE;
use log::{error, info, warn};
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

const MBR_SIGNATURE: [u8; 2] = [0x55, 0xaa];

#[derive(Debug, AsBytes, FromBytes, Clone, Copy)]
#[repr(C)]
pub(crate) struct PartitionEntry {
    boot_flag: u8,
    chs_start: [u8; 3],
    part_type: u8,
    chs_end: [u8; 3],
    lba_start: [u8; 4],
    num_sectors: [u8; 4],
}

impl PartitionEntry {
    fn is_empty(&self) -> bool {
        self.part_type == 0
    }

    fn bootable(&self) -> bool {
        self.boot_flag & 0x80 != 0
    }

    fn lba_start(&self) -> u32 {
        u32::from_le_bytes(self.lba_start)
    }

    fn num_sectors(&self) -> u32 {
        u32::from_le_bytes(self.num_sectors)
    }
}

#[derive(AsBytes, FromBytes)]
#[repr(C)]
struct MbrSector {
    bootstrap: [u8; 446],
    partitions: [PartitionEntry; 4],
    signature: [u8; 2],
}

impl TryFrom<&[u8]> for MbrSector {
    type Error = ErrorKind;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let sector: Option<LayoutVerified<_, MbrSector>> = LayoutVerified::new(bytes);
        if let Some(sector) = sector {
            return Ok(MbrSector {
                bootstrap: sector.bootstrap,
                partitions: sector.partitions,
                signature: sector.signature,
            });
        }

        error!("Failure to create mbr from sector bytes.");
        return Err(ErrorKind::OutOfBounds);
    }
}

/// Read sector 0 and log the primary partition table. Informational only;
/// a card with no partition signature is still streamable and just logs a
/// warning. The transfer itself never interprets these bytes.
pub fn log_partition_table<D: SectorDevice>(device: &mut D) -> Result<(), ErrorKind> {
    let mut bytes = [0u8; SECTOR_SIZE];
    device.read_sectors(0, 1, &mut bytes)?;
    let mbr = MbrSector::try_from(&bytes[..])?;

    if mbr.signature != MBR_SIGNATURE {
        warn!("no mbr signature; card may be unpartitioned or corrupt");
        return Ok(());
    }
    for (index, entry) in mbr.partitions.iter().enumerate() {
        if entry.is_empty() {
            continue;
        }
        info!(
            "partition {}: type {:#04x} boot {} start lba {} sectors {}",
            index + 1,
            entry.part_type,
            entry.bootable(),
            entry.lba_start(),
            entry.num_sectors(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_util::*;

    #[test]
    fn test_mbr_sector_layout() {
        assert_eq!(core::mem::size_of::<MbrSector>(), SECTOR_SIZE);
        assert_eq!(core::mem::size_of::<PartitionEntry>(), 16);
    }

    #[test]
    fn test_partition_entry_fields() {
        let mut bytes = [0u8; SECTOR_SIZE];
        bytes[510] = 0x55;
        bytes[511] = 0xaa;
        // Entry 1: bootable FAT32 starting at lba 2048.
        bytes[446] = 0x80;
        bytes[446 + 4] = 0x0c;
        bytes[446 + 8..446 + 12].copy_from_slice(&2048u32.to_le_bytes());
        bytes[446 + 12..446 + 16].copy_from_slice(&100_000u32.to_le_bytes());

        let mbr = MbrSector::try_from(&bytes[..]).unwrap();
        assert_eq!(mbr.signature, MBR_SIGNATURE);
        let entry = &mbr.partitions[0];
        assert!(entry.bootable());
        assert!(!entry.is_empty());
        assert_eq!(entry.lba_start(), 2048);
        assert_eq!(entry.num_sectors(), 100_000);
        assert!(mbr.partitions[1].is_empty());
    }

    #[test]
    fn test_log_partition_table_tolerates_missing_signature() {
        init();
        // FakeDevice sector 0 carries a constant fill, not a valid mbr.
        let mut device = FakeDevice::with_sectors(8);
        assert_eq!(log_partition_table(&mut device), Ok(()));
    }
}
