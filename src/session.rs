
use crate::capacity;
use crate::device::SectorDevice;
use crate::error::ErrorKind;
use crate::registers::{crc7_matches, Cid, Csd, Ocr};
use log::{info, warn};

/// One validated connection to the storage device. Built once at startup
/// and immutable afterwards; there is no teardown short of ending the
/// process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSession {
    ready: bool,
    total_sectors: u32,
    erase_block_sectors: u32,
    erase_single_block: bool,
    cid: Cid,
    csd_version: u8,
    ocr: Ocr,
}

impl StorageSession {
    /// Read and decode the card descriptor, resolve capacity, and log the
    /// identification fields. Any failure here is fatal to the run; no
    /// streaming may be attempted without a session.
    pub fn open<D: SectorDevice>(device: &mut D) -> Result<Self, ErrorKind> {
        let descriptor = device.read_descriptor()?;

        // Cards in SPI mode often report stale register CRCs, so a
        // mismatch is logged but does not fail the session.
        if !crc7_matches(&descriptor.cid.0) {
            warn!("cid register crc7 mismatch");
        }
        if !crc7_matches(&descriptor.csd.0) {
            warn!("csd register crc7 mismatch");
        }

        let cid = Cid::from(&descriptor.cid);
        let csd = Csd::try_from(&descriptor.csd)?;
        let cap = capacity::resolve(&csd)?;

        let session = StorageSession {
            ready: true,
            total_sectors: cap.total_sectors,
            erase_block_sectors: cap.erase_block_sectors,
            erase_single_block: cap.erase_single_block,
            cid,
            csd_version: csd.version(),
            ocr: descriptor.ocr,
        };
        session.log_details();
        Ok(session)
    }

    fn log_details(&self) {
        info!(
            "card: mid {:#04x} oem {} product {} rev {}.{} serial {:#010x} mfg {}/{}",
            self.cid.manufacturer_id,
            String::from_utf8_lossy(&self.cid.oem_id),
            String::from_utf8_lossy(&self.cid.product_name),
            self.cid.product_revision.0,
            self.cid.product_revision.1,
            self.cid.serial_number,
            self.cid.manufacturing_month,
            self.cid.manufacturing_year,
        );
        let (vmin, vmax) = self.ocr.voltage_window();
        info!(
            "ocr: powered up {} high capacity {} voltage {}.{}-{}.{}V",
            self.ocr.powered_up(),
            self.ocr.high_capacity(),
            vmin / 10,
            vmin % 10,
            vmax / 10,
            vmax % 10,
        );
        info!(
            "csd v{}: {} sectors, erase block {} sectors, single block erase {}",
            self.csd_version,
            self.total_sectors,
            self.erase_block_sectors,
            self.erase_single_block,
        );
    }

    pub fn ready(&self) -> bool {
        self.ready
    }

    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    pub fn erase_block_sectors(&self) -> u32 {
        self.erase_block_sectors
    }

    pub fn erase_single_block(&self) -> bool {
        self.erase_single_block
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn csd_version(&self) -> u8 {
        self.csd_version
    }

    pub fn ocr(&self) -> Ocr {
        self.ocr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_util::*;

    #[test]
    fn test_open_resolves_capacity() {
        init();
        let mut device = FakeDevice::with_sectors(1000);
        let session = StorageSession::open(&mut device).unwrap();
        assert!(session.ready());
        assert_eq!(session.total_sectors(), 1000);
        assert_eq!(session.csd_version(), 1);
    }

    #[test]
    fn test_open_fails_on_unreadable_descriptor() {
        init();
        let mut device = FakeDevice::with_sectors(8);
        device.descriptor_fails = true;
        assert_eq!(
            StorageSession::open(&mut device),
            Err(ErrorKind::DescriptorUnreadable)
        );
    }

    #[test]
    fn test_open_fails_on_unknown_csd_version() {
        init();
        let mut device = FakeDevice::with_sectors(8);
        device.descriptor.csd.0[0] = 2 << 6;
        assert_eq!(
            StorageSession::open(&mut device),
            Err(ErrorKind::UnknownCsdVersion)
        );
    }
}
