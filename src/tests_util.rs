
use crate::device::{Descriptor, SectorDevice};
use crate::error::ErrorKind;
use crate::registers::{fix_crc7, Ocr, RawCid, RawCsd};
use crate::transport::Transport;
use crate::SECTOR_SIZE;

pub(crate) fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn fake_cid() -> RawCid {
    let mut bytes = [0u8; 16];
    bytes[0] = 0x03;
    bytes[1..3].copy_from_slice(b"SD");
    bytes[3..8].copy_from_slice(b"SDSTR");
    bytes[8] = 0x10;
    bytes[9..13].copy_from_slice(&0xdeadbeefu32.to_be_bytes());
    // July 2021.
    bytes[13] = 0x01;
    bytes[14] = 0x57;
    fix_crc7(&mut bytes);
    RawCid(bytes)
}

pub(crate) fn csd_v1(
    c_size: u32,
    c_size_mult: u8,
    read_bl_len: u8,
    sector_size_high: u8,
    sector_size_low: u8,
    erase_single_block: bool,
) -> RawCsd {
    let mut bytes = [0u8; 16];
    bytes[5] = read_bl_len & 0x0f;
    bytes[6] = ((c_size >> 10) & 0x03) as u8;
    bytes[7] = (c_size >> 2) as u8;
    bytes[8] = ((c_size & 0x03) as u8) << 6;
    bytes[9] = (c_size_mult >> 1) & 0x03;
    bytes[10] = (c_size_mult & 0x01) << 7
        | (erase_single_block as u8) << 6
        | (sector_size_high & 0x3f);
    bytes[11] = sector_size_low << 7;
    fix_crc7(&mut bytes);
    RawCsd(bytes)
}

pub(crate) fn csd_v2(c_size: u32) -> RawCsd {
    let mut bytes = [0u8; 16];
    bytes[0] = 1 << 6;
    bytes[7] = ((c_size >> 16) & 0x3f) as u8;
    bytes[8] = (c_size >> 8) as u8;
    bytes[9] = c_size as u8;
    // High capacity cards erase single blocks.
    bytes[10] = 0x40 | 0x3f;
    bytes[11] = 0x80;
    fix_crc7(&mut bytes);
    RawCsd(bytes)
}

/// Card stand-in: sector `s` reads back filled with the byte `s & 0xff`.
/// Totals must be expressible as a CSD v1 capacity, i.e. a multiple of
/// four sectors no larger than 16384.
pub(crate) struct FakeDevice {
    total_sectors: u32,
    pub(crate) descriptor: Descriptor,
    pub(crate) descriptor_fails: bool,
    pub(crate) fail_at_lba: Option<u32>,
    pub(crate) reads: Vec<(u32, u32)>,
}

impl FakeDevice {
    pub(crate) fn with_sectors(total_sectors: u32) -> Self {
        assert!(total_sectors % 4 == 0 && total_sectors / 4 <= 4096);
        let descriptor = Descriptor {
            cid: fake_cid(),
            csd: csd_v1(total_sectors / 4 - 1, 0, 9, 0x3f, 1, true),
            ocr: Ocr(0xc0ff_8000),
        };
        FakeDevice {
            total_sectors,
            descriptor,
            descriptor_fails: false,
            fail_at_lba: None,
            reads: Vec::new(),
        }
    }
}

impl SectorDevice for FakeDevice {
    fn read_descriptor(&mut self) -> Result<Descriptor, ErrorKind> {
        if self.descriptor_fails {
            return Err(ErrorKind::DescriptorUnreadable);
        }
        Ok(self.descriptor)
    }

    fn read_sectors(&mut self, lba: u32, count: u32, data: &mut [u8]) -> Result<(), ErrorKind> {
        assert_eq!(data.len(), count as usize * SECTOR_SIZE);
        if lba + count > self.total_sectors {
            return Err(ErrorKind::OutOfBounds);
        }
        self.reads.push((lba, count));
        if let Some(bad) = self.fail_at_lba {
            if lba <= bad && bad < lba + count {
                return Err(ErrorKind::SectorReadFailed);
            }
        }
        for sector in 0..count {
            let fill = (lba + sector) as u8;
            let start = sector as usize * SECTOR_SIZE;
            data[start..start + SECTOR_SIZE].fill(fill);
        }
        Ok(())
    }
}

/// Transport that remembers everything pushed at it.
pub(crate) struct RecordingTransport {
    pub(crate) bytes: Vec<u8>,
    pub(crate) sends: usize,
    pub(crate) closed: bool,
    pub(crate) fail_after_sends: Option<usize>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        RecordingTransport {
            bytes: Vec::new(),
            sends: 0,
            closed: false,
            fail_after_sends: None,
        }
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), ErrorKind> {
        if self.closed {
            return Err(ErrorKind::TransportClosed);
        }
        if self.fail_after_sends == Some(self.sends) {
            return Err(ErrorKind::TransportWrite);
        }
        self.sends += 1;
        self.bytes.extend_from_slice(data);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ErrorKind> {
        if self.closed {
            return Err(ErrorKind::TransportClosed);
        }
        self.closed = true;
        Ok(())
    }
}
