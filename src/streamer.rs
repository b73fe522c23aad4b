
use crate::device::SectorDevice;
use crate::error::ErrorKind;
use crate::session::StorageSession;
use crate::transport::Transport;
use crate::SECTOR_SIZE;
use log::{debug, error, info, trace};

/// Staging chunk used by the high speed serial path.
pub const SERIAL_CHUNK_SECTORS: u32 = 420;

/// Staging chunk used by the network path, which favors a small buffer.
pub const NET_CHUNK_SECTORS: u32 = 1;

/// Progress of one in-flight transfer. Created when a transfer begins and
/// discarded when it ends; `sectors_sent <= total_sectors` always, and no
/// reads or writes happen after `aborted` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferState {
    sectors_sent: u32,
    total_sectors: u32,
    aborted: bool,
}

impl TransferState {
    fn new(total_sectors: u32) -> Self {
        TransferState {
            sectors_sent: 0,
            total_sectors,
            aborted: false,
        }
    }

    pub fn sectors_sent(&self) -> u32 {
        self.sectors_sent
    }

    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    /// Advisory completion fraction for a progress indicator.
    pub fn fraction(&self) -> f32 {
        if self.total_sectors == 0 {
            return 1.0;
        }
        self.sectors_sent as f32 / self.total_sectors as f32
    }
}

/// Side channel for progress display and the physical activity indicator.
/// Purely advisory; has no effect on control flow.
pub trait TransferObserver {
    fn activity(&mut self, _on: bool) {}
    fn progress(&mut self, _sent: u32, _total: u32) {}
}

impl TransferObserver for () {}

/// Payload length announced ahead of the data, checked against the 32-bit
/// header width. Counts above 8_388_607 sectors (4 GiB - 512 bytes) are
/// rejected rather than silently wrapped.
pub fn payload_len(total_sectors: u32) -> Result<u32, ErrorKind> {
    let bytes = total_sectors as u64 * SECTOR_SIZE as u64;
    u32::try_from(bytes).map_err(|_| {
        error!("payload of {} sectors overflows the length header", total_sectors);
        ErrorKind::CapacityOverflow
    })
}

/// Moves the whole card through a fixed staging buffer to a transport.
/// The buffer is allocated once and reused across transfers; there is
/// exactly one execution context, so it is never shared.
pub struct Streamer {
    chunk_sectors: u32,
    buf: Vec<u8>,
}

impl Streamer {
    pub fn new(chunk_sectors: u32) -> Self {
        assert!(chunk_sectors > 0);
        Streamer {
            chunk_sectors,
            buf: vec![0u8; chunk_sectors as usize * SECTOR_SIZE],
        }
    }

    pub fn chunk_sectors(&self) -> u32 {
        self.chunk_sectors
    }

    /// One full pass over the card: 4-byte little-endian length header,
    /// then every sector in ascending order, then transport shutdown.
    /// The first failed read or write aborts the transfer; nothing from
    /// the failed chunk reaches the wire and the length header is never
    /// revised. The receiver detects truncation by channel closure.
    pub fn run<D, T, O>(
        &mut self,
        device: &mut D,
        session: &StorageSession,
        transport: &mut T,
        observer: &mut O,
    ) -> Result<TransferState, ErrorKind>
    where
        D: SectorDevice,
        T: Transport,
        O: TransferObserver,
    {
        if !session.ready() {
            return Err(ErrorKind::DeviceNotReady);
        }
        let total = session.total_sectors();
        let header = payload_len(total)?;
        transport.send(&header.to_le_bytes())?;
        debug!("announced payload of {} bytes", header);

        let mut state = TransferState::new(total);
        while state.sectors_sent < total {
            let count = core::cmp::min(self.chunk_sectors, total - state.sectors_sent);
            let nbytes = count as usize * SECTOR_SIZE;
            observer.activity(true);
            trace!("chunk lba {} count {}", state.sectors_sent, count);
            if let Err(kind) = device.read_sectors(state.sectors_sent, count, &mut self.buf[..nbytes])
            {
                state.aborted = true;
                observer.activity(false);
                error!(
                    "sector read failed at lba {}, aborting after {} of {} sectors",
                    state.sectors_sent, state.sectors_sent, total
                );
                return Err(kind);
            }
            if let Err(kind) = transport.send(&self.buf[..nbytes]) {
                state.aborted = true;
                observer.activity(false);
                error!(
                    "transport write failed, aborting after {} of {} sectors",
                    state.sectors_sent, total
                );
                return Err(kind);
            }
            observer.activity(false);
            state.sectors_sent += count;
            observer.progress(state.sectors_sent, total);
        }

        transport.shutdown()?;
        info!("transfer complete: {} sectors", total);
        Ok(state)
    }
}
