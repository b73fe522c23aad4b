//! Host-side stand-in for the card dumper firmware: serves the sectors of
//! a whole-card image (or block device) over a serial-style byte sink or
//! a TCP listener, with the same length-header framing. Capacity is
//! advertised at the CSD granularity of 1024 sectors; the tail past the
//! image end reads back as zeros.

use log::{error, info, trace, warn, LevelFilter};
use sdstream::registers::fix_crc7;
use sdstream::{
    mbr, DeviceConfig, Descriptor, ErrorKind, NetServer, Ocr, RawCid, RawCsd, SectorDevice,
    SerialLink, StorageSession, Streamer, TransferObserver, NET_CHUNK_SECTORS, SECTOR_SIZE,
    SERIAL_CHUNK_SECTORS,
};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(
    name = "dump",
    about = "Stream raw card sectors, length-header framed, over serial or TCP"
)]
struct Opt {
    /// Whole-card image or block device to serve sectors from.
    image: PathBuf,

    /// Listen on this address and serve one client per connection.
    #[structopt(long, conflicts_with = "port")]
    listen: Option<String>,

    /// Serial port (or any writable path) to stream to; stdout if omitted.
    #[structopt(long)]
    port: Option<PathBuf>,

    /// Sectors staged per read; defaults to 420 for serial, 1 for TCP.
    #[structopt(long)]
    chunk_sectors: Option<u32>,

    /// Raise verbosity (-v debug, -vv trace).
    #[structopt(short, parse(from_occurrences))]
    verbose: u8,
}

/// Emulated card backed by an image file. Sector reads past the end of
/// the image but inside the advertised capacity return zeros.
struct FileDevice {
    file: File,
    image_len: u64,
}

impl FileDevice {
    fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let image_len = file.metadata()?.len();
        if image_len == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "image is empty",
            ));
        }
        Ok(FileDevice { file, image_len })
    }

    fn advertised_sectors(&self) -> u64 {
        let sectors = (self.image_len + SECTOR_SIZE as u64 - 1) / SECTOR_SIZE as u64;
        // CSD v2 capacities come in 1024-sector steps.
        (sectors + 1023) / 1024 * 1024
    }
}

impl SectorDevice for FileDevice {
    fn read_descriptor(&mut self) -> Result<Descriptor, ErrorKind> {
        let c_size = self.advertised_sectors() / 1024 - 1;
        if c_size > 0x3f_ffff {
            error!("image too large to describe as a card");
            return Err(ErrorKind::CapacityOverflow);
        }

        let mut cid = [0u8; 16];
        cid[1..3].copy_from_slice(b"IM");
        cid[3..8].copy_from_slice(b"IMAGE");
        fix_crc7(&mut cid);

        let mut csd = [0u8; 16];
        csd[0] = 1 << 6;
        csd[7] = ((c_size >> 16) & 0x3f) as u8;
        csd[8] = (c_size >> 8) as u8;
        csd[9] = c_size as u8;
        csd[10] = 0x7f;
        csd[11] = 0x80;
        fix_crc7(&mut csd);

        Ok(Descriptor {
            cid: RawCid(cid),
            csd: RawCsd(csd),
            ocr: Ocr(0xc0ff_8000),
        })
    }

    fn read_sectors(&mut self, lba: u32, count: u32, data: &mut [u8]) -> Result<(), ErrorKind> {
        if lba as u64 + count as u64 > self.advertised_sectors() {
            return Err(ErrorKind::OutOfBounds);
        }
        data.fill(0);
        let offset = lba as u64 * SECTOR_SIZE as u64;
        if offset >= self.image_len {
            return Ok(());
        }
        let avail = core::cmp::min(data.len() as u64, self.image_len - offset) as usize;
        self.file.seek(SeekFrom::Start(offset)).map_err(|err| {
            error!("seek to lba {} failed: {}", lba, err);
            ErrorKind::SectorReadFailed
        })?;
        self.file.read_exact(&mut data[..avail]).map_err(|err| {
            error!("read at lba {} failed: {}", lba, err);
            ErrorKind::SectorReadFailed
        })
    }
}

/// Logs coarse progress and traces the activity indicator toggles.
#[derive(Default)]
struct ProgressMeter {
    last_decile: u32,
}

impl TransferObserver for ProgressMeter {
    fn activity(&mut self, on: bool) {
        trace!("activity indicator {}", if on { "on" } else { "off" });
    }

    fn progress(&mut self, sent: u32, total: u32) {
        let decile = (sent as u64 * 10 / total.max(1) as u64) as u32;
        if decile != self.last_decile {
            self.last_decile = decile;
            info!("transfer {}% ({} of {} sectors)", decile * 10, sent, total);
        }
        if sent == total {
            self.last_decile = 0;
        }
    }
}

fn main() {
    let opt = Opt::from_args();
    env_logger::builder()
        .format_timestamp_nanos()
        .filter_level(match opt.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        })
        .init();

    let config = DeviceConfig::default();
    config.announce();

    let mut device = match FileDevice::open(&opt.image) {
        Ok(device) => device,
        Err(err) => {
            error!("cannot open {}: {}", opt.image.display(), err);
            std::process::exit(1);
        }
    };
    let session = match StorageSession::open(&mut device) {
        Ok(session) => session,
        Err(kind) => {
            error!("card validation failed: {:?}", kind);
            std::process::exit(1);
        }
    };
    if let Err(kind) = mbr::log_partition_table(&mut device) {
        warn!("partition table unreadable: {:?}", kind);
    }

    let chunk_sectors = opt.chunk_sectors.unwrap_or(if opt.listen.is_some() {
        NET_CHUNK_SECTORS
    } else {
        SERIAL_CHUNK_SECTORS
    });
    let mut streamer = Streamer::new(chunk_sectors);
    let mut meter = ProgressMeter::default();

    if let Some(addr) = &opt.listen {
        let mut server = match NetServer::bind(addr) {
            Ok(server) => server,
            Err(kind) => {
                error!("cannot listen on {}: {:?}", addr, kind);
                std::process::exit(1);
            }
        };
        info!("listening on {}", addr);
        server.run(&mut device, &session, &mut streamer, &mut meter)
    } else {
        let sink: Box<dyn Write> = match &opt.port {
            Some(path) => match OpenOptions::new().write(true).open(path) {
                Ok(file) => Box::new(file),
                Err(err) => {
                    error!("cannot open {}: {}", path.display(), err);
                    std::process::exit(1);
                }
            },
            None => Box::new(std::io::stdout()),
        };
        let mut link = SerialLink::new(sink);
        match streamer.run(&mut device, &session, &mut link, &mut meter) {
            Ok(state) => info!("dumped {} sectors", state.sectors_sent()),
            Err(kind) => {
                error!("transfer aborted: {:?}", kind);
                std::process::exit(1);
            }
        }
    }
}
