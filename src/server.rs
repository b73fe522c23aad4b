
use crate::device::SectorDevice;
use crate::error::ErrorKind;
use crate::session::StorageSession;
use crate::streamer::{Streamer, TransferObserver, TransferState};
use crate::transport::TcpTransport;
use log::{error, info, warn};
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};

/// Network front end: idle until a client connects, streams the whole
/// card to it, closes the connection, and goes back to idle. One client
/// at a time; a second connection attempt waits in the listen backlog.
pub struct NetServer {
    listener: TcpListener,
}

impl NetServer {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, ErrorKind> {
        let listener = TcpListener::bind(addr).map_err(|err| {
            error!("listen failed: {}", err);
            ErrorKind::ListenFailed
        })?;
        Ok(NetServer { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ErrorKind> {
        self.listener.local_addr().map_err(|err| {
            error!("listener address unavailable: {}", err);
            ErrorKind::ListenFailed
        })
    }

    /// Block until one client connects, then run one full transfer from
    /// sector 0. No state carries over between connections.
    pub fn serve_one<D, O>(
        &mut self,
        device: &mut D,
        session: &StorageSession,
        streamer: &mut Streamer,
        observer: &mut O,
    ) -> Result<TransferState, ErrorKind>
    where
        D: SectorDevice,
        O: TransferObserver,
    {
        let (stream, peer) = self.listener.accept().map_err(|err| {
            error!("accept failed: {}", err);
            ErrorKind::AcceptFailed
        })?;
        info!("client connected: {}", peer);
        let mut transport = TcpTransport::new(stream);
        streamer.run(device, session, &mut transport, observer)
    }

    /// Accept loop. An aborted transfer only loses that connection; the
    /// listener keeps accepting.
    pub fn run<D, O>(
        &mut self,
        device: &mut D,
        session: &StorageSession,
        streamer: &mut Streamer,
        observer: &mut O,
    ) -> !
    where
        D: SectorDevice,
        O: TransferObserver,
    {
        loop {
            match self.serve_one(device, session, streamer, observer) {
                Ok(state) => info!("served {} sectors", state.sectors_sent()),
                Err(kind) => warn!("transfer aborted: {:?}, back to idle", kind),
            }
        }
    }
}
