
use crate::error::ErrorKind;
use log::{error, info};
use std::io::Write;
use std::net::{Shutdown, TcpStream};

/// Uniform write/close contract over the two transport kinds.
pub trait Transport {
    fn send(&mut self, data: &[u8]) -> Result<(), ErrorKind>;

    /// Signal end-of-stream to the receiver by closing the channel. No
    /// further sends are permitted afterwards.
    fn shutdown(&mut self) -> Result<(), ErrorKind>;
}

/// Point-to-point byte sink, a host serial port in practice. A write
/// failure means the physical link is gone and is unrecoverable.
pub struct SerialLink<W: Write> {
    sink: W,
    open: bool,
}

impl<W: Write> SerialLink<W> {
    pub fn new(sink: W) -> Self {
        SerialLink { sink, open: true }
    }
}

impl<W: Write> Transport for SerialLink<W> {
    fn send(&mut self, data: &[u8]) -> Result<(), ErrorKind> {
        if !self.open {
            return Err(ErrorKind::TransportClosed);
        }
        self.sink.write_all(data).map_err(|err| {
            error!("serial link write failed: {}", err);
            ErrorKind::TransportWrite
        })
    }

    fn shutdown(&mut self) -> Result<(), ErrorKind> {
        if !self.open {
            return Err(ErrorKind::TransportClosed);
        }
        self.open = false;
        self.sink.flush().map_err(|err| {
            error!("serial link flush failed: {}", err);
            ErrorKind::TransportWrite
        })
    }
}

/// One accepted network connection. A write failure only aborts the
/// transfer riding on this connection; the listener is unaffected.
pub struct TcpTransport {
    stream: TcpStream,
    open: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        TcpTransport { stream, open: true }
    }
}

impl Transport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), ErrorKind> {
        if !self.open {
            return Err(ErrorKind::TransportClosed);
        }
        self.stream.write_all(data).map_err(|err| {
            error!("peer write failed: {}", err);
            ErrorKind::TransportWrite
        })
    }

    fn shutdown(&mut self) -> Result<(), ErrorKind> {
        if !self.open {
            return Err(ErrorKind::TransportClosed);
        }
        self.open = false;
        info!("closing connection");
        self.stream.shutdown(Shutdown::Both).map_err(|err| {
            error!("connection shutdown failed: {}", err);
            ErrorKind::TransportWrite
        })
    }
}
