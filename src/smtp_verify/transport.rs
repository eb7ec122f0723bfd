use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A byte stream carrying one SMTP dialog.
pub trait Transport: Read + Write {
    /// Bound the next blocking read. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Close both directions of the stream.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Opens a fresh [`Transport`] for every probe. Connections are never reused.
pub trait Connector {
    type Stream: Transport;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Self::Stream>;
}

impl<C: Connector + ?Sized> Connector for &C {
    type Stream = C::Stream;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<Self::Stream> {
        (**self).connect(host, port, timeout)
    }
}

/// Plain TCP. Each resolved socket address is tried in turn until one
/// accepts within `timeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("{host} has no socket address"),
            )
        }))
    }
}
