/*!
 * Transport Layer
 *
 * The connection never touches sockets directly. It asks a `Transport` to
 * open a byte stream for an endpoint, and hands the stream back to be
 * closed when it is done with it. `TcpTransport` is the production
 * implementation; tests plug in scripted streams.
 */

use crate::options::Options;
use log::debug;
use socket2::{Domain, Protocol, Socket, Type};
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

/// Destination of a connection as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// Ask for a long-lived socket (TCP keepalive on `TcpTransport`)
    pub persistent: bool,
}

impl Endpoint {
    pub fn from_options(options: &Options) -> Self {
        Self {
            host: options.host.clone(),
            port: options.port,
            persistent: options.persistent,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Source of byte streams for a [`Connection`](crate::Connection)
///
/// Implementations report partial progress the way `Read`/`Write` do; the
/// connection loops over short reads and writes itself.
pub trait Transport {
    type Stream: Read + Write;

    /// Open a stream to `endpoint`
    fn open(&self, endpoint: &Endpoint) -> io::Result<Self::Stream>;

    /// Close a stream the connection is finished with
    fn close(&self, _endpoint: &Endpoint, stream: Self::Stream) -> io::Result<()> {
        drop(stream);
        Ok(())
    }
}

/// Blocking TCP transport backed by `std::net::TcpStream`
///
/// Sockets are created through socket2 so options can be set before the
/// stream is handed out. No read or write timeouts are configured: a stalled
/// peer blocks the caller, which is the platform default.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        TcpTransport
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    fn open(&self, endpoint: &Endpoint) -> io::Result<TcpStream> {
        connect_tcp(endpoint)
    }

    fn close(&self, _endpoint: &Endpoint, stream: TcpStream) -> io::Result<()> {
        match stream.shutdown(Shutdown::Both) {
            Err(ref e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

/// Resolve `endpoint` and connect to the first address that accepts
fn connect_tcp(endpoint: &Endpoint) -> io::Result<TcpStream> {
    let mut last_err = None;

    for addr in (endpoint.host.as_str(), endpoint.port).to_socket_addrs()? {
        match connect_addr(addr, endpoint.persistent) {
            Ok(stream) => {
                debug!("opened stream to {} ({})", endpoint, addr);
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "could not resolve to any address",
        )
    }))
}

fn connect_addr(addr: SocketAddr, keepalive: bool) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.connect(&addr.into())?;

    // Requests are single short lines; don't let Nagle hold them back.
    socket.set_nodelay(true)?;
    // Persistent sockets sit idle between commands; let the kernel probe them.
    if keepalive {
        socket.set_keepalive(true)?;
    }

    Ok(socket.into())
}
