/*!
 * Connection
 *
 * One logical connection to a Redis-compatible server. The socket is opened
 * lazily, authenticated once per open, written to in CRLF-terminated lines,
 * and read either a line at a time or as a bulk payload of known length.
 *
 * Any I/O failure releases the socket before the error reaches the caller,
 * so a connection is never left holding a half-broken stream; the next
 * `connect` or `write` starts from scratch.
 */

use crate::error::{Error, Result};
use crate::options::{OptionValue, Options};
use crate::transport::{Endpoint, TcpTransport, Transport};
use bytes::{Buf, Bytes, BytesMut};
use log::{debug, trace, warn};
use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};

/// Line terminator appended to every request
pub const EOL: &str = "\r\n";

/// Sent best-effort before a socket is closed
const QUIT: &[u8] = b"QUIT\r\n";

/// Length of the terminator trailing a bulk payload
const BULK_TERMINATOR_LEN: usize = 2;

/// Most a bulk read grows its buffer by before the bytes have arrived
const READ_CHUNK: usize = 64 * 1024;

/// An open stream together with the endpoint it was opened for
struct OpenSocket<S> {
    // Buffered for line reads; writes go straight to the inner stream.
    reader: BufReader<S>,
    endpoint: Endpoint,
}

/// A single connection to a Redis-compatible server
///
/// Not safe for concurrent use; every I/O method takes `&mut self` and
/// blocks until the transport completes or fails. Dropping the connection
/// does what [`disconnect`](Connection::disconnect) does: `QUIT` is sent
/// best-effort and the socket is closed, persistent or not.
pub struct Connection<T: Transport = TcpTransport> {
    options: Options,
    transport: T,
    socket: Option<OpenSocket<T::Stream>>,
}

impl Connection<TcpTransport> {
    /// Connection over TCP with the given options; nothing is opened yet
    pub fn new(options: Options) -> Self {
        Self::with_transport(options, TcpTransport::new())
    }

    /// Connection over TCP configured from key/value pairs
    ///
    /// Keys are case-insensitive; unknown keys and ill-typed values fail
    /// with a configuration error.
    ///
    /// ```no_run
    /// use rediska::Connection;
    ///
    /// let mut conn = Connection::from_options([("host", "10.0.0.5"), ("alias", "cache1")])?;
    /// conn.write("PING")?;
    /// assert_eq!(conn.read_line()?, "+PONG");
    /// # Ok::<(), rediska::Error>(())
    /// ```
    pub fn from_options<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<OptionValue>,
    {
        Ok(Self::new(Options::from_pairs(pairs)?))
    }
}

impl Default for Connection<TcpTransport> {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl<T: Transport> Connection<T> {
    /// Connection using a caller-supplied transport
    pub fn with_transport(options: Options, transport: T) -> Self {
        Self {
            options,
            transport,
            socket: None,
        }
    }

    /// Open the socket unless one is already open
    ///
    /// Returns `Ok(true)` when a new socket was opened and `Ok(false)` when
    /// one was already live. With a non-empty password an `AUTH` line is
    /// sent and exactly one reply line is consumed; the reply itself is not
    /// inspected, so a rejected password surfaces on later commands.
    pub fn connect(&mut self) -> Result<bool> {
        if self.socket.is_some() {
            return Ok(false);
        }

        let endpoint = Endpoint::from_options(&self.options);
        let stream = self.transport.open(&endpoint).map_err(|source| {
            warn!("can't connect to {}: {}", endpoint, source);
            Error::Connect {
                host: endpoint.host.clone(),
                port: endpoint.port,
                source,
            }
        })?;

        debug!("connected to {}", self);
        self.socket = Some(OpenSocket {
            reader: BufReader::new(stream),
            endpoint,
        });

        if let Some(password) = self.options.auth_password().map(str::to_string) {
            self.write(format!("AUTH {}", password))?;
            self.read_line()?;
            trace!("{}: AUTH reply consumed", self);
        }

        Ok(true)
    }

    /// Send `payload` followed by [`EOL`], connecting first if needed
    ///
    /// An empty payload sends nothing and returns `Ok(false)`. A transport
    /// that reports a zero-length write is taken to have finished.
    pub fn write(&mut self, payload: impl AsRef<[u8]>) -> Result<bool> {
        let payload = payload.as_ref();
        if payload.is_empty() {
            return Ok(false);
        }

        let mut frame = BytesMut::with_capacity(payload.len() + EOL.len());
        frame.extend_from_slice(payload);
        frame.extend_from_slice(EOL.as_bytes());

        self.connect()?;

        let socket = self.socket.as_mut().ok_or(Error::NotConnected)?;
        match write_frame(socket.reader.get_mut(), frame) {
            Ok(written) => {
                trace!("{}: wrote {} bytes", self, written);
                Ok(true)
            }
            Err(e) => {
                warn!("{}: write failed: {}", self, e);
                self.disconnect();
                Err(Error::Write(e))
            }
        }
    }

    /// Read one line, trimmed of surrounding whitespace and terminators
    ///
    /// Requires an open socket; this does not connect on its own.
    pub fn read_line(&mut self) -> Result<String> {
        let socket = self.socket.as_mut().ok_or(Error::NotConnected)?;

        let mut line = Vec::new();
        match socket.reader.read_until(b'\n', &mut line) {
            Ok(0) => self.fail_read(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )),
            Ok(n) => {
                trace!("{}: read line of {} bytes", self, n);
                Ok(trim_line(&line))
            }
            Err(e) => self.fail_read(e),
        }
    }

    /// Read a bulk payload of exactly `length` bytes
    ///
    /// The two terminator bytes that follow the payload on the wire are
    /// consumed and discarded. Requires an open socket.
    pub fn read(&mut self, length: usize) -> Result<Bytes> {
        let socket = self.socket.as_mut().ok_or(Error::NotConnected)?;

        let result = read_payload(&mut socket.reader, length).and_then(|payload| {
            discard_terminator(&mut socket.reader)?;
            Ok(payload)
        });

        match result {
            Ok(payload) => {
                trace!("{}: read bulk payload of {} bytes", self, length);
                Ok(payload.freeze())
            }
            Err(e) => self.fail_read(e),
        }
    }

    /// Send `QUIT` and close the socket
    ///
    /// Returns `false` when there was nothing to close. Failures while
    /// quitting or closing are ignored; the socket is released either way.
    pub fn disconnect(&mut self) -> bool {
        let socket = match self.socket.take() {
            Some(socket) => socket,
            None => return false,
        };

        let OpenSocket { reader, endpoint } = socket;
        shutdown(&self.transport, &endpoint, reader.into_inner());
        debug!("disconnected from {}", self);
        true
    }

    /// Whether a socket is currently open
    pub fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    fn fail_read<R>(&mut self, err: io::Error) -> Result<R> {
        warn!("{}: read failed: {}", self, err);
        self.disconnect();
        Err(Error::Read(err))
    }

    // Configuration

    /// Set an option by (case-insensitive) name
    pub fn set_option(&mut self, name: &str, value: impl Into<OptionValue>) -> Result<()> {
        self.options.set(name, value)
    }

    /// Read an option by (case-insensitive) name
    pub fn option(&self, name: &str) -> Result<OptionValue> {
        self.options.get(name)
    }

    /// Current configuration
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Transport sockets are opened through
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Host name or address to connect to
    pub fn host(&self) -> &str {
        &self.options.host
    }

    /// TCP port to connect to
    pub fn port(&self) -> u16 {
        self.options.port
    }

    /// Relative weight, stored for callers that balance across servers
    pub fn weight(&self) -> u32 {
        self.options.weight
    }

    /// Password sent with `AUTH` on connect, if any
    pub fn password(&self) -> Option<&str> {
        self.options.password.as_deref()
    }

    /// Display name used instead of `host:port`
    pub fn alias(&self) -> Option<&str> {
        self.options.alias.as_deref()
    }

    /// Whether sockets are opened with TCP keepalive
    pub fn is_persistent(&self) -> bool {
        self.options.persistent
    }

    /// Change the host; takes effect on the next connect
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.options.host = host.into();
    }

    /// Change the port; takes effect on the next connect
    pub fn set_port(&mut self, port: u16) {
        self.options.port = port;
    }

    /// Change the relative weight
    pub fn set_weight(&mut self, weight: u32) {
        self.options.weight = weight;
    }

    /// Toggle TCP keepalive for sockets opened from now on
    pub fn set_persistent(&mut self, persistent: bool) {
        self.options.persistent = persistent;
    }

    /// Set or clear the `AUTH` password; `None` or an empty string skips `AUTH`
    pub fn set_password(&mut self, password: Option<String>) {
        self.options.password = password;
    }

    /// Set or clear the display alias
    pub fn set_alias(&mut self, alias: Option<String>) {
        self.options.alias = alias;
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        if let Some(OpenSocket { reader, endpoint }) = self.socket.take() {
            shutdown(&self.transport, &endpoint, reader.into_inner());
        }
    }
}

/// Alias when set, otherwise `host:port`
impl<T: Transport> fmt::Display for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.options.identity())
    }
}

impl<T: Transport> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &Endpoint::from_options(&self.options))
            .field("weight", &self.options.weight)
            .field("alias", &self.options.alias)
            .field("connected", &self.socket.is_some())
            .finish()
    }
}

/// Best-effort `QUIT`, then close through the transport
fn shutdown<T: Transport>(transport: &T, endpoint: &Endpoint, mut stream: T::Stream) {
    if let Err(e) = write_frame(&mut stream, Bytes::from_static(QUIT)) {
        debug!("QUIT to {} not delivered: {}", endpoint, e);
    }
    if let Err(e) = transport.close(endpoint, stream) {
        debug!("closing stream to {} failed: {}", endpoint, e);
    }
}

/// Write `frame` until it is drained or the stream reports no progress
///
/// Returns the number of bytes the stream accepted.
fn write_frame<W: Write, B: Buf>(stream: &mut W, mut frame: B) -> io::Result<usize> {
    let mut written = 0;
    while frame.has_remaining() {
        match stream.write(frame.chunk()) {
            // Zero progress without an error is the transport saying it is done.
            Ok(0) => break,
            Ok(n) => {
                frame.advance(n);
                written += n;
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    stream.flush()?;
    Ok(written)
}

/// Read exactly `length` bytes, accepting however many each read returns
///
/// The buffer grows by at most `READ_CHUNK` per pass, so a bogus length from
/// the wire costs a failed read rather than an up-front allocation.
fn read_payload<R: Read>(reader: &mut R, length: usize) -> io::Result<BytesMut> {
    let mut payload = BytesMut::with_capacity(length.min(READ_CHUNK));
    while payload.len() < length {
        let filled = payload.len();
        payload.resize(filled + (length - filled).min(READ_CHUNK), 0);
        match reader.read(&mut payload[filled..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("connection closed with {} payload bytes outstanding", length - filled),
                ))
            }
            Ok(n) => payload.truncate(filled + n),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => payload.truncate(filled),
            Err(e) => return Err(e),
        }
    }
    Ok(payload)
}

fn discard_terminator<R: Read>(reader: &mut R) -> io::Result<()> {
    let mut terminator = [0u8; BULK_TERMINATOR_LEN];
    reader.read_exact(&mut terminator)
}

/// Lossy UTF-8 with spaces, tabs, CR, LF, NUL and vertical tabs trimmed
fn trim_line(line: &[u8]) -> String {
    String::from_utf8_lossy(line)
        .trim_matches(|c| matches!(c, ' ' | '\t' | '\n' | '\r' | '\0' | '\x0B'))
        .to_string()
}
