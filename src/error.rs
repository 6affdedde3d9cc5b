/*!
 * Error Types
 *
 * Every failure surfaced by a connection falls into one of two families:
 * configuration mistakes (unknown or ill-typed options) and connection
 * failures (open, read, write, or reading without an open socket).
 */

use std::io;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied an unknown option name or an unusable value
    Configuration,
    /// The socket could not be opened, read from, or written to
    Connection,
}

/// Errors raised by [`Connection`](crate::Connection) and its options
#[derive(Debug, Error)]
pub enum Error {
    /// Option name is not one of host/port/weight/persistent/password/alias
    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    /// Option name is known but the value has the wrong shape
    #[error("Invalid value for option '{name}': {reason}")]
    InvalidOption { name: &'static str, reason: String },

    /// Transport could not establish a socket
    #[error("Can't connect to Redis server on {host}:{port}{}", describe_os_error(.source))]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Hard failure while writing a request
    #[error("Can't write to socket.")]
    Write(#[source] io::Error),

    /// Failure while reading a reply line, bulk payload, or its terminator
    #[error("Can't read from socket.")]
    Read(#[source] io::Error),

    /// A read was attempted before any connect or write
    #[error("Can't read without connection to Redis server. Do connect or write first.")]
    NotConnected,
}

impl Error {
    /// Which family this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownOption(_) | Error::InvalidOption { .. } => ErrorKind::Configuration,
            Error::Connect { .. } | Error::Write(_) | Error::Read(_) | Error::NotConnected => {
                ErrorKind::Connection
            }
        }
    }

    /// Shorthand for `kind() == ErrorKind::Configuration`
    #[inline]
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Shorthand for `kind() == ErrorKind::Connection`
    #[inline]
    pub fn is_connection(&self) -> bool {
        self.kind() == ErrorKind::Connection
    }
}

// ", error 111 Connection refused" style suffix; empty when nothing is known.
fn describe_os_error(err: &io::Error) -> String {
    let mut out = String::new();
    let code = err.raw_os_error();
    let msg = err.to_string();
    if code.is_some() || !msg.is_empty() {
        out.push(',');
        if let Some(code) = code {
            out.push_str(&format!(" error {}", code));
        }
        if !msg.is_empty() {
            out.push(' ');
            out.push_str(&msg);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_message_carries_endpoint_and_os_detail() {
        let err = Error::Connect {
            host: "10.0.0.5".into(),
            port: 6379,
            source: io::Error::from_raw_os_error(111),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Can't connect to Redis server on 10.0.0.5:6379, error 111 "));
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn connect_message_without_os_code() {
        let err = Error::Connect {
            host: "localhost".into(),
            port: 1,
            source: io::Error::new(io::ErrorKind::Other, "no route"),
        };
        assert_eq!(
            err.to_string(),
            "Can't connect to Redis server on localhost:1, no route"
        );
    }

    #[test]
    fn kinds() {
        assert!(Error::UnknownOption("db".into()).is_configuration());
        assert!(Error::InvalidOption { name: "port", reason: "x".into() }.is_configuration());
        assert!(Error::NotConnected.is_connection());
        assert!(Error::Read(io::ErrorKind::UnexpectedEof.into()).is_connection());
        assert!(Error::Write(io::ErrorKind::BrokenPipe.into()).is_connection());
    }
}
