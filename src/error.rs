//! POP3 error types.

use std::error::Error as StdError;
use std::fmt;
use std::io::Error as IoError;
#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
use std::net::TcpStream;
use std::result;

#[cfg(feature = "native-tls")]
use native_tls::{Error as TlsError, HandshakeError as TlsHandshakeError};
#[cfg(feature = "rustls-tls")]
use rustls_connector::HandshakeError as RustlsHandshakeError;

use crate::types::State;

/// A convenience wrapper around `Result` for `pop3::Error`.
pub type Result<T> = result::Result<T, Error>;

/// An error that occurred while talking to a POP3 server.
///
/// Every error names the operation that failed (the command verb, or `"connect"` /
/// `"greeting"` while the session is being established) and carries an [`ErrorKind`]
/// describing what went wrong.
#[derive(Debug)]
pub struct Error {
    operation: &'static str,
    kind: ErrorKind,
    fatal: bool,
}

/// The different ways a POP3 operation can fail.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The stream to the server could not be established.
    Connect(ConnectError),
    /// The server's greeting could not be read, was rejected, or was malformed.
    Greeting(Box<ErrorKind>),
    /// Writing a command line to the stream failed.
    Write(IoError),
    /// Reading a status line from the stream failed.
    Read(IoError),
    /// The stream ended while a status line was expected.
    ConnectionLost,
    /// Reading a multi-line block failed, or the stream ended before the terminating `.`.
    BlockRead(IoError),
    /// The server answered `-ERR`. Contains the text that followed the marker.
    Rejected(String),
    /// The server's response did not have the expected shape. Contains the offending line.
    Format(String),
    /// An argument was refused before anything was sent to the server.
    InvalidArgument(String),
    /// The command is not valid in the session's current state.
    InvalidState(State),
}

/// The reason a connection could not be established.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConnectError {
    /// Resolving or connecting the TCP socket, or configuring it, failed.
    Io(IoError),
    /// Encryption was requested but the crate was built without a TLS backend.
    TlsUnavailable,
    /// An error from the `native_tls` library while setting up TLS.
    #[cfg(feature = "native-tls")]
    Tls(TlsError),
    /// An error from the `native_tls` library during the TLS handshake.
    #[cfg(feature = "native-tls")]
    TlsHandshake(TlsHandshakeError<TcpStream>),
    /// An error from the `rustls` library during the TLS handshake.
    #[cfg(feature = "rustls-tls")]
    RustlsHandshake(RustlsHandshakeError<TcpStream>),
}

impl Error {
    pub(crate) fn new(operation: &'static str, kind: ErrorKind) -> Self {
        let fatal = kind.is_fatal();
        Error {
            operation,
            kind,
            fatal,
        }
    }

    /// Marks an error that left the stream out of step with the server, whatever its kind.
    pub(crate) fn into_fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub(crate) fn connect(err: impl Into<ConnectError>) -> Self {
        Error::new("connect", ErrorKind::Connect(err.into()))
    }

    /// Re-tags a failure that happened while reading the server greeting.
    pub(crate) fn into_greeting(self) -> Self {
        Error::new("greeting", ErrorKind::Greeting(Box::new(self.kind)))
    }

    /// The name of the operation that failed.
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// What went wrong.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Consumes the error, returning its kind.
    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// Whether this error left the session unusable.
    ///
    /// Transport failures are fatal: the stream is dropped and the client moves to
    /// [`State::Closed`]. So is a malformed status line for a command whose multi-line block
    /// may follow, since the rest of the response can no longer be told apart from the next
    /// one. Other format errors, server rejections and local validation errors leave the
    /// session as it was.
    pub fn is_fatal(&self) -> bool {
        self.fatal
    }
}

impl ErrorKind {
    pub(crate) fn is_fatal(&self) -> bool {
        matches!(
            self,
            ErrorKind::Connect(_)
                | ErrorKind::Greeting(_)
                | ErrorKind::Write(_)
                | ErrorKind::Read(_)
                | ErrorKind::ConnectionLost
                | ErrorKind::BlockRead(_)
        )
    }
}

impl From<IoError> for ConnectError {
    fn from(err: IoError) -> ConnectError {
        ConnectError::Io(err)
    }
}

#[cfg(feature = "native-tls")]
impl From<TlsError> for ConnectError {
    fn from(err: TlsError) -> ConnectError {
        ConnectError::Tls(err)
    }
}

#[cfg(feature = "native-tls")]
impl From<TlsHandshakeError<TcpStream>> for ConnectError {
    fn from(err: TlsHandshakeError<TcpStream>) -> ConnectError {
        ConnectError::TlsHandshake(err)
    }
}

#[cfg(feature = "rustls-tls")]
impl From<RustlsHandshakeError<TcpStream>> for ConnectError {
    fn from(err: RustlsHandshakeError<TcpStream>) -> ConnectError {
        ConnectError::RustlsHandshake(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorKind::Connect(ref e) => fmt::Display::fmt(e, f),
            ErrorKind::Greeting(ref e) => write!(f, "Bad greeting: {}", e),
            ErrorKind::Write(ref e) => write!(f, "Write failed: {}", e),
            ErrorKind::Read(ref e) => write!(f, "Read failed: {}", e),
            ErrorKind::ConnectionLost => f.write_str("Connection lost"),
            ErrorKind::BlockRead(ref e) => write!(f, "Multi-line read failed: {}", e),
            ErrorKind::Rejected(ref text) => write!(f, "Server response: -ERR {}", text),
            ErrorKind::Format(ref line) => write!(f, "Unexpected response: {:?}", line),
            ErrorKind::InvalidArgument(ref reason) => write!(f, "Invalid argument: {}", reason),
            ErrorKind::InvalidState(state) => write!(f, "Not allowed in {} state", state),
        }
    }
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ConnectError::Io(ref e) => fmt::Display::fmt(e, f),
            ConnectError::TlsUnavailable => f.write_str("No TLS backend enabled"),
            #[cfg(feature = "native-tls")]
            ConnectError::Tls(ref e) => fmt::Display::fmt(e, f),
            #[cfg(feature = "native-tls")]
            ConnectError::TlsHandshake(ref e) => fmt::Display::fmt(e, f),
            #[cfg(feature = "rustls-tls")]
            ConnectError::RustlsHandshake(ref e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.kind.source()
    }
}

impl StdError for ErrorKind {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            ErrorKind::Connect(ref e) => Some(e),
            ErrorKind::Greeting(ref e) => Some(&**e),
            ErrorKind::Write(ref e) | ErrorKind::Read(ref e) | ErrorKind::BlockRead(ref e) => {
                Some(e)
            }
            _ => None,
        }
    }
}

impl StdError for ConnectError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match *self {
            ConnectError::Io(ref e) => Some(e),
            #[cfg(feature = "native-tls")]
            ConnectError::Tls(ref e) => Some(e),
            #[cfg(feature = "native-tls")]
            ConnectError::TlsHandshake(ref e) => Some(e),
            #[cfg(feature = "rustls-tls")]
            ConnectError::RustlsHandshake(ref e) => Some(e),
            _ => None,
        }
    }
}
