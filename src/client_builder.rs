use crate::conn::Connection;
use crate::error::{ConnectError, Error, Result};
use crate::Client;
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::result;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "native-tls")]
use native_tls::{TlsConnector, TlsStream};
#[cfg(feature = "rustls-tls")]
use rustls_connector::{RustlsConnector, TlsStream as RustlsStream};

/// The conventional port for POP3 over plain TCP.
pub const POP3_PORT: u16 = 110;
/// The conventional port for POP3 over implicit TLS.
pub const POP3S_PORT: u16 = 995;

/// A convenience builder for [`Client`] structs over plain or encrypted transports.
///
/// Connecting is a matter of naming the server and deciding whether to encrypt:
/// ```no_run
/// # use pop3::ClientBuilder;
/// # fn main() -> Result<(), pop3::Error> {
/// let mut client = ClientBuilder::new("pop.example.com", 995).tls(true).connect()?;
/// client.login("username", "password")?;
/// # Ok(())
/// # }
/// ```
///
/// [`connect`](Self::connect) picks the TLS backend from the enabled cargo features,
/// preferring `native-tls`. The backend-specific [`native_tls`](Self::native_tls) and
/// [`rustls`](Self::rustls) methods return a client over the concrete stream type instead.
#[derive(Clone, Debug)]
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    tls: bool,
    timeout: Option<Duration>,
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            tls: false,
            timeout: None,
        }
    }

    /// Whether [`connect`](Self::connect) wraps the connection in TLS. Defaults to `false`.
    pub fn tls(&mut self, enabled: bool) -> &mut Self {
        self.tls = enabled;
        self
    }

    /// Limit how long connecting, and each subsequent read or write, may block.
    ///
    /// A zero duration is refused by the socket and makes connecting fail.
    pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    /// Return a new [`Client`], encrypted if [`tls`](Self::tls) was set.
    pub fn connect(&self) -> Result<Client<Connection>> {
        if self.tls {
            self.connect_with(tls_handshake)
        } else {
            self.connect_with(|_, tcp| Ok(Box::new(tcp) as Connection))
        }
    }

    /// Return a new [`Client`] using a `native-tls` transport.
    #[cfg(feature = "native-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
    pub fn native_tls(&self) -> Result<Client<TlsStream<TcpStream>>> {
        self.connect_with(|domain, tcp| {
            let ssl_conn = TlsConnector::new()?;
            Ok(TlsConnector::connect(&ssl_conn, domain, tcp)?)
        })
    }

    /// Return a new [`Client`] using `rustls` transport.
    #[cfg(feature = "rustls-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rustls-tls")))]
    pub fn rustls(&self) -> Result<Client<RustlsStream<TcpStream>>> {
        self.connect_with(|domain, tcp| {
            let ssl_conn = RustlsConnector::new_with_native_certs()?;
            Ok(ssl_conn.connect(domain, tcp)?)
        })
    }

    /// Make a [`Client`] using a custom TLS initialization. This function is intended
    /// to be used if your TLS setup requires custom work such as adding private CAs
    /// or other specific TLS parameters.
    ///
    /// The `handshake` argument receives the domain and the connected [`TcpStream`], and
    /// yields the stream the client should use. The greeting is read from that stream.
    ///
    /// ```no_run
    /// # use pop3::ClientBuilder;
    /// # use native_tls::TlsConnector;
    /// # fn main() -> Result<(), pop3::Error> {
    /// let client = ClientBuilder::new("pop.example.com", 995)
    ///     .connect_with(|domain, tcp| {
    ///         let ssl_conn = TlsConnector::builder()
    ///             .min_protocol_version(Some(native_tls::Protocol::Tlsv12))
    ///             .build()?;
    ///         Ok(ssl_conn.connect(domain, tcp)?)
    ///     })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect_with<F, C>(&self, handshake: F) -> Result<Client<C>>
    where
        F: FnOnce(&str, TcpStream) -> result::Result<C, ConnectError>,
        C: Read + Write,
    {
        let tcp = self.dial().map_err(Error::connect)?;
        let stream = handshake(self.domain.as_ref(), tcp).map_err(Error::connect)?;
        Client::with_greeting(stream)
    }

    fn dial(&self) -> io::Result<TcpStream> {
        let addr = (self.domain.as_ref(), self.port);
        let tcp = match self.timeout {
            Some(timeout) => connect_all_timeout(addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        tcp.set_read_timeout(self.timeout)?;
        tcp.set_write_timeout(self.timeout)?;
        debug!(
            domain = self.domain.as_ref(),
            port = self.port,
            tls = self.tls,
            "POP3 connection established"
        );
        Ok(tcp)
    }
}

/// Resolve the address and try each candidate in order, returning the last failure.
fn connect_all_timeout<A: ToSocketAddrs>(addr: A, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addr.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(tcp) => return Ok(tcp),
            Err(e) => {
                debug!(%addr, error = %e, "couldn't connect");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "could not resolve to any address",
        )
    }))
}

#[cfg(feature = "native-tls")]
fn tls_handshake(domain: &str, tcp: TcpStream) -> result::Result<Connection, ConnectError> {
    let ssl_conn = TlsConnector::new()?;
    Ok(Box::new(TlsConnector::connect(&ssl_conn, domain, tcp)?))
}

#[cfg(all(feature = "rustls-tls", not(feature = "native-tls")))]
fn tls_handshake(domain: &str, tcp: TcpStream) -> result::Result<Connection, ConnectError> {
    let ssl_conn = RustlsConnector::new_with_native_certs()?;
    Ok(Box::new(ssl_conn.connect(domain, tcp)?))
}

#[cfg(not(any(feature = "native-tls", feature = "rustls-tls")))]
fn tls_handshake(_domain: &str, _tcp: TcpStream) -> result::Result<Connection, ConnectError> {
    Err(ConnectError::TlsUnavailable)
}
