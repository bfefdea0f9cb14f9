//! Bidirectional byte streams with timeouts and TLS transparency.
//!
//! The rest of the stack talks to a [`ByteStream`] trait object, so tests
//! can substitute scripted in-memory streams for real sockets. Real
//! streams are produced by a [`Dialer`], which also enforces the minimum
//! spacing between socket creations.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use native_tls::{Certificate, TlsConnector};
use tracing::debug;

use sockeye_core::constants::CONNECT_THROTTLE_MS;
use sockeye_core::error::{SioError, SioResult};
use sockeye_core::options::TlsContext;

/// A bidirectional byte stream with a configurable read timeout.
///
/// Reads that hit the timeout must surface `ErrorKind::WouldBlock` or
/// `ErrorKind::TimedOut`; callers translate those into the recoverable
/// [`SioError::Timeout`].
pub trait ByteStream: Read + Write + Send {
    /// Set the read timeout for subsequent reads. `None` blocks forever.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

/// A TCP stream, optionally wrapped in TLS.
pub enum NetStream {
    /// Plain TCP.
    Plain(TcpStream),
    /// TLS over TCP via native-tls.
    Tls(Box<native_tls::TlsStream<TcpStream>>),
}

impl NetStream {
    fn tcp(&self) -> &TcpStream {
        match self {
            NetStream::Plain(s) => s,
            NetStream::Tls(s) => s.get_ref(),
        }
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            NetStream::Plain(s) => s.read(buf),
            NetStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            NetStream::Plain(s) => s.write(buf),
            NetStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            NetStream::Plain(s) => s.flush(),
            NetStream::Tls(s) => s.flush(),
        }
    }
}

impl ByteStream for NetStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.tcp().set_read_timeout(timeout)
    }
}

/// Creates byte streams on demand.
///
/// One dialer is owned by one engine; a fresh stream replaces the old one
/// at the handshake-to-upgrade transition.
pub trait Dialer: Send {
    /// Open a stream to `host:port`, TLS-wrapped when `secure`.
    fn dial(&mut self, host: &str, port: u16, secure: bool) -> SioResult<Box<dyn ByteStream>>;
}

/// Dialer for real TCP/TLS connections.
pub struct TcpDialer {
    context: TlsContext,
    read_timeout: Duration,
    last_dial: Option<Instant>,
}

impl TcpDialer {
    /// Create a dialer with the given TLS context and read timeout.
    pub fn new(context: TlsContext, read_timeout: Duration) -> Self {
        Self {
            context,
            read_timeout,
            last_dial: None,
        }
    }

    /// Sleep off the remainder of the inter-dial spacing window.
    fn throttle(&mut self) {
        let floor = Duration::from_millis(CONNECT_THROTTLE_MS);
        if let Some(last) = self.last_dial {
            let elapsed = last.elapsed();
            if elapsed < floor {
                std::thread::sleep(floor - elapsed);
            }
        }
        self.last_dial = Some(Instant::now());
    }

    fn tls_connector(&self) -> SioResult<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.context.accept_invalid_certs {
            builder.danger_accept_invalid_certs(true);
        }
        if self.context.accept_invalid_hostnames {
            builder.danger_accept_invalid_hostnames(true);
        }
        if let Some(pem) = &self.context.root_cert_pem {
            let cert = Certificate::from_pem(pem.as_bytes())
                .map_err(|e| SioError::Config(format!("bad root certificate: {e}")))?;
            builder.add_root_certificate(cert);
        }
        builder
            .build()
            .map_err(|e| SioError::Config(format!("tls connector: {e}")))
    }
}

impl Dialer for TcpDialer {
    fn dial(&mut self, host: &str, port: u16, secure: bool) -> SioResult<Box<dyn ByteStream>> {
        self.throttle();
        debug!("dialing {host}:{port} (tls: {secure})");

        let tcp = TcpStream::connect((host, port)).map_err(|e| SioError::socket(&e))?;
        tcp.set_read_timeout(Some(self.read_timeout))
            .map_err(|e| SioError::socket(&e))?;
        tcp.set_nodelay(true).ok();

        if secure {
            let connector = self.tls_connector()?;
            let tls = connector.connect(host, tcp).map_err(|e| SioError::Socket {
                code: -1,
                message: format!("tls handshake with {host}: {e}"),
            })?;
            Ok(Box::new(NetStream::Tls(Box::new(tls))))
        } else {
            Ok(Box::new(NetStream::Plain(tcp)))
        }
    }
}

/// Whether an I/O error is the read-timeout signal rather than a failure.
pub fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
