//! Global error types for the Sockeye client.
//!
//! All error categories across the protocol stack are unified into a single
//! `SioError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using SioError.
pub type SioResult<T> = Result<T, SioError>;

/// Unified error type covering all error categories in Sockeye.
#[derive(Error, Debug)]
pub enum SioError {
    // -- Connection errors --
    /// The server rejected or aborted the connection sequence: non-200 on
    /// the polling handshake, non-101 on the upgrade, a missing session id,
    /// or a CONNECT_ERROR reply on the namespace connect.
    #[error("server connection failure: {0}")]
    ConnectionFailure(String),

    /// The server does not advertise the transport we need to upgrade to.
    #[error("unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// Transport-level I/O failure: connect refused, TLS error, broken pipe.
    #[error("socket error (code {code}): {message}")]
    Socket {
        /// OS-level error code, or -1 when none applies.
        code: i32,
        /// Human-readable description.
        message: String,
    },

    // -- Protocol errors --
    /// Malformed wire data: missing length delimiter, unknown opcode,
    /// reserved frame bits, bad JSON. Fatal for the current call.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An outgoing frame would exceed the negotiated payload limit.
    /// The operation aborts before anything is written.
    #[error("payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge {
        /// Size of the offending payload.
        size: usize,
        /// Effective limit it was checked against.
        limit: usize,
    },

    /// Caller passed an argument outside the contract.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // -- Recoverable --
    /// A read on the byte stream timed out with no data. Recovered locally:
    /// `drain` returns nothing and `wait` loops again.
    #[error("read timed out")]
    Timeout,

    // -- File/IO errors --
    /// File system or stream operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Configuration errors --
    /// Failed to load or parse client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    // -- Generic --
    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SioError {
    /// Whether this error is the recoverable read-timeout signal.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SioError::Timeout)
    }

    /// Build a `Socket` error from an I/O error, preserving the OS code.
    pub fn socket(err: &std::io::Error) -> Self {
        SioError::Socket {
            code: err.raw_os_error().unwrap_or(-1),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SioError {
    fn from(e: serde_json::Error) -> Self {
        SioError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for SioError {
    fn from(e: toml::de::Error) -> Self {
        SioError::Config(e.to_string())
    }
}
