//! Client options and protocol dialect descriptors.
//!
//! Handles the configuration surface of the client: transport selection,
//! timeouts, headers, auth payload, TLS context, and the protocol version
//! constants. Options can be built in code or loaded from TOML on disk.
//!
//! The four Engine.IO wire variants are expressed as a [`Dialect`] value
//! carried by the engine. All behavioral differences between protocol
//! revisions are data on this descriptor, not code paths keyed on version
//! checks scattered through the stack.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{SioError, SioResult};

/// Protocol version constant selecting the engine variant.
///
/// Each constant fixes the Engine.IO query version, the polling packet
/// separator, the heartbeat direction, and the namespace-connect behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Version {
    /// Socket.IO 0.x era servers (Engine.IO 2).
    V0X,
    /// Socket.IO 1.x era servers (Engine.IO 3).
    V1X,
    /// Socket.IO 2.x era servers (Engine.IO 3).
    V2X,
    /// Socket.IO 3.x era servers (Engine.IO 4).
    V3X,
    /// Socket.IO 4.x era servers (Engine.IO 4).
    V4X,
}

impl Version {
    /// The Engine.IO protocol revision this constant negotiates.
    pub fn eio(self) -> u8 {
        match self {
            Version::V0X => 2,
            Version::V1X | Version::V2X => 3,
            Version::V3X | Version::V4X => 4,
        }
    }

    /// The wire dialect for this version constant.
    pub fn dialect(self) -> Dialect {
        Dialect::for_eio(self.eio())
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Version::V0X => write!(f, "0.x"),
            Version::V1X => write!(f, "1.x"),
            Version::V2X => write!(f, "2.x"),
            Version::V3X => write!(f, "3.x"),
            Version::V4X => write!(f, "4.x"),
        }
    }
}

/// Wire-level behavior descriptor derived from the Engine.IO revision.
///
/// The engine carries one of these instead of branching on version numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    /// Engine.IO revision sent as the `EIO` query parameter.
    pub eio: u8,
    /// Polling bodies frame packets as `<len>:<payload>` runs (EIO <= 3).
    /// EIO >= 4 bodies carry a single packet with no delimiter.
    pub length_prefixed_body: bool,
    /// The namespace CONNECT is POSTed over polling before the upgrade
    /// (EIO >= 4).
    pub polling_namespace_connect: bool,
    /// The client drives the heartbeat with PING (EIO <= 3). On EIO >= 4
    /// the server pings and the client answers PONG.
    pub client_pings: bool,
    /// The server emits a gratuitous `40` right after the upgrade which
    /// must be drained and discarded (EIO 2 only).
    pub drains_spurious_connect: bool,
    /// Sec-WebSocket-Key is derived from a truncated SHA-1 digest instead
    /// of 16 random bytes (legacy servers).
    pub legacy_upgrade_key: bool,
    /// The CONNECT packet may carry an auth payload (EIO >= 4).
    pub supports_auth: bool,
}

impl Dialect {
    /// Derive the dialect for an Engine.IO revision in 1..=4.
    pub fn for_eio(eio: u8) -> Dialect {
        Dialect {
            eio,
            length_prefixed_body: eio <= 3,
            polling_namespace_connect: eio >= 4,
            client_pings: eio <= 3,
            drains_spurious_connect: eio == 2,
            legacy_upgrade_key: eio <= 3,
            supports_auth: eio >= 4,
        }
    }
}

/// Initial transport for the connection sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// HTTP long-polling.
    Polling,
    /// Full-duplex WebSocket.
    Websocket,
}

/// TLS configuration applied by the transport layer when dialing a
/// `https`/`wss` endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsContext {
    /// Accept certificates that fail verification (self-signed servers).
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Accept certificates whose hostname does not match.
    #[serde(default)]
    pub accept_invalid_hostnames: bool,

    /// Additional PEM root certificate to trust.
    #[serde(default)]
    pub root_cert_pem: Option<String>,
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Engine.IO protocol revision override in 1..=4. When unset, the
    /// version constant passed to the client decides.
    #[serde(default)]
    pub version: Option<u8>,

    /// Initial transport. The handshake itself always runs over polling.
    #[serde(default = "default_transport")]
    pub transport: Transport,

    /// Add `b64=1` to the handshake query (EIO 2 servers without binary
    /// frame support).
    #[serde(default)]
    pub use_b64: bool,

    /// Read timeout on the byte stream, in seconds.
    #[serde(rename = "timeout", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Post-send sleep in microseconds, giving slow servers a beat to
    /// process a write before the next one lands.
    #[serde(rename = "wait", default)]
    pub wait_micros: u64,

    /// Reuse the TCP socket across successive polling requests.
    #[serde(default)]
    pub persistent: bool,

    /// Refuse to send frames whose payload exceeds this many bytes. The
    /// server's advertised `maxPayload` takes precedence when smaller.
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,

    /// Mount path segment of the Engine.IO endpoint.
    #[serde(default = "default_path")]
    pub path: String,

    /// Origin header for the upgrade request.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Extra headers added to every HTTP request and the upgrade.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Auth payload sent with the CONNECT packet (EIO >= 4 only).
    #[serde(default)]
    pub auth: Option<serde_json::Value>,

    /// Transport-level TLS configuration.
    #[serde(default)]
    pub context: TlsContext,

    /// Extra query parameters appended to every polling and upgrade URL.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

fn default_transport() -> Transport {
    Transport::Polling
}

fn default_timeout_secs() -> u64 {
    constants::DEFAULT_TIMEOUT_SECS
}

fn default_max_payload() -> usize {
    constants::DEFAULT_MAX_PAYLOAD
}

fn default_path() -> String {
    constants::DEFAULT_PATH.to_string()
}

fn default_origin() -> String {
    constants::DEFAULT_ORIGIN.to_string()
}

impl Default for Options {
    fn default() -> Self {
        Self {
            version: None,
            transport: default_transport(),
            use_b64: false,
            timeout_secs: default_timeout_secs(),
            wait_micros: 0,
            persistent: false,
            max_payload: default_max_payload(),
            path: default_path(),
            origin: default_origin(),
            headers: BTreeMap::new(),
            auth: None,
            context: TlsContext::default(),
            query: BTreeMap::new(),
        }
    }
}

impl Options {
    /// Load options from a TOML file.
    pub fn load_from_file(path: &Path) -> SioResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let options: Options = toml::from_str(&contents)?;
        options.validate()?;
        Ok(options)
    }

    /// Save options to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> SioResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SioError::Config(format!("failed to serialize options: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check option values against their contracts.
    pub fn validate(&self) -> SioResult<()> {
        if let Some(v) = self.version {
            if !(1..=4).contains(&v) {
                return Err(SioError::InvalidArgument(format!(
                    "version must be in 1..=4, got {v}"
                )));
            }
        }
        if self.max_payload == 0 {
            return Err(SioError::InvalidArgument(
                "max_payload must be non-zero".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(SioError::InvalidArgument(
                "timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the wire dialect for a version constant, applying the
    /// `version` override when set.
    pub fn dialect_for(&self, version: Version) -> Dialect {
        match self.version {
            Some(eio) => Dialect::for_eio(eio),
            None => version.dialect(),
        }
    }
}
