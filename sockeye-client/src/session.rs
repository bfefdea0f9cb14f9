//! The session facade: connect, switch namespaces, emit, wait, close.
//!
//! One client owns one connection and is driven from one thread. There
//! is no background task and no listener registry: waiting for an event
//! is a blocking call that consumes the stream until the event arrives.
//! Heartbeats happen opportunistically on every emit, namespace switch,
//! and drain cycle.

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use sockeye_core::error::{SioError, SioResult};
use sockeye_core::options::{Options, Version};
use sockeye_transport::stream::{Dialer, TcpDialer};
use sockeye_transport::ws::WsMessage;

use crate::attachments::{self, EventData};
use crate::engine::{Engine, Session};
use crate::packet::{EioPacket, SioPacket};

/// One read-and-interpret cycle's outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Drained {
    /// A decoded Socket.IO packet (binary events arrive reassembled).
    Packet(SioPacket),
    /// The raw frame payload, in raw mode.
    Raw(Vec<u8>),
}

/// A Socket.IO client session.
///
/// Reads and writes are sequential on the calling thread; the only
/// suspension points are stream I/O, the post-send sleep, and the
/// blocking `wait`.
pub struct Client {
    engine: Engine,
    namespace: String,
}

impl Client {
    /// Create a client for a server URL.
    ///
    /// The version constant picks the wire dialect; `options.version`
    /// overrides it when set. Accepts http, https, ws, and wss URLs.
    pub fn new(version: Version, url: &str, options: Options) -> SioResult<Client> {
        let parsed = Url::parse(url)
            .map_err(|e| SioError::InvalidArgument(format!("server url {url:?}: {e}")))?;
        let context = options.context.clone();
        let timeout = Duration::from_secs(options.timeout_secs);
        let dialer = TcpDialer::new(context, timeout);
        Self::with_dialer(version, &parsed, options, Box::new(dialer))
    }

    /// Create a client with a caller-supplied dialer.
    ///
    /// The seam for embedding custom transports; everything above the
    /// byte stream behaves identically.
    pub fn with_dialer(
        version: Version,
        url: &Url,
        options: Options,
        dialer: Box<dyn Dialer>,
    ) -> SioResult<Client> {
        options.validate()?;
        let secure = matches!(url.scheme(), "https" | "wss");
        if !matches!(url.scheme(), "http" | "https" | "ws" | "wss") {
            return Err(SioError::InvalidArgument(format!(
                "unsupported url scheme {:?}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| SioError::InvalidArgument("server url has no host".into()))?
            .to_string();
        let port = url
            .port()
            .unwrap_or(if secure { 443 } else { 80 });
        let dialect = options.dialect_for(version);

        info!(%version, %host, port, "client created (EIO {})", dialect.eio);
        Ok(Client {
            engine: Engine::new(dialect, host, port, secure, options, dialer),
            namespace: "/".to_string(),
        })
    }

    /// The negotiated session, when connected.
    pub fn session(&self) -> Option<&Session> {
        self.engine.session()
    }

    /// The namespace events are currently emitted on.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Whether the connection sequence completed.
    pub fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    /// Run the connection sequence: polling handshake, namespace connect
    /// (dialects that do it pre-upgrade), then the WebSocket upgrade.
    /// A no-op when already connected.
    pub fn connect(&mut self) -> SioResult<()> {
        if self.engine.is_connected() {
            debug!("already connected, skipping");
            return Ok(());
        }
        self.engine.handshake()?;
        if self.engine.dialect().polling_namespace_connect {
            self.engine.namespace_connect(&self.namespace)?;
        }
        self.engine.upgrade()?;
        Ok(())
    }

    /// Alias for [`Client::connect`].
    pub fn initialize(&mut self) -> SioResult<()> {
        self.connect()
    }

    /// Switch the current namespace.
    ///
    /// When the namespace actually changes on a live connection, sends
    /// the CONNECT packet and drains until the server responds.
    pub fn of(&mut self, namespace: &str) -> SioResult<()> {
        let namespace = normalize_namespace(namespace);
        if namespace == self.namespace {
            return Ok(());
        }
        info!(from = %self.namespace, to = %namespace, "switching namespace");
        self.namespace = namespace.clone();

        if !self.engine.is_connected() {
            return Ok(());
        }
        self.engine.keep_alive()?;
        let connect = SioPacket::Connect {
            nsp: namespace,
            data: self.engine.options().auth.clone(),
        };
        let message = EioPacket::Message(connect.encode()?).encode();
        self.engine.write_packet(&message)?;

        // Drain until the server answers the namespace switch.
        loop {
            if let Some(drained) = self.drain(false)? {
                debug!("namespace switch answered with {drained:?}");
                return Ok(());
            }
        }
    }

    /// Emit a named event with arguments on the current namespace.
    ///
    /// Arguments holding binary blobs are sent as one text frame with
    /// placeholders followed by one binary frame per blob, in placeholder
    /// order. Returns the total bytes written.
    pub fn emit(&mut self, event: &str, args: Vec<EventData>) -> SioResult<usize> {
        if event.is_empty() {
            return Err(SioError::InvalidArgument("event name is empty".into()));
        }
        self.engine.keep_alive()?;

        let (values, blobs) = attachments::extract(&args);
        let packet = if blobs.is_empty() {
            SioPacket::Event {
                nsp: self.namespace.clone(),
                name: event.to_string(),
                args: values.into_iter().map(EventData::Json).collect(),
            }
        } else {
            SioPacket::BinaryEvent {
                nsp: self.namespace.clone(),
                name: event.to_string(),
                args: values,
                bin_count: blobs.len(),
            }
        };

        let message = EioPacket::Message(packet.encode()?).encode();
        let mut written = self.engine.write_packet(&message)?;
        for blob in &blobs {
            written += self.engine.write_attachment(blob)?;
        }
        debug!(event, written, attachments = blobs.len(), "event emitted");

        let wait = self.engine.options().wait_micros;
        if wait > 0 {
            std::thread::sleep(Duration::from_micros(wait));
        }
        Ok(written)
    }

    /// Block until a matching event arrives on the current namespace.
    ///
    /// Everything else on the stream is consumed silently: heartbeats are
    /// answered, NOOPs swallowed, other events discarded. The caller
    /// bounds total waiting externally; each read is bounded by the
    /// stream timeout and simply loops.
    pub fn wait(&mut self, event: &str) -> SioResult<SioPacket> {
        if event.is_empty() {
            return Err(SioError::InvalidArgument("event name is empty".into()));
        }
        loop {
            let Some(Drained::Packet(packet)) = self.drain(false)? else {
                continue;
            };
            if let SioPacket::Event { nsp, name, .. } = &packet {
                if name == event && namespace_matches(nsp, &self.namespace) {
                    return Ok(packet);
                }
            }
            debug!("discarding {packet:?} while waiting for {event:?}");
        }
    }

    /// One read-and-interpret cycle.
    ///
    /// In raw mode the frame payload comes back untouched. Otherwise
    /// PING is answered, PONG and NOOP are swallowed (returning `None`),
    /// and a MESSAGE decodes into a packet, reassembling binary events
    /// from their attachment frames. A read timeout returns `None`.
    /// Always finishes with a `keep_alive` check.
    pub fn drain(&mut self, raw: bool) -> SioResult<Option<Drained>> {
        let drained = match self.drain_once(raw) {
            Ok(drained) => drained,
            Err(e) if e.is_timeout() => None,
            Err(e) => return Err(e),
        };
        self.engine.keep_alive()?;
        Ok(drained)
    }

    fn drain_once(&mut self, raw: bool) -> SioResult<Option<Drained>> {
        let message = self.engine.read_message()?;
        if raw {
            return match message {
                WsMessage::Text(text) => Ok(Some(Drained::Raw(text.into_bytes()))),
                WsMessage::Binary(payload) => Ok(Some(Drained::Raw(payload))),
                other => self.handle_control(other).map(|_| None),
            };
        }
        match message {
            WsMessage::Text(text) => self.handle_engine_packet(EioPacket::decode(&text)?),
            WsMessage::Binary(_) => Err(SioError::Protocol(
                "binary frame outside attachment re-assembly".into(),
            )),
            other => self.handle_control(other).map(|_| None),
        }
    }

    fn handle_control(&mut self, message: WsMessage) -> SioResult<()> {
        match message {
            WsMessage::Ping(payload) => {
                self.engine.write_pong(&payload)?;
                Ok(())
            }
            WsMessage::Pong(_) => Ok(()),
            WsMessage::Close { code, reason } => {
                debug!(?code, %reason, "server closed the websocket");
                Err(SioError::Socket {
                    code: code.map(i32::from).unwrap_or(-1),
                    message: "server closed the connection".into(),
                })
            }
            WsMessage::Text(_) | WsMessage::Binary(_) => Ok(()),
        }
    }

    fn handle_engine_packet(&mut self, packet: EioPacket) -> SioResult<Option<Drained>> {
        match packet {
            EioPacket::Ping(data) => {
                // Server-driven heartbeat: answer in kind.
                self.engine.write_packet(&EioPacket::Pong(data).encode())?;
                Ok(None)
            }
            EioPacket::Pong(_) | EioPacket::Noop | EioPacket::Upgrade => Ok(None),
            EioPacket::Open(_) => {
                debug!("ignoring OPEN outside the handshake");
                Ok(None)
            }
            EioPacket::Close => Err(SioError::Socket {
                code: -1,
                message: "server closed the session".into(),
            }),
            EioPacket::Message(payload) => {
                let packet = SioPacket::decode(&payload)?;
                match packet {
                    SioPacket::BinaryEvent {
                        nsp,
                        name,
                        args,
                        bin_count,
                    } => {
                        let blobs = self.read_attachments(bin_count)?;
                        let args = attachments::inject(args, &blobs)?;
                        Ok(Some(Drained::Packet(SioPacket::Event { nsp, name, args })))
                    }
                    SioPacket::BinaryAck {
                        nsp,
                        id,
                        args,
                        bin_count,
                    } => {
                        let blobs = self.read_attachments(bin_count)?;
                        let args = attachments::inject(args, &blobs)?;
                        Ok(Some(Drained::Packet(SioPacket::Ack { nsp, id, args })))
                    }
                    other => Ok(Some(Drained::Packet(other))),
                }
            }
        }
    }

    /// Read exactly `count` raw binary frames following a binary event's
    /// text frame. The attachments arrive contiguously; another text
    /// packet in their place is a protocol error.
    fn read_attachments(&mut self, count: usize) -> SioResult<Vec<Vec<u8>>> {
        let mut blobs = Vec::with_capacity(count);
        while blobs.len() < count {
            match self.engine.read_message() {
                Ok(WsMessage::Binary(payload)) => blobs.push(payload),
                Ok(WsMessage::Text(text)) => {
                    return Err(SioError::Protocol(format!(
                        "text frame {text:?} interleaved inside {count} attachments"
                    )))
                }
                Ok(other) => self.handle_control(other)?,
                // Attachments are mid-flight; keep reading.
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(blobs)
    }

    /// Send the namespace disconnect, tear the transport down, and clear
    /// session state and cookies. The client can connect again afterward.
    pub fn close(&mut self) -> SioResult<()> {
        if self.engine.is_connected() {
            let disconnect = SioPacket::Disconnect {
                nsp: self.namespace.clone(),
            };
            let message = EioPacket::Message(disconnect.encode()?).encode();
            if let Err(e) = self.engine.write_packet(&message) {
                debug!("disconnect packet not sent: {e}");
            }
        }
        self.engine.shutdown();
        self.namespace = "/".to_string();
        Ok(())
    }
}

/// Give every namespace a canonical leading-slash form.
fn normalize_namespace(namespace: &str) -> String {
    if namespace.is_empty() {
        return "/".to_string();
    }
    if namespace.starts_with('/') {
        namespace.to_string()
    } else {
        format!("/{namespace}")
    }
}

/// Exact match, or equal after normalizing the leading slash. The
/// off-by-one-slash form is accepted for wire compatibility with servers
/// that emit the host namespace bare.
fn namespace_matches(packet_nsp: &str, current: &str) -> bool {
    if packet_nsp == current {
        return true;
    }
    normalize_namespace(packet_nsp.trim_start_matches('/'))
        == normalize_namespace(current.trim_start_matches('/'))
}
