//! The Engine.IO engine: handshake, transport upgrade, heartbeat.
//!
//! One engine owns one connection: the polling stream during the
//! handshake phase, then the WebSocket stream that replaces it at the
//! upgrade. Protocol-revision differences are carried by the
//! [`Dialect`] descriptor; there is no per-version code path beyond
//! reading its flags.

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use sockeye_core::constants::{CLIENT_NAME, CLIENT_VERSION, WEBSOCKET_VERSION};
use sockeye_core::error::{SioError, SioResult};
use sockeye_core::options::{Dialect, Options};
use sockeye_core::yeast::yeast;
use sockeye_transport::http::{self, Request, Response};
use sockeye_transport::stream::{ByteStream, Dialer};
use sockeye_transport::ws::{self, FrameCodec, Opcode, WsMessage};

use crate::packet::{decode_polling_body, encode_polling_body, EioPacket, Handshake, SioPacket};

/// Negotiated session parameters, one per connection.
///
/// Created on a successful handshake, destroyed on close. A closed
/// session is terminal; reconnecting builds a fresh one.
#[derive(Debug)]
pub struct Session {
    /// Session id assigned by the server.
    pub sid: String,
    /// Heartbeat interval.
    pub ping_interval: Duration,
    /// Grace period the server allows after the interval.
    pub ping_timeout: Duration,
    /// Transports the session may upgrade to.
    pub upgrades: Vec<String>,
    /// Server-side payload ceiling, when advertised.
    pub max_payload: Option<usize>,
    last_heartbeat: Instant,
}

impl Session {
    /// Build a session from the handshake, converting millisecond wire
    /// units to durations.
    pub fn new(handshake: &Handshake) -> Session {
        Session {
            sid: handshake.sid.clone(),
            ping_interval: Duration::from_millis(handshake.ping_interval),
            ping_timeout: Duration::from_millis(handshake.ping_timeout),
            upgrades: handshake.upgrades.clone(),
            max_payload: handshake.max_payload,
            last_heartbeat: Instant::now(),
        }
    }

    /// Total silence budget before the server may drop the session.
    pub fn timeout(&self) -> Duration {
        self.ping_interval + self.ping_timeout
    }

    /// Whether a heartbeat is due.
    pub fn needs_heartbeat(&self) -> bool {
        self.last_heartbeat.elapsed() >= self.ping_interval
    }

    /// Record that a heartbeat was just sent.
    pub fn touch(&mut self) {
        self.last_heartbeat = Instant::now();
    }
}

/// The Engine.IO connection engine.
pub struct Engine {
    dialect: Dialect,
    options: Options,
    host: String,
    port: u16,
    secure: bool,
    dialer: Box<dyn Dialer>,
    codec: FrameCodec,
    poll_stream: Option<Box<dyn ByteStream>>,
    ws_stream: Option<Box<dyn ByteStream>>,
    session: Option<Session>,
    cookies: Vec<String>,
    namespace_sid: Option<String>,
    connected: bool,
}

impl Engine {
    /// Create an engine for the given endpoint.
    pub fn new(
        dialect: Dialect,
        host: String,
        port: u16,
        secure: bool,
        options: Options,
        dialer: Box<dyn Dialer>,
    ) -> Engine {
        let codec = FrameCodec::new(options.max_payload);
        Engine {
            dialect,
            options,
            host,
            port,
            secure,
            dialer,
            codec,
            poll_stream: None,
            ws_stream: None,
            session: None,
            cookies: Vec::new(),
            namespace_sid: None,
            connected: false,
        }
    }

    /// The wire dialect in effect.
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The client options in effect.
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The negotiated session, when one exists.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Whether the upgrade completed and the WebSocket is live.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Cookies captured from the handshake, replayed on later requests.
    pub fn cookies(&self) -> &[String] {
        &self.cookies
    }

    fn sid(&self) -> SioResult<String> {
        self.session
            .as_ref()
            .map(|s| s.sid.clone())
            .ok_or_else(|| SioError::ConnectionFailure("no session; connect first".into()))
    }

    fn host_header(&self) -> String {
        let default_port = if self.secure { 443 } else { 80 };
        if self.port == default_port {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    fn effective_max_payload(&self) -> usize {
        match self.session.as_ref().and_then(|s| s.max_payload) {
            Some(server) => server.min(self.options.max_payload),
            None => self.options.max_payload,
        }
    }

    fn query_suffix(&self) -> String {
        let mut suffix = String::new();
        for (name, value) in &self.options.query {
            suffix.push_str(&format!("&{name}={value}"));
        }
        suffix
    }

    fn polling_target(&self, sid: Option<&str>) -> String {
        let mut target = format!(
            "/{}/?EIO={}&transport=polling&t={}",
            self.options.path.trim_matches('/'),
            self.dialect.eio,
            yeast()
        );
        if self.options.use_b64 {
            target.push_str("&b64=1");
        }
        if let Some(sid) = sid {
            target.push_str(&format!("&sid={sid}"));
        }
        target.push_str(&self.query_suffix());
        target
    }

    fn websocket_target(&self, sid: &str) -> String {
        format!(
            "/{}/?EIO={}&transport=websocket&t={}&sid={sid}{}",
            self.options.path.trim_matches('/'),
            self.dialect.eio,
            yeast(),
            self.query_suffix()
        )
    }

    fn base_headers(&self) -> Vec<(String, String)> {
        let mut headers: Vec<(String, String)> = self
            .options
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("user-agent"))
        {
            headers.push((
                "User-Agent".to_string(),
                format!("{CLIENT_NAME}/{CLIENT_VERSION}"),
            ));
        }
        if !self.cookies.is_empty() {
            headers.push(("Cookie".to_string(), self.cookies.join("; ")));
        }
        headers
    }

    /// One polling round-trip, reusing the kept-alive stream when the
    /// persistent hint is set.
    fn http_request(
        &mut self,
        method: &str,
        target: &str,
        body: Option<&[u8]>,
    ) -> SioResult<Response> {
        let mut stream = match self.poll_stream.take() {
            Some(stream) => stream,
            None => self.dialer.dial(&self.host, self.port, self.secure)?,
        };
        let host = self.host_header();
        let headers = self.base_headers();
        let connection = if self.options.persistent {
            "keep-alive"
        } else {
            "close"
        };
        let request = Request {
            method,
            host: &host,
            target,
            headers: &headers,
            body,
            connection,
        };
        // On any error the stream is discarded; the next request redials.
        let response = http::roundtrip(stream.as_mut(), &request, false)?;
        if self.options.persistent && !response.connection_close() {
            self.poll_stream = Some(stream);
        }
        Ok(response)
    }

    /// Run the polling handshake and build the session.
    pub fn handshake(&mut self) -> SioResult<()> {
        let target = self.polling_target(None);
        let response = self.http_request("GET", &target, None)?;
        if response.status != 200 {
            return Err(SioError::ConnectionFailure(format!(
                "handshake returned status {}",
                response.status
            )));
        }
        self.cookies.extend(response.set_cookies());

        let packets = decode_polling_body(response.text()?, self.dialect.length_prefixed_body)?;
        let mut handshake: Option<Handshake> = None;
        for packet in packets {
            match packet {
                EioPacket::Open(hs) if handshake.is_none() => handshake = Some(hs),
                other => debug!("handshake body also carried {other:?}"),
            }
        }
        let handshake = handshake.ok_or_else(|| {
            SioError::ConnectionFailure("handshake body carried no OPEN packet".into())
        })?;

        if handshake.sid.is_empty() {
            return Err(SioError::ConnectionFailure(
                "handshake session id is empty".into(),
            ));
        }
        if !handshake.upgrades.iter().any(|u| u == "websocket") {
            return Err(SioError::UnsupportedTransport(format!(
                "server upgrades {:?} do not include websocket",
                handshake.upgrades
            )));
        }

        info!(
            sid = %handshake.sid,
            ping_interval_ms = handshake.ping_interval,
            "handshake complete"
        );
        self.session = Some(Session::new(&handshake));
        Ok(())
    }

    /// Connect the namespace over polling, before the upgrade.
    ///
    /// POSTs the CONNECT packet, then polls once for the server's
    /// acknowledgment and captures the per-namespace sid.
    pub fn namespace_connect(&mut self, nsp: &str) -> SioResult<()> {
        let sid = self.sid()?;
        let connect = SioPacket::Connect {
            nsp: nsp.to_string(),
            data: self.options.auth.clone(),
        };
        let message = EioPacket::Message(connect.encode()?);
        let body = encode_polling_body(&[message], self.dialect.length_prefixed_body);

        let target = self.polling_target(Some(&sid));
        let response = self.http_request("POST", &target, Some(body.as_bytes()))?;
        if response.status != 200 {
            return Err(SioError::ConnectionFailure(format!(
                "namespace connect POST returned status {}",
                response.status
            )));
        }

        let target = self.polling_target(Some(&sid));
        let response = self.http_request("GET", &target, None)?;
        if response.status != 200 {
            return Err(SioError::ConnectionFailure(format!(
                "namespace connect poll returned status {}",
                response.status
            )));
        }

        for packet in decode_polling_body(response.text()?, self.dialect.length_prefixed_body)? {
            let EioPacket::Message(payload) = packet else {
                debug!("ignoring {packet:?} while waiting for connect ack");
                continue;
            };
            match SioPacket::decode(&payload)? {
                SioPacket::Connect { data, .. } => {
                    let ns_sid = data
                        .as_ref()
                        .and_then(|d| d.get("sid"))
                        .and_then(Value::as_str);
                    return match ns_sid {
                        Some(ns_sid) => {
                            debug!(nsp, ns_sid, "namespace connected");
                            self.namespace_sid = Some(ns_sid.to_string());
                            Ok(())
                        }
                        None => Err(SioError::ConnectionFailure(
                            "namespace connect ack carried no sid".into(),
                        )),
                    };
                }
                SioPacket::ConnectError { data, .. } => {
                    let message = data
                        .as_ref()
                        .and_then(|d| d.get("message"))
                        .and_then(Value::as_str)
                        .unwrap_or("connect refused")
                        .to_string();
                    return Err(SioError::ConnectionFailure(format!(
                        "namespace connect refused: {message}"
                    )));
                }
                other => debug!("ignoring {other:?} while waiting for connect ack"),
            }
        }
        Err(SioError::ConnectionFailure(
            "no CONNECT acknowledgment arrived on polling".into(),
        ))
    }

    /// Upgrade the session to WebSocket on a fresh stream.
    pub fn upgrade(&mut self) -> SioResult<()> {
        let sid = self.sid()?;
        let key = ws::handshake_key(self.dialect.legacy_upgrade_key);
        let target = self.websocket_target(&sid);

        let mut headers = vec![
            ("Upgrade".to_string(), "websocket".to_string()),
            ("Sec-WebSocket-Key".to_string(), key.clone()),
            (
                "Sec-WebSocket-Version".to_string(),
                WEBSOCKET_VERSION.to_string(),
            ),
            ("Origin".to_string(), self.options.origin.clone()),
        ];
        headers.extend(self.base_headers());

        let host = self.host_header();
        let mut stream = self.dialer.dial(&self.host, self.port, self.secure)?;
        let request = Request {
            method: "GET",
            host: &host,
            target: &target,
            headers: &headers,
            body: None,
            connection: "Upgrade",
        };
        let response = http::roundtrip(stream.as_mut(), &request, true)?;
        if response.status != 101 {
            return Err(SioError::ConnectionFailure(format!(
                "upgrade returned status {}",
                response.status
            )));
        }
        if let Some(accept) = response.header("sec-websocket-accept") {
            if accept != ws::accept_for_key(&key) {
                return Err(SioError::ConnectionFailure(
                    "Sec-WebSocket-Accept does not match our key".into(),
                ));
            }
        }

        // The fresh stream replaces the polling one from here on.
        self.poll_stream = None;
        self.ws_stream = Some(stream);

        self.write_packet(&EioPacket::Upgrade.encode())?;

        if self.dialect.drains_spurious_connect {
            match self.read_message() {
                Ok(message) => debug!("drained post-upgrade message: {message:?}"),
                Err(e) if e.is_timeout() => {}
                Err(e) => return Err(e),
            }
        }

        self.connected = true;
        info!("upgraded to websocket");
        Ok(())
    }

    /// Write one Engine.IO packet as a text frame. Returns bytes written.
    pub fn write_packet(&mut self, packet: &str) -> SioResult<usize> {
        self.write_frame(Opcode::Text, packet.as_bytes())
    }

    /// Write one raw binary attachment frame. Returns bytes written.
    pub fn write_attachment(&mut self, payload: &[u8]) -> SioResult<usize> {
        self.write_frame(Opcode::Binary, payload)
    }

    /// Answer a WebSocket-level ping.
    pub fn write_pong(&mut self, payload: &[u8]) -> SioResult<usize> {
        self.write_frame(Opcode::Pong, payload)
    }

    fn write_frame(&mut self, opcode: Opcode, payload: &[u8]) -> SioResult<usize> {
        let limit = self.effective_max_payload();
        if payload.len() > limit {
            return Err(SioError::PayloadTooLarge {
                size: payload.len(),
                limit,
            });
        }
        let Some(stream) = self.ws_stream.as_mut() else {
            return Err(SioError::Socket {
                code: -1,
                message: "websocket transport not established".into(),
            });
        };
        match self.codec.send(stream.as_mut(), opcode, payload) {
            Ok(written) => Ok(written),
            Err(e) => {
                // A failed write poisons the stream; drop it.
                self.ws_stream = None;
                Err(e)
            }
        }
    }

    /// Read one WebSocket message. Timeouts are the recoverable kind.
    pub fn read_message(&mut self) -> SioResult<WsMessage> {
        let Some(stream) = self.ws_stream.as_mut() else {
            return Err(SioError::Socket {
                code: -1,
                message: "websocket transport not established".into(),
            });
        };
        self.codec.read_message(stream.as_mut())
    }

    /// Opportunistic heartbeat, called before sends and after drains.
    ///
    /// On client-driven dialects this sends one PING when the interval
    /// elapsed and resets the clock; otherwise it is a no-op (the server
    /// pings and the drain loop answers).
    pub fn keep_alive(&mut self) -> SioResult<()> {
        if !self.connected || !self.dialect.client_pings {
            return Ok(());
        }
        let due = self
            .session
            .as_ref()
            .map(Session::needs_heartbeat)
            .unwrap_or(false);
        if due {
            debug!("heartbeat due, sending ping");
            self.write_packet(&EioPacket::Ping(String::new()).encode())?;
            if let Some(session) = self.session.as_mut() {
                session.touch();
            }
        }
        Ok(())
    }

    /// Tear the connection down and forget all session state.
    pub fn shutdown(&mut self) {
        if let Some(stream) = self.ws_stream.as_mut() {
            // Best-effort close frame; the stream is going away either way.
            let payload = 1000u16.to_be_bytes();
            if let Err(e) = self.codec.send(stream.as_mut(), Opcode::Close, &payload) {
                warn!("close frame not sent: {e}");
            }
        }
        self.ws_stream = None;
        self.poll_stream = None;
        self.session = None;
        self.namespace_sid = None;
        self.cookies.clear();
        self.connected = false;
        info!("connection closed");
    }
}
