//! Engine.IO and Socket.IO packet codecs.
//!
//! Engine.IO packets are one opcode character plus a payload. Over
//! polling they arrive batched in a body whose framing depends on the
//! dialect: EIO <= 3 concatenates `<len>:<payload>` runs, EIO >= 4 ships
//! a single packet per body. Socket.IO packets live inside Engine.IO
//! MESSAGE payloads and follow the grammar
//! `<type><nAttach "-">?<nsp ",">?<ackId>?<json>?`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use sockeye_core::error::{SioError, SioResult};

use crate::attachments::EventData;

/// JSON object carried by the Engine.IO OPEN packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Handshake {
    /// Session id assigned by the server. Must be non-empty.
    pub sid: String,
    /// Transports the session may upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Heartbeat interval in milliseconds.
    #[serde(rename = "pingInterval", default)]
    pub ping_interval: u64,
    /// Grace period after a missed heartbeat, in milliseconds.
    #[serde(rename = "pingTimeout", default)]
    pub ping_timeout: u64,
    /// Server-side payload ceiling, when advertised.
    #[serde(rename = "maxPayload", default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<usize>,
}

/// An Engine.IO packet (opcodes 0..6).
#[derive(Debug, Clone)]
pub enum EioPacket {
    /// Handshake result carrying the session parameters.
    Open(Handshake),
    /// Session teardown.
    Close,
    /// Heartbeat request, with optional probe payload.
    Ping(String),
    /// Heartbeat answer, echoing the ping payload.
    Pong(String),
    /// Carrier for a Socket.IO packet.
    Message(String),
    /// Transport upgrade commit.
    Upgrade,
    /// Polling filler, ignored.
    Noop,
}

impl EioPacket {
    /// Decode one packet from its wire text.
    pub fn decode(raw: &str) -> SioResult<EioPacket> {
        let Some(opcode) = raw.chars().next() else {
            return Err(SioError::Protocol("empty engine.io packet".into()));
        };
        let rest = &raw[1..];
        match opcode {
            '0' => {
                let handshake: Handshake = serde_json::from_str(rest)
                    .map_err(|e| SioError::Protocol(format!("malformed OPEN payload: {e}")))?;
                Ok(EioPacket::Open(handshake))
            }
            '1' => Ok(EioPacket::Close),
            '2' => Ok(EioPacket::Ping(rest.to_string())),
            '3' => Ok(EioPacket::Pong(rest.to_string())),
            '4' => Ok(EioPacket::Message(rest.to_string())),
            '5' => Ok(EioPacket::Upgrade),
            '6' => Ok(EioPacket::Noop),
            other => Err(SioError::Protocol(format!(
                "unknown engine.io opcode {other:?}"
            ))),
        }
    }

    /// Encode this packet to its wire text.
    pub fn encode(&self) -> String {
        match self {
            EioPacket::Open(hs) => {
                format!("0{}", serde_json::to_string(hs).unwrap_or_default())
            }
            EioPacket::Close => "1".to_string(),
            EioPacket::Ping(data) => format!("2{data}"),
            EioPacket::Pong(data) => format!("3{data}"),
            EioPacket::Message(payload) => format!("4{payload}"),
            EioPacket::Upgrade => "5".to_string(),
            EioPacket::Noop => "6".to_string(),
        }
    }
}

/// Decode a polling response body into packets.
///
/// Length-prefixed bodies (EIO <= 3) frame each packet as
/// `<decimalLen>:<payload>` where the length counts characters, not
/// bytes. EIO >= 4 bodies are a single packet.
pub fn decode_polling_body(body: &str, length_prefixed: bool) -> SioResult<Vec<EioPacket>> {
    if !length_prefixed {
        if body.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![EioPacket::decode(body)?]);
    }

    let chars: Vec<char> = body.chars().collect();
    let mut packets = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let digits_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start || i >= chars.len() || chars[i] != ':' {
            return Err(SioError::Protocol(
                "packet length delimiter missing in polling body".into(),
            ));
        }
        let len: usize = chars[digits_start..i]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| SioError::Protocol("unparseable packet length".into()))?;
        i += 1;
        if i + len > chars.len() {
            return Err(SioError::Protocol(format!(
                "packet length {len} overruns polling body"
            )));
        }
        let payload: String = chars[i..i + len].iter().collect();
        packets.push(EioPacket::decode(&payload)?);
        i += len;
    }
    Ok(packets)
}

/// Encode packets into a polling request body.
pub fn encode_polling_body(packets: &[EioPacket], length_prefixed: bool) -> String {
    if !length_prefixed {
        return packets.first().map(EioPacket::encode).unwrap_or_default();
    }
    let mut body = String::new();
    for packet in packets {
        let encoded = packet.encode();
        body.push_str(&encoded.chars().count().to_string());
        body.push(':');
        body.push_str(&encoded);
    }
    body
}

/// A Socket.IO packet, the payload of an Engine.IO MESSAGE.
#[derive(Debug, Clone, PartialEq)]
pub enum SioPacket {
    /// Namespace connect request/acknowledgment.
    Connect {
        /// Namespace, default "/".
        nsp: String,
        /// Auth payload (outgoing) or per-namespace session (incoming).
        data: Option<Value>,
    },
    /// Namespace disconnect.
    Disconnect {
        /// Namespace being left.
        nsp: String,
    },
    /// A named event with arguments.
    Event {
        /// Namespace it was emitted on.
        nsp: String,
        /// Event name, the head of the JSON array.
        name: String,
        /// Remaining array elements.
        args: Vec<EventData>,
    },
    /// A named event whose JSON still holds attachment placeholders.
    BinaryEvent {
        /// Namespace it was emitted on.
        nsp: String,
        /// Event name.
        name: String,
        /// Placeholder-bearing argument values.
        args: Vec<Value>,
        /// Number of binary frames that follow the text frame.
        bin_count: usize,
    },
    /// Acknowledgment of an event by id.
    Ack {
        /// Namespace.
        nsp: String,
        /// Id of the acknowledged event.
        id: Option<u64>,
        /// Acknowledgment arguments.
        args: Vec<EventData>,
    },
    /// Acknowledgment carrying attachment placeholders.
    BinaryAck {
        /// Namespace.
        nsp: String,
        /// Id of the acknowledged event.
        id: Option<u64>,
        /// Placeholder-bearing argument values.
        args: Vec<Value>,
        /// Number of binary frames that follow.
        bin_count: usize,
    },
    /// The server refused a namespace connect.
    ConnectError {
        /// Namespace that was refused.
        nsp: String,
        /// Error detail, usually `{"message": ...}`.
        data: Option<Value>,
    },
}

const TYPE_CONNECT: u32 = 0;
const TYPE_DISCONNECT: u32 = 1;
const TYPE_EVENT: u32 = 2;
const TYPE_ACK: u32 = 3;
const TYPE_CONNECT_ERROR: u32 = 4;
const TYPE_BINARY_EVENT: u32 = 5;
const TYPE_BINARY_ACK: u32 = 6;

impl SioPacket {
    /// The namespace this packet addresses.
    pub fn nsp(&self) -> &str {
        match self {
            SioPacket::Connect { nsp, .. }
            | SioPacket::Disconnect { nsp }
            | SioPacket::Event { nsp, .. }
            | SioPacket::BinaryEvent { nsp, .. }
            | SioPacket::Ack { nsp, .. }
            | SioPacket::BinaryAck { nsp, .. }
            | SioPacket::ConnectError { nsp, .. } => nsp,
        }
    }

    /// The wire opcode of this packet.
    pub fn type_code(&self) -> u32 {
        match self {
            SioPacket::Connect { .. } => TYPE_CONNECT,
            SioPacket::Disconnect { .. } => TYPE_DISCONNECT,
            SioPacket::Event { .. } => TYPE_EVENT,
            SioPacket::Ack { .. } => TYPE_ACK,
            SioPacket::ConnectError { .. } => TYPE_CONNECT_ERROR,
            SioPacket::BinaryEvent { .. } => TYPE_BINARY_EVENT,
            SioPacket::BinaryAck { .. } => TYPE_BINARY_ACK,
        }
    }

    /// First event/ack argument, by convention the packet's data.
    pub fn data(&self) -> Option<&EventData> {
        match self {
            SioPacket::Event { args, .. } | SioPacket::Ack { args, .. } => args.first(),
            _ => None,
        }
    }

    /// Decode a packet from the payload of an Engine.IO MESSAGE.
    pub fn decode(raw: &str) -> SioResult<SioPacket> {
        let bytes = raw.as_bytes();
        let type_digit = bytes
            .first()
            .and_then(|b| (*b as char).to_digit(10))
            .filter(|d| *d <= TYPE_BINARY_ACK)
            .ok_or_else(|| {
                SioError::Protocol(format!("unknown socket.io packet type in {raw:?}"))
            })?;
        let mut i = 1;

        // Attachment count, only on the binary types.
        let mut bin_count = 0usize;
        if type_digit == TYPE_BINARY_EVENT || type_digit == TYPE_BINARY_ACK {
            let digits_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i == digits_start || i >= bytes.len() || bytes[i] != b'-' {
                return Err(SioError::Protocol(
                    "binary packet missing attachment count".into(),
                ));
            }
            bin_count = raw[digits_start..i]
                .parse()
                .map_err(|_| SioError::Protocol("unparseable attachment count".into()))?;
            i += 1;
        }

        // Namespace: run to the separating comma, stopping early when the
        // JSON payload starts instead.
        let mut nsp = String::from("/");
        let scan_start = i;
        let mut j = i;
        let mut comma = None;
        while j < bytes.len() {
            match bytes[j] {
                b',' => {
                    comma = Some(j);
                    break;
                }
                b'[' | b'{' => break,
                _ => j += 1,
            }
        }
        if let Some(comma) = comma {
            nsp = raw[scan_start..comma].to_string();
            i = comma + 1;
        } else if j == bytes.len() && j > scan_start {
            // Ran off the end without any JSON: the rest is the namespace.
            nsp = raw[scan_start..].to_string();
            i = j;
        }
        if nsp.is_empty() {
            nsp = "/".to_string();
        }

        // Ack id digits, when present before the JSON.
        let id_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let id: Option<u64> = if i > id_start {
            Some(
                raw[id_start..i]
                    .parse()
                    .map_err(|_| SioError::Protocol("unparseable ack id".into()))?,
            )
        } else {
            None
        };

        let data: Option<Value> = if i < bytes.len() {
            Some(serde_json::from_str(&raw[i..])?)
        } else {
            None
        };

        match type_digit {
            TYPE_CONNECT => Ok(SioPacket::Connect { nsp, data }),
            TYPE_DISCONNECT => Ok(SioPacket::Disconnect { nsp }),
            TYPE_CONNECT_ERROR => Ok(SioPacket::ConnectError { nsp, data }),
            TYPE_EVENT | TYPE_BINARY_EVENT => {
                let (name, args) = split_event_payload(data)?;
                if type_digit == TYPE_EVENT {
                    Ok(SioPacket::Event {
                        nsp,
                        name,
                        args: args.into_iter().map(EventData::Json).collect(),
                    })
                } else {
                    Ok(SioPacket::BinaryEvent {
                        nsp,
                        name,
                        args,
                        bin_count,
                    })
                }
            }
            TYPE_ACK | TYPE_BINARY_ACK => {
                let args = match data {
                    Some(Value::Array(items)) => items,
                    Some(other) => {
                        return Err(SioError::Protocol(format!(
                            "ack payload must be an array, got {other}"
                        )))
                    }
                    None => Vec::new(),
                };
                if type_digit == TYPE_ACK {
                    Ok(SioPacket::Ack {
                        nsp,
                        id,
                        args: args.into_iter().map(EventData::Json).collect(),
                    })
                } else {
                    Ok(SioPacket::BinaryAck {
                        nsp,
                        id,
                        args,
                        bin_count,
                    })
                }
            }
            _ => unreachable!("type digit validated above"),
        }
    }

    /// Encode this packet into the payload of an Engine.IO MESSAGE.
    pub fn encode(&self) -> SioResult<String> {
        let mut out = String::new();
        out.push(char::from_digit(self.type_code(), 10).unwrap_or('0'));

        match self {
            SioPacket::BinaryEvent { bin_count, .. } | SioPacket::BinaryAck { bin_count, .. } => {
                out.push_str(&bin_count.to_string());
                out.push('-');
            }
            _ => {}
        }

        let nsp = self.nsp();
        if !nsp.is_empty() && nsp != "/" {
            out.push_str(nsp);
            out.push(',');
        }

        match self {
            SioPacket::Connect { data, .. } | SioPacket::ConnectError { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&data.to_string());
                }
            }
            SioPacket::Disconnect { .. } => {}
            SioPacket::Event { name, args, .. } => {
                let mut array = vec![Value::String(name.clone())];
                for arg in args {
                    array.push(arg.to_value()?);
                }
                out.push_str(&Value::Array(array).to_string());
            }
            SioPacket::BinaryEvent { name, args, .. } => {
                let mut array = vec![Value::String(name.clone())];
                array.extend(args.iter().cloned());
                out.push_str(&Value::Array(array).to_string());
            }
            SioPacket::Ack { id, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut array = Vec::with_capacity(args.len());
                for arg in args {
                    array.push(arg.to_value()?);
                }
                out.push_str(&Value::Array(array).to_string());
            }
            SioPacket::BinaryAck { id, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                out.push_str(&Value::Array(args.clone()).to_string());
            }
        }
        Ok(out)
    }
}

fn split_event_payload(data: Option<Value>) -> SioResult<(String, Vec<Value>)> {
    let Some(Value::Array(mut items)) = data else {
        return Err(SioError::Protocol(
            "event payload must be a JSON array".into(),
        ));
    };
    if items.is_empty() {
        return Err(SioError::Protocol("event payload missing the name".into()));
    }
    let name = match items.remove(0) {
        Value::String(name) => name,
        other => {
            return Err(SioError::Protocol(format!(
                "event name must be a string, got {other}"
            )))
        }
    };
    Ok((name, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eio_decode_open() {
        let raw = r#"0{"sid":"ABC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000}"#;
        match EioPacket::decode(raw).unwrap() {
            EioPacket::Open(hs) => {
                assert_eq!(hs.sid, "ABC");
                assert_eq!(hs.upgrades, vec!["websocket"]);
                assert_eq!(hs.ping_interval, 25000);
                assert_eq!(hs.ping_timeout, 20000);
                assert!(hs.max_payload.is_none());
            }
            other => panic!("expected OPEN, got {other:?}"),
        }
    }

    #[test]
    fn test_eio_decode_simple_opcodes() {
        assert!(matches!(EioPacket::decode("1").unwrap(), EioPacket::Close));
        assert!(matches!(EioPacket::decode("5").unwrap(), EioPacket::Upgrade));
        assert!(matches!(EioPacket::decode("6").unwrap(), EioPacket::Noop));
        match EioPacket::decode("2probe").unwrap() {
            EioPacket::Ping(data) => assert_eq!(data, "probe"),
            other => panic!("expected PING, got {other:?}"),
        }
        match EioPacket::decode("40").unwrap() {
            EioPacket::Message(payload) => assert_eq!(payload, "0"),
            other => panic!("expected MESSAGE, got {other:?}"),
        }
    }

    #[test]
    fn test_eio_decode_rejects_unknown_opcode() {
        assert!(matches!(
            EioPacket::decode("9"),
            Err(SioError::Protocol(_))
        ));
        assert!(matches!(EioPacket::decode(""), Err(SioError::Protocol(_))));
    }

    #[test]
    fn test_eio_encode() {
        assert_eq!(EioPacket::Ping(String::new()).encode(), "2");
        assert_eq!(EioPacket::Pong("probe".into()).encode(), "3probe");
        assert_eq!(EioPacket::Message("2[\"x\"]".into()).encode(), "42[\"x\"]");
        assert_eq!(EioPacket::Upgrade.encode(), "5");
    }

    #[test]
    fn test_polling_body_length_prefixed() {
        let open = r#"0{"sid":"x","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":5000}"#;
        let body = format!("{}:{}2:40", open.chars().count(), open);
        let packets = decode_polling_body(&body, true).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(matches!(&packets[0], EioPacket::Open(hs) if hs.sid == "x"));
        assert!(matches!(&packets[1], EioPacket::Message(p) if p == "0"));
    }

    #[test]
    fn test_polling_body_single_packet() {
        let packets = decode_polling_body("40", false).unwrap();
        assert_eq!(packets.len(), 1);
        assert!(matches!(&packets[0], EioPacket::Message(p) if p == "0"));
        assert!(decode_polling_body("", false).unwrap().is_empty());
    }

    #[test]
    fn test_polling_body_missing_delimiter() {
        assert!(matches!(
            decode_polling_body("40", true),
            Err(SioError::Protocol(_))
        ));
        assert!(matches!(
            decode_polling_body("9:40", true),
            Err(SioError::Protocol(_))
        ));
    }

    #[test]
    fn test_polling_body_counts_characters_not_bytes() {
        // "4héllo" is 6 characters but 7 bytes.
        let body = "6:4héllo2:40";
        let packets = decode_polling_body(body, true).unwrap();
        assert_eq!(packets.len(), 2);
        assert!(matches!(&packets[0], EioPacket::Message(p) if p == "héllo"));
    }

    #[test]
    fn test_encode_polling_body_roundtrip() {
        let packets = vec![
            EioPacket::Message("2[\"a\",1]".into()),
            EioPacket::Ping(String::new()),
        ];
        let body = encode_polling_body(&packets, true);
        assert_eq!(body, "9:42[\"a\",1]1:2");
        let decoded = decode_polling_body(&body, true).unwrap();
        assert_eq!(decoded.len(), 2);
    }

    #[test]
    fn test_sio_decode_event_default_namespace() {
        let packet = SioPacket::decode("2[\"hello\",[\"world\"]]").unwrap();
        match packet {
            SioPacket::Event { nsp, name, args } => {
                assert_eq!(nsp, "/");
                assert_eq!(name, "hello");
                assert_eq!(args, vec![EventData::Json(json!(["world"]))]);
            }
            other => panic!("expected EVENT, got {other:?}"),
        }
    }

    #[test]
    fn test_sio_decode_event_with_namespace() {
        let packet = SioPacket::decode("2/chat,[\"msg\",{\"text\":\"hi\"}]").unwrap();
        match packet {
            SioPacket::Event { nsp, name, args } => {
                assert_eq!(nsp, "/chat");
                assert_eq!(name, "msg");
                assert_eq!(args, vec![EventData::Json(json!({"text": "hi"}))]);
            }
            other => panic!("expected EVENT, got {other:?}"),
        }
    }

    #[test]
    fn test_sio_decode_binary_event() {
        let packet =
            SioPacket::decode("51-[\"ev\",{\"a\":{\"_placeholder\":true,\"num\":0},\"b\":\"s\"}]")
                .unwrap();
        match packet {
            SioPacket::BinaryEvent {
                nsp,
                name,
                args,
                bin_count,
            } => {
                assert_eq!(nsp, "/");
                assert_eq!(name, "ev");
                assert_eq!(bin_count, 1);
                assert_eq!(
                    args,
                    vec![json!({"a": {"_placeholder": true, "num": 0}, "b": "s"})]
                );
            }
            other => panic!("expected BINARY_EVENT, got {other:?}"),
        }
    }

    #[test]
    fn test_sio_decode_connect_variants() {
        assert_eq!(
            SioPacket::decode("0").unwrap(),
            SioPacket::Connect {
                nsp: "/".into(),
                data: None
            }
        );
        assert_eq!(
            SioPacket::decode("0/admin,").unwrap(),
            SioPacket::Connect {
                nsp: "/admin".into(),
                data: None
            }
        );
        assert_eq!(
            SioPacket::decode("0{\"sid\":\"zz\"}").unwrap(),
            SioPacket::Connect {
                nsp: "/".into(),
                data: Some(json!({"sid": "zz"}))
            }
        );
    }

    #[test]
    fn test_sio_decode_connect_error() {
        let packet = SioPacket::decode("4{\"message\":\"invalid credentials\"}").unwrap();
        assert_eq!(
            packet,
            SioPacket::ConnectError {
                nsp: "/".into(),
                data: Some(json!({"message": "invalid credentials"}))
            }
        );
    }

    #[test]
    fn test_sio_decode_ack_with_id() {
        let packet = SioPacket::decode("3/chat,7[\"done\"]").unwrap();
        assert_eq!(
            packet,
            SioPacket::Ack {
                nsp: "/chat".into(),
                id: Some(7),
                args: vec![EventData::Json(json!("done"))],
            }
        );

        // Ack id on the default namespace: digits come right after the type.
        let packet = SioPacket::decode("312[]").unwrap();
        assert_eq!(
            packet,
            SioPacket::Ack {
                nsp: "/".into(),
                id: Some(12),
                args: vec![],
            }
        );
    }

    #[test]
    fn test_sio_decode_rejects_bad_packets() {
        assert!(matches!(SioPacket::decode("7"), Err(SioError::Protocol(_))));
        assert!(matches!(SioPacket::decode(""), Err(SioError::Protocol(_))));
        assert!(matches!(
            SioPacket::decode("5[\"ev\"]"),
            Err(SioError::Protocol(_))
        ));
        assert!(matches!(
            SioPacket::decode("2{\"not\":\"array\"}"),
            Err(SioError::Protocol(_))
        ));
        assert!(matches!(
            SioPacket::decode("2[42]"),
            Err(SioError::Protocol(_))
        ));
    }

    #[test]
    fn test_sio_encode_event() {
        let packet = SioPacket::Event {
            nsp: "/".into(),
            name: "hello".into(),
            args: vec![EventData::Json(json!(["world"]))],
        };
        assert_eq!(packet.encode().unwrap(), "2[\"hello\",[\"world\"]]");

        let packet = SioPacket::Event {
            nsp: "/chat".into(),
            name: "msg".into(),
            args: vec![EventData::Json(json!({"text": "hi"}))],
        };
        assert_eq!(packet.encode().unwrap(), "2/chat,[\"msg\",{\"text\":\"hi\"}]");
    }

    #[test]
    fn test_sio_encode_binary_event() {
        let packet = SioPacket::BinaryEvent {
            nsp: "/".into(),
            name: "test".into(),
            args: vec![json!({"file": {"_placeholder": true, "num": 0}})],
            bin_count: 1,
        };
        assert_eq!(
            packet.encode().unwrap(),
            "51-[\"test\",{\"file\":{\"_placeholder\":true,\"num\":0}}]"
        );
    }

    #[test]
    fn test_sio_encode_connect_with_auth() {
        let packet = SioPacket::Connect {
            nsp: "/admin".into(),
            data: Some(json!({"token": "123"})),
        };
        assert_eq!(packet.encode().unwrap(), "0/admin,{\"token\":\"123\"}");

        let packet = SioPacket::Connect {
            nsp: "/".into(),
            data: None,
        };
        assert_eq!(packet.encode().unwrap(), "0");
    }

    #[test]
    fn test_sio_encode_disconnect() {
        let packet = SioPacket::Disconnect { nsp: "/chat".into() };
        assert_eq!(packet.encode().unwrap(), "1/chat,");
        let packet = SioPacket::Disconnect { nsp: "/".into() };
        assert_eq!(packet.encode().unwrap(), "1");
    }

    #[test]
    fn test_sio_roundtrip() {
        let packets = vec![
            SioPacket::Event {
                nsp: "/updates".into(),
                name: "tick".into(),
                args: vec![EventData::Json(json!(42)), EventData::Json(json!("now"))],
            },
            SioPacket::Connect {
                nsp: "/".into(),
                data: Some(json!({"token": "t"})),
            },
            SioPacket::Disconnect { nsp: "/".into() },
        ];
        for packet in packets {
            let encoded = packet.encode().unwrap();
            assert_eq!(SioPacket::decode(&encoded).unwrap(), packet);
        }
    }
}
