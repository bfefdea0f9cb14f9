//! RFC 6455 client-side WebSocket framing.
//!
//! Outgoing frames are always masked with a fresh 4-byte key. Data
//! payloads above the fragment limit are split across continuation
//! frames; control frames never fragment. The decoder reassembles
//! fragmented messages and surfaces CLOSE/PING/PONG as distinct message
//! kinds so the engine can reply to them.

use std::io::{Read, Write};

use base64::Engine as _;
use rand::RngCore;
use sha1::{Digest, Sha1};
use tracing::debug;

use sockeye_core::constants::{MAX_CONTROL_PAYLOAD, WEBSOCKET_GUID};
use sockeye_core::error::{SioError, SioResult};
use sockeye_core::yeast;

use crate::stream::{is_timeout, ByteStream};

/// Frame opcodes from RFC 6455 §5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Continuation of a fragmented message.
    Continuation = 0x0,
    /// UTF-8 text frame.
    Text = 0x1,
    /// Binary frame.
    Binary = 0x2,
    /// Connection close.
    Close = 0x8,
    /// Ping control frame.
    Ping = 0x9,
    /// Pong control frame.
    Pong = 0xA,
}

impl Opcode {
    /// Parse a 4-bit opcode; reserved opcodes return None.
    pub fn from_u8(value: u8) -> Option<Opcode> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Whether this is a control opcode (high bit of the nibble set).
    pub fn is_control(self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }
}

/// One complete WebSocket message, possibly reassembled from fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsMessage {
    /// A text message.
    Text(String),
    /// A binary message.
    Binary(Vec<u8>),
    /// Connection close with optional status code and reason.
    Close {
        /// Close status code, when the payload carried one.
        code: Option<u16>,
        /// UTF-8 reason text, possibly empty.
        reason: String,
    },
    /// Ping with its application payload.
    Ping(Vec<u8>),
    /// Pong with its application payload.
    Pong(Vec<u8>),
}

/// Client-side frame codec over a byte stream.
///
/// Holds the reassembly state of a fragmented message, so control frames
/// interleaved mid-fragmentation can be surfaced without losing data.
pub struct FrameCodec {
    max_fragment: usize,
    partial: Option<(Opcode, Vec<u8>)>,
}

impl FrameCodec {
    /// Create a codec that fragments data payloads above `max_fragment`.
    pub fn new(max_fragment: usize) -> Self {
        Self {
            max_fragment: max_fragment.max(1),
            partial: None,
        }
    }

    /// Encode a payload into one or more masked frames.
    ///
    /// Data payloads above the fragment limit split into a first frame
    /// carrying the opcode and FIN-terminated continuations. Control
    /// frames never fragment and fail when oversized.
    pub fn encode(&self, opcode: Opcode, payload: &[u8]) -> SioResult<Vec<u8>> {
        if opcode.is_control() && payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(SioError::PayloadTooLarge {
                size: payload.len(),
                limit: MAX_CONTROL_PAYLOAD,
            });
        }

        let mut out = Vec::with_capacity(payload.len() + 16);
        if payload.len() <= self.max_fragment {
            write_frame(&mut out, true, opcode as u8, payload);
            return Ok(out);
        }

        let chunks: Vec<&[u8]> = payload.chunks(self.max_fragment).collect();
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let code = if i == 0 {
                opcode as u8
            } else {
                Opcode::Continuation as u8
            };
            write_frame(&mut out, i == last, code, chunk);
        }
        Ok(out)
    }

    /// Encode and write a payload, returning the number of bytes written.
    pub fn send(
        &self,
        stream: &mut dyn ByteStream,
        opcode: Opcode,
        payload: &[u8],
    ) -> SioResult<usize> {
        let frames = self.encode(opcode, payload)?;
        stream.write_all(&frames).map_err(|e| SioError::socket(&e))?;
        stream.flush().map_err(|e| SioError::socket(&e))?;
        Ok(frames.len())
    }

    /// Read one complete message from the stream.
    ///
    /// A timeout at a frame boundary surfaces as the recoverable
    /// [`SioError::Timeout`]; reassembly state survives it. A timeout
    /// mid-frame means the peer stalled inside a frame and is fatal.
    pub fn read_message(&mut self, stream: &mut dyn ByteStream) -> SioResult<WsMessage> {
        loop {
            let (fin, opcode, payload) = read_frame(stream)?;
            match opcode {
                Opcode::Close => {
                    let (code, reason) = parse_close(&payload);
                    debug!("close frame received (code: {code:?})");
                    return Ok(WsMessage::Close { code, reason });
                }
                Opcode::Ping => return Ok(WsMessage::Ping(payload)),
                Opcode::Pong => return Ok(WsMessage::Pong(payload)),
                Opcode::Continuation => match self.partial.take() {
                    Some((kind, mut buf)) => {
                        buf.extend_from_slice(&payload);
                        if fin {
                            return finish_message(kind, buf);
                        }
                        self.partial = Some((kind, buf));
                    }
                    None => {
                        return Err(SioError::Protocol(
                            "continuation frame without a message in progress".into(),
                        ))
                    }
                },
                Opcode::Text | Opcode::Binary => {
                    if self.partial.is_some() {
                        return Err(SioError::Protocol(
                            "data frame interleaved inside a fragmented message".into(),
                        ));
                    }
                    if fin {
                        return finish_message(opcode, payload);
                    }
                    self.partial = Some((opcode, payload));
                }
            }
        }
    }
}

fn finish_message(kind: Opcode, payload: Vec<u8>) -> SioResult<WsMessage> {
    match kind {
        Opcode::Text => {
            let text = String::from_utf8(payload)
                .map_err(|e| SioError::Protocol(format!("text frame is not utf-8: {e}")))?;
            Ok(WsMessage::Text(text))
        }
        Opcode::Binary => Ok(WsMessage::Binary(payload)),
        other => Err(SioError::Protocol(format!(
            "cannot assemble message from {other:?}"
        ))),
    }
}

fn parse_close(payload: &[u8]) -> (Option<u16>, String) {
    if payload.len() < 2 {
        return (None, String::new());
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
    (Some(code), reason)
}

/// Append one masked frame to `out`.
fn write_frame(out: &mut Vec<u8>, fin: bool, opcode: u8, payload: &[u8]) {
    let b0 = if fin { 0x80 | opcode } else { opcode };
    out.push(b0);

    let len = payload.len();
    if len < 126 {
        out.push(0x80 | len as u8);
    } else if len <= u16::MAX as usize {
        out.push(0x80 | 126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        out.push(0x80 | 127);
        out.extend_from_slice(&(len as u64).to_be_bytes());
    }

    let mut key = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut key);
    out.extend_from_slice(&key);
    out.extend(payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
}

/// Read a single raw frame: (fin, opcode, unmasked payload).
fn read_frame(stream: &mut dyn ByteStream) -> SioResult<(bool, Opcode, Vec<u8>)> {
    let b0 = match read_byte(stream) {
        Ok(b) => b,
        Err(e) => return Err(e),
    };
    if b0 & 0x70 != 0 {
        return Err(SioError::Protocol(format!(
            "reserved frame bits set: {b0:#04x}"
        )));
    }
    let fin = b0 & 0x80 != 0;
    let opcode = Opcode::from_u8(b0 & 0x0F)
        .ok_or_else(|| SioError::Protocol(format!("unknown frame opcode {:#x}", b0 & 0x0F)))?;

    let b1 = read_exact_mid_frame(stream, 1)?[0];
    if b1 & 0x80 != 0 {
        return Err(SioError::Protocol("server frame is masked".into()));
    }
    let len = match b1 & 0x7F {
        126 => {
            let ext = read_exact_mid_frame(stream, 2)?;
            u16::from_be_bytes([ext[0], ext[1]]) as usize
        }
        127 => {
            let ext = read_exact_mid_frame(stream, 8)?;
            let mut eight = [0u8; 8];
            eight.copy_from_slice(&ext);
            let len = u64::from_be_bytes(eight);
            usize::try_from(len)
                .map_err(|_| SioError::Protocol(format!("frame length {len} overflows")))?
        }
        n => n as usize,
    };

    if opcode.is_control() {
        if !fin {
            return Err(SioError::Protocol("fragmented control frame".into()));
        }
        if len > MAX_CONTROL_PAYLOAD {
            return Err(SioError::Protocol(format!(
                "control frame payload of {len} bytes"
            )));
        }
    }

    let payload = read_exact_mid_frame(stream, len)?;
    Ok((fin, opcode, payload))
}

/// Read the first byte of a frame. No data yet is recoverable here.
fn read_byte(stream: &mut dyn ByteStream) -> SioResult<u8> {
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                return Err(SioError::Socket {
                    code: -1,
                    message: "connection closed by server".into(),
                })
            }
            Ok(_) => return Ok(byte[0]),
            Err(e) if is_timeout(&e) => return Err(SioError::Timeout),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SioError::socket(&e)),
        }
    }
}

/// Read exactly `len` bytes inside a frame, where a stall is fatal.
fn read_exact_mid_frame(stream: &mut dyn ByteStream, len: usize) -> SioResult<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(SioError::Socket {
                    code: -1,
                    message: "connection closed mid-frame".into(),
                })
            }
            Ok(n) => filled += n,
            Err(e) if is_timeout(&e) => {
                return Err(SioError::Protocol("stream stalled mid-frame".into()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SioError::socket(&e)),
        }
    }
    Ok(buf)
}

/// Generate the Sec-WebSocket-Key value.
///
/// Modern servers get the base64 of 16 random bytes; legacy servers get a
/// truncated SHA-1 digest of a unique string.
pub fn handshake_key(legacy: bool) -> String {
    let engine = base64::engine::general_purpose::STANDARD;
    if legacy {
        let mut unique = yeast::yeast().into_bytes();
        let mut noise = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut noise);
        unique.extend_from_slice(&noise);
        let digest = Sha1::digest(&unique);
        engine.encode(&digest[..16])
    } else {
        let mut key = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut key);
        engine.encode(key)
    }
}

/// The Sec-WebSocket-Accept value a compliant server must answer with.
pub fn accept_for_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WEBSOCKET_GUID.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor, Read};
    use std::time::Duration;

    struct MockStream {
        reads: Cursor<Vec<u8>>,
    }

    impl MockStream {
        fn new(script: Vec<u8>) -> Self {
            Self {
                reads: Cursor::new(script),
            }
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.reads.read(buf)?;
            if n == 0 {
                // Exhausted script behaves like a quiet socket.
                return Err(io::Error::new(io::ErrorKind::WouldBlock, "no data"));
            }
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl ByteStream for MockStream {
        fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
            Ok(())
        }
    }

    /// Build an unmasked server frame.
    fn server_frame(fin: bool, opcode: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![if fin { 0x80 | opcode } else { opcode }];
        let len = payload.len();
        if len < 126 {
            out.push(len as u8);
        } else if len <= u16::MAX as usize {
            out.push(126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        } else {
            out.push(127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
        out.extend_from_slice(payload);
        out
    }

    /// Parse client frames out of an encoded byte run, unmasking payloads.
    fn parse_client_frames(mut bytes: &[u8]) -> Vec<(bool, u8, Vec<u8>)> {
        let mut frames = Vec::new();
        while !bytes.is_empty() {
            let b0 = bytes[0];
            let b1 = bytes[1];
            assert_eq!(b1 & 0x80, 0x80, "client frame must be masked");
            let (len, mut off) = match b1 & 0x7F {
                126 => (
                    u16::from_be_bytes([bytes[2], bytes[3]]) as usize,
                    4usize,
                ),
                127 => (
                    u64::from_be_bytes(bytes[2..10].try_into().unwrap()) as usize,
                    10usize,
                ),
                n => (n as usize, 2usize),
            };
            let key: [u8; 4] = bytes[off..off + 4].try_into().unwrap();
            off += 4;
            let payload: Vec<u8> = bytes[off..off + len]
                .iter()
                .enumerate()
                .map(|(i, b)| b ^ key[i % 4])
                .collect();
            frames.push((b0 & 0x80 != 0, b0 & 0x0F, payload));
            bytes = &bytes[off + len..];
        }
        frames
    }

    #[test]
    fn test_encode_masks_and_roundtrips() {
        let codec = FrameCodec::new(1024);
        let encoded = codec.encode(Opcode::Text, b"hello frame").unwrap();
        let frames = parse_client_frames(&encoded);
        assert_eq!(frames.len(), 1);
        let (fin, opcode, payload) = &frames[0];
        assert!(*fin);
        assert_eq!(*opcode, 0x1);
        assert_eq!(payload, b"hello frame");
    }

    #[test]
    fn test_encode_fragments_large_payload() {
        let codec = FrameCodec::new(4);
        let encoded = codec.encode(Opcode::Binary, b"0123456789").unwrap();
        let frames = parse_client_frames(&encoded);
        assert_eq!(frames.len(), 3);

        assert_eq!(frames[0], (false, 0x2, b"0123".to_vec()));
        assert_eq!(frames[1], (false, 0x0, b"4567".to_vec()));
        assert_eq!(frames[2], (true, 0x0, b"89".to_vec()));
    }

    #[test]
    fn test_encode_extended_length_forms() {
        let codec = FrameCodec::new(usize::MAX);
        let payload = vec![7u8; 300];
        let encoded = codec.encode(Opcode::Binary, &payload).unwrap();
        // 126 marker with masked bit.
        assert_eq!(encoded[1] & 0x7F, 126);
        let frames = parse_client_frames(&encoded);
        assert_eq!(frames[0].2.len(), 300);

        let payload = vec![7u8; 70_000];
        let encoded = codec.encode(Opcode::Binary, &payload).unwrap();
        assert_eq!(encoded[1] & 0x7F, 127);
    }

    #[test]
    fn test_oversized_control_frame_rejected() {
        let codec = FrameCodec::new(usize::MAX);
        let payload = vec![0u8; 200];
        assert!(matches!(
            codec.encode(Opcode::Ping, &payload),
            Err(SioError::PayloadTooLarge { size: 200, .. })
        ));
    }

    #[test]
    fn test_read_text_message() {
        let mut stream = MockStream::new(server_frame(true, 0x1, b"42[\"x\",1]"));
        let mut codec = FrameCodec::new(1024);
        assert_eq!(
            codec.read_message(&mut stream).unwrap(),
            WsMessage::Text("42[\"x\",1]".into())
        );
    }

    #[test]
    fn test_read_fragmented_message() {
        let mut script = server_frame(false, 0x1, b"hel");
        script.extend(server_frame(false, 0x0, b"lo "));
        script.extend(server_frame(true, 0x0, b"world"));
        let mut stream = MockStream::new(script);
        let mut codec = FrameCodec::new(1024);
        assert_eq!(
            codec.read_message(&mut stream).unwrap(),
            WsMessage::Text("hello world".into())
        );
    }

    #[test]
    fn test_control_frame_interleaved_in_fragments() {
        let mut script = server_frame(false, 0x2, b"part1");
        script.extend(server_frame(true, 0x9, b"hb"));
        script.extend(server_frame(true, 0x0, b"part2"));
        let mut stream = MockStream::new(script);
        let mut codec = FrameCodec::new(1024);

        assert_eq!(
            codec.read_message(&mut stream).unwrap(),
            WsMessage::Ping(b"hb".to_vec())
        );
        assert_eq!(
            codec.read_message(&mut stream).unwrap(),
            WsMessage::Binary(b"part1part2".to_vec())
        );
    }

    #[test]
    fn test_masked_server_frame_is_protocol_error() {
        // Second byte has the mask bit set.
        let script = vec![0x81, 0x81, 1, 2, 3, 4, b'x'];
        let mut stream = MockStream::new(script);
        let mut codec = FrameCodec::new(1024);
        assert!(matches!(
            codec.read_message(&mut stream),
            Err(SioError::Protocol(_))
        ));
    }

    #[test]
    fn test_close_frame_parsing() {
        let mut payload = 1000u16.to_be_bytes().to_vec();
        payload.extend_from_slice(b"going away");
        let mut stream = MockStream::new(server_frame(true, 0x8, &payload));
        let mut codec = FrameCodec::new(1024);
        assert_eq!(
            codec.read_message(&mut stream).unwrap(),
            WsMessage::Close {
                code: Some(1000),
                reason: "going away".into()
            }
        );
    }

    #[test]
    fn test_quiet_stream_surfaces_timeout() {
        let mut stream = MockStream::new(Vec::new());
        let mut codec = FrameCodec::new(1024);
        assert!(matches!(
            codec.read_message(&mut stream),
            Err(SioError::Timeout)
        ));
    }

    #[test]
    fn test_handshake_keys_are_distinct() {
        assert_ne!(handshake_key(false), handshake_key(false));
        assert_ne!(handshake_key(true), handshake_key(true));
        // Both derivations produce base64 of 16 bytes.
        assert_eq!(handshake_key(false).len(), 24);
        assert_eq!(handshake_key(true).len(), 24);
    }

    #[test]
    fn test_accept_for_key_rfc_vector() {
        // Sample exchange from RFC 6455 §1.3.
        assert_eq!(
            accept_for_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }
}
