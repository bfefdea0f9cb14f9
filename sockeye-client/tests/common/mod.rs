//! Shared test utilities for integration tests.
//!
//! Scripted in-memory byte streams stand in for the network: each dial
//! hands out the next prepared response script and records everything
//! the client writes to it.

use std::collections::VecDeque;
use std::io::{self, Cursor, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sockeye_core::error::{SioError, SioResult};
use sockeye_transport::stream::{ByteStream, Dialer};

/// One scripted stream: reads come from the script, writes are recorded.
pub struct ScriptedStream {
    reads: Cursor<Vec<u8>>,
    writes: Arc<Mutex<Vec<u8>>>,
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reads.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStream for ScriptedStream {
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> io::Result<()> {
        Ok(())
    }
}

/// Observer over everything written to the dialed streams.
#[derive(Clone)]
pub struct DialLog {
    streams: Arc<Mutex<Vec<Arc<Mutex<Vec<u8>>>>>>,
}

impl DialLog {
    /// How many streams were dialed so far.
    pub fn dial_count(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    /// Everything written to the i-th dialed stream.
    pub fn written(&self, index: usize) -> Vec<u8> {
        self.streams.lock().unwrap()[index].lock().unwrap().clone()
    }

    /// Written bytes of the i-th stream as text. Bytes after the HTTP
    /// request (e.g. masked WebSocket frames written post-upgrade) are not
    /// guaranteed to be valid UTF-8, so this decodes lossily; assertions
    /// only ever inspect the textual HTTP request portion.
    pub fn written_text(&self, index: usize) -> String {
        String::from_utf8_lossy(&self.written(index)).into_owned()
    }
}

/// Dialer handing out one prepared script per dial.
pub struct ScriptedDialer {
    scripts: VecDeque<Vec<u8>>,
    log: DialLog,
}

impl ScriptedDialer {
    /// Prepare a dialer with one read script per expected dial.
    pub fn new(scripts: Vec<Vec<u8>>) -> (ScriptedDialer, DialLog) {
        let log = DialLog {
            streams: Arc::new(Mutex::new(Vec::new())),
        };
        (
            ScriptedDialer {
                scripts: scripts.into(),
                log: log.clone(),
            },
            log,
        )
    }
}

impl Dialer for ScriptedDialer {
    fn dial(&mut self, _host: &str, _port: u16, _secure: bool) -> SioResult<Box<dyn ByteStream>> {
        let script = self.scripts.pop_front().ok_or_else(|| SioError::Socket {
            code: -1,
            message: "test script has no stream for this dial".into(),
        })?;
        let writes = Arc::new(Mutex::new(Vec::new()));
        self.log.streams.lock().unwrap().push(writes.clone());
        Ok(Box::new(ScriptedStream {
            reads: Cursor::new(script),
            writes,
        }))
    }
}

/// A 200 response with the given body.
pub fn http_ok(body: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=UTF-8\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    )
    .into_bytes()
}

/// A 200 response that also sets cookies.
pub fn http_ok_with_cookies(body: &str, cookies: &[&str]) -> Vec<u8> {
    let mut head = String::from("HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=UTF-8\r\n");
    for cookie in cookies {
        head.push_str(&format!("Set-Cookie: {cookie}\r\n"));
    }
    head.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    head.into_bytes()
}

/// An arbitrary-status response with an empty body.
pub fn http_status(status: u16, reason: &str) -> Vec<u8> {
    format!("HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\n\r\n").into_bytes()
}

/// The 101 upgrade response followed by scripted server frames.
pub fn upgrade_response(frames: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out =
        b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n"
            .to_vec();
    for frame in frames {
        out.extend_from_slice(&frame);
    }
    out
}

/// An unmasked server-to-client text frame.
pub fn text_frame(payload: &str) -> Vec<u8> {
    server_frame(0x1, payload.as_bytes())
}

/// An unmasked server-to-client binary frame.
pub fn binary_frame(payload: &[u8]) -> Vec<u8> {
    server_frame(0x2, payload)
}

fn server_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x80 | opcode];
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

/// Parse the client's writes on an upgraded stream: skips the HTTP
/// request block, then unmasks each frame into (opcode, payload).
pub fn client_frames(written: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let request_end = written
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no request header terminator")
        + 4;
    let mut bytes = &written[request_end..];
    let mut frames = Vec::new();
    while !bytes.is_empty() {
        let b0 = bytes[0];
        let b1 = bytes[1];
        assert_eq!(b1 & 0x80, 0x80, "client frame must be masked");
        let (len, mut offset) = match b1 & 0x7F {
            126 => (u16::from_be_bytes([bytes[2], bytes[3]]) as usize, 4usize),
            127 => (
                u64::from_be_bytes(bytes[2..10].try_into().unwrap()) as usize,
                10usize,
            ),
            n => (n as usize, 2usize),
        };
        let key: [u8; 4] = bytes[offset..offset + 4].try_into().unwrap();
        offset += 4;
        let payload: Vec<u8> = bytes[offset..offset + len]
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % 4])
            .collect();
        frames.push((b0 & 0x0F, payload));
        bytes = &bytes[offset + len..];
    }
    frames
}

/// Frame payloads decoded as text, for quick assertions.
pub fn client_frame_texts(written: &[u8]) -> Vec<String> {
    client_frames(written)
        .into_iter()
        .map(|(_, payload)| String::from_utf8_lossy(&payload).into_owned())
        .collect()
}

/// The standard EIO 4 handshake body.
pub fn handshake_body(sid: &str) -> String {
    format!(
        "0{{\"sid\":\"{sid}\",\"upgrades\":[\"websocket\"],\"pingInterval\":25000,\"pingTimeout\":20000}}"
    )
}
