//! One-shot HTTP request/response over a byte stream.
//!
//! Long-polling and the WebSocket upgrade both ride on this requester.
//! It writes one request, then parses status line, headers, and body from
//! the same stream. The `skip_body` mode stops right after the header
//! terminator, which the 101 upgrade response requires: everything after
//! it belongs to the WebSocket framing layer.

use std::io::{Read, Write};

use tracing::debug;

use sockeye_core::error::{SioError, SioResult};

use crate::stream::{is_timeout, ByteStream};

/// Upper bound on the status line + headers block.
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// A single outgoing HTTP request.
pub struct Request<'a> {
    /// HTTP method, e.g. "GET" or "POST".
    pub method: &'a str,
    /// Value for the Host header (`host` or `host:port`).
    pub host: &'a str,
    /// Request target: path plus query string.
    pub target: &'a str,
    /// Additional headers in order.
    pub headers: &'a [(String, String)],
    /// Optional request body; adds a Content-Length header.
    pub body: Option<&'a [u8]>,
    /// Connection header value: "close", "keep-alive", or "Upgrade".
    pub connection: &'a str,
}

/// A parsed HTTP response.
#[derive(Debug)]
pub struct Response {
    /// Status code from the status line.
    pub status: u16,
    /// Header name/value pairs in arrival order.
    pub headers: Vec<(String, String)>,
    /// Response body (empty when `skip_body` was requested).
    pub body: Vec<u8>,
}

impl Response {
    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All `Set-Cookie` values, trimmed to the `name=value` part.
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case("set-cookie"))
            .map(|(_, v)| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }

    /// Whether the server asked to close the connection.
    pub fn connection_close(&self) -> bool {
        self.header("connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> SioResult<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|e| SioError::Protocol(format!("response body is not utf-8: {e}")))
    }
}

/// Send one request and parse the response from the same stream.
///
/// With `skip_body` the read stops at the end of the header block; the
/// stream is positioned at the first byte after it.
pub fn roundtrip(
    stream: &mut dyn ByteStream,
    req: &Request<'_>,
    skip_body: bool,
) -> SioResult<Response> {
    write_request(stream, req)?;

    let head = read_head(stream)?;
    let (status, headers) = parse_head(&head)?;
    debug!("http {} {} -> {status}", req.method, req.target);

    let body = if skip_body {
        Vec::new()
    } else if let Some(len) = content_length(&headers)? {
        read_exact(stream, len)?
    } else if is_chunked(&headers) {
        read_chunked(stream)?
    } else {
        read_to_close(stream)?
    };

    Ok(Response {
        status,
        headers,
        body,
    })
}

fn write_request(stream: &mut dyn ByteStream, req: &Request<'_>) -> SioResult<()> {
    let mut out = Vec::with_capacity(256 + req.body.map_or(0, <[u8]>::len));
    out.extend_from_slice(
        format!("{} {} HTTP/1.1\r\n", req.method, req.target).as_bytes(),
    );
    out.extend_from_slice(format!("Host: {}\r\n", req.host).as_bytes());
    for (name, value) in req.headers {
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    out.extend_from_slice(format!("Connection: {}\r\n", req.connection).as_bytes());
    if let Some(body) = req.body {
        out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    if let Some(body) = req.body {
        out.extend_from_slice(body);
    }

    stream.write_all(&out).map_err(|e| SioError::socket(&e))?;
    stream.flush().map_err(|e| SioError::socket(&e))?;
    Ok(())
}

/// Read up to and including the `\r\n\r\n` header terminator, one byte at
/// a time so nothing past the header block is consumed.
fn read_head(stream: &mut dyn ByteStream) -> SioResult<Vec<u8>> {
    let mut head = Vec::with_capacity(512);
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                return Err(SioError::Protocol(
                    "connection closed before response headers".into(),
                ))
            }
            Ok(_) => head.push(byte[0]),
            Err(e) if is_timeout(&e) => return Err(SioError::Timeout),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SioError::socket(&e)),
        }
        if head.ends_with(b"\r\n\r\n") {
            return Ok(head);
        }
        if head.len() > MAX_HEADER_BYTES {
            return Err(SioError::Protocol("response header block too large".into()));
        }
    }
}

fn parse_head(head: &[u8]) -> SioResult<(u16, Vec<(String, String)>)> {
    let text = std::str::from_utf8(head)
        .map_err(|_| SioError::Protocol("response headers are not utf-8".into()))?;
    let mut lines = text.split("\r\n");

    let status_line = lines
        .next()
        .ok_or_else(|| SioError::Protocol("empty response".into()))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/") {
        return Err(SioError::Protocol(format!(
            "malformed status line: {status_line}"
        )));
    }
    let status: u16 = parts
        .next()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SioError::Protocol(format!("malformed status line: {status_line}")))?;

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| SioError::Protocol(format!("malformed header line: {line}")))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok((status, headers))
}

fn content_length(headers: &[(String, String)]) -> SioResult<Option<usize>> {
    match headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
    {
        Some((_, v)) => v
            .parse()
            .map(Some)
            .map_err(|_| SioError::Protocol(format!("bad content-length: {v}"))),
        None => Ok(None),
    }
}

fn is_chunked(headers: &[(String, String)]) -> bool {
    headers
        .iter()
        .any(|(n, v)| n.eq_ignore_ascii_case("transfer-encoding") && v.to_ascii_lowercase().contains("chunked"))
}

fn read_exact(stream: &mut dyn ByteStream, len: usize) -> SioResult<Vec<u8>> {
    let mut body = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match stream.read(&mut body[filled..]) {
            Ok(0) => {
                return Err(SioError::Protocol(format!(
                    "connection closed mid-body ({filled}/{len} bytes)"
                )))
            }
            Ok(n) => filled += n,
            Err(e) if is_timeout(&e) => return Err(SioError::Timeout),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SioError::socket(&e)),
        }
    }
    Ok(body)
}

fn read_chunked(stream: &mut dyn ByteStream) -> SioResult<Vec<u8>> {
    let mut body = Vec::new();
    loop {
        let size_line = read_line(stream)?;
        let size = usize::from_str_radix(size_line.trim(), 16)
            .map_err(|_| SioError::Protocol(format!("bad chunk size: {size_line}")))?;
        if size == 0 {
            // Trailing CRLF after the last chunk.
            read_line(stream)?;
            return Ok(body);
        }
        let chunk = read_exact(stream, size)?;
        body.extend_from_slice(&chunk);
        read_line(stream)?;
    }
}

fn read_line(stream: &mut dyn ByteStream) -> SioResult<String> {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => return Err(SioError::Protocol("connection closed mid-chunk".into())),
            Ok(_) => {
                if byte[0] == b'\n' {
                    break;
                }
                if byte[0] != b'\r' {
                    line.push(byte[0]);
                }
            }
            Err(e) if is_timeout(&e) => return Err(SioError::Timeout),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SioError::socket(&e)),
        }
        if line.len() > MAX_HEADER_BYTES {
            return Err(SioError::Protocol("chunk size line too long".into()));
        }
    }
    String::from_utf8(line).map_err(|_| SioError::Protocol("chunk size line not utf-8".into()))
}

/// Read until the server closes the connection or the stream times out.
/// A timeout here ends the body rather than failing: servers on EIO 2
/// polling close bodies by going quiet.
fn read_to_close(stream: &mut dyn ByteStream) -> SioResult<Vec<u8>> {
    let mut body = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return Ok(body),
            Ok(n) => body.extend_from_slice(&buf[..n]),
            Err(e) if is_timeout(&e) => return Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SioError::socket(&e)),
        }
    }
}
