//! Sockeye Transport - Byte-level plumbing for the Socket.IO client.
//!
//! This crate provides the three layers underneath the protocol stack:
//! - TCP/TLS byte streams with read timeouts behind a dialer seam
//! - A one-shot HTTP requester used for long-polling and the upgrade
//! - RFC 6455 client-side WebSocket framing (masking, fragmentation,
//!   control frames)

pub mod http;
pub mod stream;
pub mod ws;

// Re-export key types
pub use http::{Request, Response};
pub use stream::{ByteStream, Dialer, NetStream, TcpDialer};
pub use ws::{FrameCodec, Opcode, WsMessage};
