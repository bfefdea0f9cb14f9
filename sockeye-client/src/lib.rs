//! Sockeye Client - a Socket.IO client over the Engine.IO transport.
//!
//! This crate implements the protocol stack:
//! - Engine.IO packet layer with both polling-body framing dialects
//! - Socket.IO packet codec, including binary events with attachment
//!   placeholders and re-assembly
//! - The connection engine: polling handshake, namespace connect,
//!   WebSocket upgrade, opportunistic heartbeat
//! - The blocking session facade: `connect`, `of`, `emit`, `wait`,
//!   `drain`, `close`
//!
//! ## Example
//!
//! ```no_run
//! use sockeye_client::{Client, EventData};
//! use sockeye_core::{Options, Version};
//!
//! # fn main() -> sockeye_core::SioResult<()> {
//! let mut client = Client::new(Version::V4X, "http://localhost:3000", Options::default())?;
//! client.connect()?;
//! client.emit("greet", vec![EventData::from("hello")])?;
//! let reply = client.wait("greeting")?;
//! println!("{reply:?}");
//! client.close()?;
//! # Ok(())
//! # }
//! ```

pub mod attachments;
pub mod engine;
pub mod packet;
pub mod session;

// Re-export key types
pub use attachments::EventData;
pub use engine::{Engine, Session};
pub use packet::{EioPacket, Handshake, SioPacket};
pub use session::{Client, Drained};
