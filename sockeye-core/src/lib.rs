//! Sockeye Core - Foundation types for the Socket.IO client stack.
//!
//! This crate provides the shared foundation used by the transport and
//! client crates:
//! - Client options, TLS context, and protocol dialect descriptors
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - The yeast monotonic timestamp encoder
//! - Common constants

pub mod constants;
pub mod error;
pub mod logging;
pub mod options;
pub mod yeast;

// Re-export commonly used items at the crate root
pub use error::{SioError, SioResult};
pub use logging::init_logging;
pub use options::{Dialect, Options, TlsContext, Transport, Version};
pub use yeast::yeast;
