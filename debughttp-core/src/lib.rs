//! Debug HTTP Core Library
//!
//! Diagnostic instrumentation for outbound HTTP. A [`DebugTransport`] sits
//! between a client and its real transport, dumps each request and response
//! through a logging sink, and redacts authorization headers in the dump.
//!
//! ```no_run
//! # async fn run() -> debughttp_core::Result<()> {
//! use debughttp_core::{new_client, DumpFlags, Options};
//!
//! let client = new_client(Some(Options::new(DumpFlags::HEADERS)));
//! let response = client.get("http://example.com/").await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```

/// Body types used on both sides of the transport
pub mod body;
pub mod client;
/// Configuration types and utilities
pub mod config;
mod connect;
pub mod dump;
/// Error types for debug transport operations
pub mod error;
pub mod flags;
/// Default network transport
pub mod http_transport;
/// Sensitive header redaction
pub mod redact;
/// Interception layer
pub mod transport;

pub use body::DebugBody;
pub use client::DebugClient;
pub use config::{Logf, Options, DEFAULT_AUTH};
pub use error::{BoxError, ConfigError, ConnectError, DebugHttpError, DumpError, FlagsParseError, TransportError};
pub use flags::DumpFlags;
pub use http_transport::{mirror_settings, HttpTransport, ProxyFn, TransportSettings, DEFAULT_TRANSPORT};
pub use redact::{redact_all, redact_one};
pub use transport::{DebugLayer, DebugTransport};

/// Result type alias for debug transport operations
pub type Result<T> = std::result::Result<T, DebugHttpError>;

/// Debug transport over a fresh transport seeded from [`DEFAULT_TRANSPORT`]
pub fn new_default(options: Option<Options>) -> DebugTransport<HttpTransport> {
    DebugTransport::new(options, HttpTransport::seeded_from(&DEFAULT_TRANSPORT))
}

/// Client whose transport is [`new_default`]
pub fn new_client(options: Option<Options>) -> DebugClient {
    DebugClient::from_transport(new_default(options))
}
