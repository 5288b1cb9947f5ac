//! Error types for debug transport operations

use std::time::Duration;
use thiserror::Error;

/// Boxed error used for body and connector failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for the crate's fallible entry points
#[derive(Debug, Error)]
pub enum DebugHttpError {
    /// The underlying transport failed the round trip
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A request could not be built
    #[error("Invalid request: {0}")]
    Request(#[from] http::Error),
}

/// Errors returned by [`HttpTransport`](crate::HttpTransport)
#[derive(Debug, Error)]
pub enum TransportError {
    /// Error from the pooled hyper client, including connector failures
    #[error("HTTP client error: {}", source_chain(.0))]
    Client(#[from] hyper_util::client::legacy::Error),
    /// No response headers arrived within the configured limit
    #[error("Timed out after {0:?} waiting for response headers")]
    ResponseHeaderTimeout(Duration),
}

/// Renders `err` and each source whose text the message doesn't already end with
pub(crate) fn source_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

/// Errors raised while establishing a connection
#[derive(Debug, Error)]
pub enum ConnectError {
    /// TCP connection to the target or proxy failed
    #[error("Dial failed: {0}")]
    Dial(#[source] BoxError),
    /// The URI has no host to connect to
    #[error("URI has no host")]
    MissingHost,
    /// An https URI was requested but the transport has no TLS configuration
    #[error("TLS is not configured for this transport")]
    TlsNotConfigured,
    /// The host is not a valid TLS server name
    #[error("Invalid TLS server name: {0}")]
    InvalidServerName(String),
    /// TLS handshake did not finish in time
    #[error("TLS handshake timed out after {0:?}")]
    TlsHandshakeTimeout(Duration),
    /// TLS handshake failed
    #[error("TLS handshake failed: {0}")]
    Tls(#[source] std::io::Error),
    /// I/O failure while talking to a proxy
    #[error("Proxy I/O error: {0}")]
    ProxyIo(#[from] std::io::Error),
    /// The proxy refused or mangled the CONNECT tunnel
    #[error("Proxy tunnel failed: {0}")]
    ProxyTunnel(String),
}

/// Failure producing the diagnostic dump of a message
#[derive(Debug, Error)]
pub enum DumpError {
    /// The body stream failed while being buffered for the dump
    #[error("failed to read body: {0}")]
    Body(#[source] BoxError),
}

/// Unknown name in a dump flag list
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dump flag {name:?} (expected headers, bodies, requests, responses or auth)")]
pub struct FlagsParseError {
    /// The offending name as written
    pub name: String,
}

/// Errors loading [`Options`](crate::Options) from the environment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A flag list variable held an unknown flag
    #[error("Invalid value for {var}: {source}")]
    InvalidFlags {
        var: &'static str,
        source: FlagsParseError,
    },
    /// A header list variable held an empty or malformed header name
    #[error("Invalid header name {name:?} in {var}")]
    InvalidHeaderName { var: &'static str, name: String },
}
