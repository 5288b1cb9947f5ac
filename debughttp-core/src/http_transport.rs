//! Default network transport
//!
//! [`HttpTransport`] is a pooled hyper client with a connector honouring
//! [`TransportSettings`]. [`DEFAULT_TRANSPORT`] is the reference instance new
//! transports are seeded from.

use crate::body::DebugBody;
use crate::connect::Dialer;
use crate::error::TransportError;
use http::uri::Scheme;
use http::{Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use lazy_static::lazy_static;
use rustls::{ClientConfig, RootCertStore};
use std::fmt;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;
use tracing::{debug, warn};
use wildmatch::WildMatch;

/// Picks the proxy for a request URI, `None` to connect directly
pub type ProxyFn = Arc<dyn Fn(&Uri) -> Option<Uri> + Send + Sync>;

/// Smallest read buffer hyper accepts for HTTP/1 connections
const MIN_HEADER_BUF: usize = 8192;

lazy_static! {
    /// Reference transport with conventional defaults.
    ///
    /// Never reconfigured. Use [`HttpTransport::seeded_from`] to get a
    /// transport with the same settings and its own connection pool.
    pub static ref DEFAULT_TRANSPORT: HttpTransport = HttpTransport::new(TransportSettings::default());
}

/// Public configuration of an [`HttpTransport`]
pub struct TransportSettings {
    /// Proxy selection, `None` to always connect directly
    pub proxy: Option<ProxyFn>,
    /// TCP connect timeout
    pub connect_timeout: Option<Duration>,
    /// TCP keepalive interval
    pub tcp_keepalive: Option<Duration>,
    pub tcp_nodelay: bool,
    /// Delay before racing the next address family when dialing
    pub happy_eyeballs_timeout: Option<Duration>,
    /// TLS client configuration, `None` disables https
    pub tls_config: Option<Arc<ClientConfig>>,
    pub tls_handshake_timeout: Option<Duration>,
    /// Close connections after each request instead of pooling them
    pub disable_keep_alives: bool,
    pub max_idle_conns_per_host: usize,
    /// How long an idle pooled connection is kept
    pub idle_conn_timeout: Option<Duration>,
    /// Limit on the wait for response headers once the request is sent
    pub response_header_timeout: Option<Duration>,
    /// Speak HTTP/2 without negotiation
    pub http2_only: bool,
    /// Upper bound on response header bytes for HTTP/1, at least 8 KiB
    pub max_response_header_bytes: Option<usize>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            proxy: Some(proxy_from_environment()),
            connect_timeout: Some(Duration::from_secs(30)),
            tcp_keepalive: Some(Duration::from_secs(30)),
            tcp_nodelay: true,
            happy_eyeballs_timeout: Some(Duration::from_millis(300)),
            tls_config: default_tls_config(),
            tls_handshake_timeout: Some(Duration::from_secs(10)),
            disable_keep_alives: false,
            max_idle_conns_per_host: 100,
            idle_conn_timeout: Some(Duration::from_secs(90)),
            response_header_timeout: None,
            http2_only: false,
            max_response_header_bytes: None,
        }
    }
}

impl fmt::Debug for TransportSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSettings")
            .field("proxy", &self.proxy.is_some())
            .field("connect_timeout", &self.connect_timeout)
            .field("tcp_keepalive", &self.tcp_keepalive)
            .field("tcp_nodelay", &self.tcp_nodelay)
            .field("happy_eyeballs_timeout", &self.happy_eyeballs_timeout)
            .field("tls_config", &self.tls_config.is_some())
            .field("tls_handshake_timeout", &self.tls_handshake_timeout)
            .field("disable_keep_alives", &self.disable_keep_alives)
            .field("max_idle_conns_per_host", &self.max_idle_conns_per_host)
            .field("idle_conn_timeout", &self.idle_conn_timeout)
            .field("response_header_timeout", &self.response_header_timeout)
            .field("http2_only", &self.http2_only)
            .field("max_response_header_bytes", &self.max_response_header_bytes)
            .finish()
    }
}

/// Copies every public setting of `reference`.
///
/// The proxy function and TLS configuration are shared, not rebuilt.
/// Connection pools live in [`HttpTransport`], never here, so nothing tied to
/// the reference's lifetime is carried over.
pub fn mirror_settings(reference: &TransportSettings) -> TransportSettings {
    TransportSettings {
        proxy: reference.proxy.clone(),
        connect_timeout: reference.connect_timeout,
        tcp_keepalive: reference.tcp_keepalive,
        tcp_nodelay: reference.tcp_nodelay,
        happy_eyeballs_timeout: reference.happy_eyeballs_timeout,
        tls_config: reference.tls_config.clone(),
        tls_handshake_timeout: reference.tls_handshake_timeout,
        disable_keep_alives: reference.disable_keep_alives,
        max_idle_conns_per_host: reference.max_idle_conns_per_host,
        idle_conn_timeout: reference.idle_conn_timeout,
        response_header_timeout: reference.response_header_timeout,
        http2_only: reference.http2_only,
        max_response_header_bytes: reference.max_response_header_bytes,
    }
}

fn default_tls_config() -> Option<Arc<ClientConfig>> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    match ClientConfig::builder_with_provider(provider).with_safe_default_protocol_versions() {
        Ok(builder) => {
            let mut config = builder
                .with_root_certificates(roots)
                .with_no_client_auth();
            config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
            Some(Arc::new(config))
        }
        Err(e) => {
            warn!("TLS disabled, could not build client config: {}", e);
            None
        }
    }
}

/// Pooled HTTP/1 and HTTP/2 transport
#[derive(Clone)]
pub struct HttpTransport {
    settings: Arc<TransportSettings>,
    client: Client<Dialer, DebugBody>,
}

impl HttpTransport {
    pub fn new(settings: TransportSettings) -> Self {
        let mut builder = Client::builder(TokioExecutor::new());
        builder
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(settings.idle_conn_timeout)
            .pool_max_idle_per_host(if settings.disable_keep_alives {
                0
            } else {
                settings.max_idle_conns_per_host
            })
            .http2_only(settings.http2_only);
        if let Some(max) = settings.max_response_header_bytes {
            builder.http1_max_buf_size(max.max(MIN_HEADER_BUF));
        }

        let client = builder.build(Dialer::new(&settings));
        Self {
            settings: Arc::new(settings),
            client,
        }
    }

    /// A transport with the same settings as `reference` and a fresh pool
    pub fn seeded_from(reference: &HttpTransport) -> Self {
        Self::new(mirror_settings(reference.settings()))
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::seeded_from(&DEFAULT_TRANSPORT)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Service<Request<DebugBody>> for HttpTransport {
    type Response = Response<Incoming>;
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<DebugBody>) -> Self::Future {
        let response = self.client.request(req);
        let limit = self.settings.response_header_timeout;

        Box::pin(async move {
            match limit {
                Some(limit) => tokio::time::timeout(limit, response)
                    .await
                    .map_err(|_| TransportError::ResponseHeaderTimeout(limit))?
                    .map_err(TransportError::from),
                None => response.await.map_err(TransportError::from),
            }
        })
    }
}

/// Proxy function reading `HTTP_PROXY`, `HTTPS_PROXY` and `NO_PROXY`.
///
/// Upper-case names win over lower-case ones. The variables are read once,
/// when this is called. Loopback hosts never use a proxy.
pub fn proxy_from_environment() -> ProxyFn {
    let env = EnvProxy::from_vars(|var| std::env::var(var).ok());
    Arc::new(move |uri: &Uri| env.proxy_for(uri))
}

#[derive(Debug)]
pub(crate) struct EnvProxy {
    http: Option<Uri>,
    https: Option<Uri>,
    no_proxy: Vec<String>,
}

impl EnvProxy {
    pub(crate) fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |upper: &str, lower: &str| {
            lookup(upper)
                .or_else(|| lookup(lower))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            http: get("HTTP_PROXY", "http_proxy").and_then(|raw| parse_proxy(&raw)),
            https: get("HTTPS_PROXY", "https_proxy").and_then(|raw| parse_proxy(&raw)),
            no_proxy: get("NO_PROXY", "no_proxy")
                .map(|raw| {
                    raw.split(',')
                        .map(|entry| entry.trim().to_ascii_lowercase())
                        .filter(|entry| !entry.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub(crate) fn proxy_for(&self, uri: &Uri) -> Option<Uri> {
        let proxy = match uri.scheme() {
            Some(scheme) if *scheme == Scheme::HTTPS => self.https.as_ref(),
            Some(scheme) if *scheme == Scheme::HTTP => self.http.as_ref(),
            _ => None,
        }?;

        let host = uri
            .host()?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();
        if is_loopback(&host) || self.bypass(&host, uri.port_u16()) {
            debug!("Not proxying {}", uri);
            return None;
        }
        Some(proxy.clone())
    }

    fn bypass(&self, host: &str, port: Option<u16>) -> bool {
        self.no_proxy.iter().any(|entry| {
            if entry == "*" {
                return true;
            }
            let (pattern, entry_port) = split_port(entry);
            if entry_port.is_some() && entry_port != port {
                return false;
            }
            if pattern.contains('*') {
                return WildMatch::new(pattern).matches(host);
            }
            let pattern = pattern.trim_start_matches('.');
            host == pattern || host.ends_with(&format!(".{}", pattern))
        })
    }
}

fn parse_proxy(raw: &str) -> Option<Uri> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    match with_scheme.parse::<Uri>() {
        Ok(uri) if uri.host().is_some() => Some(uri),
        _ => {
            warn!("Ignoring invalid proxy URL {:?}", raw);
            None
        }
    }
}

fn split_port(entry: &str) -> (&str, Option<u16>) {
    match entry.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') || host.ends_with(']') => match port.parse() {
            Ok(port) => (host.trim_start_matches('[').trim_end_matches(']'), Some(port)),
            Err(_) => (entry, None),
        },
        _ => (entry, None),
    }
}

fn is_loopback(host: &str) -> bool {
    host == "localhost"
        || host.ends_with(".localhost")
        || host.parse::<IpAddr>().map_or(false, |ip| ip.is_loopback())
}
