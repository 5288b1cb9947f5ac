//! Connector used by [`HttpTransport`](crate::HttpTransport)
//!
//! Dials TCP through hyper-util's `HttpConnector`, optionally via a proxy,
//! and wraps https connections in rustls.

use crate::error::ConnectError;
use crate::http_transport::{ProxyFn, TransportSettings};
use crate::redact::find;
use http::uri::Scheme;
use http::Uri;
use hyper::rt::{Read, ReadBufCursor, Write};
use hyper_util::client::legacy::connect::{Connected, Connection, HttpConnector};
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tower::{Service, ServiceExt};
use tracing::debug;

/// Largest proxy reply accepted for a CONNECT request
const MAX_TUNNEL_REPLY: usize = 8192;

/// Connection handed to the pooled client
#[allow(clippy::large_enum_variant)]
pub enum Conn {
    /// Plain TCP, possibly to a forward proxy
    Plain {
        io: TokioIo<TcpStream>,
        proxied: bool,
    },
    /// TLS to the origin, possibly through a CONNECT tunnel
    Tls(TokioIo<TlsStream<TcpStream>>),
}

impl Read for Conn {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: ReadBufCursor<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain { io, .. } => Pin::new(io).poll_read(cx, buf),
            Conn::Tls(io) => Pin::new(io).poll_read(cx, buf),
        }
    }
}

impl Write for Conn {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Conn::Plain { io, .. } => Pin::new(io).poll_write(cx, buf),
            Conn::Tls(io) => Pin::new(io).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain { io, .. } => Pin::new(io).poll_flush(cx),
            Conn::Tls(io) => Pin::new(io).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Conn::Plain { io, .. } => Pin::new(io).poll_shutdown(cx),
            Conn::Tls(io) => Pin::new(io).poll_shutdown(cx),
        }
    }
}

impl Connection for Conn {
    fn connected(&self) -> Connected {
        match self {
            Conn::Plain { proxied, .. } => Connected::new().proxy(*proxied),
            Conn::Tls(io) => {
                let (_, session) = io.inner().get_ref();
                if session.alpn_protocol() == Some(&b"h2"[..]) {
                    Connected::new().negotiated_h2()
                } else {
                    Connected::new()
                }
            }
        }
    }
}

/// Dials connections according to a [`TransportSettings`]
#[derive(Clone)]
pub struct Dialer {
    http: HttpConnector,
    tls: Option<TlsConnector>,
    proxy: Option<ProxyFn>,
    tls_handshake_timeout: Option<Duration>,
}

impl Dialer {
    pub fn new(settings: &TransportSettings) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(settings.connect_timeout);
        http.set_keepalive(settings.tcp_keepalive);
        http.set_nodelay(settings.tcp_nodelay);
        http.set_happy_eyeballs_timeout(settings.happy_eyeballs_timeout);

        Self {
            http,
            tls: settings
                .tls_config
                .as_ref()
                .map(|config| TlsConnector::from(Arc::clone(config))),
            proxy: settings.proxy.clone(),
            tls_handshake_timeout: settings.tls_handshake_timeout,
        }
    }

    async fn dial(self, dst: Uri) -> Result<Conn, ConnectError> {
        let https = dst.scheme() == Some(&Scheme::HTTPS);
        let proxy = self.proxy.as_ref().and_then(|proxy| proxy(&dst));

        match proxy {
            None => {
                let tcp = self.tcp(dst.clone()).await?;
                if https {
                    self.handshake(&dst, tcp).await
                } else {
                    Ok(Conn::Plain {
                        io: TokioIo::new(tcp),
                        proxied: false,
                    })
                }
            }
            Some(proxy) => {
                debug!("Dialing {} through proxy {}", dst, proxy);
                let tcp = self.tcp(proxy).await?;
                if https {
                    let tcp = tunnel(tcp, &dst).await?;
                    self.handshake(&dst, tcp).await
                } else {
                    Ok(Conn::Plain {
                        io: TokioIo::new(tcp),
                        proxied: true,
                    })
                }
            }
        }
    }

    async fn tcp(&self, dst: Uri) -> Result<TcpStream, ConnectError> {
        self.http
            .clone()
            .oneshot(dst)
            .await
            .map(TokioIo::into_inner)
            .map_err(|e| ConnectError::Dial(e.into()))
    }

    async fn handshake(&self, dst: &Uri, tcp: TcpStream) -> Result<Conn, ConnectError> {
        let tls = self.tls.as_ref().ok_or(ConnectError::TlsNotConfigured)?;
        let host = dst
            .host()
            .ok_or(ConnectError::MissingHost)?
            .trim_start_matches('[')
            .trim_end_matches(']');
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| ConnectError::InvalidServerName(host.to_string()))?;

        let connect = tls.connect(server_name, tcp);
        let stream = match self.tls_handshake_timeout {
            Some(limit) => timeout(limit, connect)
                .await
                .map_err(|_| ConnectError::TlsHandshakeTimeout(limit))?,
            None => connect.await,
        }
        .map_err(ConnectError::Tls)?;

        Ok(Conn::Tls(TokioIo::new(stream)))
    }
}

impl Service<Uri> for Dialer {
    type Response = Conn;
    type Error = ConnectError;
    type Future = Pin<Box<dyn Future<Output = Result<Conn, ConnectError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, dst: Uri) -> Self::Future {
        let dialer = self.clone();
        Box::pin(dialer.dial(dst))
    }
}

/// Opens a CONNECT tunnel to `dst` over an established proxy connection
async fn tunnel(mut tcp: TcpStream, dst: &Uri) -> Result<TcpStream, ConnectError> {
    let host = dst.host().ok_or(ConnectError::MissingHost)?;
    let port = dst.port_u16().unwrap_or(443);
    let request = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n\r\n",
        host = host,
        port = port
    );
    tcp.write_all(request.as_bytes()).await?;

    let mut reply = Vec::with_capacity(256);
    let mut chunk = [0u8; 512];
    loop {
        let n = tcp.read(&mut chunk).await?;
        if n == 0 {
            return Err(ConnectError::ProxyTunnel(
                "proxy closed the connection during CONNECT".to_string(),
            ));
        }
        reply.extend_from_slice(&chunk[..n]);

        if find(&reply, b"\r\n\r\n").is_some() {
            break;
        }
        if reply.len() > MAX_TUNNEL_REPLY {
            return Err(ConnectError::ProxyTunnel(
                "proxy reply headers too long".to_string(),
            ));
        }
    }

    let reply = String::from_utf8_lossy(&reply);
    let status_line = reply.lines().next().unwrap_or_default();
    if status_line.split_whitespace().nth(1) == Some("200") {
        Ok(tcp)
    } else {
        Err(ConnectError::ProxyTunnel(format!(
            "proxy refused CONNECT: {}",
            status_line
        )))
    }
}
