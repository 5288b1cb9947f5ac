//! Interception layer dumping each round trip through the configured sink
//!
//! [`DebugTransport`] wraps any `tower::Service` taking and returning HTTP
//! messages. Per round trip, with logging enabled, the sink receives:
//!
//! ```text
//! >>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>
//! HTTP REQUEST (req <id>)
//! <request dump>
//! >>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>
//! <<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<
//! HTTP RESPONSE (req <id>)
//! <response dump or failure>
//! <<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<
//! ```
//!
//! Each of those is one call to the sink. The wrapped service sees the
//! request unchanged and its result is returned unchanged.

use crate::body::{self, boxed, DebugBody};
use crate::config::Options;
use crate::dump::{dump_request, dump_response};
use crate::error::{BoxError, DumpError};
use crate::redact::redact_all;
use bytes::Bytes;
use http::{Request, Response};
use hyper::body::Body;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use uuid::Uuid;

/// Brackets each logged request
pub const SEPARATOR_REQ: &str = ">>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>>";

/// Brackets each logged response
pub const SEPARATOR_RESP: &str = "<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<<";

/// Service wrapper logging every round trip according to its [`Options`]
#[derive(Clone)]
pub struct DebugTransport<S> {
    inner: S,
    options: Arc<Options>,
}

impl<S> DebugTransport<S> {
    /// Wraps `inner` as is. `None` selects [`Options::default`].
    pub fn new(options: Option<Options>, inner: S) -> Self {
        Self {
            inner,
            options: Arc::new(options.unwrap_or_default()),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for DebugTransport<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugTransport")
            .field("inner", &self.inner)
            .field("options", &self.options)
            .finish()
    }
}

/// Layer producing [`DebugTransport`]s that share one set of options
#[derive(Clone, Debug)]
pub struct DebugLayer {
    options: Arc<Options>,
}

impl DebugLayer {
    pub fn new(options: Option<Options>) -> Self {
        Self {
            options: Arc::new(options.unwrap_or_default()),
        }
    }
}

impl<S> Layer<S> for DebugLayer {
    type Service = DebugTransport<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DebugTransport {
            inner,
            options: Arc::clone(&self.options),
        }
    }
}

impl<S, F, E, ReqBody, ResBody> Service<Request<ReqBody>> for DebugTransport<S>
where
    S: Service<Request<DebugBody>, Response = Response<ResBody>, Future = F, Error = E>
        + Clone
        + Send
        + 'static,
    F: Future<Output = Result<Response<ResBody>, E>> + Send + 'static,
    E: Display + Send + 'static,
    ReqBody: Body<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<DebugBody>;
    type Error = E;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave a clone behind
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);
        let options = Arc::clone(&self.options);

        Box::pin(round_trip(inner, options, req))
    }
}

async fn round_trip<S, F, E, ReqBody, ResBody>(
    mut inner: S,
    options: Arc<Options>,
    req: Request<ReqBody>,
) -> Result<Response<DebugBody>, E>
where
    S: Service<Request<DebugBody>, Response = Response<ResBody>, Future = F, Error = E>,
    F: Future<Output = Result<Response<ResBody>, E>> + Send + 'static,
    E: Display + Send + 'static,
    ReqBody: Body<Data = Bytes> + Send + 'static,
    ReqBody::Error: Into<BoxError>,
    ResBody: Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    let flags = options.flags;
    if !flags.logging_enabled() {
        let res = inner.call(req.map(boxed)).await?;
        return Ok(res.map(boxed));
    }

    let logf = &options.logf;
    let id = Uuid::new_v4();

    logf(format_args!("{}", SEPARATOR_REQ));
    logf(format_args!("HTTP REQUEST (req {})", id));
    let (parts, req_body) = req.into_parts();
    let req_body = if flags.dump_request_body() {
        match body::buffer(req_body).await {
            Ok(replay) => {
                let bytes = replay.bytes();
                let dump = dump_request(&parts, Some(&bytes), Some(bytes.len() as u64));
                log_dump(&options, dump);
                replay.into_body()
            }
            Err(err) => {
                logf(format_args!("Dump request failed: {}", err));
                let DumpError::Body(source) = err;
                body::Replay::failed(source).into_body()
            }
        }
    } else {
        let len = if req_body.is_end_stream() {
            Some(0)
        } else {
            req_body.size_hint().exact()
        };
        let dump = dump_request(&parts, None, len);
        log_dump(&options, dump);
        boxed(req_body)
    };
    logf(format_args!("{}", SEPARATOR_REQ));

    let result = inner.call(Request::from_parts(parts, req_body)).await;

    logf(format_args!("{}", SEPARATOR_RESP));
    logf(format_args!("HTTP RESPONSE (req {})", id));
    let res = match result {
        Ok(res) => res,
        Err(err) => {
            logf(format_args!("HTTP request failed: {}", err));
            logf(format_args!("{}", SEPARATOR_RESP));
            return Err(err);
        }
    };

    let (parts, res_body) = res.into_parts();
    let res_body = if flags.dump_response_body() {
        match body::buffer(res_body).await {
            Ok(replay) => {
                log_dump(&options, dump_response(&parts, Some(&replay.bytes())));
                replay.into_body()
            }
            Err(err) => {
                logf(format_args!("Dump response failed: {}", err));
                let DumpError::Body(source) = err;
                body::Replay::failed(source).into_body()
            }
        }
    } else {
        log_dump(&options, dump_response(&parts, None));
        boxed(res_body)
    };
    logf(format_args!("{}", SEPARATOR_RESP));

    Ok(Response::from_parts(parts, res_body))
}

fn log_dump(options: &Options, dump: Vec<u8>) {
    let dump = if options.flags.reveal_auth() {
        dump
    } else {
        redact_all(dump, &options.auth)
    };
    (options.logf)(format_args!("{}", String::from_utf8_lossy(&dump)));
}
