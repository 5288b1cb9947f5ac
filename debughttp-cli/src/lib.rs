//! Debug HTTP command line client
//!
//! Sends a single request through a [`DebugClient`] so the dump of the round
//! trip lands on stderr while the response body goes to stdout.

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use debughttp_core::body::{empty, full};
use debughttp_core::{DebugBody, DebugClient, DumpFlags, Options};
use http::{HeaderName, HeaderValue, Method, Request, StatusCode};
use http_body_util::BodyExt;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URL to request
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    pub method: String,

    /// Request header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// Request body
    #[arg(short = 'd', long)]
    pub data: Option<String>,

    /// What to dump, e.g. "headers", "bodies,auth" or "" for nothing.
    /// Overrides DEBUGHTTP_DUMP
    #[arg(long)]
    pub dump: Option<DumpFlags>,

    /// Header whose value is redacted in dumps (repeatable, replaces the
    /// defaults). Overrides DEBUGHTTP_AUTH_HEADERS
    #[arg(long = "auth-header")]
    pub auth_headers: Vec<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Initializes logging to stderr, ignoring an already installed subscriber
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .try_init();

    if result.is_err() {
        tracing::debug!("Logging already initialized, skipping");
    }
}

/// Applies the command line overrides on top of `base`
pub fn build_options(args: &Args, base: Options) -> Result<Options> {
    let mut options = base;
    if let Some(flags) = args.dump {
        options.flags = flags;
    }
    if !args.auth_headers.is_empty() {
        for name in &args.auth_headers {
            HeaderName::from_bytes(name.trim().as_bytes())
                .with_context(|| format!("Invalid --auth-header {:?}", name))?;
        }
        options = options.with_auth_headers(&args.auth_headers);
    }
    Ok(options)
}

pub fn build_request(args: &Args) -> Result<Request<DebugBody>> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method {:?}", args.method))?;

    let mut builder = Request::builder().method(method).uri(&args.url);
    for raw in &args.headers {
        let (name, value) = raw
            .split_once(':')
            .with_context(|| format!("Invalid header {:?}, expected 'Name: value'", raw))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .with_context(|| format!("Invalid header name in {:?}", raw))?;
        let value = HeaderValue::from_str(value.trim())
            .with_context(|| format!("Invalid header value in {:?}", raw))?;
        builder = builder.header(name, value);
    }

    let body = match &args.data {
        Some(data) => full(data.clone()),
        None => empty(),
    };
    builder
        .body(body)
        .with_context(|| format!("Invalid request to {:?}", args.url))
}

/// Runs the request with options from the environment and the command line
pub async fn run(args: Args) -> Result<(StatusCode, Bytes)> {
    let options = build_options(&args, Options::from_env()?)?;
    run_with_options(&args, options).await
}

/// Runs the request with `options` as the base configuration
pub async fn run_with_options(args: &Args, options: Options) -> Result<(StatusCode, Bytes)> {
    let req = build_request(args)?;
    let client = DebugClient::new(Some(options));

    let res = client
        .request(req)
        .await
        .with_context(|| format!("{} {} failed", args.method, args.url))?;
    let status = res.status();
    let body = res
        .into_body()
        .collect()
        .await
        .map_err(anyhow::Error::msg)
        .context("Failed to read response body")?
        .to_bytes();

    tracing::debug!("Received {} with {} body bytes", status, body.len());
    Ok((status, body))
}
