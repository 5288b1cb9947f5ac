use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use clap::Parser;
use debughttp_cli::{build_options, run_with_options, Args};
use debughttp_core::Options;
use http::StatusCode;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

async fn echo(headers: HeaderMap, body: String) -> String {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none")
        .to_string();
    format!("key={} body={}", key, body)
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new().route("/submit", post(echo));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn capture(options: Options) -> (Options, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let options = options
        .with_logf(move |args: std::fmt::Arguments<'_>| sink.lock().unwrap().push(args.to_string()));
    (options, lines)
}

#[tokio::test]
async fn test_cli_request_with_custom_auth_header() {
    let addr = spawn_server().await;
    let url = format!("http://{}/submit", addr);
    let args = Args::parse_from([
        "debughttp-cli",
        "-X",
        "POST",
        "-H",
        "X-Api-Key: sekrit-value",
        "-d",
        "hello",
        "--dump",
        "bodies",
        "--auth-header",
        "x-api-key",
        url.as_str(),
    ]);

    let options = build_options(&args, Options::default()).unwrap();
    let (options, lines) = capture(options);
    let (status, body) = run_with_options(&args, options).await.unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"key=sekrit-value body=hello");

    let lines = lines.lock().unwrap();
    assert_eq!(lines.len(), 8);
    assert!(lines[2].starts_with("POST /submit HTTP/1.1\r\n"));
    assert!(lines[2].contains("\nX-Api-Key: XXXX\n"));
    assert!(!lines[2].contains("sekrit"));
    assert!(lines[2].ends_with("\r\n\r\nhello"));
    // The response body is dumped verbatim; only header prefixes are redacted
    assert!(lines[6].ends_with("key=sekrit-value body=hello"));
}

#[tokio::test]
async fn test_cli_dispatch_failure_is_an_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{}/", addr);
    let args = Args::parse_from(["debughttp-cli", url.as_str()]);
    let (options, lines) = capture(Options::default());

    let err = run_with_options(&args, options).await.unwrap_err();
    assert!(err.to_string().contains("GET"));

    let lines = lines.lock().unwrap();
    assert!(lines[6].starts_with("HTTP request failed: "));
    assert!(lines[6].contains("Dial failed: "), "{}", lines[6]);
}
