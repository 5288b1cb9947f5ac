//! Wire-format dumps of requests and responses for logging
//!
//! The output is for humans: header names are printed in canonical case
//! (`Content-Type`) the way they'd appear on an HTTP/1.1 wire, whatever the
//! protocol actually used.

use http::header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{request, response, HeaderMap};

/// Serializes a request as it will be sent.
///
/// The request line uses origin form. A `Host` header is synthesized from the
/// URI when the request has none. Unless the headers already frame the body,
/// `body_len` adds `Content-Length` when known and non-zero, and `None` (a
/// streaming body of unknown length) adds `Transfer-Encoding: chunked`. `body`
/// is appended after the blank line when given.
pub fn dump_request(parts: &request::Parts, body: Option<&[u8]>, body_len: Option<u64>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + body.map_or(0, <[u8]>::len));

    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|pq| !pq.is_empty())
        .unwrap_or("/");
    let line = format!("{} {} {:?}\r\n", parts.method, target, parts.version);
    buf.extend_from_slice(line.as_bytes());

    if !parts.headers.contains_key(HOST) {
        if let Some(host) = parts.uri.host() {
            let host = match parts.uri.port_u16() {
                Some(port) => format!("Host: {}:{}\r\n", host, port),
                None => format!("Host: {}\r\n", host),
            };
            buf.extend_from_slice(host.as_bytes());
        }
    }

    write_headers(&mut buf, &parts.headers);

    let framed =
        parts.headers.contains_key(CONTENT_LENGTH) || parts.headers.contains_key(TRANSFER_ENCODING);
    if !framed {
        match body_len {
            Some(0) => {}
            Some(len) => {
                buf.extend_from_slice(format!("Content-Length: {}\r\n", len).as_bytes());
            }
            None => buf.extend_from_slice(b"Transfer-Encoding: chunked\r\n"),
        }
    }

    finish(buf, body)
}

/// Serializes a response status line and headers, plus `body` when given
pub fn dump_response(parts: &response::Parts, body: Option<&[u8]>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256 + body.map_or(0, <[u8]>::len));

    let line = format!(
        "{:?} {} {}\r\n",
        parts.version,
        parts.status.as_u16(),
        parts.status.canonical_reason().unwrap_or("")
    );
    buf.extend_from_slice(line.as_bytes());

    write_headers(&mut buf, &parts.headers);

    finish(buf, body)
}

fn write_headers(buf: &mut Vec<u8>, headers: &HeaderMap) {
    for (name, value) in headers.iter() {
        buf.extend_from_slice(canonical_header_name(name.as_str()).as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
}

fn finish(mut buf: Vec<u8>, body: Option<&[u8]>) -> Vec<u8> {
    buf.extend_from_slice(b"\r\n");
    if let Some(body) = body {
        buf.extend_from_slice(body);
    }
    buf
}

/// Upper-cases the first letter and every letter following a `-`
pub fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.chars() {
        if upper {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c.to_ascii_lowercase());
        }
        upper = c == '-';
    }
    out
}
