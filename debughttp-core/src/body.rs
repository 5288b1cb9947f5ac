//! Body plumbing shared by the debug transport and the default transport

use crate::error::{BoxError, DumpError};
use bytes::Bytes;
use http::HeaderMap;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Type-erased body passed to the wrapped transport and back to the caller
pub type DebugBody = UnsyncBoxBody<Bytes, BoxError>;

/// Erases the type of any byte body
pub fn boxed<B>(body: B) -> DebugBody
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    body.map_err(Into::into).boxed_unsync()
}

pub fn full<T: Into<Bytes>>(data: T) -> DebugBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty() -> DebugBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// A body that was buffered for dumping and is handed on in its place.
///
/// Yields the buffered data, then the trailers if the original had any. A
/// failed replay yields the original stream's error instead, so the consumer
/// fails the way it would have without the dump.
#[derive(Debug)]
pub struct Replay {
    data: Option<Bytes>,
    trailers: Option<HeaderMap>,
    error: Option<BoxError>,
}

impl Replay {
    pub fn new(data: Bytes, trailers: Option<HeaderMap>) -> Self {
        Self {
            data: Some(data),
            trailers,
            error: None,
        }
    }

    pub fn failed(error: BoxError) -> Self {
        Self {
            data: None,
            trailers: None,
            error: Some(error),
        }
    }

    /// The buffered bytes still to be replayed
    pub fn bytes(&self) -> Bytes {
        self.data.clone().unwrap_or_default()
    }

    pub fn into_body(self) -> DebugBody {
        self.boxed_unsync()
    }
}

impl Body for Replay {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        if let Some(error) = self.error.take() {
            return Poll::Ready(Some(Err(error)));
        }
        if let Some(data) = self.data.take().filter(|data| !data.is_empty()) {
            return Poll::Ready(Some(Ok(Frame::data(data))));
        }
        Poll::Ready(self.trailers.take().map(|trailers| Ok(Frame::trailers(trailers))))
    }

    fn is_end_stream(&self) -> bool {
        self.error.is_none()
            && self.trailers.is_none()
            && self.data.as_ref().map_or(true, Bytes::is_empty)
    }

    fn size_hint(&self) -> SizeHint {
        match (&self.error, &self.data) {
            (None, Some(data)) => SizeHint::with_exact(data.len() as u64),
            (None, None) => SizeHint::with_exact(0),
            (Some(_), _) => SizeHint::default(),
        }
    }
}

/// Reads `body` to the end so it can be dumped and then replayed
pub async fn buffer<B>(body: B) -> Result<Replay, DumpError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let collected = body
        .collect()
        .await
        .map_err(|e| DumpError::Body(e.into()))?;
    let trailers = collected.trailers().cloned();
    Ok(Replay::new(collected.to_bytes(), trailers))
}
