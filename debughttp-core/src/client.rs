//! Ready-to-use HTTP client dumping every round trip

use crate::body::{boxed, empty, DebugBody};
use crate::config::Options;
use crate::error::{BoxError, DebugHttpError, TransportError};
use crate::http_transport::HttpTransport;
use crate::transport::DebugTransport;
use bytes::Bytes;
use http::{Method, Request, Response, Uri};
use hyper::body::Body;
use std::future::Future;
use tower::ServiceExt;

/// HTTP client whose transport is a [`DebugTransport`] over [`HttpTransport`]
#[derive(Clone, Debug)]
pub struct DebugClient {
    transport: DebugTransport<HttpTransport>,
}

impl DebugClient {
    /// Client over a transport seeded from the default transport
    pub fn new(options: Option<Options>) -> Self {
        Self::from_transport(DebugTransport::new(options, HttpTransport::default()))
    }

    pub fn from_transport(transport: DebugTransport<HttpTransport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &DebugTransport<HttpTransport> {
        &self.transport
    }

    /// Sends `req` and returns the response with its body still streaming
    pub fn request<B>(
        &self,
        req: Request<B>,
    ) -> impl Future<Output = Result<Response<DebugBody>, TransportError>> + Send
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        self.transport.clone().oneshot(req.map(boxed))
    }

    /// Sends a `GET` with an empty body
    pub async fn get<U>(&self, uri: U) -> Result<Response<DebugBody>, DebugHttpError>
    where
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        let req = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(empty())?;
        Ok(self.request(req).await?)
    }
}

impl Default for DebugClient {
    fn default() -> Self {
        Self::new(None)
    }
}
