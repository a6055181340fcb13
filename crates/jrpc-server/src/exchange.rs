//! Transport boundary: the request/response-sink pair the dispatcher consumes.
//!
//! Whatever HTTP stack sits in front of the server converts its request into
//! an [`HttpRequest`] and supplies something implementing [`ResponseSink`].
//! [`BufferedResponse`] is the in-memory sink used by the axum adapter and
//! by tests.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, Method, StatusCode};

use crate::context::DispatchContext;

/// One inbound request: verb, headers, fully-read body, and the context the
/// transport wants threaded into the dispatch.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub context: DispatchContext,
}

impl HttpRequest {
    pub fn new(method: Method, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            headers,
            body: body.into(),
            context: DispatchContext::new(),
        }
    }

    /// A POST carrying `body` with the given `Content-Type`.
    pub fn post(content_type: &str, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(CONTENT_TYPE, value);
        }
        Self::new(Method::POST, headers, body)
    }

    pub fn with_context(mut self, context: DispatchContext) -> Self {
        self.context = context;
        self
    }

    /// The raw `Content-Type` header; `None` only when it is absent.
    pub fn content_type(&self) -> Option<&HeaderValue> {
        self.headers.get(CONTENT_TYPE)
    }
}

/// Where the dispatcher writes its answer.
pub trait ResponseSink {
    /// Set the transport status. Only the first call before any body
    /// write takes effect.
    fn set_status(&mut self, status: StatusCode);

    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Append bytes to the body. Implies status 200 if none was set.
    fn write(&mut self, bytes: &[u8]);
}

/// In-memory [`ResponseSink`].
#[derive(Debug, Clone, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status as the client would see it; 200 when nothing set one.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        let status = self.status();
        (status, self.headers, self.body)
    }
}

impl ResponseSink for BufferedResponse {
    fn set_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, bytes: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(bytes);
    }
}

/// Write a plain-text transport error, used before a codec is chosen.
pub fn write_plain_error(sink: &mut dyn ResponseSink, status: StatusCode, message: &str) {
    sink.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    sink.set_status(status);
    sink.write(message.as_bytes());
}
