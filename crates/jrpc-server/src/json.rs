//! JSON-RPC 2.0 codec.
//!
//! Params bind by name only: an object is decoded field-by-field into the
//! holder, absent or null params leave the holder at its default, and every
//! other shape (positional arrays included) is rejected with
//! `InvalidParams`.
//!
//! Error envelopes are written with the transport's default status; the
//! status hint handed to [`CodecRequest::write_error`] is only logged.

use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use jrpc_protocol::{ErrorResponse, Request, RpcError, SuccessResponse, VERSION};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::codec::{Codec, CodecRequest, ParamHolder};
use crate::exchange::{HttpRequest, ResponseSink, write_plain_error};

/// Content type the JSON codec is normally registered under.
pub const CONTENT_TYPE_JSON: &str = "application/json";

const RESPONSE_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// The JSON-RPC 2.0 [`Codec`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Codec for JsonCodec {
    fn new_request(&self, request: &HttpRequest) -> Box<dyn CodecRequest> {
        Box::new(JsonCodecRequest::parse(request.body.clone()))
    }
}

/// One JSON-RPC request being served.
#[derive(Debug)]
pub struct JsonCodecRequest {
    body: Bytes,
    /// The envelope, when the body parsed.
    request: Option<Request>,
    /// The `id` member, recovered even when the envelope is invalid.
    id: Option<Value>,
    /// First failure seen; sticky for the rest of the dispatch.
    err: Option<RpcError>,
}

impl JsonCodecRequest {
    /// Parse in two stages: the body must be JSON (else `ParseError`), and
    /// that JSON must be a request envelope (else `InvalidRequest`).
    pub fn parse(body: Bytes) -> Self {
        let value = match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => {
                return Self {
                    body,
                    request: None,
                    id: None,
                    err: Some(RpcError::parse_error(e.to_string())),
                };
            }
        };

        let id = value.get("id").cloned();
        if !value.is_object() {
            return Self {
                body,
                request: None,
                id,
                err: Some(RpcError::invalid_request(format!(
                    "request must be an object, got {}",
                    shape(&value)
                ))),
            };
        }

        let (request, err) = match serde_json::from_value::<Request>(value) {
            Ok(request) => {
                let err = if request.jsonrpc != VERSION {
                    Some(RpcError::invalid_request("jsonrpc must be 2.0"))
                } else if request.method.is_empty() {
                    Some(RpcError::invalid_request("method must not be empty"))
                } else {
                    None
                };
                (Some(request), err)
            }
            Err(e) => (None, Some(RpcError::invalid_request(e.to_string()))),
        };

        Self {
            body,
            request,
            id,
            err,
        }
    }

    fn id(&self) -> Option<Value> {
        self.id.clone()
    }

    /// A request that parsed but carries no id gets no response body.
    fn is_notification(&self) -> bool {
        self.request.as_ref().is_some_and(Request::is_notification)
    }

    fn write_envelope<T: Serialize>(&self, sink: &mut dyn ResponseSink, envelope: &T) {
        if self.is_notification() {
            return;
        }

        match serde_json::to_vec(envelope) {
            Ok(mut bytes) => {
                bytes.push(b'\n');
                sink.headers_mut()
                    .insert(CONTENT_TYPE, HeaderValue::from_static(RESPONSE_CONTENT_TYPE));
                sink.write(&bytes);
            }
            Err(e) => write_plain_error(sink, StatusCode::BAD_REQUEST, &e.to_string()),
        }
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl CodecRequest for JsonCodecRequest {
    fn method(&self) -> Result<String, RpcError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        self.request
            .as_ref()
            .map(|r| r.method.clone())
            .ok_or_else(|| RpcError::internal("request was not parsed"))
    }

    fn read_request(&self, holder: &mut dyn ParamHolder) -> Result<(), RpcError> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        let Some(request) = &self.request else {
            return Err(RpcError::internal("request was not parsed"));
        };

        match &request.params {
            None | Some(Value::Null) => Ok(()),
            Some(params @ Value::Object(_)) => holder.fill(params.clone()).map_err(|e| {
                RpcError::invalid_params(e.to_string()).with_data(params.clone())
            }),
            Some(params) => Err(RpcError::invalid_params(format!(
                "params must be an object to decode into {}, got {}",
                holder.type_name(),
                shape(params),
            ))
            .with_data(params.clone())),
        }
    }

    fn write_response(&self, sink: &mut dyn ResponseSink, reply: Value) {
        let response = SuccessResponse::new(self.id().unwrap_or(Value::Null), reply);
        self.write_envelope(sink, &response);
    }

    fn write_error(
        &self,
        sink: &mut dyn ResponseSink,
        status: StatusCode,
        err: &(dyn std::error::Error + 'static),
    ) {
        let error = RpcError::from_error(err);
        debug!(status = status.as_u16(), code = error.code, "rpc error: {}", error.message);
        let response = ErrorResponse::new(self.id(), error);
        self.write_envelope(sink, &response);
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}
