//! Codec contract and the content-type registry.
//!
//! A [`Codec`] wraps one inbound request in a [`CodecRequest`], which knows
//! how to pull the method name out of the body, fill parameter holders, and
//! write either a result or an error back in the same wire format. New wire
//! formats plug in by implementing these two traits.

use std::collections::HashMap;
use std::sync::Arc;

use http::StatusCode;
use jrpc_protocol::RpcError;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::exchange::{HttpRequest, ResponseSink};

/// Creates a [`CodecRequest`] for each inbound request.
pub trait Codec: Send + Sync {
    fn new_request(&self, request: &HttpRequest) -> Box<dyn CodecRequest>;
}

/// Decodes one request and encodes its response.
///
/// Lives for exactly one dispatch.
pub trait CodecRequest: Send + Sync {
    /// Read enough of the envelope to return the dotted method name.
    fn method(&self) -> Result<String, RpcError>;

    /// Decode the request params into `holder`. Absent params leave the
    /// holder untouched.
    fn read_request(&self, holder: &mut dyn ParamHolder) -> Result<(), RpcError>;

    /// Write a success envelope carrying `reply`.
    fn write_response(&self, sink: &mut dyn ResponseSink, reply: Value);

    /// Write an error envelope. `status` is advisory; a codec may ignore it.
    fn write_error(
        &self,
        sink: &mut dyn ResponseSink,
        status: StatusCode,
        err: &(dyn std::error::Error + 'static),
    );

    /// Raw request body.
    fn body(&self) -> &[u8];
}

/// A pre-allocated, typed slot that a codec decodes params into.
pub trait ParamHolder {
    /// Replace the held value with `params` decoded as the holder's type.
    fn fill(&mut self, params: Value) -> Result<(), serde_json::Error>;

    /// Name of the held type, for diagnostics.
    fn type_name(&self) -> &'static str;
}

/// [`ParamHolder`] over any deserializable type.
#[derive(Debug, Default)]
pub struct Holder<A>(pub A);

impl<A: DeserializeOwned> ParamHolder for Holder<A> {
    fn fill(&mut self, params: Value) -> Result<(), serde_json::Error> {
        self.0 = serde_json::from_value(params)?;
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<A>()
    }
}

/// Lowercase content type → codec.
#[derive(Default, Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `codec` for `content_type`; a later registration for the
    /// same type replaces the earlier one.
    pub fn register<C: Codec + 'static>(&mut self, codec: C, content_type: &str) {
        self.codecs
            .insert(content_type.to_ascii_lowercase(), Arc::new(codec));
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Pick the codec for a media type (already stripped of parameters).
    ///
    /// A request with no Content-Type at all (`None`) falls back to the sole
    /// registered codec, if there is exactly one.
    pub fn resolve(&self, media_type: Option<&str>) -> Option<&dyn Codec> {
        match media_type {
            None if self.codecs.len() == 1 => self.codecs.values().next().map(|c| c.as_ref()),
            None => None,
            Some(media_type) => self
                .codecs
                .get(&media_type.to_ascii_lowercase())
                .map(|c| c.as_ref()),
        }
    }
}

/// Strip `;charset=...` and any other parameters from a `Content-Type`.
pub fn media_type(content_type: &str) -> &str {
    match content_type.find(';') {
        Some(idx) => content_type[..idx].trim(),
        None => content_type.trim(),
    }
}
