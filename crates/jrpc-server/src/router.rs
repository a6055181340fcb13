//! jrpc Server Router: turns one HTTP exchange into one method call.

use http::header::{HeaderValue, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderMap, Method, StatusCode};
use tracing::{debug, warn};

use crate::codec::{Codec, CodecRegistry, CodecRequest, media_type};
use crate::context::DispatchContext;
use crate::exchange::{HttpRequest, ResponseSink, write_plain_error};
use crate::hooks::HookChain;
use crate::registry::{MethodTable, RegistrationError, Service};

/// What a dispatch amounted to, for the transport's logs.
///
/// `status` is the advisory status of the outcome: 200 on success, 400 for
/// parse, lookup, decode and application errors, 405 and 415 for
/// transport-shape errors. JSON-RPC error envelopes are still written with
/// the sink's default status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub status: StatusCode,
    pub method: Option<String>,
}

impl DispatchOutcome {
    fn new(status: StatusCode, method: Option<String>) -> Self {
        Self { status, method }
    }

    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK
    }
}

/// Setup-phase handle: codecs, services and hooks are added here, then
/// [`ServerBuilder::build`] freezes them into an [`RpcServer`].
#[derive(Default)]
pub struct ServerBuilder {
    codecs: CodecRegistry,
    table: MethodTable,
    hooks: HookChain,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content_type` (matched case-insensitively, without
    /// parameters) with `codec`.
    pub fn register_codec<C: Codec + 'static>(&mut self, codec: C, content_type: &str) -> &mut Self {
        self.codecs.register(codec, content_type);
        self
    }

    /// Register a service. Returns the name it is reachable under.
    pub fn register_service<T: Send + Sync + 'static>(
        &mut self,
        service: Service<T>,
    ) -> Result<String, RegistrationError> {
        self.table.register(service)
    }

    /// Append a before-hook.
    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(DispatchContext, &str, &HeaderMap, &dyn CodecRequest) -> DispatchContext
            + Send
            + Sync
            + 'static,
    {
        self.hooks.add(hook);
        self
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.table.has_method(method)
    }

    pub fn build(self) -> RpcServer {
        RpcServer {
            codecs: self.codecs,
            table: self.table,
            hooks: self.hooks,
        }
    }
}

/// The dispatcher. Immutable, so it can be shared across request tasks
/// behind an `Arc` without locking.
pub struct RpcServer {
    codecs: CodecRegistry,
    table: MethodTable,
    hooks: HookChain,
}

impl RpcServer {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// True if `method` (dotted `Service.Method`) is registered.
    pub fn has_method(&self, method: &str) -> bool {
        self.table.has_method(method)
    }

    pub fn methods(&self) -> Vec<String> {
        self.table.methods()
    }

    /// Serve one request, writing the whole answer into `sink`.
    pub fn serve(&self, request: &HttpRequest, sink: &mut dyn ResponseSink) -> DispatchOutcome {
        sink.headers_mut()
            .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

        if request.method != Method::POST {
            warn!("Rejected {} request", request.method);
            write_plain_error(
                sink,
                StatusCode::METHOD_NOT_ALLOWED,
                &format!("rpc: POST method required, received {}", request.method),
            );
            return DispatchOutcome::new(StatusCode::METHOD_NOT_ALLOWED, None);
        }

        let content_type = match request.content_type() {
            None => None,
            Some(value) => match value.to_str() {
                Ok(value) => Some(media_type(value)),
                Err(_) => {
                    return reject_content_type(sink, &String::from_utf8_lossy(value.as_bytes()));
                }
            },
        };
        let Some(codec) = self.codecs.resolve(content_type) else {
            return reject_content_type(sink, content_type.unwrap_or(""));
        };

        let codec_request = codec.new_request(request);

        let method = match codec_request.method() {
            Ok(method) => method,
            Err(e) => {
                debug!("Unreadable request: {e}");
                codec_request.write_error(sink, StatusCode::BAD_REQUEST, &e);
                return DispatchOutcome::new(StatusCode::BAD_REQUEST, None);
            }
        };

        let context = self.hooks.run(
            request.context.clone(),
            &method,
            &request.headers,
            codec_request.as_ref(),
        );

        let (service, spec) = match self.table.lookup(&method) {
            Ok(found) => found,
            Err(e) => {
                debug!("{e}");
                codec_request.write_error(sink, StatusCode::BAD_REQUEST, &e);
                return DispatchOutcome::new(StatusCode::BAD_REQUEST, Some(method));
            }
        };

        let mut args = Vec::with_capacity(spec.params().len());
        for param in spec.params() {
            match param.materialize(&context, codec_request.as_ref()) {
                Ok(arg) => args.push(arg),
                Err(e) => {
                    debug!("{method}: cannot decode {}: {e}", param.type_name());
                    codec_request.write_error(sink, StatusCode::BAD_REQUEST, &e);
                    return DispatchOutcome::new(StatusCode::BAD_REQUEST, Some(method));
                }
            }
        }

        match spec.invoke(service.receiver(), args) {
            Ok(reply) => {
                debug!(request_id = context.request_id(), "{method} ok");
                codec_request.write_response(sink, reply);
                DispatchOutcome::new(StatusCode::OK, Some(method))
            }
            Err(err) => {
                debug!(request_id = context.request_id(), "{method} failed: {err}");
                codec_request.write_error(sink, StatusCode::BAD_REQUEST, &*err);
                DispatchOutcome::new(StatusCode::BAD_REQUEST, Some(method))
            }
        }
    }
}

fn reject_content_type(sink: &mut dyn ResponseSink, content_type: &str) -> DispatchOutcome {
    warn!("Rejected request with Content-Type {:?}", content_type);
    write_plain_error(
        sink,
        StatusCode::UNSUPPORTED_MEDIA_TYPE,
        &format!("rpc: unrecognized Content-Type: {content_type}"),
    );
    DispatchOutcome::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, None)
}
