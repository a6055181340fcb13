//! jrpc Server: dispatches JSON-RPC requests to registered methods.
//!
//! The server owns the method table, the codec registry and the before-hook
//! chain. It consumes an abstract request/response-sink pair (see [`exchange`])
//! so any HTTP stack can drive it; `jrpc-transport` provides the axum one.

pub mod codec;
pub mod context;
pub mod exchange;
pub mod hooks;
pub mod json;
pub mod registry;
pub mod router;

pub use codec::{Codec, CodecRegistry, CodecRequest, ParamHolder};
pub use context::DispatchContext;
pub use hooks::{BeforeHook, HookChain};
pub use exchange::{BufferedResponse, HttpRequest, ResponseSink};
pub use json::JsonCodec;
pub use registry::{Arg, MethodSpec, MethodTable, ParamKind, ParamSpec, RegistrationError, Service, ServiceSpec};
pub use router::{DispatchOutcome, RpcServer, ServerBuilder};
