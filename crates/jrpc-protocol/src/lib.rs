//! jrpc - Protocol Types
//!
//! JSON-RPC 2.0 envelope types, the fixed error-code taxonomy, and the
//! client-side helpers used to build requests and read responses.
//! The server and transport crates depend on this one for every type that
//! crosses the wire.

pub mod client;
pub mod error;
pub mod jsonrpc;

pub use client::{ClientError, decode_client_response, encode_client_request};
pub use error::{BoxError, ErrorCode, RpcError};
pub use jsonrpc::{ErrorResponse, Request, SuccessResponse, VERSION};
