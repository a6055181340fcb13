//! jrpc Transport Layer
//!
//! Serves an [`RpcServer`](jrpc_server::RpcServer) over HTTP with axum.
//! The transport handles:
//! - Listening, graceful shutdown and the health probe
//! - Reading request bodies up to a configured limit
//! - Seeding each dispatch context with the peer address
//!
//! Every verb on the RPC path reaches the dispatcher, which owns the
//! POST-only and content-type rules.

pub mod server;

pub use server::{TransportConfig, TransportError, TransportServer};
