//! Client-side helpers: build a request body, read a response body.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RpcError;
use crate::jsonrpc::Request;

/// Errors surfaced while reading a JSON-RPC response.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The body is not a valid response envelope, or `result` does not fit
    /// the requested type.
    #[error("{0}")]
    Decode(#[from] serde_json::Error),

    /// The server answered with an error object.
    #[error("{0}")]
    Rpc(RpcError),

    /// The server answered successfully but `result` was null or missing.
    #[error("result is null")]
    NullResult,
}

impl ClientError {
    /// The server-side error, when there is one.
    pub fn rpc_error(&self) -> Option<&RpcError> {
        match self {
            Self::Rpc(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClientResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

/// Serialize a request for `method` with `args` as its by-name params.
///
/// The request id is a random `u64`.
pub fn encode_client_request<A: Serialize + ?Sized>(
    method: &str,
    args: &A,
) -> Result<Vec<u8>, serde_json::Error> {
    let params = serde_json::to_value(args)?;
    let id = Value::from(rand::random::<u64>());
    serde_json::to_vec(&Request::new(method, Some(params), Some(id)))
}

/// Decode a response body into the method's reply type.
///
/// A null or absent `result` is reported as [`ClientError::NullResult`],
/// never as a zero value.
pub fn decode_client_response<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    let response: ClientResponse = serde_json::from_slice(body)?;

    if let Some(error) = response.error {
        return Err(ClientError::Rpc(error));
    }

    match response.result {
        None | Some(Value::Null) => Err(ClientError::NullResult),
        Some(result) => Ok(serde_json::from_value(result)?),
    }
}
