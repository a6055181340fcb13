//! Protocol layer tests: error codes, envelopes, client helpers.

#[cfg(test)]
mod tests {
    use jrpc_protocol::*;
    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};

    // ─────────────────────────────────────────────────────────────────────
    // Error codes
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn standard_error_codes() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
        assert_eq!(ErrorCode::ServerError.code(), -32000);
    }

    #[test]
    fn from_code_recognizes_standard_and_custom() {
        assert_eq!(ErrorCode::from_code(-32601), ErrorCode::MethodNotFound);
        assert_eq!(ErrorCode::from_code(-32000), ErrorCode::ServerError);
        assert_eq!(ErrorCode::from_code(-31999), ErrorCode::Custom(-31999));
        assert_eq!(ErrorCode::Custom(7).code(), 7);
    }

    // ─────────────────────────────────────────────────────────────────────
    // RpcError
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn display_is_message_only() {
        let err = RpcError::invalid_params("bad A");
        assert_eq!(err.to_string(), "bad A");
        assert_eq!(err.code, -32602);
        assert_eq!(err.error_code(), ErrorCode::InvalidParams);
    }

    #[test]
    fn error_without_data_omits_field() {
        let json = serde_json::to_value(RpcError::internal("boom")).unwrap();
        assert_eq!(json, json!({"code": -32603, "message": "boom"}));
    }

    #[test]
    fn error_with_data_serializes_it() {
        let err = RpcError::server_error("nope").with_data(json!({"why": "because"}));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["data"]["why"], "because");
        let back: RpcError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn from_error_keeps_tagged_errors() {
        let tagged = RpcError::method_not_found("rpc: can't find method \"X.Y\"");
        let boxed: BoxError = Box::new(tagged.clone());
        assert_eq!(RpcError::from_error(boxed.as_ref()), tagged);
    }

    #[test]
    fn from_error_wraps_untagged_as_server_error() {
        let io = std::io::Error::other("disk full");
        let wrapped = RpcError::from_error(&io);
        assert_eq!(wrapped.code, -32000);
        assert_eq!(wrapped.message, "disk full");
        assert!(wrapped.data.is_none());
    }

    // ─────────────────────────────────────────────────────────────────────
    // Envelopes
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn request_distinguishes_null_id_from_missing() {
        let with_null: Request =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "A.B", "id": null})).unwrap();
        assert_eq!(with_null.id, Some(Value::Null));
        assert!(!with_null.is_notification());

        let without: Request =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "A.B"})).unwrap();
        assert_eq!(without.id, None);
        assert!(without.is_notification());
        assert!(without.params.is_none());
    }

    #[test]
    fn request_from_wire_format() {
        let wire = r#"{"jsonrpc":"2.0","method":"Arith.Multiply","params":{"A":4,"B":2},"id":"x-1"}"#;
        let req: Request = serde_json::from_str(wire).unwrap();
        assert_eq!(req.method, "Arith.Multiply");
        assert_eq!(req.id, Some(json!("x-1")));
        assert_eq!(req.params.unwrap()["A"], 4);
    }

    #[test]
    fn success_response_shape() {
        let resp = SuccessResponse::new(json!(1), json!({"Result": 8}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "id": 1, "result": {"Result": 8}}));
    }

    #[test]
    fn error_response_defaults_to_null_id() {
        let resp = ErrorResponse::new(None, RpcError::parse_error("bad json"));
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json["id"].is_null());
        assert_eq!(json["jsonrpc"], VERSION);
        assert_eq!(json["error"]["code"], -32700);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Client helpers
    // ─────────────────────────────────────────────────────────────────────

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "PascalCase")]
    struct Args {
        a: i64,
        b: i64,
    }

    #[test]
    fn encode_client_request_envelope() {
        let body = encode_client_request("Arith.Multiply", &Args { a: 4, b: 2 }).unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "Arith.Multiply");
        assert_eq!(json["params"], json!({"A": 4, "B": 2}));
        assert!(json["id"].is_u64());
    }

    #[test]
    fn decode_success() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":{"A":1,"B":2}}"#;
        let args: Args = decode_client_response(body).unwrap();
        assert_eq!(args, Args { a: 1, b: 2 });
    }

    #[test]
    fn decode_null_result() {
        let body = br#"{"jsonrpc": "2.0", "id": 12345, "result": null}"#;
        let mut result: Option<Value> = None;
        match decode_client_response::<Value>(body) {
            Ok(v) => result = Some(v),
            Err(e) => assert!(matches!(e, ClientError::NullResult), "got {e:?}"),
        }
        assert!(result.is_none());
    }

    #[test]
    fn decode_missing_result_is_null_result() {
        let body = br#"{"jsonrpc":"2.0","id":1}"#;
        let err = decode_client_response::<Value>(body).unwrap_err();
        assert!(matches!(err, ClientError::NullResult));
        assert_eq!(err.to_string(), "result is null");
    }

    #[test]
    fn decode_error_envelope() {
        let body = br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"rpc: can't find method \"A.B\""}}"#;
        let err = decode_client_response::<Value>(body).unwrap_err();
        let rpc = err.rpc_error().unwrap();
        assert_eq!(rpc.error_code(), ErrorCode::MethodNotFound);
        assert_eq!(err.to_string(), "rpc: can't find method \"A.B\"");
    }

    #[test]
    fn decode_malformed_body() {
        let err = decode_client_response::<Value>(b"<html>").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert!(err.rpc_error().is_none());
    }

    #[test]
    fn decode_result_of_wrong_type() {
        let body = br#"{"jsonrpc":"2.0","id":1,"result":"eight"}"#;
        let err = decode_client_response::<Args>(body).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
