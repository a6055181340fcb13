//! Demonstration services mounted by the `jrpc` binary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use jrpc_protocol::RpcError;
use jrpc_server::{DispatchContext, Service};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct Args {
    pub a: i64,
    pub b: i64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub c: i64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Quotient {
    pub quo: i64,
    pub rem: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ArithError {
    #[error("divide by zero")]
    DivideByZero,
    #[error("integer overflow")]
    Overflow,
}

/// Integer arithmetic with a call counter.
#[derive(Debug, Default)]
pub struct Arith {
    calls: AtomicU64,
}

impl Arith {
    fn count(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn multiply(&self, args: Args) -> Result<Product, ArithError> {
        self.count();
        let c = args.a.checked_mul(args.b).ok_or(ArithError::Overflow)?;
        Ok(Product { c })
    }

    pub fn divide(&self, args: Args) -> Result<Quotient, ArithError> {
        self.count();
        if args.b == 0 {
            return Err(ArithError::DivideByZero);
        }
        let quo = args.a.checked_div(args.b).ok_or(ArithError::Overflow)?;
        Ok(Quotient { quo, rem: args.a % args.b })
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

pub fn service(arith: Arith) -> Service<Arith> {
    Service::new(arith)
        .method("Multiply", Arith::multiply)
        .method("Divide", Arith::divide)
        .method0("Calls", |arith: &Arith| Ok::<_, RpcError>(arith.calls()))
}

/// Receiver for the `Server` service.
pub struct ServerInfo;

/// Reports what the dispatcher knows about the caller.
pub fn whoami(_: &ServerInfo, ctx: &DispatchContext) -> Result<Value, RpcError> {
    Ok(json!({
        "requestId": ctx.request_id(),
        "remoteAddr": ctx.value("remote_addr"),
        "userAgent": ctx.value("user_agent"),
        "deadlineMs": ctx
            .deadline()
            .map(|d| d.saturating_duration_since(Instant::now()).as_millis() as u64),
        "expired": ctx.is_expired(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiply_counts_calls() {
        let arith = Arith::default();
        assert_eq!(arith.multiply(Args { a: 6, b: 7 }).unwrap(), Product { c: 42 });
        assert_eq!(arith.calls(), 1);
    }

    #[test]
    fn multiply_overflow() {
        let arith = Arith::default();
        let err = arith.multiply(Args { a: i64::MAX, b: 2 }).unwrap_err();
        assert!(matches!(err, ArithError::Overflow));
    }

    #[test]
    fn divide_by_zero() {
        let arith = Arith::default();
        let err = arith.divide(Args { a: 1, b: 0 }).unwrap_err();
        assert_eq!(err.to_string(), "divide by zero");
        assert_eq!(arith.calls(), 1);
    }

    #[test]
    fn divide_with_remainder() {
        let arith = Arith::default();
        assert_eq!(
            arith.divide(Args { a: 17, b: 5 }).unwrap(),
            Quotient { quo: 3, rem: 2 }
        );
    }

    #[test]
    fn whoami_reads_context_values() {
        let ctx = DispatchContext::new().with_value("user_agent", "curl/8");
        let info = whoami(&ServerInfo, &ctx).unwrap();
        assert_eq!(info["userAgent"], "curl/8");
        assert!(info["remoteAddr"].is_null());
        assert_eq!(info["requestId"], ctx.request_id());
        assert!(info["deadlineMs"].is_null());
        assert_eq!(info["expired"], false);
    }

    #[test]
    fn whoami_reports_remaining_deadline() {
        let ctx = DispatchContext::new()
            .with_deadline(Instant::now() + std::time::Duration::from_secs(60));
        let info = whoami(&ServerInfo, &ctx).unwrap();
        let remaining = info["deadlineMs"].as_u64().unwrap();
        assert!(remaining > 0 && remaining <= 60_000);
        assert_eq!(info["expired"], false);
    }
}
