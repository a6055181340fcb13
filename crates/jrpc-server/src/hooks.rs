//! Before-hook chain.
//!
//! Hooks run after the method name is known and before it is resolved,
//! strictly in the order they were added. Each one receives the current
//! context and returns the context handed to the next hook; the last one
//! reaches the invoked method.

use std::sync::Arc;

use http::HeaderMap;

use crate::codec::CodecRequest;
use crate::context::DispatchContext;

/// `(context, method, headers, request) -> context`.
pub type BeforeHook = Arc<
    dyn Fn(DispatchContext, &str, &HeaderMap, &dyn CodecRequest) -> DispatchContext + Send + Sync,
>;

/// Hooks in registration order.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<BeforeHook>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, hook: F)
    where
        F: Fn(DispatchContext, &str, &HeaderMap, &dyn CodecRequest) -> DispatchContext
            + Send
            + Sync
            + 'static,
    {
        self.hooks.push(Arc::new(hook));
    }

    /// Fold `context` through every hook.
    pub fn run(
        &self,
        context: DispatchContext,
        method: &str,
        headers: &HeaderMap,
        request: &dyn CodecRequest,
    ) -> DispatchContext {
        self.hooks
            .iter()
            .fold(context, |ctx, hook| hook(ctx, method, headers, request))
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
