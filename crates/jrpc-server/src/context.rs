//! Dispatch context: request-scoped state threaded through hooks into
//! methods that ask for it.
//!
//! The transport creates one [`DispatchContext`] per inbound request. Each
//! before-hook receives the current context and returns a (possibly
//! enriched) copy; the final one is handed to any method whose first
//! declared parameter is the context slot. It never appears on the wire.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

/// Context for a single dispatch.
///
/// Clones are cheap: the value bag is shared until a hook adds to it.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    /// Unique identifier for this request, for log correlation.
    request_id: String,
    /// Values attached by the transport or by before-hooks.
    values: Arc<HashMap<String, Value>>,
    /// Optional deadline set by the transport. Nothing in the core enforces it.
    deadline: Option<Instant>,
}

impl Default for DispatchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DispatchContext {
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            values: Arc::new(HashMap::new()),
            deadline: None,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Return a copy of this context carrying `key = value`.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once the deadline, if any, has passed.
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}
