//! Method table: services and their callable methods, built once at setup.
//!
//! A service is declared with [`Service`], which records for every method a
//! parameter-descriptor list ([`ParamSpec`]) and a call thunk. The thunk is
//! type-erased over the receiver so the table can hold any mix of services;
//! the descriptors tell the dispatcher which slots to decode from the
//! request and which one receives the [`DispatchContext`].
//!
//! Only signature validation happens here. Per request the dispatcher just
//! decodes arguments and calls the thunk.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use jrpc_protocol::{BoxError, RpcError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::codec::{CodecRequest, Holder};
use crate::context::DispatchContext;

/// Outcome of calling a method: the encoded result slot or the error slot.
pub type CallResult = Result<Value, BoxError>;

/// A type-erased service receiver.
pub type Receiver = dyn Any + Send + Sync;
type DecodeFn = fn(&dyn CodecRequest) -> Result<Box<dyn Any + Send>, RpcError>;
type Thunk = Arc<dyn Fn(&Receiver, Vec<Arg>) -> CallResult + Send + Sync>;

/// Why a service could not be registered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("rpc: invalid service name {0:?}")]
    InvalidServiceName(String),

    #[error("rpc: service already defined: {0:?}")]
    DuplicateService(String),

    #[error("rpc: {0:?} has no exported methods of suitable type")]
    NoMethods(String),

    #[error("rpc: method {service}.{method} is not exported")]
    UnexportedMethod { service: String, method: String },

    #[error("rpc: method {service}.{method} registered twice")]
    DuplicateMethod { service: String, method: String },

    #[error(
        "rpc: method {service}.{method} takes the context at position {position}; \
         it must be the first parameter"
    )]
    MisplacedContext {
        service: String,
        method: String,
        position: usize,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameter descriptors
// ─────────────────────────────────────────────────────────────────────────────

/// What fills a declared parameter slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// The live dispatch context, injected by the dispatcher.
    Context,
    /// A value decoded from the request params.
    Value,
}

/// One declared parameter.
#[derive(Clone)]
pub struct ParamSpec {
    kind: ParamKind,
    type_name: &'static str,
    decode: Option<DecodeFn>,
}

impl std::fmt::Debug for ParamSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamSpec")
            .field("kind", &self.kind)
            .field("type_name", &self.type_name)
            .finish()
    }
}

fn decode_value<A>(request: &dyn CodecRequest) -> Result<Box<dyn Any + Send>, RpcError>
where
    A: DeserializeOwned + Default + Send + 'static,
{
    let mut holder = Holder(A::default());
    request.read_request(&mut holder)?;
    Ok(Box::new(holder.0))
}

impl ParamSpec {
    /// The reserved context slot.
    pub fn context() -> Self {
        Self {
            kind: ParamKind::Context,
            type_name: std::any::type_name::<DispatchContext>(),
            decode: None,
        }
    }

    /// A slot decoded from params into a fresh `A::default()`.
    pub fn value<A>() -> Self
    where
        A: DeserializeOwned + Default + Send + 'static,
    {
        Self {
            kind: ParamKind::Value,
            type_name: std::any::type_name::<A>(),
            decode: Some(decode_value::<A>),
        }
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Produce the argument for this slot.
    pub fn materialize(
        &self,
        context: &DispatchContext,
        request: &dyn CodecRequest,
    ) -> Result<Arg, RpcError> {
        match (self.kind, self.decode) {
            (ParamKind::Context, _) => Ok(Arg::Context(context.clone())),
            (ParamKind::Value, Some(decode)) => decode(request).map(Arg::Value),
            (ParamKind::Value, None) => Err(RpcError::internal(format!(
                "no decoder for parameter of type {}",
                self.type_name
            ))),
        }
    }
}

/// A materialized argument handed to a method thunk.
pub enum Arg {
    Context(DispatchContext),
    Value(Box<dyn Any + Send>),
}

impl std::fmt::Debug for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Context(ctx) => f.debug_tuple("Context").field(&ctx.request_id()).finish(),
            Self::Value(_) => f.write_str("Value(..)"),
        }
    }
}

impl Arg {
    pub fn into_value<A: 'static>(self) -> Result<A, RpcError> {
        match self {
            Self::Value(value) => value.downcast::<A>().map(|v| *v).map_err(|_| {
                RpcError::internal(format!(
                    "argument is not a {}",
                    std::any::type_name::<A>()
                ))
            }),
            Self::Context(_) => Err(RpcError::internal(
                "expected a decoded argument, got the dispatch context",
            )),
        }
    }

    pub fn into_context(self) -> Result<DispatchContext, RpcError> {
        match self {
            Self::Context(ctx) => Ok(ctx),
            Self::Value(_) => Err(RpcError::internal(
                "expected the dispatch context, got a decoded argument",
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Specs
// ─────────────────────────────────────────────────────────────────────────────

/// A callable method: its declared parameters and its bound thunk.
#[derive(Clone)]
pub struct MethodSpec {
    name: String,
    params: Vec<ParamSpec>,
    call: Thunk,
}

impl std::fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl MethodSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Declared parameters, not counting the context slot.
    pub fn arity(&self) -> usize {
        self.params
            .iter()
            .filter(|p| p.kind == ParamKind::Value)
            .count()
    }

    pub fn takes_context(&self) -> bool {
        self.params.iter().any(|p| p.kind == ParamKind::Context)
    }

    pub fn invoke(&self, receiver: &Receiver, args: Vec<Arg>) -> CallResult {
        (self.call)(receiver, args)
    }
}

/// A registered receiver and its methods. Immutable once in the table.
pub struct ServiceSpec {
    name: String,
    type_name: &'static str,
    receiver: Arc<Receiver>,
    methods: HashMap<String, MethodSpec>,
}

impl std::fmt::Debug for ServiceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceSpec")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ServiceSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn receiver(&self) -> &Receiver {
        self.receiver.as_ref()
    }

    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.get(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Service declaration
// ─────────────────────────────────────────────────────────────────────────────

/// Declares a service: a receiver plus the methods exposed on it.
///
/// ```ignore
/// let arith = Service::new(Arith)
///     .method("Multiply", Arith::multiply)
///     .method_ctx0("Whoami", Arith::whoami);
/// ```
pub struct Service<T> {
    receiver: Arc<T>,
    name: Option<String>,
    methods: Vec<MethodSpec>,
}

fn next_arg(args: &mut std::vec::IntoIter<Arg>) -> Result<Arg, RpcError> {
    args.next()
        .ok_or_else(|| RpcError::internal("missing argument"))
}

fn reply<R, E>(result: Result<R, E>) -> CallResult
where
    R: Serialize,
    E: Into<BoxError>,
{
    let value = result.map_err(Into::<BoxError>::into)?;
    serde_json::to_value(value)
        .map_err(|e| RpcError::internal(format!("cannot encode result: {e}")).into())
}

/// `my_crate::arith::Arith<u8>` → `Arith`.
fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

impl<T: Send + Sync + 'static> Service<T> {
    pub fn new(receiver: T) -> Self {
        Self::from_arc(Arc::new(receiver))
    }

    pub fn from_arc(receiver: Arc<T>) -> Self {
        Self {
            receiver,
            name: None,
            methods: Vec::new(),
        }
    }

    /// Override the name inferred from the receiver type. An empty name
    /// keeps the inferred one.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// Name the service will be registered under.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(short_type_name::<T>())
    }

    /// Add a method with an explicit descriptor list.
    ///
    /// `call` receives the arguments in declaration order.
    pub fn raw_method<F>(mut self, name: &str, params: Vec<ParamSpec>, call: F) -> Self
    where
        F: Fn(&T, Vec<Arg>) -> CallResult + Send + Sync + 'static,
    {
        let thunk: Thunk = Arc::new(move |receiver: &Receiver, args: Vec<Arg>| {
            let receiver = receiver.downcast_ref::<T>().ok_or_else(|| {
                RpcError::internal(format!(
                    "receiver is not a {}",
                    std::any::type_name::<T>()
                ))
            })?;
            call(receiver, args)
        });
        self.methods.push(MethodSpec {
            name: name.to_string(),
            params,
            call: thunk,
        });
        self
    }

    /// A method with no params.
    pub fn method0<R, E, F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> Result<R, E> + Send + Sync + 'static,
        R: Serialize,
        E: Into<BoxError>,
    {
        self.raw_method(name, Vec::new(), move |receiver, _args| reply(f(receiver)))
    }

    /// A method taking one by-name params value.
    pub fn method<A, R, E, F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T, A) -> Result<R, E> + Send + Sync + 'static,
        A: DeserializeOwned + Default + Send + 'static,
        R: Serialize,
        E: Into<BoxError>,
    {
        self.raw_method(name, vec![ParamSpec::value::<A>()], move |receiver, args| {
            let mut args = args.into_iter();
            let a = next_arg(&mut args)?.into_value::<A>()?;
            reply(f(receiver, a))
        })
    }

    /// A method taking only the dispatch context.
    pub fn method_ctx0<R, E, F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T, &DispatchContext) -> Result<R, E> + Send + Sync + 'static,
        R: Serialize,
        E: Into<BoxError>,
    {
        self.raw_method(name, vec![ParamSpec::context()], move |receiver, args| {
            let mut args = args.into_iter();
            let ctx = next_arg(&mut args)?.into_context()?;
            reply(f(receiver, &ctx))
        })
    }

    /// A method taking the dispatch context and one params value.
    pub fn method_ctx<A, R, E, F>(self, name: &str, f: F) -> Self
    where
        F: Fn(&T, &DispatchContext, A) -> Result<R, E> + Send + Sync + 'static,
        A: DeserializeOwned + Default + Send + 'static,
        R: Serialize,
        E: Into<BoxError>,
    {
        self.raw_method(
            name,
            vec![ParamSpec::context(), ParamSpec::value::<A>()],
            move |receiver, args| {
                let mut args = args.into_iter();
                let ctx = next_arg(&mut args)?.into_context()?;
                let a = next_arg(&mut args)?.into_value::<A>()?;
                reply(f(receiver, &ctx, a))
            },
        )
    }

    /// Check every method's shape and freeze the service.
    fn into_spec(self) -> Result<ServiceSpec, RegistrationError> {
        let name = self.name().to_string();
        if name.is_empty() || name.contains('.') {
            return Err(RegistrationError::InvalidServiceName(name));
        }
        if self.methods.is_empty() {
            return Err(RegistrationError::NoMethods(name));
        }

        let mut methods = HashMap::with_capacity(self.methods.len());
        for method in self.methods {
            let exported = method.name.chars().next().is_some_and(char::is_uppercase);
            if !exported || method.name.contains('.') {
                return Err(RegistrationError::UnexportedMethod {
                    service: name,
                    method: method.name,
                });
            }
            if let Some(position) = method
                .params
                .iter()
                .enumerate()
                .skip(1)
                .find(|(_, p)| p.kind == ParamKind::Context)
                .map(|(i, _)| i)
            {
                return Err(RegistrationError::MisplacedContext {
                    service: name,
                    method: method.name,
                    position,
                });
            }
            if methods.contains_key(&method.name) {
                return Err(RegistrationError::DuplicateMethod {
                    service: name,
                    method: method.name,
                });
            }
            debug!("{}.{} accepted ({} params)", name, method.name, method.arity());
            methods.insert(method.name.clone(), method);
        }

        Ok(ServiceSpec {
            name,
            type_name: std::any::type_name::<T>(),
            receiver: self.receiver,
            methods,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Method table
// ─────────────────────────────────────────────────────────────────────────────

/// `"Service.Method"` → method, grouped by service.
///
/// Written only during setup; read concurrently without locks afterwards.
#[derive(Debug, Default)]
pub struct MethodTable {
    services: HashMap<String, ServiceSpec>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a service. Returns the name it was stored under.
    pub fn register<T: Send + Sync + 'static>(
        &mut self,
        service: Service<T>,
    ) -> Result<String, RegistrationError> {
        let spec = service.into_spec()?;
        if self.services.contains_key(&spec.name) {
            return Err(RegistrationError::DuplicateService(spec.name));
        }
        let name = spec.name.clone();
        info!("Registering service: {} ({} methods)", name, spec.methods.len());
        self.services.insert(name.clone(), spec);
        Ok(name)
    }

    /// Resolve a dotted `Service.Method` name.
    pub fn lookup(&self, dotted: &str) -> Result<(&ServiceSpec, &MethodSpec), RpcError> {
        let Some((service_name, method_name)) = dotted
            .split_once('.')
            .filter(|(_, m)| !m.contains('.'))
        else {
            return Err(RpcError::method_not_found(format!(
                "rpc: service/method request ill-formed: {dotted:?}"
            )));
        };

        let service = self.services.get(service_name).ok_or_else(|| {
            RpcError::method_not_found(format!("rpc: can't find service {dotted:?}"))
        })?;
        let method = service.method(method_name).ok_or_else(|| {
            RpcError::method_not_found(format!("rpc: can't find method {dotted:?}"))
        })?;
        Ok((service, method))
    }

    pub fn has_method(&self, dotted: &str) -> bool {
        self.lookup(dotted).is_ok()
    }

    /// Every dotted method name, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .values()
            .flat_map(|s| s.methods.keys().map(move |m| format!("{}.{}", s.name, m)))
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.services.values().map(|s| s.methods.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
