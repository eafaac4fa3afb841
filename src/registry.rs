//! Tag-keyed dispatch registry
//!
//! A [`Registry`] maps each envelope tag to a route that decodes the inner
//! object and calls a handler. Adding a kind means registering one more
//! route; [`Registry::dispatch`] itself never changes.
//!
//! Dispatch never fails. Every protocol error (no tag, unknown tag, bad
//! object) becomes an [`ErrorResponse`] and is handed back through the
//! output type's `From<ErrorResponse>` impl.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ProtocolError;
use crate::message::{
    self, ErrorResponse, Kind, LoginRequest, LoginResponse, MessageRequest, MessageResponse,
};

type Route<S, R> = Box<dyn Fn(&mut S, &Value) -> Result<R, ProtocolError> + Send + Sync>;

/// Handlers for the request kinds a client sends
pub trait RequestVisitor {
    type Output: From<ErrorResponse>;

    fn visit_login(&mut self, request: LoginRequest) -> Self::Output;

    fn visit_message(&mut self, request: MessageRequest) -> Self::Output;
}

/// Handlers for the response kinds the relay sends
pub trait ResponseVisitor {
    type Output: From<ErrorResponse>;

    fn visit_login(&mut self, response: LoginResponse) -> Self::Output;

    fn visit_message(&mut self, response: MessageResponse) -> Self::Output;

    /// Relay-reported errors; forwarded as-is unless overridden
    fn visit_error(&mut self, response: ErrorResponse) -> Self::Output {
        Self::Output::from(response)
    }
}

/// Table of `tag → (decode, handle)` routes
///
/// `S` is the state handlers mutate, `R` what they produce.
pub struct Registry<S, R> {
    label: &'static str,
    routes: HashMap<&'static str, Route<S, R>>,
}

impl<S, R> Registry<S, R>
where
    S: 'static,
    R: From<ErrorResponse> + 'static,
{
    /// Create an empty registry; `label` only shows up in logs
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            routes: HashMap::new(),
        }
    }

    /// Register a handler for kind `K`
    ///
    /// Tags are unique: registering the same kind twice replaces the earlier route.
    pub fn register<K, F>(&mut self, handler: F) -> &mut Self
    where
        K: Kind + 'static,
        F: Fn(&mut S, K) -> R + Send + Sync + 'static,
    {
        let route: Route<S, R> = Box::new(move |state, object| {
            let decoded = message::decode_object::<K>(object)?;
            Ok(handler(state, decoded))
        });

        if self.routes.insert(K::TAG, route).is_some() {
            warn!(registry = self.label, tag = K::TAG, "replaced existing route");
        }
        self
    }

    /// Registered tags, in no particular order
    pub fn tags(&self) -> Vec<&'static str> {
        self.routes.keys().copied().collect()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.routes.contains_key(tag)
    }

    /// Route a tree, surfacing protocol errors
    pub fn try_dispatch(&self, state: &mut S, tree: &Value) -> Result<R, ProtocolError> {
        let (tag, object) = message::split(tree)?;

        let route = self
            .routes
            .get(tag)
            .ok_or_else(|| ProtocolError::UnknownType {
                tag: tag.to_string(),
            })?;

        debug!(registry = self.label, tag, "dispatching");
        route(state, object)
    }

    /// Route a tree; protocol errors come back as an `ErrorResponse`
    pub fn dispatch(&self, state: &mut S, tree: &Value) -> R {
        match self.try_dispatch(state, tree) {
            Ok(output) => output,
            Err(err) => {
                debug!(registry = self.label, error = %err, "rejecting envelope");
                R::from(ErrorResponse::from(err))
            }
        }
    }
}

impl<S> Registry<S, S::Output>
where
    S: RequestVisitor + 'static,
{
    /// Registry for the kinds clients send to the relay
    pub fn requests() -> Self {
        let mut registry = Registry::new("request");
        registry
            .register(|state: &mut S, request: LoginRequest| state.visit_login(request))
            .register(|state: &mut S, request: MessageRequest| state.visit_message(request));
        registry
    }
}

impl<S> Registry<S, S::Output>
where
    S: ResponseVisitor + 'static,
{
    /// Registry for the kinds the relay sends to clients
    pub fn responses() -> Self {
        let mut registry = Registry::new("response");
        registry
            .register(|state: &mut S, response: LoginResponse| state.visit_login(response))
            .register(|state: &mut S, response: MessageResponse| state.visit_message(response))
            .register(|state: &mut S, response: ErrorResponse| state.visit_error(response));
        registry
    }
}
