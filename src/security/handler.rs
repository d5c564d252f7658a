//! Authentication handler capability trait and per-request context.
//!
//! Handlers are pluggable components, each implementing one authentication
//! mechanism (API key, JWT, OAuth2, mTLS, keyless, ...). They are supplied by
//! an external plugin mechanism through a [`HandlerProvider`] and registered
//! into the [`HandlerRegistry`](crate::security::HandlerRegistry) at startup
//! via explicit registration, with no reflection-based discovery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Inbound request boundary
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only view of the inbound request, as much of it as handler selection
/// needs. The HTTP/TLS listener implementation behind this trait is out of
/// scope for this crate.
pub trait InboundRequest: Send + Sync {
    /// First value of the named header. Lookup is case-insensitive.
    fn header(&self, name: &str) -> Option<&str>;

    /// First value of the named query parameter.
    fn query_parameter(&self, name: &str) -> Option<&str>;
}

/// Owned [`InboundRequest`] implementation for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
}

impl RequestParts {
    /// Create an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a query parameter value.
    #[must_use]
    pub fn with_query_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

impl InboundRequest for RequestParts {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn query_parameter(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authentication context
// ─────────────────────────────────────────────────────────────────────────────

/// Per-request context for one handler-selection pass.
///
/// Wraps the inbound request plus a read/write attribute bag that handlers
/// may use to pass data to the policies they produce. Created per request,
/// discarded after a handler is chosen or none matches.
pub struct AuthenticationContext {
    request: Arc<dyn InboundRequest>,
    attributes: HashMap<String, Value>,
    /// Whether the handler currently under evaluation is the last candidate
    /// sharing its token type. Set by the selector before every `can_handle`
    /// call; handlers that are not the last of their type may defer expensive
    /// checks to the authoritative (last) candidate.
    last_token_type_candidate: bool,
}

impl AuthenticationContext {
    /// Create a context over an inbound request.
    pub fn new(request: Arc<dyn InboundRequest>) -> Self {
        Self {
            request,
            attributes: HashMap::new(),
            last_token_type_candidate: false,
        }
    }

    /// The inbound request under evaluation.
    #[must_use]
    pub fn request(&self) -> &dyn InboundRequest {
        self.request.as_ref()
    }

    /// Look up an attribute set earlier in this selection pass.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Set an attribute for the remainder of this selection pass.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        self.attributes.insert(name.into(), value);
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// `true` when the handler currently under evaluation is the last
    /// candidate sharing its token type, and is therefore the one trusted to
    /// make the authoritative accept/reject decision.
    #[must_use]
    pub fn is_last_token_type_candidate(&self) -> bool {
        self.last_token_type_candidate
    }

    /// Selector-internal: recomputed once per candidate, before `can_handle`.
    pub(crate) fn set_last_token_type_candidate(&mut self, last: bool) {
        self.last_token_type_candidate = last;
    }
}

impl std::fmt::Debug for AuthenticationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationContext")
            .field("attributes", &self.attributes)
            .field("last_token_type_candidate", &self.last_token_type_candidate)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policies
// ─────────────────────────────────────────────────────────────────────────────

/// Phase of request processing a policy chain applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPhase {
    /// Inbound request phase.
    Request,
    /// Outbound response phase.
    Response,
}

/// One policy in the chain a handler hands to the flow executor.
///
/// The executor resolving `name` to an implementation is an external
/// collaborator; this crate only names policies and carries their
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Policy name, resolved by the flow executor.
    pub name: String,
    /// Opaque policy configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
}

impl SecurityPolicy {
    /// Policy with no configuration.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configuration: None,
        }
    }

    /// Policy with a configuration payload.
    pub fn configured(name: impl Into<String>, configuration: Value) -> Self {
        Self {
            name: name.into(),
            configuration: Some(configuration),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler capability
// ─────────────────────────────────────────────────────────────────────────────

/// Default handler order when an implementation does not override it.
pub const DEFAULT_HANDLER_ORDER: i32 = 1000;

/// One pluggable authentication mechanism.
///
/// Immutable after registration. `can_handle` may await remote work (e.g.
/// token introspection); the selector awaits each candidate strictly
/// sequentially and stops at the first acceptance.
#[async_trait]
pub trait AuthenticationHandler: Send + Sync {
    /// Unique handler name, e.g. `"api-key"`, `"jwt"`, `"oauth2"`.
    fn name(&self) -> &str;

    /// Sort key: lower orders are tried first. Ties keep discovery order.
    fn order(&self) -> i32 {
        DEFAULT_HANDLER_ORDER
    }

    /// Coarse credential classification (`"bearer"`, `"certificate"`, ...).
    ///
    /// Handlers sharing a token type form a group in which only the last
    /// candidate makes the authoritative decision. `None` means this handler
    /// is never grouped: it is always the last (and only) member of its own
    /// singleton group.
    fn token_type(&self) -> Option<&str> {
        None
    }

    /// Whether this handler can authenticate the request.
    ///
    /// `ctx.is_last_token_type_candidate()` is up to date for this candidate
    /// when called. Errors are propagated unmodified to the caller of
    /// `select`.
    async fn can_handle(&self, ctx: &AuthenticationContext) -> Result<bool>;

    /// Produce the request-time policy chain once this handler is selected.
    fn handle(&self, ctx: &AuthenticationContext) -> Vec<SecurityPolicy>;
}

impl std::fmt::Debug for dyn AuthenticationHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationHandler")
            .field("name", &self.name())
            .field("order", &self.order())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handler discovery
// ─────────────────────────────────────────────────────────────────────────────

/// Source of the raw, unordered handler list (the plugin boundary).
pub trait HandlerProvider: Send + Sync {
    /// All discovered handlers, in discovery order.
    fn provide(&self) -> Vec<Arc<dyn AuthenticationHandler>>;
}

/// [`HandlerProvider`] over an explicit, build-time handler list.
#[derive(Default)]
pub struct StaticHandlerProvider {
    handlers: Vec<Arc<dyn AuthenticationHandler>>,
}

impl StaticHandlerProvider {
    /// Provider over the given handlers, preserving their order as the
    /// discovery order.
    #[must_use]
    pub fn new(handlers: Vec<Arc<dyn AuthenticationHandler>>) -> Self {
        Self { handlers }
    }
}

impl HandlerProvider for StaticHandlerProvider {
    fn provide(&self) -> Vec<Arc<dyn AuthenticationHandler>> {
        self.handlers.clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
