//! Authentication handler resolution.
//!
//! On every inbound request the gateway must decide, deterministically and
//! cheaply, which authentication mechanism governs the request. This module
//! owns that decision:
//!
//! ```text
//! request
//!   → SecurityResolver
//!   → HandlerSelector        (sequential pass, token-type short-circuit)
//!   → HandlerRegistry        (ordered snapshot of discovered handlers)
//!   → selected handler       (or none)
//!   → handler's policy chain (consumed by the flow executor)
//! ```
//!
//! # Modules
//!
//! - [`handler`]: the [`AuthenticationHandler`] capability trait, the
//!   per-request [`AuthenticationContext`], and the plugin boundary
//! - [`registry`]: discovery, enhancement, priority ordering
//! - [`selector`]: the selection algorithm
//! - [`resolver`]: glue producing the policy chain for the flow executor

pub mod handler;
pub mod registry;
pub mod resolver;
pub mod selector;

pub use handler::{
    AuthenticationContext, AuthenticationHandler, DEFAULT_HANDLER_ORDER, ExecutionPhase,
    HandlerProvider, InboundRequest, RequestParts, SecurityPolicy, StaticHandlerProvider,
};
pub use registry::{HandlerEnhancer, HandlerRegistry, allowlist_enhancer};
pub use resolver::{ResolvedSecurity, SecurityResolver};
pub use selector::HandlerSelector;
