//! Handler registry: discovery, enhancement, and priority ordering.
//!
//! Built once at startup, then read-only for selectors. A reload republishes
//! the sorted list atomically (copy-on-write swap), so in-flight selections
//! never observe a partially updated list.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::security::handler::{AuthenticationHandler, HandlerProvider};

/// Pure post-discovery transformation of the handler list, applied before
/// sorting. Typical use: a tenant-specific allow-list filter.
pub type HandlerEnhancer =
    Box<dyn Fn(Vec<Arc<dyn AuthenticationHandler>>) -> Vec<Arc<dyn AuthenticationHandler>> + Send + Sync>;

/// Registry of available authentication handlers, pre-sorted by priority.
///
/// The published list is an `Arc` snapshot behind an `RwLock`: readers clone
/// the `Arc` (no contention on the hot path), and [`initialize`] swaps in a
/// fully built replacement in one write.
///
/// [`initialize`]: HandlerRegistry::initialize
pub struct HandlerRegistry {
    provider: Box<dyn HandlerProvider>,
    enhancer: Option<HandlerEnhancer>,
    handlers: RwLock<Arc<Vec<Arc<dyn AuthenticationHandler>>>>,
}

impl HandlerRegistry {
    /// Create a registry over a handler provider. Empty until
    /// [`initialize`](HandlerRegistry::initialize) is called.
    #[must_use]
    pub fn new(provider: Box<dyn HandlerProvider>) -> Self {
        Self {
            provider,
            enhancer: None,
            handlers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Create a registry with an enhancer applied on every (re)initialization.
    #[must_use]
    pub fn with_enhancer(provider: Box<dyn HandlerProvider>, enhancer: HandlerEnhancer) -> Self {
        Self {
            provider,
            enhancer: Some(enhancer),
            handlers: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// Load handlers from the provider, apply the enhancer if configured,
    /// sort by ascending `order` (stable, so equal orders keep discovery
    /// order), and atomically publish the result.
    ///
    /// Calling this again is an explicit reload with the same atomic-swap
    /// discipline. A provider yielding zero handlers publishes an empty list;
    /// "no handler" is a normal outcome for selectors, not an error.
    pub fn initialize(&self) {
        let mut handlers = self.provider.provide();

        if let Some(enhancer) = &self.enhancer {
            handlers = enhancer(handlers);
        }

        handlers.sort_by_key(|h| h.order());

        debug!(count = handlers.len(), "Authentication handlers initialized");
        *self.handlers.write() = Arc::new(handlers);
    }

    /// Snapshot of the ordered handler list.
    #[must_use]
    pub fn handlers(&self) -> Arc<Vec<Arc<dyn AuthenticationHandler>>> {
        self.handlers.read().clone()
    }
}

/// Enhancer retaining only handlers whose name appears in `names`.
///
/// Wired from `security.handler_allowlist` in the configuration.
#[must_use]
pub fn allowlist_enhancer(names: Vec<String>) -> HandlerEnhancer {
    Box::new(move |handlers| {
        handlers
            .into_iter()
            .filter(|h| names.iter().any(|n| n == h.name()))
            .collect()
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
