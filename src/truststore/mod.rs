//! Subscription-scoped mutual-TLS trust material.
//!
//! Whenever a subscription carrying client-certificate material is created or
//! updated, the control-plane sync feed pushes it here. The registry builds
//! exactly one [`CertificateTrustStore`] per subscription, shares that single
//! instance with every relevant listener's trust-store manager, and keeps a
//! digest index so the TLS handshake layer can map an incoming client
//! certificate back to the subscription that authorised it.
//!
//! ```text
//! control plane ── register/unregister ──► TrustStoreRegistry
//!                                             │        │
//!                         per-listener managers        digest index
//!                         (start/stop the shared       (api, digest, plan)
//!                          CertificateTrustStore)       → Subscription
//! ```
//!
//! # Modules
//!
//! - [`store`]: the per-subscription loadable/unloadable trust-anchor unit
//! - [`registry`]: coordination across listeners plus digest-based lookup

pub mod registry;
pub mod store;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use registry::TrustStoreRegistry;
pub use store::{
    CertificateTrustStore, EventSink, SUBSCRIPTION_STORE_ID_PREFIX, TrustStoreEvent,
    TrustStoreState, certificate_digest,
};

/// A consumer's grant to call an API through a plan, as delivered by the
/// control-plane sync feed.
///
/// `client_certificate` is a base64-encoded PEM blob that may itself bundle
/// several concatenated PEM certificates (e.g. leaf plus intermediate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subscription id.
    pub id: String,
    /// The API this subscription grants access to.
    pub api_id: String,
    /// The plan the grant was made under.
    pub plan_id: String,
    /// Base64-encoded PEM certificate material, possibly a bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
}

/// Listener-scoped trust-store manager (external collaborator).
///
/// One per network listener ("server"). Receives the shared store instance
/// and independently decides when to call `start()` on it; the store's
/// idempotent state machine absorbs N listeners racing to start or stop.
pub trait TrustStoreManager: Send + Sync {
    /// Hand the shared trust-store instance to this listener.
    fn register_loader(&self, loader: Arc<CertificateTrustStore>);
}
