//! Trust-store coordination across listeners plus digest-based lookup.
//!
//! The registry owns one [`CertificateTrustStore`] per subscription and
//! shares that single instance, by reference, with every listener it is
//! registered with. Registration and removal arrive from the control-plane
//! sync feed while [`get_by_certificate`] runs on the request-handling hot
//! path, so both maps are concurrent: lookups never block behind a
//! register/unregister of an unrelated subscription. Register and unregister
//! of the *same* subscription id are mutually exclusive through a
//! per-subscription-id lock held for the whole operation, listener fan-out
//! included, so an unregister can never interleave with a registration still
//! handing the store to listeners.
//!
//! [`get_by_certificate`]: TrustStoreRegistry::get_by_certificate

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::Result;
use crate::truststore::store::{CertificateTrustStore, EventSink};
use crate::truststore::{Subscription, TrustStoreManager};

/// Digest-index key: `(api id, certificate digest, plan id)`.
type DigestKey = (String, String, String);

/// What the registry tracks per registered subscription.
struct RegisteredLoader {
    store: Arc<CertificateTrustStore>,
    digest_keys: Vec<DigestKey>,
}

/// Per-subscription trust-store coordinator.
pub struct TrustStoreRegistry {
    /// Listener-scoped managers, keyed by listener id. Fixed at construction;
    /// listeners themselves are out of scope for this crate.
    listeners: HashMap<String, Arc<dyn TrustStoreManager>>,
    /// At most one store instance per subscription id, shared by reference
    /// across all listeners it is registered with.
    loaders: DashMap<String, RegisteredLoader>,
    /// Reverse index consulted by the mTLS handshake path. Every certificate
    /// of a bundle resolves to the owning subscription.
    digest_index: DashMap<DigestKey, Subscription>,
    /// One mutex per subscription id, serialising register against
    /// unregister for that id. Entries are never removed; removing one
    /// would let a later caller mint a fresh mutex and bypass exclusion.
    registration_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Sink assigned to every store this registry builds.
    event_sink: Option<EventSink>,
}

impl TrustStoreRegistry {
    /// Registry over the given listener managers.
    #[must_use]
    pub fn new(listeners: HashMap<String, Arc<dyn TrustStoreManager>>) -> Self {
        Self {
            listeners,
            loaders: DashMap::new(),
            digest_index: DashMap::new(),
            registration_locks: DashMap::new(),
            event_sink: None,
        }
    }

    /// Assign the event sink handed to every store built from now on.
    #[must_use]
    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Register a subscription's trust material.
    ///
    /// Builds one [`CertificateTrustStore`] from the subscription's
    /// certificate material, indexes every decoded certificate's digest, and
    /// hands the same store instance to the trust-store manager of every
    /// listener named in `listener_ids`, or of **all** known listeners when
    /// `listener_ids` is empty. Each listener independently decides when to
    /// call `start()`.
    ///
    /// Redelivery is expected: a subscription id that is already registered
    /// is logged and left untouched.
    ///
    /// The per-id lock is held until every listener has received the store,
    /// so manager callbacks must not call back into the registry for the
    /// same subscription id.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the certificate material cannot be
    /// decoded; registry state is unchanged in that case.
    pub fn register_subscription(
        &self,
        subscription: &Subscription,
        listener_ids: &[String],
    ) -> Result<()> {
        let lock = self.id_lock(&subscription.id);
        let _guard = lock.lock();

        if self.loaders.contains_key(&subscription.id) {
            debug!(
                "A TrustStoreLoader for subscription {} is already registered",
                subscription.id
            );
            return Ok(());
        }

        // Decode before touching any state so a malformed bundle cannot leave
        // a partial registration behind.
        let store = Arc::new(CertificateTrustStore::from_subscription(subscription)?);
        if let Some(sink) = &self.event_sink {
            store.set_event_sink(sink.clone());
        }

        debug!(
            "Registering TrustStoreLoader for subscription {}",
            subscription.id
        );

        let digest_keys: Vec<DigestKey> = store
            .digests()
            .into_iter()
            .map(|digest| {
                (
                    subscription.api_id.clone(),
                    digest,
                    subscription.plan_id.clone(),
                )
            })
            .collect();

        for key in &digest_keys {
            self.digest_index.insert(key.clone(), subscription.clone());
        }

        self.loaders.insert(
            subscription.id.clone(),
            RegisteredLoader {
                store: store.clone(),
                digest_keys,
            },
        );

        // Still under the per-id lock: an unregister of this id cannot run
        // until every listener has the store, so a stop() always lands on a
        // fully handed-out store.
        for manager in self.target_managers(listener_ids) {
            manager.register_loader(store.clone());
        }

        Ok(())
    }

    /// Remove a subscription's trust material.
    ///
    /// Removes the loader and all of its certificate digests, then calls
    /// `stop()` once on the shared store: one unload event regardless of how
    /// many listeners it was registered with. An unknown subscription id is a
    /// no-op.
    pub fn unregister_subscription(&self, subscription: &Subscription) {
        let lock = self.id_lock(&subscription.id);
        let _guard = lock.lock();

        let Some((_, registered)) = self.loaders.remove(&subscription.id) else {
            return;
        };

        debug!(
            "Stopping TrustStoreLoader for subscription {}",
            subscription.id
        );

        for key in &registered.digest_keys {
            self.digest_index.remove(key);
        }

        registered.store.stop();
    }

    /// Map an incoming client certificate back to the subscription that
    /// authorised it. O(1) expected time; any certificate of a bundle
    /// matches.
    #[must_use]
    pub fn get_by_certificate(
        &self,
        api_id: &str,
        digest: &str,
        plan_id: &str,
    ) -> Option<Subscription> {
        let key: DigestKey = (api_id.to_owned(), digest.to_owned(), plan_id.to_owned());
        self.digest_index.get(&key).map(|entry| entry.value().clone())
    }

    /// Number of registered subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    /// `true` when no subscription is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Whether a subscription id currently has a registered store.
    #[must_use]
    pub fn contains(&self, subscription_id: &str) -> bool {
        self.loaders.contains_key(subscription_id)
    }

    /// The shared store instance for a subscription, if registered.
    #[must_use]
    pub fn loader(&self, subscription_id: &str) -> Option<Arc<CertificateTrustStore>> {
        self.loaders
            .get(subscription_id)
            .map(|entry| entry.store.clone())
    }

    fn id_lock(&self, subscription_id: &str) -> Arc<Mutex<()>> {
        self.registration_locks
            .entry(subscription_id.to_owned())
            .or_default()
            .clone()
    }

    fn target_managers(&self, listener_ids: &[String]) -> Vec<Arc<dyn TrustStoreManager>> {
        if listener_ids.is_empty() {
            self.listeners.values().cloned().collect()
        } else {
            listener_ids
                .iter()
                .filter_map(|id| self.listeners.get(id).cloned())
                .collect()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
