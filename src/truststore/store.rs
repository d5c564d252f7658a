//! Per-subscription trust-anchor unit with an idempotent lifecycle.
//!
//! One store owns the decoded certificate set of exactly one subscription.
//! The registry shares a single instance across every listener the
//! subscription is registered with; listeners call [`start`] and [`stop`]
//! independently, and the compare-exchange state machine guarantees exactly
//! one load event and exactly one unload event no matter how many listeners
//! race.
//!
//! [`start`]: CertificateTrustStore::start
//! [`stop`]: CertificateTrustStore::stop

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parking_lot::RwLock;
use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};
use tracing::debug;
use x509_parser::parse_x509_certificate;
use x509_parser::pem::Pem;

use crate::truststore::Subscription;
use crate::{Error, Result};

/// Prefix of every subscription trust-store id.
pub const SUBSCRIPTION_STORE_ID_PREFIX: &str = "subscription_cert_";

// State machine: Created → Started → Stopped, no way back.
const CREATED: u8 = 0;
const STARTED: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle state of a [`CertificateTrustStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustStoreState {
    /// Built, not yet published to the TLS layer.
    Created,
    /// Load event emitted; trust anchors live.
    Started,
    /// Unload event emitted; terminal.
    Stopped,
}

/// Lifecycle event delivered to the registry-assigned sink.
#[derive(Debug, Clone)]
pub enum TrustStoreEvent {
    /// The store's certificate set became live.
    Load {
        /// Store id (`subscription_cert_<subscription id>`).
        id: String,
        /// The decoded certificate set.
        certificates: Vec<CertificateDer<'static>>,
    },
    /// The store was retired.
    Unload {
        /// Store id.
        id: String,
    },
}

/// Event callback assigned by the registry. Single-owner by design: only the
/// most recently assigned sink receives events.
pub type EventSink = Arc<dyn Fn(TrustStoreEvent) + Send + Sync>;

/// Trust-anchor unit for one subscription's client-certificate material.
pub struct CertificateTrustStore {
    id: String,
    subscription_id: String,
    certificates: Vec<CertificateDer<'static>>,
    state: AtomicU8,
    sink: RwLock<Option<EventSink>>,
}

impl CertificateTrustStore {
    /// Decode a subscription's certificate material into a new store.
    ///
    /// Every PEM `CERTIFICATE` block in the (possibly bundled) material is
    /// decoded and DER-validated independently; all of them belong to this
    /// one store.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when the subscription carries no certificate
    /// material, the base64 or PEM envelope is malformed, any certificate
    /// fails DER validation, or the bundle contains no certificate at all.
    pub fn from_subscription(subscription: &Subscription) -> Result<Self> {
        let material = subscription
            .client_certificate
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Subscription '{}' has no client certificate material",
                    subscription.id
                ))
            })?;

        let certificates = decode_bundle(&subscription.id, material)?;

        Ok(Self {
            id: format!("{SUBSCRIPTION_STORE_ID_PREFIX}{}", subscription.id),
            subscription_id: subscription.id.clone(),
            certificates,
            state: AtomicU8::new(CREATED),
            sink: RwLock::new(None),
        })
    }

    /// Deterministic store id: `subscription_cert_<subscription id>`.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The owning subscription's id.
    #[must_use]
    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// The decoded certificate set.
    #[must_use]
    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }

    /// Digest of every certificate in this store, in bundle order.
    #[must_use]
    pub fn digests(&self) -> Vec<String> {
        self.certificates.iter().map(certificate_digest).collect()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TrustStoreState {
        match self.state.load(Ordering::Acquire) {
            CREATED => TrustStoreState::Created,
            STARTED => TrustStoreState::Started,
            _ => TrustStoreState::Stopped,
        }
    }

    /// Assign the event sink. Last assignment wins; there is no multicast.
    pub fn set_event_sink(&self, sink: EventSink) {
        *self.sink.write() = Some(sink);
    }

    /// Publish this store's certificates.
    ///
    /// Transitions `Created → Started` and emits a single load event. Any
    /// further call, from any listener, is a no-op; the compare-exchange
    /// makes the exactly-once guarantee hold under concurrent starts.
    pub fn start(&self) {
        if self
            .state
            .compare_exchange(CREATED, STARTED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        debug!(id = %self.id, certificates = self.certificates.len(), "Trust store started");
        self.emit(TrustStoreEvent::Load {
            id: self.id.clone(),
            certificates: self.certificates.clone(),
        });
    }

    /// Retire this store.
    ///
    /// Transitions `Started → Stopped` and emits a single unload event.
    /// A store that was never started, or is already stopped, is left
    /// untouched.
    pub fn stop(&self) {
        if self
            .state
            .compare_exchange(STARTED, STOPPED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        debug!(id = %self.id, "Trust store stopped");
        self.emit(TrustStoreEvent::Unload {
            id: self.id.clone(),
        });
    }

    fn emit(&self, event: TrustStoreEvent) {
        if let Some(sink) = self.sink.read().as_ref() {
            sink(event);
        }
    }
}

impl std::fmt::Debug for CertificateTrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateTrustStore")
            .field("id", &self.id)
            .field("certificates", &self.certificates.len())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Lowercase hex SHA-256 over the certificate's DER bytes.
///
/// Both the digest index and the handshake layer must use this function so
/// lookups agree on the key.
#[must_use]
pub fn certificate_digest(certificate: &CertificateDer<'_>) -> String {
    hex::encode(Sha256::digest(certificate.as_ref()))
}

/// Decode a base64-encoded PEM blob (or raw PEM, which some control planes
/// send) into individually validated DER certificates.
fn decode_bundle(subscription_id: &str, material: &str) -> Result<Vec<CertificateDer<'static>>> {
    let pem_bytes = if material.starts_with("-----BEGIN") {
        material.as_bytes().to_vec()
    } else {
        let compact: String = material.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(compact.as_bytes()).map_err(|e| {
            Error::Config(format!(
                "Subscription '{subscription_id}': certificate material is not valid base64: {e}"
            ))
        })?
    };

    let mut certificates = Vec::new();
    for pem in Pem::iter_from_buffer(&pem_bytes) {
        let pem = pem.map_err(|e| {
            Error::Config(format!(
                "Subscription '{subscription_id}': malformed PEM block in certificate bundle: {e}"
            ))
        })?;

        if pem.label != "CERTIFICATE" {
            continue;
        }

        parse_x509_certificate(&pem.contents).map_err(|e| {
            Error::Config(format!(
                "Subscription '{subscription_id}': invalid certificate in bundle: {e}"
            ))
        })?;

        certificates.push(CertificateDer::from(pem.contents));
    }

    if certificates.is_empty() {
        return Err(Error::Config(format!(
            "Subscription '{subscription_id}': certificate material contains no certificate"
        )));
    }

    Ok(certificates)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
