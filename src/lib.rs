//! Security-decision layer for an API gateway.
//!
//! For every inbound request the gateway must pick, deterministically and
//! cheaply, which authentication mechanism governs the request (API key,
//! JWT, OAuth2, mutual TLS, or keyless) and it must keep a live,
//! per-subscription inventory of mutual-TLS trust material consultable both
//! at TLS handshake time and at request time. This crate owns those two
//! subsystems and nothing else: the HTTP/TLS listeners, the flow executor
//! that runs the returned policy chain, and the plugin loader that supplies
//! handler implementations are all external collaborators behind small
//! traits.
//!
//! # Subsystems
//!
//! - [`security`]: handler registry, priority-ordered selection with
//!   token-type short-circuiting, and policy-chain resolution
//! - [`truststore`]: per-subscription certificate trust stores shared
//!   across listeners, with digest-based certificate-to-subscription lookup
//! - [`token`]: bearer credential extraction and lazy token parsing
//! - [`config`]: the layer's configuration surface
//!
//! This crate decides *which* authenticator applies, never whether the
//! caller is authorized, and it manages trust-anchor inventory without
//! implementing any TLS handshake cryptography.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod security;
pub mod token;
pub mod truststore;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging for embedders that do not bring their own
/// subscriber.
///
/// # Errors
///
/// Currently infallible; returns `Result` so the signature can grow
/// validation without breaking callers.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}
