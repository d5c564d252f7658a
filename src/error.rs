//! Error types for the security-decision layer.

use thiserror::Error;

/// Result type alias for the security-decision layer.
pub type Result<T> = std::result::Result<T, Error>;

/// Security-decision layer errors.
///
/// "No handler matched" is deliberately **not** an error: selection returns
/// `Ok(None)` and the caller decides the HTTP response. Likewise, duplicate
/// subscription register/unregister calls are logged no-ops, never errors,
/// because control-plane sync feeds legitimately redeliver events.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration or data error, including malformed client-certificate
    /// material on a subscription. Fails the enclosing operation loudly and
    /// leaves registry state unchanged.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed token, surfaced on first lazy access of its claims or
    /// headers. A token that is never inspected never raises this.
    #[error("Token parse error: {0}")]
    TokenParse(String),

    /// An authentication handler's `can_handle` or `handle` evaluation
    /// failed. Propagated unmodified by the selector; the gateway maps this
    /// to its standard authentication-failure response.
    #[error("Authentication handler '{handler}' failed: {source}")]
    Handler {
        /// Name of the failing handler.
        handler: String,
        /// The handler's own error, untouched.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Wrap a handler evaluation failure, preserving the original error.
    pub fn handler(
        name: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Handler {
            handler: name.into(),
            source: source.into(),
        }
    }
}
