//! Configuration for the security-decision layer.
//!
//! The gateway embeds this crate, so the configuration surface is small: the
//! query-parameter name consulted by the token extractor and an optional
//! allow-list restricting which authentication handlers are selectable.
//!
//! # Example YAML
//!
//! ```yaml
//! security:
//!   token_query_parameter: "access_token"
//!   handler_allowlist:
//!     - "api-key"
//!     - "jwt"
//! ```
//!
//! Environment variables prefixed with `APIM_SECURITY_` override file values,
//! e.g. `APIM_SECURITY_SECURITY__TOKEN_QUERY_PARAMETER=token`.

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default query parameter carrying a bearer token when no
/// `Authorization` header is present.
pub const DEFAULT_TOKEN_QUERY_PARAMETER: &str = "access_token";

/// Top-level configuration file shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Security-decision layer settings.
    pub security: SecurityConfig,
}

/// Security-decision layer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Query parameter consulted by the token extractor when no
    /// `Authorization: Bearer` header is present.
    pub token_query_parameter: String,

    /// When set, only handlers whose `name` appears here survive registry
    /// initialization. Used for tenant-specific handler restrictions.
    pub handler_allowlist: Option<Vec<String>>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            token_query_parameter: DEFAULT_TOKEN_QUERY_PARAMETER.to_string(),
            handler_allowlist: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional YAML file with an
    /// `APIM_SECURITY_` environment overlay.
    ///
    /// Precedence, lowest to highest: built-in defaults, YAML file,
    /// environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed, or if the
    /// merged configuration fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(p) = path {
            figment = figment.merge(Yaml::file(p));
        }

        figment = figment.merge(Env::prefixed("APIM_SECURITY_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::Config(format!("Failed to load configuration: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the merged configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the token query parameter is empty or the
    /// allow-list contains an empty handler name.
    pub fn validate(&self) -> Result<()> {
        if self.security.token_query_parameter.trim().is_empty() {
            return Err(Error::Config(
                "security.token_query_parameter must not be empty".to_string(),
            ));
        }

        if let Some(allowlist) = &self.security.handler_allowlist {
            if allowlist.iter().any(|name| name.trim().is_empty()) {
                return Err(Error::Config(
                    "security.handler_allowlist entries must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
