//! Bearer credential extraction from request headers and query parameters.

use crate::security::InboundRequest;

/// Header consulted first for a bearer credential.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Authorization scheme recognised by the extractor. The match is an exact,
/// case-sensitive prefix match; other schemes (`Basic`, ...) are ignored.
pub const BEARER_SCHEME: &str = "Bearer";

/// Pull a bearer credential out of a request.
///
/// Precedence:
///
/// 1. An `Authorization` header whose value starts with the literal `Bearer`
///    prefix. Everything after the prefix and its following single space is
///    returned; `"Bearer"` alone yields `Some("")`, not `None`.
/// 2. The first value of `query_parameter` (conventionally `access_token`).
/// 3. `None`.
#[must_use]
pub fn extract(request: &dyn InboundRequest, query_parameter: &str) -> Option<String> {
    if let Some(value) = request.header(AUTHORIZATION_HEADER) {
        if let Some(rest) = value.strip_prefix(BEARER_SCHEME) {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            return Some(rest.to_string());
        }
    }

    request
        .query_parameter(query_parameter)
        .map(str::to_owned)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
