//! Lazy, cached parsing of an opaque bearer token.
//!
//! Signature verification and claim semantics are out of scope here; the
//! token is treated as a JOSE compact serialization whose header and payload
//! segments are base64url-encoded JSON objects. A token that is never queried
//! is never parsed.

use std::sync::{Arc, OnceLock};

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use crate::{Error, Result};

/// JSON object type returned for token headers and claims.
pub type JsonObject = serde_json::Map<String, Value>;

/// Outcome of the one-shot parse, shared by `claims()` and `headers()`.
struct ParsedToken {
    headers: Option<Arc<JsonObject>>,
    claims: Option<Arc<JsonObject>>,
}

/// A raw token string whose parse is deferred until claims or headers are
/// first requested, then cached.
///
/// The parse runs at most once regardless of how many times [`claims`] and
/// [`headers`] are called, and both accessors return the identical cached
/// `Arc` on every call. A parse failure is cached too and returned on every
/// access.
///
/// [`claims`]: LazyToken::claims
/// [`headers`]: LazyToken::headers
pub struct LazyToken {
    raw: String,
    parsed: OnceLock<std::result::Result<ParsedToken, String>>,
}

impl LazyToken {
    /// Wrap a raw token string without parsing it.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            parsed: OnceLock::new(),
        }
    }

    /// The raw token string, untouched.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The token's claim set, parsed and cached on first call.
    ///
    /// Returns `Ok(None)` when the payload segment is absent or not a JSON
    /// object.
    ///
    /// # Errors
    ///
    /// Returns `Error::TokenParse` when the token is structurally malformed.
    pub fn claims(&self) -> Result<Option<Arc<JsonObject>>> {
        Ok(self.parsed()?.claims.clone())
    }

    /// The token's header section, same laziness and caching discipline as
    /// [`claims`](LazyToken::claims) but an independent cache slot.
    ///
    /// # Errors
    ///
    /// Returns `Error::TokenParse` when the token is structurally malformed.
    pub fn headers(&self) -> Result<Option<Arc<JsonObject>>> {
        Ok(self.parsed()?.headers.clone())
    }

    fn parsed(&self) -> Result<&ParsedToken> {
        self.parsed
            .get_or_init(|| parse_compact(&self.raw))
            .as_ref()
            .map_err(|message| Error::TokenParse(message.clone()))
    }
}

impl std::fmt::Debug for LazyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the raw credential.
        f.debug_struct("LazyToken")
            .field("parsed", &self.parsed.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Parse a JOSE compact serialization: `header.payload[.signature]`.
///
/// The signature segment is ignored; verification belongs to the
/// authorization layer, not to selection.
fn parse_compact(raw: &str) -> std::result::Result<ParsedToken, String> {
    let mut segments = raw.split('.');
    let header = segments.next().unwrap_or_default();
    let payload = segments
        .next()
        .ok_or_else(|| "token has no payload segment".to_string())?;

    Ok(ParsedToken {
        headers: decode_segment(header)?.map(Arc::new),
        claims: decode_segment(payload)?.map(Arc::new),
    })
}

/// Decode one base64url segment into a JSON object.
///
/// An empty segment, or JSON that is not an object, yields `None` rather
/// than an error: the token parsed, it just carries no usable set.
fn decode_segment(segment: &str) -> std::result::Result<Option<JsonObject>, String> {
    if segment.is_empty() {
        return Ok(None);
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| format!("invalid base64url segment: {e}"))?;

    let value: Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("segment is not valid JSON: {e}"))?;

    match value {
        Value::Object(object) => Ok(Some(object)),
        _ => Ok(None),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Build an unsigned compact token from header and payload values.
    fn compact_token(header: &Value, payload: &Value) -> String {
        let encode = |v: &Value| URL_SAFE_NO_PAD.encode(serde_json::to_vec(v).unwrap());
        format!("{}.{}.sig-ignored", encode(header), encode(payload))
    }

    fn sample_token() -> LazyToken {
        LazyToken::new(compact_token(
            &json!({"alg": "RS256", "typ": "JWT"}),
            &json!({"sub": "subscription-1", "iss": "gateway"}),
        ))
    }

    #[test]
    fn claims_are_parsed_from_the_payload_segment() {
        let token = sample_token();
        let claims = token.claims().unwrap().unwrap();
        assert_eq!(claims["sub"], json!("subscription-1"));
        assert_eq!(claims["iss"], json!("gateway"));
    }

    #[test]
    fn headers_are_parsed_from_the_header_segment() {
        let token = sample_token();
        let headers = token.headers().unwrap().unwrap();
        assert_eq!(headers["alg"], json!("RS256"));
    }

    #[test]
    fn claims_called_twice_return_the_identical_cached_instance() {
        let token = sample_token();
        let first = token.claims().unwrap().unwrap();
        let second = token.claims().unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn headers_and_claims_share_one_parse_but_separate_slots() {
        let token = sample_token();
        let headers = token.headers().unwrap().unwrap();
        let claims = token.claims().unwrap().unwrap();

        // Separate cached objects, both stable across calls.
        assert!(!Arc::ptr_eq(&headers, &claims));
        assert!(Arc::ptr_eq(&headers, &token.headers().unwrap().unwrap()));
        assert!(Arc::ptr_eq(&claims, &token.claims().unwrap().unwrap()));
    }

    #[test]
    fn malformed_token_errors_on_first_access_and_stays_cached() {
        let token = LazyToken::new("not-base64!!.also-bad");

        let first = token.claims();
        assert!(matches!(first, Err(Error::TokenParse(_))));

        // The cached failure is returned again, for headers too.
        assert!(token.claims().is_err());
        assert!(token.headers().is_err());
    }

    #[test]
    fn token_without_payload_segment_is_malformed() {
        let token = LazyToken::new("only-one-segment");
        assert!(token.claims().is_err());
    }

    #[test]
    fn non_object_payload_yields_no_claim_set() {
        let header = URL_SAFE_NO_PAD.encode(b"{\"alg\":\"none\"}");
        let payload = URL_SAFE_NO_PAD.encode(b"\"just a string\"");
        let token = LazyToken::new(format!("{header}.{payload}"));

        assert!(token.claims().unwrap().is_none());
        assert!(token.headers().unwrap().is_some());
    }

    #[test]
    fn construction_never_parses() {
        // A structurally broken token can be held without error as long as
        // no one asks for its contents.
        let token = LazyToken::new("garbage");
        assert_eq!(token.raw(), "garbage");
    }

    #[test]
    fn debug_output_does_not_leak_the_raw_credential() {
        let token = LazyToken::new("super-secret-token");
        let debug = format!("{token:?}");
        assert!(!debug.contains("super-secret-token"));
    }
}
