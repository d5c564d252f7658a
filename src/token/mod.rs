//! Bearer token extraction and lazy parsing.
//!
//! [`extractor::extract`] pulls a bearer credential out of a request's
//! headers or query parameters; [`LazyToken`] defers parsing of that
//! credential until its claims or headers are actually needed.

pub mod extractor;
pub mod lazy;

pub use extractor::{AUTHORIZATION_HEADER, BEARER_SCHEME, extract};
pub use lazy::{JsonObject, LazyToken};
