//! Header flags, Basic-Auth and URL normalization.
//!
//! # Example
//!
//! ```ignore
//! use wsbridge::config::{parse_headers, basic_auth};
//!
//! let mut headers = parse_headers(["X-Foo:a:b"])?;
//! headers.insert(AUTHORIZATION, basic_auth("user:pass")?);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::LazyLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Matches a leading `scheme://`.
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://").expect("scheme pattern is valid"));

// ============================================================================
// Headers
// ============================================================================

/// Parses one `key:value` header flag.
///
/// Splits on the first colon only, so the value keeps any further colons.
/// Surrounding whitespace is trimmed from both halves.
///
/// # Errors
///
/// Returns [`Error::Usage`] if there is no colon or the name/value is not a
/// valid HTTP header.
pub fn parse_header(arg: &str) -> Result<(HeaderName, HeaderValue)> {
    let (key, value) = arg
        .split_once(':')
        .ok_or_else(|| Error::usage(format!("Invalid header \"{arg}\": expected key:value")))?;

    let name = HeaderName::from_bytes(key.trim().as_bytes())
        .map_err(|e| Error::usage(format!("Invalid header name \"{}\": {e}", key.trim())))?;
    let value = HeaderValue::from_str(value.trim())
        .map_err(|e| Error::usage(format!("Invalid value for header \"{name}\": {e}")))?;

    Ok((name, value))
}

/// Parses repeated `key:value` flags into a header map.
///
/// A later flag with the same name replaces an earlier one.
pub fn parse_headers<I, S>(args: I) -> Result<HeaderMap>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut headers = HeaderMap::new();
    for arg in args {
        let (name, value) = parse_header(arg.as_ref())?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// Builds a `Basic` Authorization value from `user:password`.
///
/// The whole string is base64-encoded as given.
pub fn basic_auth(credentials: &str) -> Result<HeaderValue> {
    let encoded = STANDARD.encode(credentials);
    HeaderValue::from_str(&format!("Basic {encoded}"))
        .map_err(|e| Error::usage(format!("Invalid auth value: {e}")))
}

// ============================================================================
// URL
// ============================================================================

/// Prefixes `ws://` when the URL has no scheme.
///
/// URLs that already carry a scheme are returned unchanged.
///
/// # Errors
///
/// Returns [`Error::Usage`] if the result does not parse as a URL.
pub fn normalize_url(raw: &str) -> Result<String> {
    let url = if SCHEME_RE.is_match(raw) {
        raw.to_string()
    } else {
        format!("ws://{raw}")
    };

    Url::parse(&url).map_err(|e| Error::usage(format!("Invalid URL \"{raw}\": {e}")))?;
    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;

    #[test]
    fn test_header_splits_on_first_colon() {
        let headers = parse_headers(["X-Foo:a:b"]).expect("valid header");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("X-Foo").expect("present"), "a:b");
    }

    #[test]
    fn test_header_trims_whitespace() {
        let (name, value) = parse_header("X-Token:  abc ").expect("valid header");
        assert_eq!(name.as_str(), "x-token");
        assert_eq!(value, "abc");
    }

    #[test]
    fn test_header_without_colon_is_usage_error() {
        let err = parse_header("no-colon").expect_err("must fail");
        assert!(err.is_usage());
    }

    #[test]
    fn test_header_later_flag_wins() {
        let headers = parse_headers(["X-A:1", "x-a:2"]).expect("valid headers");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-a").expect("present"), "2");
    }

    #[test]
    fn test_basic_auth_overrides_custom_authorization() {
        let mut headers = parse_headers(["Authorization:custom"]).expect("valid header");
        headers.insert(AUTHORIZATION, basic_auth("user:pass").expect("valid auth"));

        assert_eq!(headers.get(AUTHORIZATION).expect("present"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_normalize_url_adds_ws_scheme() {
        assert_eq!(
            normalize_url("example.com/chat").expect("valid url"),
            "ws://example.com/chat"
        );
        assert_eq!(
            normalize_url("localhost:8080").expect("valid url"),
            "ws://localhost:8080"
        );
    }

    #[test]
    fn test_normalize_url_keeps_existing_scheme() {
        assert_eq!(
            normalize_url("wss://example.com/chat?x=1").expect("valid url"),
            "wss://example.com/chat?x=1"
        );
        assert_eq!(
            normalize_url("http://example.com").expect("valid url"),
            "http://example.com"
        );
    }

    #[test]
    fn test_normalize_url_rejects_garbage() {
        assert!(normalize_url("ws://").expect_err("must fail").is_usage());
    }

    proptest! {
        #[test]
        fn prop_one_entry_per_distinct_header(
            entries in proptest::collection::btree_map(
                "x-[a-z0-9]{1,12}",
                "[a-zA-Z0-9][a-zA-Z0-9:;=/]{0,20}",
                0..8,
            )
        ) {
            let args: Vec<String> = entries.iter().map(|(k, v)| format!("{k}:{v}")).collect();
            let headers = parse_headers(&args).expect("valid headers");

            prop_assert_eq!(headers.len(), entries.len());
            for (key, value) in &entries {
                let got = headers.get(key.as_str()).expect("present");
                prop_assert_eq!(got.to_str().expect("ascii"), value.as_str());
            }
        }
    }
}
