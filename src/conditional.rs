// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Conditional-request predicates over the precondition headers:
//! `If-Match`, `If-None-Match`, `If-Modified-Since`,
//! `If-Unmodified-Since`, and `If-Range`.
//!
//! Date comparisons run at second granularity, matching the resolution of
//! HTTP dates; the entity's modification time is truncated before any
//! compare so a sub-second mtime never defeats a match.

use std::time::{Duration, SystemTime};

use http::header::{self, HeaderMap, HeaderValue};
use httpdate::parse_http_date;

use crate::etag::weak_eq;

/// Iterates the comma-separated tokens of a header value, with ASCII
/// spaces trimmed. An empty trailing token survives only when the value
/// ends with a separator, which falls out of the split itself.
pub(crate) fn token_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(|token| token.trim_matches(' '))
}

/// Returns true if the request carries any precondition header.
pub(crate) fn is_conditional_get(req_hdrs: &HeaderMap) -> bool {
    req_hdrs.contains_key(header::IF_MATCH)
        || req_hdrs.contains_key(header::IF_UNMODIFIED_SINCE)
        || req_hdrs.contains_key(header::IF_NONE_MATCH)
        || req_hdrs.contains_key(header::IF_MODIFIED_SINCE)
}

/// Evaluates `If-Match` and `If-Unmodified-Since` against the response
/// validators. Returns true when the request must be rejected with 412.
///
/// `If-Match` wins when both are present: with no `ETag` on the response
/// the header always fails; `*` always matches; otherwise some listed tag
/// must weakly compare equal. `If-Unmodified-Since` fails when the header
/// parses and the entity is newer (or has no `Last-Modified`).
pub(crate) fn is_precondition_failure(
    req_hdrs: &HeaderMap,
    etag: Option<&HeaderValue>,
    last_modified: Option<SystemTime>,
) -> bool {
    if let Some(if_match) = req_hdrs.get(header::IF_MATCH) {
        let Some(etag) = etag else {
            return true;
        };
        let Ok(if_match) = if_match.to_str() else {
            return true;
        };
        if if_match == "*" {
            return false;
        }
        return !token_list(if_match).any(|token| weak_eq(token.as_bytes(), etag.as_bytes()));
    }

    if let Some(since) = parse_date_header(req_hdrs.get(header::IF_UNMODIFIED_SINCE)) {
        return match last_modified {
            Some(modified) => truncate_to_secs(modified) > since,
            None => true,
        };
    }

    false
}

/// Reports whether the client already holds a current representation, i.e.
/// whether a 304 should be served instead of the body.
///
/// `If-None-Match` takes precedence over `If-Modified-Since`; a request
/// `Cache-Control: no-cache` always defeats freshness.
pub(crate) fn is_fresh(
    req_hdrs: &HeaderMap,
    etag: Option<&HeaderValue>,
    last_modified: Option<SystemTime>,
) -> bool {
    let modified_since = req_hdrs.get(header::IF_MODIFIED_SINCE);
    let none_match = req_hdrs.get(header::IF_NONE_MATCH);
    if modified_since.is_none() && none_match.is_none() {
        return false;
    }

    if let Some(cache_control) = req_hdrs.get(header::CACHE_CONTROL) {
        if let Ok(cache_control) = cache_control.to_str() {
            if token_list(cache_control).any(|token| token == "no-cache") {
                return false;
            }
        }
    }

    if let Some(none_match) = none_match {
        let Ok(none_match) = none_match.to_str() else {
            return false;
        };
        if none_match != "*" {
            let Some(etag) = etag else {
                return false;
            };
            let matched =
                token_list(none_match).any(|token| weak_eq(token.as_bytes(), etag.as_bytes()));
            if !matched {
                return false;
            }
        }
    }

    if modified_since.is_some() {
        let Some(since) = parse_date_header(modified_since) else {
            return false;
        };
        let Some(modified) = last_modified else {
            return false;
        };
        if truncate_to_secs(modified) > since {
            return false;
        }
    }

    true
}

/// Decides whether a `Range` header still applies given `If-Range`.
///
/// A `"` anywhere in the value selects the entity-tag comparison, a
/// byte-substring match against the current tag, kept for compatibility
/// with the servers this crate stands in for. A malformed date containing
/// a quote therefore takes the tag branch and never matches. Without a
/// quote the value parses as an HTTP date, and the range applies iff the
/// entity was last modified at or before it.
pub(crate) fn if_range_fresh(
    req_hdrs: &HeaderMap,
    etag: Option<&HeaderValue>,
    last_modified: Option<SystemTime>,
) -> bool {
    let Some(if_range) = req_hdrs.get(header::IF_RANGE) else {
        return true;
    };

    let raw = if_range.as_bytes();
    if memchr::memchr(b'"', raw).is_some() {
        return match etag {
            Some(etag) => memchr::memmem::find(raw, etag.as_bytes()).is_some(),
            None => false,
        };
    }

    let (Ok(value), Some(modified)) = (if_range.to_str(), last_modified) else {
        return false;
    };
    match parse_http_date(value) {
        Ok(if_range) => truncate_to_secs(modified) <= if_range,
        Err(_) => false,
    }
}

fn parse_date_header(value: Option<&HeaderValue>) -> Option<SystemTime> {
    parse_http_date(value?.to_str().ok()?).ok()
}

fn truncate_to_secs(time: SystemTime) -> SystemTime {
    let secs = time
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}
