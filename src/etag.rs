// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Entity tags derived from file metadata.
//!
//! A tag has the form `"<size-hex>-<mtime-ms-hex>"`. Deriving the tag from
//! size and modification time keeps tag generation free of content reads;
//! it changes whenever the file is rewritten, which is the granularity the
//! rest of the validator logic works at.

use std::fs::Metadata;
use std::time::UNIX_EPOCH;

use http::header::HeaderValue;

/// An entity tag for one observed version of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntityTag {
    len: u64,
    mtime_ms: u128,
}

impl EntityTag {
    /// Derives a tag from file metadata. Returns `None` when the platform
    /// cannot report a modification time.
    pub(crate) fn from_metadata(metadata: &Metadata) -> Option<Self> {
        let mtime = metadata.modified().ok()?;
        let mtime_ms = mtime
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Some(EntityTag {
            len: metadata.len(),
            mtime_ms,
        })
    }

}

impl From<EntityTag> for HeaderValue {
    fn from(tag: EntityTag) -> Self {
        let value = format!("\"{:x}-{:x}\"", tag.len, tag.mtime_ms);
        HeaderValue::from_str(&value).expect("entity tag is ASCII")
    }
}

/// Performs weak comparison of two entity tags as in
/// [RFC 7232 section 2.3.2](https://datatracker.ietf.org/doc/html/rfc7232#section-2.3.2):
/// a `W/` prefix on either side is ignored.
pub(crate) fn weak_eq(a: &[u8], b: &[u8]) -> bool {
    let a = a.strip_prefix(b"W/").unwrap_or(a);
    let b = b.strip_prefix(b"W/").unwrap_or(b);
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(len: u64, mtime_ms: u128) -> EntityTag {
        EntityTag { len, mtime_ms }
    }

    #[test]
    fn formats_size_and_mtime_as_hex() {
        let value: HeaderValue = tag(6, 0x18f_0000_0000).into();
        assert_eq!(value, "\"6-18f00000000\"");
    }

    #[test]
    fn differs_when_file_changes() {
        let a: HeaderValue = tag(6, 1_000_000).into();
        let b: HeaderValue = tag(7, 1_000_000).into();
        let c: HeaderValue = tag(6, 1_001_000).into();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn weak_comparison() {
        assert!(weak_eq(b"\"foo\"", b"\"foo\""));
        assert!(!weak_eq(b"\"foo\"", b"\"bar\""));
        assert!(weak_eq(b"W/\"foo\"", b"\"foo\""));
        assert!(weak_eq(b"\"foo\"", b"W/\"foo\""));
        assert!(weak_eq(b"W/\"foo\"", b"W/\"foo\""));
        assert!(!weak_eq(b"W/\"foo\"", b"W/\"bar\""));
    }
}
