// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Request-path decoding and traversal-safe resolution.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::Error;

/// Characters percent-encoded in `Location` values. `%` is deliberately
/// not in the set, which makes the encoder idempotent: already-encoded
/// triplets pass through untouched.
const LOCATION_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// Percent-decodes a request pathname.
///
/// Malformed encodings, non-UTF-8 results, and NUL bytes are reported as
/// 400 without echoing any of the input.
pub(crate) fn decode(pathname: &str) -> Result<String, Error> {
    let decoded = percent_decode_str(pathname)
        .decode_utf8()
        .map_err(|_| Error::bad_request("failed to decode pathname"))?;
    if memchr::memchr(0, decoded.as_bytes()).is_some() {
        return Err(Error::bad_request("pathname contains NUL byte"));
    }
    Ok(decoded.into_owned())
}

/// A decoded pathname resolved against an optional sandbox root.
#[derive(Debug)]
pub(crate) struct ResolvedPath {
    /// The filesystem path to probe.
    pub(crate) full: PathBuf,
    /// The decoded path segments, for dotfile inspection.
    pub(crate) segments: Vec<String>,
}

/// Resolves a decoded pathname, rejecting traversal attempts.
///
/// The `..` check is lexical and happens before any join, so an encoded
/// `..` can never escape `root`. Empty and `.` segments are dropped.
pub(crate) fn resolve(root: Option<&Path>, decoded: &str) -> Result<ResolvedPath, Error> {
    let mut segments = Vec::new();
    for segment in decoded.split('/') {
        if segment == ".." {
            log::debug!("rejecting traversal segment in request path");
            return Err(Error::forbidden());
        }
        if !segment.is_empty() && segment != "." {
            segments.push(segment.to_owned());
        }
    }

    let full = match root {
        Some(root) => {
            let mut full = root.to_path_buf();
            for segment in &segments {
                full.push(segment);
            }
            full
        }
        None => PathBuf::from(decoded),
    };
    Ok(ResolvedPath { full, segments })
}

/// Returns true for a dotfile segment: longer than one character and
/// beginning with `.` (`..` never reaches this check).
pub(crate) fn is_dotfile(segment: &str) -> bool {
    segment.len() > 1 && segment.starts_with('.')
}

/// Collapses a run of two or more leading slashes to a single slash.
pub(crate) fn collapse_leading_slashes(path: &str) -> Cow<'_, str> {
    let run = path.bytes().take_while(|&b| b == b'/').count();
    if run > 1 {
        Cow::Owned(format!("/{}", &path[run..]))
    } else {
        Cow::Borrowed(path)
    }
}

/// Percent-encodes a path for use in a `Location` header.
///
/// Idempotent: encoding an already-encoded path returns it unchanged.
pub(crate) fn encode_location(path: &str) -> String {
    utf8_percent_encode(path, LOCATION_SET).to_string()
}
