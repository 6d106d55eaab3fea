// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Configuration shared by [`Responder`](crate::Responder) and
//! [`Mount`](crate::Mount).

use std::path::PathBuf;
use std::time::Duration;

/// `Cache-Control` max-age values are capped at one year.
const MAX_MAX_AGE: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Disposition of request paths containing a dotfile segment (a segment
/// longer than one character beginning with `.`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dotfiles {
    /// Serve dotfiles like any other file.
    Allow,
    /// Reject with 403 Forbidden.
    Deny,
    /// Pretend the file does not exist (404).
    Ignore,
    /// Only a dotfile in the final path segment is ignored (404); files
    /// inside dot-directories stay reachable. This matches the historical
    /// behavior when no dotfile policy was configured and is kept distinct
    /// from [`Dotfiles::Ignore`] for compatibility.
    #[default]
    Legacy,
}

/// Configuration for a [`Responder`](crate::Responder).
///
/// The defaults serve plain files: ranges, validators and `Cache-Control`
/// enabled, `max_age` zero, `index.html` probed for directory paths.
#[derive(Debug, Clone)]
pub struct Options {
    pub(crate) accept_ranges: bool,
    pub(crate) cache_control: bool,
    pub(crate) etag: bool,
    pub(crate) last_modified: bool,
    pub(crate) immutable: bool,
    pub(crate) max_age: Duration,
    pub(crate) dotfiles: Dotfiles,
    pub(crate) extensions: Vec<String>,
    pub(crate) index: Vec<String>,
    pub(crate) root: Option<PathBuf>,
    pub(crate) start: u64,
    pub(crate) end: Option<u64>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            accept_ranges: true,
            cache_control: true,
            etag: true,
            last_modified: true,
            immutable: false,
            max_age: Duration::ZERO,
            dotfiles: Dotfiles::default(),
            extensions: Vec::new(),
            index: vec!["index.html".to_owned()],
            root: None,
            start: 0,
            end: None,
        }
    }
}

impl Options {
    /// Returns the default option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether `Range` requests are honored and `Accept-Ranges`
    /// advertised. Defaults to `true`.
    pub fn accept_ranges(mut self, accept: bool) -> Self {
        self.accept_ranges = accept;
        self
    }

    /// Sets whether a `Cache-Control` header is emitted. Defaults to `true`.
    pub fn cache_control(mut self, emit: bool) -> Self {
        self.cache_control = emit;
        self
    }

    /// Sets whether an `ETag` header is emitted. Defaults to `true`.
    pub fn etag(mut self, emit: bool) -> Self {
        self.etag = emit;
        self
    }

    /// Sets whether a `Last-Modified` header is emitted. Defaults to `true`.
    pub fn last_modified(mut self, emit: bool) -> Self {
        self.last_modified = emit;
        self
    }

    /// Sets the `Cache-Control` max-age. Values above one year are clamped.
    /// Defaults to zero.
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age.min(MAX_MAX_AGE);
        self
    }

    /// Appends `, immutable` to the `Cache-Control` header when the
    /// max-age is nonzero. Defaults to `false`.
    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    /// Sets the dotfile policy. Defaults to [`Dotfiles::Legacy`].
    pub fn dotfiles(mut self, policy: Dotfiles) -> Self {
        self.dotfiles = policy;
        self
    }

    /// Sets the extensions appended, in order, when the bare path does not
    /// exist. Entries are tried as `<path>.<ext>`. Defaults to none.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the index file names probed, in order, when the request path
    /// ends with `/`. An empty list disables index probing. Defaults to
    /// `["index.html"]`.
    pub fn index<I, S>(mut self, index: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index = index.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the sandbox root. Resolved paths are confined to lexical
    /// descendants of this directory. Defaults to none (the decoded
    /// request path is used as a filesystem path directly).
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Sets the first byte of the file the responder is willing to serve.
    /// Defaults to 0.
    pub fn start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    /// Sets the last byte (inclusive) of the file the responder is willing
    /// to serve. Defaults to the end of the file.
    pub fn end(mut self, end: u64) -> Self {
        self.end = Some(end);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = Options::new();
        assert!(opts.accept_ranges);
        assert!(opts.cache_control);
        assert!(opts.etag);
        assert!(opts.last_modified);
        assert!(!opts.immutable);
        assert_eq!(opts.max_age, Duration::ZERO);
        assert_eq!(opts.dotfiles, Dotfiles::Legacy);
        assert!(opts.extensions.is_empty());
        assert_eq!(opts.index, ["index.html"]);
        assert_eq!(opts.start, 0);
        assert_eq!(opts.end, None);
    }

    #[test]
    fn max_age_clamped_to_one_year() {
        let opts = Options::new().max_age(Duration::from_secs(10 * 365 * 24 * 60 * 60));
        assert_eq!(opts.max_age, MAX_MAX_AGE);

        let opts = Options::new().max_age(Duration::from_secs(60));
        assert_eq!(opts.max_age, Duration::from_secs(60));
    }
}
