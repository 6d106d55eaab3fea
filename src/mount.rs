// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Binds a root directory and options to a reusable request handler.

use std::borrow::Cow;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderMap, HeaderValue};
use http::{Request, Response, StatusCode};

use crate::options::{Dotfiles, Options};
use crate::responder::{DirectoryPolicy, Responder};
use crate::{is_read_method, Body, Error, SetHeaders};

/// The outcome of [`Mount::handle`] for one request.
#[derive(Debug)]
pub enum Handled {
    /// A complete response: file body, ranged body, redirect, 304, or the
    /// method-not-allowed reply.
    Response(Response<Body>),
    /// The mount declined the request. `None` defers it to the next
    /// handler with no complaint (wrong method, nothing matched before a
    /// file was chosen); `Some` forwards a failure the caller must report
    /// (post-file errors, server errors, or any error when fall-through is
    /// disabled).
    Fallthrough(Option<Error>),
}

/// A request handler serving files under one root directory.
///
/// Built once via [`Mount::builder`] and shared across requests; each
/// request gets its own [`Responder`](crate::Responder) internally. The
/// [`integration`](crate::integration) module adapts a mount to hyper and
/// tower services.
pub struct Mount {
    opts: Options,
    redirect: bool,
    fallthrough: bool,
    strip_prefix: Option<String>,
    set_headers: Option<Arc<SetHeaders>>,
}

impl Mount {
    /// Returns a builder for a mount rooted at `root`.
    ///
    /// Fails if `root` is empty, cannot be resolved to an absolute path,
    /// or does not name an existing directory.
    pub fn builder(root: impl Into<PathBuf>) -> Result<MountBuilder, Error> {
        MountBuilder::new(root.into())
    }

    /// Handles one request, classifying the outcome for a composing
    /// server. Use [`respond`](Mount::respond) when there is no next
    /// handler to fall through to.
    pub async fn handle(&self, req: &Request<()>) -> Handled {
        if !is_read_method(req.method()) {
            if self.fallthrough {
                log::debug!("deferring {} request", req.method());
                return Handled::Fallthrough(None);
            }
            return Handled::Response(method_not_allowed());
        }

        let original = req.uri().path();
        let Some(pathname) = self.strip(original) else {
            return Handled::Fallthrough(None);
        };

        let mut responder = Responder::new(&self.opts).directory_policy(if self.redirect {
            DirectoryPolicy::Redirect
        } else {
            DirectoryPolicy::NotFound
        });
        if let Some(hook) = &self.set_headers {
            let hook = Arc::clone(hook);
            responder =
                responder.on_headers(move |headers, path, meta| (*hook)(headers, path, meta));
        }

        match responder.try_respond(req, &pathname).await {
            Ok(res) => Handled::Response(res),
            Err(err) => {
                if err.after_file() || err.status().is_server_error() || !self.fallthrough {
                    Handled::Fallthrough(Some(err))
                } else {
                    log::debug!("falling through {} for {original}", err.status());
                    Handled::Fallthrough(None)
                }
            }
        }
    }

    /// Handles one request as the final handler: fall-through renders the
    /// canonical 404 page and forwarded errors render their error page.
    pub async fn respond(&self, req: &Request<()>) -> Response<Body> {
        match self.handle(req).await {
            Handled::Response(res) => res,
            Handled::Fallthrough(Some(err)) => err.into_response(),
            Handled::Fallthrough(None) => Error::not_found().into_response(),
        }
    }

    /// The effective pathname: the original with the mount prefix
    /// stripped, or `None` when the request is outside the mount. A
    /// request for exactly the mount point maps to the empty pathname so
    /// the root directory redirect fires.
    fn strip<'r>(&self, original: &'r str) -> Option<Cow<'r, str>> {
        match &self.strip_prefix {
            None => Some(Cow::Borrowed(original)),
            Some(prefix) if original == prefix => Some(Cow::Borrowed("")),
            Some(prefix) => {
                let rest = original.strip_prefix(prefix.as_str())?;
                rest.starts_with('/').then_some(Cow::Borrowed(rest))
            }
        }
    }

    /// Wraps this mount in a cloneable service for hyper servers.
    #[cfg(feature = "hyper")]
    #[cfg_attr(docsrs, doc(cfg(feature = "hyper")))]
    pub fn into_hyper_service(self) -> crate::integration::MountService {
        crate::integration::MountService::new(self)
    }

    /// Wraps this mount in a cloneable `tower::Service` that answers every
    /// request itself.
    #[cfg(feature = "tower")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tower")))]
    pub fn into_tower_service(self) -> crate::integration::MountService {
        crate::integration::MountService::new(self)
    }

    /// Wraps this mount in a `tower::Layer` that serves files and passes
    /// declined requests to the wrapped service.
    #[cfg(feature = "tower")]
    #[cfg_attr(docsrs, doc(cfg(feature = "tower")))]
    pub fn into_tower_layer(self) -> crate::integration::MountLayer {
        crate::integration::MountLayer::new(self)
    }
}

fn method_not_allowed() -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    res.headers_mut()
        .insert(http::header::ALLOW, HeaderValue::from_static("GET, HEAD"));
    res.headers_mut()
        .insert(http::header::CONTENT_LENGTH, HeaderValue::from_static("0"));
    res
}

/// A builder for [`Mount`].
pub struct MountBuilder {
    opts: Options,
    redirect: bool,
    fallthrough: bool,
    strip_prefix: Option<String>,
    set_headers: Option<Arc<SetHeaders>>,
}

impl std::fmt::Debug for MountBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountBuilder")
            .field("opts", &self.opts)
            .field("redirect", &self.redirect)
            .field("fallthrough", &self.fallthrough)
            .field("strip_prefix", &self.strip_prefix)
            .field("set_headers", &self.set_headers.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl MountBuilder {
    fn new(root: PathBuf) -> Result<Self, Error> {
        if root.as_os_str().is_empty() {
            return Err(Error::config("root path is empty"));
        }
        let root = std::path::absolute(&root)
            .map_err(|err| Error::config(format!("cannot resolve root: {err}")))?;
        if !root.is_dir() {
            let msg = format!("root is not a directory: {}", root.display());
            return Err(Error::config(msg));
        }
        Ok(MountBuilder {
            opts: Options::new().root(root),
            redirect: true,
            fallthrough: true,
            strip_prefix: None,
            set_headers: None,
        })
    }

    /// See [`Options::accept_ranges`].
    pub fn accept_ranges(mut self, accept: bool) -> Self {
        self.opts = self.opts.accept_ranges(accept);
        self
    }

    /// See [`Options::cache_control`].
    pub fn cache_control(mut self, emit: bool) -> Self {
        self.opts = self.opts.cache_control(emit);
        self
    }

    /// See [`Options::etag`].
    pub fn etag(mut self, emit: bool) -> Self {
        self.opts = self.opts.etag(emit);
        self
    }

    /// See [`Options::last_modified`].
    pub fn last_modified(mut self, emit: bool) -> Self {
        self.opts = self.opts.last_modified(emit);
        self
    }

    /// See [`Options::max_age`].
    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.opts = self.opts.max_age(max_age);
        self
    }

    /// See [`Options::immutable`].
    pub fn immutable(mut self, immutable: bool) -> Self {
        self.opts = self.opts.immutable(immutable);
        self
    }

    /// See [`Options::dotfiles`].
    pub fn dotfiles(mut self, policy: Dotfiles) -> Self {
        self.opts = self.opts.dotfiles(policy);
        self
    }

    /// See [`Options::extensions`].
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opts = self.opts.extensions(extensions);
        self
    }

    /// See [`Options::index`].
    pub fn index<I, S>(mut self, index: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opts = self.opts.index(index);
        self
    }

    /// See [`Options::start`].
    pub fn start(mut self, start: u64) -> Self {
        self.opts = self.opts.start(start);
        self
    }

    /// See [`Options::end`].
    pub fn end(mut self, end: u64) -> Self {
        self.opts = self.opts.end(end);
        self
    }

    /// Sets whether directory requests redirect to their trailing-slash
    /// form (301) instead of answering 404. Defaults to `true`.
    pub fn redirect(mut self, redirect: bool) -> Self {
        self.redirect = redirect;
        self
    }

    /// Sets whether declined requests (wrong method, nothing matched) are
    /// deferred to the next handler rather than forwarded as failures.
    /// Defaults to `true`.
    pub fn fallthrough(mut self, fallthrough: bool) -> Self {
        self.fallthrough = fallthrough;
        self
    }

    /// Sets the URL prefix this mount is reachable under. The prefix is
    /// stripped before path resolution; redirects still use the full
    /// original path. A trailing `/` on the prefix is ignored.
    pub fn strip_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.ends_with('/') {
            prefix.pop();
        }
        self.strip_prefix = Some(prefix);
        self
    }

    /// Sets a hook invoked before the response headers for a chosen file
    /// are composed; headers the hook inserts win over the defaults.
    pub fn set_headers(
        mut self,
        hook: impl Fn(&mut HeaderMap, &Path, &Metadata) + Send + Sync + 'static,
    ) -> Self {
        self.set_headers = Some(Arc::new(hook));
        self
    }

    /// Builds the [`Mount`].
    pub fn build(self) -> Mount {
        Mount {
            opts: self.opts,
            redirect: self.redirect,
            fallthrough: self.fallthrough,
            strip_prefix: self.strip_prefix,
            set_headers: self.set_headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_rejects_empty_root() {
        let err = Mount::builder("").unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn builder_rejects_missing_root() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        assert!(Mount::builder(missing).is_err());
    }

    #[test]
    fn builder_accepts_directory_root() {
        let tmp = tempfile::tempdir().unwrap();
        let mount = Mount::builder(tmp.path()).unwrap().build();
        assert!(mount.opts.root.as_deref().unwrap().is_absolute());
    }

    #[test]
    fn strip_prefix_maps_mount_point_to_empty_path() {
        let tmp = tempfile::tempdir().unwrap();
        let mount = Mount::builder(tmp.path())
            .unwrap()
            .strip_prefix("/static/")
            .build();

        assert_eq!(mount.strip("/static").as_deref(), Some(""));
        assert_eq!(mount.strip("/static/a.txt").as_deref(), Some("/a.txt"));
        assert_eq!(mount.strip("/staticfoo"), None);
        assert_eq!(mount.strip("/other/a.txt"), None);
    }

    #[test]
    fn no_prefix_passes_path_through() {
        let tmp = tempfile::tempdir().unwrap();
        let mount = Mount::builder(tmp.path()).unwrap().build();
        assert_eq!(mount.strip("/a/b.txt").as_deref(), Some("/a/b.txt"));
    }
}
