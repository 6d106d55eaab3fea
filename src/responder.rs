// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The per-request responder: pathname in, response out.

use std::fs::{File, Metadata};
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use bytes::Bytes;
use futures_core::Stream;
use futures_util::stream;
use http::header::{self, HeaderMap, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use httpdate::{fmt_http_date, parse_http_date};

use crate::conditional;
use crate::etag::EntityTag;
use crate::html;
use crate::options::{Dotfiles, Options};
use crate::path;
use crate::platform::FileExt;
use crate::range::{self, ParsedRanges};
use crate::{Body, Error};

// Each body frame reads at most CHUNK_SIZE bytes. This size is a tradeoff
// between memory usage and thread handoffs.
const CHUNK_SIZE: u64 = 65_536;

/// What to do when the resolved path names a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryPolicy {
    /// 301 to the trailing-slash form of the request path; a request that
    /// already ends in `/` (a directory with no index match) gets 404.
    #[default]
    Redirect,
    /// Always 404.
    NotFound,
}

type HeadersHook<'a> = Box<dyn FnMut(&mut HeaderMap, &Path, &Metadata) + Send + 'a>;
type FileHook<'a> = Box<dyn FnMut(&Path, &Metadata) + Send + 'a>;

/// Computes the response for a single request.
///
/// A responder borrows an [`Options`] value, is consumed by one
/// [`respond`](Responder::respond) or
/// [`try_respond`](Responder::try_respond) call, and holds no state
/// between requests. [`Mount`](crate::Mount) builds one per request;
/// standalone use looks like:
///
/// ```no_run
/// # async fn serve(req: http::Request<()>) -> http::Response<respondir::Body> {
/// use respondir::{Options, Responder};
///
/// let opts = Options::new().root("/srv/static");
/// Responder::new(&opts).respond(&req, req.uri().path()).await
/// # }
/// ```
pub struct Responder<'a> {
    opts: &'a Options,
    directory: DirectoryPolicy,
    on_headers: Option<HeadersHook<'a>>,
    on_file: Option<FileHook<'a>>,
}

impl<'a> Responder<'a> {
    /// Creates a responder over the given options.
    pub fn new(opts: &'a Options) -> Self {
        Responder {
            opts,
            directory: DirectoryPolicy::default(),
            on_headers: None,
            on_file: None,
        }
    }

    /// Sets the directory disposition. Defaults to
    /// [`DirectoryPolicy::Redirect`].
    pub fn directory_policy(mut self, policy: DirectoryPolicy) -> Self {
        self.directory = policy;
        self
    }

    /// Registers a hook that runs right before the base response headers
    /// are composed; headers the hook inserts are left untouched.
    pub fn on_headers(
        mut self,
        hook: impl FnMut(&mut HeaderMap, &Path, &Metadata) + Send + 'a,
    ) -> Self {
        self.on_headers = Some(Box::new(hook));
        self
    }

    /// Registers a hook that runs once the served file has been chosen.
    pub fn on_file(mut self, hook: impl FnMut(&Path, &Metadata) + Send + 'a) -> Self {
        self.on_file = Some(Box::new(hook));
        self
    }

    /// Responds to the request, rendering any error as the canonical HTML
    /// error page.
    pub async fn respond(self, req: &Request<()>, pathname: &str) -> Response<Body> {
        match self.try_respond(req, pathname).await {
            Ok(res) => res,
            Err(err) => err.into_response(),
        }
    }

    /// Responds to the request, returning errors as structured values
    /// instead of rendering them. The caller owns the failure: nothing has
    /// been written when this returns `Err`.
    pub async fn try_respond(
        self,
        req: &Request<()>,
        pathname: &str,
    ) -> Result<Response<Body>, Error> {
        let decoded = path::decode(pathname)?;
        let resolved = path::resolve(self.opts.root.as_deref(), &decoded)?;

        if let Some(err) = self.check_dotfiles(&resolved.segments) {
            return Err(err);
        }

        let trailing_slash = decoded.ends_with('/');
        if trailing_slash && !self.opts.index.is_empty() {
            self.probe_index(req, resolved.full).await
        } else {
            self.probe_file(req, resolved.full, trailing_slash).await
        }
    }

    fn check_dotfiles(&self, segments: &[String]) -> Option<Error> {
        if !segments.iter().any(|s| path::is_dotfile(s)) {
            return None;
        }
        match self.opts.dotfiles {
            Dotfiles::Allow => None,
            Dotfiles::Deny => {
                log::debug!("denying dotfile path");
                Some(Error::forbidden())
            }
            Dotfiles::Ignore => Some(Error::not_found()),
            Dotfiles::Legacy => segments
                .last()
                .is_some_and(|s| path::is_dotfile(s))
                .then(Error::not_found),
        }
    }

    /// Probes `dir` for the configured index files, serving the first
    /// non-directory hit.
    async fn probe_index(self, req: &Request<()>, dir: PathBuf) -> Result<Response<Body>, Error> {
        let opts = self.opts;
        for name in &opts.index {
            let candidate = dir.join(name);
            log::debug!("stat {}", candidate.display());
            match stat(candidate.clone()).await {
                Ok(meta) if meta.is_dir() => continue,
                Ok(meta) => return self.send(req, candidate, meta).await,
                Err(err) if is_probe_miss(&err) => continue,
                Err(err) => return Err(Error::io(err)),
            }
        }
        Err(Error::not_found())
    }

    /// Stats the path itself; on a missing extensionless path, falls back
    /// to the configured extension suffixes.
    async fn probe_file(
        self,
        req: &Request<()>,
        full: PathBuf,
        trailing_slash: bool,
    ) -> Result<Response<Body>, Error> {
        log::debug!("stat {}", full.display());
        match stat(full.clone()).await {
            Ok(meta) if meta.is_dir() => self.respond_directory(req, trailing_slash),
            Ok(_) if trailing_slash => Err(Error::not_found()),
            Ok(meta) => self.send(req, full, meta).await,
            Err(err)
                if err.kind() == io::ErrorKind::NotFound
                    && full.extension().is_none()
                    && !trailing_slash =>
            {
                self.probe_extensions(req, full).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn probe_extensions(
        self,
        req: &Request<()>,
        full: PathBuf,
    ) -> Result<Response<Body>, Error> {
        let opts = self.opts;
        for ext in &opts.extensions {
            let mut candidate = full.clone().into_os_string();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            log::debug!("stat {}", candidate.display());
            match stat(candidate.clone()).await {
                Ok(meta) if meta.is_dir() => continue,
                Ok(meta) => return self.send(req, candidate, meta).await,
                Err(err) if is_probe_miss(&err) => continue,
                Err(err) => return Err(Error::io(err)),
            }
        }
        Err(Error::not_found())
    }

    fn respond_directory(
        &self,
        req: &Request<()>,
        trailing_slash: bool,
    ) -> Result<Response<Body>, Error> {
        match self.directory {
            DirectoryPolicy::NotFound => Err(Error::not_found()),
            DirectoryPolicy::Redirect if trailing_slash => Err(Error::not_found()),
            DirectoryPolicy::Redirect => {
                // The Location is composed from the original request path,
                // not the resolved one, so sub-path mounts redirect within
                // their own URL space.
                let original = path::collapse_leading_slashes(req.uri().path());
                let location = path::encode_location(&format!("{original}/"));
                log::debug!("directory request, redirecting to {location}");
                Ok(html::redirect_response(&location))
            }
        }
    }

    async fn send(
        self,
        req: &Request<()>,
        file_path: PathBuf,
        meta: Metadata,
    ) -> Result<Response<Body>, Error> {
        // From here on the served file is known; failures are no longer
        // fall-through-eligible.
        self.send_inner(req, file_path, meta)
            .await
            .map_err(Error::mark_after_file)
    }

    async fn send_inner(
        mut self,
        req: &Request<()>,
        file_path: PathBuf,
        meta: Metadata,
    ) -> Result<Response<Body>, Error> {
        let opts = self.opts;

        if let Some(hook) = self.on_file.as_mut() {
            hook(&file_path, &meta);
        }

        // The effective byte window, before any Range narrowing.
        let size = meta.len();
        let mut offset = opts.start;
        let mut len = size.saturating_sub(offset);
        if let Some(end) = opts.end {
            let window = if end < offset { 0 } else { end - offset + 1 };
            len = len.min(window);
        }

        // The headers hook runs first; its choices win over the defaults.
        let mut headers = HeaderMap::new();
        if let Some(hook) = self.on_headers.as_mut() {
            hook(&mut headers, &file_path, &meta);
        }

        if opts.accept_ranges && !headers.contains_key(header::ACCEPT_RANGES) {
            headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }
        if opts.cache_control && !headers.contains_key(header::CACHE_CONTROL) {
            let mut value = format!("public, max-age={}", opts.max_age.as_secs());
            if opts.immutable && !opts.max_age.is_zero() {
                value.push_str(", immutable");
            }
            headers.insert(
                header::CACHE_CONTROL,
                HeaderValue::from_str(&value).expect("Cache-Control value is ASCII"),
            );
        }
        if opts.last_modified && !headers.contains_key(header::LAST_MODIFIED) {
            if let Ok(modified) = meta.modified() {
                headers.insert(
                    header::LAST_MODIFIED,
                    HeaderValue::from_str(&fmt_http_date(modified))
                        .expect("HTTP date is ASCII"),
                );
            }
        }
        if opts.etag && !headers.contains_key(header::ETAG) {
            if let Some(tag) = EntityTag::from_metadata(&meta) {
                headers.insert(header::ETAG, tag.into());
            }
        }
        if !headers.contains_key(header::CONTENT_TYPE) {
            if let Some(value) = content_type(&file_path) {
                headers.insert(header::CONTENT_TYPE, value);
            }
        }

        // Conditional logic runs against the headers as they will be sent,
        // so hook-supplied validators participate.
        let etag_value = headers.get(header::ETAG).cloned();
        let last_modified = headers
            .get(header::LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_http_date(value).ok());

        if conditional::is_conditional_get(req.headers()) {
            if conditional::is_precondition_failure(
                req.headers(),
                etag_value.as_ref(),
                last_modified,
            ) {
                return Err(Error::precondition_failed());
            }
            if conditional::is_fresh(req.headers(), etag_value.as_ref(), last_modified) {
                return Ok(not_modified(headers));
            }
        }

        let mut status = StatusCode::OK;
        if opts.accept_ranges {
            if let Some(range_hdr) = req
                .headers()
                .get(header::RANGE)
                .and_then(|value| value.to_str().ok())
            {
                if range_hdr.trim_start_matches(' ').starts_with("bytes=") {
                    let parsed = if conditional::if_range_fresh(
                        req.headers(),
                        etag_value.as_ref(),
                        last_modified,
                    ) {
                        range::parse(len, range_hdr, true)
                    } else {
                        // A stale If-Range downgrades to a full reply, and
                        // skips the 416 path as well.
                        log::debug!("If-Range is stale, ignoring Range header");
                        ParsedRanges::Malformed
                    };
                    match parsed {
                        ParsedRanges::Unsatisfiable => {
                            return Err(Error::range_not_satisfiable(len));
                        }
                        ParsedRanges::Satisfiable(ranges) if ranges.len() == 1 => {
                            let range = ranges[0];
                            status = StatusCode::PARTIAL_CONTENT;
                            headers.insert(
                                header::CONTENT_RANGE,
                                HeaderValue::from_str(&format!(
                                    "bytes {}-{}/{}",
                                    range.start, range.end, len
                                ))
                                .expect("Content-Range value is ASCII"),
                            );
                            offset += range.start;
                            len = range.end - range.start + 1;
                        }
                        // Malformed headers and multiple ranges get the
                        // full entity as a regular response.
                        _ => {}
                    }
                }
            }
        }

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));

        if req.method() == Method::HEAD {
            return Ok(with_headers(status, headers, Body::empty()));
        }

        let file = open(file_path.clone()).await?;
        log::debug!(
            "streaming {} bytes of {} from offset {offset}",
            len,
            file_path.display()
        );
        let body = Body::new_window(len, file_stream(file, offset..offset + len));
        Ok(with_headers(status, headers, body))
    }
}

fn with_headers(status: StatusCode, headers: HeaderMap, body: Body) -> Response<Body> {
    let mut res = Response::new(body);
    *res.status_mut() = status;
    *res.headers_mut() = headers;
    res
}

/// Builds a 304 reply: the composed headers minus every `Content-*`
/// header except `Content-Location`, and no body.
fn not_modified(mut headers: HeaderMap) -> Response<Body> {
    let stripped: Vec<header::HeaderName> = headers
        .keys()
        .filter(|name| {
            name.as_str().starts_with("content-") && **name != header::CONTENT_LOCATION
        })
        .cloned()
        .collect();
    for name in stripped {
        headers.remove(name);
    }
    with_headers(StatusCode::NOT_MODIFIED, headers, Body::empty())
}

/// Content type from the file extension, with a charset for text types.
fn content_type(file_path: &Path) -> Option<HeaderValue> {
    let mime = mime_guess::from_path(file_path).first_raw()?;
    let value = if mime.starts_with("text/")
        || mime == "application/javascript"
        || mime == "application/json"
    {
        format!("{mime}; charset=UTF-8")
    } else {
        mime.to_owned()
    };
    HeaderValue::from_str(&value).ok()
}

fn is_probe_miss(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::NotADirectory | io::ErrorKind::InvalidFilename
    )
}

async fn stat(file_path: PathBuf) -> io::Result<Metadata> {
    tokio::task::spawn_blocking(move || std::fs::metadata(file_path))
        .await
        .map_err(io::Error::other)?
}

async fn open(file_path: PathBuf) -> io::Result<File> {
    tokio::task::spawn_blocking(move || File::open(file_path))
        .await
        .map_err(io::Error::other)?
}

/// Streams `range` of the file in chunks of at most [`CHUNK_SIZE`] bytes,
/// reading within [`tokio::task::block_in_place`]. The stream owns the
/// file handle; dropping it closes the file.
fn file_stream(
    file: File,
    range: Range<u64>,
) -> Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>> {
    let stream = stream::unfold((range, file), move |(left, file)| async move {
        if left.start == left.end {
            return None;
        }
        let chunk_size = std::cmp::min(CHUNK_SIZE, left.end - left.start) as usize;
        let (result, file) =
            tokio::task::block_in_place(move || (file.read_range(chunk_size, left.start), file));
        let next = match &result {
            Ok(bytes) => left.start + crate::as_u64(bytes.len())..left.end,
            Err(err) => {
                log::error!("read error while streaming file: {err}");
                left
            }
        };
        Some((result.map(Bytes::from), (next, file)))
    });
    Box::pin(stream)
}
