// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An HTTP static-file responder for
//! [http](http://crates.io/crates/http) and
//! [tokio](https://crates.io/crates/tokio), composable into
//! [hyper](https://crates.io/crates/hyper) 1.x and
//! [tower](https://crates.io/crates/tower) servers.
//!
//! Given a request and a filesystem root, the crate produces a
//! correctly-formed response that streams a file, answers a cache
//! validation, redirects, or reports a well-formed error. It owns only the
//! file-serving decision; the server loop, TLS, and connection management
//! belong to the host.
//!
//! # Features
//!
//! - Traversal-safe path resolution under a sandbox root, with dotfile
//!   policies and percent-decoding
//! - Conditional GET: `If-Match`, `If-None-Match`, `If-Modified-Since`,
//!   `If-Unmodified-Since`, and `If-Range`
//! - RFC 7233 byte ranges with overlap coalescing
//! - `ETag`, `Last-Modified`, `Cache-Control`, and `Content-Type`
//!   composition
//! - Index-file and extension-fallback probing
//! - Directory redirects with a well-formed HTML body
//! - Large file support via chunked streaming
//! - Fall-through composition: requests this crate declines can be passed
//!   to an inner `tower::Service`
//!
//! # Examples
//!
//! Serve a directory via Hyper:
//!
//! ```no_run
//! # #[cfg(feature = "hyper")]
//! # {
//! use hyper::server::conn;
//! use hyper_util::rt::TokioIo;
//! use respondir::Mount;
//! use std::net::{Ipv4Addr, SocketAddr};
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = Mount::builder("./static")
//!         .unwrap()
//!         .build()
//!         .into_hyper_service();
//!
//!     let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 1337));
//!     let listener = TcpListener::bind(addr).await.unwrap();
//!
//!     loop {
//!         let (tcp, _) = listener.accept().await.unwrap();
//!         let service = service.clone();
//!         tokio::spawn(async move {
//!             let io = TokioIo::new(tcp);
//!             if let Err(err) = conn::http1::Builder::new()
//!                 .serve_connection(io, service)
//!                 .await
//!             {
//!                 eprintln!("connection error: {err}");
//!             }
//!         });
//!     }
//! }
//! # }
//! ```
//!
//! Fall through to an application router when no file matches:
//!
//! ```no_run
//! # #[cfg(feature = "tower")]
//! # fn wire<S>(app: S)
//! # where
//! #     S: tower::Service<http::Request<()>, Response = http::Response<respondir::Body>>
//! #         + Clone + Send + 'static,
//! #     S::Future: Send,
//! # {
//! use respondir::Mount;
//! use tower::Layer;
//!
//! let mount = Mount::builder("./static").unwrap().build();
//! let service = mount.into_tower_layer().layer(app);
//! # let _ = service;
//! # }
//! ```
//!
//! ## Logging
//!
//! This crate provides basic logs for debugging purposes via the `log`
//! crate. Unexpected I/O errors are logged at the `ERROR` level; path
//! resolution and probing decisions are logged at the `DEBUG` level.

#![deny(missing_docs, clippy::print_stderr, clippy::print_stdout)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use std::error::Error as StdError;
use std::fmt::Display;
use std::io::Error as IOError;
use std::io::ErrorKind;

use http::header::{HeaderMap, HeaderValue};
use http::{Method, Response, StatusCode};

fn as_u64(len: usize) -> u64 {
    const {
        assert!(std::mem::size_of::<usize>() <= std::mem::size_of::<u64>());
    };
    len as u64
}

/// An error produced while resolving or answering a request.
///
/// Every error maps to an HTTP status code and may carry extra response
/// headers (`Content-Range` for 416, `Allow` for 405). Errors raised after
/// the served file has been identified are marked [`after_file`], which
/// [`Mount`](crate::Mount) uses to decide between deferring a request to
/// the next handler and forwarding the failure.
///
/// [`after_file`]: Error::after_file
#[derive(Debug)]
pub struct Error {
    kind: ErrorVariant,
    after_file: bool,
}

#[derive(Debug)]
enum ErrorVariant {
    /// Invalid configuration detected while building a Mount.
    Config(String),
    /// The request path could not be decoded or contains a NUL byte.
    BadRequest(&'static str),
    /// The request path escapes the root or names a denied dotfile.
    Forbidden,
    /// No servable file matched the request path.
    NotFound,
    /// The request method is not GET or HEAD.
    MethodNotAllowed,
    /// `If-Match` or `If-Unmodified-Since` rejected the request.
    PreconditionFailed,
    /// No requested byte range overlaps the entity; carries the entity
    /// length for the `Content-Range: bytes */len` reply.
    RangeNotSatisfiable(u64),
    /// An unexpected I/O error occurred.
    Io(IOError),
}

impl Error {
    /// Constructor for invalid-configuration errors, which logs the problem.
    pub fn config(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::error!("invalid mount configuration: {msg}");
        Self::new(ErrorVariant::Config(msg))
    }

    /// Constructor for malformed-request errors (400).
    pub fn bad_request(reason: &'static str) -> Self {
        Self::new(ErrorVariant::BadRequest(reason))
    }

    /// Constructor for forbidden-path errors (403).
    pub fn forbidden() -> Self {
        Self::new(ErrorVariant::Forbidden)
    }

    /// Constructor for missing-file errors (404).
    pub fn not_found() -> Self {
        Self::new(ErrorVariant::NotFound)
    }

    /// Constructor for rejected-method errors (405).
    pub fn method_not_allowed() -> Self {
        Self::new(ErrorVariant::MethodNotAllowed)
    }

    /// Constructor for failed-precondition errors (412).
    pub fn precondition_failed() -> Self {
        Self::new(ErrorVariant::PreconditionFailed)
    }

    /// Constructor for unsatisfiable-range errors (416). `len` is the
    /// length of the byte window the ranges were evaluated against.
    pub fn range_not_satisfiable(len: u64) -> Self {
        Self::new(ErrorVariant::RangeNotSatisfiable(len))
    }

    /// Constructor for unexpected I/O errors (500), which logs the error.
    pub fn io(err: IOError) -> Self {
        log::error!("I/O error: {err}");
        Self::new(ErrorVariant::Io(err))
    }

    fn new(kind: ErrorVariant) -> Self {
        Error {
            kind,
            after_file: false,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorVariant::Config(_) | ErrorVariant::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorVariant::BadRequest(_) => StatusCode::BAD_REQUEST,
            ErrorVariant::Forbidden => StatusCode::FORBIDDEN,
            ErrorVariant::NotFound => StatusCode::NOT_FOUND,
            ErrorVariant::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorVariant::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
            ErrorVariant::RangeNotSatisfiable(_) => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }

    /// Returns true if the error was raised after the served file had been
    /// identified (read failures, rejected preconditions, bad ranges).
    pub fn after_file(&self) -> bool {
        self.after_file
    }

    pub(crate) fn mark_after_file(mut self) -> Self {
        self.after_file = true;
        self
    }

    /// Extra response headers carried by the error.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        match self.kind {
            ErrorVariant::RangeNotSatisfiable(len) => {
                let value = HeaderValue::from_str(&format!("bytes */{len}"))
                    .expect("Content-Range value is ASCII");
                headers.insert(http::header::CONTENT_RANGE, value);
            }
            ErrorVariant::MethodNotAllowed => {
                headers.insert(http::header::ALLOW, HeaderValue::from_static("GET, HEAD"));
            }
            _ => {}
        }
        headers
    }

    /// Renders the canonical HTML error response for this error.
    ///
    /// This is the built-in behavior when no caller intercepts the error;
    /// interceptors receive the structured value from
    /// [`Responder::try_respond`](crate::Responder::try_respond) or
    /// [`Mount::handle`](crate::Mount::handle) instead and render nothing.
    pub fn into_response(self) -> Response<Body> {
        let status = self.status();
        let reason = status.canonical_reason().unwrap_or("Unknown Error");
        html::error_response(status, reason, self.headers())
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ErrorVariant::Config(msg) => write!(f, "invalid configuration: {msg}"),
            ErrorVariant::BadRequest(reason) => write!(f, "bad request: {reason}"),
            ErrorVariant::Forbidden => write!(f, "forbidden path"),
            ErrorVariant::NotFound => write!(f, "file not found"),
            ErrorVariant::MethodNotAllowed => write!(f, "method not allowed"),
            ErrorVariant::PreconditionFailed => write!(f, "precondition failed"),
            ErrorVariant::RangeNotSatisfiable(len) => {
                write!(f, "no satisfiable range within {len} bytes")
            }
            ErrorVariant::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.kind {
            ErrorVariant::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IOError> for Error {
    fn from(err: IOError) -> Self {
        match err.kind() {
            ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::InvalidFilename => {
                Error::not_found()
            }
            _ => Error::io(err),
        }
    }
}

mod body;
mod conditional;
mod etag;
mod html;
mod mount;
mod options;
mod path;
mod platform;
mod range;
mod responder;

#[cfg(any(feature = "tower", feature = "hyper"))]
/// Hyper and Tower service integrations.
pub mod integration;

pub use crate::body::Body;
pub use crate::mount::{Handled, Mount, MountBuilder};
pub use crate::options::{Dotfiles, Options};
pub use crate::responder::{DirectoryPolicy, Responder};

/// A late header hook, run once the served file is known and before
/// conditional-request evaluation.
///
/// Receives the response headers, the path of the chosen file, and its
/// metadata. The hook must be synchronous; headers it sets are not
/// overwritten by the responder's own composition, and hook-supplied
/// validators participate in conditional-GET evaluation.
pub type SetHeaders = dyn Fn(&mut HeaderMap, &std::path::Path, &std::fs::Metadata) + Send + Sync;

fn is_read_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD
}
