// Copyright (c) 2026 the respondir developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE.txt or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT.txt or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::{pin::Pin, task::Poll};

use bytes::Buf;
use futures_core::Stream;
use sync_wrapper::SyncWrapper;

type OnComplete = Box<dyn FnOnce() + Send + Sync + 'static>;

pin_project_lite::pin_project! {
    /// A streaming [`http_body::Body`] produced by
    /// [`Responder`](crate::Responder) and [`Mount`](crate::Mount).
    ///
    /// A body is either a single in-memory chunk (error pages, redirect
    /// bodies, empty replies) or a bounded window of file bytes streamed
    /// chunk by chunk. Dropping the body releases the underlying file
    /// handle, so an aborted connection cleans up immediately.
    pub struct Body {
        #[pin]
        pub(crate) stream: BodyStream,

        // A function called once the body has been consumed or dropped.
        on_complete: Option<OnComplete>,
    }

    impl PinnedDrop for Body {
        fn drop(this: Pin<&mut Self>) {
            if let Some(f) = this.project().on_complete.take() {
                f();
            }
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.stream {
            BodyStream::Once { chunk } => f
                .debug_struct("Body")
                .field("kind", &"once")
                .field("pending", &chunk.is_some())
                .finish(),
            BodyStream::Window { s } => f
                .debug_struct("Body")
                .field("kind", &"window")
                .field("remaining", &s.remaining)
                .finish(),
        }
    }
}

impl http_body::Body for Body {
    type Data = bytes::Bytes;
    type Error = crate::IOError;

    #[inline]
    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Result<http_body::Frame<Self::Data>, Self::Error>>> {
        let result = self
            .as_mut()
            .project()
            .stream
            .poll_next(cx)
            .map(|p| p.map(|o| o.map(http_body::Frame::data)));
        let is_done = matches!(result, Poll::Ready(None) | Poll::Ready(Some(Err(_))));
        if is_done {
            if let Some(f) = self.on_complete.take() {
                f();
            }
        }
        result
    }

    fn size_hint(&self) -> http_body::SizeHint {
        match &self.stream {
            BodyStream::Once { chunk: Some(Ok(d)) } => http_body::SizeHint::with_exact(
                u64::try_from(d.remaining()).expect("usize should fit in u64"),
            ),
            BodyStream::Once { .. } => http_body::SizeHint::with_exact(0),
            BodyStream::Window { s } => http_body::SizeHint::with_exact(s.remaining),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.stream {
            BodyStream::Once { chunk } => chunk.is_none(),
            BodyStream::Window { s } => s.remaining == 0,
        }
    }
}

impl Body {
    /// Returns a 0-byte body.
    #[inline]
    pub fn empty() -> Self {
        Self::new_once(None)
    }

    #[inline]
    pub(crate) fn new_once(chunk: Option<Result<bytes::Bytes, crate::IOError>>) -> Self {
        Self {
            stream: BodyStream::Once { chunk },
            on_complete: None,
        }
    }

    #[inline]
    pub(crate) fn new_window(
        len: u64,
        stream: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, crate::IOError>> + Send>>,
    ) -> Self {
        Self {
            stream: BodyStream::Window {
                s: WindowStream::new(len, stream),
            },
            on_complete: None,
        }
    }

    /// Registers a function called exactly once when the body finishes:
    /// on the final frame, on a stream error, or on drop, whichever comes
    /// first. Useful for observing when a response has fully gone out.
    #[inline]
    pub fn on_complete(mut self, on_complete: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(on_complete));
        self
    }
}

impl From<&'static [u8]> for Body {
    #[inline]
    fn from(value: &'static [u8]) -> Self {
        Self::new_once(Some(Ok(value.into())))
    }
}

impl From<&'static str> for Body {
    #[inline]
    fn from(value: &'static str) -> Self {
        Self::new_once(Some(Ok(value.as_bytes().into())))
    }
}

impl From<Vec<u8>> for Body {
    #[inline]
    fn from(value: Vec<u8>) -> Self {
        Self::new_once(Some(Ok(value.into())))
    }
}

impl From<String> for Body {
    #[inline]
    fn from(value: String) -> Self {
        Self::new_once(Some(Ok(value.into_bytes().into())))
    }
}

pin_project_lite::pin_project! {
    #[project = BodyStreamProj]
    pub(crate) enum BodyStream {
        Once {
            chunk: Option<Result<bytes::Bytes, crate::IOError>>,
        },
        Window {
            #[pin]
            s: WindowStream,
        },
    }
}

impl Stream for BodyStream {
    type Item = Result<bytes::Bytes, crate::IOError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Result<bytes::Bytes, crate::IOError>>> {
        match self.project() {
            BodyStreamProj::Once { chunk } => Poll::Ready(chunk.take()),
            BodyStreamProj::Window { s } => s.poll_next(cx),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct WindowTooShortError {
    remaining: u64,
}

impl std::fmt::Display for WindowTooShortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "file stream ended with {} window bytes still expected",
            self.remaining
        )
    }
}

impl std::error::Error for WindowTooShortError {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct WindowTooLongError {
    extra: u64,
}

impl std::fmt::Display for WindowTooLongError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "file stream returned (at least) {} bytes beyond the window",
            self.extra
        )
    }
}

impl std::error::Error for WindowTooLongError {}

/// Enforces that the inner stream yields exactly the advertised number of
/// window bytes. A truncated or overlong read becomes a stream error, so
/// a response whose `Content-Length` was already sent aborts rather than
/// silently delivering the wrong bytes.
pub(crate) struct WindowStream {
    #[allow(clippy::type_complexity)]
    stream: SyncWrapper<Pin<Box<dyn Stream<Item = Result<bytes::Bytes, crate::IOError>> + Send>>>,
    remaining: u64,
}

impl WindowStream {
    pub(crate) fn new(
        len: u64,
        stream: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, crate::IOError>> + Send>>,
    ) -> Self {
        Self {
            stream: SyncWrapper::new(stream),
            remaining: len,
        }
    }
}

impl futures_core::Stream for WindowStream {
    type Item = Result<bytes::Bytes, crate::IOError>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Result<bytes::Bytes, crate::IOError>>> {
        let this = Pin::into_inner(self);
        match this.stream.get_mut().as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(d))) => {
                let d_len = crate::as_u64(d.remaining());
                let new_rem = this.remaining.checked_sub(d_len);
                if let Some(new_rem) = new_rem {
                    this.remaining = new_rem;
                    Poll::Ready(Some(Ok(d)))
                } else {
                    let remaining = std::mem::take(&mut this.remaining); // fuse.
                    Poll::Ready(Some(Err(crate::IOError::other(WindowTooLongError {
                        extra: d_len - remaining,
                    }))))
                }
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Some(Err(e))),
            Poll::Ready(None) => {
                if this.remaining != 0 {
                    let remaining = std::mem::take(&mut this.remaining); // fuse.
                    return Poll::Ready(Some(Err(crate::IOError::other(WindowTooShortError {
                        remaining,
                    }))));
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

const _: () = {
    fn _assert() {
        fn assert_bounds<T: Sync + Send>() {}
        assert_bounds::<Body>();
    }
};

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use futures_util::StreamExt as _;
    use http_body_util::BodyExt as _;

    use super::*;

    #[tokio::test]
    async fn correct_window_stream() {
        let inner = futures_util::stream::iter(vec![Ok("h".into()), Ok("ello".into())]);
        let mut window = std::pin::pin!(WindowStream::new(5, Box::pin(inner)));
        assert_eq!(window.remaining, 5);
        let frame = window.next().await.unwrap().unwrap();
        assert_eq!(frame.remaining(), 1);
        assert_eq!(window.remaining, 4);
        let frame = window.next().await.unwrap().unwrap();
        assert_eq!(frame.remaining(), 4);
        assert_eq!(window.remaining, 0);
        assert!(window.next().await.is_none()); // end of stream.
        assert!(window.next().await.is_none()); // fused.
    }

    #[tokio::test]
    async fn short_window_stream() {
        let inner = futures_util::stream::iter(vec![Ok("hello".into())]);
        let mut window = std::pin::pin!(WindowStream::new(10, Box::pin(inner)));
        assert_eq!(window.remaining, 10);
        let frame = window.next().await.unwrap().unwrap();
        assert_eq!(frame.remaining(), 5);
        assert_eq!(window.remaining, 5);
        let err: crate::IOError = window.next().await.unwrap().unwrap_err();
        let err = err.downcast::<WindowTooShortError>().unwrap();
        assert_eq!(err, WindowTooShortError { remaining: 5 });
        assert!(window.next().await.is_none()); // fused.
    }

    #[tokio::test]
    async fn long_window_stream() {
        let inner = futures_util::stream::iter(vec![Ok("h".into()), Ok("ello".into())]);
        let mut window = std::pin::pin!(WindowStream::new(3, Box::pin(inner)));
        assert_eq!(window.remaining, 3);
        let frame = window.next().await.unwrap().unwrap();
        assert_eq!(frame.remaining(), 1);
        assert_eq!(window.remaining, 2);
        let err = window.next().await.unwrap().unwrap_err();
        let err = err.downcast::<WindowTooLongError>().unwrap();
        assert_eq!(err, WindowTooLongError { extra: 2 });
        assert!(window.next().await.is_none()); // fused.
    }

    #[tokio::test]
    async fn on_complete_called_once_for_window_body() {
        let calls = Arc::new(AtomicUsize::new(0));
        let on_complete_calls = Arc::clone(&calls);

        let inner = futures_util::stream::iter(vec![Ok("he".into()), Ok("llo".into())]);
        let mut body = Body::new_window(5, Box::pin(inner)).on_complete(move || {
            on_complete_calls.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(body.frame().await.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(body.frame().await.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(body.frame().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(body.frame().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn on_complete_called_once_when_body_dropped_before_consumed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let on_complete_calls = Arc::clone(&calls);

        let inner = futures_util::stream::iter(vec![Ok("hello".into())]);
        let body = Body::new_window(5, Box::pin(inner)).on_complete(move || {
            on_complete_calls.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(body);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_body() {
        let mut body = Body::empty();
        assert!(http_body::Body::is_end_stream(&body));
        assert!(body.frame().await.is_none());
    }
}
