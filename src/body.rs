//! Response body wrapper used across the HTTP boundary.
//!
//! `CacheBody` erases the concrete body type so handlers can return a plain
//! streamed body, an in-memory chunk, or an empty body through the same type.

use std::{
    fmt::Debug,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;

use futures_util::{Stream, TryStreamExt};
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::{Body, Frame, SizeHint};

use crate::types::{BoxBody, BoxError};

/// Unified HTTP body type for responses served by this crate.
pub struct CacheBody(BoxBody);

impl CacheBody {
    /// Wraps any `Body` implementation, boxing it for uniform storage.
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self(body.map_err(|e| e.into()).boxed_unsync())
    }

    /// Builds a body from a stream of byte chunks, as used for progressive
    /// tailing reads of an object still being uploaded.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + Debug + 'static,
    {
        let stream = stream.map_err(Into::into).map_ok(hyper::body::Frame::data);
        let body = StreamBody::new(stream).boxed_unsync();
        Self(body)
    }

    /// An empty, already-complete body (204/404/etc. responses).
    pub fn empty() -> Self {
        Self::new(Empty::new())
    }
}

impl From<String> for CacheBody {
    fn from(buf: String) -> Self {
        Self::new(http_body_util::Full::from(buf))
    }
}

impl Body for CacheBody {
    type Data = Bytes;
    type Error = BoxError;

    #[inline]
    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.0).poll_frame(cx)
    }

    #[inline]
    fn size_hint(&self) -> SizeHint {
        self.0.size_hint()
    }

    #[inline]
    fn is_end_stream(&self) -> bool {
        self.0.is_end_stream()
    }
}
