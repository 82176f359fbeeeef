//! Core type aliases shared across the HTTP boundary.

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::Incoming;

use crate::body::CacheBody;

/// Inbound request with hyper's streaming incoming body.
pub type Request = hyper::Request<Incoming>;

/// Outbound response using this crate's body wrapper.
pub type Response = hyper::Response<CacheBody>;

pub(crate) type BoxBody = UnsyncBoxBody<Bytes, BoxError>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
