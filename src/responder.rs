//! Conversion of handler return values into HTTP responses.

use http::Response;

use crate::body::CacheBody;

/// Converts a value into an HTTP response. The dispatcher's error type is
/// the only implementor; kept as a trait rather than an inherent method so
/// new fallible return shapes can plug into `dispatch::dispatch` the same
/// way without a match arm per type.
pub trait Responder {
    fn into_response(self) -> Response<CacheBody>;
}
