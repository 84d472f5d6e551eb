//! A single boxed body type for every response this front end returns, so
//! one-shot JSON/text replies and the long-lived SSE writer loop can share
//! a `Response<FrontBody>` return type.

use std::convert::Infallible;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use http_body::Frame;
use tokio_stream::Stream;

pub type FrontBody = UnsyncBoxBody<Bytes, Infallible>;

pub fn full(bytes: impl Into<Bytes>) -> FrontBody {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed_unsync()
}

pub fn streaming<S>(stream: S) -> FrontBody
where
    S: Stream<Item = Result<Frame<Bytes>, Infallible>> + Send + 'static,
{
    StreamBody::new(stream).boxed_unsync()
}
