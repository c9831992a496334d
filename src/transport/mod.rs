//! Outbound connection to the summarization service

pub mod http;

pub use http::HttpTransport;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

/// Body chunks as the transport delivers them
pub type ChunkStream
  = BoxStream<'static, Result<Bytes, crate::error::Error>>;

/// Opens one streaming summary response per call.
///
/// `open` resolves once the response body is readable. Anything that
/// fails before that point is an `Error::NetworkError`; faults while
/// reading come through the stream as `Error::StreamError`. Dropping
/// the future or the stream releases the connection.
pub trait Transport: Send + Sync + 'static
{   fn open(
      &self
    , body: crate::request::SummarizeRequest
    ) -> BoxFuture<'static, Result<ChunkStream, crate::error::Error>>;
}
