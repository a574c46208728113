//! Range-fetch transport.
//!
//! The scheduler only sees [`TransportClient`]; [`CurlTransport`] is the
//! libcurl implementation and tests plug in in-memory fakes.

mod http;
mod error;
mod parse;

use std::time::Duration;

pub use http::CurlTransport;
pub use error::TransportError;
pub use parse::parse_content_length;

/// Blocking byte-range fetcher. Called concurrently from worker threads.
pub trait TransportClient: Send + Sync {
    /// Fetch `length` bytes starting at `offset` (inclusive range
    /// `offset..=offset + length - 1`). The returned body is exactly `length`
    /// bytes long on success.
    fn fetch_range(
        &self,
        url: &str,
        offset: u64,
        length: u64,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    /// Total size of the remote resource in bytes.
    fn resource_size(&self, url: &str) -> Result<u64, TransportError>;
}
