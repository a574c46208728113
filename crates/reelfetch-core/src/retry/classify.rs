//! Classify transport errors into retry policy error kinds.

use crate::retry::policy::ErrorKind;
use crate::transport::TransportError;

/// Classify an HTTP status code.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::HttpOther(code.min(u16::MAX as u32) as u16),
    }
}

pub fn classify(e: &TransportError) -> ErrorKind {
    match e {
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::Connection(_) => ErrorKind::Connection,
        TransportError::Http(code) => classify_http_status(*code),
        TransportError::PartialTransfer { .. } => ErrorKind::Partial,
        TransportError::Other(_) => ErrorKind::Other,
    }
}
