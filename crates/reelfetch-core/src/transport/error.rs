//! Transport failure taxonomy.

/// Why a range fetch (or size probe) failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    /// Response status other than 200/206.
    #[error("HTTP {0}")]
    Http(u32),
    /// Body length differs from the requested range length.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub(super) fn from_curl(e: &curl::Error) -> Self {
        let msg = e.to_string();
        if e.is_operation_timedout() {
            return Self::Timeout(msg);
        }
        if e.is_couldnt_connect()
            || e.is_couldnt_resolve_host()
            || e.is_couldnt_resolve_proxy()
            || e.is_read_error()
            || e.is_recv_error()
            || e.is_send_error()
            || e.is_got_nothing()
            || e.is_partial_file()
        {
            return Self::Connection(msg);
        }
        Self::Other(msg)
    }
}
