//! In-memory transport with scripted failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use reelfetch_core::transport::{TransportClient, TransportError};

pub struct FakeTransport {
    pub body: Vec<u8>,
    /// offset -> remaining failures before success (u32::MAX = always fail).
    failures: Mutex<HashMap<u64, u32>>,
    pub calls: AtomicUsize,
}

impl FakeTransport {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            failures: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail(self, offset: u64, times: u32) -> Self {
        self.failures.lock().unwrap().insert(offset, times);
        self
    }
}

impl TransportClient for FakeTransport {
    fn fetch_range(
        &self,
        _url: &str,
        offset: u64,
        length: u64,
        _timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(n) = self.failures.lock().unwrap().get_mut(&offset) {
            if *n > 0 {
                if *n != u32::MAX {
                    *n -= 1;
                }
                return Err(TransportError::Timeout("scripted".into()));
            }
        }
        let start = offset as usize;
        let end = (start + length as usize).min(self.body.len());
        Ok(self.body[start..end].to_vec())
    }

    fn resource_size(&self, _url: &str) -> Result<u64, TransportError> {
        Ok(self.body.len() as u64)
    }
}
