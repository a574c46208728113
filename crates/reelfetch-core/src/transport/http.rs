//! libcurl-backed transport.

use std::str;
use std::time::Duration;

use curl::easy::{Easy, List};

use super::parse::parse_content_length;
use super::{TransportClient, TransportError};

/// [`TransportClient`] over libcurl. One `Easy` handle per call, so a single
/// instance is safe to share across worker threads.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    connect_timeout: Duration,
    /// Timeout for HEAD and range-support requests.
    metadata_timeout: Duration,
    verify_tls: bool,
    user_agent: Option<String>,
    headers: Vec<(String, String)>,
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            metadata_timeout: Duration::from_secs(30),
            verify_tls: true,
            user_agent: None,
            headers: Vec::new(),
        }
    }
}

impl CurlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound for the TCP/TLS connect phase. Never exceeds the per-request timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Timeout for [`resource_size`](TransportClient::resource_size) and
    /// [`supports_range_requests`](Self::supports_range_requests).
    pub fn with_metadata_timeout(mut self, timeout: Duration) -> Self {
        self.metadata_timeout = timeout;
        self
    }

    /// Verify the peer certificate and host name (on by default).
    pub fn with_tls_verification(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Extra request header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    fn handle(&self, url: &str, timeout: Duration) -> Result<Easy, curl::Error> {
        let mut easy = Easy::new();
        easy.url(url)?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.connect_timeout.min(timeout))?;
        easy.timeout(timeout)?;
        if !self.verify_tls {
            easy.ssl_verify_peer(false)?;
            easy.ssl_verify_host(false)?;
        }
        if let Some(agent) = &self.user_agent {
            easy.useragent(agent)?;
        }
        if !self.headers.is_empty() {
            let mut list = List::new();
            for (k, v) in &self.headers {
                list.append(&format!("{}: {}", k.trim(), v.trim()))?;
            }
            easy.http_headers(list)?;
        }
        Ok(easy)
    }

    /// Whether the server honours byte ranges: a one-byte range GET must come
    /// back as 206. A 2xx without ranges is `Ok(false)`; other statuses are
    /// errors.
    pub fn supports_range_requests(&self, url: &str) -> Result<bool, TransportError> {
        let mut easy = self.handle(url, self.metadata_timeout).map_err(curl_err)?;
        easy.range("0-0").map_err(curl_err)?;
        let mut received = 0usize;
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    received += data.len();
                    // The status is known once bytes arrive; stop a full-body reply.
                    Ok(if received > 1 { 0 } else { data.len() })
                })
                .map_err(curl_err)?;
            transfer.perform()
        };
        match performed {
            Ok(()) => {}
            Err(e) if e.is_write_error() && received > 1 => {}
            Err(e) => return Err(curl_err(e)),
        }

        match easy.response_code().map_err(curl_err)? {
            206 => Ok(true),
            code if (200..300).contains(&code) => {
                tracing::debug!(url, code, "server ignores byte ranges");
                Ok(false)
            }
            code => Err(TransportError::Http(code)),
        }
    }
}

fn curl_err(e: curl::Error) -> TransportError {
    TransportError::from_curl(&e)
}

impl TransportClient for CurlTransport {
    fn fetch_range(
        &self,
        url: &str,
        offset: u64,
        length: u64,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        if length == 0 {
            return Ok(Vec::new());
        }
        let mut easy = self.handle(url, timeout).map_err(curl_err)?;
        let range = format!("{}-{}", offset, offset + length - 1);
        easy.range(&range).map_err(curl_err)?;

        // A server ignoring Range answers 200 with the whole resource; stop
        // reading once the requested window has arrived.
        let limit = offset.saturating_add(length);
        let mut body: Vec<u8> = Vec::with_capacity(length as usize);
        let mut cut_short = false;
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    let room = limit.saturating_sub(body.len() as u64) as usize;
                    if data.len() > room {
                        body.extend_from_slice(&data[..room]);
                        cut_short = true;
                        return Ok(0);
                    }
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(curl_err)?;
            transfer.perform()
        };
        match performed {
            Ok(()) => {}
            Err(e) if e.is_write_error() && cut_short => {}
            Err(e) => return Err(curl_err(e)),
        }

        let code = easy.response_code().map_err(curl_err)?;
        match code {
            206 => {}
            200 => {
                let start = offset as usize;
                if body.len() as u64 >= limit && start > 0 {
                    body.drain(..start);
                } else if start > 0 {
                    return Err(TransportError::PartialTransfer {
                        expected: length,
                        received: (body.len() as u64).saturating_sub(offset),
                    });
                }
            }
            other => return Err(TransportError::Http(other)),
        }

        if body.len() as u64 != length {
            tracing::debug!(url, offset, length, received = body.len(), "short range body");
            return Err(TransportError::PartialTransfer {
                expected: length,
                received: body.len() as u64,
            });
        }
        Ok(body)
    }

    fn resource_size(&self, url: &str) -> Result<u64, TransportError> {
        let mut headers: Vec<String> = Vec::new();
        let mut easy = self
            .handle(url, self.metadata_timeout)
            .map_err(curl_err)?;
        easy.nobody(true).map_err(curl_err)?;
        {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|data| {
                    if let Ok(s) = str::from_utf8(data) {
                        headers.push(s.trim_end().to_string());
                    }
                    true
                })
                .map_err(curl_err)?;
            transfer.perform().map_err(curl_err)?;
        }

        let code = easy.response_code().map_err(curl_err)?;
        if !(200..300).contains(&code) {
            return Err(TransportError::Http(code));
        }
        parse_content_length(&headers)
            .ok_or_else(|| TransportError::Other(format!("no Content-Length from {url}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_verify_tls_with_bounded_metadata_requests() {
        let t = CurlTransport::new();
        assert!(t.verify_tls);
        assert_eq!(t.metadata_timeout, Duration::from_secs(30));
        assert_eq!(t.connect_timeout, Duration::from_secs(15));
    }

    #[test]
    fn builder_sets_options() {
        let t = CurlTransport::new()
            .with_tls_verification(false)
            .with_metadata_timeout(Duration::from_secs(3))
            .with_user_agent("reelfetch-test")
            .with_header("X-Reel", "7");
        assert!(!t.verify_tls);
        assert_eq!(t.metadata_timeout, Duration::from_secs(3));
        assert_eq!(t.user_agent.as_deref(), Some("reelfetch-test"));
        assert_eq!(t.headers, vec![("X-Reel".to_string(), "7".to_string())]);
        // Handles build with verification off.
        assert!(t.handle("https://media.example.test/a.mp4", Duration::from_secs(1)).is_ok());
    }
}
