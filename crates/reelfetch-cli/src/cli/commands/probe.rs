//! `reelfetch probe <url>` – print the remote resource size and range support.

use anyhow::{Context, Result};
use reelfetch_core::config::ReelfetchConfig;
use reelfetch_core::retry::{run_with_retry, RetryPolicy};
use reelfetch_core::transport::{CurlTransport, TransportClient};
use std::sync::Arc;
use std::time::Duration;

/// Transport for one command: probe timeout from config, optional TLS bypass.
pub(super) fn transport_for(timeout_secs: u64, insecure: bool) -> CurlTransport {
    if insecure {
        tracing::warn!("TLS verification disabled");
    }
    CurlTransport::new()
        .with_metadata_timeout(Duration::from_secs(timeout_secs))
        .with_tls_verification(!insecure)
}

/// HEAD the resource, with retries, off the async runtime.
pub(super) async fn probe_size(transport: Arc<CurlTransport>, url: &str) -> Result<u64> {
    let url = url.to_string();
    let size = tokio::task::spawn_blocking(move || {
        run_with_retry(&RetryPolicy::default(), || transport.resource_size(&url))
    })
    .await
    .context("probe task join")??;
    Ok(size)
}

pub async fn run_probe(cfg: &ReelfetchConfig, url: &str, insecure: bool) -> Result<()> {
    let transport = Arc::new(transport_for(cfg.scheduler.timeout_secs, insecure));
    let size = probe_size(Arc::clone(&transport), url)
        .await
        .with_context(|| format!("probing {url}"))?;
    println!("{size} bytes ({:.2} MiB)", size as f64 / 1_048_576.0);

    let target = url.to_string();
    let ranges = tokio::task::spawn_blocking(move || transport.supports_range_requests(&target))
        .await
        .context("range check join")?;
    match ranges {
        Ok(true) => println!("byte ranges: supported"),
        Ok(false) => println!("byte ranges: not supported (chunks are cut from full responses)"),
        Err(e) => println!("byte ranges: unknown ({e})"),
    }
    Ok(())
}
