use super::parse;
use crate::cli::commands::FetchArgs;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use reelfetch_core::config::ReelfetchConfig;

#[test]
fn cli_parse_fetch_defaults() {
    match parse(&["reelfetch", "fetch", "https://cdn.example.com/reel.mp4"]) {
        CliCommand::Fetch {
            url,
            chunk_size,
            concurrency,
            retries,
            timeout,
            json,
            insecure,
        } => {
            assert_eq!(url, "https://cdn.example.com/reel.mp4");
            assert!(!insecure);
            assert!(chunk_size.is_none());
            assert!(concurrency.is_none());
            assert!(retries.is_none());
            assert!(timeout.is_none());
            assert!(!json);
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_overrides() {
    match parse(&[
        "reelfetch",
        "fetch",
        "https://cdn.example.com/reel.mp4",
        "--chunk-size",
        "262144",
        "--concurrency",
        "2",
        "--retries",
        "5",
        "--timeout",
        "10",
        "--json",
        "--insecure",
    ]) {
        CliCommand::Fetch {
            chunk_size,
            concurrency,
            retries,
            timeout,
            json,
            insecure,
            ..
        } => {
            assert!(insecure);
            assert_eq!(chunk_size, Some(262_144));
            assert_eq!(concurrency, Some(2));
            assert_eq!(retries, Some(5));
            assert_eq!(timeout, Some(10));
            assert!(json);
        }
        _ => panic!("expected Fetch"),
    }
}

#[test]
fn cli_parse_fetch_rejects_bad_number() {
    let r = Cli::try_parse_from(["reelfetch", "fetch", "http://x/y", "--concurrency", "many"]);
    assert!(r.is_err());
}

fn args(chunk_size: Option<u64>) -> FetchArgs {
    FetchArgs {
        url: "http://example.test/reel.mp4".into(),
        chunk_size,
        concurrency: Some(1),
        retries: None,
        timeout: Some(3),
        json: false,
        insecure: false,
    }
}

#[test]
fn effective_configs_apply_overrides() {
    let cfg = ReelfetchConfig::default();
    let (sched, cache) = crate::cli::commands::effective_configs(&cfg, &args(None));
    assert_eq!(sched.max_concurrent_chunks, 1);
    assert_eq!(sched.timeout_secs, 3);
    assert_eq!(sched.max_retries, cfg.scheduler.max_retries);
    assert_eq!(sched.chunk_size, cfg.scheduler.chunk_size);
    assert_eq!(cache, cfg.cache);
}

#[test]
fn effective_configs_grow_cache_blocks_to_chunk() {
    let mut cfg = ReelfetchConfig::default();
    cfg.cache.max_memory_bytes = 1024;
    let (sched, cache) = crate::cli::commands::effective_configs(&cfg, &args(Some(4 * 1024 * 1024)));
    assert_eq!(sched.chunk_size, 4 * 1024 * 1024);
    assert_eq!(cache.chunk_size, 4 * 1024 * 1024);
    assert_eq!(cache.max_memory_bytes, 4 * 1024 * 1024);
}
