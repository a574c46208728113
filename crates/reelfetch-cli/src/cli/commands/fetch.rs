//! `reelfetch fetch <url>` – run scheduler and cache against one resource.

use anyhow::{bail, Context, Result};
use reelfetch_core::cache::ChunkCache;
use reelfetch_core::config::{CacheConfig, ReelfetchConfig, SchedulerConfig};
use reelfetch_core::scheduler::{ChunkScheduler, SchedulerEvent, StatsSnapshot};
use reelfetch_core::worker::WorkerPool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::probe::{probe_size, transport_for};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

/// Command-line overrides for one fetch.
#[derive(Debug, Clone)]
pub struct FetchArgs {
    pub url: String,
    pub chunk_size: Option<u64>,
    pub concurrency: Option<usize>,
    pub retries: Option<u32>,
    pub timeout: Option<u64>,
    pub json: bool,
    pub insecure: bool,
}

pub(crate) fn effective_configs(cfg: &ReelfetchConfig, args: &FetchArgs) -> (SchedulerConfig, CacheConfig) {
    let mut sched = cfg.scheduler.clone();
    if let Some(n) = args.chunk_size {
        sched.chunk_size = n;
    }
    if let Some(n) = args.concurrency {
        sched.max_concurrent_chunks = n;
    }
    if let Some(n) = args.retries {
        sched.max_retries = n;
    }
    if let Some(n) = args.timeout {
        sched.timeout_secs = n;
    }

    // Cache blocks must hold a whole chunk.
    let mut cache = cfg.cache.clone();
    let chunk = usize::try_from(sched.chunk_size).unwrap_or(usize::MAX);
    if cache.chunk_size < chunk {
        cache.chunk_size = chunk;
    }
    cache.max_memory_bytes = cache.max_memory_bytes.max(cache.chunk_size);
    (sched, cache)
}

fn print_progress(stats: &StatsSnapshot) {
    let done_mib = stats.total_downloaded as f64 / 1_048_576.0;
    let total_mib = stats.total_size as f64 / 1_048_576.0;
    let rate_mib = stats.current_speed as f64 / 1_048_576.0;
    let eta = stats
        .eta_secs()
        .map(|s| format!("{s}s"))
        .unwrap_or_else(|| "?".to_string());
    println!(
        "  {:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  {} active  ETA {}",
        done_mib,
        total_mib,
        stats.percent(),
        rate_mib,
        stats.active_threads,
        eta
    );
}

fn print_summary(stats: &StatsSnapshot, cache: &ChunkCache) {
    let secs = stats.elapsed_time as f64 / 1000.0;
    println!(
        "{} / {} chunks in {:.2}s, {} bytes, avg {:.2} MiB/s",
        stats.completed_chunks,
        stats.total_chunks,
        secs,
        stats.total_downloaded,
        stats.average_speed as f64 / 1_048_576.0
    );
    let m = cache.metrics();
    println!(
        "cache: {} / {} chunks resident, {} / {} bytes in use, {} evicted",
        m.resident, m.capacity, m.used_memory, m.total_memory, m.total_chunks_evicted
    );
}

pub async fn run_fetch(cfg: &ReelfetchConfig, args: FetchArgs) -> Result<()> {
    let (sched_cfg, cache_cfg) = effective_configs(cfg, &args);

    let transport = Arc::new(transport_for(sched_cfg.timeout_secs, args.insecure));
    let total = probe_size(Arc::clone(&transport), &args.url)
        .await
        .with_context(|| format!("probing {}", args.url))?;
    if total == 0 {
        bail!("{} is empty", args.url);
    }

    let workers = Arc::new(WorkerPool::new(sched_cfg.worker_threads).context("starting worker pool")?);
    let cache = Arc::new(ChunkCache::new(&cache_cfg).context("creating chunk cache")?);
    let scheduler = Arc::new(ChunkScheduler::new(workers, transport, Arc::clone(&cache)));

    let mut events = scheduler.subscribe();
    scheduler.start(sched_cfg.task_for(&args.url, total))?;
    if !args.json {
        println!("fetching {} ({} bytes)", args.url, total);
    }

    let mut last_print = Instant::now();
    let mut interrupted = false;
    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Some(SchedulerEvent::Progress(stats)) => {
                    if !args.json && last_print.elapsed() >= PROGRESS_INTERVAL {
                        print_progress(&stats);
                        last_print = Instant::now();
                    }
                }
                Some(SchedulerEvent::ChunkFailed { info, .. }) => {
                    if !args.json {
                        eprintln!(
                            "chunk {} failed: {}",
                            info.chunk_index,
                            info.error.as_deref().unwrap_or("unknown error")
                        );
                    }
                }
                Some(ev) if ev.is_terminal() => break,
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                tracing::info!("interrupted, stopping download");
                scheduler.stop();
            }
        }
    }

    let stats = scheduler.stats();
    if args.json {
        let out = serde_json::json!({
            "url": args.url,
            "state": scheduler.state(),
            "stats": stats,
            "cache": cache.metrics(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_summary(&stats, &cache);
    }
    let failed = stats.failed_chunks;

    // Dropping the scheduler joins its dispatch thread.
    tokio::task::spawn_blocking(move || drop(scheduler))
        .await
        .context("scheduler shutdown join")?;

    if interrupted {
        bail!("download interrupted");
    }
    if failed > 0 {
        bail!("{failed} chunk(s) failed");
    }
    Ok(())
}
