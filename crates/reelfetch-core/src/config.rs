use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::DownloadTask;

/// `[scheduler]` section: worker pool size and per-download defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Threads in the shared worker pool.
    pub worker_threads: usize,
    /// Chunks of one download in flight at once.
    pub max_concurrent_chunks: usize,
    /// Bytes per range request.
    pub chunk_size: u64,
    /// Attempts per chunk, including the first.
    pub max_retries: u32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Flat delay between attempts of one chunk, in milliseconds.
    pub retry_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 8,
            max_concurrent_chunks: 4,
            chunk_size: 1024 * 1024,
            max_retries: 3,
            timeout_secs: 30,
            retry_interval_ms: 250,
        }
    }
}

impl SchedulerConfig {
    /// Download task for `url` with these settings. Chunk 0 maps to reel 0.
    pub fn task_for(&self, url: &str, total_size: u64) -> DownloadTask {
        DownloadTask {
            url: url.to_string(),
            total_size,
            chunk_size: self.chunk_size,
            max_concurrent_chunks: self.max_concurrent_chunks,
            max_retries: self.max_retries,
            timeout: Duration::from_secs(self.timeout_secs),
            retry_interval: Duration::from_millis(self.retry_interval_ms),
            reel_base: 0,
        }
    }
}

/// `[cache]` section: ring capacity and the memory arena behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_chunks: usize,
    /// Arena size; the pool holds `max_memory_bytes / chunk_size` blocks.
    pub max_memory_bytes: usize,
    /// Block size. Must be at least the scheduler's chunk size.
    pub chunk_size: usize,
    pub enable_preloading: bool,
    pub preload_count: usize,
    /// Pin the arena in RAM with mlock (best effort).
    pub lock_memory: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_chunks: 64,
            max_memory_bytes: 64 * 1024 * 1024,
            chunk_size: 1024 * 1024,
            enable_preloading: true,
            preload_count: 3,
            lock_memory: false,
        }
    }
}

/// Global configuration loaded from `~/.config/reelfetch/config.toml`.
/// Missing sections or keys fall back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelfetchConfig {
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("reelfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ReelfetchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ReelfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml).with_context(|| format!("writing {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit file.
pub fn load_from(path: &Path) -> Result<ReelfetchConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cfg: ReelfetchConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = ReelfetchConfig::default();
        assert_eq!(cfg.scheduler.worker_threads, 8);
        assert_eq!(cfg.scheduler.max_concurrent_chunks, 4);
        assert_eq!(cfg.scheduler.chunk_size, 1024 * 1024);
        assert_eq!(cfg.scheduler.max_retries, 3);
        assert_eq!(cfg.cache.max_chunks, 64);
        assert_eq!(cfg.cache.chunk_size as u64, cfg.scheduler.chunk_size);
        assert!(cfg.cache.enable_preloading);
        assert!(!cfg.cache.lock_memory);
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = ReelfetchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: ReelfetchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            [scheduler]
            max_concurrent_chunks = 2
            chunk_size = 65536
            retry_interval_ms = 10

            [cache]
            max_chunks = 5
            lock_memory = true
        "#;
        let cfg: ReelfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.scheduler.max_concurrent_chunks, 2);
        assert_eq!(cfg.scheduler.chunk_size, 65536);
        assert_eq!(cfg.scheduler.retry_interval_ms, 10);
        // Unset keys keep their defaults.
        assert_eq!(cfg.scheduler.worker_threads, 8);
        assert_eq!(cfg.cache.max_chunks, 5);
        assert!(cfg.cache.lock_memory);
        assert_eq!(cfg.cache.preload_count, 3);
    }

    #[test]
    fn config_toml_empty_is_default() {
        let cfg: ReelfetchConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, ReelfetchConfig::default());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cache]\nmax_chunks = 7\n").unwrap();
        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.cache.max_chunks, 7);

        fs::write(&path, "[cache\nbroken").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing"));

        assert!(load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn task_for_uses_scheduler_settings() {
        let sched = SchedulerConfig {
            chunk_size: 1000,
            max_retries: 5,
            timeout_secs: 2,
            retry_interval_ms: 40,
            ..SchedulerConfig::default()
        };
        let task = sched.task_for("http://example.test/a.mp4", 10_000);
        assert_eq!(task.url, "http://example.test/a.mp4");
        assert_eq!(task.total_size, 10_000);
        assert_eq!(task.chunk_size, 1000);
        assert_eq!(task.max_concurrent_chunks, 4);
        assert_eq!(task.max_retries, 5);
        assert_eq!(task.timeout, Duration::from_secs(2));
        assert_eq!(task.retry_interval, Duration::from_millis(40));
        assert!(task.validate().is_ok());
    }
}
