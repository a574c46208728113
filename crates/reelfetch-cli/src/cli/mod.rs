//! CLI for the reelfetch chunk prefetcher.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use reelfetch_core::config;

use commands::{run_completions, run_config, run_fetch, run_man, run_probe, FetchArgs};

/// Top-level CLI for reelfetch.
#[derive(Debug, Parser)]
#[command(name = "reelfetch")]
#[command(about = "reelfetch: chunked range prefetcher with a fixed-memory chunk cache", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print the size of a remote resource.
    Probe {
        /// Direct HTTP/HTTPS URL.
        url: String,

        /// Skip TLS certificate and host name verification.
        #[arg(long)]
        insecure: bool,
    },

    /// Download a resource chunk by chunk into the in-memory cache.
    Fetch {
        /// Direct HTTP/HTTPS URL.
        url: String,

        /// Bytes per range request (defaults to the config value).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u64>,

        /// Chunks in flight at once.
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Attempts per chunk, including the first.
        #[arg(long, value_name = "N")]
        retries: Option<u32>,

        /// Per-request timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Print final statistics as JSON.
        #[arg(long)]
        json: bool,

        /// Skip TLS certificate and host name verification.
        #[arg(long)]
        insecure: bool,
    },

    /// Show the config file path and effective settings.
    Config,

    /// Generate shell completions on stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Generate a man page on stdout.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        // Generators need no config on disk.
        match cli.command {
            CliCommand::Completions { shell } => return run_completions(shell),
            CliCommand::Man => return run_man(),
            _ => {}
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Probe { url, insecure } => run_probe(&cfg, &url, insecure).await?,
            CliCommand::Fetch {
                url,
                chunk_size,
                concurrency,
                retries,
                timeout,
                json,
                insecure,
            } => {
                let args = FetchArgs {
                    url,
                    chunk_size,
                    concurrency,
                    retries,
                    timeout,
                    json,
                    insecure,
                };
                run_fetch(&cfg, args).await?;
            }
            CliCommand::Config => run_config(&cfg)?,
            CliCommand::Completions { .. } | CliCommand::Man => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
