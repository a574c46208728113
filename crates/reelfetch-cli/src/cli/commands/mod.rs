//! CLI command handlers, one file per command.

mod completions;
mod config;
mod fetch;
mod probe;

pub use completions::{run_completions, run_man};
pub use config::run_config;
pub use fetch::{run_fetch, FetchArgs};
#[cfg(test)]
pub(crate) use fetch::effective_configs;
pub use probe::run_probe;
