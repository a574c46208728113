//! `reelfetch config` – show where the config lives and what is in effect.

use anyhow::Result;
use reelfetch_core::config::{self, ReelfetchConfig};

pub fn run_config(cfg: &ReelfetchConfig) -> Result<()> {
    println!("# {}", config::config_path()?.display());
    print!("{}", toml::to_string_pretty(cfg)?);
    Ok(())
}
