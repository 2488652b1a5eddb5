//! `rpcretry config` – show the effective retry settings.

use anyhow::Result;
use rpcretry_core::config;

pub fn run_config(path_only: bool) -> Result<()> {
    let path = config::config_path()?;
    if path_only {
        println!("{}", path.display());
        return Ok(());
    }
    let settings = config::load_or_init()?;
    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}
