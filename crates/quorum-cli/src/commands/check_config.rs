//! `quorum check-config`

use anyhow::Context;
use std::path::Path;
use tracing::info;

pub fn run(path: &Path) -> anyhow::Result<()> {
    let config = super::load_config(Some(path))?;
    config.validate().context("configuration is invalid")?;
    info!(path = %path.display(), scheme = %config.scheme, "Configuration valid");

    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
