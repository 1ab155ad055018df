pub mod check_config;
pub mod simulate;

use anyhow::Context;
use quorum_core::QuorumConfig;
use std::path::Path;

/// Load `path` (or defaults), overlay the environment and validate
pub fn load_config(path: Option<&Path>) -> anyhow::Result<QuorumConfig> {
    let mut config = match path {
        Some(path) => QuorumConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => QuorumConfig::default(),
    };
    config
        .merge_with_env()
        .context("applying QUORUM_* overrides")?;
    Ok(config)
}
