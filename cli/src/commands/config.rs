use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use vm::VmConfig;

/// Contents of a `--config` file.
///
/// ```toml
/// [vm]
/// max_depth = 500
/// time_slice = 64
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub vm: VmConfig,
}

pub fn load_config(path: Option<&str>) -> Result<VmConfig> {
    let Some(path) = path else {
        return Ok(VmConfig::default());
    };
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read config {}", path))?;
    let parsed: CliConfig =
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path))?;
    Ok(parsed.vm)
}
