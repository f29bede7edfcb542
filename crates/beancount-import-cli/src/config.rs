use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPending {
    Input,
    Date,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub account: Option<String>,
    pub payees: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub flag: Option<String>,
    pub operating_currency: Option<bool>,
    pub sort_pending: Option<SortPending>,
    pub default_currency: Option<String>,
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<(PathBuf, Self)> {
        let base_dir = path.parent().map(ToOwned::to_owned).unwrap_or_default();

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.payees = config.payees.map(|payees| base_dir.join(payees));
        config.output = config.output.map(|output| base_dir.join(output));

        tracing::debug!("loaded config from {}", path.display());
        Ok((base_dir, config))
    }

    pub fn find_and_load() -> Result<Option<(PathBuf, Self)>> {
        let config_locations = [
            Path::new("bean-import.toml"),
            Path::new(".bean-import.toml"),
        ];

        for location in &config_locations {
            if location.exists() {
                return Self::load_from_file(location).map(Some);
            }
        }

        Ok(None)
    }
}
