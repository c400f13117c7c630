use std::path::Path;

use anyhow::{Context, Result};
use drift_core::MechanismConfig;
use serde::Deserialize;

/// Optional TOML run file. Every key may be omitted; command-line flags win
/// over values found here.
///
/// ```toml
/// seed = 7
/// count = 200
/// months = 3
///
/// [mechanisms]
/// drift_limit = 0.15
/// use_time_decay = true
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub seed: Option<u64>,
    pub count: Option<usize>,
    pub months: Option<u32>,
    pub sample_size: Option<usize>,
    /// Stagger join days on an exponential growth schedule.
    pub growth: Option<bool>,
    pub mechanisms: Option<MechanismConfig>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid run config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}
