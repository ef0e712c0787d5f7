use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_POINTS_STORE, DEFAULT_STOCKS_CACHE, DEFAULT_TRACE_FILES,
};

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct StudyConfig {
    pub inputs: InputsConfig,
    pub study: StudySection,
    pub estimate: EstimateSection,
    pub threshold: ThresholdSection,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InputsConfig {
    pub default_traces: Vec<PathBuf>,
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            default_traces: DEFAULT_TRACE_FILES.iter().map(PathBuf::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct StudySection {
    pub top: usize,
    pub min_pairs: usize,
}

impl Default for StudySection {
    fn default() -> Self {
        Self {
            top: 20,
            min_pairs: 3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct EstimateSection {
    pub stocks_cache: PathBuf,
    pub points_store: PathBuf,
}

impl Default for EstimateSection {
    fn default() -> Self {
        Self {
            stocks_cache: PathBuf::from(DEFAULT_STOCKS_CACHE),
            points_store: PathBuf::from(DEFAULT_POINTS_STORE),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ThresholdSection {
    pub steps: usize,
    pub margin: f64,
    pub keep_target: f64,
}

impl Default for ThresholdSection {
    fn default() -> Self {
        Self {
            steps: 50,
            margin: 10.0,
            keep_target: 0.7,
        }
    }
}

/// Load `explicit`, else `./tracestudy.toml` when present, else defaults.
/// An explicit path that does not exist is an error.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<StudyConfig> {
    let path = match explicit {
        Some(p) => {
            if !p.is_file() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            p.to_path_buf()
        }
        None => {
            let p = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !p.is_file() {
                return Ok(StudyConfig::default());
            }
            p
        }
    };
    let raw = std::fs::read_to_string(&path)?;
    let cfg: StudyConfig = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(cfg)
}

impl StudyConfig {
    /// Configured default traces that exist on disk.
    pub fn existing_default_traces(&self) -> Vec<PathBuf> {
        self.inputs
            .default_traces
            .iter()
            .filter(|p| p.is_file())
            .cloned()
            .collect()
    }
}
