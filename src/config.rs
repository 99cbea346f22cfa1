use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::matcher::{DEFAULT_MAX_PER_PERSON, DEFAULT_TOP_K};
use crate::similarity::Metric;

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEMATCH_CONFIG_PATH").unwrap_or("/usr/local/etc/facematch/config.toml"))
});

pub static MODEL_DIR: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEMATCH_MODEL_DIR").unwrap_or("/usr/local/share/facematch/models"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub model_dir: PathBuf,
    pub metric: Metric,
    /// Ranking policy selector: `all`, `person` or `diverse`.
    pub policy: String,
    pub top_k: i64,
    pub max_per_person: i64,
    pub image_width: u32,
    pub image_height: u32,
    pub image_base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: MODEL_DIR.to_path_buf(),
            metric: Metric::Cosine,
            policy: "all".to_string(),
            top_k: DEFAULT_TOP_K as i64,
            max_per_person: DEFAULT_MAX_PER_PERSON as i64,
            image_width: 128,
            image_height: 128,
            image_base_url: None,
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
