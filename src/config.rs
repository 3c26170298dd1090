use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Context, Result, anyhow};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TOP_K: usize = 5;
pub const BASE_URL_ENV: &str = "RESUME_ASSISTANT_API_BASE";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub top_k: usize,
    pub show_citations: bool,
    pub send_model: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_model: None,
            top_k: DEFAULT_TOP_K,
            show_citations: true,
            send_model: false,
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    pub fn save_default_model(model: &str) -> Result<()> {
        Self::save_default_model_to(&Self::get_config_path()?, model)
    }

    /// Fails without writing when the existing file cannot be parsed.
    pub fn save_default_model_to(config_path: &Path, model: &str) -> Result<()> {
        let mut config = Self::load_from(config_path).with_context(|| {
            format!("Refusing to overwrite unreadable config {}", config_path.display())
        })?;
        config.default_model = Some(model.to_string());
        config.save_to(config_path)
    }

    /// Base URL precedence: explicit flag, then environment, then config file.
    pub fn resolve_base_url(&self, flag: Option<&str>, env: Option<&str>) -> String {
        let raw = flag
            .filter(|s| !s.trim().is_empty())
            .or(env.filter(|s| !s.trim().is_empty()))
            .or(self.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL);
        raw.trim().trim_end_matches('/').to_string()
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("resume-assistant"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }
}
