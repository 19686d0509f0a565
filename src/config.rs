use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

/// Detection backend default (its stock `uvicorn` port).
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Deserialize, Default)]
struct AppConfigFile {
    api: Option<ApiConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Detection service base URL, without trailing slash.
    pub api_base_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    /// Resolve configuration: `DETECT_CONFIG` file, then `DETECT_API_URL`, then defaults.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("DETECT_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AppConfigFile) -> Self {
        let api_base_url = file
            .api
            .and_then(|api| api.base_url)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Self { api_base_url }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("DETECT_API_URL") {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
    }

    fn validate(&mut self) -> Result<()> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/').to_string();
        let parsed = url::Url::parse(&trimmed)
            .map_err(|e| anyhow!("invalid detection API URL '{}': {}", trimmed, e))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported detection API scheme '{}'; expected http or https",
                    other
                ))
            }
        }
        self.api_base_url = trimmed;
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<AppConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
