use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::fs;
use anyhow::{Context, Result};

use crate::types::PolicyFlag;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub heatmap: HeatmapConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub data_csv: PathBuf,
    pub boundary_file: Option<PathBuf>, // Outlines drawn under the heatmap
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HeatmapConfig {
    #[serde(default = "default_variable")]
    pub default_variable: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_max_bubble_radius")]
    pub max_bubble_radius: f64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_variable() -> String {
    PolicyFlag::RequiresComprehensiveReporting.column().to_string()
}

fn default_width() -> u32 {
    1200
}

fn default_height() -> u32 {
    700
}

fn default_max_bubble_radius() -> f64 {
    20.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            default_variable: default_variable(),
            width: default_width(),
            height: default_height(),
            max_bubble_radius: default_max_bubble_radius(),
        }
    }
}

impl HeatmapConfig {
    pub fn default_flag(&self) -> Result<PolicyFlag> {
        self.default_variable
            .parse()
            .map_err(|v| anyhow::anyhow!("Unknown default heatmap variable: {}", v))
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.heatmap.default_flag()?;
        Ok(config)
    }

    /// Replace the configured CSV path, e.g. from `--data` or the environment.
    pub fn with_data_csv(mut self, data_csv: Option<PathBuf>) -> Self {
        if let Some(path) = data_csv {
            self.input.data_csv = path;
        }
        self
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
