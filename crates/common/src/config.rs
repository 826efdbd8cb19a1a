use anyhow::Result;
use serde::Deserialize;
use std::str::FromStr;

use crate::types::{Granularity, SwapPolicy};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub source: Source,
    pub aggregation: Aggregation,
    pub observability: Observability,
    pub web: Option<Web>,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Source {
    /// Directory holding `<relation>.json` exports.
    pub snapshot_dir: String,
    #[serde(default = "default_relation")]
    pub relation: String,
}

fn default_relation() -> String {
    "main_volume_table".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Aggregation {
    #[serde(default)]
    pub swap_policy: SwapPolicy,
    pub top_n: usize,
    pub default_granularity: Granularity,
}

#[derive(Debug, Deserialize)]
pub struct Observability {
    pub service_name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Web {
    pub port: u16,
    pub host: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let content = std::fs::read_to_string("config/default.toml")?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
