use std::net::SocketAddr;

use anyhow::Context;
use config::Source;
use serde::{Deserialize, Serialize};

use crate::algorithms::SvdParams;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub model: SvdParams,
    pub recommendation: RecommendationConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub movie_titles_path: String,
    pub ratings_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub default_count: usize,
    pub page_size: usize,
    /// Hard cap on how many recommendations one request may ask for.
    pub max_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid server address {}:{}", self.host, self.port))
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            movie_titles_path: "data/movie_titles.csv".to_string(),
            ratings_path: "data/combined_data_1.txt".to_string(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            default_count: 10,
            page_size: 10,
            max_count: 100,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: num_cpus::get(),
        }
    }
}

impl Config {
    pub fn application_defaults() -> Self {
        Self {
            model: SvdParams::new(3, 0.01, 0.1, 50_000),
            ..Self::default()
        }
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::application_defaults())?)
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("SVDREC").separator("__"))
            .build()
            .with_context(|| format!("failed to load configuration from {path}"))?;

        let mut root = settings.collect()?;
        if let Some(model) = root.remove("model") {
            root.insert("model".to_string(), resolve_step_alias(model)?);
        }
        config::Value::new(None, config::ValueKind::Table(root))
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {path}"))
    }

    pub fn load_or_default(path: &str) -> anyhow::Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::info!("Config file {} not found, using default configuration", path);
            Ok(Self::application_defaults())
        }
    }
}

// The defaults layer always carries `update_steps`, so an `n_epochs` key from a
// later layer has to replace it before serde sees both.
fn resolve_step_alias(model: config::Value) -> anyhow::Result<config::Value> {
    let mut table = model.into_table()?;
    if let Some(steps) = table.remove("n_epochs") {
        table.insert("update_steps".to_string(), steps);
    }
    Ok(config::Value::new(None, config::ValueKind::Table(table)))
}
