use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::http::RecommendRequest;

pub const CONFIG_ENV: &str = "SERVICE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/service.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_loan_default")]
    pub loan_default: ArtifactConfig,
    /// Loaded and validated at startup but shadowed by `kmeans_customers`.
    /// `null` skips it.
    #[serde(default = "default_kmeans_model")]
    pub kmeans_model: Option<ArtifactConfig>,
    #[serde(default = "default_kmeans_customers")]
    pub kmeans_customers: ArtifactConfig,
    #[serde(default = "default_kmeans_scaler")]
    pub kmeans_scaler: ArtifactConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub path: PathBuf,
    /// Ordered column names. Required for ONNX artifacts, ignored by JSON
    /// artifacts, which carry their own.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

impl ArtifactConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            features: Vec::new(),
            input: None,
            output: None,
        }
    }

    pub fn with_features(mut self, features: &[&str]) -> Self {
        self.features = features.iter().map(|f| f.to_string()).collect();
        self
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_pool_size() -> usize {
    4
}

fn default_loan_default() -> ArtifactConfig {
    ArtifactConfig::at("models/best_loan_model.onnx")
}

fn default_kmeans_model() -> Option<ArtifactConfig> {
    Some(ArtifactConfig::at("models/kmeans_model.onnx").with_features(&RecommendRequest::FEATURES))
}

fn default_kmeans_customers() -> ArtifactConfig {
    ArtifactConfig::at("models/kmeans_customers.onnx").with_features(&RecommendRequest::FEATURES)
}

fn default_kmeans_scaler() -> ArtifactConfig {
    ArtifactConfig::at("models/kmeans_scaler.onnx").with_features(&RecommendRequest::FEATURES)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            loan_default: default_loan_default(),
            kmeans_model: default_kmeans_model(),
            kmeans_customers: default_kmeans_customers(),
            kmeans_scaler: default_kmeans_scaler(),
        }
    }
}

impl ServiceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServiceConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the config the way the server does at startup: an explicit
    /// `SERVICE_CONFIG` must exist, the default path is optional, then
    /// `BIND_ADDR` and `POOL_SIZE` override.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::load(&path)
                .with_context(|| format!("Failed to load service config from {}", path))?,
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::load(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("Failed to load service config from {}", DEFAULT_CONFIG_PATH))?,
            Err(_) => Self::default(),
        };

        config.apply_overrides(
            std::env::var("BIND_ADDR").ok(),
            std::env::var("POOL_SIZE").ok(),
        );
        Ok(config)
    }

    pub fn apply_overrides(&mut self, bind: Option<String>, pool_size: Option<String>) {
        if let Some(bind) = bind.filter(|b| !b.trim().is_empty()) {
            self.server.bind = bind.trim().to_string();
        }

        if let Some(size) = pool_size
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&s| s > 0)
        {
            self.models.pool_size = size;
        }
    }
}
