//! Loaded model artifacts and the seams the handlers call through.

pub mod native;
pub mod onnx;

use anyhow::{bail, Context, Result};
use common::{ArtifactConfig, ArtifactInfo, ModelsConfig};
use std::{collections::BTreeMap, path::Path, sync::Arc, time::Instant};
use tracing::{info, warn};

use crate::error::InferenceError;
use crate::features::FeatureRow;
use native::{CentroidAssigner, LogisticScorer, StandardScaler};
use onnx::OnnxModel;

/// Binary classifier returning one probability per class; index 1 is the
/// positive class.
pub trait Scorer: Send + Sync {
    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>, InferenceError>;
}

pub trait ClusterAssigner: Send + Sync {
    fn assign(&self, row: &FeatureRow) -> Result<i64, InferenceError>;
}

pub trait FeatureScaler: Send + Sync {
    fn transform(&self, row: &FeatureRow) -> Result<FeatureRow, InferenceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Onnx,
    Json,
}

impl ArtifactFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("onnx") => Ok(ArtifactFormat::Onnx),
            Some("json") => Ok(ArtifactFormat::Json),
            _ => bail!(
                "Unsupported artifact format for {} (expected .onnx or .json)",
                path.display()
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactFormat::Onnx => "onnx",
            ArtifactFormat::Json => "json",
        }
    }
}

/// Everything the handlers need, loaded once before the listener binds.
pub struct ModelSet {
    pub scorer: Arc<dyn Scorer>,
    pub assigner: Arc<dyn ClusterAssigner>,
    pub scaler: Arc<dyn FeatureScaler>,
    pub artifacts: BTreeMap<String, ArtifactInfo>,
    pub load_time_ms: f64,
}

fn describe(artifact: &ArtifactConfig, format: ArtifactFormat, features: &[String]) -> ArtifactInfo {
    ArtifactInfo {
        path: artifact.path.display().to_string(),
        format: format.as_str().to_string(),
        features: features.to_vec(),
    }
}

fn load_scorer(artifact: &ArtifactConfig, pool_size: usize) -> Result<(Arc<dyn Scorer>, ArtifactInfo)> {
    let format = ArtifactFormat::from_path(&artifact.path)?;
    Ok(match format {
        ArtifactFormat::Json => {
            let model = LogisticScorer::load(&artifact.path)?;
            let info = describe(artifact, format, model.features());
            let model: Arc<dyn Scorer> = Arc::new(model);
            (model, info)
        }
        ArtifactFormat::Onnx => {
            let model: Arc<dyn Scorer> =
                Arc::new(OnnxModel::load(artifact, "probabilities", pool_size)?);
            (model, describe(artifact, format, &artifact.features))
        }
    })
}

fn load_assigner(
    artifact: &ArtifactConfig,
    pool_size: usize,
) -> Result<(Arc<dyn ClusterAssigner>, ArtifactInfo)> {
    let format = ArtifactFormat::from_path(&artifact.path)?;
    Ok(match format {
        ArtifactFormat::Json => {
            let model = CentroidAssigner::load(&artifact.path)?;
            let info = describe(artifact, format, model.features());
            let model: Arc<dyn ClusterAssigner> = Arc::new(model);
            (model, info)
        }
        ArtifactFormat::Onnx => {
            let model: Arc<dyn ClusterAssigner> =
                Arc::new(OnnxModel::load(artifact, "label", pool_size)?);
            (model, describe(artifact, format, &artifact.features))
        }
    })
}

fn load_scaler(
    artifact: &ArtifactConfig,
    pool_size: usize,
) -> Result<(Arc<dyn FeatureScaler>, ArtifactInfo)> {
    let format = ArtifactFormat::from_path(&artifact.path)?;
    Ok(match format {
        ArtifactFormat::Json => {
            let model = StandardScaler::load(&artifact.path)?;
            let info = describe(artifact, format, model.features());
            let model: Arc<dyn FeatureScaler> = Arc::new(model);
            (model, info)
        }
        ArtifactFormat::Onnx => {
            let model: Arc<dyn FeatureScaler> =
                Arc::new(OnnxModel::load(artifact, "variable", pool_size)?);
            (model, describe(artifact, format, &artifact.features))
        }
    })
}

impl ModelSet {
    /// Load every configured artifact. Any missing or corrupt file fails the
    /// whole set.
    pub fn load(config: &ModelsConfig) -> Result<Self> {
        let start_time = Instant::now();
        let pool_size = config.pool_size;
        let mut artifacts = BTreeMap::new();

        info!("Loading loan default scorer: {}", config.loan_default.path.display());
        let (scorer, scorer_info) = load_scorer(&config.loan_default, pool_size)
            .context("Failed to load loan default scorer")?;
        info!("✓ Scorer loaded ({})", scorer_info.format);
        artifacts.insert("loan_default".to_string(), scorer_info);

        if let Some(shadowed) = &config.kmeans_model {
            info!("Loading cluster model: {}", shadowed.path.display());
            let (_, shadowed_info) = load_assigner(shadowed, 1)
                .context("Failed to load kmeans_model")?;
            warn!(
                "kmeans_model ({}) is shadowed by kmeans_customers and will not serve requests",
                shadowed_info.path
            );
        }

        info!("Loading customer cluster model: {}", config.kmeans_customers.path.display());
        let (assigner, assigner_info) = load_assigner(&config.kmeans_customers, pool_size)
            .context("Failed to load kmeans_customers")?;
        info!("✓ Cluster assigner loaded ({})", assigner_info.format);
        artifacts.insert("kmeans_customers".to_string(), assigner_info);

        info!("Loading feature scaler: {}", config.kmeans_scaler.path.display());
        let (scaler, scaler_info) = load_scaler(&config.kmeans_scaler, pool_size)
            .context("Failed to load kmeans_scaler")?;
        info!("✓ Feature scaler loaded ({})", scaler_info.format);
        artifacts.insert("kmeans_scaler".to_string(), scaler_info);

        let load_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        info!("✓ Models loaded in {:.2}ms", load_time_ms);

        Ok(Self {
            scorer,
            assigner,
            scaler,
            artifacts,
            load_time_ms,
        })
    }

    /// Assemble a set from already-built models.
    pub fn from_parts(
        scorer: Arc<dyn Scorer>,
        assigner: Arc<dyn ClusterAssigner>,
        scaler: Arc<dyn FeatureScaler>,
    ) -> Self {
        Self {
            scorer,
            assigner,
            scaler,
            artifacts: BTreeMap::new(),
            load_time_ms: 0.0,
        }
    }
}
