//! ONNX Runtime backend for exported models.
//!
//! Each artifact consumes a single `[1, n]` float tensor whose columns follow
//! the configured `features` list. Classifiers must be exported without the
//! zipmap post-processor so that probabilities come back as a plain tensor.

use anyhow::{anyhow, bail, Result};
use common::ArtifactConfig;
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, MutexGuard,
};
use tracing::info;

use super::{ClusterAssigner, FeatureScaler, Scorer};
use crate::error::InferenceError;
use crate::features::FeatureRow;

// A session needs exclusive access while it runs, so requests rotate over a
// small pool of them.
struct SessionPool {
    sessions: Vec<Mutex<Session>>,
    pool_size: usize,
    round_robin_counter: AtomicUsize,
}

impl SessionPool {
    fn new(sessions: Vec<Session>) -> Self {
        let pool_size = sessions.len();
        let sessions = sessions.into_iter().map(Mutex::new).collect();
        Self {
            sessions,
            pool_size,
            round_robin_counter: AtomicUsize::new(0),
        }
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Session>, InferenceError> {
        let idx = self.round_robin_counter.fetch_add(1, Ordering::Relaxed) % self.pool_size;
        self.sessions[idx]
            .lock()
            .map_err(|_| InferenceError::Runtime(format!("session {} lock poisoned", idx)))
    }
}

pub struct OnnxModel {
    pool: SessionPool,
    input: String,
    output: String,
    features: Vec<String>,
}

impl OnnxModel {
    pub fn load(artifact: &ArtifactConfig, default_output: &str, pool_size: usize) -> Result<Self> {
        let path = &artifact.path;
        if artifact.features.is_empty() {
            bail!(
                "ONNX artifact {} needs a features list in the service config",
                path.display()
            );
        }
        if !path.exists() {
            bail!("ONNX model not found at {}", path.display());
        }

        let pool_size = pool_size.max(1);
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let threads_per_session = (cpu_count / pool_size).max(1);

        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(threads_per_session)?
                .with_inter_threads(1)?
                .commit_from_file(path)?;
            sessions.push(session);
        }

        let input = match &artifact.input {
            Some(name) => name.clone(),
            None => sessions[0]
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or_else(|| anyhow!("ONNX model {} declares no inputs", path.display()))?,
        };
        let output = artifact
            .output
            .clone()
            .unwrap_or_else(|| default_output.to_string());

        if !sessions[0].inputs.iter().any(|i| i.name == input) {
            bail!("ONNX model {} has no input named '{}'", path.display(), input);
        }
        if !sessions[0].outputs.iter().any(|o| o.name == output) {
            let declared: Vec<&str> = sessions[0].outputs.iter().map(|o| o.name.as_str()).collect();
            bail!(
                "ONNX model {} has no output named '{}' (declared: {})",
                path.display(),
                output,
                declared.join(", ")
            );
        }

        info!(
            "  {} sessions with {} threads each, input '{}', output '{}'",
            pool_size, threads_per_session, input, output
        );

        Ok(Self {
            pool: SessionPool::new(sessions),
            input,
            output,
            features: artifact.features.clone(),
        })
    }

    fn input_tensor(&self, row: &FeatureRow) -> Result<Tensor<f32>, InferenceError> {
        let array = row.to_array(&self.features)?.mapv(|v| v as f32);
        Ok(Tensor::from_array(array)?)
    }

    fn run_f32(&self, row: &FeatureRow) -> Result<Vec<f32>, InferenceError> {
        let input = self.input_tensor(row)?;
        let mut session = self.pool.acquire()?;
        let outputs = session.run(ort::inputs![self.input.as_str() => input])?;
        let (_shape, data) = outputs
            .get(self.output.as_str())
            .ok_or_else(|| InferenceError::Output(format!("no output named '{}'", self.output)))?
            .try_extract_tensor::<f32>()?;
        Ok(data.to_vec())
    }

    fn run_i64(&self, row: &FeatureRow) -> Result<Vec<i64>, InferenceError> {
        let input = self.input_tensor(row)?;
        let mut session = self.pool.acquire()?;
        let outputs = session.run(ort::inputs![self.input.as_str() => input])?;
        let (_shape, data) = outputs
            .get(self.output.as_str())
            .ok_or_else(|| InferenceError::Output(format!("no output named '{}'", self.output)))?
            .try_extract_tensor::<i64>()?;
        Ok(data.to_vec())
    }
}

impl Scorer for OnnxModel {
    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>, InferenceError> {
        let probabilities = self.run_f32(row)?;
        Ok(probabilities.into_iter().map(f64::from).collect())
    }
}

impl ClusterAssigner for OnnxModel {
    fn assign(&self, row: &FeatureRow) -> Result<i64, InferenceError> {
        self.run_i64(row)?
            .first()
            .copied()
            .ok_or_else(|| InferenceError::Output(format!("'{}' is empty", self.output)))
    }
}

impl FeatureScaler for OnnxModel {
    fn transform(&self, row: &FeatureRow) -> Result<FeatureRow, InferenceError> {
        let scaled = self.run_f32(row)?;
        if scaled.len() != self.features.len() {
            return Err(InferenceError::Output(format!(
                "'{}' has {} values for {} features",
                self.output,
                scaled.len(),
                self.features.len()
            )));
        }

        Ok(FeatureRow::new(
            self.features
                .iter()
                .cloned()
                .zip(scaled.into_iter().map(f64::from))
                .collect(),
        ))
    }
}
