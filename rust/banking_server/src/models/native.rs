//! In-process models evaluated from JSON parameter files.

use anyhow::{ensure, Context, Result};
use ndarray::{Array1, Array2, Axis};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

use super::{ClusterAssigner, FeatureScaler, Scorer};
use crate::error::InferenceError;
use crate::features::FeatureRow;

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Artifact {} is not a valid parameter file", path.display()))
}

fn finite_row(row: &FeatureRow, features: &[String]) -> Result<Array1<f64>, InferenceError> {
    let values = row.select(features)?;
    if let Some((name, _)) = features
        .iter()
        .zip(&values)
        .find(|(_, value)| !value.is_finite())
    {
        return Err(InferenceError::NotFinite(name.clone()));
    }
    Ok(Array1::from(values))
}

/// Logistic regression: `[1 - σ(w·x + b), σ(w·x + b)]`.
#[derive(Debug, Clone)]
pub struct LogisticScorer {
    features: Vec<String>,
    coefficients: Array1<f64>,
    intercept: f64,
}

#[derive(Debug, Deserialize)]
struct LogisticArtifact {
    features: Vec<String>,
    coefficients: Vec<f64>,
    intercept: f64,
}

impl LogisticScorer {
    pub fn new(features: Vec<String>, coefficients: Vec<f64>, intercept: f64) -> Result<Self> {
        ensure!(!features.is_empty(), "scorer has no features");
        ensure!(
            coefficients.len() == features.len(),
            "scorer has {} coefficients for {} features",
            coefficients.len(),
            features.len()
        );
        Ok(Self {
            features,
            coefficients: Array1::from(coefficients),
            intercept,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact: LogisticArtifact = read_json(path)?;
        Self::new(artifact.features, artifact.coefficients, artifact.intercept)
            .with_context(|| format!("Corrupt scorer artifact {}", path.display()))
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }
}

impl Scorer for LogisticScorer {
    fn predict_proba(&self, row: &FeatureRow) -> Result<Vec<f64>, InferenceError> {
        let x = finite_row(row, &self.features)?;
        let z = self.coefficients.dot(&x) + self.intercept;
        let p = 1.0 / (1.0 + (-z).exp());
        Ok(vec![1.0 - p, p])
    }
}

/// Nearest-centroid assignment, ties going to the lowest cluster index.
#[derive(Debug, Clone)]
pub struct CentroidAssigner {
    features: Vec<String>,
    centroids: Array2<f64>,
}

#[derive(Debug, Deserialize)]
struct CentroidArtifact {
    features: Vec<String>,
    centroids: Vec<Vec<f64>>,
}

impl CentroidAssigner {
    pub fn new(features: Vec<String>, centroids: Vec<Vec<f64>>) -> Result<Self> {
        ensure!(!features.is_empty(), "cluster assigner has no features");
        ensure!(!centroids.is_empty(), "cluster assigner has no centroids");

        let n_features = features.len();
        let n_clusters = centroids.len();
        let mut flat = Vec::with_capacity(n_clusters * n_features);
        for (idx, centroid) in centroids.into_iter().enumerate() {
            ensure!(
                centroid.len() == n_features,
                "centroid {} has {} dimensions, expected {}",
                idx,
                centroid.len(),
                n_features
            );
            flat.extend(centroid);
        }

        Ok(Self {
            features,
            centroids: Array2::from_shape_vec((n_clusters, n_features), flat)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact: CentroidArtifact = read_json(path)?;
        Self::new(artifact.features, artifact.centroids)
            .with_context(|| format!("Corrupt cluster artifact {}", path.display()))
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.nrows()
    }
}

impl ClusterAssigner for CentroidAssigner {
    fn assign(&self, row: &FeatureRow) -> Result<i64, InferenceError> {
        let x = finite_row(row, &self.features)?;

        let mut min_distance = f64::INFINITY;
        let mut closest_cluster = 0;
        for (cluster_idx, centroid) in self.centroids.axis_iter(Axis(0)).enumerate() {
            let distance: f64 = x
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            if distance < min_distance {
                min_distance = distance;
                closest_cluster = cluster_idx;
            }
        }

        Ok(closest_cluster as i64)
    }
}

/// Standardisation `(x - mean) / scale`.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    features: Vec<String>,
    mean: Array1<f64>,
    scale: Array1<f64>,
}

#[derive(Debug, Deserialize)]
struct ScalerArtifact {
    features: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(features: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        ensure!(!features.is_empty(), "scaler has no features");
        ensure!(
            mean.len() == features.len() && scale.len() == features.len(),
            "scaler has {} means and {} scales for {} features",
            mean.len(),
            scale.len(),
            features.len()
        );

        // Constant columns were fit with zero variance; leave them unscaled.
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect::<Vec<_>>();

        Ok(Self {
            features,
            mean: Array1::from(mean),
            scale: Array1::from(scale),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let artifact: ScalerArtifact = read_json(path)?;
        Self::new(artifact.features, artifact.mean, artifact.scale)
            .with_context(|| format!("Corrupt scaler artifact {}", path.display()))
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, row: &FeatureRow) -> Result<FeatureRow, InferenceError> {
        let x = finite_row(row, &self.features)?;
        let scaled = (&x - &self.mean) / &self.scale;

        Ok(FeatureRow::new(
            self.features.iter().cloned().zip(scaled.iter().copied()).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_logistic_scorer_probabilities() {
        let scorer = LogisticScorer::new(names(&["income", "debt"]), vec![0.0, 1.0], 0.0).unwrap();

        let row = FeatureRow::from_values(&["income", "debt"], &[50000.0, 0.0]);
        let proba = scorer.predict_proba(&row).unwrap();
        assert_eq!(proba.len(), 2);
        assert!((proba[1] - 0.5).abs() < 1e-12);
        assert!((proba[0] + proba[1] - 1.0).abs() < 1e-12);

        let row = FeatureRow::from_values(&["income", "debt"], &[50000.0, 3.0]);
        let proba = scorer.predict_proba(&row).unwrap();
        assert!(proba[1] > 0.95);
    }

    #[test]
    fn test_logistic_scorer_rejects_null_feature() {
        let scorer = LogisticScorer::new(names(&["income"]), vec![1.0], 0.0).unwrap();
        let row = FeatureRow::from_values(&["income"], &[f64::NAN]);
        assert!(matches!(
            scorer.predict_proba(&row),
            Err(InferenceError::NotFinite(ref name)) if name == "income"
        ));
    }

    #[test]
    fn test_logistic_scorer_dimension_mismatch() {
        assert!(LogisticScorer::new(names(&["a", "b"]), vec![1.0], 0.0).is_err());
        assert!(LogisticScorer::new(Vec::new(), Vec::new(), 0.0).is_err());
    }

    #[test]
    fn test_centroid_assigner_nearest() {
        let assigner = CentroidAssigner::new(
            names(&["x", "y"]),
            vec![vec![0.0, 0.0], vec![10.0, 10.0], vec![-10.0, 5.0]],
        )
        .unwrap();
        assert_eq!(assigner.n_clusters(), 3);

        let row = FeatureRow::from_values(&["x", "y"], &[9.0, 8.0]);
        assert_eq!(assigner.assign(&row).unwrap(), 1);

        let row = FeatureRow::from_values(&["y", "x"], &[4.0, -7.0]);
        assert_eq!(assigner.assign(&row).unwrap(), 2);
    }

    #[test]
    fn test_centroid_assigner_tie_goes_to_lowest_index() {
        let assigner =
            CentroidAssigner::new(names(&["x"]), vec![vec![-1.0], vec![1.0]]).unwrap();
        let row = FeatureRow::from_values(&["x"], &[0.0]);
        assert_eq!(assigner.assign(&row).unwrap(), 0);
    }

    #[test]
    fn test_centroid_assigner_ragged_centroids() {
        assert!(CentroidAssigner::new(names(&["x", "y"]), vec![vec![0.0, 0.0], vec![1.0]]).is_err());
    }

    #[test]
    fn test_standard_scaler_transform() {
        let scaler = StandardScaler::new(
            names(&["a", "b", "c"]),
            vec![10.0, 0.0, 5.0],
            vec![2.0, 1.0, 0.0],
        )
        .unwrap();

        let row = FeatureRow::from_values(&["c", "b", "a"], &[7.0, 3.0, 14.0]);
        let scaled = scaler.transform(&row).unwrap();

        assert_eq!(scaled.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(scaled.get("a"), Some(2.0));
        assert_eq!(scaled.get("b"), Some(3.0));
        assert_eq!(scaled.get("c"), Some(2.0));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"features": ["x", "y"], "centroids": [[0.0, 0.0], [5.0, 5.0]]}}"#
        )
        .unwrap();

        let assigner = CentroidAssigner::load(file.path()).unwrap();
        assert_eq!(assigner.features(), &names(&["x", "y"])[..]);
    }

    #[test]
    fn test_load_corrupt_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(StandardScaler::load(file.path()).is_err());

        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"features": ["x"], "mean": [0.0, 1.0], "scale": [1.0]}}"#
        )
        .unwrap();
        assert!(StandardScaler::load(file.path()).is_err());
    }
}
