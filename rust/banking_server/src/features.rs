//! Single-row feature tables handed to the loaded models.

use ndarray::Array2;
use serde_json::{Map, Value};

use crate::error::InferenceError;

/// One observation as ordered `(column, value)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    columns: Vec<(String, f64)>,
}

impl FeatureRow {
    pub fn new(columns: Vec<(String, f64)>) -> Self {
        Self { columns }
    }

    /// Build a row from an open JSON record. Numbers pass through, booleans
    /// become 1/0 and `null` becomes NaN. Anything else cannot be fed to a
    /// numeric model.
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, InferenceError> {
        let mut columns = Vec::with_capacity(record.len());
        for (name, value) in record {
            let number = match value {
                Value::Number(n) => n
                    .as_f64()
                    .ok_or_else(|| InferenceError::NotNumeric(name.clone()))?,
                Value::Bool(b) => {
                    if *b {
                        1.0
                    } else {
                        0.0
                    }
                }
                Value::Null => f64::NAN,
                _ => return Err(InferenceError::NotNumeric(name.clone())),
            };
            columns.push((name.clone(), number));
        }
        Ok(Self { columns })
    }

    pub fn from_values(names: &[&str], values: &[f64]) -> Self {
        Self {
            columns: names
                .iter()
                .zip(values)
                .map(|(name, value)| (name.to_string(), *value))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| *value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Reorder the row into a model's trained feature order. The row must
    /// carry exactly that feature set.
    pub fn select(&self, features: &[String]) -> Result<Vec<f64>, InferenceError> {
        if let Some(extra) = self.names().find(|name| !features.iter().any(|f| f == *name)) {
            return Err(InferenceError::UnexpectedFeature(extra.to_string()));
        }

        features
            .iter()
            .map(|feature| {
                self.get(feature)
                    .ok_or_else(|| InferenceError::MissingFeature(feature.clone()))
            })
            .collect()
    }

    /// Same as `select`, shaped `(1, n)` for batch-oriented backends.
    pub fn to_array(&self, features: &[String]) -> Result<Array2<f64>, InferenceError> {
        let values = self.select(features)?;
        Ok(Array2::from_shape_vec((1, features.len()), values)?)
    }
}
