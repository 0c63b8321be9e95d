//! Serving-side scoring of an externally trained logistic model.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::features::{FeatureSchema, FeatureVector};
use crate::persist::app_cache_dir;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub version: u32,
    #[serde(default)]
    pub generated_at: Option<String>,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub feature_means: Vec<f64>,
    #[serde(default)]
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub train_log_loss: f64,
    #[serde(default)]
    pub val_log_loss: f64,
    #[serde(default)]
    pub train_samples: usize,
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    artifact: LinearModelArtifact,
    schema: FeatureSchema,
}

impl LinearModel {
    pub fn from_artifact(artifact: LinearModelArtifact) -> Result<Self> {
        let n = artifact.feature_names.len();
        if n == 0 {
            return Err(anyhow!("model has no features"));
        }
        if artifact.coeffs.len() != n {
            return Err(anyhow!(
                "model has {} coefficients for {} features",
                artifact.coeffs.len(),
                n
            ));
        }
        for (what, values) in [
            ("means", &artifact.feature_means),
            ("stds", &artifact.feature_stds),
        ] {
            if !values.is_empty() && values.len() != n {
                return Err(anyhow!("model {what} length {} != {n}", values.len()));
            }
        }
        let schema = FeatureSchema::new(artifact.feature_names.clone());
        Ok(Self { artifact, schema })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn artifact(&self) -> &LinearModelArtifact {
        &self.artifact
    }

    /// Fails unless the model was trained on exactly `schema`'s columns.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<()> {
        self.schema
            .verify(&schema.fingerprint)
            .with_context(|| format!("model features {:?}", self.artifact.feature_names))
    }

    pub fn logit(&self, vector: &FeatureVector) -> Result<f64> {
        self.schema.verify(&vector.fingerprint)?;
        if vector.values.len() != self.artifact.coeffs.len() {
            return Err(anyhow!(
                "feature vector has {} values, model expects {}",
                vector.values.len(),
                self.artifact.coeffs.len()
            ));
        }
        let mut sum = self.artifact.intercept;
        for (idx, c) in self.artifact.coeffs.iter().enumerate() {
            sum += c * self.standardized(vector.values[idx], idx);
        }
        Ok(sum)
    }

    /// Probability that the vector's own side wins.
    pub fn probability(&self, vector: &FeatureVector) -> Result<f64> {
        let z = self.logit(vector)?;
        Ok(1.0 / (1.0 + (-z).exp()))
    }

    fn standardized(&self, raw: f64, idx: usize) -> f64 {
        let mean = self.artifact.feature_means.get(idx).copied().unwrap_or(0.0);
        let std = self
            .artifact
            .feature_stds
            .get(idx)
            .copied()
            .unwrap_or(1.0)
            .max(1e-6);
        (raw - mean) / std
    }
}

pub fn load_model(path: &Path) -> Result<LinearModel> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read model artifact {}", path.display()))?;
    let artifact = serde_json::from_str::<LinearModelArtifact>(&raw)
        .with_context(|| format!("parse model artifact {}", path.display()))?;
    LinearModel::from_artifact(artifact)
}

/// `ATP_MODEL_PATH`, falling back to the cache directory.
pub fn resolve_model_path() -> Option<PathBuf> {
    if let Ok(raw) = env::var("ATP_MODEL_PATH")
        && !raw.trim().is_empty()
    {
        return Some(PathBuf::from(raw.trim()));
    }
    app_cache_dir()
        .map(|dir| dir.join("linear_model.json"))
        .filter(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSet;

    fn artifact(names: Vec<String>) -> LinearModelArtifact {
        let n = names.len();
        LinearModelArtifact {
            version: 1,
            generated_at: None,
            feature_names: names,
            feature_means: vec![0.0; n],
            feature_stds: vec![1.0; n],
            coeffs: vec![0.0; n],
            intercept: 0.0,
            train_log_loss: 0.0,
            val_log_loss: 0.0,
            train_samples: 0,
        }
    }

    #[test]
    fn zero_model_is_a_coin_flip() {
        let schema = FeatureSet::Standard.schema();
        let model = LinearModel::from_artifact(artifact(schema.names.clone())).unwrap();
        let v = FeatureVector {
            fingerprint: schema.fingerprint.clone(),
            values: vec![3.0; schema.len()],
        };
        assert!((model.probability(&v).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn vectors_from_another_layout_are_rejected() {
        let schema = FeatureSet::Standard.schema();
        let model = LinearModel::from_artifact(artifact(schema.names.clone())).unwrap();
        let extended = FeatureSet::Extended.schema();
        let v = FeatureVector {
            fingerprint: extended.fingerprint.clone(),
            values: vec![0.0; extended.len()],
        };
        assert!(model.probability(&v).is_err());
        assert!(model.check_schema(&extended).is_err());
    }

    #[test]
    fn coefficient_count_must_match_names() {
        let mut a = artifact(vec!["diff_rank".to_string()]);
        a.coeffs.push(1.0);
        assert!(LinearModel::from_artifact(a).is_err());
    }
}
