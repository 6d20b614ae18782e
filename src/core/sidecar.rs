//! Sidecar metadata shipped next to every exported model.
//!
//! The sidecar fixes the feature order the model expects, the class labels,
//! and optionally a SHA-256 of the model file and a z-score scaler.

use crate::domain::model::{AffectLabel, FeatureSample};
use crate::utils::error::{Result, SwipError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarMetadata {
    pub schema: SchemaInfo,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub model: Option<ModelInfo>,
    #[serde(default)]
    pub preprocessing: Option<Preprocessing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaInfo {
    #[serde(default)]
    pub input_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: Option<String>,
    pub version: Option<String>,
    pub sha256: Option<String>,
}

/// Standard scaling applied as `(x - mean) / scale`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessing {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl SidecarMetadata {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SwipError::SidecarNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let metadata = Self::from_json_str(&content)?;
        tracing::debug!(
            "Loaded sidecar {} with {} inputs",
            path.display(),
            metadata.input_names().len()
        );
        Ok(metadata)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let metadata: SidecarMetadata = serde_json::from_str(content)?;
        metadata.check()?;
        Ok(metadata)
    }

    fn check(&self) -> Result<()> {
        let names = &self.schema.input_names;
        if names.is_empty() {
            return Err(SwipError::InvalidModel {
                message: "sidecar schema.input_names is missing or empty".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(SwipError::InvalidModel {
                    message: format!("duplicate input name '{}' in sidecar", name),
                });
            }
        }

        let labels = self.labels()?;
        if labels.is_empty() {
            return Err(SwipError::InvalidModel {
                message: "sidecar labels list is empty".to_string(),
            });
        }

        if let Some(pre) = &self.preprocessing {
            if pre.mean.len() != names.len() || pre.scale.len() != names.len() {
                return Err(SwipError::InvalidModel {
                    message: format!(
                        "preprocessing expects {} values per vector, got mean={} scale={}",
                        names.len(),
                        pre.mean.len(),
                        pre.scale.len()
                    ),
                });
            }
            if pre.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                return Err(SwipError::InvalidModel {
                    message: "preprocessing scale values must be finite and non-zero".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn input_names(&self) -> &[String] {
        &self.schema.input_names
    }

    pub fn labels(&self) -> Result<Vec<AffectLabel>> {
        match &self.labels {
            Some(labels) => labels.iter().map(|l| l.parse()).collect(),
            None => Ok(AffectLabel::ORDER.to_vec()),
        }
    }

    pub fn expected_sha256(&self) -> Option<&str> {
        self.model.as_ref().and_then(|m| m.sha256.as_deref())
    }

    /// `name@version` when the sidecar names the model.
    pub fn model_id(&self) -> Option<String> {
        let model = self.model.as_ref()?;
        let name = model.name.as_deref()?;
        Some(match &model.version {
            Some(version) => format!("{}@{}", name, version),
            None => name.to_string(),
        })
    }

    /// Lays the sample out in model input order.
    pub fn build_input(&self, sample: &FeatureSample) -> Result<Vec<f32>> {
        let names = self.input_names();
        let mut input = Vec::with_capacity(names.len());

        for (i, name) in names.iter().enumerate() {
            let value = sample.get(name).ok_or_else(|| SwipError::MissingFeature {
                name: name.clone(),
                expected: names.to_vec(),
            })?;

            if !value.is_finite() {
                return Err(SwipError::InvalidFeature {
                    name: name.clone(),
                    reason: format!("{} is not a finite number", value),
                });
            }

            let value = match &self.preprocessing {
                Some(pre) => (value - pre.mean[i]) / pre.scale[i],
                None => value,
            };
            input.push(value as f32);
        }

        let extra = sample
            .values
            .keys()
            .filter(|k| !names.iter().any(|n| n == *k))
            .count();
        if extra > 0 {
            tracing::debug!("Ignoring {} features unknown to the model", extra);
        }

        Ok(input)
    }
}
