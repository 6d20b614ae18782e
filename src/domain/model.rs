use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::utils::error::SwipError;

pub const FEATURE_SDNN: &str = "SDNN";
pub const FEATURE_RMSSD: &str = "RMSSD";
pub const FEATURE_PNN50: &str = "pNN50";
pub const FEATURE_MEAN_RR: &str = "Mean_RR";
pub const FEATURE_HR_MEAN: &str = "HR_mean";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AffectLabel {
    Calm,
    Stressed,
    Amused,
}

impl AffectLabel {
    /// Class order the wrist models are trained with.
    pub const ORDER: [AffectLabel; 3] = [AffectLabel::Calm, AffectLabel::Stressed, AffectLabel::Amused];

    pub fn as_str(&self) -> &'static str {
        match self {
            AffectLabel::Calm => "Calm",
            AffectLabel::Stressed => "Stressed",
            AffectLabel::Amused => "Amused",
        }
    }
}

impl fmt::Display for AffectLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AffectLabel {
    type Err = SwipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "calm" | "baseline" => Ok(AffectLabel::Calm),
            "stressed" | "stress" => Ok(AffectLabel::Stressed),
            "amused" | "amusement" => Ok(AffectLabel::Amused),
            _ => Err(SwipError::InvalidModel {
                message: format!("Unknown label '{}'", s),
            }),
        }
    }
}

/// Named feature values for one observation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSample {
    pub values: BTreeMap<String, f64>,
}

impl FeatureSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrvFeatures {
    pub sdnn: f64,
    pub rmssd: f64,
    pub pnn50: f64,
    pub mean_rr: f64,
    pub hr_mean: f64,
}

impl From<&HrvFeatures> for FeatureSample {
    fn from(features: &HrvFeatures) -> Self {
        FeatureSample::new()
            .with(FEATURE_SDNN, features.sdnn)
            .with(FEATURE_RMSSD, features.rmssd)
            .with(FEATURE_PNN50, features.pnn50)
            .with(FEATURE_MEAN_RR, features.mean_rr)
            .with(FEATURE_HR_MEAN, features.hr_mean)
    }
}

/// Output tensors of one model run, flattened, in session output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelOutputs {
    pub tensors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: AffectLabel,
    pub class_index: usize,
    pub probabilities: Vec<(AffectLabel, f32)>,
    pub model_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Prediction {
    pub fn probability(&self, label: AffectLabel) -> Option<f32> {
        self.probabilities
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, p)| *p)
    }

    pub fn confidence(&self) -> f32 {
        self.probabilities
            .get(self.class_index)
            .map(|(_, p)| *p)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    pub id: String,
    pub sample: FeatureSample,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub predictions: Vec<(String, Prediction)>,
    pub failures: Vec<BatchFailure>,
}
