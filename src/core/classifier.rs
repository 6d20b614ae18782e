use crate::core::sidecar::SidecarMetadata;
use crate::core::tree_ensemble::TreeEnsemble;
use crate::domain::model::{AffectLabel, FeatureSample, HrvFeatures, Prediction};
use crate::domain::ports::InferenceBackend;
use crate::utils::error::{Result, SwipError};
use crate::utils::integrity;
use chrono::Utc;
use std::path::Path;

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|x| (x - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.iter().copied().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

pub struct Classifier {
    backend: Box<dyn InferenceBackend>,
    metadata: SidecarMetadata,
    labels: Vec<AffectLabel>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("model", &self.metadata.model_id())
            .field("inputs", &self.metadata.input_names())
            .field("labels", &self.labels)
            .finish()
    }
}

impl Classifier {
    pub fn new(backend: Box<dyn InferenceBackend>, metadata: SidecarMetadata) -> Result<Self> {
        let labels = metadata.labels()?;
        if backend.input_len() != metadata.input_names().len() {
            return Err(SwipError::InvalidModel {
                message: format!(
                    "model takes {} inputs but sidecar lists {}",
                    backend.input_len(),
                    metadata.input_names().len()
                ),
            });
        }
        Ok(Self {
            backend,
            metadata,
            labels,
        })
    }

    /// Loads a tree ensemble export and its sidecar. When `verify` is set and
    /// the sidecar pins a SHA-256, the model bytes must match it.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(model_path: P, sidecar_path: Q, verify: bool) -> Result<Self> {
        let model_path = model_path.as_ref();
        let metadata = SidecarMetadata::from_file(sidecar_path)?;

        if !model_path.exists() {
            return Err(SwipError::ModelNotFound {
                path: model_path.display().to_string(),
            });
        }
        let bytes = std::fs::read(model_path)?;

        match (verify, metadata.expected_sha256()) {
            (true, Some(expected)) => {
                integrity::verify_sha256(&bytes, expected)?;
                tracing::debug!("Model checksum verified for {}", model_path.display());
            }
            (true, None) => {
                tracing::warn!("Sidecar carries no sha256; skipping integrity check for {}", model_path.display());
            }
            (false, _) => {}
        }

        let ensemble = TreeEnsemble::from_slice(&bytes)?;
        let label_count = metadata.labels()?.len();
        if ensemble.n_classes != label_count {
            return Err(SwipError::InvalidModel {
                message: format!(
                    "model scores {} classes but sidecar lists {} labels",
                    ensemble.n_classes, label_count
                ),
            });
        }

        tracing::info!(
            "Loaded model {} ({} trees, {} inputs)",
            metadata.model_id().unwrap_or_else(|| model_path.display().to_string()),
            ensemble.trees.len(),
            ensemble.n_features
        );

        Self::new(Box::new(ensemble), metadata)
    }

    pub fn metadata(&self) -> &SidecarMetadata {
        &self.metadata
    }

    pub fn labels(&self) -> &[AffectLabel] {
        &self.labels
    }

    pub fn predict(&self, sample: &FeatureSample) -> Result<Prediction> {
        let input = self.metadata.build_input(sample)?;
        let outputs = self.backend.run(&input)?;

        // Probability output when the model provides one, otherwise logits.
        let probabilities = match outputs.tensors.as_slice() {
            [_, probs, ..] => probs.clone(),
            [logits] => softmax(logits),
            [] => {
                return Err(SwipError::InferenceError {
                    message: "model produced no outputs".to_string(),
                })
            }
        };

        if probabilities.len() != self.labels.len() {
            return Err(SwipError::InferenceError {
                message: format!(
                    "model produced {} scores for {} labels",
                    probabilities.len(),
                    self.labels.len()
                ),
            });
        }

        if let Some(bad) = probabilities.iter().position(|p| !p.is_finite()) {
            return Err(SwipError::InferenceError {
                message: format!("model produced a non-finite score for {}", self.labels[bad]),
            });
        }

        let class_index = argmax(&probabilities).ok_or_else(|| SwipError::InferenceError {
            message: "empty probability vector".to_string(),
        })?;
        let label = self.labels[class_index];

        tracing::debug!("Predicted {} with p={:.4}", label, probabilities[class_index]);

        Ok(Prediction {
            label,
            class_index,
            probabilities: self.labels.iter().copied().zip(probabilities).collect(),
            model_id: self.metadata.model_id(),
            timestamp: Utc::now(),
        })
    }

    pub fn predict_hrv(&self, features: &HrvFeatures) -> Result<Prediction> {
        self.predict(&FeatureSample::from(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::ModelOutputs;

    struct FixedBackend {
        tensors: Vec<Vec<f32>>,
    }

    impl InferenceBackend for FixedBackend {
        fn run(&self, _input: &[f32]) -> Result<ModelOutputs> {
            Ok(ModelOutputs {
                tensors: self.tensors.clone(),
            })
        }

        fn input_len(&self) -> usize {
            2
        }
    }

    fn metadata() -> SidecarMetadata {
        SidecarMetadata::from_json_str(r#"{"schema": {"input_names": ["SDNN", "RMSSD"]}}"#).unwrap()
    }

    fn sample() -> FeatureSample {
        FeatureSample::new().with("SDNN", 40.0).with("RMSSD", 20.0)
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        let total: f32 = p.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);

        let big = softmax(&[1000.0, 1000.0]);
        assert!((big[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_argmax_first_wins() {
        assert_eq!(argmax(&[0.2, 0.4, 0.4]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_probability_output_used_verbatim() {
        let backend = FixedBackend {
            tensors: vec![vec![2.0], vec![0.1, 0.2, 0.7]],
        };
        let classifier = Classifier::new(Box::new(backend), metadata()).unwrap();
        let prediction = classifier.predict(&sample()).unwrap();
        assert_eq!(prediction.label, AffectLabel::Amused);
        assert_eq!(prediction.class_index, 2);
        assert_eq!(prediction.probability(AffectLabel::Stressed), Some(0.2));
        assert!((prediction.confidence() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_single_output_falls_back_to_softmax() {
        let backend = FixedBackend {
            tensors: vec![vec![0.0, 3.0, 0.0]],
        };
        let classifier = Classifier::new(Box::new(backend), metadata()).unwrap();
        let prediction = classifier.predict(&sample()).unwrap();
        assert_eq!(prediction.label, AffectLabel::Stressed);
        let total: f32 = prediction.probabilities.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_score_count_must_match_labels() {
        let backend = FixedBackend {
            tensors: vec![vec![0.0], vec![0.5, 0.5]],
        };
        let classifier = Classifier::new(Box::new(backend), metadata()).unwrap();
        assert!(matches!(
            classifier.predict(&sample()),
            Err(SwipError::InferenceError { .. })
        ));
    }

    #[test]
    fn test_nan_score_is_an_error() {
        let backend = FixedBackend {
            tensors: vec![vec![0.0], vec![0.9, f32::NAN, 0.1]],
        };
        let classifier = Classifier::new(Box::new(backend), metadata()).unwrap();
        match classifier.predict(&sample()) {
            Err(SwipError::InferenceError { message }) => assert!(message.contains("Stressed")),
            other => panic!("expected inference error, got {:?}", other),
        }
    }

    #[test]
    fn test_infinite_logit_is_an_error() {
        let backend = FixedBackend {
            tensors: vec![vec![f32::INFINITY, 1.0, 0.0]],
        };
        let classifier = Classifier::new(Box::new(backend), metadata()).unwrap();
        assert!(matches!(
            classifier.predict(&sample()),
            Err(SwipError::InferenceError { .. })
        ));
    }

    #[test]
    fn test_input_count_must_match_sidecar() {
        let backend = FixedBackend { tensors: vec![] };
        let meta = SidecarMetadata::from_json_str(r#"{"schema": {"input_names": ["SDNN"]}}"#).unwrap();
        assert!(Classifier::new(Box::new(backend), meta).is_err());
    }

    #[test]
    fn test_no_outputs() {
        let backend = FixedBackend { tensors: vec![] };
        let classifier = Classifier::new(Box::new(backend), metadata()).unwrap();
        assert!(classifier.predict(&sample()).is_err());
    }
}
