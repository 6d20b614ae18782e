pub mod classifier;
pub mod engine;
pub mod hrv;
pub mod pipeline;
pub mod sidecar;
pub mod tree_ensemble;

pub use crate::domain::model::{AffectLabel, FeatureSample, HrvFeatures, Prediction};
pub use crate::domain::ports::{InferenceBackend, Pipeline, Storage};
pub use crate::utils::error::Result;
