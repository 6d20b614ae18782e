pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use crate::config::{LocalStorage, SwipConfig};
pub use crate::core::classifier::Classifier;
pub use crate::core::engine::{RunSummary, SwipEngine};
pub use crate::core::hrv::{compute_features, ArtifactFilter, RrWindow};
pub use crate::core::pipeline::{BatchOptions, BatchPipeline};
pub use crate::core::sidecar::SidecarMetadata;
pub use crate::core::tree_ensemble::TreeEnsemble;
pub use crate::domain::model::{AffectLabel, FeatureSample, HrvFeatures, Prediction};
pub use crate::utils::error::{Result, SwipError};

/// Minimum host OS versions the native SDK wrappers are built for.
pub const PLATFORM_MINIMUMS: [(&str, &str); 4] = [
    ("iOS", "13.0"),
    ("macOS", "10.15"),
    ("watchOS", "6.0"),
    ("tvOS", "13.0"),
];
