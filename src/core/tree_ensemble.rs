//! Tree ensemble classifier evaluated in-process.
//!
//! The JSON layout mirrors what an ExtraTrees or RandomForest export carries:
//! per tree a flat node list where node 0 is the root and every branch points
//! to children stored after it. Leaves hold per-class values.

use crate::core::classifier::{argmax, softmax};
use crate::domain::model::ModelOutputs;
use crate::domain::ports::InferenceBackend;
use crate::utils::error::{Result, SwipError};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMode {
    #[default]
    Leq,
    Lt,
    Gte,
    Gt,
}

impl SplitMode {
    fn goes_true(&self, value: f32, threshold: f32) -> bool {
        match self {
            SplitMode::Leq => value <= threshold,
            SplitMode::Lt => value < threshold,
            SplitMode::Gte => value >= threshold,
            SplitMode::Gt => value > threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregate {
    #[default]
    Average,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostTransform {
    #[default]
    None,
    Softmax,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Branch {
        feature: usize,
        threshold: f32,
        #[serde(default)]
        mode: SplitMode,
        true_child: usize,
        false_child: usize,
    },
    Leaf {
        values: Vec<f32>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn leaf_for(&self, input: &[f32]) -> &[f32] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Branch {
                    feature,
                    threshold,
                    mode,
                    true_child,
                    false_child,
                } => {
                    index = if mode.goes_true(input[*feature], *threshold) {
                        *true_child
                    } else {
                        *false_child
                    };
                }
                Node::Leaf { values } => return values,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub n_features: usize,
    pub n_classes: usize,
    #[serde(default)]
    pub aggregate: Aggregate,
    #[serde(default)]
    pub post_transform: PostTransform,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SwipError::ModelNotFound {
                path: path.display().to_string(),
            });
        }
        let bytes = std::fs::read(path)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let ensemble: TreeEnsemble = serde_json::from_slice(bytes).map_err(|e| SwipError::InvalidModel {
            message: format!("model JSON could not be parsed: {}", e),
        })?;
        ensemble.validate()?;
        Ok(ensemble)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(SwipError::InvalidModel { message });

        if self.n_features == 0 || self.n_classes == 0 {
            return invalid("n_features and n_classes must be positive".to_string());
        }
        if self.trees.is_empty() {
            return invalid("ensemble has no trees".to_string());
        }

        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return invalid(format!("tree {} has no nodes", t));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Branch {
                        feature,
                        threshold,
                        true_child,
                        false_child,
                        ..
                    } => {
                        if *feature >= self.n_features {
                            return invalid(format!(
                                "tree {} node {} splits on feature {} of {}",
                                t, i, feature, self.n_features
                            ));
                        }
                        if threshold.is_nan() {
                            return invalid(format!("tree {} node {} has a NaN threshold", t, i));
                        }
                        for child in [*true_child, *false_child] {
                            if child <= i || child >= tree.nodes.len() {
                                return invalid(format!(
                                    "tree {} node {} points to invalid child {}",
                                    t, i, child
                                ));
                            }
                        }
                    }
                    Node::Leaf { values } => {
                        if values.len() != self.n_classes {
                            return invalid(format!(
                                "tree {} leaf {} has {} values, expected {}",
                                t,
                                i,
                                values.len(),
                                self.n_classes
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }

    pub fn predict_proba(&self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.n_features {
            return Err(SwipError::InferenceError {
                message: format!(
                    "input has {} values, model expects {}",
                    input.len(),
                    self.n_features
                ),
            });
        }

        let mut scores = vec![0.0f32; self.n_classes];
        for tree in &self.trees {
            for (score, value) in scores.iter_mut().zip(tree.leaf_for(input)) {
                *score += value;
            }
        }

        if self.aggregate == Aggregate::Average {
            let n = self.trees.len() as f32;
            scores.iter_mut().for_each(|s| *s /= n);
        }

        Ok(match self.post_transform {
            PostTransform::None => scores,
            PostTransform::Softmax => softmax(&scores),
        })
    }
}

impl InferenceBackend for TreeEnsemble {
    /// Output 0 is the winning class index, output 1 the class scores.
    fn run(&self, input: &[f32]) -> Result<ModelOutputs> {
        let probabilities = self.predict_proba(input)?;
        let label = argmax(&probabilities).unwrap_or(0) as f32;
        Ok(ModelOutputs {
            tensors: vec![vec![label], probabilities],
        })
    }

    fn input_len(&self) -> usize {
        self.n_features
    }
}
