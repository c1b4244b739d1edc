use crate::model::error::ModelError;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::Deserialize;
use std::path::Path;

/// Column of the probability matrix holding the churn class
pub const POSITIVE_CLASS: usize = 1;

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    fn validate(&self, index: usize, num_features: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::InvalidArtifact(format!(
                "tree {} has no nodes",
                index
            )));
        }

        for (node_id, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= num_features {
                    return Err(ModelError::InvalidArtifact(format!(
                        "tree {} node {} splits on feature {} (model has {})",
                        index, node_id, feature, num_features
                    )));
                }

                // children must point forward, which also rules out cycles
                for child in [*left, *right] {
                    if child <= node_id || child >= self.nodes.len() {
                        return Err(ModelError::InvalidArtifact(format!(
                            "tree {} node {} has invalid child {}",
                            index, node_id, child
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn leaf_value(&self, row: &ArrayView1<f64>) -> f64 {
        let mut node_id = 0;
        loop {
            match &self.nodes[node_id] {
                TreeNode::Leaf { leaf } => return *leaf,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_id = if row[*feature] < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    pub num_features: usize,
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

impl TreeEnsemble {
    fn margin(&self, row: &ArrayView1<f64>) -> f64 {
        self.base_score
            + self
                .trees
                .iter()
                .map(|tree| tree.leaf_value(row))
                .sum::<f64>()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl LogisticModel {
    fn margin(&self, row: &ArrayView1<f64>) -> f64 {
        self.intercept
            + row
                .iter()
                .zip(&self.coefficients)
                .map(|(x, w)| x * w)
                .sum::<f64>()
    }
}

/// Pre-trained binary classifier loaded from a JSON export.
///
/// Immutable after load; `predict_proba` only borrows it, so one instance can be
/// shared across every request handler.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum ScoringArtifact {
    GradientBoostedTrees(TreeEnsemble),
    LogisticRegression(LogisticModel),
}

impl ScoringArtifact {
    pub fn from_json_str(raw: &str) -> Result<Self, ModelError> {
        let artifact: ScoringArtifact = serde_json::from_str(raw)
            .map_err(|e| ModelError::InvalidArtifact(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn from_path(path: &Path) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_json_str(&raw)
    }

    fn validate(&self) -> Result<(), ModelError> {
        match self {
            ScoringArtifact::GradientBoostedTrees(ensemble) => {
                if ensemble.num_features == 0 {
                    return Err(ModelError::InvalidArtifact(
                        "num_features must be positive".to_string(),
                    ));
                }
                for (index, tree) in ensemble.trees.iter().enumerate() {
                    tree.validate(index, ensemble.num_features)?;
                }
                Ok(())
            }
            ScoringArtifact::LogisticRegression(model) => {
                if model.coefficients.is_empty() {
                    return Err(ModelError::InvalidArtifact(
                        "logistic model has no coefficients".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Number of input columns the artifact consumes
    pub fn num_features(&self) -> usize {
        match self {
            ScoringArtifact::GradientBoostedTrees(ensemble) => ensemble.num_features,
            ScoringArtifact::LogisticRegression(model) => model.coefficients.len(),
        }
    }

    pub fn model_type(&self) -> &'static str {
        match self {
            ScoringArtifact::GradientBoostedTrees(_) => "gradient_boosted_trees",
            ScoringArtifact::LogisticRegression(_) => "logistic_regression",
        }
    }

    /// Score a `(rows, features)` matrix
    ///
    /// # Arguments
    ///
    /// * `input` - Rows laid out in manifest order
    ///
    /// # Returns
    ///
    /// * `Result<Array2<f64>>` - `(rows, 2)` matrix of class probabilities; column
    ///   [`POSITIVE_CLASS`] is the churn probability
    pub fn predict_proba(&self, input: &ArrayView2<f64>) -> Result<Array2<f64>, ModelError> {
        let expected = self.num_features();
        if input.ncols() != expected {
            return Err(ModelError::ShapeMismatch {
                expected,
                found: input.ncols(),
            });
        }

        let mut proba = Array2::<f64>::zeros((input.nrows(), 2));
        for (row_id, (row, mut out)) in input
            .axis_iter(Axis(0))
            .zip(proba.axis_iter_mut(Axis(0)))
            .enumerate()
        {
            let margin = match self {
                ScoringArtifact::GradientBoostedTrees(ensemble) => ensemble.margin(&row),
                ScoringArtifact::LogisticRegression(model) => model.margin(&row),
            };

            let p = sigmoid(margin);
            if !p.is_finite() {
                return Err(ModelError::NonFiniteOutput(row_id));
            }

            out[0] = 1.0 - p;
            out[POSITIVE_CLASS] = p;
        }

        Ok(proba)
    }
}
