use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{InsightsError, Result};
use crate::markets::Market;

const SIGMOID_CLAMP: f64 = 500.0;

#[derive(Debug, Clone, Deserialize)]
pub struct ExportedModel {
    pub metadata: ExportedMetadata,
    pub tree_info: Vec<ExportedTree>,
    #[serde(default)]
    pub feature_names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportedMetadata {
    pub market: String,
    #[serde(default)]
    pub num_trees: Option<usize>,
    #[serde(default = "one")]
    pub num_class: usize,
    #[serde(default)]
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub objective: String,
}

fn one() -> usize {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportedTree {
    #[serde(default)]
    pub tree_index: usize,
    #[serde(default)]
    pub shrinkage: Option<f64>,
    pub tree_structure: RawNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub split_feature: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub default_left: Option<bool>,
    #[serde(default)]
    pub left_child: Option<Box<RawNode>>,
    #[serde(default)]
    pub right_child: Option<Box<RawNode>>,
    #[serde(default)]
    pub leaf_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        missing_goes_left: bool,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub index: usize,
    // Leaf values already carry the learning rate; never applied again.
    pub shrinkage: Option<f64>,
    pub root: TreeNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Objective {
    Binary,
    Multiclass(usize),
    Regression,
}

impl Objective {
    pub fn parse(raw: &str, num_class: usize) -> Result<Objective> {
        let s = raw.trim().to_ascii_lowercase();
        let head = s.split_whitespace().next().unwrap_or("");
        let declared_classes = s
            .split_whitespace()
            .find_map(|part| part.strip_prefix("num_class:"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(num_class);
        match head {
            "binary" | "cross_entropy" | "xentropy" => Ok(Objective::Binary),
            "multiclass" | "softmax" | "multiclassova" | "multiclass_ova" | "ova" | "ovr" => {
                if declared_classes < 2 {
                    Err(InsightsError::InvalidObjective(raw.to_string()))
                } else {
                    Ok(Objective::Multiclass(declared_classes))
                }
            }
            "regression" | "regression_l2" | "regression_l1" | "l2" | "l1" | "huber" | "mse" => {
                Ok(Objective::Regression)
            }
            "" if num_class > 2 => Ok(Objective::Multiclass(num_class)),
            "" => Ok(Objective::Binary),
            _ => Err(InsightsError::InvalidObjective(raw.to_string())),
        }
    }

    /// Number of raw score accumulators.
    pub fn accumulators(self) -> usize {
        match self {
            Objective::Multiclass(k) => k,
            Objective::Binary | Objective::Regression => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetadata {
    pub market: Market,
    pub num_trees: usize,
    pub num_class: usize,
    pub feature_names: Vec<String>,
    pub objective: Objective,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeModel {
    pub metadata: ModelMetadata,
    pub trees: Vec<Tree>,
}

/// Positional model input. `None` marks a missing feature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector(Vec<Option<f64>>);

impl FeatureVector {
    /// NaN inputs are folded into the missing marker.
    pub fn new(values: Vec<Option<f64>>) -> Self {
        Self(
            values
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.0
    }

    pub fn get(&self, idx: usize) -> Option<f64> {
        self.0.get(idx).copied().flatten()
    }

    pub fn missing_count(&self) -> usize {
        self.0.iter().filter(|v| v.is_none()).count()
    }
}

impl TreeModel {
    /// `origin` only labels errors.
    pub fn from_json_str(raw: &str, origin: &Path) -> Result<TreeModel> {
        let exported: ExportedModel =
            serde_json::from_str(raw.trim()).map_err(|source| InsightsError::Json {
                path: origin.to_path_buf(),
                source,
            })?;
        TreeModel::from_exported(exported)
    }

    pub fn from_exported(exported: ExportedModel) -> Result<TreeModel> {
        let market = Market::from_key(&exported.metadata.market)?;
        let feature_names = if exported.metadata.feature_names.is_empty() {
            exported.feature_names
        } else {
            exported.metadata.feature_names
        };
        let objective = Objective::parse(&exported.metadata.objective, exported.metadata.num_class)?;

        let mut trees = Vec::with_capacity(exported.tree_info.len());
        for (pos, t) in exported.tree_info.iter().enumerate() {
            let mut path = format!("tree {pos} root");
            let root = resolve_node(&t.tree_structure, feature_names.len(), &market, &mut path)?;
            trees.push(Tree {
                index: t.tree_index,
                shrinkage: t.shrinkage,
                root,
            });
        }

        Ok(TreeModel {
            metadata: ModelMetadata {
                market,
                num_trees: trees.len(),
                num_class: exported.metadata.num_class,
                feature_names,
                objective,
            },
            trees,
        })
    }

    pub fn market(&self) -> Market {
        self.metadata.market
    }

    pub fn feature_count(&self) -> usize {
        self.metadata.feature_names.len()
    }

    /// Input array in declared feature order; names absent from `values`
    /// become missing.
    pub fn align(&self, values: &HashMap<String, f64>) -> FeatureVector {
        FeatureVector::new(
            self.metadata
                .feature_names
                .iter()
                .map(|name| values.get(name).copied())
                .collect(),
        )
    }

    /// Declared feature names that `values` does not provide.
    pub fn missing_features<'a>(&'a self, values: &HashMap<String, f64>) -> Vec<&'a str> {
        self.metadata
            .feature_names
            .iter()
            .filter(|name| !values.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn raw_scores(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        if features.len() != self.feature_count() {
            return Err(InsightsError::FeatureCountMismatch {
                expected: self.feature_count(),
                actual: features.len(),
            });
        }
        let k = self.metadata.objective.accumulators();
        let mut scores = vec![0.0_f64; k];
        for (i, tree) in self.trees.iter().enumerate() {
            scores[i % k] += traverse(&tree.root, features.values());
        }
        Ok(scores)
    }

    /// Binary: `[p(positive)]`. Multiclass: one probability per class in
    /// class order. Regression: the raw score.
    pub fn predict(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let scores = self.raw_scores(features)?;
        Ok(match self.metadata.objective {
            Objective::Binary => vec![sigmoid(scores[0])],
            Objective::Multiclass(_) => softmax(&scores),
            Objective::Regression => scores,
        })
    }
}

fn resolve_node(
    raw: &RawNode,
    feature_count: usize,
    market: &Market,
    path: &mut String,
) -> Result<TreeNode> {
    if let Some(v) = raw.leaf_value {
        return Ok(TreeNode::Leaf(v));
    }
    let malformed = |path: &str| InsightsError::MalformedNode {
        market: market.key(),
        path: path.to_string(),
    };
    let (Some(feature), Some(threshold), Some(default_left), Some(left), Some(right)) = (
        raw.split_feature,
        raw.threshold,
        raw.default_left,
        raw.left_child.as_deref(),
        raw.right_child.as_deref(),
    ) else {
        return Err(malformed(path));
    };
    if feature >= feature_count || threshold.is_nan() {
        return Err(malformed(path));
    }

    let base_len = path.len();
    path.push_str(".left");
    let left = resolve_node(left, feature_count, market, path)?;
    path.truncate(base_len);
    path.push_str(".right");
    let right = resolve_node(right, feature_count, market, path)?;
    path.truncate(base_len);

    Ok(TreeNode::Split {
        feature,
        threshold,
        missing_goes_left: default_left,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn traverse(root: &TreeNode, features: &[Option<f64>]) -> f64 {
    let mut node = root;
    loop {
        match node {
            TreeNode::Leaf(v) => return *v,
            TreeNode::Split {
                feature,
                threshold,
                missing_goes_left,
                left,
                right,
            } => {
                let go_left = match features.get(*feature).copied().flatten() {
                    Some(v) if !v.is_nan() => v <= *threshold,
                    _ => *missing_goes_left,
                };
                node = if go_left { left } else { right };
            }
        }
    }
}

pub fn sigmoid(score: f64) -> f64 {
    let s = if score.is_nan() {
        0.0
    } else {
        score.clamp(-SIGMOID_CLAMP, SIGMOID_CLAMP)
    };
    1.0 / (1.0 + (-s).exp())
}

pub fn softmax(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }
    let max = scores
        .iter()
        .copied()
        .filter(|s| s.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        let u = 1.0 / scores.len() as f64;
        return vec![u; scores.len()];
    }
    let exps: Vec<f64> = scores
        .iter()
        .map(|s| if s.is_finite() { (s - max).exp() } else { 0.0 })
        .collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
