//! Pre-trained gradient-boosted tree model and feature alignment
//!
//! The artifact is a JSON document exported from the training side:
//!
//! ```json
//! {
//!   "feature_names": ["tenure", "contract_Month-to-month", "..."],
//!   "base_score": -1.2,
//!   "trees": [
//!     { "nodes": [
//!         { "feature": 0, "threshold": 12.0, "left": 1, "right": 2 },
//!         { "leaf": 0.4 },
//!         { "leaf": -0.3 }
//!     ] }
//!   ]
//! }
//! ```
//!
//! `base_score` and leaf values are log-odds; the probability is the logistic
//! of their sum.

use crate::scoring::{ChurnEstimator, Contract, CustomerProfile, InternetService, PaymentMethod};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("model declares no features")]
    NoFeatures,

    #[error("model declares no trees")]
    NoTrees,

    #[error("tree {tree} has no nodes")]
    EmptyTree { tree: usize },

    #[error("tree {tree} node {node} uses feature {feature} but the model has {n_features} features")]
    FeatureOutOfRange {
        tree: usize,
        node: usize,
        feature: usize,
        n_features: usize,
    },

    #[error("tree {tree} node {node} has child {child} which does not point forward within {len} nodes")]
    InvalidChild {
        tree: usize,
        node: usize,
        child: usize,
        len: usize,
    },

    #[error("feature vector has {got} values but the model expects {expected}")]
    DimensionMismatch { got: usize, expected: usize },
}

fn default_missing_left() -> bool {
    true
}

/// A tree node: either a threshold split or a terminal leaf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Direction taken when the feature value is NaN
        #[serde(default = "default_missing_left")]
        missing_left: bool,
    },
    Leaf {
        leaf: f64,
    },
}

/// Flat node list; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Walk from the root to a leaf. Assumes the tree passed validation.
    fn leaf_value(&self, x: ArrayView1<f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { leaf } => return *leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let value = x[*feature];
                    let go_left = if value.is_nan() {
                        *missing_left
                    } else {
                        value < *threshold
                    };
                    idx = if go_left { *left } else { *right };
                }
            }
        }
    }
}

/// Artifact layout before validation
#[derive(Debug, Deserialize)]
struct RawModel {
    feature_names: Vec<String>,
    #[serde(default)]
    base_score: f64,
    trees: Vec<Tree>,
}

/// Gradient-boosted ensemble of regression trees with a logistic link
///
/// Only constructible through validation, so every split references a known
/// feature and every child index points forward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModel")]
pub struct GradientBoostedModel {
    feature_names: Vec<String>,
    base_score: f64,
    trees: Vec<Tree>,
}

impl TryFrom<RawModel> for GradientBoostedModel {
    type Error = ModelError;

    fn try_from(raw: RawModel) -> Result<Self, ModelError> {
        Self::new(raw.feature_names, raw.base_score, raw.trees)
    }
}

impl GradientBoostedModel {
    pub fn new(feature_names: Vec<String>, base_score: f64, trees: Vec<Tree>) -> Result<Self, ModelError> {
        let model = Self {
            feature_names,
            base_score,
            trees,
        };
        model.validate()?;
        Ok(model)
    }

    /// Read and validate a model artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&raw)?;
        debug!(
            path = %path.display(),
            features = model.feature_names.len(),
            trees = model.trees.len(),
            "loaded gradient-boosted model"
        );
        Ok(model)
    }

    pub fn from_json(raw: &str) -> Result<Self, ModelError> {
        let raw: RawModel = serde_json::from_str(raw)?;
        Self::try_from(raw)
    }

    /// Check feature references and that every child index points forward,
    /// which guarantees traversal terminates
    fn validate(&self) -> Result<(), ModelError> {
        let n_features = self.feature_names.len();
        if n_features == 0 {
            return Err(ModelError::NoFeatures);
        }
        if self.trees.is_empty() {
            return Err(ModelError::NoTrees);
        }

        for (t, tree) in self.trees.iter().enumerate() {
            let len = tree.nodes.len();
            if len == 0 {
                return Err(ModelError::EmptyTree { tree: t });
            }
            for (n, node) in tree.nodes.iter().enumerate() {
                let Node::Split {
                    feature, left, right, ..
                } = node
                else {
                    continue;
                };
                if *feature >= n_features {
                    return Err(ModelError::FeatureOutOfRange {
                        tree: t,
                        node: n,
                        feature: *feature,
                        n_features,
                    });
                }
                for &child in [left, right] {
                    if child <= n || child >= len {
                        return Err(ModelError::InvalidChild {
                            tree: t,
                            node: n,
                            child,
                            len,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Input columns in the order the trees index them
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for an already aligned feature vector
    pub fn predict_margin(&self, x: ArrayView1<f64>) -> Result<f64, ModelError> {
        if x.len() != self.n_features() {
            return Err(ModelError::DimensionMismatch {
                got: x.len(),
                expected: self.n_features(),
            });
        }
        Ok(self.base_score + self.trees.iter().map(|t| t.leaf_value(x)).sum::<f64>())
    }

    /// Churn probability for an already aligned feature vector
    pub fn predict_row(&self, x: ArrayView1<f64>) -> Result<f64, ModelError> {
        Ok(sigmoid(self.predict_margin(x)?))
    }
}

impl ChurnEstimator for GradientBoostedModel {
    fn name(&self) -> &str {
        "gradient-boosted model"
    }

    fn predict_proba(&self, profile: &CustomerProfile) -> crate::Result<f64> {
        profile.validate()?;
        let aligned = align_features(&encode_profile(profile), &self.feature_names);
        if !aligned.filled.is_empty() {
            debug!(filled = ?aligned.filled, "model features absent from profile, filled with 0");
        }
        if !aligned.ignored.is_empty() {
            debug!(ignored = ?aligned.ignored, "profile features unknown to model, dropped");
        }
        Ok(self.predict_row(aligned.values.view())?)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Feature vector reindexed to a model's column order
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedFeatures {
    pub values: Array1<f64>,
    /// Model columns the encoding did not produce (set to 0.0)
    pub filled: Vec<String>,
    /// Encoded columns the model does not know about
    pub ignored: Vec<String>,
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "Yes"
    } else {
        "No"
    }
}

/// One-hot encode a profile using `<column>_<value>` dummy names
///
/// Numeric inputs keep their table column names (`tenure`, `monthlycharges`,
/// `seniorcitizen`); every categorical input yields one column per level.
pub fn encode_profile(profile: &CustomerProfile) -> BTreeMap<String, f64> {
    let mut encoded = BTreeMap::new();
    encoded.insert("tenure".to_string(), profile.tenure_months as f64);
    encoded.insert("monthlycharges".to_string(), profile.monthly_charges);
    encoded.insert("seniorcitizen".to_string(), flag(profile.senior_citizen));

    let mut one_hot = |column: &str, levels: &[&str], chosen: &str| {
        for level in levels {
            encoded.insert(format!("{column}_{level}"), flag(*level == chosen));
        }
    };

    let contracts: Vec<&str> = Contract::ALL.iter().map(|c| c.label()).collect();
    one_hot("contract", &contracts, profile.contract.label());

    let services: Vec<&str> = InternetService::ALL.iter().map(|s| s.label()).collect();
    one_hot("internetservice", &services, profile.internet_service.label());

    let payments: Vec<&str> = PaymentMethod::ALL.iter().map(|p| p.label()).collect();
    one_hot("paymentmethod", &payments, profile.payment_method.label());

    for (column, value) in [
        ("multiplelines", profile.multiple_lines),
        ("techsupport", profile.tech_support),
        ("streamingtv", profile.streaming_tv),
    ] {
        one_hot(column, &["No", "Yes"], yes_no(value));
    }

    encoded
}

/// Reindex encoded features to `feature_names`, filling gaps with 0.0
pub fn align_features(encoded: &BTreeMap<String, f64>, feature_names: &[String]) -> AlignedFeatures {
    let mut filled = Vec::new();
    let values: Array1<f64> = feature_names
        .iter()
        .map(|name| {
            encoded.get(name).copied().unwrap_or_else(|| {
                filled.push(name.clone());
                0.0
            })
        })
        .collect();

    let ignored = encoded
        .keys()
        .filter(|k| !feature_names.contains(k))
        .cloned()
        .collect();

    AlignedFeatures {
        values,
        filled,
        ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const MODEL_JSON: &str = r#"{
        "feature_names": ["tenure", "contract_Month-to-month", "techsupport_Yes", "totalcharges"],
        "base_score": -1.0,
        "trees": [
            { "nodes": [
                { "feature": 1, "threshold": 0.5, "left": 1, "right": 2 },
                { "leaf": -0.5 },
                { "leaf": 0.8 }
            ] },
            { "nodes": [
                { "feature": 0, "threshold": 12.0, "left": 1, "right": 2, "missing_left": false },
                { "leaf": 0.6 },
                { "feature": 2, "threshold": 0.5, "left": 3, "right": 4 },
                { "leaf": -0.2 },
                { "leaf": -0.7 }
            ] }
        ]
    }"#;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_load_and_margin() {
        let model = GradientBoostedModel::from_json(MODEL_JSON).unwrap();
        assert_eq!(model.n_features(), 4);

        // month-to-month, tenure 3: -1.0 + 0.8 + 0.6
        let x = array![3.0, 1.0, 0.0, 0.0];
        assert!(approx(model.predict_margin(x.view()).unwrap(), 0.4));

        // two-year, tenure 40, tech support: -1.0 - 0.5 - 0.7
        let x = array![40.0, 0.0, 1.0, 0.0];
        assert!(approx(model.predict_margin(x.view()).unwrap(), -2.2));
    }

    #[test]
    fn test_missing_value_direction() {
        let model = GradientBoostedModel::from_json(MODEL_JSON).unwrap();
        // NaN tenure goes right in tree 2, then no tech support -> -0.2
        let x = array![f64::NAN, 0.0, 0.0, 0.0];
        assert!(approx(model.predict_margin(x.view()).unwrap(), -1.7));
    }

    #[test]
    fn test_dimension_mismatch() {
        let model = GradientBoostedModel::from_json(MODEL_JSON).unwrap();
        let x = array![1.0, 2.0];
        assert!(matches!(
            model.predict_margin(x.view()),
            Err(ModelError::DimensionMismatch { got: 2, expected: 4 })
        ));
    }

    #[test]
    fn test_rejects_backward_child() {
        let raw = r#"{
            "feature_names": ["tenure"],
            "trees": [{ "nodes": [
                { "feature": 0, "threshold": 1.0, "left": 0, "right": 1 },
                { "leaf": 0.1 }
            ] }]
        }"#;
        assert!(matches!(
            GradientBoostedModel::from_json(raw),
            Err(ModelError::InvalidChild { child: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_feature_and_empty_model() {
        let raw = r#"{
            "feature_names": ["tenure"],
            "trees": [{ "nodes": [
                { "feature": 3, "threshold": 1.0, "left": 1, "right": 2 },
                { "leaf": 0.1 },
                { "leaf": 0.2 }
            ] }]
        }"#;
        assert!(matches!(
            GradientBoostedModel::from_json(raw),
            Err(ModelError::FeatureOutOfRange { feature: 3, .. })
        ));

        let raw = r#"{ "feature_names": ["tenure"], "trees": [] }"#;
        assert!(matches!(
            GradientBoostedModel::from_json(raw),
            Err(ModelError::NoTrees)
        ));
        assert!(matches!(
            GradientBoostedModel::from_json("not json"),
            Err(ModelError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_empty_features_and_trees() {
        let raw = r#"{
            "feature_names": [],
            "trees": [{ "nodes": [{ "leaf": 0.1 }] }]
        }"#;
        assert!(matches!(
            GradientBoostedModel::from_json(raw),
            Err(ModelError::NoFeatures)
        ));

        let raw = r#"{
            "feature_names": ["tenure"],
            "trees": [{ "nodes": [{ "leaf": 0.1 }] }, { "nodes": [] }]
        }"#;
        assert!(matches!(
            GradientBoostedModel::from_json(raw),
            Err(ModelError::EmptyTree { tree: 1 })
        ));
    }

    #[test]
    fn test_rejects_child_past_end() {
        let raw = r#"{
            "feature_names": ["tenure"],
            "trees": [{ "nodes": [
                { "feature": 0, "threshold": 1.0, "left": 1, "right": 5 },
                { "leaf": 0.1 }
            ] }]
        }"#;
        assert!(matches!(
            GradientBoostedModel::from_json(raw),
            Err(ModelError::InvalidChild { child: 5, len: 2, .. })
        ));
    }

    #[test]
    fn test_deserialize_runs_validation() {
        let raw = r#"{
            "feature_names": ["tenure"],
            "trees": [{ "nodes": [
                { "feature": 3, "threshold": 1.0, "left": 1, "right": 2 },
                { "leaf": 0.1 },
                { "leaf": 0.2 }
            ] }]
        }"#;
        let err = serde_json::from_str::<GradientBoostedModel>(raw).unwrap_err();
        assert!(err.to_string().contains("feature 3"));

        let looping = Tree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 0,
                    missing_left: true,
                },
            ],
        };
        assert!(GradientBoostedModel::new(vec!["tenure".to_string()], 0.0, vec![looping]).is_err());

        let model = GradientBoostedModel::from_json(MODEL_JSON).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let reloaded: GradientBoostedModel = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded, model);
        assert!(approx(reloaded.base_score(), -1.0));
        assert_eq!(reloaded.n_trees(), 2);
    }

    #[test]
    fn test_encode_profile_one_hot() {
        let encoded = encode_profile(&CustomerProfile::default());

        assert_eq!(encoded["tenure"], 12.0);
        assert_eq!(encoded["contract_Month-to-month"], 1.0);
        assert_eq!(encoded["contract_Two year"], 0.0);
        assert_eq!(encoded["paymentmethod_Electronic check"], 1.0);
        assert_eq!(encoded["internetservice_No"], 1.0);
        assert_eq!(encoded["techsupport_No"], 1.0);
        assert_eq!(encoded["techsupport_Yes"], 0.0);
    }

    #[test]
    fn test_align_features_fills_and_drops() {
        let model = GradientBoostedModel::from_json(MODEL_JSON).unwrap();
        let aligned = align_features(&encode_profile(&CustomerProfile::default()), model.feature_names());

        assert_eq!(aligned.values.to_vec(), vec![12.0, 1.0, 0.0, 0.0]);
        assert_eq!(aligned.filled, vec!["totalcharges".to_string()]);
        assert!(aligned.ignored.contains(&"monthlycharges".to_string()));
        assert!(!aligned.ignored.contains(&"tenure".to_string()));
    }

    #[test]
    fn test_estimator_probability() {
        let model = GradientBoostedModel::from_json(MODEL_JSON).unwrap();
        let profile = CustomerProfile {
            tenure_months: 3,
            ..CustomerProfile::default()
        };

        assert_eq!(model.name(), "gradient-boosted model");
        let p = model.predict_proba(&profile).unwrap();
        assert!(approx(p, 1.0 / (1.0 + (-0.4f64).exp())));
        assert!((0.0..=1.0).contains(&p));
    }
}
