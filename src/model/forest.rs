//! Random Forest Classifier
//!
//! Bagged smartcore CART trees split on Gini impurity. Each tree is fit on a
//! bootstrap sample restricted to `ceil(sqrt(n_features))` randomly chosen
//! feature columns. Class probabilities are the share of trees voting for
//! each class.
//!
//! Trees are trained in parallel (rayon). Tree `t` is seeded with
//! `random_state + t`, so a given dataset and config always produce the same
//! forest regardless of thread scheduling.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::index::sample as sample_indices;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};

use crate::error::AdvisorError;

type Tree = DecisionTreeClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

/// Hyperparameters shared by every tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub random_state: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            random_state: 42,
        }
    }
}

impl ForestParams {
    fn tree_params(&self, seed: u64) -> DecisionTreeClassifierParameters {
        DecisionTreeClassifierParameters {
            criterion: SplitCriterion::Gini,
            max_depth: self.max_depth.map(|d| u16::try_from(d).unwrap_or(u16::MAX)),
            min_samples_leaf: self.min_samples_leaf.max(1),
            min_samples_split: self.min_samples_split.max(2),
            seed: Some(seed),
        }
    }
}

/// One bagged member: the columns it was fit on plus its tree
///
/// A bootstrap that drew a single class cannot be fit, so it always votes
/// for that class.
#[derive(Debug, Serialize, Deserialize)]
enum Member {
    Constant { class: u32 },
    Fitted { features: Vec<usize>, tree: Tree },
}

impl Member {
    /// Encoded class vote for each row
    fn votes(&self, rows: &[Vec<f64>]) -> Result<Vec<u32>> {
        match self {
            Member::Constant { class } => Ok(vec![*class; rows.len()]),
            Member::Fitted { features, tree } => {
                let projected = project(rows, features);
                tree.predict(&DenseMatrix::from_2d_vec(&projected))
                    .context("Tree prediction failed")
            }
        }
    }
}

fn project(rows: &[Vec<f64>], features: &[usize]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|row| features.iter().map(|&f| row[f]).collect())
        .collect()
}

fn fit_member(x: &[Vec<f64>], y: &[u32], n_features: usize, max_features: usize, params: &ForestParams, t: usize) -> Result<Member> {
    let seed = params.random_state.wrapping_add(t as u64);
    let mut rng = StdRng::seed_from_u64(seed);
    let n = x.len();
    let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

    let labels: Vec<u32> = bootstrap.iter().map(|&i| y[i]).collect();
    if labels.iter().all(|&c| c == labels[0]) {
        return Ok(Member::Constant { class: labels[0] });
    }

    let mut features = sample_indices(&mut rng, n_features, max_features).into_vec();
    features.sort_unstable();
    let rows: Vec<Vec<f64>> = bootstrap.iter().map(|&i| x[i].clone()).collect();
    let matrix = DenseMatrix::from_2d_vec(&project(&rows, &features));

    let tree = Tree::fit(&matrix, &labels, params.tree_params(seed))
        .with_context(|| format!("Failed to fit tree {}", t))?;
    Ok(Member::Fitted { features, tree })
}

// ============================================================================
// Forest
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForest {
    classes: Vec<String>,
    n_features: usize,
    params: ForestParams,
    members: Vec<Member>,
}

impl RandomForest {
    /// Fit on feature rows `x` and string labels `y`
    ///
    /// Classes are the sorted unique labels; probability vectors follow that
    /// order.
    pub fn fit(x: &[Vec<f64>], y: &[String], params: &ForestParams) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(AdvisorError::InvalidInput(format!(
                "training data needs matching non-empty rows and labels (got {} rows, {} labels)",
                x.len(),
                y.len()
            ))
            .into());
        }
        if params.n_estimators == 0 {
            return Err(AdvisorError::InvalidInput("n_estimators must be at least 1".to_string()).into());
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(AdvisorError::InvalidInput("feature rows must share a non-zero width".to_string()).into());
        }
        if x.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AdvisorError::InvalidInput("feature rows must be finite".to_string()).into());
        }

        let mut classes: Vec<String> = y.to_vec();
        classes.sort();
        classes.dedup();
        let encoded: Vec<u32> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default() as u32)
            .collect();

        let max_features = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);

        let members = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| fit_member(x, &encoded, n_features, max_features, params, t))
            .collect::<Result<Vec<Member>>>()?;

        Ok(Self {
            classes,
            n_features,
            params: params.clone(),
            members,
        })
    }

    /// Vote shares per row, ordered like [`Self::classes`]
    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        if let Some(row) = rows.iter().find(|r| r.len() != self.n_features) {
            return Err(AdvisorError::InvalidInput(format!(
                "expected {} features, got {}",
                self.n_features,
                row.len()
            ))
            .into());
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut proba = vec![vec![0.0; self.classes.len()]; rows.len()];
        for member in &self.members {
            for (acc, class) in proba.iter_mut().zip(member.votes(rows)?) {
                if let Some(slot) = acc.get_mut(class as usize) {
                    *slot += 1.0;
                }
            }
        }
        let n_trees = self.members.len() as f64;
        for row in &mut proba {
            row.iter_mut().for_each(|p| *p /= n_trees);
        }
        Ok(proba)
    }

    pub fn predict_proba(&self, row: &[f64]) -> Result<Vec<f64>> {
        let mut batch = self.predict_proba_batch(&[row.to_vec()])?;
        batch
            .pop()
            .ok_or_else(|| AdvisorError::InvalidInput("empty prediction batch".to_string()).into())
    }

    /// Most probable class; ties go to the earlier class name
    pub fn predict(&self, row: &[f64]) -> Result<&str> {
        let proba = self.predict_proba(row)?;
        Ok(&self.classes[argmax(&proba)])
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.members.len()
    }
}

/// Index of the largest value; the first one wins ties
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold(0, |best, (i, p)| if *p > values[best] { i } else { best })
}
