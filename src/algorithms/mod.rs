pub mod initializer;
pub mod optimizer;

use std::ops::ControlFlow;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Axis, ModelError, Result};
use crate::models::{InteractionMatrix, Recommendation};
use crate::utils::top_k_indices;

pub use initializer::FactorInit;
pub use optimizer::Sgd;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvdParams {
    pub n_factors: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    /// Number of single-sample SGD updates performed by one `train` call.
    #[serde(alias = "n_epochs")]
    pub update_steps: usize,
    pub init: FactorInit,
    pub seed: Option<u64>,
}

impl Default for SvdParams {
    fn default() -> Self {
        Self {
            n_factors: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            update_steps: 20,
            init: FactorInit::GlobalMean,
            seed: None,
        }
    }
}

impl SvdParams {
    pub fn new(n_factors: usize, learning_rate: f64, regularization: f64, update_steps: usize) -> Self {
        Self {
            n_factors,
            learning_rate,
            regularization,
            update_steps,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_init(mut self, init: FactorInit) -> Self {
        self.init = init;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_factors == 0 {
            return Err(ModelError::invalid("n_factors", "must be at least 1"));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ModelError::invalid(
                "learning_rate",
                format!("must be a positive finite number, got {}", self.learning_rate),
            ));
        }
        if !self.regularization.is_finite() || self.regularization < 0.0 {
            return Err(ModelError::invalid(
                "regularization",
                format!("must be a non-negative finite number, got {}", self.regularization),
            ));
        }
        self.init.validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainingProgress {
    /// 1-based number of the step that just finished.
    pub step: usize,
    pub total_steps: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSummary {
    pub steps_run: usize,
    pub cancelled: bool,
    pub initial_loss: f64,
    pub final_loss: f64,
    pub initial_rmse: f64,
    pub final_rmse: f64,
}

#[derive(Debug)]
pub struct SvdModel {
    interactions: Arc<InteractionMatrix>,
    params: SvdParams,
    global_mean: f64,
    user_factors: DMatrix<f64>,
    item_factors: DMatrix<f64>,
    sgd: Sgd,
    rng: StdRng,
    prediction_cache: RwLock<Option<Arc<DMatrix<f64>>>>,
}

impl SvdModel {
    pub fn new(interactions: Arc<InteractionMatrix>, params: SvdParams) -> Result<Self> {
        params.validate()?;
        let global_mean = interactions.global_mean()?;

        let mut rng = match params.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let user_factors =
            params
                .init
                .initialize_matrix(interactions.n_users(), params.n_factors, global_mean, &mut rng);
        let item_factors =
            params
                .init
                .initialize_matrix(params.n_factors, interactions.n_items(), global_mean, &mut rng);

        info!(
            "Initialized SVD model: {} users, {} items, {} observed ratings, {} factors, global mean {:.4}",
            interactions.n_users(),
            interactions.n_items(),
            interactions.observed_count(),
            params.n_factors,
            global_mean
        );

        Ok(Self {
            sgd: Sgd::new(params.learning_rate, params.regularization),
            interactions,
            params,
            global_mean,
            user_factors,
            item_factors,
            rng,
            prediction_cache: RwLock::new(None),
        })
    }

    pub fn interactions(&self) -> &Arc<InteractionMatrix> {
        &self.interactions
    }

    pub fn params(&self) -> &SvdParams {
        &self.params
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    pub fn user_factors(&self) -> &DMatrix<f64> {
        &self.user_factors
    }

    pub fn item_factors(&self) -> &DMatrix<f64> {
        &self.item_factors
    }

    pub fn train(&mut self) -> TrainingSummary {
        self.train_with(|_| ControlFlow::Continue(()))
    }

    /// Like [`SvdModel::train`], calling `hook` after each step. Returning
    /// `ControlFlow::Break` stops training early.
    pub fn train_with<F>(&mut self, mut hook: F) -> TrainingSummary
    where
        F: FnMut(TrainingProgress) -> ControlFlow<()>,
    {
        let total_steps = self.params.update_steps;
        let initial_loss = self.training_loss();
        let initial_rmse = self.training_rmse();
        info!(
            "Initial training loss: {:.4} (rmse {:.4})",
            initial_loss, initial_rmse
        );

        let mut steps_run = 0;
        let mut cancelled = false;
        for step in 1..=total_steps {
            self.sgd_step();
            steps_run = step;
            if hook(TrainingProgress { step, total_steps }).is_break() {
                debug!("Training cancelled after {} of {} steps", step, total_steps);
                cancelled = true;
                break;
            }
        }
        self.invalidate_predictions();

        let final_loss = self.training_loss();
        let final_rmse = self.training_rmse();
        info!(
            "Final training loss: {:.4} (rmse {:.4}) after {} steps",
            final_loss, final_rmse, steps_run
        );

        TrainingSummary {
            steps_run,
            cancelled,
            initial_loss,
            final_loss,
            initial_rmse,
            final_rmse,
        }
    }

    /// Samples one observed (user, item) pair uniformly and applies one SGD update to it.
    pub fn sgd_step(&mut self) {
        let observed = self.interactions.observed();
        let (user, item) = observed[self.rng.gen_range(0..observed.len())];
        self.update_pair(user, item);
        self.invalidate_predictions();
    }

    fn update_pair(&mut self, user: usize, item: usize) {
        let user_row: DVector<f64> = self.user_factors.row(user).transpose();
        let item_col: DVector<f64> = self.item_factors.column(item).into_owned();

        let error = self.interactions.ratings()[(user, item)] - user_row.dot(&item_col);
        let (new_user, new_item) = self.sgd.step(&user_row, &item_col, error);

        self.user_factors.set_row(user, &new_user.transpose());
        self.item_factors.set_column(item, &new_item);
    }

    pub fn predict_single(&self, user: usize, item: usize) -> Result<f64> {
        if user >= self.user_factors.nrows() {
            return Err(ModelError::IndexOutOfRange {
                axis: Axis::User,
                index: user,
                len: self.user_factors.nrows(),
            });
        }
        if item >= self.item_factors.ncols() {
            return Err(ModelError::IndexOutOfRange {
                axis: Axis::Item,
                index: item,
                len: self.item_factors.ncols(),
            });
        }
        Ok(self.dot(user, item))
    }

    fn dot(&self, user: usize, item: usize) -> f64 {
        self.user_factors
            .row(user)
            .tr_dot(&self.item_factors.column(item))
    }

    pub fn predict(&self) -> Arc<DMatrix<f64>> {
        if let Some(cached) = self.prediction_cache.read().as_ref() {
            return Arc::clone(cached);
        }

        let mut cache = self.prediction_cache.write();
        if let Some(cached) = cache.as_ref() {
            return Arc::clone(cached);
        }
        debug!(
            "Computing {}x{} prediction matrix",
            self.user_factors.nrows(),
            self.item_factors.ncols()
        );
        let predictions = Arc::new(&self.user_factors * &self.item_factors);
        *cache = Some(Arc::clone(&predictions));
        predictions
    }

    fn invalidate_predictions(&mut self) {
        *self.prediction_cache.get_mut() = None;
    }

    /// Top `n_recommendations` items the 1-based `user_id` has not rated.
    ///
    /// Item ids in the result are 1-based. Equal scores keep ascending item
    /// order; NaN scores rank after every number.
    pub fn recommend_movies(&self, user_id: usize, n_recommendations: usize) -> Result<Vec<Recommendation>> {
        let n_users = self.interactions.n_users();
        if user_id == 0 || user_id > n_users {
            return Err(ModelError::UserOutOfRange { user_id, n_users });
        }
        let user = user_id - 1;

        let predictions = self.predict();
        let (candidates, scores): (Vec<usize>, Vec<f64>) = predictions
            .row(user)
            .iter()
            .enumerate()
            .filter(|&(item, _)| !self.interactions.is_observed(user, item))
            .map(|(item, &score)| (item, score))
            .unzip();

        Ok(top_k_indices(&scores, n_recommendations)
            .into_iter()
            .map(|i| Recommendation {
                item_id: candidates[i] + 1,
                score: scores[i],
            })
            .collect())
    }

    /// Signed mean residual. Opposite errors cancel; use `training_rmse` for fit.
    pub fn training_loss(&self) -> f64 {
        let observed = self.interactions.observed();
        let total: f64 = observed
            .iter()
            .map(|&(user, item)| self.interactions.ratings()[(user, item)] - self.dot(user, item))
            .sum();
        total / observed.len() as f64
    }

    pub fn training_rmse(&self) -> f64 {
        let observed = self.interactions.observed();
        let total: f64 = observed
            .iter()
            .map(|&(user, item)| {
                let residual = self.interactions.ratings()[(user, item)] - self.dot(user, item);
                residual * residual
            })
            .sum();
        (total / observed.len() as f64).sqrt()
    }
}
