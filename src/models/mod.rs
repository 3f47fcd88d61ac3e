use chrono::{DateTime, NaiveDate, Utc};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Axis, ModelError, Result};

/// Users x items ratings; `0.0` means "not rated".
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionMatrix {
    ratings: DMatrix<f64>,
    observed: Vec<(usize, usize)>,
}

impl InteractionMatrix {
    pub fn new(ratings: DMatrix<f64>) -> Result<Self> {
        let mut observed = Vec::new();
        for user in 0..ratings.nrows() {
            for item in 0..ratings.ncols() {
                let value = ratings[(user, item)];
                if !value.is_finite() {
                    return Err(ModelError::NonFiniteRating { user, item });
                }
                if value != 0.0 {
                    observed.push((user, item));
                }
            }
        }
        Ok(Self { ratings, observed })
    }

    pub fn from_row_slice(n_users: usize, n_items: usize, values: &[f64]) -> Result<Self> {
        let expected = n_users.checked_mul(n_items).ok_or_else(|| {
            ModelError::invalid("shape", format!("{n_users}x{n_items} matrix is too large"))
        })?;
        if values.len() != expected {
            return Err(ModelError::invalid(
                "values",
                format!(
                    "expected {expected} entries for a {n_users}x{n_items} matrix, got {}",
                    values.len()
                ),
            ));
        }
        Self::new(DMatrix::from_row_slice(n_users, n_items, values))
    }

    pub fn n_users(&self) -> usize {
        self.ratings.nrows()
    }

    pub fn n_items(&self) -> usize {
        self.ratings.ncols()
    }

    pub fn ratings(&self) -> &DMatrix<f64> {
        &self.ratings
    }

    pub fn observed(&self) -> &[(usize, usize)] {
        &self.observed
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    pub fn is_observed(&self, user: usize, item: usize) -> bool {
        user < self.n_users() && item < self.n_items() && self.ratings[(user, item)] != 0.0
    }

    pub fn rated_items(&self, user: usize) -> Result<Vec<usize>> {
        self.check_user(user)?;
        Ok(self
            .ratings
            .row(user)
            .iter()
            .enumerate()
            .filter(|&(_, &value)| value != 0.0)
            .map(|(item, _)| item)
            .collect())
    }

    pub fn global_mean(&self) -> Result<f64> {
        if self.observed.is_empty() {
            return Err(ModelError::DegenerateInput);
        }
        let total: f64 = self
            .observed
            .iter()
            .map(|&(user, item)| self.ratings[(user, item)])
            .sum();
        Ok(total / self.observed.len() as f64)
    }

    fn check_user(&self, user: usize) -> Result<()> {
        if user >= self.n_users() {
            return Err(ModelError::IndexOutOfRange {
                axis: Axis::User,
                index: user,
                len: self.n_users(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub movie_id: u32,
    pub year: Option<u16>,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub movie_id: u32,
    pub user_id: u32,
    pub rating: u8,
    pub date: Option<NaiveDate>,
}

/// One ranked entry: 1-based item id and its predicted score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub item_id: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub item_id: usize,
    pub movie_id: Option<u32>,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub user_id: usize,
    pub source_user_id: Option<u32>,
    pub recommendations: Vec<RecommendationItem>,
    pub has_more: bool,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rmse: f64,
    pub mae: f64,
    pub mean_signed_residual: f64,
    pub observed: usize,
}
