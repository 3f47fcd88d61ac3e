use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::models::{EvaluationReport, InteractionMatrix};

pub fn root_mean_squared_error(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    let sum: f64 = residuals.par_iter().map(|r| r * r).sum();
    (sum / residuals.len() as f64).sqrt()
}

pub fn mean_absolute_error(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    let sum: f64 = residuals.par_iter().map(|r| r.abs()).sum();
    sum / residuals.len() as f64
}

pub fn mean_signed_residual(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    let sum: f64 = residuals.par_iter().sum();
    sum / residuals.len() as f64
}

/// Residuals at every observed entry, in the matrix's row-major observed order.
pub fn residuals(interactions: &InteractionMatrix, predictions: &DMatrix<f64>) -> Vec<f64> {
    let ratings = interactions.ratings();
    interactions
        .observed()
        .par_iter()
        .map(|&(user, item)| ratings[(user, item)] - predictions[(user, item)])
        .collect()
}

pub fn report(residuals: &[f64]) -> EvaluationReport {
    EvaluationReport {
        rmse: root_mean_squared_error(residuals),
        mae: mean_absolute_error(residuals),
        mean_signed_residual: mean_signed_residual(residuals),
        observed: residuals.len(),
    }
}
