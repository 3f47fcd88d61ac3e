use std::sync::Arc;

use nalgebra::DMatrix;
use tracing::info;

use crate::algorithms::SvdModel;
use crate::models::{EvaluationReport, InteractionMatrix};
use crate::utils::metrics;

pub struct Evaluator {
    interactions: Arc<InteractionMatrix>,
    predictions: Arc<DMatrix<f64>>,
}

impl Evaluator {
    pub fn new(model: &SvdModel) -> Self {
        Self {
            interactions: Arc::clone(model.interactions()),
            predictions: model.predict(),
        }
    }

    pub fn calculate_rmse(&self) -> f64 {
        metrics::root_mean_squared_error(&self.residuals())
    }

    pub fn calculate_mae(&self) -> f64 {
        metrics::mean_absolute_error(&self.residuals())
    }

    pub fn evaluate(&self) -> EvaluationReport {
        let report = metrics::report(&self.residuals());
        info!(
            "Evaluation over {} ratings: RMSE {:.4}, MAE {:.4}",
            report.observed, report.rmse, report.mae
        );
        report
    }

    fn residuals(&self) -> Vec<f64> {
        metrics::residuals(&self.interactions, &self.predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::SvdParams;

    #[test]
    fn test_untrained_model_report() {
        let matrix = Arc::new(InteractionMatrix::from_row_slice(2, 3, &[5.0, 0.0, 3.0, 0.0, 4.0, 0.0]).unwrap());
        let model = SvdModel::new(matrix, SvdParams::new(1, 0.1, 0.0, 0)).unwrap();
        let evaluator = Evaluator::new(&model);

        // every prediction is 16: residuals -11, -13, -12
        let report = evaluator.evaluate();
        assert_eq!(report.observed, 3);
        assert!((report.mae - 12.0).abs() < 1e-12);
        assert!((report.mean_signed_residual + 12.0).abs() < 1e-12);
        assert!((report.rmse - model.training_rmse()).abs() < 1e-12);
        assert_eq!(evaluator.calculate_mae(), report.mae);
        assert_eq!(evaluator.calculate_rmse(), report.rmse);
    }
}
