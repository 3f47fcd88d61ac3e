pub mod algorithms;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use algorithms::{SvdModel, SvdParams, TrainingProgress, TrainingSummary};
pub use config::Config;
pub use error::ModelError;
pub use models::*;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use services::evaluation::Evaluator;
use services::ingestion::{DataLoader, Dataset};

pub struct TrainedState {
    pub dataset: Arc<Dataset>,
    pub model: SvdModel,
    pub summary: TrainingSummary,
    pub report: EvaluationReport,
}

impl TrainedState {
    pub fn build(config: &Config) -> Result<Self> {
        info!("Loading data...");
        let dataset = Arc::new(DataLoader::from_config(&config.data)?);

        info!("Training SVD model...");
        let mut model = SvdModel::new(Arc::clone(&dataset.matrix), config.model.clone())?;
        let summary = model.train();

        info!("Evaluating model...");
        let report = Evaluator::new(&model).evaluate();

        Ok(Self {
            dataset,
            model,
            summary,
            report,
        })
    }
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}
