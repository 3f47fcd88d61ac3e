use nalgebra::DMatrix;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

pub fn constant(rows: usize, cols: usize, value: f64) -> DMatrix<f64> {
    DMatrix::from_element(rows, cols, value)
}

pub fn uniform<R: Rng + ?Sized>(rows: usize, cols: usize, low: f64, high: f64, rng: &mut R) -> DMatrix<f64> {
    DMatrix::from_fn(rows, cols, |_, _| rng.gen_range(low..high))
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FactorInit {
    #[default]
    GlobalMean,
    Constant { value: f64 },
    Uniform { low: f64, high: f64 },
}

impl FactorInit {
    pub fn validate(&self) -> Result<()> {
        match *self {
            FactorInit::GlobalMean => Ok(()),
            FactorInit::Constant { value } if !value.is_finite() => {
                Err(ModelError::invalid("init.value", "must be finite"))
            }
            FactorInit::Constant { .. } => Ok(()),
            FactorInit::Uniform { low, high } => {
                if !low.is_finite() || !high.is_finite() {
                    Err(ModelError::invalid("init.low/high", "bounds must be finite"))
                } else if low >= high {
                    Err(ModelError::invalid(
                        "init.low/high",
                        format!("empty range {low}..{high}"),
                    ))
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn initialize_matrix<R: Rng + ?Sized>(
        &self,
        rows: usize,
        cols: usize,
        global_mean: f64,
        rng: &mut R,
    ) -> DMatrix<f64> {
        match *self {
            FactorInit::GlobalMean => constant(rows, cols, global_mean),
            FactorInit::Constant { value } => constant(rows, cols, value),
            FactorInit::Uniform { low, high } => uniform(rows, cols, low, high, rng),
        }
    }
}
