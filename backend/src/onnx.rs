//! Regressor backed by an ONNX graph, run with tract.
//!
//! The graph takes one `[1, 11]` float32 row (the skl2onnx convention for
//! scikit-learn regressors) and its first output holds the score.

use std::path::Path;

use tract_onnx::prelude::*;

use crate::inference::{FeatureVector, Regressor};
use crate::models::FEATURE_COUNT;

pub struct OnnxRegressor {
    plan: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
}

impl OnnxRegressor {
    pub fn load<P: AsRef<Path>>(model_path: P) -> TractResult<Self> {
        let row = InferenceFact::dt_shape(f32::datum_type(), tvec!(1, FEATURE_COUNT));
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(0, row)?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self { plan })
    }

    /// Narrow the scaled row to f32. A value outside the f32 range would turn
    /// into an infinity, so it is refused instead.
    fn input_row(features: &FeatureVector) -> TractResult<Tensor> {
        let mut row = [0f32; FEATURE_COUNT];
        for (i, (slot, value)) in row.iter_mut().zip(features.iter()).enumerate() {
            *slot = *value as f32;
            anyhow::ensure!(
                slot.is_finite(),
                "scaled feature {} ({}) does not fit in float32",
                i,
                value
            );
        }
        Tensor::from_shape(&[1, FEATURE_COUNT], &row)
    }
}

impl Regressor for OnnxRegressor {
    fn predict(&self, features: &FeatureVector) -> TractResult<f64> {
        let outputs = self.plan.run(tvec!(Self::input_row(features)?.into()))?;
        let view = outputs[0].to_array_view::<f32>()?;
        let score = view
            .iter()
            .next()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("model produced no output"))?;

        Ok(f64::from(score))
    }

    fn describe(&self) -> String {
        "ONNX Regressor".to_string()
    }
}
