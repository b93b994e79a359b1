use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, ensure, Context};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};
use crate::models::{PredictionResult, WineSample, FEATURE_COUNT, FEATURE_NAMES};
use crate::onnx::OnnxRegressor;

pub type FeatureVector = [f64; FEATURE_COUNT];

pub const SCALER_FILE: &str = "scaler.json";
pub const ONNX_MODEL_FILE: &str = "model.onnx";
pub const LINEAR_MODEL_FILE: &str = "model.json";

/// Normalizes raw features before inference.
pub trait Scaler: Send + Sync {
    fn scale(&self, features: &FeatureVector) -> anyhow::Result<FeatureVector>;
    fn feature_names(&self) -> Vec<String>;
}

/// Maps a scaled feature vector to a continuous quality score.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<f64>;
    fn describe(&self) -> String;
}

/// `(x - mean) / scale`, as fit by a standard scaler.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

impl StandardScaler {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading scaler {}", path.display()))?;
        let scaler: StandardScaler = serde_json::from_str(&raw)
            .with_context(|| format!("parsing scaler {}", path.display()))?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.mean.len() == FEATURE_COUNT,
            "scaler mean has {} entries, expected {}",
            self.mean.len(),
            FEATURE_COUNT
        );
        ensure!(
            self.scale.len() == FEATURE_COUNT,
            "scaler scale has {} entries, expected {}",
            self.scale.len(),
            FEATURE_COUNT
        );
        if let Some(i) = self.scale.iter().position(|s| *s == 0.0 || !s.is_finite()) {
            bail!("scaler scale for feature {} is not a usable divisor", i);
        }
        if let Some(names) = &self.feature_names {
            ensure!(
                names.len() == FEATURE_COUNT,
                "scaler lists {} feature names, expected {}",
                names.len(),
                FEATURE_COUNT
            );
        }
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn scale(&self, features: &FeatureVector) -> anyhow::Result<FeatureVector> {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (features[i] - self.mean[i]) / self.scale[i];
        }
        Ok(out)
    }

    fn feature_names(&self) -> Vec<String> {
        match &self.feature_names {
            Some(names) => names.clone(),
            None => FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Linear regressor stored as JSON coefficients.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LinearRegressor {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearRegressor {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading model {}", path.display()))?;
        let model: LinearRegressor = serde_json::from_str(&raw)
            .with_context(|| format!("parsing model {}", path.display()))?;
        ensure!(
            model.coefficients.len() == FEATURE_COUNT,
            "linear model has {} coefficients, expected {}",
            model.coefficients.len(),
            FEATURE_COUNT
        );
        Ok(model)
    }
}

impl Regressor for LinearRegressor {
    fn predict(&self, features: &FeatureVector) -> anyhow::Result<f64> {
        Ok(self
            .coefficients
            .iter()
            .zip(features.iter())
            .fold(self.intercept, |acc, (w, x)| acc + w * x))
    }

    fn describe(&self) -> String {
        "Linear Regressor".to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub model_loaded: bool,
    pub features: Vec<String>,
    pub target: String,
    pub quality_range: String,
    pub description: String,
}

struct Loaded {
    scaler: Arc<dyn Scaler>,
    model: Arc<dyn Regressor>,
}

/// Scaler and model loaded once and shared read-only by every request.
///
/// When loading failed the context keeps the reason, and every evaluation
/// reports it as [`EvalError::ModelUnavailable`].
pub struct ModelContext {
    inner: Result<Loaded, String>,
}

impl ModelContext {
    pub fn new(scaler: Arc<dyn Scaler>, model: Arc<dyn Regressor>) -> Self {
        ModelContext {
            inner: Ok(Loaded { scaler, model }),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        ModelContext {
            inner: Err(reason.into()),
        }
    }

    /// Read `scaler.json` plus `model.onnx` (preferred) or `model.json` from
    /// `dir`.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let scaler = StandardScaler::load(dir.join(SCALER_FILE))?;

        let onnx_path = dir.join(ONNX_MODEL_FILE);
        let linear_path = dir.join(LINEAR_MODEL_FILE);
        let model: Arc<dyn Regressor> = if onnx_path.exists() {
            let model = OnnxRegressor::load(&onnx_path)
                .with_context(|| format!("loading ONNX model {}", onnx_path.display()))?;
            Arc::new(model)
        } else if linear_path.exists() {
            Arc::new(LinearRegressor::load(&linear_path)?)
        } else {
            bail!(
                "no model found in {} (expected {} or {})",
                dir.display(),
                ONNX_MODEL_FILE,
                LINEAR_MODEL_FILE
            );
        };

        Ok(Self::new(Arc::new(scaler), model))
    }

    /// Like [`ModelContext::load_dir`], but a failure yields an unavailable
    /// context instead of an error so the server can still start.
    pub fn load_or_unavailable<P: AsRef<Path>>(dir: P) -> Self {
        let dir: PathBuf = dir.as_ref().to_path_buf();
        match Self::load_dir(&dir) {
            Ok(ctx) => {
                info!("Model loaded from {}", dir.display());
                info!("Expected features: {:?}", ctx.feature_names());
                ctx
            }
            Err(e) => {
                warn!("Error loading model files: {:#}", e);
                Self::unavailable(format!("{:#}", e))
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.is_ok()
    }

    fn loaded(&self) -> EvalResult<&Loaded> {
        self.inner
            .as_ref()
            .map_err(|reason| EvalError::unavailable(reason.clone()))
    }

    pub fn feature_names(&self) -> Vec<String> {
        match &self.inner {
            Ok(loaded) => loaded.scaler.feature_names(),
            Err(_) => FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Scale, predict, round and classify a single sample.
    pub fn evaluate(&self, sample: &WineSample) -> EvalResult<PredictionResult> {
        let loaded = self.loaded()?;

        let scaled = loaded
            .scaler
            .scale(&sample.to_array())
            .map_err(|e| EvalError::unavailable(format!("scaler failed: {:#}", e)))?;
        let raw = loaded
            .model
            .predict(&scaled)
            .map_err(|e| EvalError::unavailable(format!("model failed: {:#}", e)))?;
        if !raw.is_finite() {
            return Err(EvalError::unavailable("model produced a non-finite score"));
        }

        let result = PredictionResult::from_raw_score(raw);
        if !result.predicted_quality.is_finite() {
            return Err(EvalError::unavailable("model produced a non-finite score"));
        }
        Ok(result)
    }

    /// Evaluate every sample in order. The first failure aborts the batch and
    /// no partial results are returned.
    pub fn evaluate_batch(&self, samples: &[WineSample]) -> EvalResult<Vec<PredictionResult>> {
        samples
            .iter()
            .enumerate()
            .map(|(i, sample)| self.evaluate(sample).map_err(|e| e.at_sample(i)))
            .collect()
    }

    pub fn model_info(&self) -> ModelInfo {
        let model_type = match &self.inner {
            Ok(loaded) => loaded.model.describe(),
            Err(_) => "unavailable".to_string(),
        };

        ModelInfo {
            model_type,
            model_loaded: self.is_loaded(),
            features: self.feature_names(),
            target: "wine_quality".to_string(),
            quality_range: "3-9 (higher is better)".to_string(),
            description: "Predicts wine quality based on chemical properties".to_string(),
        }
    }
}
