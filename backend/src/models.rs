use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{EvalError, EvalResult};
use crate::quality::{self, Category, Confidence};

pub const FEATURE_COUNT: usize = 11;

/// Canonical feature order. The scaler and the model were fit on this order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "fixed_acidity",
    "volatile_acidity",
    "citric_acid",
    "residual_sugar",
    "chlorides",
    "free_sulfur_dioxide",
    "total_sulfur_dioxide",
    "density",
    "pH",
    "sulphates",
    "alcohol",
];

/// One wine's physicochemical measurements. No range checks: out-of-range
/// chemistry is scored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WineSample {
    pub fixed_acidity: f64,
    pub volatile_acidity: f64,
    pub citric_acid: f64,
    pub residual_sugar: f64,
    pub chlorides: f64,
    pub free_sulfur_dioxide: f64,
    pub total_sulfur_dioxide: f64,
    pub density: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    pub sulphates: f64,
    pub alcohol: f64,
}

impl WineSample {
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        let [fixed_acidity, volatile_acidity, citric_acid, residual_sugar, chlorides, free_sulfur_dioxide, total_sulfur_dioxide, density, ph, sulphates, alcohol] =
            values;
        WineSample {
            fixed_acidity,
            volatile_acidity,
            citric_acid,
            residual_sugar,
            chlorides,
            free_sulfur_dioxide,
            total_sulfur_dioxide,
            density,
            ph,
            sulphates,
            alcohol,
        }
    }

    /// Build a sample from an untyped JSON object.
    ///
    /// Numbers are taken as-is and numeric strings such as `"7.4"` are
    /// coerced. Extra keys are ignored. A missing, null, non-numeric or
    /// non-finite field is rejected, naming the field.
    pub fn from_json(value: &Value) -> EvalResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| EvalError::invalid("expected a JSON object of wine features"))?;

        let mut values = [0.0; FEATURE_COUNT];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES) {
            *slot = Self::field(object, name)?;
        }
        Ok(Self::from_array(values))
    }

    fn field(object: &Map<String, Value>, name: &str) -> EvalResult<f64> {
        let parsed = match object.get(name) {
            None | Some(Value::Null) => {
                return Err(EvalError::invalid(format!("missing field `{}`", name)))
            }
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        match parsed {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(EvalError::invalid(format!(
                "field `{}` must be a finite number",
                name
            ))),
        }
    }

    /// Feature vector in canonical order.
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.fixed_acidity,
            self.volatile_acidity,
            self.citric_acid,
            self.residual_sugar,
            self.chlorides,
            self.free_sulfur_dioxide,
            self.total_sulfur_dioxide,
            self.density,
            self.ph,
            self.sulphates,
            self.alcohol,
        ]
    }

    /// Red wine sample used in the API documentation.
    pub fn example() -> Self {
        Self::from_array([
            7.4, 0.7, 0.0, 1.9, 0.076, 11.0, 34.0, 0.9978, 3.51, 0.56, 9.4,
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub predicted_quality: f64,
    pub quality_category: Category,
    pub confidence: Confidence,
    pub interpretation: String,
}

impl PredictionResult {
    /// Round the raw model output and classify it.
    pub fn from_raw_score(raw: f64) -> Self {
        let predicted_quality = quality::round_score(raw);
        let (quality_category, confidence) = quality::classify(predicted_quality);

        PredictionResult {
            predicted_quality,
            quality_category,
            confidence,
            interpretation: quality_category.interpretation().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchPrediction {
    pub predictions: Vec<PredictionResult>,
    pub count: usize,
}

impl From<Vec<PredictionResult>> for BatchPrediction {
    fn from(predictions: Vec<PredictionResult>) -> Self {
        let count = predictions.len();
        BatchPrediction { predictions, count }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: String,
    pub execution_time_ms: Option<u64>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
            timestamp: chrono::Utc::now().to_rfc3339(),
            execution_time_ms: None,
        }
    }

    pub fn timed(mut self, start: std::time::Instant) -> Self {
        self.execution_time_ms = Some(start.elapsed().as_millis() as u64);
        self
    }
}
