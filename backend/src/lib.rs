//! Wine quality scoring behind a small HTTP API.
//!
//! A [`WineSample`] is scaled and scored by an injected model, and the score
//! is mapped to a [`Category`] and a [`Confidence`] label.

pub mod config;
pub mod error;
pub mod inference;
pub mod models;
pub mod onnx;
pub mod quality;
pub mod rate_limit;
pub mod routes;
pub mod stats;

pub use error::{EvalError, EvalResult};
pub use inference::{ModelContext, Regressor, Scaler};
pub use models::{PredictionResult, WineSample, FEATURE_NAMES};
pub use quality::{Category, Confidence};
