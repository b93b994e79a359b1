use std::sync::Arc;
use std::time::Instant;

use actix_web::http::StatusCode;
use actix_web::error::InternalError;
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use log::{error, info, warn};
use parking_lot::RwLock;
use serde_json::{json, Value};

use crate::config::ServerConfig;
use crate::error::EvalError;
use crate::inference::ModelContext;
use crate::models::{ApiResponse, BatchPrediction, PredictionResult, WineSample};
use crate::rate_limit::RateLimiter;
use crate::stats::Stats;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Everything the handlers share. The model context is swapped whole on
/// reload; requests keep the `Arc` they started with.
pub struct AppState {
    model: RwLock<Arc<ModelContext>>,
    model_dir: std::path::PathBuf,
    api_keys: Vec<String>,
    pub stats: Stats,
    pub limiter: RateLimiter,
    pub batch_limiter: RateLimiter,
}

impl AppState {
    pub fn new(model: ModelContext, config: &ServerConfig) -> Self {
        AppState {
            model: RwLock::new(Arc::new(model)),
            model_dir: config.model_dir.clone(),
            api_keys: config.api_keys.clone(),
            stats: Stats::default(),
            limiter: RateLimiter::per_minute(config.rate_limit),
            batch_limiter: RateLimiter::per_minute(config.batch_rate_limit),
        }
    }

    pub fn model(&self) -> Arc<ModelContext> {
        self.model.read().clone()
    }

    /// Re-read the artifacts and swap them in. A failed reload leaves the
    /// context unavailable with the failure reason.
    pub fn reload(&self) -> Arc<ModelContext> {
        let fresh = Arc::new(ModelContext::load_or_unavailable(&self.model_dir));
        *self.model.write() = fresh.clone();
        self.stats.record_reload();
        fresh
    }

    fn key_accepted(&self, req: &HttpRequest) -> Result<(), ApiError> {
        if self.api_keys.is_empty() {
            return Ok(());
        }
        match req.headers().get(API_KEY_HEADER) {
            Some(key) => {
                let key = key.to_str().unwrap_or("");
                if self.api_keys.iter().any(|k| k == key) {
                    Ok(())
                } else {
                    Err(ApiError::Unauthorized("invalid API key"))
                }
            }
            None => Err(ApiError::Unauthorized("missing API key")),
        }
    }
}

/// Failures surfaced by the HTTP layer, rendered as an `ApiResponse`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("execution error: {0}")]
    Blocking(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Eval(EvalError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Eval(EvalError::ModelUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::error(&self.to_string()))
    }
}

fn client_key(req: &HttpRequest) -> Option<String> {
    req.peer_addr().map(|addr| addr.ip().to_string())
}

fn check_rate(limiter: &RateLimiter, state: &AppState, req: &HttpRequest) -> Result<(), ApiError> {
    if let Some(client) = client_key(req) {
        if !limiter.check(&client) {
            warn!("Rate limit exceeded for {}", client);
            state.stats.record_rate_limited();
            return Err(ApiError::RateLimited);
        }
    }
    Ok(())
}

/// Log and count a failed prediction, then hand it back for rendering.
fn fail(state: &AppState, err: EvalError) -> ApiError {
    match &err {
        EvalError::InvalidInput(msg) => warn!("Rejected input: {}", msg),
        EvalError::ModelUnavailable(msg) => error!("Model unavailable: {}", msg),
    }
    state.stats.record_error(&err);
    ApiError::Eval(err)
}

/// Log and count a blocking-pool failure (the closure panicked or the pool
/// shut down).
fn blocking_failed(state: &AppState, what: &str, err: actix_web::error::BlockingError) -> ApiError {
    error!("{} failed on the blocking pool: {}", what, err);
    state.stats.record_internal_error();
    ApiError::Blocking(err.to_string())
}

async fn root() -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(json!({
        "message": "Wine Quality Prediction API",
        "description": "Send POST request to /predict with wine features",
        "endpoints": {
            "GET /health": "service and model status",
            "GET /model_info": "model type and expected features",
            "GET /stats": "request counters",
            "POST /predict": "score one wine sample",
            "POST /predict_batch": "score a list of wine samples",
            "POST /reload": "reload model artifacts",
        },
        "example": WineSample::example(),
    })))
}

async fn health(state: web::Data<AppState>) -> impl Responder {
    let loaded = state.model().is_loaded();
    HttpResponse::Ok().json(ApiResponse::success(json!({
        "status": if loaded { "healthy" } else { "degraded" },
        "model_loaded": loaded,
    })))
}

async fn model_info(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(state.model().model_info()))
}

async fn stats(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(state.stats.snapshot()))
}

async fn predict(
    state: web::Data<AppState>,
    body: web::Json<Value>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let start_time = Instant::now();
    state.stats.record_request();
    check_rate(&state.limiter, &state, &req)?;

    let sample = WineSample::from_json(&body).map_err(|e| fail(&state, e))?;
    let model = state.model();

    let result = web::block(move || model.evaluate(&sample))
        .await
        .map_err(|e| blocking_failed(&state, "Prediction", e))?
        .map_err(|e| fail(&state, e))?;

    state.stats.record_predictions(1);
    info!(
        "Prediction: quality={:.1} category={} confidence={}",
        result.predicted_quality, result.quality_category, result.confidence
    );
    Ok(HttpResponse::Ok().json(ApiResponse::<PredictionResult>::success(result).timed(start_time)))
}

async fn predict_batch(
    state: web::Data<AppState>,
    body: web::Json<Value>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let start_time = Instant::now();
    state.stats.record_request();
    check_rate(&state.batch_limiter, &state, &req)?;

    let items = body
        .as_array()
        .ok_or_else(|| fail(&state, EvalError::invalid("expected a JSON array of wine samples")))?;
    if items.is_empty() {
        return Err(fail(&state, EvalError::invalid("empty batch")));
    }
    info!("Batch prediction request: {} samples", items.len());

    let samples = items
        .iter()
        .enumerate()
        .map(|(i, item)| WineSample::from_json(item).map_err(|e| e.at_sample(i)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| fail(&state, e))?;
    let model = state.model();

    let results = web::block(move || model.evaluate_batch(&samples))
        .await
        .map_err(|e| blocking_failed(&state, "Batch prediction", e))?
        .map_err(|e| fail(&state, e))?;

    state.stats.record_predictions(results.len());
    info!("Batch prediction done: {} results", results.len());
    Ok(HttpResponse::Ok().json(ApiResponse::success(BatchPrediction::from(results)).timed(start_time)))
}

async fn reload(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, ApiError> {
    state.key_accepted(&req).map_err(|e| {
        warn!("Reload refused: {}", e);
        e
    })?;
    let state_for_reload = state.clone();
    let ctx = web::block(move || state_for_reload.reload())
        .await
        .map_err(|e| blocking_failed(&state, "Model reload", e))?;

    info!("Model reload requested, loaded={}", ctx.is_loaded());
    Ok(HttpResponse::Ok().json(ApiResponse::success(ctx.model_info())))
}

/// JSON extractor settings: malformed bodies are rendered like any other
/// invalid input.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let message = format!("invalid input: {}", err);
            let response =
                HttpResponse::BadRequest().json(ApiResponse::<()>::error(&message));
            InternalError::from_response(err, response).into()
        })
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .route("/health", web::get().to(health))
        .route("/model_info", web::get().to(model_info))
        .route("/stats", web::get().to(stats))
        .route("/predict", web::post().to(predict))
        .route("/predict_batch", web::post().to(predict_batch))
        .route("/reload", web::post().to(reload))
        .default_service(web::route().to(|| async {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("endpoint not found"))
        }));
}
