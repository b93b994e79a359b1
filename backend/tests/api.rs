//! HTTP-level tests against the linear fixture model (score = 1 + alcohol / 2).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use wine_quality::config::ServerConfig;
use wine_quality::inference::{FeatureVector, ModelContext, Regressor, Scaler};
use wine_quality::routes::{self, AppState, API_KEY_HEADER};
use wine_quality::WineSample;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/linear")
}

fn config() -> ServerConfig {
    ServerConfig {
        model_dir: fixture_dir(),
        ..ServerConfig::default()
    }
}

fn loaded_state(config: &ServerConfig) -> web::Data<AppState> {
    let model = ModelContext::load_dir(&config.model_dir).expect("fixture model loads");
    web::Data::new(AppState::new(model, config))
}

fn sample_with_alcohol(alcohol: f64) -> Value {
    let mut value = serde_json::to_value(WineSample::example()).unwrap();
    value["alcohol"] = json!(alcohol);
    value
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state.clone())
                .app_data(routes::json_config(1024 * 1024))
                .configure(routes::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn predict_returns_rounded_score_and_labels() {
    let state = loaded_state(&config());
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(sample_with_alcohol(9.4))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["predicted_quality"], json!(5.7));
    assert_eq!(body["data"]["quality_category"], json!("Good"));
    assert_eq!(body["data"]["confidence"], json!("Medium"));
    assert!(body["execution_time_ms"].is_u64());
}

#[actix_web::test]
async fn category_boundaries_over_http() {
    let state = loaded_state(&config());
    let app = app!(state);

    let cases = [
        (6.0, 4.0, "Poor", "High"),
        (6.2, 4.1, "Fair", "Medium"),
        (10.0, 6.0, "Good", "High"),
        (11.0, 6.5, "Very Good", "Medium"),
        (12.0, 7.0, "Very Good", "High"),
        (12.2, 7.1, "Excellent", "Medium"),
        (16.0, 9.0, "Excellent", "Medium"),
    ];

    for (alcohol, score, category, confidence) in cases {
        let req = test::TestRequest::post()
            .uri("/predict")
            .set_json(sample_with_alcohol(alcohol))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            (
                body["data"]["predicted_quality"].as_f64(),
                body["data"]["quality_category"].as_str(),
                body["data"]["confidence"].as_str(),
            ),
            (Some(score), Some(category), Some(confidence)),
            "alcohol {alcohol}"
        );
    }
}

#[actix_web::test]
async fn missing_field_is_bad_request() {
    let state = loaded_state(&config());
    let app = app!(state);

    let mut sample = sample_with_alcohol(10.0);
    sample.as_object_mut().unwrap().remove("pH");
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(sample)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("invalid input: missing field `pH`"));
    assert_eq!(state.stats.snapshot().invalid_inputs, 1);
}

#[actix_web::test]
async fn malformed_json_is_bad_request() {
    let state = loaded_state(&config());
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/predict")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"alcohol\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(false));
}

#[actix_web::test]
async fn batch_keeps_input_order() {
    let state = loaded_state(&config());
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/predict_batch")
        .set_json(json!([
            sample_with_alcohol(12.0),
            sample_with_alcohol(6.0),
            sample_with_alcohol(10.0),
        ]))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["count"], json!(3));
    let scores: Vec<f64> = body["data"]["predictions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["predicted_quality"].as_f64().unwrap())
        .collect();
    assert_eq!(scores, vec![7.0, 4.0, 6.0]);
    assert_eq!(state.stats.snapshot().predictions, 3);
}

#[actix_web::test]
async fn batch_fails_fast_on_one_bad_sample() {
    let state = loaded_state(&config());
    let app = app!(state);

    let mut bad = sample_with_alcohol(10.0);
    bad["density"] = json!("heavy");
    let req = test::TestRequest::post()
        .uri("/predict_batch")
        .set_json(json!([sample_with_alcohol(12.0), bad]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"], Value::Null);
    assert_eq!(
        body["error"],
        json!("invalid input: sample 2: field `density` must be a finite number")
    );
    assert_eq!(state.stats.snapshot().predictions, 0);
}

#[actix_web::test]
async fn empty_batch_is_rejected() {
    let state = loaded_state(&config());
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/predict_batch")
        .set_json(json!([]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn unavailable_model_yields_503_not_a_score() {
    let config = config();
    let state = web::Data::new(AppState::new(
        ModelContext::unavailable("scaler.json not found"),
        &config,
    ));
    let app = app!(state);

    for uri in ["/predict", "/predict_batch"] {
        let payload = if uri == "/predict" {
            sample_with_alcohol(10.0)
        } else {
            json!([sample_with_alcohol(10.0)])
        };
        let req = test::TestRequest::post()
            .uri(uri)
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"], Value::Null);
    }

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body["data"],
        json!({ "status": "degraded", "model_loaded": false })
    );
}

#[actix_web::test]
async fn reload_recovers_an_unavailable_model() {
    let config = config();
    let state = web::Data::new(AppState::new(
        ModelContext::unavailable("not loaded yet"),
        &config,
    ));
    let app = app!(state);

    let req = test::TestRequest::post().uri("/reload").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["model_loaded"], json!(true));
    assert_eq!(state.stats.snapshot().reloads, 1);

    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(sample_with_alcohol(10.0))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn reload_requires_key_when_configured() {
    let config = ServerConfig {
        api_keys: vec!["secret".to_string()],
        ..config()
    };
    let state = loaded_state(&config);
    let app = app!(state);

    let req = test::TestRequest::post().uri("/reload").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/reload")
        .insert_header((API_KEY_HEADER, "wrong"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/reload")
        .insert_header((API_KEY_HEADER, "secret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn model_info_lists_features_in_order() {
    let state = loaded_state(&config());
    let app = app!(state);

    let req = test::TestRequest::get().uri("/model_info").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let features = body["data"]["features"].as_array().unwrap();
    assert_eq!(features.len(), 11);
    assert_eq!(features[0], json!("fixed acidity"));
    assert_eq!(features[10], json!("alcohol"));
    assert_eq!(body["data"]["model_type"], json!("Linear Regressor"));
    assert_eq!(body["data"]["model_loaded"], json!(true));
}

#[actix_web::test]
async fn rate_limit_applies_per_client() {
    let config = ServerConfig {
        rate_limit: 1,
        ..config()
    };
    let state = loaded_state(&config);
    let app = app!(state);

    let peer: SocketAddr = "10.1.2.3:4000".parse().unwrap();
    let send = || {
        test::TestRequest::post()
            .uri("/predict")
            .peer_addr(peer)
            .set_json(sample_with_alcohol(10.0))
            .to_request()
    };

    let resp = test::call_service(&app, send()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = test::call_service(&app, send()).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(state.stats.snapshot().rate_limited, 1);
}

#[actix_web::test]
async fn root_and_fallback() {
    let state = loaded_state(&config());
    let app = app!(state);

    let req = test::TestRequest::get().uri("/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["message"], json!("Wine Quality Prediction API"));
    assert_eq!(body["data"]["example"]["pH"], json!(3.51));

    let req = test::TestRequest::get().uri("/nope").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

struct Passthrough;

impl Scaler for Passthrough {
    fn scale(&self, features: &FeatureVector) -> anyhow::Result<FeatureVector> {
        Ok(*features)
    }

    fn feature_names(&self) -> Vec<String> {
        wine_quality::FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }
}

struct Panicking;

impl Regressor for Panicking {
    fn predict(&self, _: &FeatureVector) -> anyhow::Result<f64> {
        panic!("inference worker crashed");
    }

    fn describe(&self) -> String {
        "panicking".to_string()
    }
}

#[actix_web::test]
async fn crashed_worker_is_counted_as_internal_error() {
    let config = config();
    let model = ModelContext::new(Arc::new(Passthrough), Arc::new(Panicking));
    let state = web::Data::new(AppState::new(model, &config));
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(sample_with_alcohol(10.0))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let req = test::TestRequest::post()
        .uri("/predict_batch")
        .set_json(json!([sample_with_alcohol(10.0)]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let req = test::TestRequest::get().uri("/stats").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["internal_errors"], json!(2));
    assert_eq!(body["data"]["predictions"], json!(0));
}
