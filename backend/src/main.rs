use std::time::Duration;

use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{http, web, App, HttpServer};
use anyhow::Context;
use log::info;

use wine_quality::config::ServerConfig;
use wine_quality::inference::ModelContext;
use wine_quality::routes::{self, AppState};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    let config = ServerConfig::from_env().context("reading configuration")?;
    info!("Starting Wine Quality Prediction API");

    let model = ModelContext::load_or_unavailable(&config.model_dir);
    if !model.is_loaded() {
        info!("Serving in degraded mode until POST /reload succeeds");
    }
    let state = web::Data::new(AppState::new(model, &config));

    let purge_state = state.clone();
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            purge_state.limiter.purge_expired();
            purge_state.batch_limiter.purge_expired();
        }
    });

    let bind_address = config.bind_address();
    info!("Listening on http://{}", bind_address);
    info!("Workers: {}", config.workers);
    info!("Model directory: {}", config.model_dir.display());

    let json_limit = config.json_limit;
    let cors_origins = config.cors_origins.clone();
    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::AUTHORIZATION,
                http::header::HeaderName::from_static("x-api-key"),
            ])
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(DefaultHeaders::new().add(("X-Content-Type-Options", "nosniff")))
            .wrap(cors)
            .app_data(state.clone())
            .app_data(routes::json_config(json_limit))
            .configure(routes::configure)
    })
    .workers(config.workers)
    .bind(&bind_address)
    .with_context(|| format!("binding {}", bind_address))?
    .run()
    .await
    .context("running HTTP server")?;

    Ok(())
}
