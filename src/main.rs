// src/main.rs
use std::io;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;

use flag_forecaster::api::{self, AppState};
use flag_forecaster::config::AppConfig;
use flag_forecaster::engine::ForecastEngine;
use flag_forecaster::pattern_log::PatternLog;
use flag_forecaster::provider::TaapiClient;

fn init_logging() {
    let path = std::env::var("LOG4RS_CONFIG").unwrap_or_else(|_| "log4rs.yaml".to_string());
    if let Err(e) = log4rs::init_file(&path, Default::default()) {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        log::warn!("log4rs config {} not loaded ({}), logging with env_logger", path, e);
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    init_logging();

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("{}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let provider = TaapiClient::from_config(&config).map_err(|e| {
        log::error!("{}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let state = web::Data::new(
        AppState::new(provider, ForecastEngine::default(), PatternLog::new(&config.pattern_log_path))
            .with_defaults(&config.default_interval, config.default_period),
    );
    let cors_origin = config.cors_origin.clone();
    let (host, port) = (config.host.clone(), config.port);

    log::info!("Starting server on http://{}:{}", host, port);
    log::info!("  GET  /health");
    log::info!("  GET  /symbols");
    log::info!("  POST /analyze");
    log::info!("  GET  /scan/{{asset}}/{{quote}}");
    log::info!("Flag detections are appended to {}", config.pattern_log_path);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&cors_origin)
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);
        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            .configure(api::configure::<TaapiClient>)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
