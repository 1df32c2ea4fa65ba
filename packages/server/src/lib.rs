#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for roadwatch.
//!
//! Accepts street images over HTTP, runs them through the detection
//! pipeline, and serves the stored issues and road health score. The
//! classifier provider and the issue store are chosen from the environment
//! at startup.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpResponse, HttpServer, error, middleware, web};
use roadwatch_pipeline::config::PipelineConfig;
use roadwatch_pipeline::detection::DetectionPipeline;
use roadwatch_server_models::ApiError;
use roadwatch_store::StoreError;
use roadwatch_vision::VisionError;
use roadwatch_vision::providers::{Classifier, create_classifier_from_env};
use thiserror::Error;

/// Largest accepted JSON body. Batches carry up to ten base64 images.
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or running the HTTP server failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The issue store could not be opened.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No usable vision provider is configured.
    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),
}

/// Shared application state.
pub struct AppState {
    /// Detection pipeline, which also owns the issue store.
    pub pipeline: Arc<DetectionPipeline>,
}

impl AppState {
    /// Builds state from the environment: store backend, vision provider,
    /// and pipeline settings.
    ///
    /// # Errors
    ///
    /// * [`ServerError::Store`] if the store cannot be opened
    /// * [`ServerError::Vision`] if no provider can be configured
    pub async fn from_env() -> Result<Self, ServerError> {
        let store = roadwatch_store::open_from_env().await?;
        let classifier: Arc<dyn Classifier> = Arc::from(create_classifier_from_env()?);
        let config = PipelineConfig::from_env();

        log::info!(
            "Pipeline: max batch {}, delay {:?}, confidence threshold {}",
            config.max_batch,
            config.inter_item_delay,
            config.confidence_threshold,
        );

        Ok(Self {
            pipeline: Arc::new(DetectionPipeline::new(classifier, store, config)),
        })
    }
}

/// JSON extractor settings: raised body limit, and malformed bodies are
/// answered with a `400` carrying an [`ApiError`].
#[must_use]
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, _req| {
            let response = HttpResponse::BadRequest().json(ApiError::new(err.to_string()));
            error::InternalError::from_response(err, response).into()
        })
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/detect")
                    .route("/analyze", web::post().to(handlers::analyze))
                    .route("/batch", web::post().to(handlers::batch)),
            )
            .service(
                web::scope("/issues")
                    .route("", web::get().to(handlers::list_issues))
                    .route("/stats/health", web::get().to(handlers::health_stats))
                    .route("/{id}/status", web::patch().to(handlers::update_status)),
            ),
    );
}

/// Starts the roadwatch API server.
///
/// Listens on `BIND_ADDR:PORT` (default `127.0.0.1:8080`). The caller
/// provides the async runtime and initializes logging.
///
/// # Errors
///
/// * [`ServerError::Store`] or [`ServerError::Vision`] if startup
///   configuration fails
/// * [`ServerError::Io`] if the server fails to bind or run
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), ServerError> {
    let state = web::Data::new(AppState::from_env().await?);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(json_config())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    Ok(())
}
