//! Actix Web endpoint serving the latest hand landmarks.
//!
//! Handlers only read the shared state cell; they never see camera or
//! model failures and always answer `200 OK`.

use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};

use crate::{
    config::ServiceConfig,
    data::{LandmarksResponse, SharedHandState},
    telemetry,
};

/// Shared state backing HTTP handlers.
pub(crate) struct ServerState {
    pub(crate) latest: SharedHandState,
}

/// Run the HTTP endpoint on the calling thread until the process stops.
pub(crate) fn run_api_server(shared: SharedHandState, config: &ServiceConfig) -> Result<()> {
    let bind_addr = config.bind_addr.clone();
    let port = config.port;
    actix_web::rt::System::new()
        .block_on(async move {
            HttpServer::new(move || {
                App::new()
                    .app_data(web::Data::new(ServerState {
                        latest: shared.clone(),
                    }))
                    .route("/hand_landmarks", web::get().to(hand_landmarks_handler))
                    .route("/metrics", web::get().to(metrics_handler))
            })
            .bind((bind_addr.as_str(), port))?
            .run()
            .await
        })
        .context("HTTP server terminated abnormally")
}

/// Return the most recent landmark set; an empty array before any detection.
async fn hand_landmarks_handler(state: web::Data<ServerState>) -> HttpResponse {
    let guard = state
        .latest
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    HttpResponse::Ok().json(LandmarksResponse { landmarks: &guard })
}

/// Prometheus text exposition of the process metrics.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::ServiceUnavailable().finish(),
    }
}
