mod capture;
mod config;
mod data;
mod server;
mod telemetry;

use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing::info;

use crate::data::SharedHandState;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = config::ServiceConfig::from_args(&args)?;

    telemetry::init_tracing(config.verbose);
    let _ = telemetry::init_metrics_recorder();

    let shared: SharedHandState = Arc::new(Mutex::new(Vec::new()));

    let _capture = capture::spawn_capture_loop(config.clone(), shared.clone())
        .context("Failed to spawn capture thread")?;

    info!(
        "Serving hand landmarks on http://{}:{}/hand_landmarks",
        config.bind_addr, config.port
    );

    server::run_api_server(shared, &config)
}
