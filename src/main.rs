#![recursion_limit = "256"]

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::{info, Level};
use tracing_subscriber;

mod api;
mod comparator;
mod config;
mod engine;
mod error;
mod executor;
mod functions;
mod metrics;
mod models;
mod pool;
mod registry;
mod state;
#[cfg(test)]
mod test_support;

use config::Config;
use engine::DockerEngine;
use metrics::MetricsStore;
use pool::WarmPool;
use state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting sandbox platform");

    let config = Config::from_env().expect("failed to load configuration");
    info!("configuration loaded");

    let engine: Arc<dyn engine::ContainerEngine> = Arc::new(
        DockerEngine::new(&config)
            .await
            .expect("failed to initialize container engine"),
    );
    info!("container engine connected");

    let pool = Arc::new(WarmPool::new(engine.clone(), config.clone()));
    let metrics = Arc::new(MetricsStore::new());

    if config.pool_sweep_interval_secs > 0 {
        let sweep_pool = pool.clone();
        let interval = std::time::Duration::from_secs(config.pool_sweep_interval_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                sweep_pool.sweep_idle().await;
            }
        });
    }

    let app_state = web::Data::new(AppState::new(config.clone(), engine, pool, metrics));

    let bind_addr = format!("{}:{}", config.host, config.port);
    info!("starting HTTP server on {}", bind_addr);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(api::configure_routes)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
