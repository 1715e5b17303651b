pub mod handlers;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .route("/config", web::get().to(handlers::get_config))
            .route("/stats", web::get().to(handlers::get_stats))
            .route("/functions", web::post().to(handlers::create_function))
            .route("/functions", web::get().to(handlers::list_functions))
            .route("/functions/execute/{name}", web::post().to(handlers::execute_function))
            .route("/functions/{name}", web::get().to(handlers::get_function))
            .route("/functions/{name}", web::put().to(handlers::update_function))
            .route("/functions/{name}", web::delete().to(handlers::delete_function))
            .route(
                "/metrics/functions/{name}",
                web::get().to(handlers::get_function_metrics),
            )
            .route("/metrics/aggregated", web::get().to(handlers::get_aggregated_metrics))
            .route("/runtime/compare", web::get().to(handlers::compare_runtimes)),
    );
}
