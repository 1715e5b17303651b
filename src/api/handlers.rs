use actix_web::{web, HttpResponse, ResponseError, Result};
use serde::Deserialize;
use tracing::{error, info};
use validator::Validate;

use crate::comparator::RuntimeComparator;
use crate::error::PlatformError;
use crate::metrics::TimeWindow;
use crate::models::{ExecuteRequest, ExecuteResponse, FunctionCreate, IsolationRuntime};
use crate::state::AppState;

pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let stats = state.get_stats().await;

    let engine_status = match state.engine.health_check().await {
        Ok(version) => version,
        Err(e) => format!("unavailable: {}", e),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.uptime_seconds(),
        "active_executions": stats.active_executions,
        "total_executions": stats.total_executions,
        "engine_status": engine_status,
    })))
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "supported_languages": ["python", "javascript"],
        "isolation_runtimes": ["default", "hardened"],
        "max_memory_mb": state.config.max_memory_mb,
        "max_cpu_quota": state.config.max_cpu_quota,
        "max_concurrent_executions": state.config.max_concurrent_executions,
        "pool_enabled": state.config.pool_enabled,
        "rate_limit_per_minute": state.config.rate_limit_per_minute,
    })))
}

pub async fn get_stats(state: web::Data<AppState>) -> Result<HttpResponse> {
    let stats = state.get_stats().await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "total_executions": stats.total_executions,
        "active_executions": stats.active_executions,
        "successful_executions": stats.successful_executions,
        "failed_executions": stats.failed_executions,
        "timeout_executions": stats.timeout_executions,
        "uptime_seconds": state.uptime_seconds(),
        "success_rate": if stats.total_executions > 0 {
            stats.successful_executions as f64 / stats.total_executions as f64 * 100.0
        } else {
            0.0
        },
    })))
}

// --- Function CRUD ---------------------------------------------------

pub async fn create_function(
    state: web::Data<AppState>,
    req: web::Json<FunctionCreate>,
) -> Result<HttpResponse> {
    if let Err(e) = req.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "ValidationError",
            "message": e.to_string(),
        })));
    }

    match state.functions.create(req.into_inner()).await {
        Ok(record) => Ok(HttpResponse::Created().json(record)),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn list_functions(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.functions.list().await))
}

pub async fn get_function(state: web::Data<AppState>, name: web::Path<String>) -> Result<HttpResponse> {
    match state.functions.get(&name).await {
        Ok(record) => Ok(HttpResponse::Ok().json(record)),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn update_function(
    state: web::Data<AppState>,
    name: web::Path<String>,
    req: web::Json<FunctionCreate>,
) -> Result<HttpResponse> {
    if let Err(e) = req.validate() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "ValidationError",
            "message": e.to_string(),
        })));
    }

    match state.functions.update(&name, req.into_inner()).await {
        Ok(record) => Ok(HttpResponse::Ok().json(record)),
        Err(e) => Ok(e.error_response()),
    }
}

pub async fn delete_function(state: web::Data<AppState>, name: web::Path<String>) -> Result<HttpResponse> {
    match state.functions.delete(&name).await {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({"message": "Function deleted"}))),
        Err(e) => Ok(e.error_response()),
    }
}

// --- Execution ---------------------------------------------------------

pub async fn execute_function(
    state: web::Data<AppState>,
    name: web::Path<String>,
    body: Option<web::Json<ExecuteRequest>>,
) -> Result<HttpResponse> {
    if state.rate_limiter.check().is_err() {
        return Ok(PlatformError::RateLimitExceeded.error_response());
    }

    let function = match state.functions.get(&name).await {
        Ok(f) => f,
        Err(e) => return Ok(e.error_response()),
    };

    let request = body.map(|b| b.into_inner()).unwrap_or_default();
    let runtime = match request.runtime.as_deref() {
        Some(tag) => match IsolationRuntime::from_str(tag) {
            Ok(r) => r,
            Err(msg) => {
                return Ok(PlatformError::InvalidInput(msg).error_response());
            }
        },
        None => IsolationRuntime::Default,
    };
    let warm_start = request.warm_start.unwrap_or(true);

    let stats = state.get_stats().await;
    if stats.active_executions >= state.config.max_concurrent_executions {
        return Ok(PlatformError::InvalidInput(format!(
            "maximum concurrent executions ({}) reached",
            state.config.max_concurrent_executions
        ))
        .error_response());
    }

    state.increment_executions().await;
    let result = state.executor.execute(&function, runtime, warm_start).await;
    state.decrement_active_executions().await;
    state.record_outcome(result.status).await;

    info!(
        "execution for {} finished: status={:?}",
        function.name, result.status
    );

    let response = ExecuteResponse {
        function_name: function.name.clone(),
        language: function.language.clone(),
        runtime: runtime.tag().to_string(),
        result,
    };

    Ok(HttpResponse::Ok().json(response))
}

// --- Metrics -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct MetricsListQuery {
    limit: Option<usize>,
}

pub async fn get_function_metrics(
    state: web::Data<AppState>,
    name: web::Path<String>,
    query: web::Query<MetricsListQuery>,
) -> Result<HttpResponse> {
    if state.functions.get(&name).await.is_err() {
        return Ok(PlatformError::NotFound(name.to_string()).error_response());
    }

    let limit = query.limit.unwrap_or(100).clamp(1, 1000);
    Ok(HttpResponse::Ok().json(state.metrics.list(&name, limit).await))
}

#[derive(Debug, Deserialize)]
pub struct AggregatedQuery {
    function_name: Option<String>,
    time_range: Option<String>,
}

pub async fn get_aggregated_metrics(
    state: web::Data<AppState>,
    query: web::Query<AggregatedQuery>,
) -> Result<HttpResponse> {
    if let Some(ref name) = query.function_name {
        if state.functions.get(name).await.is_err() {
            return Ok(PlatformError::NotFound(name.clone()).error_response());
        }
    }

    let window = match TimeWindow::from_str(query.time_range.as_deref().unwrap_or("24h")) {
        Ok(w) => w,
        Err(msg) => return Ok(PlatformError::InvalidInput(msg).error_response()),
    };

    let aggregated = state
        .metrics
        .aggregate(query.function_name.as_deref(), window)
        .await;
    Ok(HttpResponse::Ok().json(aggregated))
}

// --- Runtime comparison --------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    function_name: String,
    iterations: Option<u32>,
}

pub async fn compare_runtimes(
    state: web::Data<AppState>,
    query: web::Query<CompareQuery>,
) -> Result<HttpResponse> {
    let function = match state.functions.get(&query.function_name).await {
        Ok(f) => f,
        Err(e) => return Ok(e.error_response()),
    };

    let iterations = query.iterations.unwrap_or(5).clamp(1, 20);

    let comparator = RuntimeComparator::new(&state.executor);
    let result = comparator.compare(&function, iterations).await;

    Ok(HttpResponse::Ok().json(result))
}
