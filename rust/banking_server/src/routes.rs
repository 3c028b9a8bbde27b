use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use common::{
    DefaultRiskResponse, HealthResponse, InfoResponse, RecommendRequest, RecommendResponse,
    SegmentResponse,
};
use serde_json::{json, Map, Value};
use std::sync::{atomic::Ordering, Arc};
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::banking;
use crate::error::{AppError, InferenceError};
use crate::features::FeatureRow;
use crate::state::AppState;

pub const SERVICE_NAME: &str = "Banking ML APIs";
const RUNTIME_VERSION: &str = "2.0.0-rc.10";

/// Run a model call off the async workers; ONNX sessions block while held.
async fn run_model<T, F>(call: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, InferenceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| AppError::Internal(format!("inference task failed: {}", e)))?
        .map_err(AppError::from)
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/info", get(info_handler))
        .route("/predict-loan-default", post(predict_loan_default))
        .route("/segment-customer", post(segment_customer))
        .route("/recommend-products", post(recommend_products))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": SERVICE_NAME,
        "status": "running",
        "endpoints": {
            "health": "/health",
            "info": "/info",
            "predict_loan_default": "/predict-loan-default (POST)",
            "segment_customer": "/segment-customer (POST)",
            "recommend_products": "/recommend-products (POST)"
        }
    }))
}

async fn health(State(_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        models_loaded: true,
    })
}

async fn info_handler(State(state): State<Arc<AppState>>) -> Result<Json<InfoResponse>, AppError> {
    let mut system = state.system.lock().await;
    system.refresh_all();

    let pid = sysinfo::get_current_pid().map_err(|e| AppError::Internal(e.to_string()))?;
    let (memory_rss_mb, cpu_percent) = system
        .process(pid)
        .map(|process| (process.memory() as f64 / 1024.0 / 1024.0, process.cpu_usage()))
        .unwrap_or((0.0, 0.0));

    let cpu_count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    Ok(Json(InfoResponse {
        framework: "onnx-rust".to_string(),
        service: SERVICE_NAME.to_string(),
        models: state.models.artifacts.clone(),
        model_load_time_ms: state.models.load_time_ms,
        total_requests: state.total_requests.load(Ordering::Relaxed),
        runtime_version: RUNTIME_VERSION.to_string(),
        cpu_count,
        memory_rss_mb,
        cpu_percent,
    }))
}

async fn predict_loan_default(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<DefaultRiskResponse>, AppError> {
    let Json(record) = payload?;
    debug!("Loan default request with {} fields", record.len());

    let row = FeatureRow::from_record(&record)?;
    let scorer = Arc::clone(&state.models.scorer);
    let probabilities = run_model(move || scorer.predict_proba(&row)).await?;
    let probability = probabilities.get(1).copied().ok_or_else(|| {
        InferenceError::Output(format!(
            "expected a positive-class probability, got {} columns",
            probabilities.len()
        ))
    })?;

    state.total_requests.fetch_add(1, Ordering::Relaxed);

    Ok(Json(banking::assess(probability)))
}

async fn segment_customer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<SegmentResponse>, AppError> {
    let Json(record) = payload?;

    // Raw values go straight to the assigner; only /recommend-products scales.
    let row = FeatureRow::from_record(&record)?;
    let assigner = Arc::clone(&state.models.assigner);
    let cluster = run_model(move || assigner.assign(&row)).await?;

    state.total_requests.fetch_add(1, Ordering::Relaxed);

    Ok(Json(SegmentResponse { cluster }))
}

async fn recommend_products(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecommendRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, AppError> {
    let Json(request) = payload?;

    let row = FeatureRow::from_values(&RecommendRequest::FEATURES, &request.values());
    let scaler = Arc::clone(&state.models.scaler);
    let assigner = Arc::clone(&state.models.assigner);
    let cluster = run_model(move || {
        let scaled = scaler.transform(&row)?;
        assigner.assign(&scaled)
    })
    .await?;
    let products = banking::products_for(cluster).ok_or(AppError::UnmappedCluster(cluster))?;

    state.total_requests.fetch_add(1, Ordering::Relaxed);

    Ok(Json(RecommendResponse {
        cluster,
        recommended_products: products.iter().map(|p| p.to_string()).collect(),
    }))
}
