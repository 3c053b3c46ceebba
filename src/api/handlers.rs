//! API Handlers
//!
//! HTTP request handlers for each resource cache endpoint.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::behavior::{BehaviorRecorder, Predictor};
use crate::cache::CacheEngine;
use crate::error::{CacheError, Result};
use crate::models::{
    ClearResponse, HealthResponse, InvalidateResponse, MessageResponse, NavigateRequest,
    NavigateResponse, PredictionsQuery, PredictionsResponse, PutQuery, RecordEventRequest,
    ResolveQuery, StatsResponse,
};
use crate::prefetch::{PrefetchOptions, PrefetchScheduler};

/// Header naming where a resolved payload came from.
pub const CACHE_SOURCE_HEADER: &str = "x-cache-source";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: CacheEngine,
    pub recorder: Arc<BehaviorRecorder>,
    pub predictor: Predictor,
    pub scheduler: Arc<PrefetchScheduler>,
}

impl AppState {
    /// Wires the predictor and prefetch scheduler around an engine and a
    /// recorder.
    pub fn new(
        engine: CacheEngine,
        recorder: Arc<BehaviorRecorder>,
        prefetch: PrefetchOptions,
    ) -> Self {
        let predictor = Predictor::new(recorder.clone());
        let scheduler = Arc::new(PrefetchScheduler::new(
            engine.clone(),
            predictor.clone(),
            prefetch,
        ));
        Self {
            engine,
            recorder,
            predictor,
            scheduler,
        }
    }
}

/// Wildcard captures lose their leading slash; resource keys keep it.
fn resource_key(captured: String) -> String {
    if captured.starts_with('/') {
        captured
    } else {
        format!("/{}", captured)
    }
}

fn octet_stream(payload: Bytes) -> Response {
    (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        )],
        payload,
    )
        .into_response()
}

/// Handler for GET /resolve/*key
///
/// Resolves a resource through its strategy and returns the raw payload.
pub async fn resolve_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Response> {
    let key = resource_key(key);
    let resolved = state
        .engine
        .resolve(&key, query.strategy.as_deref())
        .await?;

    let mut response = octet_stream(resolved.payload);
    response.headers_mut().insert(
        CACHE_SOURCE_HEADER,
        HeaderValue::from_static(resolved.source.as_str()),
    );
    Ok(response)
}

/// Handler for GET /entries/*key
///
/// Reads a cached payload without dispatch or network access.
pub async fn get_entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Response {
    let key = resource_key(key);
    match state.engine.get(&key) {
        Some(payload) => octet_stream(payload),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("{} is not cached", key) })),
        )
            .into_response(),
    }
}

/// Handler for PUT /entries/*key?strategy=name
///
/// Stores the request body in the named strategy's bucket.
pub async fn put_entry_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<PutQuery>,
    body: Bytes,
) -> Result<Json<MessageResponse>> {
    let key = resource_key(key);
    state.engine.put(&key, body, &query.strategy).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} stored under {}",
        key, query.strategy
    ))))
}

/// Handler for DELETE /entries/*key
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    let key = resource_key(key);
    let removed = state.engine.invalidate(&key).await?;
    Ok(Json(InvalidateResponse { key, removed }))
}

/// Handler for DELETE /entries
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    let cleared = state.engine.clear_all().await;
    Json(ClearResponse { cleared })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.engine.snapshot(),
        state.scheduler.stats(),
    ))
}

/// Handler for DELETE /stats
pub async fn reset_stats_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.engine.reset_stats();
    Json(MessageResponse::new("stats reset"))
}

/// Handler for POST /events
///
/// Records one navigation event.
pub async fn record_event_handler(
    State(state): State<AppState>,
    Json(req): Json<RecordEventRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    state
        .recorder
        .record(&req.resource_key, &req.session_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("event recorded")),
    ))
}

/// Handler for POST /navigate
///
/// Schedules prefetches for the resources predicted to follow.
pub async fn navigate_handler(
    State(state): State<AppState>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<NavigateResponse>> {
    if req.resource_key.is_empty() {
        return Err(CacheError::InvalidRequest(
            "resource_key cannot be empty".to_string(),
        ));
    }

    let scheduled = state.scheduler.on_navigate(&req.resource_key).await;
    Ok(Json(NavigateResponse {
        resource_key: req.resource_key,
        scheduled,
    }))
}

/// Handler for GET /predictions/*key?limit=n
pub async fn predictions_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(query): Query<PredictionsQuery>,
) -> Json<PredictionsResponse> {
    let key = resource_key(key);
    let predictions = state.predictor.predict_next(&key, query.limit).await;
    Json(PredictionsResponse {
        resource_key: key,
        predictions,
    })
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::new(state.engine.is_degraded()))
}
