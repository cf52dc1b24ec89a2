use rocket::serde::json::Json;
use rocket::{State, get};

use crate::api::types::{HealthResponse, StatisticsResponse};
use crate::coalescer::Coalescer;

/// `GET /health`.
#[get("/health")]
pub async fn health(coalescer: &State<Coalescer>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "variant-annotation-cache",
        in_progress_count: coalescer.in_progress_count().await,
    })
}

/// `GET /statistics`.
#[get("/statistics")]
pub async fn statistics(coalescer: &State<Coalescer>) -> Json<StatisticsResponse> {
    Json(StatisticsResponse {
        in_progress_count: coalescer.in_progress_count().await,
        batch_size_limit: coalescer.batch_max_size(),
        batch_time_limit: coalescer.batch_wait_seconds(),
        in_progress_variants: coalescer.in_progress_keys().await,
    })
}
