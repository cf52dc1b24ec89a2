use rocket::serde::{Deserialize, Serialize};

use crate::db::AnnotationWithTranscripts;

/// `POST /submit` request body. Field names mirror the upstream VCF
/// vocabulary rather than the internal `VariantKey` representation.
#[derive(Debug, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct SubmitRequest {
    pub chrom: String,
    pub pos: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub alt: String,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct RetryInfo {
    pub current_retries: u32,
    pub max_retries: u32,
    pub exceeded_limit: bool,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde", tag = "status", rename_all = "lowercase")]
pub enum SubmitResponse {
    Success {
        variant_id: String,
        retry_info: RetryInfo,
        message: String,
    },
    Failure {
        variant_id: String,
        message: String,
        retry_info: RetryInfo,
    },
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde", tag = "status", rename_all = "snake_case")]
pub enum PollResponse {
    Completed {
        source: &'static str,
        annotation: AnnotationWithTranscripts,
    },
    Processing,
    Failed {
        retry_info: RetryInfo,
    },
    RetryAvailable,
    NotFound,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub in_progress_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StatisticsResponse {
    pub in_progress_count: usize,
    pub batch_size_limit: usize,
    pub batch_time_limit: f64,
    pub in_progress_variants: Vec<String>,
}
