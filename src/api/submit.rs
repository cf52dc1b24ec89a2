use rocket::serde::json::Json;
use rocket::{State, post};

use crate::api::types::{RetryInfo, SubmitRequest, SubmitResponse};
use crate::coalescer::{Admission, Coalescer};
use crate::db::ConnectionPool;
use crate::error::Error;
use crate::variant_key::VariantKey;

/// `POST /submit`. Validates and canonicalizes the input, answers
/// from the cache on a hit, otherwise hands the key to the coalescer.
#[post("/submit", data = "<body>")]
pub async fn submit(
    body: Json<SubmitRequest>,
    pool: &State<ConnectionPool>,
    coalescer: &State<Coalescer>,
) -> Result<Json<SubmitResponse>, Error> {
    let key = VariantKey::canonicalize(&body.chrom, &body.pos, &body.reference, &body.alt)?;

    let pool = pool.inner().clone();
    let cache_key = key.clone();
    let cached = rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        crate::db::exists(&mut conn, cache_key.as_str())
    })
    .await
    .expect("cache lookup blocking task did not panic")?;

    if cached {
        return Ok(Json(SubmitResponse::Failure {
            variant_id: key.into_string(),
            message: "Variant already annotated".to_string(),
            retry_info: RetryInfo {
                current_retries: 0,
                max_retries: coalescer.retry_max(),
                exceeded_limit: false,
            },
        }));
    }

    let variant_id = key.as_str().to_string();
    match coalescer.submit(key).await {
        Admission::Queued { in_progress, attempts } => Ok(Json(SubmitResponse::Success {
            variant_id,
            message: if in_progress {
                "Variant already in progress".to_string()
            } else {
                "Variant queued for annotation".to_string()
            },
            retry_info: RetryInfo {
                current_retries: attempts,
                max_retries: coalescer.retry_max(),
                exceeded_limit: false,
            },
        })),
        Admission::RetryExceeded => Ok(Json(SubmitResponse::Failure {
            variant_id,
            message: "Variant exceeded retry limit".to_string(),
            retry_info: RetryInfo {
                current_retries: coalescer.retry_max(),
                max_retries: coalescer.retry_max(),
                exceeded_limit: true,
            },
        })),
    }
}
