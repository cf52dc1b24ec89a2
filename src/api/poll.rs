use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{State, get};

use crate::api::types::{PollResponse, RetryInfo};
use crate::coalescer::Coalescer;
use crate::db::ConnectionPool;
use crate::error::Error;
use crate::variant_key::VariantKey;

/// `GET /poll/<variant_id>`. `variant_id` is the canonical
/// `chrom:pos:ref>alt` key as returned by `submit`, taken verbatim.
#[get("/poll/<variant_id>")]
pub async fn poll(
    variant_id: &str,
    pool: &State<ConnectionPool>,
    coalescer: &State<Coalescer>,
) -> Result<Custom<Json<PollResponse>>, Error> {
    let key = match parse_opaque_key(variant_id) {
        Some(key) => key,
        None => return Ok(not_found()),
    };

    let pool = pool.inner().clone();
    let read_key = key.clone();
    let cached = rocket::tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        crate::db::read(&mut conn, read_key.as_str())
    })
    .await
    .expect("cache read blocking task did not panic")?;

    if let Some(annotation) = cached {
        return Ok(Custom(
            Status::Ok,
            Json(PollResponse::Completed {
                source: "cache",
                annotation,
            }),
        ));
    }

    let (in_flight, attempts) = coalescer.status(&key).await;
    if in_flight {
        return Ok(Custom(Status::Accepted, Json(PollResponse::Processing)));
    }

    let retry_max = coalescer.retry_max();
    if attempts >= retry_max {
        return Ok(Custom(
            Status::Ok,
            Json(PollResponse::Failed {
                retry_info: RetryInfo {
                    current_retries: attempts,
                    max_retries: retry_max,
                    exceeded_limit: true,
                },
            }),
        ));
    }

    if attempts > 0 {
        return Ok(Custom(Status::NotFound, Json(PollResponse::RetryAvailable)));
    }

    Ok(not_found())
}

fn not_found() -> Custom<Json<PollResponse>> {
    Custom(Status::NotFound, Json(PollResponse::NotFound))
}

/// The key is already canonical by construction, so parsing here is just a
/// structural sanity check (three fields, valid position) rather than a
/// second pass through `VariantKey::canonicalize`'s regex validation.
fn parse_opaque_key(raw: &str) -> Option<VariantKey> {
    let (chrom, rest) = raw.split_once(':')?;
    let (pos, alleles) = rest.split_once(':')?;
    let (reference, alt) = alleles.split_once('>')?;
    VariantKey::canonicalize(chrom, pos, reference, alt).ok()
}
