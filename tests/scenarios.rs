mod common;

use std::time::Duration;

use diesel::Connection;
use diesel::pg::PgConnection;
use rocket::http::Status;
use serde_json::{Value, json};
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use common::{client_for, test_config};
use variant_annotation_cache::db::{AnnotationRecord, AnnotationWithTranscripts};

fn submit_body(chrom: &str, pos: &str, reference: &str, alt: &str) -> Value {
    json!({ "chrom": chrom, "pos": pos, "ref": reference, "alt": alt })
}

fn seed_annotation(database_url: &str, key: &str) {
    let mut conn = PgConnection::establish(database_url).unwrap();
    let record = AnnotationWithTranscripts {
        annotation: AnnotationRecord {
            variant_key: key.to_string(),
            gene: "BRCA2".to_string(),
            cadd: Some(25.0),
            ml_score: Some(0.9),
            most_severe_consequence: "missense_variant".to_string(),
            allele_freq: Some(0.001),
            max_allele_freq: Some(0.002),
            omim: "600185".to_string(),
            clinsig: "pathogenic".to_string(),
        },
        transcripts: vec![],
    };
    variant_annotation_cache::db::bulk_upsert(&mut conn, std::slice::from_ref(&record)).unwrap();
}

fn read_cached(database_url: &str, key: &str) -> Option<AnnotationWithTranscripts> {
    let mut conn = PgConnection::establish(database_url).unwrap();
    variant_annotation_cache::db::read(&mut conn, key).unwrap()
}

/// Echoes each requested variant region back as an upstream record carrying
/// the same region in its `input` field (so the parser can recover the
/// variant key) plus one transcript, so batches round-trip all the way
/// through to the cache instead of being silently dropped as unparseable.
struct EchoUpstream;

impl Respond for EchoUpstream {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let records: Vec<Value> = body["variants"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|variant| {
                let input = variant.as_str().unwrap_or_default().to_string();
                let seq_region_name = input.split_whitespace().next().unwrap_or_default().to_string();
                json!({
                    "input": input,
                    "seq_region_name": seq_region_name,
                    "most_severe_consequence": "missense_variant",
                    "transcript_consequences": [
                        {
                            "transcript_id": "ENST00000000001",
                            "gene_symbol": "TESTGENE",
                            "cadd_phred": 15.0,
                            "impact": "MODERATE",
                        }
                    ],
                })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(records)
    }
}

async fn echo_upstream() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(EchoUpstream).mount(&server).await;
    server
}

/// S1: a pre-seeded key answers from the cache without touching upstream.
#[tokio::test]
async fn cache_hit_short_circuits_submission() {
    let config = test_config("http://127.0.0.1:1/unused".to_string());
    common::reset_database(&config);
    seed_annotation(&config.postgres_url(), "chr2:162279995:C>G");

    let client = client_for(config).await;

    let response = client
        .post("/submit")
        .json(&submit_body("chr2", "162279995", "C", "G"))
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().await.unwrap();
    assert_eq!(body["status"], "failure");
    assert!(body["message"].as_str().unwrap().contains("already annotated"));

    let poll = client.get("/poll/chr2:162279995:C>G").dispatch().await;
    assert_eq!(poll.status(), Status::Ok);
    let poll_body: Value = poll.into_json().await.unwrap();
    assert_eq!(poll_body["status"], "completed");
}

/// S5: submitting the same key twice before the batch dispatches returns
/// "already in progress" the second time, the batch completes through a
/// real upstream round-trip, and exactly one cache row (with exactly one
/// transcript, not a duplicated pair) lands for that key.
#[tokio::test]
async fn duplicate_submission_is_deduplicated() {
    let upstream = echo_upstream().await;
    let config = test_config(upstream.uri());
    let wait = config.batch_wait_seconds;
    let database_url = config.postgres_url();
    let client = client_for(config).await;

    let first = client
        .post("/submit")
        .json(&submit_body("chr1", "100", "A", "G"))
        .dispatch()
        .await;
    let first_body: Value = first.into_json().await.unwrap();
    assert_eq!(first_body["status"], "success");

    let second = client
        .post("/submit")
        .json(&submit_body("chr1", "100", "A", "G"))
        .dispatch()
        .await;
    let second_body: Value = second.into_json().await.unwrap();
    assert_eq!(second_body["status"], "success");
    assert!(second_body["message"].as_str().unwrap().contains("already in progress"));

    tokio::time::sleep(Duration::from_secs_f64(wait * 3.0)).await;

    let poll = client.get("/poll/chr1:100:A>G").dispatch().await;
    let poll_body: Value = poll.into_json().await.unwrap();
    assert_eq!(poll_body["status"], "completed");

    let cached = read_cached(&database_url, "chr1:100:A>G").expect("key should be cached");
    assert_eq!(cached.transcripts.len(), 1);
}

/// S6: malformed chromosome / base inputs are rejected with 400.
#[tokio::test]
async fn invalid_input_is_rejected() {
    let config = test_config("http://127.0.0.1:1/unused".to_string());
    let client = client_for(config).await;

    let bad_chrom = client
        .post("/submit")
        .json(&submit_body("chr24", "1", "A", "G"))
        .dispatch()
        .await;
    assert_eq!(bad_chrom.status(), Status::BadRequest);

    let bad_base = client
        .post("/submit")
        .json(&submit_body("chr1", "1", "A", "X"))
        .dispatch()
        .await;
    assert_eq!(bad_base.status(), Status::BadRequest);
}

/// S4: a batch that always fails upstream exhausts the retry ceiling and the
/// key is reported as permanently failed.
#[tokio::test]
async fn retry_exhaustion_marks_key_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = test_config(server.uri());
    let retry_max = config.retry_max;
    let wait = config.batch_wait_seconds;
    let client = client_for(config).await;

    client
        .post("/submit")
        .json(&submit_body("chr3", "500", "A", "T"))
        .dispatch()
        .await;

    for _ in 0..retry_max {
        tokio::time::sleep(std::time::Duration::from_secs_f64(wait * 3.0)).await;
        client
            .post("/submit")
            .json(&submit_body("chr3", "500", "A", "T"))
            .dispatch()
            .await;
    }
    tokio::time::sleep(std::time::Duration::from_secs_f64(wait * 3.0)).await;

    let poll = client.get("/poll/chr3:500:A>T").dispatch().await;
    let poll_body: Value = poll.into_json().await.unwrap();
    assert!(poll_body["status"] == "failed" || poll_body["retry_info"]["exceeded_limit"] == true);
}

/// S2 (scaled to the test `batch_max_size` of 3): submitting `B_max`
/// distinct variants in one burst dispatches exactly one batch, the batch
/// round-trips through a real upstream stub, and every one of the `B_max`
/// keys lands as a completed, cached annotation.
#[tokio::test]
async fn size_trigger_dispatches_one_batch() {
    let upstream = echo_upstream().await;
    let config = test_config(upstream.uri());
    let batch_max = config.batch_max_size;
    let database_url = config.postgres_url();
    let client = client_for(config).await;

    let mut keys = Vec::with_capacity(batch_max);
    for i in 0..batch_max {
        let pos = (200 + i).to_string();
        client
            .post("/submit")
            .json(&submit_body("chr1", &pos, "A", "G"))
            .dispatch()
            .await;
        keys.push(format!("chr1:{pos}:A>G"));
    }

    tokio::time::sleep(Duration::from_millis(300)).await;

    let stats = client.get("/statistics").dispatch().await;
    let stats_body: Value = stats.into_json().await.unwrap();
    assert_eq!(stats_body["in_progress_count"], 0);

    assert_eq!(upstream.received_requests().await.unwrap().len(), 1);

    for key in &keys {
        let cached = read_cached(&database_url, key);
        assert!(cached.is_some(), "expected {key} to be cached after the batch completed");

        let poll = client.get(format!("/poll/{key}")).dispatch().await;
        let poll_body: Value = poll.into_json().await.unwrap();
        assert_eq!(poll_body["status"], "completed");
    }
}
