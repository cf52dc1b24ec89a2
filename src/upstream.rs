use std::time::Duration;

use log::debug;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::variant_key::VariantKey;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("error building upstream request")]
    RequestBuild(#[source] reqwest::Error),

    #[error("error executing upstream request")]
    RequestExecute(#[source] reqwest::Error),

    #[error("upstream returned a non-success status")]
    Status(#[source] reqwest::Error),

    #[error("error reading upstream response body")]
    ResponseBody(#[source] reqwest::Error),

    #[error("error deserializing upstream response")]
    Deserialize(#[source] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct AnnotationRequest<'a> {
    variants: &'a [String],
    #[serde(rename = "REVEL")]
    revel: bool,
    #[serde(rename = "CADD")]
    cadd: bool,
    #[serde(rename = "SpliceAI")]
    splice_ai: bool,
    protein: bool,
    gencode_basic: bool,
    #[serde(rename = "LoF")]
    lof: bool,
    mane: bool,
    hgvs: bool,
    #[serde(rename = "dbNSFP")]
    db_nsfp: &'static str,
}

impl<'a> AnnotationRequest<'a> {
    fn new(variants: &'a [String]) -> Self {
        Self {
            variants,
            revel: true,
            cadd: true,
            splice_ai: true,
            protein: true,
            gencode_basic: true,
            lof: true,
            mane: true,
            hgvs: true,
            db_nsfp: "clinvar_OMIM_id,GERP++_RS",
        }
    }
}

/// Thin client over the opaque batch annotation endpoint.
pub struct UpstreamClient {
    client: reqwest::Client,
    url: String,
}

impl UpstreamClient {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client configuration is valid");
        Self { client, url }
    }

    /// One POST per batch. Returns one JSON record per input variant,
    /// in request order, or an `UpstreamError` that fails the whole batch.
    pub async fn annotate(&self, keys: &[VariantKey]) -> Result<Vec<Value>, UpstreamError> {
        let regions: Vec<String> = keys.iter().map(|key| region_for_key(key)).collect();
        let payload = AnnotationRequest::new(&regions);

        debug!("Dispatching batch of {} variants to upstream", regions.len());

        let request = self
            .client
            .post(&self.url)
            .json(&payload)
            .build()
            .map_err(UpstreamError::RequestBuild)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(UpstreamError::RequestExecute)?
            .error_for_status()
            .map_err(UpstreamError::Status)?;

        let body = response.text().await.map_err(UpstreamError::ResponseBody)?;
        serde_json::from_str(&body).map_err(UpstreamError::Deserialize)
    }
}

/// Region encoding, keyed off the already-validated, already-canonical
/// variant key rather than re-parsing client input.
fn region_for_key(key: &VariantKey) -> String {
    let (chrom, rest) = key.as_str().split_once(':').expect("key always has chrom:pos:ref>alt shape");
    let (pos, alleles) = rest.split_once(':').expect("key always has chrom:pos:ref>alt shape");
    let (reference, alt) = alleles.split_once('>').expect("key always has chrom:pos:ref>alt shape");
    let pos: u64 = pos.parse().expect("key position is always a valid integer");

    let end = if reference.len() == 1 && alt.len() == 1 {
        pos
    } else if alt.len() > reference.len() {
        pos
    } else {
        pos + reference.len() as u64 - 1
    };

    format!("{chrom} {pos} {end} {reference}/{alt} +")
}
