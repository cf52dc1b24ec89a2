use diesel::prelude::*;
use serde::Serialize;

use super::schema::{annotations, transcripts};

/// The parent annotation row. `cadd`/`ml_score`/`allele_freq`/
/// `max_allele_freq` are `None` when the upstream never supplied them;
/// `gene`/`most_severe_consequence`/`omim`/`clinsig` default to empty string
/// rather than absent, per the parser contract.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationRecord {
    pub variant_key: String,
    pub gene: String,
    #[serde(rename = "CADD")]
    pub cadd: Option<f64>,
    #[serde(rename = "ML_score")]
    pub ml_score: Option<f64>,
    pub most_severe_consequence: String,
    #[serde(rename = "gnomAD AF")]
    pub allele_freq: Option<f64>,
    pub max_allele_freq: Option<f64>,
    #[serde(rename = "OMIM")]
    pub omim: String,
    #[serde(rename = "CLINSIG")]
    pub clinsig: String,
}

/// One transcript child row.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptRecord {
    pub transcript_id: String,
    pub polyphen: Option<f64>,
    pub protein_notation: String,
    #[serde(rename = "REVEL")]
    pub revel: Option<f64>,
    #[serde(rename = "Splice_AI")]
    pub splice_ai: Option<f64>,
    #[serde(rename = "Mane")]
    pub mane: bool,
    #[serde(rename = "LOFTEE")]
    pub loftee: String,
    pub impact: String,
    #[serde(rename = "GERP")]
    pub gerp: Option<f64>,
    pub cdna_notation: String,
    pub consequences: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationWithTranscripts {
    #[serde(flatten)]
    pub annotation: AnnotationRecord,
    pub transcripts: Vec<TranscriptRecord>,
}

#[derive(Insertable)]
#[diesel(table_name = annotations)]
pub(super) struct NewAnnotationRow<'a> {
    pub variant_key: &'a str,
    pub gene: &'a str,
    pub cadd: Option<f64>,
    pub ml_score: Option<f64>,
    pub most_severe_consequence: &'a str,
    pub allele_freq: Option<f64>,
    pub max_allele_freq: Option<f64>,
    pub omim: &'a str,
    pub clinsig: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = transcripts)]
pub(super) struct NewTranscriptRow<'a> {
    pub variant_key: &'a str,
    pub transcript_id: &'a str,
    pub polyphen: Option<f64>,
    pub protein_notation: &'a str,
    pub revel: Option<f64>,
    pub splice_ai: Option<f64>,
    pub mane: bool,
    pub loftee: &'a str,
    pub impact: &'a str,
    pub gerp: Option<f64>,
    pub cdna_notation: &'a str,
    pub consequences: &'a str,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = annotations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct AnnotationRow {
    pub variant_key: String,
    pub gene: String,
    pub cadd: Option<f64>,
    pub ml_score: Option<f64>,
    pub most_severe_consequence: String,
    pub allele_freq: Option<f64>,
    pub max_allele_freq: Option<f64>,
    pub omim: String,
    pub clinsig: String,
}

impl From<AnnotationRow> for AnnotationRecord {
    fn from(row: AnnotationRow) -> Self {
        Self {
            variant_key: row.variant_key,
            gene: row.gene,
            cadd: row.cadd,
            ml_score: row.ml_score,
            most_severe_consequence: row.most_severe_consequence,
            allele_freq: row.allele_freq,
            max_allele_freq: row.max_allele_freq,
            omim: row.omim,
            clinsig: row.clinsig,
        }
    }
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = transcripts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct TranscriptRow {
    pub id: i64,
    pub variant_key: String,
    pub transcript_id: String,
    pub polyphen: Option<f64>,
    pub protein_notation: String,
    pub revel: Option<f64>,
    pub splice_ai: Option<f64>,
    pub mane: bool,
    pub loftee: String,
    pub impact: String,
    pub gerp: Option<f64>,
    pub cdna_notation: String,
    pub consequences: String,
}

impl From<TranscriptRow> for TranscriptRecord {
    fn from(row: TranscriptRow) -> Self {
        Self {
            transcript_id: row.transcript_id,
            polyphen: row.polyphen,
            protein_notation: row.protein_notation,
            revel: row.revel,
            splice_ai: row.splice_ai,
            mane: row.mane,
            loftee: row.loftee,
            impact: row.impact,
            gerp: row.gerp,
            cdna_notation: row.cdna_notation,
            consequences: row.consequences,
        }
    }
}
