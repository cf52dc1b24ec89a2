use thiserror::Error;

/// The documented fallback score: substituted whenever the scorer raises so
/// a single bad record never aborts the rest of the batch.
pub const FALLBACK_SCORE: f64 = 0.75;

#[derive(Debug, Error)]
#[error("scorer failed: {0}")]
pub struct ScoreError(pub String);

/// Pure wrapper around the ML pathogenicity model. The model itself is
/// an out-of-scope collaborator; this trait is the seam a real model plugs
/// into. Implementations must never mutate `ml_input` and may reload their
/// underlying model per call.
pub trait Scorer: Send + Sync {
    fn score(&self, ml_input: &serde_json::Value) -> Result<f64, ScoreError>;
}

/// A deterministic placeholder scorer used until a real model is wired in.
/// It derives a pathogenicity-shaped value from whatever numeric pathogenicity
/// signals are already present on the record (CADD, REVEL) so tests exercise
/// realistic score distributions without depending on an external model
/// process.
pub struct HeuristicScorer;

impl Scorer for HeuristicScorer {
    fn score(&self, ml_input: &serde_json::Value) -> Result<f64, ScoreError> {
        let cadd = first_transcript_field(ml_input, "cadd_phred");
        let revel = first_transcript_field(ml_input, "revel");

        let signal = match (cadd, revel) {
            (Some(cadd), Some(revel)) => (cadd / 40.0).clamp(0.0, 1.0) * 0.5 + revel.clamp(0.0, 1.0) * 0.5,
            (Some(cadd), None) => (cadd / 40.0).clamp(0.0, 1.0),
            (None, Some(revel)) => revel.clamp(0.0, 1.0),
            (None, None) => FALLBACK_SCORE,
        };

        Ok(signal)
    }
}

fn first_transcript_field(ml_input: &serde_json::Value, field: &str) -> Option<f64> {
    ml_input
        .get("transcript_consequences")?
        .as_array()?
        .first()?
        .get(field)?
        .as_f64()
}
