use serde_json::Value;
use strum::{AsRefStr, EnumString};
use thiserror::Error;

use crate::db::{AnnotationRecord, AnnotationWithTranscripts, TranscriptRecord};
use crate::scorer::{FALLBACK_SCORE, Scorer};
use crate::variant_key::VariantKey;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("upstream record has no usable variant key")]
    MissingVariantKey,
}

/// `impact` enum. Anything that doesn't match one of these four
/// variants is normalized to empty string by `validate_impact`, never
/// propagated as an unknown value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
enum Impact {
    High,
    Moderate,
    Low,
    Modifier,
}

/// `LOFTEE` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr)]
#[strum(ascii_case_insensitive)]
enum Loftee {
    #[strum(serialize = "HC")]
    Hc,
    #[strum(serialize = "LC")]
    Lc,
}

fn validate_impact(raw: &str) -> String {
    raw.parse::<Impact>()
        .map(|value| value.as_ref().to_string())
        .unwrap_or_default()
}

fn validate_loftee(raw: &str) -> String {
    raw.parse::<Loftee>()
        .map(|value| value.as_ref().to_string())
        .unwrap_or_default()
}

struct ColocatedData {
    gnomad_af: Option<f64>,
    max_allele_freq: Option<f64>,
    clin_sig: Option<String>,
}

/// Iterates colocated variants, taking the first entry's frequency map
/// and the first entry's `clin_sig`, independently (a variant can carry one
/// without the other).
fn extract_colocated_variants_data(record: &Value) -> ColocatedData {
    let mut result = ColocatedData {
        gnomad_af: None,
        max_allele_freq: None,
        clin_sig: None,
    };

    let Some(colocated) = record.get("colocated_variants").and_then(Value::as_array) else {
        return result;
    };

    let mut found_freq = false;
    let mut found_clin = false;

    for entry in colocated {
        if !found_freq {
            if let Some(frequencies) = entry.get("frequencies").and_then(Value::as_object) {
                if let Some(freq_map) = frequencies.values().next().and_then(Value::as_object) {
                    result.gnomad_af = freq_map
                        .get("gnomadg")
                        .and_then(Value::as_f64)
                        .or_else(|| freq_map.get("af").and_then(Value::as_f64));
                    result.max_allele_freq = max_frequency(freq_map);
                    found_freq = true;
                }
            }
        }

        if !found_clin {
            if let Some(clin_sig) = entry.get("clin_sig") {
                result.clin_sig = clin_sig_to_string(clin_sig);
                found_clin = true;
            }
        }

        if found_freq && found_clin {
            break;
        }
    }

    result
}

fn clin_sig_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn max_frequency(freq_map: &serde_json::Map<String, Value>) -> Option<f64> {
    freq_map
        .values()
        .filter_map(Value::as_f64)
        .fold(None, |acc, value| Some(acc.map_or(value, |a: f64| a.max(value))))
}

fn extract_clinvar_omim_id(record: &Value) -> Option<String> {
    record
        .get("transcript_consequences")?
        .as_array()?
        .iter()
        .find_map(|transcript| {
            transcript
                .get("clinvar_omim_id")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
}

/// OMIM is the first non-empty id across transcripts, `&`-split and
/// rejoined as a comma-separated list.
fn extract_omim(record: &Value) -> String {
    extract_clinvar_omim_id(record)
        .map(|raw| raw.split('&').collect::<Vec<_>>().join(", "))
        .unwrap_or_default()
}

fn extract_max_spliceai_score(entry: &Value) -> Option<f64> {
    let spliceai = entry.get("spliceai")?.as_object()?;
    ["DS_AG", "DS_AL", "DS_DG", "DS_DL"]
        .iter()
        .filter_map(|key| spliceai.get(*key).and_then(Value::as_f64))
        .map(f64::abs)
        .fold(None, |acc, value| Some(acc.map_or(value, |a: f64| a.max(value))))
}

fn suffix_after_first_colon(s: &str) -> String {
    s.split_once(':')
        .map(|(_, rest)| rest.to_string())
        .unwrap_or_default()
}

/// Fallback cDNA notation constructor used only when the upstream omits
/// `hgvsc` directly, carried over from the original implementation.
fn create_cdna_notation(entry: &Value) -> Option<String> {
    let position = entry.get("cdna_start")?.as_i64()?;
    let codons = entry.get("codons")?.as_str()?;
    let (ref_codon, alt_codon) = codons.split_once('/')?;

    ref_codon
        .to_uppercase()
        .chars()
        .zip(alt_codon.to_uppercase().chars())
        .enumerate()
        .find(|(_, (r, a))| r != a)
        .map(|(i, (r, a))| format!("c.{}{r}>{a}", position + i as i64))
}

/// Fallback protein notation constructor, same provenance as above.
fn create_protein_notation(entry: &Value) -> Option<String> {
    let position = entry.get("protein_start")?.as_i64()?;
    let amino_acids = entry.get("amino_acids")?.as_str()?;
    let (ref_aa, alt_aa) = amino_acids.split_once('/')?;

    Some(format!(
        "p.{}{position}{}",
        three_letter_amino_acid(ref_aa),
        three_letter_amino_acid(alt_aa),
    ))
}

fn three_letter_amino_acid(code: &str) -> &str {
    match code {
        "A" => "Ala",
        "R" => "Arg",
        "N" => "Asn",
        "D" => "Asp",
        "C" => "Cys",
        "Q" => "Gln",
        "E" => "Glu",
        "G" => "Gly",
        "H" => "His",
        "I" => "Ile",
        "L" => "Leu",
        "K" => "Lys",
        "M" => "Met",
        "F" => "Phe",
        "P" => "Pro",
        "S" => "Ser",
        "T" => "Thr",
        "W" => "Trp",
        "Y" => "Tyr",
        "V" => "Val",
        other => other,
    }
}

/// The `(chrom, start, end, ref/alt, strand)` region string the upstream
/// echoes back as `input`, turned back into our canonical variant key.
fn variant_key_from_input(record: &Value) -> Option<VariantKey> {
    let input = record.get("input").and_then(Value::as_str)?;
    let mut parts = input.split_whitespace();
    let chrom = parts.next()?;
    let start = parts.next()?;
    let _end = parts.next()?;
    let alleles = parts.next()?;
    let (reference, alt) = alleles.split_once('/')?;
    VariantKey::canonicalize(chrom, start, reference, alt).ok()
}

/// ML contract: copy the record, strip a leading `chr` from
/// `seq_region_name` and `input` only when present, and change nothing else.
fn build_ml_input(record: &Value) -> Value {
    let mut ml_input = record.clone();
    if let Some(obj) = ml_input.as_object_mut() {
        strip_chr_prefix(obj, "seq_region_name");
        strip_chr_prefix(obj, "input");
    }
    ml_input
}

fn strip_chr_prefix(obj: &mut serde_json::Map<String, Value>, field: &str) {
    if let Some(Value::String(s)) = obj.get_mut(field) {
        if let Some(stripped) = s.strip_prefix("chr") {
            *s = stripped.to_string();
        }
    }
}

fn parse_transcript(entry: &Value) -> TranscriptRecord {
    let transcript_id = entry
        .get("transcript_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let impact = entry
        .get("impact")
        .and_then(Value::as_str)
        .map(validate_impact)
        .unwrap_or_default();

    let loftee = entry
        .get("lof")
        .and_then(Value::as_str)
        .map(validate_loftee)
        .unwrap_or_default();

    let cdna_notation = match entry.get("hgvsc").and_then(Value::as_str) {
        Some(hgvsc) => suffix_after_first_colon(hgvsc),
        None => create_cdna_notation(entry).unwrap_or_default(),
    };

    let protein_notation = match entry.get("hgvsp").and_then(Value::as_str) {
        Some(hgvsp) => suffix_after_first_colon(hgvsp),
        None => create_protein_notation(entry).unwrap_or_default(),
    };

    let consequences = entry
        .get("consequence_terms")
        .and_then(Value::as_array)
        .map(|terms| {
            terms
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(",")
        })
        .unwrap_or_default();

    let mane = entry
        .get("mane")
        .and_then(Value::as_array)
        .is_some_and(|m| !m.is_empty());

    TranscriptRecord {
        transcript_id,
        polyphen: entry.get("polyphen_score").and_then(Value::as_f64),
        protein_notation,
        revel: entry.get("revel").and_then(Value::as_f64),
        splice_ai: extract_max_spliceai_score(entry),
        mane,
        loftee,
        impact,
        gerp: entry.get("gerp++_rs").and_then(Value::as_f64),
        cdna_notation,
        consequences,
    }
}

/// Transforms one upstream record into the normalized internal annotation.
/// The caller (the batch task) recovers from `ParseError` locally: the
/// record is skipped and logged, the rest of the batch continues.
pub fn parse_record(
    record: &Value,
    scorer: &dyn Scorer,
) -> Result<AnnotationWithTranscripts, ParseError> {
    let variant_key = variant_key_from_input(record).ok_or(ParseError::MissingVariantKey)?;

    let transcripts_raw = record.get("transcript_consequences").and_then(Value::as_array);

    let first_transcript = transcripts_raw.and_then(|t| t.first());

    let gene = first_transcript
        .and_then(|t| t.get("gene_symbol"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let cadd = first_transcript
        .and_then(|t| t.get("cadd_phred"))
        .and_then(Value::as_f64);

    let colocated = extract_colocated_variants_data(record);

    let most_severe_consequence = record
        .get("most_severe_consequence")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let ml_input = build_ml_input(record);
    let ml_score = match scorer.score(&ml_input) {
        Ok(score) => score,
        Err(err) => {
            log::warn!("scorer failed for {variant_key}, using fallback score: {err}");
            FALLBACK_SCORE
        }
    };

    let transcripts = transcripts_raw
        .into_iter()
        .flatten()
        .map(parse_transcript)
        .collect();

    Ok(AnnotationWithTranscripts {
        annotation: AnnotationRecord {
            variant_key: variant_key.into_string(),
            gene,
            cadd,
            ml_score: Some(ml_score),
            most_severe_consequence,
            allele_freq: colocated.gnomad_af,
            max_allele_freq: colocated.max_allele_freq,
            omim: extract_omim(record),
            clinsig: colocated.clin_sig.unwrap_or_default(),
        },
        transcripts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedScorer(f64);
    impl Scorer for FixedScorer {
        fn score(&self, _ml_input: &Value) -> Result<f64, crate::scorer::ScoreError> {
            Ok(self.0)
        }
    }

    struct FailingScorer;
    impl Scorer for FailingScorer {
        fn score(&self, _ml_input: &Value) -> Result<f64, crate::scorer::ScoreError> {
            Err(crate::scorer::ScoreError("boom".to_string()))
        }
    }

    fn sample_record() -> Value {
        json!({
            "input": "chr2 148483494 148483494 C/A +",
            "seq_region_name": "chr2",
            "most_severe_consequence": "missense_variant",
            "transcript_consequences": [
                {
                    "transcript_id": "ENST00000001",
                    "gene_symbol": "ACME",
                    "cadd_phred": 23.4,
                    "impact": "HIGH",
                    "lof": "HC",
                    "revel": 0.8,
                    "gerp++_rs": 5.1,
                    "polyphen_score": 0.9,
                    "hgvsc": "ENST00000001:c.123A>C",
                    "hgvsp": "ENSP00000001:p.Lys41Thr",
                    "consequence_terms": ["missense_variant", "NMD_transcript_variant"],
                    "mane": ["NM_000001"],
                    "spliceai": {"DS_AG": 0.1, "DS_AL": -0.4, "DS_DG": 0.0, "DS_DL": 0.2},
                    "clinvar_omim_id": "123456&654321"
                }
            ],
            "colocated_variants": [
                {
                    "frequencies": {
                        "C": {"gnomadg": 0.001, "af": 0.002, "eur": 0.0005}
                    },
                    "clin_sig": ["benign"]
                }
            ]
        })
    }

    #[test]
    fn parses_full_record() {
        let annotation = parse_record(&sample_record(), &FixedScorer(0.42)).unwrap();
        assert_eq!(annotation.annotation.variant_key, "chr2:148483494:C>A");
        assert_eq!(annotation.annotation.gene, "ACME");
        assert_eq!(annotation.annotation.cadd, Some(23.4));
        assert_eq!(annotation.annotation.ml_score, Some(0.42));
        assert_eq!(annotation.annotation.allele_freq, Some(0.001));
        assert_eq!(annotation.annotation.max_allele_freq, Some(0.002));
        assert_eq!(annotation.annotation.omim, "123456, 654321");
        assert_eq!(annotation.annotation.clinsig, "benign");

        let transcript = &annotation.transcripts[0];
        assert_eq!(transcript.impact, "HIGH");
        assert_eq!(transcript.loftee, "HC");
        assert_eq!(transcript.splice_ai, Some(0.4));
        assert_eq!(transcript.cdna_notation, "c.123A>C");
        assert_eq!(transcript.protein_notation, "p.Lys41Thr");
        assert_eq!(transcript.consequences, "missense_variant,NMD_transcript_variant");
        assert!(transcript.mane);
    }

    #[test]
    fn invalid_enum_values_become_empty_string() {
        let mut record = sample_record();
        record["transcript_consequences"][0]["impact"] = json!("CATASTROPHIC");
        record["transcript_consequences"][0]["lof"] = json!("MAYBE");
        let annotation = parse_record(&record, &FixedScorer(0.1)).unwrap();
        assert_eq!(annotation.transcripts[0].impact, "");
        assert_eq!(annotation.transcripts[0].loftee, "");
    }

    #[test]
    fn scorer_failure_falls_back() {
        let annotation = parse_record(&sample_record(), &FailingScorer).unwrap();
        assert_eq!(annotation.annotation.ml_score, Some(FALLBACK_SCORE));
    }

    #[test]
    fn missing_gene_symbol_is_empty_not_absent() {
        let mut record = sample_record();
        record["transcript_consequences"][0]
            .as_object_mut()
            .unwrap()
            .remove("gene_symbol");
        let annotation = parse_record(&record, &FixedScorer(0.1)).unwrap();
        assert_eq!(annotation.annotation.gene, "");
    }

    #[test]
    fn missing_input_is_a_parse_error() {
        let record = json!({"most_severe_consequence": "x"});
        assert!(parse_record(&record, &FixedScorer(0.1)).is_err());
    }

    #[test]
    fn ml_input_strips_chr_prefix_only_when_present() {
        let record = sample_record();
        let ml_input = build_ml_input(&record);
        assert_eq!(ml_input["seq_region_name"], json!("2"));
        assert_eq!(ml_input["input"], json!("2 148483494 148483494 C/A +"));

        let mut unprefixed = record.clone();
        unprefixed["seq_region_name"] = json!("2");
        let ml_input = build_ml_input(&unprefixed);
        assert_eq!(ml_input["seq_region_name"], json!("2"));
    }
}
