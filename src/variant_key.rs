use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;

static CHROM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^chr(?:[1-9]|1[0-9]|2[0-3]|X|Y|M|MT)$").expect("static regex is valid")
});

static BASE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[ACGT]+$").expect("static regex is valid"));

/// The canonical `chrom:pos:ref>alt` identifier. Every internal
/// lookup uses this string verbatim; nothing downstream re-validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariantKey(String);

impl VariantKey {
    /// Validates and canonicalizes `(chrom, pos, ref, alt)`. Bases are
    /// upper-cased; the chromosome is folded to lower-case `chr` + upper-case
    /// suffix (but never otherwise rewritten: `chrM` and `chrMT` stay
    /// distinct, per the tie-break rule).
    pub fn canonicalize(chrom: &str, pos: &str, reference: &str, alt: &str) -> Result<Self, Error> {
        if !CHROM_RE.is_match(chrom) {
            return Err(Error::InvalidInput(format!(
                "invalid chromosome format: '{chrom}'"
            )));
        }
        if !BASE_RE.is_match(reference) {
            return Err(Error::InvalidInput(format!(
                "invalid REF allele: '{reference}'"
            )));
        }
        if !BASE_RE.is_match(alt) {
            return Err(Error::InvalidInput(format!("invalid ALT allele: '{alt}'")));
        }
        let pos_value: u64 = pos
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid position: '{pos}'")))?;
        if pos_value == 0 {
            return Err(Error::InvalidInput(
                "position must be a positive integer".to_string(),
            ));
        }

        let suffix = &chrom[3..];
        Ok(Self(format!(
            "chr{}:{}:{}>{}",
            suffix.to_uppercase(),
            pos_value,
            reference.to_uppercase(),
            alt.to_uppercase(),
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for VariantKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for VariantKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
