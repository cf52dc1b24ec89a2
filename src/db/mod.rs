pub mod models;
pub mod pool;
mod schema;

use diesel::pg::PgConnection;
use diesel::prelude::*;

pub use models::{AnnotationRecord, AnnotationWithTranscripts, TranscriptRecord};
pub use pool::ConnectionPool;

use self::models::{AnnotationRow, NewAnnotationRow, NewTranscriptRow, TranscriptRow};
use self::schema::{annotations, transcripts};
use crate::error::Error;

/// `exists(key) -> bool`: true iff the key has a parent row.
pub fn exists(conn: &mut PgConnection, key: &str) -> Result<bool, Error> {
    use annotations::dsl;

    let count: i64 = dsl::annotations
        .filter(dsl::variant_key.eq(key))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// `read(key) -> record?`: parent row joined with its ordered
/// transcript children, or `None` if the key has never completed.
pub fn read(conn: &mut PgConnection, key: &str) -> Result<Option<AnnotationWithTranscripts>, Error> {
    use annotations::dsl as a_dsl;
    use transcripts::dsl as t_dsl;

    let parent = a_dsl::annotations
        .filter(a_dsl::variant_key.eq(key))
        .select(AnnotationRow::as_select())
        .first::<AnnotationRow>(conn)
        .optional()?;

    let Some(parent) = parent else {
        return Ok(None);
    };

    let children = t_dsl::transcripts
        .filter(t_dsl::variant_key.eq(key))
        .order(t_dsl::id.asc())
        .select(TranscriptRow::as_select())
        .load::<TranscriptRow>(conn)?;

    Ok(Some(AnnotationWithTranscripts {
        annotation: parent.into(),
        transcripts: children.into_iter().map(Into::into).collect(),
    }))
}

/// `bulk_upsert(parents, children)`: writes an entire batch in one
/// transaction. On conflict the parent row's `CADD` column is overwritten
/// and every other column is left as originally inserted; see DESIGN.md
/// for why this implementation keeps the source's narrow-overwrite choice.
/// Transcripts are deleted and reinserted for each key in the batch so a
/// re-submitted key never accumulates duplicate children.
pub fn bulk_upsert(conn: &mut PgConnection, batch: &[AnnotationWithTranscripts]) -> Result<(), Error> {
    if batch.is_empty() {
        return Ok(());
    }

    conn.transaction(|conn| {
        let new_parents: Vec<NewAnnotationRow> = batch
            .iter()
            .map(|record| NewAnnotationRow {
                variant_key: &record.annotation.variant_key,
                gene: &record.annotation.gene,
                cadd: record.annotation.cadd,
                ml_score: record.annotation.ml_score,
                most_severe_consequence: &record.annotation.most_severe_consequence,
                allele_freq: record.annotation.allele_freq,
                max_allele_freq: record.annotation.max_allele_freq,
                omim: &record.annotation.omim,
                clinsig: &record.annotation.clinsig,
            })
            .collect();

        use annotations::dsl as a_dsl;
        diesel::insert_into(annotations::table)
            .values(&new_parents)
            .on_conflict(a_dsl::variant_key)
            .do_update()
            .set(a_dsl::cadd.eq(diesel::upsert::excluded(a_dsl::cadd)))
            .execute(conn)?;

        use transcripts::dsl as t_dsl;
        let keys: Vec<&str> = batch
            .iter()
            .map(|record| record.annotation.variant_key.as_str())
            .collect();
        diesel::delete(t_dsl::transcripts.filter(t_dsl::variant_key.eq_any(&keys))).execute(conn)?;

        let new_children: Vec<NewTranscriptRow> = batch
            .iter()
            .flat_map(|record| {
                record.transcripts.iter().map(move |transcript| NewTranscriptRow {
                    variant_key: &record.annotation.variant_key,
                    transcript_id: &transcript.transcript_id,
                    polyphen: transcript.polyphen,
                    protein_notation: &transcript.protein_notation,
                    revel: transcript.revel,
                    splice_ai: transcript.splice_ai,
                    mane: transcript.mane,
                    loftee: &transcript.loftee,
                    impact: &transcript.impact,
                    gerp: transcript.gerp,
                    cdna_notation: &transcript.cdna_notation,
                    consequences: &transcript.consequences,
                })
            })
            .collect();

        if !new_children.is_empty() {
            diesel::insert_into(transcripts::table)
                .values(&new_children)
                .execute(conn)?;
        }

        Ok::<_, Error>(())
    })
}
