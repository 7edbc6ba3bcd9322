use crate::error::{Error, Result};
use crate::models::{BaselineInfo, DatabaseRecord, DetailRow, ProvenanceMetadata};
use std::path::PathBuf;

/// Fans one archive out into a row per language entry of its baseline info.
///
/// `left_index` is the record's position in the DatabaseRecord table. Fails
/// with [`Error::NoLanguageStats`] when the document has no `languages` map.
pub fn normalize(
    left_index: usize,
    record: &DatabaseRecord,
    provenance: &ProvenanceMetadata,
    baseline: &BaselineInfo,
) -> Result<Vec<DetailRow>> {
    let stats = baseline
        .language_stats()
        .ok_or_else(|| Error::NoLanguageStats {
            path: PathBuf::from(&record.path),
        })?;

    Ok(stats
        .into_iter()
        .map(|lang| DetailRow {
            left_index,
            owner: record.owner.clone(),
            project: record.project.clone(),
            language: record.language.clone(),
            path: record.path.clone(),
            size: record.size,
            creation_timestamp: record.creation_timestamp.clone(),
            baseline_lines_of_code: provenance.baseline_lines_of_code,
            primary_language: provenance.primary_language.clone(),
            sha: provenance.sha.clone(),
            cli_version: provenance.cli_version.clone(),
            creation_time: provenance.creation_time.clone(),
            finalised: provenance.finalised,
            db_lang: lang.language,
            db_lang_display_name: lang.display_name,
            db_lang_file_count: lang.file_count,
            db_lang_lines_of_code: lang.lines_of_code,
            cid: None,
        })
        .collect())
}
