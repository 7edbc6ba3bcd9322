use crate::config::{
    BASELINE_INFO_FILE, CREATION_METADATA_FILE, DEFAULT_SHA, GENERIC_DB_DIR, MAX_DOCUMENT_BYTES,
};
use crate::error::{Error, Result};
use crate::models::{BaselineInfo, ProvenanceMetadata};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// How a metadata document was found inside an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// One of the known layouts (`<file>`, `<language>/<file>`, `codeql_db/<file>`)
    Exact,
    /// Any entry whose last path component is the document name
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMatch {
    pub name: String,
    pub kind: MatchKind,
}

/// Everything read out of one archive.
#[derive(Debug, Clone)]
pub struct ArchiveMetadata {
    pub provenance: ProvenanceMetadata,
    pub baseline: BaselineInfo,
    /// False when the synthetic no-language stand-in was substituted
    pub baseline_present: bool,
}

/// Creation-metadata fields as written by the database tool. Plain scalars
/// deserialize into `String` with their source text, so `cliVersion: 2.10`
/// and an all-digit `sha` are kept verbatim.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreationDocument {
    baseline_lines_of_code: Option<i64>,
    primary_language: Option<String>,
    creation_metadata: Option<CreationFields>,
    finalised: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreationFields {
    sha: Option<String>,
    cli_version: Option<String>,
    creation_time: Option<String>,
}

/// Locates `file_name` among the archive entry names: exact known paths
/// first, then the shallowest entry ending in `/<file_name>`.
pub fn find_entry(names: &[String], file_name: &str, language: Option<&str>) -> Option<EntryMatch> {
    let mut exact = vec![file_name.to_string(), format!("{GENERIC_DB_DIR}/{file_name}")];
    if let Some(lang) = language {
        exact.insert(1, format!("{lang}/{file_name}"));
    }
    for candidate in &exact {
        if names.iter().any(|n| n == candidate) {
            return Some(EntryMatch {
                name: candidate.clone(),
                kind: MatchKind::Exact,
            });
        }
    }

    let suffix = format!("/{file_name}");
    names
        .iter()
        .filter(|n| n.ends_with(&suffix))
        .min_by(|a, b| {
            a.matches('/')
                .count()
                .cmp(&b.matches('/').count())
                .then_with(|| a.cmp(b))
        })
        .map(|n| EntryMatch {
            name: n.clone(),
            kind: MatchKind::Suffix,
        })
}

fn read_entry_bounded<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &Path,
    name: &str,
    document: &'static str,
) -> Result<Vec<u8>> {
    let entry = archive.by_name(name).map_err(|e| Error::NotAnArchive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut out = Vec::new();
    entry
        .take(MAX_DOCUMENT_BYTES + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::NotAnArchive {
            path: path.to_path_buf(),
            reason: format!("{name}: {e}"),
        })?;
    if out.len() as u64 > MAX_DOCUMENT_BYTES {
        return Err(Error::InvalidDocument {
            path: path.to_path_buf(),
            document,
            reason: format!("entry {name} exceeds {MAX_DOCUMENT_BYTES} bytes"),
        });
    }
    Ok(out)
}

/// Parses a creation-metadata document into provenance fields.
pub fn provenance_from_yaml(path: &Path, raw: &[u8]) -> Result<ProvenanceMetadata> {
    let invalid = |reason: String| Error::InvalidDocument {
        path: path.to_path_buf(),
        document: CREATION_METADATA_FILE,
        reason,
    };
    let missing = |field: &str| invalid(format!("missing required field '{field}'"));

    let doc: CreationDocument =
        serde_yaml::from_slice(raw).map_err(|e| invalid(e.to_string()))?;
    let creation = doc.creation_metadata.unwrap_or_default();

    Ok(ProvenanceMetadata {
        baseline_lines_of_code: doc
            .baseline_lines_of_code
            .ok_or_else(|| missing("baselineLinesOfCode"))?,
        primary_language: doc
            .primary_language
            .ok_or_else(|| missing("primaryLanguage"))?,
        sha: creation.sha.unwrap_or_else(|| DEFAULT_SHA.to_string()),
        cli_version: creation
            .cli_version
            .ok_or_else(|| missing("creationMetadata.cliVersion"))?,
        creation_time: creation
            .creation_time
            .ok_or_else(|| missing("creationMetadata.creationTime"))?,
        finalised: doc.finalised,
    })
}

/// Reads the creation-metadata and baseline documents from an archive.
///
/// A missing baseline document is replaced by [`BaselineInfo::no_language`];
/// a missing creation-metadata document is an error. The archive handle is
/// dropped on every return path.
pub fn extract_metadata(path: &Path, language: Option<&str>) -> Result<ArchiveMetadata> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| Error::NotAnArchive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();

    let creation_entry = find_entry(&names, CREATION_METADATA_FILE, language).ok_or_else(|| {
        Error::MissingCreationMetadata {
            path: path.to_path_buf(),
        }
    })?;
    debug!(
        path = %path.display(),
        entry = %creation_entry.name,
        kind = ?creation_entry.kind,
        "Found creation metadata"
    );
    let raw = read_entry_bounded(&mut archive, path, &creation_entry.name, CREATION_METADATA_FILE)?;
    let provenance = provenance_from_yaml(path, &raw)?;

    let (baseline, baseline_present) = match find_entry(&names, BASELINE_INFO_FILE, language) {
        Some(entry) => {
            let raw = read_entry_bounded(&mut archive, path, &entry.name, BASELINE_INFO_FILE)?;
            let info: BaselineInfo =
                serde_json::from_slice(&raw).map_err(|e| Error::InvalidDocument {
                    path: path.to_path_buf(),
                    document: BASELINE_INFO_FILE,
                    reason: e.to_string(),
                })?;
            (info, true)
        }
        None => {
            debug!(path = %path.display(), "No baseline info, using no-language stand-in");
            (BaselineInfo::no_language(), false)
        }
    };

    Ok(ArchiveMetadata {
        provenance,
        baseline,
        baseline_present,
    })
}
