use crate::config::NO_LANGUAGE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One discovered archive. `path` is the natural key at discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub owner: String,
    pub project: String,
    pub language: String,
    pub path: String,
    pub size: u64,
    pub creation_timestamp: String,
}

/// Tool-reported facts from the creation-metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceMetadata {
    pub baseline_lines_of_code: i64,
    pub primary_language: String,
    pub sha: String,
    pub cli_version: String,
    pub creation_time: String,
    pub finalised: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageStats {
    pub language: String,
    pub display_name: String,
    pub file_count: u64,
    pub lines_of_code: i64,
}

/// Per-language entry of the baseline statistics document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineLanguage {
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(default)]
    pub files: Vec<serde_json::Value>,
    #[serde(rename = "linesOfCode", default)]
    pub lines_of_code: i64,
}

/// The baseline statistics document. `languages` is optional so that a
/// document lacking the key can be told apart from a missing document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineInfo {
    #[serde(default)]
    pub languages: Option<BTreeMap<String, BaselineLanguage>>,
}

impl BaselineInfo {
    /// Stand-in for archives written before baseline info existed.
    pub fn no_language() -> Self {
        let entry = BaselineLanguage {
            display_name: NO_LANGUAGE.to_string(),
            files: Vec::new(),
            lines_of_code: -1,
        };
        Self {
            languages: Some(BTreeMap::from([(NO_LANGUAGE.to_string(), entry)])),
        }
    }

    /// `None` when the document has no `languages` map.
    pub fn language_stats(&self) -> Option<Vec<LanguageStats>> {
        let languages = self.languages.as_ref()?;
        Some(
            languages
                .iter()
                .map(|(key, entry)| LanguageStats {
                    language: key.clone(),
                    display_name: entry.display_name.clone(),
                    file_count: entry.files.len() as u64,
                    lines_of_code: entry.lines_of_code,
                })
                .collect(),
        )
    }
}

/// One (database, language) row. `cid` is empty until identifiers are assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRow {
    pub left_index: usize,
    pub owner: String,
    pub project: String,
    pub language: String,
    pub path: String,
    pub size: u64,
    pub creation_timestamp: String,
    pub baseline_lines_of_code: i64,
    pub primary_language: String,
    pub sha: String,
    pub cli_version: String,
    pub creation_time: String,
    pub finalised: Option<bool>,
    pub db_lang: String,
    pub db_lang_display_name: String,
    pub db_lang_file_count: u64,
    pub db_lang_lines_of_code: i64,
    pub cid: Option<String>,
}

impl DetailRow {
    /// True when every field the CID depends on is non-empty.
    pub fn has_identity_fields(&self) -> bool {
        !(self.creation_time.is_empty()
            || self.sha.is_empty()
            || self.cli_version.is_empty()
            || self.language.is_empty())
    }
}

/// Reported when one CID shows up under more than one (owner, project).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CidCollision {
    pub cid: String,
    pub repositories: Vec<(String, String)>,
}
