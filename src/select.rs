use crate::config::CID_SEPARATOR;
use crate::models::DetailRow;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Object key for a database archive in bucket storage.
pub fn form_db_bucket_name(owner: &str, project: &str, cid: &str) -> String {
    format!("{owner}${project}{CID_SEPARATOR}{cid}.zip")
}

/// Repository identifier used in variant-analysis requests.
pub fn form_db_req_name(owner: &str, project: &str, cid: &str) -> String {
    format!("{owner}/{project}{CID_SEPARATOR}{cid}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryList {
    pub name: String,
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantAnalysis {
    pub repository_lists: Vec<RepositoryList>,
    pub owners: Vec<String>,
    pub repositories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Databases {
    pub variant_analysis: VariantAnalysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedList {
    pub kind: String,
    pub list_name: String,
}

/// Database selection file read by the editor plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VscodeSelection {
    pub version: u32,
    pub databases: Databases,
    pub selected: SelectedList,
}

/// Flat list-name to repositories mapping read by the command-line client.
pub type GhSelection = BTreeMap<String, Vec<String>>;

/// Both manifests for one named repository list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub list_name: String,
    pub repositories: Vec<String>,
    pub bucket_keys: Vec<String>,
}

impl Selection {
    /// Builds the selection from canonical rows, optionally keeping only the
    /// first `limit` repositories in (owner, project, cid) order.
    pub fn from_rows(list_name: &str, rows: &[DetailRow], limit: Option<usize>) -> Self {
        let mut keyed: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|r| {
                (
                    r.owner.as_str(),
                    r.project.as_str(),
                    r.cid.as_deref().unwrap_or_default(),
                )
            })
            .collect();
        keyed.sort_unstable();
        keyed.dedup();
        if let Some(limit) = limit {
            keyed.truncate(limit);
        }

        Self {
            list_name: list_name.to_string(),
            repositories: keyed
                .iter()
                .map(|(o, p, c)| form_db_req_name(o, p, c))
                .collect(),
            bucket_keys: keyed
                .iter()
                .map(|(o, p, c)| form_db_bucket_name(o, p, c))
                .collect(),
        }
    }

    pub fn vscode(&self) -> VscodeSelection {
        VscodeSelection {
            version: 1,
            databases: Databases {
                variant_analysis: VariantAnalysis {
                    repository_lists: vec![RepositoryList {
                        name: self.list_name.clone(),
                        repositories: self.repositories.clone(),
                    }],
                    owners: Vec::new(),
                    repositories: Vec::new(),
                },
            },
            selected: SelectedList {
                kind: "variantAnalysisUserDefinedList".to_string(),
                list_name: self.list_name.clone(),
            },
        }
    }

    pub fn gh(&self) -> GhSelection {
        BTreeMap::from([(self.list_name.clone(), self.repositories.clone())])
    }
}

/// Writes `value` as JSON indented by four spaces.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create manifest: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
    value
        .serialize(&mut ser)
        .with_context(|| format!("Failed to serialize manifest: {}", path.display()))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Writes one bucket key per line.
pub fn write_keys(path: &Path, keys: &[String]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for key in keys {
        writeln!(writer, "{key}")?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn row(owner: &str, project: &str, cid: &str) -> DetailRow {
        DetailRow {
            left_index: 0,
            owner: owner.to_string(),
            project: project.to_string(),
            language: "cpp".to_string(),
            path: format!("/dbs/{owner}/{project}/db.zip"),
            size: 1,
            creation_timestamp: String::new(),
            baseline_lines_of_code: 1,
            primary_language: "cpp".to_string(),
            sha: "abc".to_string(),
            cli_version: "2.17.0".to_string(),
            creation_time: "2024-01-01T00:00:00Z".to_string(),
            finalised: None,
            db_lang: "cpp".to_string(),
            db_lang_display_name: "C/C++".to_string(),
            db_lang_file_count: 1,
            db_lang_lines_of_code: 1,
            cid: Some(cid.to_string()),
        }
    }

    #[test]
    fn key_naming() {
        assert_eq!(form_db_req_name("acme", "widget", "1a2b3c"), "acme/widgetctsj1a2b3c");
        assert_eq!(
            form_db_bucket_name("acme", "widget", "1a2b3c"),
            "acme$widgetctsj1a2b3c.zip"
        );
    }

    #[test]
    fn vscode_manifest_shape() {
        let sel = Selection::from_rows("mirva-list", &[row("acme", "widget", "1a2b3c")], None);
        let value = serde_json::to_value(sel.vscode()).unwrap();
        assert_eq!(
            value,
            json!({
                "version": 1,
                "databases": {
                    "variantAnalysis": {
                        "repositoryLists": [
                            {"name": "mirva-list", "repositories": ["acme/widgetctsj1a2b3c"]}
                        ],
                        "owners": [],
                        "repositories": []
                    }
                },
                "selected": {
                    "kind": "variantAnalysisUserDefinedList",
                    "listName": "mirva-list"
                }
            })
        );
    }

    #[test]
    fn gh_manifest_shape() {
        let rows = [row("globex", "gadget", "ffffff"), row("acme", "widget", "1a2b3c")];
        let sel = Selection::from_rows("trial", &rows, None);
        let value = serde_json::to_value(sel.gh()).unwrap();
        assert_eq!(
            value,
            json!({"trial": ["acme/widgetctsj1a2b3c", "globex/gadgetctsjffffff"]})
        );
    }

    #[test]
    fn limit_and_duplicates() {
        let rows = [
            row("acme", "widget", "1a2b3c"),
            row("acme", "widget", "1a2b3c"),
            row("acme", "gadget", "000000"),
        ];
        let sel = Selection::from_rows("l", &rows, Some(1));
        assert_eq!(sel.repositories, vec!["acme/gadgetctsj000000"]);
        assert_eq!(sel.bucket_keys, vec!["acme$gadgetctsj000000.zip"]);

        let all = Selection::from_rows("l", &rows, None);
        assert_eq!(all.repositories.len(), 2);
    }

    #[test]
    fn writes_four_space_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gh.json");
        let sel = Selection::from_rows("l", &[row("acme", "widget", "1a2b3c")], None);
        write_json(&path, &sel.gh()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n    \"l\": ["));
        let back: GhSelection = serde_json::from_str(&text).unwrap();
        assert_eq!(back, sel.gh());
    }
}
