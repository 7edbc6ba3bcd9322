use crate::cid::row_cid;
use crate::models::{CidCollision, DetailRow};
use chrono::{DateTime, FixedOffset};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Canonical rows plus any CIDs shared by unrelated repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deduplication {
    pub selection: Vec<DetailRow>,
    pub collisions: Vec<CidCollision>,
}

fn parsed_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw.trim()).ok()
}

/// Earlier creation time first; unparseable times after all parseable ones.
fn compare_creation(a: &str, b: &str) -> Ordering {
    match (parsed_time(a), parsed_time(b)) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Keeps the earliest row per (owner, project, cid).
///
/// Rows are sorted on a fixed key before grouping, so the result does not
/// depend on input order. Rows without a `cid` get one computed on the fly.
pub fn deduplicate(rows: &[DetailRow]) -> Deduplication {
    let mut keyed: Vec<(String, &DetailRow)> = rows
        .iter()
        .map(|row| (row.cid.clone().unwrap_or_else(|| row_cid(row)), row))
        .collect();

    keyed.sort_by(|(cid_a, a), (cid_b, b)| {
        a.owner
            .cmp(&b.owner)
            .then_with(|| a.project.cmp(&b.project))
            .then_with(|| cid_a.cmp(cid_b))
            .then_with(|| compare_creation(&a.creation_time, &b.creation_time))
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.db_lang.cmp(&b.db_lang))
    });

    let mut seen: FxHashSet<(&str, &str, &str)> = FxHashSet::default();
    let mut selection = Vec::new();
    for (cid, row) in &keyed {
        if seen.insert((row.owner.as_str(), row.project.as_str(), cid.as_str())) {
            selection.push(DetailRow {
                cid: Some(cid.clone()),
                ..(*row).clone()
            });
        }
    }

    let collisions = find_collisions(&selection);
    for collision in &collisions {
        warn!(
            cid = %collision.cid,
            repositories = ?collision.repositories,
            "CID shared by different repositories"
        );
    }

    info!(
        input = rows.len(),
        selected = selection.len(),
        collisions = collisions.len(),
        "Deduplication complete"
    );

    Deduplication {
        selection,
        collisions,
    }
}

/// CIDs that appear under more than one (owner, project), sorted by CID.
pub fn find_collisions(rows: &[DetailRow]) -> Vec<CidCollision> {
    let mut by_cid: FxHashMap<String, BTreeSet<(String, String)>> = FxHashMap::default();
    for row in rows {
        let cid = row.cid.clone().unwrap_or_else(|| row_cid(row));
        by_cid
            .entry(cid)
            .or_default()
            .insert((row.owner.clone(), row.project.clone()));
    }

    let mut collisions: Vec<CidCollision> = by_cid
        .into_iter()
        .filter(|(_, repos)| repos.len() > 1)
        .map(|(cid, repos)| CidCollision {
            cid,
            repositories: repos.into_iter().collect(),
        })
        .collect();
    collisions.sort_by(|a, b| a.cid.cmp(&b.cid));
    collisions
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(owner: &str, project: &str, cid: &str, time: &str, path: &str) -> DetailRow {
        DetailRow {
            left_index: 0,
            owner: owner.to_string(),
            project: project.to_string(),
            language: "cpp".to_string(),
            path: path.to_string(),
            size: 10,
            creation_timestamp: String::new(),
            baseline_lines_of_code: 100,
            primary_language: "cpp".to_string(),
            sha: "abc".to_string(),
            cli_version: "2.17.0".to_string(),
            creation_time: time.to_string(),
            finalised: Some(true),
            db_lang: "cpp".to_string(),
            db_lang_display_name: "C/C++".to_string(),
            db_lang_file_count: 1,
            db_lang_lines_of_code: 100,
            cid: Some(cid.to_string()),
        }
    }

    #[test]
    fn keeps_earliest_per_group() {
        let rows = vec![
            row("acme", "widget", "aaaaaa", "2024-03-01T00:00:00Z", "/b"),
            row("acme", "widget", "aaaaaa", "2024-01-01T00:00:00Z", "/a"),
            row("acme", "widget", "bbbbbb", "2024-02-01T00:00:00Z", "/c"),
        ];
        let out = deduplicate(&rows);
        assert_eq!(out.selection.len(), 2);
        assert_eq!(out.selection[0].path, "/a");
        assert_eq!(out.selection[1].cid.as_deref(), Some("bbbbbb"));
        assert!(out.collisions.is_empty());
    }

    #[test]
    fn compares_times_across_offsets() {
        // 01:00+02:00 is earlier than 00:30Z
        let rows = vec![
            row("acme", "widget", "aaaaaa", "2024-01-01T00:30:00Z", "/late"),
            row("acme", "widget", "aaaaaa", "2024-01-01T01:00:00+02:00", "/early"),
        ];
        let out = deduplicate(&rows);
        assert_eq!(out.selection.len(), 1);
        assert_eq!(out.selection[0].path, "/early");
    }

    #[test]
    fn ties_resolved_independently_of_input_order() {
        let a = row("acme", "widget", "aaaaaa", "2024-01-01T00:00:00Z", "/one");
        let b = row("acme", "widget", "aaaaaa", "2024-01-01T00:00:00Z", "/two");
        let forward = deduplicate(&[a.clone(), b.clone()]);
        let backward = deduplicate(&[b, a]);
        assert_eq!(forward, backward);
        assert_eq!(forward.selection[0].path, "/one");
    }

    #[test]
    fn reports_collisions_across_repositories() {
        let rows = vec![
            row("acme", "widget", "abcdef", "2024-01-01T00:00:00Z", "/a"),
            row("globex", "gadget", "abcdef", "2024-01-01T00:00:00Z", "/b"),
            row("acme", "widget", "123456", "2024-01-01T00:00:00Z", "/c"),
        ];
        let out = deduplicate(&rows);
        assert_eq!(out.selection.len(), 3);
        assert_eq!(out.collisions.len(), 1);
        assert_eq!(out.collisions[0].cid, "abcdef");
        assert_eq!(
            out.collisions[0].repositories,
            vec![
                ("acme".to_string(), "widget".to_string()),
                ("globex".to_string(), "gadget".to_string())
            ]
        );
    }

    #[test]
    fn fills_missing_cid() {
        let mut r = row("acme", "widget", "", "2024-01-01T00:00:00Z", "/a");
        r.cid = None;
        let out = deduplicate(&[r.clone()]);
        assert_eq!(out.selection[0].cid, Some(row_cid(&r)));
    }

    fn arb_row() -> impl Strategy<Value = DetailRow> {
        (
            prop::sample::select(vec!["acme", "globex"]),
            prop::sample::select(vec!["widget", "gadget"]),
            prop::sample::select(vec!["aaaaaa", "bbbbbb", "cccccc"]),
            0u32..6,
            0u32..4,
        )
            .prop_map(|(owner, project, cid, hour, n)| {
                row(
                    owner,
                    project,
                    cid,
                    &format!("2024-01-01T{hour:02}:00:00Z"),
                    &format!("/dbs/{n}"),
                )
            })
    }

    proptest! {
        #[test]
        fn prop_dedup_idempotent(rows in prop::collection::vec(arb_row(), 0..40)) {
            let once = deduplicate(&rows);
            let twice = deduplicate(&once.selection);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_canonical_is_earliest(rows in prop::collection::vec(arb_row(), 0..40)) {
            let out = deduplicate(&rows);
            for chosen in &out.selection {
                for other in rows.iter().filter(|r| {
                    r.owner == chosen.owner && r.project == chosen.project && r.cid == chosen.cid
                }) {
                    prop_assert!(chosen.creation_time <= other.creation_time);
                }
            }
        }

        #[test]
        fn prop_one_row_per_triple(rows in prop::collection::vec(arb_row(), 0..40)) {
            let out = deduplicate(&rows);
            let triples: BTreeSet<_> = rows
                .iter()
                .map(|r| (r.owner.clone(), r.project.clone(), r.cid.clone()))
                .collect();
            prop_assert_eq!(out.selection.len(), triples.len());
        }
    }
}
