use crate::cid::assign_cids;
use crate::config::PROGRESS_INTERVAL;
use crate::dedup::{deduplicate, Deduplication};
use crate::error::Result as StageResult;
use crate::extract::extract_metadata;
use crate::locate::{collect_records, ArchiveLocator, PathLayout};
use crate::models::{CidCollision, DatabaseRecord, DetailRow};
use crate::normalize::normalize;
use crate::select::{write_json, write_keys, Selection};
use crate::stats::RunStats;
use crate::table::{write_collisions, write_table};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Extracts and normalizes one archive. Errors never leave this unit as
/// anything but a value.
pub fn refine_record(
    left_index: usize,
    record: &DatabaseRecord,
    stats: &RunStats,
) -> StageResult<Vec<DetailRow>> {
    let meta = extract_metadata(Path::new(&record.path), Some(record.language.as_str()))?;
    if !meta.baseline_present {
        stats.inc_baseline_missing();
    }
    normalize(left_index, record, &meta.provenance, &meta.baseline)
}

/// Refines every record in parallel. Failed archives are logged, counted
/// and skipped; the returned rows are ordered by record index.
pub fn refine(records: &[DatabaseRecord], stats: &RunStats, show_progress: bool) -> Vec<DetailRow> {
    let pb = if show_progress {
        let pb = ProgressBar::new(records.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} archives ({eta})") {
            pb.set_style(style);
        }
        pb
    } else {
        ProgressBar::hidden()
    };

    let per_record: Vec<Vec<DetailRow>> = records
        .par_iter()
        .enumerate()
        .map(|(index, record)| {
            stats.inc_seen();
            let rows = match refine_record(index, record, stats) {
                Ok(rows) => {
                    stats.inc_refined();
                    stats.add_detail_rows(rows.len() as u64);
                    rows
                }
                Err(e) => {
                    warn!(
                        path = %e.path().display(),
                        stage = %e.stage(),
                        kind = e.kind().label(),
                        error = %e,
                        "Skipping archive"
                    );
                    stats.record_skip(e.kind());
                    Vec::new()
                }
            };
            if stats.seen() % PROGRESS_INTERVAL == 0 {
                pb.set_position(stats.seen());
            }
            rows
        })
        .collect();

    pb.finish_and_clear();

    let mut rows: Vec<DetailRow> = per_record.into_iter().flatten().collect();
    rows.sort_by(|a, b| {
        a.left_index
            .cmp(&b.left_index)
            .then_with(|| a.db_lang.cmp(&b.db_lang))
    });
    rows
}

/// Drops rows lacking any field the CID is built from.
pub fn drop_incomplete(rows: &[DetailRow], stats: &RunStats) -> Vec<DetailRow> {
    let kept: Vec<DetailRow> = rows
        .iter()
        .filter(|r| r.has_identity_fields())
        .cloned()
        .collect();
    let dropped = rows.len() - kept.len();
    if dropped > 0 {
        warn!(dropped, "Dropping rows with incomplete provenance");
        stats.add_incomplete_rows(dropped as u64);
    }
    kept
}

/// Identifier assignment followed by deduplication.
pub fn unique(rows: &[DetailRow], stats: &RunStats) -> (Vec<DetailRow>, Deduplication) {
    let complete = drop_incomplete(rows, stats);
    let identified = assign_cids(&complete);
    let dedup = deduplicate(&identified);
    (identified, dedup)
}

pub struct RunConfig {
    pub root: PathBuf,
    pub output_dir: PathBuf,
    pub layout: PathLayout,
    pub list_name: String,
    pub limit: Option<usize>,
    pub show_progress: bool,
}

/// Artifact paths written by [`run`], relative to the output directory.
pub const DATABASES_CSV: &str = "db-info-1.csv";
pub const DETAILS_CSV: &str = "db-info-2.csv";
pub const IDENTIFIED_CSV: &str = "db-info-3.csv";
pub const UNIQUE_CSV: &str = "db-unique.csv";
pub const COLLISIONS_CSV: &str = "cid-collisions.csv";
pub const VSCODE_SELECTION: &str = "selection-vsc.json";
pub const GH_SELECTION: &str = "selection-gh.json";
pub const BUCKET_KEYS: &str = "bucket-keys.txt";

#[derive(Debug)]
pub struct RunReport {
    pub stats: RunStats,
    pub records: usize,
    pub selected: usize,
    pub collisions: Vec<CidCollision>,
    pub selection: Selection,
}

/// Runs every stage, persisting each table under `output_dir`.
pub fn run(config: &RunConfig) -> Result<RunReport> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;
    let out = |name: &str| config.output_dir.join(name);

    let start = Instant::now();
    let stats = RunStats::new();
    let locator = ArchiveLocator::new(&config.root, config.layout.clone())?;
    let records = collect_records(&locator, &stats)?;
    write_table(&out(DATABASES_CSV), &records)?;
    info!(
        archives = records.len(),
        duration_secs = start.elapsed().as_secs_f64(),
        "Located archives"
    );

    let details = refine(&records, &stats, config.show_progress);
    write_table(&out(DETAILS_CSV), &details)?;
    info!(
        rows = details.len(),
        skipped = stats.skipped_total(),
        "Refined archives"
    );

    let (identified, dedup) = unique(&details, &stats);
    write_table(&out(IDENTIFIED_CSV), &identified)?;
    write_table(&out(UNIQUE_CSV), &dedup.selection)?;
    write_collisions(&out(COLLISIONS_CSV), &dedup.collisions)?;

    let selection = Selection::from_rows(&config.list_name, &dedup.selection, config.limit);
    write_json(&out(VSCODE_SELECTION), &selection.vscode())?;
    write_json(&out(GH_SELECTION), &selection.gh())?;
    write_keys(&out(BUCKET_KEYS), &selection.bucket_keys)?;
    info!(
        repositories = selection.repositories.len(),
        duration_secs = start.elapsed().as_secs_f64(),
        "Selection written"
    );

    Ok(RunReport {
        records: records.len(),
        selected: dedup.selection.len(),
        collisions: dedup.collisions,
        selection,
        stats,
    })
}
