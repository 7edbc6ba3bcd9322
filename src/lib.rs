//! qldbtools: inventory and selection of CodeQL database archives
//!
//! The pipeline walks a directory of downloaded database archives and turns it
//! into selection manifests for variant-analysis clients:
//!
//! 1. **Locate** -- Find every `db.zip` under a root and read owner, project and
//!    language from the path via a configurable [`locate::PathLayout`]
//! 2. **Refine** -- Open each archive, read `codeql-database.yml` and the optional
//!    `baseline-info.json`, and fan out into one row per (database, language)
//! 3. **Unique** -- Assign a short content identifier (CID) from provenance fields
//!    and keep the earliest row per (owner, project, CID), reporting CIDs shared by
//!    unrelated repositories
//! 4. **Select** -- Emit the editor-plugin and command-line selection manifests
//!
//! Every stage writes a CSV table, so runs can be inspected and resumed from any
//! stage boundary.
//!
//! # Key Modules
//!
//! - [`locate`] -- Directory walk and path layout parsing
//! - [`extract`] -- Metadata document lookup inside archives
//! - [`normalize`] -- One detail row per language entry
//! - [`cid`] -- Content identifier
//! - [`dedup`] -- Canonical row selection and collision detection
//! - [`select`] -- Manifests and storage key naming
//! - [`pipeline`] -- Parallel refine stage and end-to-end run
//! - [`table`] -- CSV persistence
//! - [`stats`] -- Thread-safe run counters
//! - [`error`] -- Failure taxonomy
//! - [`config`] -- Constants
//!
//! # Example Usage
//!
//! ```bash
//! # Everything at once
//! qldbtools run --root ~/mrva-open-source-download -o scratch/
//!
//! # Or stage by stage
//! qldbtools initial-info --root ~/mrva-open-source-download -o scratch/db-info-1.csv
//! qldbtools refine-info -i scratch/db-info-1.csv -o scratch/db-info-2.csv
//! qldbtools unique -i scratch/db-info-2.csv -o scratch/db-unique.csv
//! qldbtools generate-selection -i scratch/db-unique.csv --vscode vsc.json --gh gh.json
//! ```

pub mod cid;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extract;
pub mod locate;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod select;
pub mod stats;
pub mod table;
