use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qldbtools::config::DEFAULT_LIST_NAME;
use qldbtools::locate::{collect_records, ArchiveLocator, PathLayout};
use qldbtools::models::{CidCollision, DatabaseRecord, DetailRow};
use qldbtools::pipeline::{self, RunConfig};
use qldbtools::select::{write_json, write_keys, Selection};
use qldbtools::stats::RunStats;
use qldbtools::table::{read_table, write_collisions, write_table};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "qldbtools")]
#[command(about = "Inventory, deduplicate and select CodeQL database archives")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage and write all tables and manifests
    Run(RunArgs),
    /// Find archives under a root and write the database table
    InitialInfo(InitialInfoArgs),
    /// Read metadata from each archive and write the detail table
    RefineInfo(RefineInfoArgs),
    /// Assign CIDs and keep one row per (owner, project, CID)
    Unique(UniqueArgs),
    /// Write selection manifests from a deduplicated table
    GenerateSelection(GenerateSelectionArgs),
}

#[derive(Args)]
struct LayoutArgs {
    /// Root directory holding the downloaded archives
    #[arg(short, long)]
    root: String,

    /// Path segment offsets from the end, e.g. owner=7,project=6,language=2
    #[arg(long, default_value_t = PathLayout::default())]
    layout: PathLayout,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    layout: LayoutArgs,

    /// Output directory for tables and manifests
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Repository list name used in the manifests
    #[arg(long, default_value = DEFAULT_LIST_NAME)]
    list_name: String,

    /// Keep only the first N repositories in the manifests
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct InitialInfoArgs {
    #[command(flatten)]
    layout: LayoutArgs,

    /// CSV file for the database table
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct RefineInfoArgs {
    /// Database table written by initial-info
    #[arg(short, long)]
    input: PathBuf,

    /// CSV file for the detail table
    #[arg(short, long)]
    output: PathBuf,
}

#[derive(Args)]
struct UniqueArgs {
    /// Detail table written by refine-info
    #[arg(short, long)]
    input: PathBuf,

    /// CSV file for the deduplicated table
    #[arg(short, long)]
    output: PathBuf,

    /// Also write the full table with CIDs
    #[arg(long)]
    with_cids: Option<PathBuf>,

    /// Write CID collisions as CSV
    #[arg(long)]
    collisions: Option<PathBuf>,
}

#[derive(Args)]
struct GenerateSelectionArgs {
    /// Deduplicated table written by unique
    #[arg(short, long)]
    input: PathBuf,

    /// Repository list name
    #[arg(long, default_value = DEFAULT_LIST_NAME)]
    list_name: String,

    /// Editor plugin selection file
    #[arg(long, default_value = "selection-vsc.json")]
    vscode: PathBuf,

    /// Command-line client selection file
    #[arg(long, default_value = "selection-gh.json")]
    gh: PathBuf,

    /// Write bucket object keys, one per line
    #[arg(long)]
    keys: Option<PathBuf>,

    /// Keep only the first N repositories
    #[arg(long)]
    limit: Option<usize>,
}

fn expand_root(root: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(root).into_owned())
}

fn print_skips(stats: &RunStats) {
    println!("Archives seen:      {}", stats.seen());
    println!("Archives refined:   {}", stats.refined());
    println!("No baseline info:   {}", stats.baseline_missing());
    println!("Detail rows:        {}", stats.detail_rows());
    println!("Skipped archives:   {}", stats.skipped_total());
    for (kind, count) in stats.skipped_by_reason() {
        println!("  {:<26}{}", format!("{}:", kind.label()), count);
    }
}

fn print_collisions(collisions: &[CidCollision]) {
    println!("CID collisions:     {}", collisions.len());
    for collision in collisions {
        let repos: Vec<String> = collision
            .repositories
            .iter()
            .map(|(owner, project)| format!("{owner}/{project}"))
            .collect();
        println!("  {}: {}", collision.cid, repos.join(", "));
    }
}

fn run_all(args: RunArgs) -> Result<()> {
    let start = Instant::now();
    let config = RunConfig {
        root: expand_root(&args.layout.root),
        output_dir: args.output_dir,
        layout: args.layout.layout,
        list_name: args.list_name,
        limit: args.limit,
        show_progress: true,
    };
    let report = pipeline::run(&config)?;

    println!();
    println!("=== Summary ===");
    println!("Total time:         {:.2}s", start.elapsed().as_secs_f64());
    println!("Archives found:     {}", report.records);
    print_skips(&report.stats);
    println!("Incomplete rows:    {}", report.stats.incomplete_rows());
    println!("Canonical rows:     {}", report.selected);
    println!("Selected repos:     {}", report.selection.repositories.len());
    print_collisions(&report.collisions);
    println!("Output:             {}", config.output_dir.display());
    Ok(())
}

fn run_initial_info(args: InitialInfoArgs) -> Result<()> {
    let root = expand_root(&args.layout.root);
    let locator = ArchiveLocator::new(&root, args.layout.layout)?;
    let stats = RunStats::new();
    let records = collect_records(&locator, &stats)?;
    write_table(&args.output, &records)?;
    println!("Archives found:     {}", records.len());
    println!("Skipped:            {}", stats.skipped_total());
    Ok(())
}

fn run_refine_info(args: RefineInfoArgs) -> Result<()> {
    let records: Vec<DatabaseRecord> = read_table(&args.input)?;
    info!(records = records.len(), "Loaded database table");
    let stats = RunStats::new();
    let details = pipeline::refine(&records, &stats, true);
    write_table(&args.output, &details)?;
    print_skips(&stats);
    Ok(())
}

fn run_unique(args: UniqueArgs) -> Result<()> {
    let rows: Vec<DetailRow> = read_table(&args.input)?;
    let stats = RunStats::new();
    let (identified, dedup) = pipeline::unique(&rows, &stats);
    if let Some(path) = &args.with_cids {
        write_table(path, &identified)?;
    }
    write_table(&args.output, &dedup.selection)?;
    if let Some(path) = &args.collisions {
        write_collisions(path, &dedup.collisions)?;
    }
    println!("Input rows:         {}", rows.len());
    println!("Incomplete rows:    {}", stats.incomplete_rows());
    println!("Canonical rows:     {}", dedup.selection.len());
    print_collisions(&dedup.collisions);
    Ok(())
}

fn run_generate_selection(args: GenerateSelectionArgs) -> Result<()> {
    let rows: Vec<DetailRow> = read_table(&args.input)?;
    if rows.iter().any(|r| r.cid.is_none()) {
        anyhow::bail!(
            "{} has rows without a CID; run `unique` first",
            args.input.display()
        );
    }
    let selection = Selection::from_rows(&args.list_name, &rows, args.limit);
    write_json(&args.vscode, &selection.vscode())
        .with_context(|| format!("Failed to write {}", args.vscode.display()))?;
    write_json(&args.gh, &selection.gh())
        .with_context(|| format!("Failed to write {}", args.gh.display()))?;
    if let Some(path) = &args.keys {
        write_keys(path, &selection.bucket_keys)?;
    }
    println!("Selected repos:     {}", selection.repositories.len());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    let result = match cli.command {
        Commands::Run(args) => run_all(args),
        Commands::InitialInfo(args) => run_initial_info(args),
        Commands::RefineInfo(args) => run_refine_info(args),
        Commands::Unique(args) => run_unique(args),
        Commands::GenerateSelection(args) => run_generate_selection(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
