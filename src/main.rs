use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use tracing::{error, info};

use product_organiser::config::{Config, Layout};
use product_organiser::fsops::validate_root;
use product_organiser::jobs::{JobKind, JobRegistry, JobState};
use product_organiser::logging::{self, Verbosity};
use product_organiser::organize::{self, OrganiseOptions, OrganiseReport};
use product_organiser::split::{self, SplitOptions, SplitReport};
use product_organiser::transfer::{self, TransferOptions, TransferReport};

#[derive(Parser)]
#[command(name = "product-organiser")]
#[command(about = "Organize product media into brand/product/category folders")]
struct Cli {
    /// Config file (default: ~/.config/product-organiser.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Only warnings and errors on stderr, with a progress bar
    #[arg(long, short, global = true)]
    quiet: bool,
    /// Include parse traces
    #[arg(long, short, global = true)]
    verbose: bool,
    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Root folder holding contributor drops and the staging folder
    root: PathBuf,
    /// Actually perform file operations (default: dry-run)
    #[arg(long)]
    execute: bool,
    /// Print the report as JSON instead of a summary line
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Bucket raw drops into staging, Needs Labeling and gslisting
    Split(CommonArgs),
    /// Sort the staging folder into brand/product/category folders
    Organise {
        #[command(flatten)]
        args: CommonArgs,
        /// Staging folder to organise (default: the configured one below ROOT)
        #[arg(long)]
        staging: Option<PathBuf>,
    },
    /// Split then organise
    Run(CommonArgs),
    /// Move staging subfolders into matching folders of ROOT
    Transfer(CommonArgs),
}

fn progress_bar(verbosity: Verbosity) -> ProgressBar {
    // Per-file log lines replace the bar unless quiet.
    if verbosity != Verbosity::Quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()), // safe: static template string
    );
    progress
}

fn split_summary(report: &SplitReport) -> String {
    format!(
        "{} images, {} mov, {} media, {} versioned, {} needs labeling, {} gslisting, {} failed, {} folders removed",
        report.images,
        report.mov,
        report.media,
        report.versioned,
        report.needs_labeling,
        report.gslisting,
        report.failed,
        report.removed_dirs
    )
}

fn organise_summary(report: &OrganiseReport) -> String {
    format!(
        "{} moved, {} quarantined, {} unchanged, {} skipped, {} failed, {} folders removed",
        report.moved,
        report.quarantined,
        report.unchanged,
        report.skipped,
        report.failed,
        report.removed_dirs
    )
}

fn transfer_summary(report: &TransferReport) -> String {
    format!(
        "{} moved, {} renamed, {} unmatched, {} failed, {} folders removed",
        report.moved,
        report.renamed,
        report.unmatched.len(),
        report.failed,
        report.removed_folders
    )
}

fn print_summary(lines: &[String], stubborn: &[PathBuf], execute: bool) {
    let prefix = if execute { "" } else { "[DRY RUN] " };
    for line in lines {
        println!("{prefix}{line}");
    }
    if !stubborn.is_empty() {
        println!("{} empty folders could not be removed:", stubborn.len());
        for dir in stubborn {
            println!("  {}", dir.display());
        }
    }
    if !execute {
        println!("\nPass --execute to perform operations.");
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn staging_missing_in_dry_run(root: &Path, layout: &Layout, execute: bool) -> bool {
    !execute && !layout.staging_dir(root).is_dir()
}

fn run_split(args: &CommonArgs, layout: Layout, progress: &ProgressBar) -> anyhow::Result<bool> {
    let options = SplitOptions {
        execute: args.execute,
        layout,
    };
    let report = split::split(&args.root, &options, progress)
        .with_context(|| format!("split of {} failed", args.root.display()))?;
    if args.json {
        print_json(&json!(report))?;
    } else {
        print_summary(&[split_summary(&report)], &report.stubborn_dirs, args.execute);
    }
    Ok(report.success())
}

fn run_organise(
    args: &CommonArgs,
    staging: Option<&Path>,
    layout: Layout,
    progress: &ProgressBar,
) -> anyhow::Result<bool> {
    let staging = staging.map_or_else(|| layout.staging_dir(&args.root), |dir| args.root.join(dir));
    let options = OrganiseOptions {
        execute: args.execute,
        layout,
    };
    let report = organize::organise(&staging, &options, progress)?;
    if args.json {
        print_json(&json!(report))?;
    } else {
        print_summary(&[organise_summary(&report)], &report.stubborn_dirs, args.execute);
    }
    Ok(report.success())
}

fn run_pipeline(args: &CommonArgs, layout: Layout, progress: &ProgressBar) -> anyhow::Result<bool> {
    validate_root(&args.root)?;
    let registry = JobRegistry::new();
    let job = registry.begin(JobKind::Organise, "Organizing files...")?;

    let split_options = SplitOptions {
        execute: args.execute,
        layout: layout.clone(),
    };
    let split_report = match split::split(&args.root, &split_options, progress) {
        Ok(report) => report,
        Err(e) => {
            job.finish(JobState::Failed(e.to_string()), "Split failed");
            return Err(e.into());
        }
    };
    if !split_report.success() {
        info!("Split completed with warnings, continuing with organisation");
    }
    job.update("Split complete, organizing staging folder...");

    let organise_report = if staging_missing_in_dry_run(&args.root, &layout, args.execute) {
        info!("Staging folder would be created by the split pass");
        OrganiseReport::default()
    } else {
        let options = OrganiseOptions {
            execute: args.execute,
            layout,
        };
        match organize::organise_root(&args.root, &options, &progress_bar_like(progress)) {
            Ok(report) => report,
            Err(e) => {
                job.finish(JobState::Failed(e.to_string()), "Organisation failed");
                return Err(e.into());
            }
        }
    };

    let success = split_report.success() && organise_report.success();
    let (state, message) = if success {
        (JobState::Succeeded, "Organization complete")
    } else {
        (
            JobState::CompletedWithWarnings,
            "Organization complete, but some empty folders remain",
        )
    };
    let status = job.finish(state, message);

    if args.json {
        print_json(&json!({
            "job": status,
            "split": split_report,
            "organise": organise_report,
        }))?;
    } else {
        let stubborn: Vec<PathBuf> = split_report
            .stubborn_dirs
            .iter()
            .chain(&organise_report.stubborn_dirs)
            .cloned()
            .collect();
        print_summary(
            &[
                format!("split: {}", split_summary(&split_report)),
                format!("organise: {}", organise_summary(&organise_report)),
            ],
            &stubborn,
            args.execute,
        );
    }
    Ok(success)
}

/// A fresh bar with the same visibility, since the split pass finished the first one.
fn progress_bar_like(progress: &ProgressBar) -> ProgressBar {
    if progress.is_hidden() {
        ProgressBar::hidden()
    } else {
        progress_bar(Verbosity::Quiet)
    }
}

fn run_transfer(args: &CommonArgs, layout: Layout, progress: &ProgressBar) -> anyhow::Result<bool> {
    let registry = JobRegistry::new();
    let job = registry.begin(JobKind::Transfer, "Transferring files...")?;
    let options = TransferOptions {
        execute: args.execute,
        layout,
    };
    let report = match transfer::transfer(&args.root, &options, progress) {
        Ok(report) => report,
        Err(e) => {
            job.finish(JobState::Failed(e.to_string()), "Transfer failed");
            return Err(e.into());
        }
    };
    let state = if report.success() {
        JobState::Succeeded
    } else {
        JobState::CompletedWithWarnings
    };
    let status = job.finish(state, "Transfer complete");

    if args.json {
        print_json(&json!({ "job": status, "transfer": report }))?;
    } else {
        print_summary(&[transfer_summary(&report)], &[], args.execute);
        for name in &report.unmatched {
            println!("No matching folder for: {name}");
        }
    }
    Ok(report.success())
}

fn run(cli: Cli, verbosity: Verbosity) -> anyhow::Result<bool> {
    let config = Config::load(cli.config.as_deref())?;
    let layout = config.layout;
    let progress = progress_bar(verbosity);

    match cli.command {
        Commands::Split(args) => run_split(&args, layout, &progress),
        Commands::Organise { args, staging } => {
            run_organise(&args, staging.as_deref(), layout, &progress)
        }
        Commands::Run(args) => run_pipeline(&args, layout, &progress),
        Commands::Transfer(args) => run_transfer(&args, layout, &progress),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    let _guard = logging::init(verbosity, cli.log_file.as_deref());

    match run(cli, verbosity) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
