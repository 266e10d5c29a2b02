use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use backfill_engine::{
    BackfillConfig, BackfillPipeline, ReportDestination, RunMode, RunOutcome, RunSummary,
    DUPLICATE_GROUP_THRESHOLD,
};
use backfill_storage::{CatalogStore, PgCatalogStore, PgPoolConfig};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "backfill-cli")]
#[command(about = "Migrate legacy exercise_videos rows into video_catalog")]
struct Cli {
    /// Write to video_catalog. Without this flag the run is a dry run.
    #[arg(long)]
    confirm: bool,
    /// Proceed even when more than 20 duplicate YouTube groups are found.
    #[arg(long = "force-over-20")]
    force_over_20: bool,
    /// Where to write the duplicate report (overrides BACKFILL_REPORT_PATH).
    #[arg(long)]
    report_path: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("backfill failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mode = RunMode::from_confirm_flag(cli.confirm);
    info!(
        mode = mode.as_str(),
        force_over_threshold = cli.force_over_20,
        threshold = DUPLICATE_GROUP_THRESHOLD,
        "video catalog backfill"
    );

    let mut config = BackfillConfig::from_env()?
        .with_mode(mode)
        .with_force_over_threshold(cli.force_over_20);
    if let Some(path) = cli.report_path {
        config = config.with_report_path(path);
    }

    let store = PgCatalogStore::connect(&config.database_url, PgPoolConfig::default()).await?;
    let pipeline = BackfillPipeline::new(store, config);
    let result = pipeline.run().await;
    pipeline.store().close().await;

    match result? {
        RunOutcome::NothingToMigrate => println!("nothing to migrate: exercise_videos has no live rows"),
        RunOutcome::DryRun(summary) => {
            print_summary(&summary);
            println!("dry run complete; re-run with --confirm to write to video_catalog");
        }
        RunOutcome::Committed(summary) => {
            print_summary(&summary);
            match summary.catalog_rows_after {
                Some(rows) => println!(
                    "backfill complete: inserted {} rows, video_catalog now has {rows} rows",
                    summary.inserted
                ),
                None => println!("backfill complete: no rows to insert"),
            }
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "source rows={} youtube={} duplicates skipped={} upload={} other types skipped={} transform errors={} to insert={}",
        summary.source_rows,
        summary.youtube_canonical,
        summary.youtube_duplicates,
        summary.upload,
        summary.skipped_other,
        summary.transform_errors,
        summary.rows_to_insert
    );
    match &summary.report {
        ReportDestination::File(path) => println!("report: {}", path.display()),
        ReportDestination::Stdout => println!("report: printed above (file write failed)"),
    }
}
