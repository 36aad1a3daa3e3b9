use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "neta")]
#[command(about = "Lok Sabha member roster: merge MyNeta and Sansad data, publish entities")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape both sources, merge by constituency and write the combined CSV.
    Merge,
    /// Upload photos and submit one entity per CSV row.
    Publish,
    /// Print the normalized join key for each constituency name.
    Normalize { names: Vec<String> },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    match cli.command.unwrap_or(Commands::Merge) {
        Commands::Merge => {
            let summary = neta_sync::run_merge_once_from_env().await?;
            println!(
                "merge complete: run_id={} rows={} matched={} unmatched={} orphaned={} csv={} reports={}",
                summary.run_id,
                summary.report.total,
                summary.report.matched,
                summary.report.unmatched_keys.len(),
                summary.report.orphaned_keys.len(),
                summary.output_csv,
                summary.reports_dir
            );
        }
        Commands::Publish => {
            let config = neta_publish::PublishConfig::from_env()?;
            let summary = neta_publish::Publisher::new(config)?.run().await?;
            println!(
                "publish complete: published={} skipped={} failed={} remaining={} results={}",
                summary.published,
                summary.skipped_missing_photo,
                summary.failed,
                summary.remaining,
                summary.results_file.as_deref().unwrap_or("-")
            );
        }
        Commands::Normalize { names } => {
            for name in names {
                println!("{name}\t{}", neta_core::normalize_constituency(&name).as_str());
            }
        }
    }

    Ok(())
}
