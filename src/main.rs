use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use auto_attend::config::AppConfig;
use auto_attend::janitor::Janitor;
use auto_attend::logging;
use auto_attend::server;
use auto_attend::tasks::{run_submission, SubmissionParams};

#[derive(Parser)]
#[command(name = "auto-attend")]
#[command(about = "Merges participation reports and roster exports into an attendance workbook")]
#[command(version)]
struct Cli {
    /// Path to an optional TOML config file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP upload server
    Serve {
        /// Listen port (overrides the PORT env var and the config file)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Process one submission from local files and print the summary
    Run {
        /// Participation report export (UTF-16LE text)
        #[arg(long)]
        report: PathBuf,
        /// Roster export (UTF-8 CSV)
        #[arg(long)]
        roster: PathBuf,
        /// Attendance workbook (.xlsx)
        #[arg(long)]
        workbook: PathBuf,
    },
}

fn port_from_env() -> Option<u16> {
    std::env::var("PORT").ok().and_then(|v| v.parse().ok())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = AppConfig::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Serve { port } => {
            let port = port
                .or_else(port_from_env)
                .unwrap_or(config.server.port);

            std::fs::create_dir_all(&config.storage.results_dir)?;
            std::fs::create_dir_all(&config.storage.public_results_dir)?;
            info!(
                "results folder: {}, public mirror: {}",
                config.storage.results_dir.display(),
                config.storage.public_results_dir.display()
            );

            let janitor = Arc::new(Janitor::new(Duration::from_secs(config.cleanup.delay_secs)));
            server::start_server(Arc::new(config), janitor, port).await?;
        }
        Commands::Run {
            report,
            roster,
            workbook,
        } => {
            let params = SubmissionParams {
                report_bytes: std::fs::read(&report)?,
                roster_bytes: std::fs::read(&roster)?,
                workbook_bytes: std::fs::read(&workbook)?,
                workbook_filename: basename(&workbook),
            };
            let summary = run_submission(&config, &params, chrono::Utc::now())?;

            println!("\n📊 Reconciliation results:");
            println!("   Participants parsed: {}", summary.participants_parsed);
            println!("   Names marked present: {}", summary.present_names);
            println!(
                "   Cells updated: attendance={} login={} logout={} duration={}",
                summary.updates.attendance,
                summary.updates.login_time,
                summary.updates.logout_time,
                summary.updates.duration
            );
            println!("   Result file: {}", summary.result_path.display());
        }
    }
    Ok(())
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook.xlsx".to_string())
}
