#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for roadwatch.
//!
//! ```text
//! roadwatch serve
//! roadwatch analyze <image> --lat 22.7196 --lng 75.8577
//! roadwatch batch <manifest.json>
//! roadwatch issues [--status Open] [--issue-type pothole] [--limit 20]
//! roadwatch status <id> "In Progress"
//! roadwatch health
//! ```
//!
//! The store and vision provider are selected through the same environment
//! variables as the server. Logs go through `indicatif-log-bridge` (via
//! [`roadwatch_cli_utils::init_logger`]) so they don't break the batch
//! progress bar.

mod manifest;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use roadwatch_cli_utils::{IndicatifProgress, MultiProgress};
use roadwatch_issue_models::{Issue, IssueQuery, IssueStatus, IssueType};
use roadwatch_pipeline::config::PipelineConfig;
use roadwatch_pipeline::detection::DetectionPipeline;
use roadwatch_pipeline::{health, list_issues, status};
use roadwatch_store::IssueStore;
use roadwatch_vision::providers::{Classifier, create_classifier_from_env};

#[derive(Parser)]
#[command(name = "roadwatch", about = "Detect and track street defects from images")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Analyze a single image file
    Analyze {
        /// Path to a JPEG, PNG, GIF, or WebP image
        path: PathBuf,
        /// Latitude where the image was taken
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude where the image was taken
        #[arg(long, allow_negative_numbers = true)]
        lng: f64,
    },
    /// Analyze images listed in a JSON manifest of `{path, lat, lng}`
    Batch {
        /// Manifest file; image paths are relative to its directory
        manifest: PathBuf,
    },
    /// List stored issues, newest first
    Issues {
        /// Only issues with this status (Open, "In Progress", Resolved)
        #[arg(long)]
        status: Option<IssueStatus>,
        /// Only issues of this kind (pothole, trash, broken_light)
        #[arg(long)]
        issue_type: Option<IssueType>,
        /// Maximum number of issues to show
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Change an issue's status
    Status {
        /// Issue ID
        id: String,
        /// New status: Open, "In Progress", or Resolved
        status: String,
    },
    /// Show the road health score over open issues
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = roadwatch_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            // actix-web brings its own runtime; keep it off this one.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(roadwatch_server::run_server())
            })
            .await??;
        }
        Commands::Analyze { path, lat, lng } => {
            let pipeline = pipeline_from_env().await?;
            let payload = manifest::load_image(&path)?.to_data_url();
            log::info!("Analyzing {}", path.display());

            let outcome = pipeline
                .analyze_one(Some(payload.as_str()), Some(lat), Some(lng))
                .await?;

            println!("{}", serde_json::to_string_pretty(&outcome.detection)?);
            match outcome.issue {
                Some(issue) => {
                    log::info!("Stored {} issue {}", issue.issue_type, issue.id);
                    println!("\nStored issue {}", issue.id);
                }
                None => println!("\nNo infrastructure issues detected"),
            }
        }
        Commands::Batch { manifest } => run_batch(&multi, &manifest).await?,
        Commands::Issues {
            status,
            issue_type,
            limit,
        } => {
            let store = roadwatch_store::open_from_env().await?;
            let query = IssueQuery {
                status,
                issue_type,
                limit,
            };
            let issues = list_issues(store.as_ref(), &query).await?;
            print_issues(&issues);
        }
        Commands::Status {
            id,
            status: new_status,
        } => {
            let store = roadwatch_store::open_from_env().await?;
            let issue = status::set_status(store.as_ref(), &id, &new_status).await?;
            println!("Issue {} is now {}", issue.id, issue.status);
        }
        Commands::Health => {
            let store = roadwatch_store::open_from_env().await?;
            let stats = health::compute_stats(store.as_ref()).await?;

            println!("Grade:          {}", stats.grade);
            println!("Open issues:    {}", stats.total_issues);
            println!("  Potholes:     {}", stats.pothole_count);
            println!("  Trash:        {}", stats.trash_count);
            println!("  Broken light: {}", stats.light_count);
            println!("Avg severity:   {:.2}", stats.avg_severity);
        }
    }

    Ok(())
}

async fn pipeline_from_env() -> Result<DetectionPipeline, Box<dyn std::error::Error>> {
    let store: Arc<dyn IssueStore> = roadwatch_store::open_from_env().await?;
    let classifier: Arc<dyn Classifier> = Arc::from(create_classifier_from_env()?);
    let config = PipelineConfig::from_env();
    log::debug!(
        "Pipeline config: max_batch={} delay={:?} threshold={}",
        config.max_batch,
        config.inter_item_delay,
        config.confidence_threshold
    );
    Ok(DetectionPipeline::new(classifier, store, config))
}

async fn run_batch(
    multi: &MultiProgress,
    manifest_path: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let items = manifest::load(manifest_path)?;
    log::info!(
        "Loaded {} image(s) from {}",
        items.len(),
        manifest_path.display()
    );
    let pipeline = pipeline_from_env().await?;

    let progress = IndicatifProgress::batch_bar(multi, "Analyzing images");
    let outcome = pipeline.analyze_batch(&items, &progress).await?;

    for result in &outcome.results {
        match &result.outcome {
            Ok(analysis) => match &analysis.issue {
                Some(issue) => println!(
                    "[{}] {} severity {} -> {}",
                    result.index,
                    issue.issue_type,
                    issue.severity.value(),
                    issue.id
                ),
                None => println!("[{}] no issue", result.index),
            },
            Err(e) => {
                log::warn!("Image {} failed: {e}", result.index);
                println!("[{}] failed: {e}", result.index);
            }
        }
    }

    println!("\n{}", outcome.summary());

    Ok(())
}

fn print_issues(issues: &[Issue]) {
    if issues.is_empty() {
        println!("No issues found.");
        return;
    }

    println!(
        "{:<38} {:<13} {:<4} {:<12} {:<22} LOCATION",
        "ID", "TYPE", "SEV", "STATUS", "CREATED"
    );
    println!("{}", "-".repeat(110));

    for issue in issues {
        println!(
            "{:<38} {:<13} {:<4} {:<12} {:<22} {:.5},{:.5}",
            issue.id,
            issue.issue_type.as_ref(),
            issue.severity.value(),
            issue.status.as_ref(),
            issue.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            issue.lat,
            issue.lng,
        );
    }

    println!("\n{} issue(s)", issues.len());
}
