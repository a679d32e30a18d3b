use anyhow::{Context, bail};
use clap::Parser;
use dotenvy::dotenv;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use variant_archiver::config::PipelineConfig;
use variant_archiver::infrastructure::storage;
use variant_archiver::services::notification::parse_batch;
use variant_archiver::RecordProcessor;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Notification batch JSON file, or `-` for stdin
    #[arg(short, long, default_value = "-")]
    event: String,

    /// Abort the invocation after this many seconds; in-flight requests are dropped
    #[arg(short, long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "variant_archiver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let payload = if args.event == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("failed to read notification batch from stdin")?;
        buf
    } else {
        tokio::fs::read_to_string(&args.event)
            .await
            .with_context(|| format!("failed to read notification batch {}", args.event))?
    };
    let event = parse_batch(&payload)?;

    let config = PipelineConfig::from_env()?;
    info!(
        "🖼️  Pipeline Config: Sizes=[{}], Resize={:?}, On Failure={:?}, Concurrency={}",
        config
            .sizes
            .iter()
            .map(|s| format!("{}:{}x{}", s.name, s.width, s.height))
            .collect::<Vec<_>>()
            .join(", "),
        config.resize_policy,
        config.decode_failure_policy,
        config.max_concurrent_records
    );

    let storage_service = storage::setup_storage().await;
    let processor = RecordProcessor::new(storage_service, config)?;

    let report = match args.timeout_secs {
        Some(secs) => {
            match tokio::time::timeout(Duration::from_secs(secs), processor.process_batch(&event)).await {
                Ok(report) => report,
                Err(_) => {
                    error!("⏱️  Invocation timed out after {}s", secs);
                    bail!("invocation timed out after {}s", secs);
                }
            }
        }
        None => processor.process_batch(&event).await,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.has_failures() {
        bail!("{} of {} record(s) failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}
