use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use thumbnail_gate::{AccessTokenSource, ImageEvent, ThumbnailConfig, ThumbnailOutcome, ThumbnailPipeline};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "make-thumbnail",
    version,
    about = "Run one thumbnail invocation for an uploaded object"
)]
struct Args {
    /// Trigger payload (storage object JSON or CloudEvent) to replay
    #[arg(short, long, conflicts_with_all = ["bucket", "name"])]
    payload: Option<PathBuf>,

    /// Source bucket of the uploaded object
    #[arg(short, long, requires = "name")]
    bucket: Option<String>,

    /// Name of the uploaded object
    #[arg(short, long, requires = "bucket")]
    name: Option<String>,

    /// Override the destination bucket
    #[arg(long)]
    destination: Option<String>,

    /// Publish the announcement even if NOTIFY_ENABLED is off
    #[arg(long)]
    notify: bool,
}

fn setup_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,thumbnail_gate=debug,make_thumbnail=debug"));

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_event(args: &Args) -> Result<ImageEvent> {
    if let Some(path) = &args.payload {
        return ImageEvent::from_payload_file(path)
            .with_context(|| format!("Failed to load payload {}", path.display()));
    }

    match (&args.bucket, &args.name) {
        (Some(bucket), Some(name)) => Ok(ImageEvent::new(bucket.as_str(), name.as_str())?),
        _ => bail!("either --payload or --bucket and --name are required"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let args = Args::parse();
    let event = load_event(&args)?;

    let mut config = ThumbnailConfig::from_env().context("Failed to load configuration")?;
    if let Some(destination) = &args.destination {
        config.destination_bucket = destination.clone();
    }
    config.notify_enabled |= args.notify;

    let auth = AccessTokenSource::from_env(config.http_client()?);
    let pipeline = ThumbnailPipeline::from_config(&config, auth).context("Failed to create clients")?;

    let outcome = pipeline
        .handle(&event)
        .await
        .with_context(|| format!("Failed to process gs://{}/{}", event.bucket_name, event.object_name))?;

    match &outcome {
        ThumbnailOutcome::Rejected { .. } => info!("{} rejected, nothing written", event.object_name),
        ThumbnailOutcome::Completed {
            destination_bucket,
            destination_object_name,
            ..
        } => info!("Wrote gs://{}/{}", destination_bucket, destination_object_name),
    }

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}
