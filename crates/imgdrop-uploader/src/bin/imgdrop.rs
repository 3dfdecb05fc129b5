use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use imgdrop_core::{UploadCandidate, UploaderConfig};
use imgdrop_storage::create_storage;
use imgdrop_uploader::telemetry::init_tracing;
use imgdrop_uploader::{Notification, NotificationKind, Notifier, UploadOrchestrator};

#[derive(Parser, Debug)]
#[command(name = "imgdrop")]
#[command(about = "Validate, convert, shrink and upload one image")]
struct Args {
    /// Image to upload; omitted means no file selected
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Launch query string carrying the upload token (e.g. "?token=abc")
    #[arg(long, value_name = "QUERY")]
    launch_query: Option<String>,

    /// MIME type reported for the file
    #[arg(long, value_name = "MIME")]
    mime: Option<String>,

    /// Print the outcome as JSON and log in JSON lines
    #[arg(long)]
    json: bool,
}

/// Prints each notification as a blocking acknowledgment on stdout.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) {
        let marker = match notification.kind {
            NotificationKind::Success => "ok",
            NotificationKind::Rejection => "rejected",
            NotificationKind::Failure => "error",
        };
        println!("[{}] {}", marker, notification.title);
        if let Some(ref detail) = notification.detail {
            println!("       {}", detail);
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.json);

    let config = UploaderConfig::from_env().context("Invalid configuration")?;
    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize storage")?;

    let mut orchestrator =
        UploadOrchestrator::start(&config, storage, args.launch_query.as_deref()).await;
    if !args.json {
        orchestrator = orchestrator.with_notifier(Arc::new(ConsoleNotifier));
    }

    let candidate = match args.file {
        Some(ref path) => {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let candidate = UploadCandidate::new(name, data);
            Some(match args.mime {
                Some(ref mime) => candidate.with_declared_mime(mime.clone()),
                None => candidate,
            })
        }
        None => None,
    };
    orchestrator.select_file(candidate);

    let outcome = orchestrator
        .trigger_upload()
        .await
        .context("Upload already in progress")?;

    if args.json {
        let report = serde_json::json!({
            "outcome": outcome,
            "notification": Notification::from_outcome(&outcome),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if let Some(reference) = outcome.reference() {
        println!("{}", reference.url);
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
