mod config;
mod progress;

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use simpleupload_protocol::DestinationConfig;
use simpleupload_transfer::SourceFile;
use simpleupload_uploader::{BatchOutcome, BatchStatus, BatchUploadOrchestrator};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{CliConfig, Overrides};

/// Uploads files in chunks to a SimpleUpload server.
#[derive(Parser, Debug)]
#[command(name = "simpleupload", version, about, long_about = None)]
struct Cli {
    /// Files to upload, in order.
    #[arg(required_unless_present = "check_destination")]
    files: Vec<PathBuf>,

    /// Upload endpoint URL.
    #[arg(long, short = 'e')]
    endpoint: Option<String>,

    /// Maximum chunk size in MiB.
    #[arg(long, value_name = "MIB")]
    chunk_size: Option<u64>,

    /// Attempts per chunk before the file fails.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Per-attempt timeout in seconds.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Pause between attempts in seconds.
    #[arg(long, value_name = "SECS")]
    retry_delay: Option<u64>,

    /// Send a SHA-256 of every chunk.
    #[arg(long)]
    checksums: bool,

    /// Config file (default: ~/.config/simpleupload/config.json).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verify the storage destination environment and exit.
    #[arg(long)]
    check_destination: bool,

    /// Hide progress bars.
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Debug logging.
    #[arg(long, short = 'v')]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            endpoint: self.endpoint.clone(),
            chunk_size_mib: self.chunk_size,
            max_attempts: self.max_attempts,
            timeout_secs: self.timeout,
            retry_delay_secs: self.retry_delay,
            checksums: self.checksums,
            no_progress: self.quiet,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "info,simpleupload=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    if cli.check_destination {
        let destination = DestinationConfig::from_env();
        destination.validate()?;
        println!(
            "destination: {} container {}",
            destination.service_url(),
            destination.container_name
        );
        if cli.files.is_empty() {
            return Ok(ExitCode::SUCCESS);
        }
    }

    let config = CliConfig::load(cli.config.as_deref())?.apply(&cli.overrides());

    let mut sources = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let source = SourceFile::open(path)
            .await
            .with_context(|| format!("cannot upload {}", path.display()))?;
        sources.push(source);
    }

    let mut orchestrator = BatchUploadOrchestrator::with_http(config.transfer)?;
    let events = orchestrator
        .take_events()
        .context("upload event stream unavailable")?;
    let renderer = tokio::spawn(progress::render(events, config.show_progress));

    orchestrator.select_files(sources);
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let outcome = upload_until_interrupted(&mut orchestrator, interrupt).await;
    let _ = renderer.await;

    info!(status = ?outcome.status, files = outcome.files.len(), "batch finished");
    println!("{}", outcome.status_message());

    Ok(match outcome.status {
        BatchStatus::Succeeded => ExitCode::SUCCESS,
        BatchStatus::Failed => ExitCode::FAILURE,
        BatchStatus::Aborted => ExitCode::from(130),
    })
}

/// Runs the selected batch and aborts it when `interrupt` resolves.
///
/// The upload is polled first, so its abort token is armed before the
/// interrupt can fire.
async fn upload_until_interrupted<F>(
    orchestrator: &mut BatchUploadOrchestrator,
    interrupt: F,
) -> BatchOutcome
where
    F: Future<Output = ()>,
{
    let abort = orchestrator.abort_handle();
    let upload = orchestrator.upload();
    tokio::pin!(upload, interrupt);

    tokio::select! {
        biased;
        outcome = &mut upload => return outcome,
        () = &mut interrupt => {
            warn!("interrupt received, aborting upload");
            abort.abort();
        }
    }
    upload.await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::pin::Pin;
    use std::sync::Arc;

    use clap::CommandFactory;
    use simpleupload_protocol::UploadStatus;
    use simpleupload_uploader::{
        AttemptOutcome, ChunkRequest, ChunkTransport, ProgressFn, TransferSettings,
    };
    use tokio_util::sync::CancellationToken;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn files_required_without_check() {
        assert!(Cli::try_parse_from(["simpleupload"]).is_err());
        assert!(Cli::try_parse_from(["simpleupload", "--check-destination"]).is_ok());
    }

    #[test]
    fn flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "simpleupload",
            "-e",
            "http://localhost:9000/api/upload",
            "--chunk-size",
            "16",
            "--max-attempts",
            "5",
            "--checksums",
            "-q",
            "a.bin",
            "b.bin",
        ])
        .unwrap();

        assert_eq!(cli.files, vec![PathBuf::from("a.bin"), PathBuf::from("b.bin")]);
        let o = cli.overrides();
        assert_eq!(o.endpoint.as_deref(), Some("http://localhost:9000/api/upload"));
        assert_eq!(o.chunk_size_mib, Some(16));
        assert_eq!(o.max_attempts, Some(5));
        assert!(o.checksums);
        assert!(o.no_progress);
        assert_eq!(o.timeout_secs, None);
    }

    /// Holds every chunk until its cancel token fires.
    struct Stalled;

    impl ChunkTransport for Stalled {
        fn send_chunk<'a>(
            &'a self,
            _request: &'a ChunkRequest<'a>,
            _progress: &'a ProgressFn<'a>,
            cancel: &'a CancellationToken,
        ) -> Pin<Box<dyn Future<Output = AttemptOutcome> + Send + 'a>> {
            Box::pin(async move {
                cancel.cancelled().await;
                AttemptOutcome::Aborted
            })
        }
    }

    fn stalled_batch() -> BatchUploadOrchestrator {
        let mut orchestrator =
            BatchUploadOrchestrator::new(Arc::new(Stalled), TransferSettings::default());
        orchestrator.select_files([SourceFile::from_bytes("a.bin", vec![1u8; 8]).unwrap()]);
        orchestrator
    }

    #[tokio::test]
    async fn early_interrupt_aborts_the_batch() {
        let mut orchestrator = stalled_batch();
        // Already signalled before the batch has started.
        let outcome = upload_until_interrupted(&mut orchestrator, std::future::ready(())).await;

        assert_eq!(outcome.status, BatchStatus::Aborted);
        assert!(orchestrator.abort_handle().is_aborted());
    }

    #[tokio::test]
    async fn interrupt_during_upload_aborts_the_batch() {
        let mut orchestrator = stalled_batch();
        let interrupt = tokio::time::sleep(std::time::Duration::from_millis(20));

        let outcome = upload_until_interrupted(&mut orchestrator, interrupt).await;

        assert_eq!(outcome.status, BatchStatus::Aborted);
        assert_eq!(outcome.files[0].status(), UploadStatus::Aborted);
    }
}
