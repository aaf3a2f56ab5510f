use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use narrate::config::schema::parse_duration;
use narrate::narration::load_segments;
use narrate::{Config, Narrator, Voice};

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Synthesize narration segments in parallel and merge them into one audio file")]
#[command(version)]
struct Cli {
    /// Segment JSON file ({"result": [...]} or a bare array)
    segments: PathBuf,

    /// Config file (default: per-user config dir)
    #[arg(short, long, env = "NARRATE_CONFIG")]
    config: Option<PathBuf>,

    /// Voice key or backend voice name
    #[arg(short, long)]
    voice: Option<Voice>,

    /// Directory for segment audio and the merged track
    #[arg(short, long)]
    work_dir: Option<String>,

    /// Maximum concurrent synthesis calls
    #[arg(short = 'j', long)]
    max_concurrent: Option<usize>,

    /// Per-segment synthesis timeout, e.g. "90s" or "2m"
    #[arg(short, long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Merged file name
    #[arg(short, long)]
    output: Option<String>,

    /// Remove per-segment files after a successful merge
    #[arg(long)]
    discard_segments: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(voice) = self.voice {
            config.narration.voice = voice;
        }
        if let Some(dir) = &self.work_dir {
            config.narration.work_dir = dir.clone();
        }
        if let Some(n) = self.max_concurrent {
            config.narration.max_concurrent = n;
        }
        if self.timeout.is_some() {
            config.narration.task_timeout = self.timeout;
        }
        if self.output.is_some() {
            config.narration.output_name = self.output.clone();
        }
        if self.discard_segments {
            config.narration.keep_segments = false;
        }
    }
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("narrate=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    let segments = load_segments(&cli.segments)?;
    let narrator = Narrator::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling outstanding synthesis");
            on_signal.cancel();
        }
    });

    let run = narrator
        .run_with_cancel(&segments, config.narration.voice, cancel)
        .await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(());
    }

    let report = &run.report;
    println!(
        "Synthesized {}/{} segments",
        run.results.success_count(),
        run.results.len()
    );
    for (index, reason) in &report.skipped_indices {
        println!("  skipped {:>3}: {}", index, reason);
    }
    match &report.output_path {
        Some(path) => println!("Merged audio: {}", path.display()),
        None => println!("No merged file was created."),
    }
    Ok(())
}
