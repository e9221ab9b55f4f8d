mod output;
mod status;

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use harvester_client::ChromiumLauncher;
use harvester_core::{ResourceTarget, ScrapeConfig, ScrapeEngine, ScrapeReporter, TracingReporter};

use output::{Format, RecordWriter};
use status::StatusLine;

#[derive(Parser)]
#[command(name = "harvester", version, about = "Browser-driven feed harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Stop after this many records (0 = unlimited)
    #[arg(short, long, global = true, default_value_t = 0)]
    total: usize,

    /// Show the browser window
    #[arg(long, global = true, default_value_t = false)]
    headful: bool,

    /// Do not render the status line
    #[arg(long, global = true, default_value_t = false)]
    silent: bool,

    /// Seconds to sleep between poll cycles
    #[arg(long, global = true, default_value_t = 2)]
    sleep: u64,

    /// Seconds to hibernate after a rate-limit response
    #[arg(long, global = true, default_value_t = 1200)]
    hibernate: u64,

    /// Never relaunch the browser to replay the last data request
    #[arg(long, global = true, default_value_t = false)]
    no_graft: bool,

    /// Jumps between two browser relaunches
    #[arg(long, global = true, default_value_t = 100)]
    graft_every: u64,

    /// Fetch each post's detail payload instead of the feed envelope
    #[arg(long, global = true, default_value_t = false)]
    full: bool,

    /// Proxy server for the browser (e.g. "socks5://127.0.0.1:9050")
    #[arg(long, global = true, env = "HARVESTER_PROXY")]
    proxy: Option<String>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = Format::Jsonl)]
    format: Format,

    /// Write records to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest posts under a hashtag
    Tag {
        /// Hashtag, with or without the leading '#'
        name: String,
    },

    /// Harvest posts at a location
    Location {
        /// Numeric location id
        id: String,
    },

    /// Harvest posts from an account timeline
    Account {
        /// Username, with or without the leading '@'
        username: String,
    },
}

impl Cli {
    fn target(&self) -> ResourceTarget {
        match &self.command {
            Commands::Tag { name } => ResourceTarget::tag(name),
            Commands::Location { id } => ResourceTarget::location(id),
            Commands::Account { username } => ResourceTarget::account(username),
        }
    }

    fn config(&self) -> ScrapeConfig {
        ScrapeConfig::default()
            .with_total(self.total)
            .with_headless(!self.headful)
            .with_silent(self.silent)
            .with_poll_interval(Duration::from_secs(self.sleep))
            .with_hibernation(Duration::from_secs(self.hibernate))
            .with_graft(!self.no_graft)
            .with_graft_every(self.graft_every)
            .with_full_detail(self.full)
            .with_proxy(self.proxy.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log.as_deref())?;

    let target = cli.target();
    target.url().map_err(|e| anyhow::anyhow!(e))?;
    let config = cli.config();

    let out: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };
    let writer = RecordWriter::new(cli.format, out)?;

    tracing::info!("Harvesting {} ({:?})", target.label(), cli.format);

    let engine = ScrapeEngine::new(ChromiumLauncher::new(), target, config);

    // Records on stdout would interleave with the status line.
    let emitted = if cli.output.is_some() && !cli.silent {
        let emitted = harvest(engine.with_reporter(StatusLine), writer).await?;
        println!();
        emitted
    } else {
        harvest(engine.with_reporter(TracingReporter), writer).await?
    };

    tracing::info!("Done: {emitted} records");
    Ok(())
}

fn init_tracing(log: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("harvester=info".parse()?)
        .add_directive("harvester_core=info".parse()?)
        .add_directive("harvester_client=info".parse()?);

    match log {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Drains the engine into `writer`; Ctrl-C stops the engine, which still
/// yields what it already buffered.
async fn harvest<R: ScrapeReporter>(
    engine: ScrapeEngine<ChromiumLauncher, R>,
    mut writer: RecordWriter<Box<dyn Write>>,
) -> Result<usize> {
    let control = engine.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after buffered records");
            control.force_stop();
        }
    });

    let mut stream = std::pin::pin!(engine.into_stream());
    let mut emitted = 0;
    while let Some(record) = stream.next().await {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_fatal() => return Err(anyhow::anyhow!(e).context("Harvest aborted")),
            Err(e) => return Err(anyhow::anyhow!(e)),
        };
        writer.write(&record)?;
        emitted += 1;
    }
    writer.into_inner()?.flush()?;

    Ok(emitted)
}
