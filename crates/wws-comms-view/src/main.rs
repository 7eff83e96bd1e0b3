//! `wws-comms`: live terminal view of agent topology and comms events.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wws_comms_view::console::run_console;
use wws_comms_view::{HttpBackend, ViewConfig, ViewModel};

#[derive(Parser, Debug)]
#[command(name = "wws-comms", version, about = "Live agent topology and comms event feed")]
struct Args {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Kernel API base URL, e.g. http://127.0.0.1:4200.
    #[arg(long)]
    base_url: Option<String>,

    /// Access token appended to the event stream URL.
    #[arg(long)]
    token: Option<String>,

    /// Number of recent events to load on start (max 200).
    #[arg(long)]
    event_limit: Option<usize>,

    /// Log filter, e.g. `debug` or `wws_comms_view=trace`. Overrides RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Defaults, then file, then environment, then flags.
    fn resolve_config(&self) -> anyhow::Result<ViewConfig> {
        let mut config = ViewConfig::load(self.config.as_deref())?;
        config.apply_env();
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if let Some(limit) = self.event_limit {
            config.event_limit = limit;
        }
        config.validate()?;
        Ok(config)
    }
}

/// The console owns the terminal, so logs go to `<log_dir>/comms.log`.
fn init_logging(config: &ViewConfig, level: Option<&str>) -> anyhow::Result<PathBuf> {
    let dir = config.log_dir();
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("comms.log");
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = match level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();
    Ok(path)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = args.resolve_config()?;
    let log_path = init_logging(&config, args.log_level.as_deref())?;
    let backend = Arc::new(HttpBackend::new(&config)?);
    tracing::info!(
        base_url = backend.base_url(),
        log = %log_path.display(),
        "Starting comms console"
    );

    let mut view = ViewModel::new(backend).with_event_limit(config.effective_event_limit());
    // A failed first load is shown in the console and can be retried there.
    if let Err(e) = view.activate().await {
        tracing::debug!(error = %e, "Starting with an empty view");
    }

    run_console(&mut view, config.tick_rate()).await
}
