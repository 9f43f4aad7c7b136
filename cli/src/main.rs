//! proxyprobe - checks candidate proxies by running the full tunnel protocol
//! against each one and reporting whether it is active.
//!
//! ```text
//! main() -> ProbeConfig -> Prober(WsConnector, ThreadDelegate)
//!                              |
//!                              v
//!                ProbeRunner over StaticSource | GraphSource
//! ```

mod output;

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use proxyprobe_engine::{
    GraphSource, ProbeConfig, ProbeRunner, Prober, RunReport, StaticSource, ThreadDelegate,
    WsConnector,
};

#[derive(Parser, Debug)]
#[command(name = "proxyprobe")]
#[command(about = "Verify that WebSocket-to-TCP proxies tunnel traffic end to end")]
struct Cli {
    /// Config file [default: ~/.proxyprobe/config.toml]
    #[arg(long)]
    config: Option<PathBuf>,
    /// GraphQL endpoint listing candidate proxies
    #[arg(long)]
    endpoint: Option<String>,
    /// Records to skip before the first page
    #[arg(long, default_value_t = 0)]
    offset: usize,
    /// Pages to read from the endpoint
    #[arg(long, default_value_t = 1)]
    pages: usize,
    /// Sessions probed at once
    #[arg(long)]
    concurrency: Option<usize>,
    /// Print one JSON object per result
    #[arg(long)]
    json: bool,
    /// Append logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// File with one address per line
    #[arg(long)]
    input: Option<PathBuf>,
    /// Addresses to probe instead of reading the endpoint
    addresses: Vec<String>,
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("building log filter")?;

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
        return Ok(());
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log dir {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .with(env_filter)
        .init();
    tracing::info!(path = %path.display(), "Logging initialized");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ProbeConfig> {
    let loaded = match path {
        Some(path) => ProbeConfig::load_from(path)?,
        None => ProbeConfig::load()?,
    };
    Ok(loaded.unwrap_or_default())
}

/// Addresses given on the command line or in `--input`, if any.
fn static_source(cli: &Cli) -> Result<Option<StaticSource>> {
    let mut addresses = StaticSource::from_args(cli.addresses.iter().cloned())
        .addresses()
        .to_vec();
    if let Some(input) = &cli.input {
        addresses.extend_from_slice(StaticSource::from_file(input)?.addresses());
    }
    if addresses.is_empty() && cli.input.is_none() {
        return Ok(None);
    }
    Ok(Some(StaticSource::new(addresses)))
}

fn print_run(run: &RunReport, json: bool) -> Result<()> {
    for report in &run.reports {
        if json {
            println!("{}", output::render_json(report)?);
        } else {
            println!("{}", output::render_line(report));
        }
    }
    if !json {
        println!("{}", output::render_summary(&run.summary));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let config = load_config(cli.config.as_deref())?;
    let prober = Prober::new(
        Arc::new(WsConnector::new()),
        Arc::new(ThreadDelegate::new(config.generate_timeout())),
        config.probe_settings(),
    );
    let runner = ProbeRunner::new(Arc::new(prober))
        .with_concurrency(cli.concurrency.unwrap_or_else(|| config.concurrency()))
        .with_page_size(config.page_size());

    let run = if let Some(source) = static_source(&cli)? {
        runner.probe_all(source.addresses().to_vec()).await
    } else {
        let endpoint = cli
            .endpoint
            .clone()
            .unwrap_or_else(|| config.source_endpoint());
        tracing::info!(%endpoint, offset = cli.offset, pages = cli.pages, "reading candidates");
        let source = GraphSource::new(endpoint)?;
        runner.run(&source, cli.offset, cli.pages).await?
    };

    print_run(&run, cli.json)
}
