use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dirserve::config::Config;
use dirserve::server::EventLoop;

/// Serve a directory over HTTP.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Directory to serve [env: ROOT] [default: .]
    root: Option<PathBuf>,

    /// `host:port` or a bare port [env: LISTEN] [default: 0.0.0.0:8080]
    listen: Option<String>,

    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load(),
    };
    if let Some(root) = cli.root {
        cfg.static_files.root = root;
    }
    if let Some(listen) = cli.listen {
        cfg.server.listen_addr = listen;
    }

    let mut event_loop = EventLoop::from_config(&cfg)?;
    let shutdown = event_loop.shutdown_handle();

    // The loop blocks in poll, so it gets a thread of its own.
    let mut server = tokio::task::spawn_blocking(move || event_loop.run());

    tokio::select! {
        res = &mut server => {
            res.context("server thread panicked")??;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            shutdown.shutdown().context("failed to wake server loop")?;
            server.await.context("server thread panicked")??;
        }
    }

    Ok(())
}
