//! media-dl server binary

use clap::Parser;
use media_dl::{Config, Supervisor, run_with_shutdown};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to (overrides the configuration)
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Working directory for downloads (overrides the configuration)
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Directory with the browser UI (overrides the configuration)
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,media_dl=debug")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(bind) = args.bind {
        config.server.api.bind_address = bind;
    }
    if let Some(work_dir) = args.work_dir {
        config.storage.work_dir = work_dir;
    }
    if let Some(static_dir) = args.static_dir {
        config.server.api.static_dir = Some(static_dir);
    }
    config.validate()?;

    let supervisor = Supervisor::new(config).await?;
    let _reaper = supervisor.spawn_reaper();
    let mut api = supervisor.spawn_api_server();

    // The server stops on its own once shutdown completes; if it stops first
    // (e.g. the bind address is taken) the jobs are shut down too
    let result = tokio::select! {
        result = run_with_shutdown(&supervisor) => {
            result?;
            api.await
        }
        result = &mut api => {
            supervisor.shutdown().await?;
            result
        }
    };

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "API server failed");
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(error = %e, "API server task panicked");
            Err(e.into())
        }
    }
}
