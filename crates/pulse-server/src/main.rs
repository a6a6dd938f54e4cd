use anyhow::Context;
use clap::Parser;
use pulse_config::{ConfigLoader, RuntimeStore};
use pulse_monitor::Scheduler;
use pulse_server::{api, bootstrap, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "pulse.toml")]
    config: PathBuf,

    /// Runtime state file, overrides `runtime.state_path`
    #[arg(short, long)]
    state: Option<PathBuf>,
}

/// 等待 SIGTERM 或 SIGINT
#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let loader = ConfigLoader::new(&args.config);
    let config = loader.load()?;
    pulse_logging::init_logging(&config.logging)?;
    info!(config = %args.config.display(), "Starting pulse monitor");

    let state_path = args.state.unwrap_or_else(|| config.runtime.state_path.clone());
    let engine = Arc::new(bootstrap::build_engine(&config, RuntimeStore::new(state_path)).await?);

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let scheduler = tokio::spawn(Scheduler::new(engine.clone()).run(shutdown_rx));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    let app = api::create_router(Arc::new(AppState::new(engine).with_loader(loader)));
    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind {}", addr))?
        .serve(app.into_make_service());
    info!(addr = %addr, "HTTP API listening");

    let mut server_shutdown = shutdown_tx.subscribe();
    let server = tokio::spawn(server.with_graceful_shutdown(async move {
        let _ = server_shutdown.recv().await;
    }));

    let received = wait_for_signal().await?;
    info!(signal = received, "Shutting down");
    let _ = shutdown_tx.send(());

    if let Err(e) = scheduler.await {
        error!(error = %e, "Scheduler task failed");
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server error"),
        Err(e) => error!(error = %e, "HTTP server task failed"),
    }

    info!("Shutdown complete");
    Ok(())
}
