//! lanternd — serves the Service Description Exchange for the services
//! advertised in this access point's SSID.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;

use lantern_core::config::SsidBackend;
use lantern_core::LanternConfig;
use lantern_store::{FileSsid, SsidBinding, WirelessSsid};
use lanternd::Responder;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls verbosity, e.g. RUST_LOG=debug lanternd
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = LanternConfig::load().context("cannot load configuration")?;

    let ssid: Arc<dyn SsidBinding> = match config.ssid.backend {
        SsidBackend::Wireless => Arc::new(WirelessSsid::new(&config.ssid.interface)),
        SsidBackend::File => Arc::new(FileSsid::new(&config.ssid.file_path)),
    };

    tracing::info!(
        port = config.sde.port,
        db = %config.store.db_path.display(),
        "lanternd starting"
    );

    let mut responder = Responder::bind(config.sde.port, config.store.db_path, ssid).await?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let server = tokio::spawn(async move { responder.run(stop_rx).await });

    let mut sigterm = signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
        _ = sigterm.recv() => tracing::info!("terminated, shutting down"),
    }

    stop_tx.send(true).ok();
    server.await.context("responder task panicked")??;

    Ok(())
}
