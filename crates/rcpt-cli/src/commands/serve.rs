//! Serve command - run the HTTP upload service.

use clap::Args;
use tracing::{info, warn};

use rcpt_core::{ErrorKind, ReceiptExtractor};
use rcpt_server::AppState;

/// Arguments for the serve command.
#[derive(Args)]
pub struct ServeArgs {
    /// Address to listen on (overrides config and RCPT_BIND)
    #[arg(short, long)]
    bind: Option<String>,

    /// Hide internal error details from clients
    #[arg(long)]
    production: bool,
}

pub async fn run(args: ServeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;

    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if args.production {
        config.server.production = true;
    }

    // A missing key should not stop the service from starting
    let extractor = match ReceiptExtractor::from_config(&config) {
        Ok(extractor) => {
            info!("Using model {}", extractor.model());
            Some(extractor)
        }
        Err(e) if e.kind() == ErrorKind::Config => {
            warn!("{}", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    rcpt_server::serve(AppState::new(config.server, extractor), shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
