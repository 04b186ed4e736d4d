#[macro_use]
extern crate log;

use std::env::var;

use beacond::{Config, Server};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config_loc = var("BEACOND_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config: Config = match std::fs::read(&config_loc) {
        Ok(bytes) => toml::from_slice(&bytes)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("no config at {}, using defaults", config_loc);
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    let server = Server::bind(&config).await?;

    server.serve(shutdown_signal()).await?;

    Ok(())
}

/// Resolves once Ctrl-C, SIGTERM, or SIGHUP is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sighup.recv() => {}
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
