use clap::Parser;
use std::env;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

use mediaq::config::ConfigContext;
use mediaq::{server, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "mediaq=debug,tower_http=info");
    }

    let config = ConfigContext::parse();
    telemetry::init(config.jaeger.as_deref())?;

    let token = CancellationToken::new();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
            token.cancel();
        });
    }

    let app = tokio::spawn(server::serve(config, token));
    let result = app.await?;

    info!("Shutting down.");
    telemetry::shutdown();

    result?;
    Ok(())
}
