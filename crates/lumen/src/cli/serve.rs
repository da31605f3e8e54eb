//! The `lumen serve` command: run the HTTP labeling service.

use std::sync::Arc;

use clap::Args;
use lumen::http;
use lumen_core::{Config, LabelService, TaggerEngine, WdTagger};

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Bind port (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Do not load the model before accepting requests
    #[arg(long)]
    pub no_preload: bool,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let tagger = Arc::new(WdTagger::new(config.model.clone(), &config.repo_dir()));
    tracing::info!(
        "Infer app init success, model_path: {}",
        tagger.model_path().display()
    );

    if config.model.preload && !args.no_preload {
        // A failed preload is not fatal: the next request retries the load.
        match tagger.load().await {
            Ok(()) => tracing::info!("Model {} ready", config.model.repo),
            Err(e) => tracing::warn!("Model preload failed, will retry on first request: {e}"),
        }
    }

    let service = Arc::new(LabelService::from_config(tagger, &config));
    let app = http::router(service, config.server.body_limit_bytes());

    let bind_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Lumen listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
