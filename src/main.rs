use std::sync::Arc;

use breeze::config::Config;
use breeze::http::mime::MimeRegistry;
use breeze::server;
use breeze::static_files::StaticFileHandler;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let cfg = Config::load(std::env::args().skip(1))?;

    // Built once before the first connection; read-only afterwards.
    let mime = Arc::new(MimeRegistry::with_overrides(&cfg.static_files.mime_types));
    let handler = Arc::new(StaticFileHandler::new(cfg.static_files.clone(), mime));

    tracing::info!(
        root = %cfg.static_files.document_root.display(),
        etag = cfg.static_files.enable_etag,
        expire_hours = cfg.static_files.expire_hours,
        "Serving static files"
    );

    tokio::select! {
        res = server::listener::run(&cfg.server, handler) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
