use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::http::connection::{Connection, ConnectionSettings};
use crate::http::handler::Handler;

/// Pause after a failed accept so a persistent error (e.g. out of file
/// descriptors) does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

pub async fn run<H: Handler>(cfg: &ServerConfig, handler: Arc<H>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    serve(listener, ConnectionSettings::from(cfg), handler).await
}

/// Accepts connections forever, serving each on its own task.
pub async fn serve<H: Handler>(
    listener: TcpListener,
    settings: ConnectionSettings,
    handler: Arc<H>,
) -> anyhow::Result<()> {
    loop {
        let mut conn = match Connection::accept(&listener, settings).await {
            Ok(Some(conn)) => conn,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("Error accepting connection: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let peer = conn.peer();
        info!("Accepted connection from {}", peer);

        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            if let Err(e) = conn.run(&*handler).await {
                tracing::error!("Connection error from {}: {:#}", peer, e);
            }
        });
    }
}
