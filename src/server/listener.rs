use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::http::connection::Connection;
use crate::proxy::Forwarder;

/// Binds the configured address and serves until the task is dropped.
pub async fn run(cfg: &Config) -> anyhow::Result<()> {
    let addr = cfg.listen_addr()?;
    let forwarder = Arc::new(Forwarder::from_config(cfg)?);

    let listener = TcpListener::bind(addr).await?;
    let prefix = if forwarder.prefix().is_empty() { "/" } else { forwarder.prefix() };
    info!(
        "Proxy ready on http://{}, forwarding {} -> {}",
        listener.local_addr()?,
        prefix,
        forwarder.upstream().url()
    );

    serve(listener, forwarder).await
}

/// Accepts connections on an already bound listener, one task each.
pub async fn serve(listener: TcpListener, forwarder: Arc<Forwarder>) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Failed to accept connection: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }
        };
        tracing::debug!("Accepted connection from {}", peer);

        let forwarder = forwarder.clone();
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer, forwarder);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
