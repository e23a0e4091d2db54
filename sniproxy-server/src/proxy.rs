/// Listener and accept loop: one task per connection, each fed to the handler.
use sniproxy_core::dial::Dial;
use sniproxy_core::{Handler, ProxyError};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket};
use tracing::Instrument;

pub fn bind(addr: SocketAddr) -> io::Result<TcpListener> {
    // Use SO_REUSEADDR so rapid restarts don't fail with "address already in use"
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(1024)
}

/// Accept forever. Neither accept errors nor connection failures stop the loop.
pub async fn run_proxy<D>(listener: TcpListener, handler: Arc<Handler<D>>)
where
    D: Dial + 'static,
{
    loop {
        let (client, client_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("Accept failed: {}", e);
                continue;
            }
        };

        if let Err(e) = client.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY for {}: {}", client_addr, e);
        }

        let handler = handler.clone();
        let span = tracing::info_span!("conn", peer = %client_addr);

        tokio::spawn(
            async move {
                if let Err(e) = handler.handle(client).await {
                    log_failure(&e);
                }
            }
            .instrument(span),
        );
    }
}

fn log_failure(err: &ProxyError) {
    match err {
        // Scanners and clients that hang up early are routine
        ProxyError::Hello(_) => tracing::info!("Dropped before hello: {}", err),
        ProxyError::Dial(_) => tracing::warn!("Backend unavailable: {}", err),
    }
}
