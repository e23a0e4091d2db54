//! Bidirectional byte pipe between client and backend.

use std::io;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// How each direction of a splice ended.
#[derive(Debug)]
pub struct SpliceSummary {
    pub client_to_backend: io::Result<u64>,
    pub backend_to_client: io::Result<u64>,
}

/// Copy both directions until each source reaches EOF or fails.
///
/// A finished direction half-closes its destination so the peer sees EOF,
/// while the opposite direction keeps draining. An error only ends the
/// direction it happened on. Returns once both are done.
pub async fn splice<CR, CW, B>(client_reader: CR, client_writer: CW, backend: B) -> SpliceSummary
where
    CR: AsyncRead + Unpin,
    CW: AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (backend_reader, backend_writer) = tokio::io::split(backend);

    let (client_to_backend, backend_to_client) = tokio::join!(
        pipe(client_reader, backend_writer, "client -> backend"),
        pipe(backend_reader, client_writer, "backend -> client"),
    );

    SpliceSummary {
        client_to_backend,
        backend_to_client,
    }
}

async fn pipe<R, W>(mut from: R, mut to: W, direction: &'static str) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let copied = tokio::io::copy(&mut from, &mut to).await;
    if let Err(e) = &copied {
        tracing::debug!("{} stopped: {}", direction, e);
    }

    if let Err(e) = to.shutdown().await {
        tracing::debug!("{} half-close failed: {}", direction, e);
    }

    copied
}
