//! Peek the TLS ClientHello off a client stream without consuming it.
//!
//! The bytes are fed to rustls' server-side `Acceptor`, which decodes the
//! first handshake flight and stops before it would send anything back:
//!
//!   ContentType(1) | Version(2) | Length(2) | Handshake...
//!   HandshakeType(1) | Length(3) | ClientHello...
//!
//! Everything the acceptor pulls off the wire is teed into a side buffer,
//! and the caller gets back a [`PeekedStream`] that replays that buffer
//! before continuing with the original reader. The real handshake then
//! happens end to end between the client and the backend.
//!
//! When rustls decodes the hello but refuses it as incompatible (an old
//! client without `signature_algorithms`, say), the teed bytes are parsed
//! again by [`crate::sni`], which skips those checks.

use crate::error::HelloError;
use crate::sni;
use rustls::server::{Acceptor, ClientHello as RustlsClientHello};
use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, Chain, ReadBuf};
use tokio_rustls::LazyConfigAcceptor;
use tokio_util::io::InspectReader;

/// A typical ClientHello fits in one record; the buffer grows if it doesn't.
const PEEK_BUFFER_CAPACITY: usize = 4096;

/// Handshake metadata taken from a ClientHello.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientHello {
    /// SNI host name, lowercased. `None` when the client sent no SNI.
    pub server_name: Option<String>,
    /// ALPN protocols offered by the client, in preference order.
    pub alpn: Vec<String>,
}

impl ClientHello {
    fn from_rustls(hello: &RustlsClientHello<'_>) -> Self {
        let alpn = hello
            .alpn()
            .map(|protocols| {
                protocols
                    .map(|p| String::from_utf8_lossy(p).into_owned())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            server_name: hello.server_name().map(str::to_owned),
            alpn,
        }
    }
}

// ── Read-only adapter ────────────────────────────────────────────────

/// Narrows a reader to what the TLS acceptor needs: reads pass through,
/// writes are refused, flush and shutdown do nothing.
///
/// The acceptor only writes when it wants to send an alert, which we never
/// want to reach the client.
#[derive(Debug)]
pub struct ReadOnlyStream<R> {
    inner: R,
}

impl<R> ReadOnlyStream<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ReadOnlyStream<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<R: Unpin> AsyncWrite for ReadOnlyStream<R> {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "write on read-only stream",
        )))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ── Replay stream ────────────────────────────────────────────────────

/// The bytes consumed while peeking, followed by the rest of the original
/// reader. Reads are byte-identical to reading the original from the start.
#[derive(Debug)]
pub struct PeekedStream<R> {
    inner: Chain<Cursor<Vec<u8>>, R>,
}

impl<R: AsyncRead> PeekedStream<R> {
    fn new(peeked: Vec<u8>, reader: R) -> Self {
        Self {
            inner: Cursor::new(peeked).chain(reader),
        }
    }

    /// Bytes that were read from the original stream during the peek.
    pub fn peeked(&self) -> &[u8] {
        self.inner.get_ref().0.get_ref()
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for PeekedStream<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

// ── Peek ─────────────────────────────────────────────────────────────

/// Read a ClientHello from the start of `reader`.
///
/// Returns the parsed hello together with a stream that still yields every
/// byte of the original. A hello without SNI is a success; only a stream
/// that ends or turns out not to be TLS before the hello is complete fails.
pub async fn peek_client_hello<R>(
    mut reader: R,
) -> Result<(ClientHello, PeekedStream<R>), HelloError>
where
    R: AsyncRead + Unpin,
{
    let mut peeked = Vec::with_capacity(PEEK_BUFFER_CAPACITY);

    let result = {
        let tee = InspectReader::new(&mut reader, |data: &[u8]| {
            peeked.extend_from_slice(data);
        });
        read_client_hello(ReadOnlyStream::new(tee)).await
    };
    let hello = match result {
        Ok(hello) => hello,
        Err(HelloError::Parse(err)) if refused_as_incompatible(&err) => {
            match sni::parse_client_hello(&peeked) {
                Some(hello) => {
                    tracing::debug!("Hello accepted by lenient parser after: {}", err);
                    hello
                }
                None => return Err(HelloError::Parse(err)),
            }
        }
        Err(e) => return Err(e),
    };

    Ok((hello, PeekedStream::new(peeked, reader)))
}

/// rustls parsed the hello but its capability checks turned it down.
fn refused_as_incompatible(err: &io::Error) -> bool {
    matches!(
        err.get_ref().and_then(|inner| inner.downcast_ref::<rustls::Error>()),
        Some(rustls::Error::PeerIncompatible(_))
    )
}

async fn read_client_hello<R>(mut stream: ReadOnlyStream<R>) -> Result<ClientHello, HelloError>
where
    R: AsyncRead + Unpin,
{
    // The handshake is abandoned here on purpose: once the acceptor has the
    // hello, the StartHandshake is dropped without ever producing a response.
    let start = LazyConfigAcceptor::new(Acceptor::default(), &mut stream)
        .await
        .map_err(HelloError::Parse)?;

    Ok(ClientHello::from_rustls(&start.client_hello()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{build_client_hello, build_legacy_client_hello, split_into_records};
    use tokio::io::AsyncWriteExt;

    fn app_data_record(payload: &[u8]) -> Vec<u8> {
        let mut record = vec![0x17, 0x03, 0x03];
        record.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        record.extend_from_slice(payload);
        record
    }

    #[tokio::test]
    async fn test_extract_server_name() {
        let record = build_client_hello(Some("example.com"), &[]);
        let (hello, _) = peek_client_hello(&record[..]).await.unwrap();
        assert_eq!(hello.server_name.as_deref(), Some("example.com"));
        assert!(hello.alpn.is_empty());
    }

    #[tokio::test]
    async fn test_missing_sni_is_not_an_error() {
        let record = build_client_hello(None, &[]);
        let (hello, _) = peek_client_hello(&record[..]).await.unwrap();
        assert_eq!(hello.server_name, None);
    }

    #[tokio::test]
    async fn test_legacy_hello_without_signature_algorithms() {
        let mut original = build_legacy_client_hello(Some("legacy.example.com"));
        assert_eq!(&original[9..11], &[0x03, 0x01]);
        original.extend_from_slice(&app_data_record(b"after the hello"));

        let (hello, mut stream) = peek_client_hello(&original[..]).await.unwrap();
        assert_eq!(hello.server_name.as_deref(), Some("legacy.example.com"));

        let mut replayed = Vec::new();
        stream.read_to_end(&mut replayed).await.unwrap();
        assert_eq!(replayed, original);
    }

    #[tokio::test]
    async fn test_legacy_hello_split_across_records() {
        let hello = build_legacy_client_hello(Some("split.example.com"));
        let record = split_into_records(&hello, 25);
        let (hello, mut stream) = peek_client_hello(&record[..]).await.unwrap();
        assert_eq!(hello.server_name.as_deref(), Some("split.example.com"));

        let mut replayed = Vec::new();
        stream.read_to_end(&mut replayed).await.unwrap();
        assert_eq!(replayed, record);
    }

    #[tokio::test]
    async fn test_truncated_legacy_hello() {
        let record = build_legacy_client_hello(Some("legacy.example.com"));
        let err = peek_client_hello(&record[..record.len() - 4]).await.unwrap_err();
        assert!(matches!(err, HelloError::Parse(_)));
    }

    #[tokio::test]
    async fn test_ip_literal_sni_has_no_server_name() {
        let record = build_client_hello(Some("10.0.0.1"), &[]);
        let (hello, _) = peek_client_hello(&record[..]).await.unwrap();
        assert_eq!(hello.server_name, None);

        let record = build_legacy_client_hello(Some("10.0.0.1"));
        let (hello, _) = peek_client_hello(&record[..]).await.unwrap();
        assert_eq!(hello.server_name, None);
    }

    #[tokio::test]
    async fn test_alpn_captured() {
        let record = build_client_hello(Some("api.example.org"), &["h2", "http/1.1"]);
        let (hello, _) = peek_client_hello(&record[..]).await.unwrap();
        assert_eq!(hello.server_name.as_deref(), Some("api.example.org"));
        assert_eq!(hello.alpn, vec!["h2".to_string(), "http/1.1".to_string()]);
    }

    #[tokio::test]
    async fn test_replay_is_identical_to_original() {
        let mut original = build_client_hello(Some("example.com"), &["h2"]);
        original.extend_from_slice(&app_data_record(b"trailing application data"));

        let (_, mut stream) = peek_client_hello(&original[..]).await.unwrap();
        assert!(!stream.peeked().is_empty());

        let mut replayed = Vec::new();
        stream.read_to_end(&mut replayed).await.unwrap();
        assert_eq!(replayed, original);
    }

    #[tokio::test]
    async fn test_replay_with_fragmented_delivery() {
        let mut original = build_client_hello(Some("fragmented.example.com"), &[]);
        original.extend_from_slice(&app_data_record(&[0xAB; 300]));

        // A tiny duplex buffer forces the acceptor to read in small pieces.
        let (mut tx, rx) = tokio::io::duplex(7);
        let payload = original.clone();
        let writer = tokio::spawn(async move {
            tx.write_all(&payload).await.unwrap();
        });

        let (hello, mut stream) = peek_client_hello(rx).await.unwrap();
        assert_eq!(hello.server_name.as_deref(), Some("fragmented.example.com"));

        let mut replayed = Vec::new();
        stream.read_to_end(&mut replayed).await.unwrap();
        writer.await.unwrap();
        assert_eq!(replayed, original);
    }

    #[tokio::test]
    async fn test_truncated_hello() {
        let record = build_client_hello(Some("example.com"), &[]);
        let err = peek_client_hello(&record[..20]).await.unwrap_err();
        assert!(matches!(err, HelloError::Parse(_)));
    }

    #[tokio::test]
    async fn test_short_header() {
        let err = peek_client_hello(&[0x16u8, 0x03, 0x01][..]).await.unwrap_err();
        assert!(matches!(err, HelloError::Parse(_)));
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let err = peek_client_hello(&[0u8; 0][..]).await.unwrap_err();
        assert!(matches!(err, HelloError::Parse(_)));
    }

    #[tokio::test]
    async fn test_not_tls() {
        let http = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";
        let err = peek_client_hello(&http[..]).await.unwrap_err();
        assert!(matches!(err, HelloError::Parse(_)));
    }

    #[tokio::test]
    async fn test_read_only_stream_rejects_writes() {
        let mut stream = ReadOnlyStream::new(&b"abc"[..]);
        let err = stream.write_all(b"alert").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        stream.flush().await.unwrap();
        stream.shutdown().await.unwrap();

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"abc");
    }
}
