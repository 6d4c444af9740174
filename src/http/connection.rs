use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::http::handler::{Handler, run_handler};
use crate::http::parser::ParseError;
use crate::http::request::{ParseStatus, Request};
use crate::http::writer::ResponseWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Active,
    Closing,
    Closed,
}

/// Limits applied while reading a request head.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub header_timeout: Duration,
    pub max_header_bytes: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ConnectionSettings {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            header_timeout: Duration::from_secs(cfg.header_timeout_secs),
            max_header_bytes: cfg.max_header_bytes,
        }
    }
}

/// One client connection serving a single request.
///
/// The lifecycle is: read until the header terminator, parse, run the
/// handler, close. Nothing is kept alive between requests.
pub struct Connection<S> {
    stream: S,
    peer: SocketAddr,
    state: ConnectionState,
    settings: ConnectionSettings,
    buffer: BytesMut,
    request: Request,
}

impl Connection<TcpStream> {
    /// Accepts the next pending connection from `listener`.
    ///
    /// Returns `Ok(None)` for transient accept failures the caller should
    /// simply retry. On any other failure the socket, if one was accepted,
    /// is dropped and the error returned.
    pub async fn accept(
        listener: &TcpListener,
        settings: ConnectionSettings,
    ) -> io::Result<Option<Self>> {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) if is_transient(&e) => {
                tracing::debug!(error = %e, "transient accept failure");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        socket.set_nodelay(true)?;

        Ok(Some(Self::new(socket, peer, settings)))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: SocketAddr, settings: ConnectionSettings) -> Self {
        Self {
            stream,
            peer,
            state: ConnectionState::Active,
            settings,
            buffer: BytesMut::with_capacity(4096),
            request: Request::new(),
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Serves one request with `handler`, then closes the connection.
    ///
    /// A request head that does not parse closes the connection without
    /// a response.
    pub async fn run<H: Handler>(&mut self, handler: &H) -> anyhow::Result<()> {
        let result = self.serve(handler).await;
        self.close().await;
        result
    }

    async fn serve<H: Handler>(&mut self, handler: &H) -> anyhow::Result<()> {
        let consumed = match self.read_request().await {
            Ok(Some(consumed)) => consumed,
            Ok(None) => {
                tracing::debug!(peer = %self.peer, "peer closed before sending a request");
                return Ok(());
            }
            Err(e) => {
                self.state = ConnectionState::Closing;
                return Err(e);
            }
        };

        if consumed < self.buffer.len() {
            tracing::debug!(
                peer = %self.peer,
                extra = self.buffer.len() - consumed,
                "ignoring bytes after request head"
            );
        }

        tracing::info!(
            peer = %self.peer,
            method = self.request.method.as_str(),
            path = %self.request.path,
            "request"
        );

        let peer = self.peer;
        let cancel = CancellationToken::new();
        let (mut reader, writer) = tokio::io::split(&mut self.stream);
        let mut resp = ResponseWriter::new(writer, self.request.version.clone());

        let outcome = tokio::select! {
            res = run_handler(handler, &self.request, &mut resp, &cancel) => res,
            never = watch_peer(&mut reader, &cancel, peer) => match never {},
        };

        if resp.is_torn_down() {
            self.state = ConnectionState::Closing;
        }

        tracing::debug!(
            peer = %peer,
            status = resp.response().status.as_u16(),
            "response finished"
        );

        outcome
    }

    /// Reads until a complete request head is buffered and parsed.
    ///
    /// `Ok(None)` means the peer closed the connection first.
    async fn read_request(&mut self) -> anyhow::Result<Option<usize>> {
        let deadline = self.settings.header_timeout;
        let limit = self.settings.max_header_bytes;

        let read = async {
            loop {
                match self.request.parse_headers(&self.buffer) {
                    ParseStatus::Complete(consumed) => return Ok(Some(consumed)),
                    ParseStatus::Incomplete => {}
                    ParseStatus::Error(e) => {
                        tracing::warn!(peer = %self.peer, error = %e, "malformed request");
                        return Err(anyhow::anyhow!("HTTP parse error: {}", e));
                    }
                }

                if self.buffer.len() >= limit {
                    tracing::warn!(peer = %self.peer, limit, "request head too large");
                    return Err(ParseError::HeadersTooLarge.into());
                }

                let n = self.stream.read_buf(&mut self.buffer).await?;
                if n == 0 {
                    return Ok(None);
                }
            }
        };

        tokio::time::timeout(deadline, read)
            .await
            .context("timed out waiting for request head")?
    }

    /// Closes the stream. Safe to call again, and after the peer is gone.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        self.state = ConnectionState::Closing;
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!(peer = %self.peer, error = %e, "shutdown failed");
        }
        self.state = ConnectionState::Closed;
    }
}

/// Close notification for a connection whose request is being served.
///
/// Reads (and discards) anything the peer sends after the request head.
/// End of stream is only a half-close: the peer may still be reading, so
/// the response keeps going and a peer that is really gone shows up as a
/// failed write. A read error means the connection is torn down: `cancel`
/// fires so the pending write completes as cancelled and the handler's
/// cleanup phase runs. Never returns.
async fn watch_peer<R>(reader: &mut R, cancel: &CancellationToken, peer: SocketAddr) -> Infallible
where
    R: AsyncRead + Unpin,
{
    let mut scratch = [0u8; 512];

    loop {
        match reader.read(&mut scratch).await {
            Ok(0) => {
                tracing::debug!(peer = %peer, "peer finished sending");
                return std::future::pending().await;
            }
            Ok(n) => tracing::trace!(peer = %peer, n, "discarding bytes after request head"),
            Err(e) => {
                tracing::debug!(peer = %peer, error = %e, "connection read failed");
                break;
            }
        }
    }

    cancel.cancel();
    std::future::pending().await
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
