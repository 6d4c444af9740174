//! Handler continuation engine.
//!
//! A handler produces a response in one or more phases. Each phase is a
//! plain synchronous call that either finishes the response
//! ([`HandlerStatus::Done`]) or queues exactly one write on the
//! [`ResponseWriter`] and returns [`HandlerStatus::Unfinished`] with the
//! state the next phase needs. [`run_handler`] awaits the queued write and
//! passes its [`Completion`] to [`Handler::resume`] together with that
//! state.
//!
//! ```text
//!   handle() ──Unfinished(p1)──▶ write ──▶ resume(p1) ──Unfinished(p2)──▶ write ──▶ resume(p2) ──Done
//! ```
//!
//! When the connection is torn down the pending write completes as
//! [`Completion::Cancelled`] and the continuation still runs, so whatever
//! the phase holds gets released.

use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};
use tokio_util::sync::CancellationToken;

use crate::http::request::Request;
use crate::http::writer::{Completion, ResponseWriter};

/// What a handler phase reports back to the engine.
#[derive(Debug)]
pub enum HandlerStatus<P> {
    /// The response is complete; the connection may close.
    Done,
    /// A write is queued; resume with this state once it completes.
    Unfinished(P),
}

pub trait Handler: Send + Sync + 'static {
    /// File handle type carried through body transfers.
    type File: AsyncRead + AsyncSeek + Unpin + Send + 'static;
    /// Per-request state kept between phases.
    type Phase: Send + 'static;

    /// First phase, run once the request head is parsed.
    fn handle<W>(
        &self,
        req: &Request,
        resp: &mut ResponseWriter<W, Self::File>,
    ) -> HandlerStatus<Self::Phase>
    where
        W: AsyncWrite + Unpin + Send;

    /// Continuation, run when the write queued by the previous phase
    /// completed, failed or was cancelled.
    fn resume<W>(
        &self,
        phase: Self::Phase,
        completion: Completion<Self::File>,
        req: &Request,
        resp: &mut ResponseWriter<W, Self::File>,
    ) -> HandlerStatus<Self::Phase>
    where
        W: AsyncWrite + Unpin + Send;
}

/// Drives `handler` for one request until it reports `Done`.
///
/// Only the final write queued by a `Done` phase is reported as an error;
/// failures of intermediate writes are delivered to the handler.
pub async fn run_handler<H, W>(
    handler: &H,
    req: &Request,
    resp: &mut ResponseWriter<W, H::File>,
    cancel: &CancellationToken,
) -> anyhow::Result<()>
where
    H: Handler,
    W: AsyncWrite + Unpin + Send,
{
    let mut status = handler.handle(req, resp);
    let mut stalled = false;

    while let HandlerStatus::Unfinished(phase) = status {
        if !resp.has_pending() {
            // Resumed once with `Idle` so it can release its state.
            if stalled {
                anyhow::bail!("handler suspended again without queuing a write");
            }
            tracing::error!(path = %req.path, "handler suspended without queuing a write");
            stalled = true;
        }

        let completion = resp.complete(cancel).await;
        status = handler.resume(phase, completion, req, resp);
    }

    if !resp.response().is_done() {
        tracing::warn!(path = %req.path, "handler finished without completing the response");
    }

    match resp.complete(cancel).await {
        Completion::Idle | Completion::Written(Ok(())) => Ok(()),
        Completion::Written(Err(e)) => Err(e.into()),
        Completion::FileSent { result, .. } => {
            tracing::warn!(path = %req.path, "handler finished with a transfer in flight");
            result.map(drop).map_err(Into::into)
        }
        Completion::Cancelled { file } => {
            if file.is_some() {
                tracing::warn!(path = %req.path, "handler finished with a transfer in flight");
            }
            tracing::debug!(path = %req.path, "final write skipped, connection torn down");
            Ok(())
        }
    }
}
