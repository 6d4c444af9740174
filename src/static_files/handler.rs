use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncSeek, AsyncWrite};

use crate::config::StaticConfig;
use crate::http::handler::{Handler, HandlerStatus};
use crate::http::mime::MimeRegistry;
use crate::http::request::{Method, Request};
use crate::http::response::StatusCode;
use crate::http::writer::{Completion, ResponseWriter, SendFileError};
use crate::static_files::cache;
use crate::static_files::fs::{FileSystem, FsErrorKind, LocalFs};

/// State carried between the phases of a static file response.
#[derive(Debug)]
pub enum Phase<F> {
    /// Headers are being written; the body still has to follow.
    SendBody { file: F, size: u64 },
    /// The body transfer owns the file; it comes back with the completion.
    Cleanup,
}

/// Serves files below a document root.
///
/// Phases: resolve and open the file, evaluate the cache validators, send
/// the headers, send the body, close the file. The file is closed exactly
/// once on every path, including a peer that disappears mid-transfer.
pub struct StaticFileHandler<FS = LocalFs> {
    config: StaticConfig,
    mime: Arc<MimeRegistry>,
    fs: FS,
}

impl StaticFileHandler<LocalFs> {
    pub fn new(config: StaticConfig, mime: Arc<MimeRegistry>) -> Self {
        Self::with_fs(config, mime, LocalFs)
    }
}

impl<FS: FileSystem> StaticFileHandler<FS> {
    pub fn with_fs(config: StaticConfig, mime: Arc<MimeRegistry>, fs: FS) -> Self {
        Self { config, mime, fs }
    }

    pub fn config(&self) -> &StaticConfig {
        &self.config
    }

    /// Maps a request target to a file below the document root.
    ///
    /// Query and fragment are dropped. Targets not starting with `/` are a
    /// bad request; targets climbing out with `..` are forbidden.
    pub fn resolve(&self, target: &str) -> Result<PathBuf, StatusCode> {
        if !target.starts_with('/') {
            return Err(StatusCode::BadRequest);
        }

        let path = strip_query(target);
        let relative = Path::new(path.trim_start_matches('/'));

        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(StatusCode::Forbidden);
        }

        Ok(self.config.document_root.join(relative))
    }
}

/// Status code reported for a file that cannot be served.
pub fn status_for(kind: FsErrorKind) -> StatusCode {
    match kind {
        FsErrorKind::PermissionDenied | FsErrorKind::IsADirectory => StatusCode::Forbidden,
        FsErrorKind::NotFound | FsErrorKind::Other => StatusCode::NotFound,
    }
}

fn status_message(status: StatusCode) -> Option<&'static str> {
    match status {
        StatusCode::BadRequest => Some("Request path must start with /"),
        StatusCode::Forbidden => Some("Access Denied"),
        StatusCode::NotFound => Some("Requested resource not found"),
        _ => None,
    }
}

fn strip_query(target: &str) -> &str {
    target
        .split(['?', '#'])
        .next()
        .unwrap_or(target)
}

fn respond<W, F, P>(resp: &mut ResponseWriter<W, F>, status: StatusCode) -> HandlerStatus<P>
where
    W: AsyncWrite + Unpin,
    F: AsyncRead + AsyncSeek + Unpin,
{
    if let Err(e) = resp.send_status(status, status_message(status)) {
        tracing::warn!(status = status.as_u16(), error = %e, "could not send status response");
    }
    HandlerStatus::Done
}

impl<FS: FileSystem> Handler for StaticFileHandler<FS> {
    type File = FS::File;
    type Phase = Phase<FS::File>;

    fn handle<W>(
        &self,
        req: &Request,
        resp: &mut ResponseWriter<W, FS::File>,
    ) -> HandlerStatus<Self::Phase>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let path = match self.resolve(&req.path) {
            Ok(path) => path,
            Err(status) => {
                tracing::debug!(path = %req.path, status = status.as_u16(), "request path rejected");
                return respond(resp, status);
            }
        };

        tracing::debug!(path = %req.path, file = %path.display(), "resolved request path");

        let file = match self.fs.open(&path) {
            Ok(file) => file,
            Err(kind) => {
                tracing::debug!(file = %path.display(), error = %kind, "open failed");
                return respond(resp, status_for(kind));
            }
        };

        let meta = match self.fs.stat(&file) {
            Ok(meta) if meta.is_dir => {
                self.fs.close(file);
                return respond(resp, status_for(FsErrorKind::IsADirectory));
            }
            Ok(meta) => meta,
            Err(kind) => {
                tracing::warn!(file = %path.display(), error = %kind, "stat failed");
                self.fs.close(file);
                return respond(resp, StatusCode::NotFound);
            }
        };

        let response = resp.response_mut();
        response.status = StatusCode::Ok;
        response.content_length = Some(meta.size);

        if let Some(content_type) = self.mime.lookup(strip_query(&req.path)) {
            resp.set_header("Content-Type", content_type);
        }

        let decision = cache::evaluate(
            req.header("If-Modified-Since"),
            req.header("If-None-Match"),
            &meta,
            &self.config,
        );
        for (name, value) in decision.headers {
            resp.set_header(name, value);
        }

        if decision.not_modified {
            tracing::debug!(path = %req.path, "resource not modified");
            self.fs.close(file);
            return respond(resp, StatusCode::NotModified);
        }

        match resp.send_headers() {
            Ok(()) => HandlerStatus::Unfinished(Phase::SendBody {
                file,
                size: meta.size,
            }),
            Err(e) => {
                tracing::warn!(path = %req.path, error = %e, "could not send headers");
                self.fs.close(file);
                HandlerStatus::Done
            }
        }
    }

    fn resume<W>(
        &self,
        phase: Self::Phase,
        completion: Completion<FS::File>,
        req: &Request,
        resp: &mut ResponseWriter<W, FS::File>,
    ) -> HandlerStatus<Self::Phase>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match phase {
            Phase::SendBody { file, size } => {
                if !completion.is_success() {
                    tracing::warn!(path = %req.path, "headers not delivered, aborting");
                    self.fs.close(file);
                    return HandlerStatus::Done;
                }

                if req.method == Method::HEAD {
                    self.fs.close(file);
                    resp.response_mut().mark_done();
                    return HandlerStatus::Done;
                }

                match resp.send_file(file, 0, size) {
                    Ok(()) => HandlerStatus::Unfinished(Phase::Cleanup),
                    Err(SendFileError { file, error }) => {
                        tracing::warn!(path = %req.path, error = %error, "Error sending file");
                        self.fs.close(file);
                        respond(resp, StatusCode::NotFound)
                    }
                }
            }
            Phase::Cleanup => {
                match &completion {
                    Completion::FileSent { result: Err(e), .. } => {
                        tracing::warn!(path = %req.path, error = %e, "file transfer failed")
                    }
                    Completion::Cancelled { .. } => {
                        tracing::debug!(path = %req.path, "file transfer cancelled")
                    }
                    _ => {}
                }

                if let Some(file) = completion.into_file() {
                    tracing::trace!(path = %req.path, "closing file");
                    self.fs.close(file);
                }
                HandlerStatus::Done
            }
        }
    }
}
