//! The response pipeline.
//!
//! A [`ResponseWriter`] owns the write half of a connection and the
//! [`Response`] being produced on it. Handlers queue at most one write at a
//! time (`send_status`, `send_headers` or `send_file`); the engine then
//! drives it with [`ResponseWriter::complete`] and hands the resulting
//! [`Completion`] to the handler's continuation.

use std::io::{self, SeekFrom};
use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use crate::http::response::{Response, StatusCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("response already done")]
    Done,
    #[error("another write is still pending")]
    Busy,
    #[error("headers already sent")]
    HeadersSent,
    #[error("headers not sent yet")]
    HeadersNotSent,
    #[error("stream torn down")]
    TornDown,
}

/// A file transfer that could not be queued. The file is handed back so
/// the caller can still close it.
#[derive(Debug)]
pub struct SendFileError<F> {
    pub file: F,
    pub error: PipelineError,
}

enum Pending<F> {
    Buffer(Vec<u8>),
    File { file: F, offset: u64, len: u64 },
}

impl<F> Pending<F> {
    fn into_file(self) -> Option<F> {
        match self {
            Pending::Buffer(_) => None,
            Pending::File { file, .. } => Some(file),
        }
    }
}

/// Result of the write a handler was waiting on.
#[derive(Debug)]
pub enum Completion<F> {
    /// A buffered write (headers or a status response) finished.
    Written(io::Result<()>),
    /// A file transfer finished; the file comes back with the byte count.
    FileSent { file: F, result: io::Result<u64> },
    /// The connection was torn down before or while the write ran.
    Cancelled { file: Option<F> },
    /// Nothing was pending.
    Idle,
}

impl<F> Completion<F> {
    pub fn is_success(&self) -> bool {
        match self {
            Completion::Written(res) => res.is_ok(),
            Completion::FileSent { result, .. } => result.is_ok(),
            Completion::Cancelled { .. } | Completion::Idle => false,
        }
    }

    /// Takes back the file a transfer was holding, on any outcome.
    pub fn into_file(self) -> Option<F> {
        match self {
            Completion::FileSent { file, .. } => Some(file),
            Completion::Cancelled { file } => file,
            Completion::Written(_) | Completion::Idle => None,
        }
    }
}

pub struct ResponseWriter<W, F> {
    stream: W,
    response: Response,
    pending: Option<Pending<F>>,
    headers_sent: bool,
    torn_down: bool,
}

impl<W, F> ResponseWriter<W, F>
where
    W: AsyncWrite + Unpin,
    F: AsyncRead + AsyncSeek + Unpin,
{
    pub fn new(stream: W, version: impl Into<String>) -> Self {
        Self {
            stream,
            response: Response::new(version),
            pending: None,
            headers_sent: false,
            torn_down: false,
        }
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.response.set_header(name, value);
    }

    /// Queues a complete response consisting of `status` and, if given, a
    /// short plain-text `message` as body. The response is done afterwards.
    ///
    /// When the headers are already on the wire the response can only be
    /// abandoned: it is marked done and `HeadersSent` is returned.
    pub fn send_status(
        &mut self,
        status: StatusCode,
        message: Option<&str>,
    ) -> Result<(), PipelineError> {
        if self.response.is_done() {
            return Err(PipelineError::Done);
        }
        if self.headers_sent {
            self.response.mark_done();
            return Err(PipelineError::HeadersSent);
        }
        if self.pending.is_some() {
            return Err(PipelineError::Busy);
        }

        self.response.status = status;
        let body: &[u8] = match message {
            Some(msg) if status.allows_body() => {
                self.response.set_header("Content-Type", "text/plain");
                msg.as_bytes()
            }
            _ => &[],
        };
        self.response.content_length = if status.allows_body() {
            Some(body.len() as u64)
        } else {
            None
        };

        let mut buf = serialize_head(&self.response);
        buf.extend_from_slice(body);

        self.response.mark_done();
        self.headers_sent = true;
        self.pending = Some(Pending::Buffer(buf));
        Ok(())
    }

    /// Queues the status line and headers. `content_length`, `status` and
    /// all headers must be final before this call.
    pub fn send_headers(&mut self) -> Result<(), PipelineError> {
        if self.response.is_done() {
            return Err(PipelineError::Done);
        }
        if self.headers_sent {
            return Err(PipelineError::HeadersSent);
        }
        if self.pending.is_some() {
            return Err(PipelineError::Busy);
        }

        self.headers_sent = true;
        self.pending = Some(Pending::Buffer(serialize_head(&self.response)));
        Ok(())
    }

    /// Queues a transfer of `len` bytes of `file` starting at `offset`.
    /// The response is done once the transfer is queued.
    pub fn send_file(&mut self, file: F, offset: u64, len: u64) -> Result<(), SendFileError<F>> {
        let error = if self.response.is_done() {
            Some(PipelineError::Done)
        } else if !self.headers_sent {
            Some(PipelineError::HeadersNotSent)
        } else if self.pending.is_some() {
            Some(PipelineError::Busy)
        } else if self.torn_down {
            Some(PipelineError::TornDown)
        } else {
            None
        };

        if let Some(error) = error {
            return Err(SendFileError { file, error });
        }

        self.response.mark_done();
        self.pending = Some(Pending::File { file, offset, len });
        Ok(())
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Runs the pending write to completion or until `cancel` fires.
    ///
    /// Any failure leaves the writer torn down; later writes complete as
    /// `Cancelled` without touching the stream.
    pub async fn complete(&mut self, cancel: &CancellationToken) -> Completion<F> {
        let Some(op) = self.pending.take() else {
            return Completion::Idle;
        };

        if self.torn_down || cancel.is_cancelled() {
            self.torn_down = true;
            return Completion::Cancelled {
                file: op.into_file(),
            };
        }

        match op {
            Pending::Buffer(buf) => {
                let outcome = {
                    let write = write_buffer(&mut self.stream, &buf);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        res = write => Some(res),
                    }
                };

                match outcome {
                    Some(res) => {
                        if res.is_err() {
                            self.torn_down = true;
                        }
                        Completion::Written(res)
                    }
                    None => {
                        self.torn_down = true;
                        Completion::Cancelled { file: None }
                    }
                }
            }
            Pending::File {
                mut file,
                offset,
                len,
            } => {
                let outcome = {
                    let transfer = transfer_file(&mut self.stream, &mut file, offset, len);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        res = transfer => Some(res),
                    }
                };

                match outcome {
                    Some(result) => {
                        if result.is_err() {
                            self.torn_down = true;
                        }
                        Completion::FileSent { file, result }
                    }
                    None => {
                        self.torn_down = true;
                        Completion::Cancelled { file: Some(file) }
                    }
                }
            }
        }
    }
}

async fn write_buffer<W>(stream: &mut W, buf: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    stream.write_all(buf).await?;
    stream.flush().await
}

async fn transfer_file<W, F>(stream: &mut W, file: &mut F, offset: u64, len: u64) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
    F: AsyncRead + AsyncSeek + Unpin,
{
    file.seek(SeekFrom::Start(offset)).await?;

    let mut body = (&mut *file).take(len);
    let sent = tokio::io::copy(&mut body, stream).await?;
    stream.flush().await?;

    if sent < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("file ended after {} of {} bytes", sent, len),
        ));
    }

    Ok(sent)
}

/// Serializes the status line and headers, terminated by the blank line.
///
/// `Content-Length` comes from `content_length`; `Date` and
/// `Connection: close` are added unless the handler set them.
pub fn serialize_head(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    let status_line = format!(
        "{} {} {}\r\n",
        resp.version,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    if resp.header("Date").is_none() {
        push_header(&mut buf, "Date", &httpdate::fmt_http_date(SystemTime::now()));
    }

    for (k, v) in resp.headers() {
        if resp.content_length.is_some() && k.eq_ignore_ascii_case("Content-Length") {
            continue;
        }
        push_header(&mut buf, k, v);
    }

    if let Some(len) = resp.content_length {
        push_header(&mut buf, "Content-Length", &len.to_string());
    }

    if resp.header("Connection").is_none() {
        push_header(&mut buf, "Connection", "close");
    }

    buf.extend_from_slice(b"\r\n");
    buf
}

fn push_header(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
}
