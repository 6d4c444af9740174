//! Filesystem access used by the static file handler.
//!
//! Failures are reduced to a closed [`FsErrorKind`] so that the handler can
//! map them to status codes without looking at OS error numbers.

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::SystemTime;

use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FsErrorKind {
    #[error("not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("is a directory")]
    IsADirectory,
    #[error("filesystem error")]
    Other,
}

impl From<&io::Error> for FsErrorKind {
    fn from(e: &io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => FsErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => FsErrorKind::PermissionDenied,
            io::ErrorKind::IsADirectory => FsErrorKind::IsADirectory,
            _ => FsErrorKind::Other,
        }
    }
}

/// What the handler needs to know about an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub size: u64,
    pub modified: SystemTime,
    pub is_dir: bool,
}

/// Opens, inspects and closes files for the static file handler.
///
/// `close` consumes the handle, so a file cannot be closed twice.
pub trait FileSystem: Send + Sync + 'static {
    type File: AsyncRead + AsyncSeek + Unpin + Send + 'static;

    /// Opens `path` read-only.
    fn open(&self, path: &Path) -> Result<Self::File, FsErrorKind>;

    /// Metadata of an open file.
    fn stat(&self, file: &Self::File) -> Result<FileMeta, FsErrorKind>;

    fn close(&self, file: Self::File);
}

/// The local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

/// A file opened by [`LocalFs`].
///
/// The metadata is read from the descriptor right after opening, while the
/// handle is still a blocking `std::fs::File`.
#[derive(Debug)]
pub struct LocalFile {
    inner: tokio::fs::File,
    meta: Result<FileMeta, FsErrorKind>,
}

impl FileSystem for LocalFs {
    type File = LocalFile;

    fn open(&self, path: &Path) -> Result<LocalFile, FsErrorKind> {
        let file = std::fs::File::open(path).map_err(|e| FsErrorKind::from(&e))?;

        let meta = file
            .metadata()
            .and_then(|m| {
                Ok(FileMeta {
                    size: m.len(),
                    modified: m.modified()?,
                    is_dir: m.is_dir(),
                })
            })
            .map_err(|e| FsErrorKind::from(&e));

        Ok(LocalFile {
            inner: tokio::fs::File::from_std(file),
            meta,
        })
    }

    fn stat(&self, file: &LocalFile) -> Result<FileMeta, FsErrorKind> {
        file.meta
    }

    fn close(&self, file: LocalFile) {
        drop(file);
    }
}

impl AsyncRead for LocalFile {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncSeek for LocalFile {
    fn start_seek(mut self: Pin<&mut Self>, position: io::SeekFrom) -> io::Result<()> {
        Pin::new(&mut self.inner).start_seek(position)
    }

    fn poll_complete(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Pin::new(&mut self.inner).poll_complete(cx)
    }
}
