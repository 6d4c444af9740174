#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use breeze::static_files::fs::{FileMeta, FileSystem, FsErrorKind, LocalFile, LocalFs};

/// Fixed modification time used for fixture files.
pub fn fixture_mtime() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    let file = std::fs::File::options().write(true).open(&path).unwrap();
    file.set_modified(fixture_mtime()).unwrap();
}

/// Local filesystem that counts opens and closes.
#[derive(Clone, Default)]
pub struct CountingFs {
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
    pub fail_stat: bool,
}

impl CountingFs {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FileSystem for CountingFs {
    type File = LocalFile;

    fn open(&self, path: &Path) -> Result<LocalFile, FsErrorKind> {
        let file = LocalFs.open(path)?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(file)
    }

    fn stat(&self, file: &LocalFile) -> Result<FileMeta, FsErrorKind> {
        if self.fail_stat {
            return Err(FsErrorKind::Other);
        }
        LocalFs.stat(file)
    }

    fn close(&self, file: LocalFile) {
        self.closed.fetch_add(1, Ordering::SeqCst);
        LocalFs.close(file);
    }
}

/// A response as seen by the client.
#[derive(Debug)]
pub struct Reply {
    pub status_line: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn parse(raw: &[u8]) -> Self {
        let end = raw
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("no header terminator in response");
        let head = std::str::from_utf8(&raw[..end]).unwrap();
        let mut lines = head.split("\r\n");

        let status_line = lines.next().unwrap().to_string();
        let status = status_line
            .split(' ')
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();

        let headers = lines
            .map(|line| {
                let (k, v) = line.split_once(": ").unwrap();
                (k.to_string(), v.to_string())
            })
            .collect();

        Self {
            status_line,
            status,
            headers,
            body: raw[end + 4..].to_vec(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
