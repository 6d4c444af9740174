//! Static file serving with conditional GET support.
//!
//! - **`handler`**: the multi-phase [`StaticFileHandler`]
//! - **`cache`**: validator evaluation and cache headers
//! - **`fs`**: the filesystem abstraction and its error kinds

pub mod cache;
pub mod fs;
pub mod handler;

pub use fs::{FileMeta, FileSystem, FsErrorKind, LocalFs};
pub use handler::{Phase, StaticFileHandler};
