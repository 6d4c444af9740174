//! MIME type detection based on file extensions.
//!
//! The registry is built once at startup and only read afterwards, so it is
//! shared between connections behind an `Arc` without locking.

use std::collections::HashMap;

const STANDARD_TYPES: &[(&str, &[&str])] = &[
    ("text/html", &["html", "htm", "shtml"]),
    ("text/css", &["css"]),
    ("text/xml", &["xml"]),
    ("text/plain", &["txt"]),
    ("image/png", &["png"]),
    ("image/gif", &["gif"]),
    ("image/tiff", &["tif", "tiff"]),
    ("image/jpeg", &["jpg", "jpeg"]),
    ("image/x-ms-bmp", &["bmp"]),
    ("image/svg+xml", &["svg", "svgz"]),
    ("application/x-javascript", &["js"]),
];

/// Lowercase file extension -> content type.
#[derive(Debug, Clone)]
pub struct MimeRegistry {
    types: HashMap<String, String>,
}

impl MimeRegistry {
    /// Registry holding the standard table.
    pub fn standard() -> Self {
        let mut types = HashMap::new();

        for (content_type, exts) in STANDARD_TYPES {
            for ext in *exts {
                tracing::debug!(ext, content_type, "registering standard MIME type");
                types.insert(ext.to_string(), content_type.to_string());
            }
        }

        Self { types }
    }

    /// Standard table with `extra` entries layered on top.
    pub fn with_overrides<'a>(extra: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut registry = Self::standard();

        for (ext, content_type) in extra {
            let ext = ext.trim_start_matches('.').to_ascii_lowercase();
            tracing::debug!(ext = %ext, content_type = %content_type, "registering MIME type");
            registry.types.insert(ext, content_type.clone());
        }

        registry
    }

    /// Content type registered for `ext`, ignoring case.
    pub fn get(&self, ext: &str) -> Option<&str> {
        self.types
            .get(&ext.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    /// Content type for the file named by the last segment of `path`.
    ///
    /// The extension is whatever follows the last `.` of that segment.
    pub fn lookup(&self, path: &str) -> Option<&str> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        let (_, ext) = file_name.rsplit_once('.')?;
        self.get(ext)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
