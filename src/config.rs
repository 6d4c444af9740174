use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, bail};
use serde::Deserialize;

/// Upper bound for `expire_hours` (ten years).
pub const MAX_EXPIRE_HOURS: i64 = 87_600;

/// Top-level server configuration.
///
/// Built from defaults, then an optional YAML file named by `BREEZE_CONFIG`,
/// then the `LISTEN` environment variable, then the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticConfig,
}

/// Listener and connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind (default `0.0.0.0:8000`)
    pub listen_addr: String,
    /// Seconds a client gets to deliver its complete header block
    pub header_timeout_secs: u64,
    /// Largest header block accepted before the connection is dropped
    pub max_header_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            header_timeout_secs: 30,
            max_header_bytes: 64 * 1024,
        }
    }
}

/// Options of the static file handler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Directory requests are resolved against
    pub document_root: PathBuf,
    /// Emit and honour `ETag` validators
    pub enable_etag: bool,
    /// Reserved, not implemented
    pub enable_range_requests: bool,
    /// Reserved, not implemented
    pub enable_directory_listing: bool,
    /// Hours until expiry; negative disables `Expires`/`max-age`
    pub expire_hours: i64,
    /// Key mixed into the ETag hash
    pub etag_key: String,
    /// Extra extension -> content type entries
    pub mime_types: HashMap<String, String>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            document_root: PathBuf::new(),
            enable_etag: false,
            enable_range_requests: false,
            enable_directory_listing: false,
            expire_hours: 24,
            etag_key: "breeze".to_string(),
            mime_types: HashMap::new(),
        }
    }
}

impl StaticConfig {
    /// Creates a config serving `root` with every other option defaulted.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            document_root: root.into(),
            ..Self::default()
        }
    }
}

impl Config {
    /// Loads the configuration for the running process.
    ///
    /// `args` are the process arguments without the program name; the first
    /// one is the document root.
    pub fn load(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("BREEZE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(listen_addr) = std::env::var("LISTEN") {
            cfg.server.listen_addr = listen_addr;
        }

        if let Some(root) = args.into_iter().next() {
            cfg.static_files.document_root = PathBuf::from(root);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads a YAML configuration file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config file {}", path))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Checks the settings that cannot be expressed in the types.
    pub fn validate(&self) -> anyhow::Result<()> {
        let sf = &self.static_files;

        if sf.document_root.as_os_str().is_empty() {
            bail!("Usage: breeze <document_root>");
        }
        if !sf.document_root.is_dir() {
            bail!(
                "Document root {} is not a directory",
                sf.document_root.display()
            );
        }
        if sf.expire_hours > MAX_EXPIRE_HOURS {
            bail!(
                "expire_hours {} exceeds the maximum of {}",
                sf.expire_hours,
                MAX_EXPIRE_HOURS
            );
        }
        if self.server.max_header_bytes == 0 {
            bail!("max_header_bytes must be positive");
        }

        if sf.enable_range_requests {
            tracing::warn!("enable_range_requests is reserved and has no effect");
        }
        if sf.enable_directory_listing {
            tracing::warn!("enable_directory_listing is reserved and has no effect");
        }

        Ok(())
    }
}
