//! Conditional GET and cache header policy.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::config::{MAX_EXPIRE_HOURS, StaticConfig};
use crate::static_files::fs::FileMeta;

/// Outcome of evaluating the validators of a request against a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDecision {
    /// Answer with 304 instead of the file.
    pub not_modified: bool,
    /// Headers to set on the response, in order.
    pub headers: Vec<(&'static str, String)>,
}

/// Evaluates `If-Modified-Since`/`If-None-Match` and builds the validator
/// and expiry headers.
///
/// The modification date must match exactly; a later date in the request
/// does not count as a hit. With ETags enabled the tag has the final say:
/// a date match without a matching `If-None-Match` is a miss.
pub fn evaluate(
    if_modified_since: Option<&str>,
    if_none_match: Option<&str>,
    meta: &FileMeta,
    cfg: &StaticConfig,
) -> CacheDecision {
    let mtime = whole_seconds(meta.modified);
    let mut headers = Vec::with_capacity(4);

    let mut not_modified = if_modified_since
        .and_then(|v| httpdate::parse_http_date(v).ok())
        .is_some_and(|since| since == mtime);

    headers.push(("Last-Modified", httpdate::fmt_http_date(mtime)));

    if cfg.enable_etag {
        let etag = generate_etag(&cfg.etag_key, meta.modified, meta.size);
        if not_modified && if_none_match != Some(etag.as_str()) {
            not_modified = false;
        }
        headers.push(("ETag", etag));
    }

    if cfg.expire_hours >= 0 {
        // Configs built in code skip `Config::validate`.
        let max_age = cfg.expire_hours.min(MAX_EXPIRE_HOURS) as u64 * 3600;
        if let Some(expires) = mtime.checked_add(Duration::from_secs(max_age)) {
            headers.push(("Expires", httpdate::fmt_http_date(expires)));
        }
        headers.push(("Cache-Control", format!("max-age={}", max_age)));
    } else {
        headers.push(("Cache-Control", "no-cache".to_string()));
    }

    tracing::debug!(not_modified, "cache evaluated");

    CacheDecision {
        not_modified,
        headers,
    }
}

/// Opaque validator for a file version, derived from its modification
/// time and size with a keyed one-way hash. Only the digest is exposed.
pub fn generate_etag(key: &str, modified: SystemTime, size: u64) -> String {
    let secs = unix_seconds(modified);

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(format!("etag-{}-{}", secs, size).as_bytes());
    let digest = hasher.finalize();

    format!("\"{}\"", hex::encode(&digest[..16]))
}

// HTTP dates have one second resolution.
fn whole_seconds(t: SystemTime) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(unix_seconds(t))
}

fn unix_seconds(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
