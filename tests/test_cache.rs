//! Tests for validator evaluation and cache headers

use std::time::{Duration, UNIX_EPOCH};

use breeze::config::{MAX_EXPIRE_HOURS, StaticConfig};
use breeze::static_files::FileMeta;
use breeze::static_files::cache::{evaluate, generate_etag};

fn meta(secs: u64, size: u64) -> FileMeta {
    FileMeta {
        size,
        modified: UNIX_EPOCH + Duration::from_secs(secs),
        is_dir: false,
    }
}

fn header<'a>(headers: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.as_str())
}

#[test]
fn test_etag_is_pure_function_of_mtime_and_size() {
    let t = UNIX_EPOCH + Duration::from_secs(1_000_000);

    assert_eq!(generate_etag("k", t, 10), generate_etag("k", t, 10));
    assert_ne!(generate_etag("k", t, 10), generate_etag("k", t, 11));
    assert_ne!(
        generate_etag("k", t, 10),
        generate_etag("k", t + Duration::from_secs(1), 10)
    );
    assert_ne!(generate_etag("k", t, 10), generate_etag("other", t, 10));
}

#[test]
fn test_etag_is_opaque_quoted_digest() {
    let tag = generate_etag("breeze", UNIX_EPOCH, 0);

    assert_eq!(tag.len(), 34);
    assert!(tag.starts_with('"') && tag.ends_with('"'));
    assert!(tag[1..33].bytes().all(|b| b.is_ascii_hexdigit()));
    assert!(!tag.contains("breeze"));
}

#[test]
fn test_etag_ignores_sub_second_mtime() {
    let t = UNIX_EPOCH + Duration::from_secs(42);
    assert_eq!(
        generate_etag("k", t, 1),
        generate_etag("k", t + Duration::from_millis(999), 1)
    );
}

#[test]
fn test_headers_in_order_with_expiry() {
    let cfg = StaticConfig::new("/srv");
    let decision = evaluate(None, None, &meta(1_700_000_000, 5), &cfg);

    let names: Vec<_> = decision.headers.iter().map(|(k, _)| *k).collect();
    assert_eq!(names, vec!["Last-Modified", "Expires", "Cache-Control"]);
    assert_eq!(
        header(&decision.headers, "Last-Modified"),
        Some("Tue, 14 Nov 2023 22:13:20 GMT")
    );
    assert_eq!(
        header(&decision.headers, "Expires"),
        Some("Wed, 15 Nov 2023 22:13:20 GMT")
    );
    assert_eq!(
        header(&decision.headers, "Cache-Control"),
        Some("max-age=86400")
    );
    assert!(!decision.not_modified);
}

#[test]
fn test_zero_expiry() {
    let mut cfg = StaticConfig::new("/srv");
    cfg.expire_hours = 0;
    let decision = evaluate(None, None, &meta(1_700_000_000, 5), &cfg);

    assert_eq!(header(&decision.headers, "Cache-Control"), Some("max-age=0"));
    assert_eq!(
        header(&decision.headers, "Expires"),
        header(&decision.headers, "Last-Modified")
    );
}

#[test]
fn test_exact_date_match_only() {
    let cfg = StaticConfig::new("/srv");
    let m = meta(1_700_000_000, 5);

    let same = evaluate(Some("Tue, 14 Nov 2023 22:13:20 GMT"), None, &m, &cfg);
    let later = evaluate(Some("Tue, 14 Nov 2023 22:13:21 GMT"), None, &m, &cfg);
    let earlier = evaluate(Some("Tue, 14 Nov 2023 22:13:19 GMT"), None, &m, &cfg);
    let garbage = evaluate(Some("not a date"), None, &m, &cfg);

    assert!(same.not_modified);
    assert!(!later.not_modified);
    assert!(!earlier.not_modified);
    assert!(!garbage.not_modified);
}

#[test]
fn test_etag_cancels_date_match_unless_tag_matches() {
    let mut cfg = StaticConfig::new("/srv");
    cfg.enable_etag = true;
    let m = meta(1_700_000_000, 5);
    let date = Some("Tue, 14 Nov 2023 22:13:20 GMT");
    let tag = generate_etag(&cfg.etag_key, m.modified, m.size);

    assert!(!evaluate(date, None, &m, &cfg).not_modified);
    assert!(!evaluate(date, Some("\"stale\""), &m, &cfg).not_modified);
    assert!(evaluate(date, Some(&tag), &m, &cfg).not_modified);
    assert!(!evaluate(None, Some(&tag), &m, &cfg).not_modified);

    let decision = evaluate(None, None, &m, &cfg);
    assert_eq!(header(&decision.headers, "ETag"), Some(tag.as_str()));
}

#[test]
fn test_oversized_expiry_is_capped() {
    let mut cfg = StaticConfig::new("/srv");
    cfg.expire_hours = i64::MAX;
    let m = meta(1_700_000_000, 5);

    let decision = evaluate(None, None, &m, &cfg);

    let max_age = MAX_EXPIRE_HOURS as u64 * 3600;
    assert_eq!(
        header(&decision.headers, "Cache-Control"),
        Some(format!("max-age={}", max_age).as_str())
    );
    assert_eq!(
        header(&decision.headers, "Expires"),
        Some(httpdate::fmt_http_date(m.modified + Duration::from_secs(max_age)).as_str())
    );
}
