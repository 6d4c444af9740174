use crate::http::request::{Headers, Method, ParseState, Request};

/// Marks the end of a request head.
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("malformed request method")]
    InvalidMethod,
    #[error("garbled protocol version")]
    InvalidVersion,
    #[error("malformed header line")]
    InvalidHeader,
    #[error("request head too large")]
    HeadersTooLarge,
    #[error("request head incomplete")]
    Incomplete,
}

/// Parses a request head (request line plus headers) from `buf`.
///
/// Returns the request and the number of bytes consumed, which is the
/// offset just past the blank line. Bytes after the terminator are left
/// alone.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let header_bytes = &buf[..headers_end];

    let headers_str =
        std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // METHOD SP PATH SP VERSION
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.splitn(3, ' ');

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if method_str.is_empty() || path.is_empty() || version.is_empty() {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    if !is_valid_version(version) {
        return Err(ParseError::InvalidVersion);
    }

    let mut headers = Headers::new();

    for line in lines {
        let (name, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        if name.is_empty() || name.contains([' ', '\t']) {
            return Err(ParseError::InvalidHeader);
        }

        headers.insert(name, value.trim());
    }

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        parse_state: ParseState::Complete,
    };

    Ok((request, headers_end + HEADER_TERMINATOR.len()))
}

/// Position of the first CRLFCRLF in `buf`.
pub fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

// Any `HTTP/<digits>[.<digits>]` is accepted, known or not.
fn is_valid_version(token: &str) -> bool {
    let Some(number) = token.strip_prefix("HTTP/") else {
        return false;
    };

    let mut parts = number.splitn(2, '.');
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    match (parts.next(), parts.next()) {
        (Some(major), None) => all_digits(major),
        (Some(major), Some(minor)) => all_digits(major) && all_digits(minor),
        _ => false,
    }
}
