use std::collections::HashMap;

use crate::http::parser::{ParseError, parse_http_request};

/// HTTP request methods.
///
/// The static file handler serves every method like GET, except HEAD which
/// gets the headers only. Well-formed tokens outside the standard set are
/// kept as [`Method::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    GET,
    /// Served like GET, minus the body.
    HEAD,
    POST,
    PUT,
    DELETE,
    OPTIONS,
    PATCH,
    /// Any other method token, as sent.
    Other(String),
}

impl Method {
    /// Parses a method token. Tokens are case-sensitive; `None` means the
    /// token is empty or contains characters a method cannot have.
    ///
    /// # Example
    ///
    /// ```
    /// # use breeze::http::request::Method;
    /// assert_eq!(Method::from_str("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_str("PURGE"), Some(Method::Other("PURGE".into())));
    /// assert_eq!(Method::from_str("GE(T"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        let method = match s {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "HEAD" => Method::HEAD,
            "OPTIONS" => Method::OPTIONS,
            "PATCH" => Method::PATCH,
            _ if is_token(s) => Method::Other(s.to_string()),
            _ => return None,
        };
        Some(method)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::OPTIONS => "OPTIONS",
            Method::PATCH => "PATCH",
            Method::Other(token) => token,
        }
    }
}

// RFC 9110 token: one or more tchar.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
        })
}

/// Request header table.
///
/// Names are case-folded on insertion and lookup; a repeated header
/// replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    map: HashMap<String, String>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.map.insert(name.to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Progress of header parsing for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    AwaitingHeaders,
    Complete,
    Error,
}

/// Outcome of feeding a buffer to [`Request::parse_headers`].
#[derive(Debug, PartialEq, Eq)]
pub enum ParseStatus {
    /// Head parsed; the value is the number of bytes consumed, terminator included.
    Complete(usize),
    /// No header terminator in the buffer yet.
    Incomplete,
    Error(ParseError),
}

/// Represents an HTTP request head received from a client.
#[derive(Debug, Clone)]
pub struct Request {
    /// The HTTP method (GET, HEAD, ...)
    pub method: Method,
    /// The request target as sent (e.g. "/index.html")
    pub path: String,
    /// Protocol version token (typically "HTTP/1.1")
    pub version: String,
    pub headers: Headers,
    pub parse_state: ParseState,
}

impl Default for Request {
    fn default() -> Self {
        Self::new()
    }
}

impl Request {
    /// Creates an empty request waiting for its header block.
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            path: String::new(),
            version: String::new(),
            headers: Headers::new(),
            parse_state: ParseState::AwaitingHeaders,
        }
    }

    /// Parses a request head out of `buf` into `self`.
    ///
    /// Once the request is complete it is left untouched; feeding it again
    /// reports an error.
    pub fn parse_headers(&mut self, buf: &[u8]) -> ParseStatus {
        if self.parse_state != ParseState::AwaitingHeaders {
            return ParseStatus::Error(ParseError::InvalidRequest);
        }

        match parse_http_request(buf) {
            Ok((parsed, consumed)) => {
                *self = parsed;
                self.parse_state = ParseState::Complete;
                ParseStatus::Complete(consumed)
            }
            Err(ParseError::Incomplete) => ParseStatus::Incomplete,
            Err(e) => {
                self.parse_state = ParseState::Error;
                ParseStatus::Error(e)
            }
        }
    }

    /// Retrieves a header value by name, ignoring case.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key)
    }
}

/// Builder for constructing Request objects.
pub struct RequestBuilder {
    method: Option<Method>,
    path: Option<String>,
    version: Option<String>,
    headers: Headers,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self {
            method: None,
            path: None,
            version: None,
            headers: Headers::new(),
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.insert(key, value);
        self
    }

    pub fn build(self) -> Result<Request, &'static str> {
        Ok(Request {
            method: self.method.ok_or("method missing")?,
            path: self.path.ok_or("path missing")?,
            version: self.version.unwrap_or_else(|| "HTTP/1.1".to_string()),
            headers: self.headers,
            parse_state: ParseState::Complete,
        })
    }
}
