/// HTTP status codes produced by the server.
///
/// - `Ok` (200): Resource follows
/// - `NotModified` (304): Cached copy is still valid
/// - `BadRequest` (400): Malformed request target
/// - `Forbidden` (403): Access denied or target is a directory
/// - `NotFound` (404): Resource not found
/// - `InternalServerError` (500): Server error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 304 Not Modified
    NotModified,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Server Error
    InternalServerError,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use breeze::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotModified.as_u16(), 304);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::NotModified => 304,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalServerError => 500,
        }
    }

    /// Returns the standard HTTP reason phrase for this status code.
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::NotModified => "Not Modified",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalServerError => "Internal Server Error",
        }
    }

    /// Whether a response with this status may carry a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, StatusCode::NotModified)
    }
}

/// Status and headers of the response being produced for a request.
///
/// The body is not held here: it is streamed by the
/// [`ResponseWriter`](crate::http::writer::ResponseWriter) that owns this
/// value.
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    /// Protocol version echoed in the status line, copied from the request
    pub version: String,
    /// Serialized as `Content-Length` when set
    pub content_length: Option<u64>,
    headers: Vec<(String, String)>,
    done: bool,
}

impl Response {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            status: StatusCode::Ok,
            version: version.into(),
            content_length: None,
            headers: Vec::new(),
            done: false,
        }
    }

    /// Inserts a header or overwrites an existing one with the same name
    /// (ignoring case), keeping its original position.
    ///
    /// Ignored once the response is done.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        if self.done {
            tracing::warn!(header = name, "set_header on a finished response ignored");
            return;
        }

        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name.to_string(), value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Headers in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Scratch space for building a header value; it lives as long as the
    /// header table once passed to [`set_header`](Self::set_header).
    pub fn alloc(&self, size: usize) -> String {
        String::with_capacity(size)
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Marks the response complete. There is no way back.
    pub fn mark_done(&mut self) {
        self.done = true;
    }
}
