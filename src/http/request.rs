//! HTTP/1.1 request parsing.
//!
//! [`Request::parse`] is the read half of the wire codec: it consumes a raw
//! byte buffer and produces an immutable [`Request`] whose body is exactly
//! `Content-Length` bytes long. Framing is strict: the parser neither
//! streams nor lazily reads, so by the time a request reaches the filter
//! pipeline its headers and body are complete. The head itself is parsed by
//! [`httparse`]; body framing on top is ours.
//!
//! `Transfer-Encoding` is deliberately *not* interpreted here. The codec
//! passes the raw header value through untouched; rejecting chunked framing
//! is a policy decision owned by the body-limit filter.

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method, Version};

/// Maximum number of header lines accepted per request.
const MAX_HEADERS: usize = 64;

/// Errors raised by the request parser.
///
/// Everything except [`Incomplete`](ParseError::Incomplete) is a terminal
/// parse failure that the fault-mapping layer answers with `400 Bad Request`.
/// `Incomplete` is a framing signal consumed by the connection read loop and
/// never escapes it.
#[derive(Debug, Error)]
pub enum ParseError {
    /// More bytes are needed before the request is complete.
    #[error("request is incomplete, more data needed")]
    Incomplete,

    /// The request line or a header line is malformed.
    #[error("malformed request head: {0}")]
    Head(#[from] httparse::Error),

    /// A header value contains bytes that are not valid UTF-8.
    #[error("header {name:?} has a non-UTF-8 value")]
    HeaderValue { name: String },

    /// The head was parsed but a mandatory piece is absent.
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    /// Only HTTP/1.0 and HTTP/1.1 are served.
    #[error("unsupported HTTP version 1.{0}")]
    UnsupportedVersion(u8),

    /// A `Content-Length` header is present but not a base-10 integer.
    #[error("invalid Content-Length: {value:?}")]
    InvalidContentLength { value: String },

    /// The header block exceeded the transport cap before terminating.
    #[error("request head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },
}

/// A fully parsed, immutable HTTP/1.1 request.
///
/// Built once per connection by [`Request::parse`] and then handed through
/// the filter pipeline by value; nothing mutates it after construction.
///
/// # Examples
///
/// ```
/// use portcullis::http::Request;
///
/// let raw = b"GET /posts?page=2 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let (request, consumed) = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.target(), "/posts?page=2");
/// assert_eq!(request.path(), "/posts");
/// assert_eq!(request.query(), Some("page=2"));
/// assert_eq!(consumed, raw.len());
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    version: Version,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Parses one complete HTTP/1.1 message from `buf`.
    ///
    /// On success, returns the request and the number of bytes consumed
    /// (head plus exactly `Content-Length` body bytes). The body is framed
    /// strictly by `Content-Length`: an absent header means an empty body,
    /// while a present-but-garbage value is a parse failure.
    ///
    /// # Errors
    ///
    /// - [`ParseError::Incomplete`]: the head or the declared body has not
    ///   fully arrived yet; read more and call again.
    /// - Any other variant: the message is malformed and cannot become a
    ///   request.
    pub fn parse(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut head = httparse::Request::new(&mut headers);

        let body_offset = match head.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(ParseError::Incomplete),
        };

        let method: Method = head
            .method
            .ok_or(ParseError::MissingField { field: "method" })?
            .parse()
            .unwrap(); // Infallible

        let target = head
            .path
            .ok_or(ParseError::MissingField { field: "target" })?
            .to_owned();

        let version = match head
            .version
            .ok_or(ParseError::MissingField { field: "version" })?
        {
            0 => Version::Http10,
            1 => Version::Http11,
            minor => return Err(ParseError::UnsupportedVersion(minor)),
        };

        let mut header_map = Headers::with_capacity(head.headers.len());
        for header in head.headers.iter() {
            let value =
                std::str::from_utf8(header.value).map_err(|_| ParseError::HeaderValue {
                    name: header.name.to_owned(),
                })?;
            header_map.insert(header.name, value);
        }

        let body_len = declared_body_len(&header_map)?;
        // Saturating: an absurd Content-Length can never be satisfied, so it
        // reads as Incomplete and the transport's buffer cap answers it.
        let consumed = body_offset.saturating_add(body_len);
        if buf.len() < consumed {
            return Err(ParseError::Incomplete);
        }

        let path = match target.find('?') {
            Some(pos) => target[..pos].to_owned(),
            None => target.clone(),
        };
        let body = Bytes::copy_from_slice(&buf[body_offset..consumed]);

        Ok((
            Self {
                method,
                target,
                path,
                version,
                headers: header_map,
                body,
            },
            consumed,
        ))
    }

    /// Assembles a request directly from its parts, bypassing the wire
    /// parser. Intended for tests and for driving the pipeline in-process;
    /// the path is derived from `target` the same way `parse` derives it.
    pub fn from_parts(
        method: Method,
        target: impl Into<String>,
        version: Version,
        headers: Headers,
        body: impl Into<Bytes>,
    ) -> Self {
        let target = target.into();
        let path = match target.find('?') {
            Some(pos) => target[..pos].to_owned(),
            None => target.clone(),
        };
        Self {
            method,
            target,
            path,
            version,
            headers,
            body: body.into(),
        }
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the raw request target exactly as it appeared on the request
    /// line, query string included.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the request path, the target with any query string removed.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query string (without the leading `?`), if any.
    pub fn query(&self) -> Option<&str> {
        match self.target.find('?') {
            Some(pos) => Some(&self.target[pos + 1..]),
            None => None,
        }
    }

    /// Returns the protocol version from the request line.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request body. Its length is exactly the parsed
    /// `Content-Length`, or zero when none was sent.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the `Content-Length` header parsed as `usize`, if present
    /// and well-formed.
    pub fn content_length(&self) -> Option<usize> {
        self.headers.get("content-length")?.trim().parse().ok()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Examples
    ///
    /// ```
    /// use portcullis::http::{Headers, Method, Request, Version};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Login { user: String }
    ///
    /// let req = Request::from_parts(
    ///     Method::Post,
    ///     "/login",
    ///     Version::Http11,
    ///     Headers::new(),
    ///     &br#"{"user":"mina"}"#[..],
    /// );
    /// let login: Login = req.json().unwrap();
    /// assert_eq!(login.user, "mina");
    /// ```
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(&self.body)
    }
}

/// Body length declared by the head: absent `Content-Length` is zero,
/// present-but-unparsable is a parse failure.
fn declared_body_len(headers: &Headers) -> Result<usize, ParseError> {
    match headers.get("content-length") {
        None => Ok(0),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidContentLength {
                value: raw.to_owned(),
            }),
    }
}
