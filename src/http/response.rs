//! HTTP/1.1 response values and wire serialization.
//!
//! A [`Response`] is immutable once built: filters that need to change one
//! (the HEAD filter, for instance) take it apart with
//! [`into_parts`](Response::into_parts) and build a new value rather than
//! mutating in place.
//!
//! [`encode`](Response::encode) is deliberately verbatim: it writes the
//! status line, the headers exactly as stored, and the body, and never
//! invents headers on the caller's behalf. The factories here therefore set
//! `Content-Type` and `Content-Length` explicitly so that what you build is
//! what goes on the wire.

use bytes::{Bytes, BytesMut};

use super::{Headers, StatusCode};

/// An immutable HTTP response: status, headers, body.
///
/// # Examples
///
/// ```
/// use portcullis::http::{Response, StatusCode};
///
/// let res = Response::text(StatusCode::Ok, "hello");
/// assert_eq!(res.status(), StatusCode::Ok);
/// assert_eq!(res.headers().get("content-length"), Some("5"));
///
/// let wire = res.encode();
/// assert!(wire.starts_with(b"HTTP/1.1 200 OK\r\n"));
/// assert!(wire.ends_with(b"\r\n\r\nhello"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// A bare response: the given status, no headers, empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// A `text/plain` response with `Content-Type` and `Content-Length` set.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_typed_body(status, "text/plain; charset=utf-8", body.into().into_bytes())
    }

    /// A `text/html` response with `Content-Type` and `Content-Length` set.
    pub fn html(status: StatusCode, body: impl Into<String>) -> Self {
        Self::with_typed_body(status, "text/html; charset=utf-8", body.into().into_bytes())
    }

    /// An `application/json` response serialized from `value`.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] if `value` cannot be
    /// serialized.
    pub fn json<T: serde::Serialize>(
        status: StatusCode,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::with_typed_body(status, "application/json", body))
    }

    /// A redirect to `location` with an empty body.
    pub fn redirect(status: StatusCode, location: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.insert("Location", location.into());
        headers.insert("Content-Length", "0");
        Self {
            status,
            headers,
            body: Bytes::new(),
        }
    }

    fn with_typed_body(status: StatusCode, content_type: &str, body: Vec<u8>) -> Self {
        let mut headers = Headers::new();
        headers.insert("Content-Type", content_type);
        headers.insert("Content-Length", body.len().to_string());
        Self {
            status,
            headers,
            body: Bytes::from(body),
        }
    }

    /// Adds a header, consuming and returning the response builder-style.
    ///
    /// ```
    /// use portcullis::http::{Response, StatusCode};
    ///
    /// let res = Response::new(StatusCode::NoContent)
    ///     .header("Set-Cookie", "sid=abc; HttpOnly");
    /// assert_eq!(res.headers().get("set-cookie"), Some("sid=abc; HttpOnly"));
    /// ```
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Assembles a response from raw parts. The inverse of
    /// [`into_parts`](Self::into_parts).
    pub fn from_parts(status: StatusCode, headers: Headers, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Decomposes the response into `(status, headers, body)`.
    pub fn into_parts(self) -> (StatusCode, Headers, Bytes) {
        (self.status, self.headers, self.body)
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Serializes the response to wire bytes.
    ///
    /// Writes `HTTP/1.1 <code> <reason>`, then every header in insertion
    /// order, a blank line, and the body. Nothing is added or reordered:
    /// a response without a `Content-Length` header is encoded without one.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(128 + self.body.len());
        buf.extend_from_slice(b"HTTP/1.1 ");
        buf.extend_from_slice(self.status.as_u16().to_string().as_bytes());
        buf.extend_from_slice(b" ");
        buf.extend_from_slice(self.status.canonical_reason().as_bytes());
        buf.extend_from_slice(b"\r\n");
        for (name, value) in self.headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(b"\r\n");
        }
        buf.extend_from_slice(b"\r\n");
        buf.extend_from_slice(&self.body);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_sets_type_and_length() {
        let res = Response::text(StatusCode::Ok, "hi there");
        assert_eq!(
            res.headers().get("content-type"),
            Some("text/plain; charset=utf-8")
        );
        assert_eq!(res.headers().get("content-length"), Some("8"));
        assert_eq!(res.body().as_ref(), b"hi there");
    }

    #[test]
    fn json_serializes_value() {
        let res = Response::json(StatusCode::Created, &serde_json::json!({"id": 7})).unwrap();
        assert_eq!(res.status(), StatusCode::Created);
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
        assert_eq!(res.body().as_ref(), br#"{"id":7}"#);
    }

    #[test]
    fn encode_writes_status_line_headers_and_body() {
        let res = Response::html(StatusCode::NotFound, "<p>gone</p>");
        let wire = res.encode();
        let text = std::str::from_utf8(&wire).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(text.contains("Content-Length: 11\r\n"));
        assert!(text.ends_with("\r\n\r\n<p>gone</p>"));
    }

    #[test]
    fn encode_is_verbatim_no_invented_headers() {
        // A response built without Content-Length must be written without
        // one; the encoder never injects headers.
        let res = Response::from_parts(StatusCode::Ok, Headers::new(), "raw");
        let text = String::from_utf8(res.encode().to_vec()).unwrap();
        assert_eq!(text, "HTTP/1.1 200 OK\r\n\r\nraw");
    }

    #[test]
    fn header_order_is_preserved_on_the_wire() {
        let res = Response::new(StatusCode::Ok)
            .header("X-First", "1")
            .header("X-Second", "2")
            .header("X-Third", "3");
        let text = String::from_utf8(res.encode().to_vec()).unwrap();
        let first = text.find("X-First").unwrap();
        let second = text.find("X-Second").unwrap();
        let third = text.find("X-Third").unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn redirect_carries_location() {
        let res = Response::redirect(StatusCode::SeeOther, "/login");
        assert_eq!(res.headers().get("location"), Some("/login"));
        assert_eq!(res.headers().get("content-length"), Some("0"));
        assert!(res.body().is_empty());
    }

    #[test]
    fn parts_round_trip() {
        let res = Response::text(StatusCode::Ok, "body");
        let (status, headers, body) = res.into_parts();
        let rebuilt = Response::from_parts(status, headers, body);
        assert_eq!(rebuilt.headers().get("content-length"), Some("4"));
        assert_eq!(rebuilt.body().as_ref(), b"body");
    }
}
