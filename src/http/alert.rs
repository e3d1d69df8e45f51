//! Shared HTML alert pages for policy refusals and fault mapping.
//!
//! Every filter that turns a request away answers with the same small page:
//! the status reason as the heading, the explanation underneath, and a link
//! onward (usually home, the login page for `401`). Keeping the builder in
//! one place keeps the pages uniform and the escaping honest.

use super::{Response, StatusCode};

/// `400 Bad Request` alert.
pub fn bad_request(message: &str, link: &str) -> Response {
    page(StatusCode::BadRequest, message, link)
}

/// `401 Unauthorized` alert. `link` should point at the sign-in page.
pub fn unauthorized(message: &str, link: &str) -> Response {
    page(StatusCode::Unauthorized, message, link)
}

/// `403 Forbidden` alert.
pub fn forbidden(message: &str, link: &str) -> Response {
    page(StatusCode::Forbidden, message, link)
}

/// `404 Not Found` alert.
pub fn not_found(message: &str, link: &str) -> Response {
    page(StatusCode::NotFound, message, link)
}

/// `413 Payload Too Large` alert.
pub fn payload_too_large(message: &str, link: &str) -> Response {
    page(StatusCode::PayloadTooLarge, message, link)
}

/// `415 Unsupported Media Type` alert.
pub fn unsupported_media_type(message: &str, link: &str) -> Response {
    page(StatusCode::UnsupportedMediaType, message, link)
}

/// `500 Internal Server Error` alert.
pub fn server_error(message: &str, link: &str) -> Response {
    page(StatusCode::InternalServerError, message, link)
}

/// Builds an alert page for an arbitrary status.
///
/// The message is HTML-escaped; the reason phrase and link are trusted
/// (they come from this crate, not from the peer).
pub fn page(status: StatusCode, message: &str, link: &str) -> Response {
    let reason = status.canonical_reason();
    let body = format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"UTF-8\"><title>{reason}</title></head>\n\
         <body style=\"font-family:Arial,sans-serif;margin:40px;\">\
         <h1>{reason}</h1>\
         <p>{}</p>\
         <p><a href=\"{link}\">Back to home</a></p>\
         </body></html>",
        escape(message),
    );
    Response::html(status, body)
}

/// Escapes the characters that would let a message break out of the page.
fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
