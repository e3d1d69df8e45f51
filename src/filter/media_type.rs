//! Media type screening filter.

use std::collections::HashSet;
use std::{future::Future, pin::Pin};

use super::{Fault, Filter, Next};
use crate::http::{alert, Request, Response};

/// Validates the `Content-Type` of body-bearing requests.
///
/// Only `POST`, `PUT`, and `PATCH` are screened, and only when the request
/// actually declares a body (positive `Content-Length`, or a
/// `Transfer-Encoding` mentioning `chunked`; the body-limit filter refuses
/// those earlier in the stock chain, but this filter does not assume that).
/// The comparison strips media type parameters: `application/json;
/// charset=utf-8` is compared as `application/json`, case-insensitively.
///
/// A screened request with no `Content-Type`, or one outside the allow-set,
/// is answered with `415`.
pub struct MediaTypeFilter {
    allowed: HashSet<String>,
    home: String,
}

impl MediaTypeFilter {
    /// Allow-set with the types the stock handlers accept: JSON, URL-encoded
    /// forms, and multipart uploads.
    pub fn with_defaults(home: impl Into<String>) -> Self {
        Self::new(
            home,
            [
                "application/json",
                "application/x-www-form-urlencoded",
                "multipart/form-data",
            ],
        )
    }

    /// Allow-set from `allowed`; entries are trimmed and lowercased so the
    /// set can be written naturally in config.
    pub fn new(
        home: impl Into<String>,
        allowed: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(|t| t.into().trim().to_ascii_lowercase())
                .collect(),
            home: home.into(),
        }
    }
}

impl Filter for MediaTypeFilter {
    fn apply(
        &self,
        req: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        if !req.method().may_have_body() {
            return Box::pin(async move { next.run(req).await });
        }

        let te = req
            .headers()
            .get("transfer-encoding")
            .unwrap_or("")
            .to_ascii_lowercase();
        let declared_len: u64 = req
            .headers()
            .get("content-length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0);
        let has_body = declared_len > 0 || te.contains("chunked");
        if !has_body {
            return Box::pin(async move { next.run(req).await });
        }

        let raw = req.headers().get("content-type").unwrap_or("").trim();
        if raw.is_empty() {
            let home = self.home.clone();
            return Box::pin(async move {
                Ok(alert::unsupported_media_type(
                    "The request has a body but no Content-Type header.",
                    &home,
                ))
            });
        }

        // "application/json; charset=utf-8" compares as "application/json"
        let mut media_type = raw.to_ascii_lowercase();
        if let Some(semi) = media_type.find(';') {
            media_type.truncate(semi);
        }
        let media_type = media_type.trim().to_owned();

        if !self.allowed.contains(&media_type) {
            let home = self.home.clone();
            return Box::pin(async move {
                Ok(alert::unsupported_media_type(
                    &format!("Unsupported media type: {media_type}"),
                    &home,
                ))
            });
        }

        Box::pin(async move { next.run(req).await })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::filter::Dispatch;
    use crate::http::{Headers, Method, StatusCode, Version};

    struct Ack;

    impl Dispatch for Ack {
        fn route(
            &self,
            _req: Request,
        ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
            Box::pin(async { Ok(Response::text(StatusCode::Ok, "ok")) })
        }
    }

    fn request(method: Method, headers: Headers) -> Request {
        Request::from_parts(method, "/submit", Version::Http11, headers, "")
    }

    fn body_headers(content_type: Option<&str>) -> Headers {
        let mut headers = Headers::new();
        headers.insert("Content-Length", "12");
        if let Some(ct) = content_type {
            headers.insert("Content-Type", ct);
        }
        headers
    }

    async fn run(filter: &MediaTypeFilter, req: Request) -> Response {
        let next = Next::new(vec![], Arc::new(Ack));
        filter.apply(req, next).await.unwrap()
    }

    #[tokio::test]
    async fn get_is_never_screened() {
        let filter = MediaTypeFilter::with_defaults("/");
        // Even a GET with a weird declared type is ignored.
        let res = run(&filter, request(Method::Get, body_headers(Some("text/csv")))).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn bodyless_post_is_not_screened() {
        let filter = MediaTypeFilter::with_defaults("/");
        let res = run(&filter, request(Method::Post, Headers::new())).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn post_with_body_but_no_type_is_415() {
        let filter = MediaTypeFilter::with_defaults("/");
        let res = run(&filter, request(Method::Post, body_headers(None))).await;
        assert_eq!(res.status(), StatusCode::UnsupportedMediaType);
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.contains("no Content-Type header"));
    }

    #[tokio::test]
    async fn parameters_and_case_are_ignored_in_the_comparison() {
        let filter = MediaTypeFilter::with_defaults("/");
        let res = run(
            &filter,
            request(
                Method::Post,
                body_headers(Some("Application/JSON; charset=utf-8")),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn disallowed_type_is_415_and_named_in_the_page() {
        let filter = MediaTypeFilter::with_defaults("/");
        let res = run(
            &filter,
            request(Method::Post, body_headers(Some("text/xml"))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UnsupportedMediaType);
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.contains("text/xml"));
    }

    #[tokio::test]
    async fn put_and_patch_are_screened_too() {
        let filter = MediaTypeFilter::with_defaults("/");
        for method in [Method::Put, Method::Patch] {
            let res = run(&filter, request(method, body_headers(Some("text/xml")))).await;
            assert_eq!(res.status(), StatusCode::UnsupportedMediaType);
        }
    }

    #[tokio::test]
    async fn custom_allow_set_is_normalized() {
        let filter = MediaTypeFilter::new("/", ["  Text/CSV  "]);
        let res = run(
            &filter,
            request(Method::Post, body_headers(Some("text/csv"))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn chunked_marker_counts_as_a_body() {
        let filter = MediaTypeFilter::with_defaults("/");
        let mut headers = Headers::new();
        headers.insert("Transfer-Encoding", "chunked");
        let res = run(&filter, request(Method::Post, headers)).await;
        // No Content-Type on a chunked body: screened and refused.
        assert_eq!(res.status(), StatusCode::UnsupportedMediaType);
    }
}
