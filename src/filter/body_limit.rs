//! Body size limiting filter.

use std::{future::Future, pin::Pin};

use super::{Fault, Filter, Next};
use crate::http::{alert, Request, Response};

/// Enforces the declared-body policy before anything downstream spends
/// effort on the payload.
///
/// Three rules, checked in order:
///
/// 1. A `Transfer-Encoding` mentioning `chunked` is refused outright with
///    `400`; chunked framing is not served here.
/// 2. A `Content-Length` that is present but not a base-10 integer is `400`.
/// 3. A declared length over the configured maximum is `413`.
///
/// The check reads headers only; it never inspects the body bytes. Rule 2
/// is unreachable behind the stock codec, which refuses such requests at
/// parse time, but the filter stands on its own when driven directly.
pub struct BodyLimitFilter {
    max_body_bytes: u64,
    home: String,
}

impl BodyLimitFilter {
    pub fn new(max_body_bytes: u64, home: impl Into<String>) -> Self {
        Self {
            max_body_bytes,
            home: home.into(),
        }
    }
}

impl Filter for BodyLimitFilter {
    fn apply(
        &self,
        req: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        let te = req
            .headers()
            .get("transfer-encoding")
            .unwrap_or("")
            .to_ascii_lowercase();
        if te.contains("chunked") {
            let home = self.home.clone();
            return Box::pin(async move {
                Ok(alert::bad_request(
                    "Chunked transfer encoding is not supported.",
                    &home,
                ))
            });
        }

        let mut len = 0u64;
        if let Some(raw) = req.headers().get("content-length") {
            let raw = raw.trim();
            if !raw.is_empty() {
                match raw.parse::<u64>() {
                    Ok(value) => len = value,
                    Err(_) => {
                        let home = self.home.clone();
                        return Box::pin(async move {
                            Ok(alert::bad_request(
                                "The Content-Length header is not valid.",
                                &home,
                            ))
                        });
                    }
                }
            }
        }

        if len > self.max_body_bytes {
            let home = self.home.clone();
            return Box::pin(async move {
                Ok(alert::payload_too_large(
                    "The request body is too large.",
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

    fn post(headers: Headers) -> Request {
        Request::from_parts(Method::Post, "/upload", Version::Http11, headers, "")
    }

    fn header(name: &str, value: &str) -> Headers {
        let mut headers = Headers::new();
        headers.insert(name, value);
        headers
    }

    async fn run(filter: &BodyLimitFilter, req: Request) -> Response {
        let next = Next::new(vec![], Arc::new(Ack));
        filter.apply(req, next).await.unwrap()
    }

    #[tokio::test]
    async fn chunked_transfer_encoding_is_refused() {
        let filter = BodyLimitFilter::new(1024, "/");
        let res = run(&filter, post(header("Transfer-Encoding", "chunked"))).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        let body = String::from_utf8(res.body().to_vec()).unwrap();
        assert!(body.contains("Chunked transfer encoding is not supported."));
    }

    #[tokio::test]
    async fn chunked_is_matched_case_insensitively_and_in_lists() {
        let filter = BodyLimitFilter::new(1024, "/");
        let res = run(&filter, post(header("Transfer-Encoding", "gzip, Chunked"))).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn unparsable_content_length_is_refused() {
        let filter = BodyLimitFilter::new(1024, "/");
        for bad in ["abc", "-5", "1e3"] {
            let res = run(&filter, post(header("Content-Length", bad))).await;
            assert_eq!(res.status(), StatusCode::BadRequest, "value {bad:?}");
        }
    }

    #[tokio::test]
    async fn oversize_declaration_is_413() {
        let filter = BodyLimitFilter::new(10, "/");
        let res = run(&filter, post(header("Content-Length", "11"))).await;
        assert_eq!(res.status(), StatusCode::PayloadTooLarge);
    }

    #[tokio::test]
    async fn at_the_limit_passes() {
        let filter = BodyLimitFilter::new(10, "/");
        let res = run(&filter, post(header("Content-Length", "10"))).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn no_declared_body_passes() {
        let filter = BodyLimitFilter::new(0, "/");
        let res = run(&filter, post(Headers::new())).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }
}
