//! Fault mapping: the single place faults become HTTP responses.

use std::{future::Future, pin::Pin};

use super::{Fault, Filter, Next};
use crate::http::{alert, Request, Response};

/// Catches every [`Fault`] raised downstream and answers with the matching
/// alert page, so faults never propagate past this point in the chain.
///
/// The mapping, in full:
///
/// | fault | status | page message |
/// |---|---|---|
/// | [`Fault::Parse`] | `400` | request syntax is not valid |
/// | [`Fault::Forbidden`] | `403` | access is not allowed |
/// | [`Fault::NotImplemented`] | `500` | operation not yet supported |
/// | [`Fault::Io`], [`Fault::Other`] | `500` | generic server error |
///
/// A missing feature deliberately reads differently from a genuine failure,
/// even though both are status `500`. The page detail never echoes the
/// underlying fault text; that goes to the log, not to the peer.
pub struct FaultFilter {
    home: String,
}

impl FaultFilter {
    /// `home` is where every alert page links back to.
    pub fn new(home: impl Into<String>) -> Self {
        Self { home: home.into() }
    }
}

impl Filter for FaultFilter {
    fn apply(
        &self,
        req: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        let home = self.home.clone();
        Box::pin(async move {
            match next.run(req).await {
                Ok(response) => Ok(response),
                Err(fault) => Ok(fault_response(&fault, &home)),
            }
        })
    }
}

/// Maps a fault to its alert response.
///
/// Shared by [`FaultFilter`] and by the connection worker, which uses it for
/// parse failures that happen before a request exists to send through the
/// pipeline. Keeping one function keeps the two paths identical.
pub fn fault_response(fault: &Fault, home: &str) -> Response {
    match fault {
        Fault::Parse(cause) => {
            tracing::debug!("parse fault: {cause}");
            alert::bad_request("The request syntax is not valid.", home)
        }
        Fault::Forbidden(cause) => {
            tracing::warn!("forbidden: {cause}");
            alert::forbidden("Access is not allowed.", home)
        }
        Fault::NotImplemented(what) => {
            tracing::warn!("not implemented: {what}");
            alert::server_error("This operation is not yet supported.", home)
        }
        Fault::Io(cause) => {
            tracing::error!("i/o fault while handling request: {cause}");
            alert::server_error("An internal server error occurred.", home)
        }
        Fault::Other(cause) => {
            tracing::error!("unhandled fault: {cause}");
            alert::server_error("An internal server error occurred.", home)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::filter::Dispatch;
    use crate::http::{Headers, Method, ParseError, StatusCode, Version};

    struct Raise(fn() -> Fault);

    impl Dispatch for Raise {
        fn route(
            &self,
            _req: Request,
        ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
            let make = self.0;
            Box::pin(async move { Err(make()) })
        }
    }

    fn get() -> Request {
        Request::from_parts(Method::Get, "/", Version::Http11, Headers::new(), "")
    }

    async fn mapped(make: fn() -> Fault) -> Response {
        let next = Next::new(vec![], Arc::new(Raise(make)));
        FaultFilter::new("/").apply(get(), next).await.unwrap()
    }

    fn body_text(res: &Response) -> String {
        String::from_utf8(res.body().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn parse_fault_maps_to_400() {
        let res = mapped(|| Fault::Parse(ParseError::Incomplete)).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert!(body_text(&res).contains("The request syntax is not valid."));
    }

    #[tokio::test]
    async fn forbidden_maps_to_403() {
        let res = mapped(|| Fault::Forbidden("off limits".to_owned())).await;
        assert_eq!(res.status(), StatusCode::Forbidden);
        assert!(body_text(&res).contains("Access is not allowed."));
    }

    #[tokio::test]
    async fn not_implemented_maps_to_500_with_its_own_message() {
        let res = mapped(|| Fault::NotImplemented("PATCH /posts".to_owned())).await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        assert!(body_text(&res).contains("This operation is not yet supported."));
    }

    #[tokio::test]
    async fn everything_else_maps_to_generic_500() {
        let res = mapped(|| Fault::Other("database exploded".to_owned())).await;
        assert_eq!(res.status(), StatusCode::InternalServerError);
        let body = body_text(&res);
        assert!(body.contains("An internal server error occurred."));
        // The internal detail stays out of the page.
        assert!(!body.contains("database exploded"));
    }

    #[tokio::test]
    async fn successful_responses_pass_untouched() {
        struct Fine;
        impl Dispatch for Fine {
            fn route(
                &self,
                _req: Request,
            ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
                Box::pin(async { Ok(Response::text(StatusCode::Ok, "fine")) })
            }
        }

        let next = Next::new(vec![], Arc::new(Fine));
        let res = FaultFilter::new("/").apply(get(), next).await.unwrap();
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body().as_ref(), b"fine");
    }
}
