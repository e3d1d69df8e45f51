//! HEAD body stripping filter.

use std::{future::Future, pin::Pin};

use bytes::Bytes;

use super::{Fault, Filter, Next};
use crate::http::{Method, Request, Response};

/// Rebuilds `HEAD` responses without their body.
///
/// Sits innermost in the stock chain: the router answers a `HEAD` exactly
/// as it would the matching `GET`, and this filter drops the body on the
/// way out while keeping the status and every header, `Content-Length`
/// included, which is precisely what a `HEAD` response should advertise.
/// Non-`HEAD` requests pass through untouched, as do faults.
pub struct HeadFilter;

impl Filter for HeadFilter {
    fn apply(
        &self,
        req: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        let is_head = req.method() == &Method::Head;
        Box::pin(async move {
            let result = next.run(req).await;
            match result {
                Ok(response) if is_head => {
                    let (status, headers, _body) = response.into_parts();
                    Ok(Response::from_parts(status, headers, Bytes::new()))
                }
                other => other,
            }
        })
    }
}
