//! Request logging filter.

use std::{future::Future, pin::Pin};

use tokio::time::Instant;

use super::{Fault, Filter, Next};
use crate::http::{Request, Response};

/// Logs each request's method, path, outcome, and duration.
///
/// Emits a single `tracing::info!` line after the rest of the chain
/// completes, in the format:
///
/// ```text
/// METHOD /path - STATUS (duration)
/// ```
///
/// Sits outermost in the stock chain so the logged status is the one that
/// actually goes on the wire, fault mapping included. If a fault somehow
/// escapes the chain (no fault-mapping filter installed), it is logged at
/// `warn` and passed along untouched. `LoggingFilter` never short-circuits.
pub struct LoggingFilter;

impl Filter for LoggingFilter {
    fn apply(
        &self,
        req: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = req.method().as_str().to_string();
            let path = req.path().to_string();

            let result = next.run(req).await;

            let duration = start.elapsed();
            match &result {
                Ok(response) => {
                    tracing::info!(
                        "{} {} - {} ({:?})",
                        method,
                        path,
                        response.status().as_u16(),
                        duration
                    );
                }
                Err(fault) => {
                    tracing::warn!("{} {} - unmapped fault: {} ({:?})", method, path, fault, duration);
                }
            }

            result
        })
    }
}
