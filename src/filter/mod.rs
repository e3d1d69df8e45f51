//! Filter pipeline: ordered, short-circuiting request policy chain.
//!
//! Every parsed request flows through a fixed, ordered list of filters before
//! it may reach the router. Each filter can wave the request through, refuse
//! it with a response of its own, or decorate whatever came back from
//! downstream. The chain is strictly ordered and runs at most once per
//! request: a filter that answers early means everything after it (later
//! filters and the router alike) never sees the request at all.
//!
//! ## Core types
//!
//! - [`Filter`]: trait implemented by every pipeline stage.
//! - [`Next`]: cursor into the remaining chain; consumed by [`Next::run`],
//!   so a filter can forward a request at most once.
//! - [`Dispatch`]: the terminal the chain drains into (normally the
//!   router); reached only when every filter has passed the request on.
//! - [`Fault`]: the error channel filters and handlers raise into; the
//!   fault-mapping filter turns these into HTTP responses.
//! - [`Pipeline`]: an assembled chain plus terminal, shared across
//!   connections; each request gets a fresh cursor.
//!
//! The seven stock filters live in the submodules here and are re-exported:
//! logging, fault mapping, session enforcement, body-size limiting, media
//! type screening, path-scope containment, and HEAD body stripping.

use std::{future::Future, pin::Pin, sync::Arc};

use thiserror::Error;

use crate::http::{ParseError, Request, Response};

mod body_limit;
mod fault;
mod head;
mod logging;
mod media_type;
mod path_scope;
mod session;

pub use body_limit::BodyLimitFilter;
pub use fault::{fault_response, FaultFilter};
pub use head::HeadFilter;
pub use logging::LoggingFilter;
pub use media_type::MediaTypeFilter;
pub use path_scope::{resolve_within, PathScopeFilter};
pub use session::SessionFilter;

/// The error channel running beneath the pipeline.
///
/// Filters and handlers that cannot produce a response raise a `Fault`; the
/// fault-mapping filter near the top of the chain translates each variant
/// into an HTTP status. Parse faults become `400`, [`Forbidden`](Fault::Forbidden)
/// becomes `403`, and everything else becomes `500`;
/// [`NotImplemented`](Fault::NotImplemented) keeps its own message so a
/// missing feature reads differently from a genuine failure.
#[derive(Debug, Error)]
pub enum Fault {
    /// The request bytes could not become a request.
    #[error("request could not be parsed: {0}")]
    Parse(#[from] ParseError),

    /// The caller may not do what it asked, regardless of who it is.
    #[error("access denied: {0}")]
    Forbidden(String),

    /// The operation is recognized but not built yet.
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// An I/O failure while producing the response.
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else a handler wants to surface as a server error.
    #[error("{0}")]
    Other(String),
}

/// A type-erased, reference-counted filter function.
///
/// Every entry in the chain is stored as a `FilterHandler`; the [`Arc`]
/// wrapper makes entries cheap to clone as [`Next`] advances. Wrap a
/// [`Filter`] with [`from_filter`], or a closure directly:
///
/// ```
/// use std::sync::Arc;
/// use portcullis::filter::{FilterHandler, Next};
/// use portcullis::http::Request;
///
/// let passthrough: FilterHandler = Arc::new(|req: Request, next: Next| {
///     Box::pin(async move { next.run(req).await })
/// });
/// ```
pub type FilterHandler = Arc<
    dyn Fn(Request, Next) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// Converts a [`Filter`] implementation into a [`FilterHandler`].
pub fn from_filter<F>(filter: Arc<F>) -> FilterHandler
where
    F: Filter + ?Sized + 'static,
{
    Arc::new(move |req: Request, next: Next| filter.apply(req, next))
}

/// The trait every pipeline stage implements.
///
/// Implementors receive the request by value together with a [`Next`]
/// cursor. They may:
///
/// - **Pass through**: call `next.run(req).await` unchanged.
/// - **Short-circuit**: return a [`Response`] directly; downstream filters
///   and the router never run.
/// - **Decorate**: forward the request, then inspect or rebuild the
///   response on the way back out.
/// - **Raise**: return a [`Fault`] for the fault-mapping filter to
///   translate.
///
/// # Contract
///
/// - Implementations must be `Send + Sync`; one filter instance serves every
///   connection concurrently.
/// - `apply` returns a pinned, `Send` future so the chain can be awaited on
///   a multi-threaded runtime.
///
/// # Examples
///
/// ```
/// use std::pin::Pin;
/// use portcullis::filter::{Fault, Filter, Next};
/// use portcullis::http::{Request, Response};
///
/// struct PassThrough;
///
/// impl Filter for PassThrough {
///     fn apply(
///         &self,
///         req: Request,
///         next: Next,
///     ) -> Pin<Box<dyn std::future::Future<Output = Result<Response, Fault>> + Send>> {
///         Box::pin(async move { next.run(req).await })
///     }
/// }
/// ```
pub trait Filter: Send + Sync {
    /// Handles the request, optionally delegating to the rest of the chain.
    fn apply(
        &self,
        req: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>>;
}

/// The terminal a drained chain dispatches into, in practice the router.
///
/// [`Next::run`] calls this exactly once per request, and only when no
/// filter short-circuited first.
pub trait Dispatch: Send + Sync {
    /// Produces the response for a request that passed every filter.
    fn route(
        &self,
        req: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>>;
}

/// A cursor into the remaining filter chain for a single request.
///
/// `Next` is handed to each filter's [`Filter::apply`]. Calling
/// [`run`](Self::run) advances past the current position and invokes the
/// next filter, or the terminal [`Dispatch`] once the chain is exhausted.
/// `run` consumes the cursor, so a filter cannot forward the same request
/// twice.
pub struct Next {
    filters: Arc<Vec<FilterHandler>>,
    terminal: Arc<dyn Dispatch>,
    // Position of the next filter to invoke.
    index: usize,
}

impl Next {
    /// Creates a cursor positioned at the start of `filters`, draining into
    /// `terminal`. Mostly useful for exercising a single filter in tests;
    /// [`Pipeline::handle`] builds cursors for real traffic.
    pub fn new(filters: Vec<FilterHandler>, terminal: Arc<dyn Dispatch>) -> Self {
        Self {
            filters: Arc::new(filters),
            terminal,
            index: 0,
        }
    }

    /// Invokes the next stage of the chain and returns its result.
    ///
    /// Advances the cursor by one and awaits the filter there; when every
    /// filter has run, dispatches into the terminal instead.
    pub async fn run(mut self, req: Request) -> Result<Response, Fault> {
        if self.index < self.filters.len() {
            let handler = self.filters[self.index].clone();
            self.index += 1;
            handler(req, self).await
        } else {
            self.terminal.route(req).await
        }
    }
}

/// An assembled filter chain plus terminal, shared across every connection.
///
/// The chain order is fixed at construction; [`handle`](Self::handle) walks
/// it front to back with a fresh cursor per request, so one request's
/// progress never leaks into another's.
pub struct Pipeline {
    filters: Arc<Vec<FilterHandler>>,
    terminal: Arc<dyn Dispatch>,
}

impl Pipeline {
    /// Builds a pipeline from filters in invocation order and the terminal
    /// they drain into.
    pub fn new(filters: Vec<Arc<dyn Filter>>, terminal: Arc<dyn Dispatch>) -> Self {
        let handlers = filters.into_iter().map(from_filter).collect();
        Self::from_handlers(handlers, terminal)
    }

    /// Builds a pipeline from already type-erased handlers.
    pub fn from_handlers(handlers: Vec<FilterHandler>, terminal: Arc<dyn Dispatch>) -> Self {
        Self {
            filters: Arc::new(handlers),
            terminal,
        }
    }

    /// Runs one request through the chain.
    ///
    /// Each call gets its own [`Next`] cursor starting at the first filter.
    /// The result is `Ok` when some stage produced a response and `Err` when
    /// a fault escaped the whole chain, which only happens when no
    /// fault-mapping filter is installed.
    pub async fn handle(&self, req: Request) -> Result<Response, Fault> {
        let next = Next {
            filters: Arc::clone(&self.filters),
            terminal: Arc::clone(&self.terminal),
            index: 0,
        };
        next.run(req).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::http::{Headers, Method, StatusCode, Version};

    fn request(method: Method, target: &str) -> Request {
        Request::from_parts(method, target, Version::Http11, Headers::new(), "")
    }

    /// Terminal that counts dispatches and echoes the request path.
    struct Echo {
        hits: AtomicUsize,
    }

    impl Echo {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                hits: AtomicUsize::new(0),
            })
        }
    }

    impl Dispatch for Echo {
        fn route(
            &self,
            req: Request,
        ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            let path = req.path().to_owned();
            Box::pin(async move { Ok(Response::text(StatusCode::Ok, path)) })
        }
    }

    /// Filter that appends its tag to a shared trace on the way in and out.
    struct Tag {
        name: &'static str,
        trace: Arc<Mutex<Vec<String>>>,
    }

    impl Filter for Tag {
        fn apply(
            &self,
            req: Request,
            next: Next,
        ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
            let name = self.name;
            let trace = Arc::clone(&self.trace);
            Box::pin(async move {
                trace.lock().unwrap().push(format!("{name}:in"));
                let result = next.run(req).await;
                trace.lock().unwrap().push(format!("{name}:out"));
                result
            })
        }
    }

    // ── ordering ──

    #[tokio::test]
    async fn filters_run_in_registration_order() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let terminal = Echo::new();
        let pipeline = Pipeline::new(
            vec![
                Arc::new(Tag {
                    name: "outer",
                    trace: Arc::clone(&trace),
                }),
                Arc::new(Tag {
                    name: "inner",
                    trace: Arc::clone(&trace),
                }),
            ],
            terminal.clone(),
        );

        let res = pipeline.handle(request(Method::Get, "/x")).await.unwrap();

        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["outer:in", "inner:in", "inner:out", "outer:out"]
        );
        assert_eq!(terminal.hits.load(Ordering::SeqCst), 1);
    }

    // ── short-circuit ──

    #[tokio::test]
    async fn short_circuit_skips_downstream_and_terminal() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let terminal = Echo::new();

        let refuse: FilterHandler = Arc::new(|_req, _next| {
            Box::pin(async { Ok(Response::text(StatusCode::Forbidden, "no")) })
        });
        let tag: FilterHandler = {
            let trace = Arc::clone(&trace);
            Arc::new(move |req, next: Next| {
                let trace = Arc::clone(&trace);
                Box::pin(async move {
                    trace.lock().unwrap().push("reached".to_owned());
                    next.run(req).await
                })
            })
        };

        let pipeline = Pipeline::from_handlers(vec![refuse, tag], terminal.clone());
        let res = pipeline.handle(request(Method::Get, "/")).await.unwrap();

        assert_eq!(res.status(), StatusCode::Forbidden);
        assert!(trace.lock().unwrap().is_empty());
        assert_eq!(terminal.hits.load(Ordering::SeqCst), 0);
    }

    // ── faults ──

    #[tokio::test]
    async fn fault_from_terminal_propagates_outward() {
        struct Failing;
        impl Dispatch for Failing {
            fn route(
                &self,
                _req: Request,
            ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
                Box::pin(async { Err(Fault::Other("boom".to_owned())) })
            }
        }

        let pipeline = Pipeline::new(vec![], Arc::new(Failing));
        let err = pipeline
            .handle(request(Method::Get, "/"))
            .await
            .unwrap_err();
        assert!(matches!(err, Fault::Other(msg) if msg == "boom"));
    }

    // ── exhaustion and reuse ──

    #[tokio::test]
    async fn empty_chain_goes_straight_to_terminal() {
        let terminal = Echo::new();
        let pipeline = Pipeline::new(vec![], terminal.clone());
        let res = pipeline
            .handle(request(Method::Get, "/direct"))
            .await
            .unwrap();
        assert_eq!(res.body().as_ref(), b"/direct");
        assert_eq!(terminal.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn each_request_gets_a_fresh_cursor() {
        let terminal = Echo::new();
        let pipeline = Pipeline::new(vec![], terminal.clone());

        for n in 1..=3 {
            pipeline
                .handle(request(Method::Get, "/again"))
                .await
                .unwrap();
            assert_eq!(terminal.hits.load(Ordering::SeqCst), n);
        }
    }
}
