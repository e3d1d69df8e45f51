//! Request routing, the terminal the filter chain drains into.
//!
//! [`Router`] implements [`Dispatch`] with a deliberately plain policy,
//! split by method rather than by pattern:
//!
//! | Request | Routed to |
//! |---|---|
//! | `GET`/`HEAD`, any path | the fallback handler (static files, typically) |
//! | `POST`, registered path | the handler registered for exactly that path |
//! | `POST`, other path | the POST fallback if one is set, else `405` |
//! | anything else | `405 Method Not Allowed` |
//!
//! `405` responses carry an `Allow` header naming what the router can
//! actually serve. Paths are matched exactly (no patterns, no captures)
//! because the filters in front of the router already decide everything
//! that needs more than a lookup.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use crate::filter::{Dispatch, Fault};
use crate::http::{Method, Request, Response, StatusCode};

pub mod static_files;

pub use static_files::StaticFiles;

/// Type-erased, heap-allocated async handler: takes the [`Request`],
/// returns a [`Response`] or raises a [`Fault`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be shared across
/// connections without copying the closure. You rarely construct this type
/// directly; registration methods accept [`impl IntoHandler`](IntoHandler).
pub type Handler = Arc<
    dyn Fn(Request) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>>
        + Send
        + Sync
        + 'static,
>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Request) -> impl Future<Output = Result<Response, Fault>> + Send`
/// that is also `Send + Sync + 'static` implements this automatically, so
/// plain `async` closures register directly.
pub trait IntoHandler: Send + Sync + 'static {
    /// Calls the handler, boxing the returned future.
    fn call(&self, req: Request) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Result<Response, Fault>> + Send + 'static,
{
    fn call(&self, req: Request) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        Box::pin((self)(req))
    }
}

/// Method-split router: a fallback for `GET`/`HEAD`, exact-path handlers
/// for `POST`, `405` for the rest.
///
/// # Examples
///
/// ```rust,no_run
/// use portcullis::http::{Request, Response, StatusCode};
/// use portcullis::router::Router;
///
/// let mut router = Router::new(|_req: Request| async {
///     Ok(Response::text(StatusCode::Ok, "static fallback"))
/// });
///
/// router.post("/posts/create", |req: Request| async move {
///     Ok(Response::text(StatusCode::Created, req.path().to_owned()))
/// });
/// ```
pub struct Router {
    fallback: Handler,
    posts: HashMap<String, Handler>,
    post_fallback: Option<Handler>,
}

impl Router {
    /// Creates a router whose `GET`/`HEAD` traffic all goes to `fallback`.
    pub fn new(fallback: impl IntoHandler) -> Self {
        Self {
            fallback: erase(fallback),
            posts: HashMap::new(),
            post_fallback: None,
        }
    }

    /// Registers a `POST` handler for exactly `path`. Registering the same
    /// path twice replaces the earlier handler.
    pub fn post(&mut self, path: impl Into<String>, handler: impl IntoHandler) {
        self.posts.insert(path.into(), erase(handler));
    }

    /// Sets the handler for `POST` requests whose path is not registered.
    /// Without one, those requests are answered `405`.
    pub fn post_fallback(&mut self, handler: impl IntoHandler) {
        self.post_fallback = Some(erase(handler));
    }

    fn accepts_post(&self) -> bool {
        self.post_fallback.is_some() || !self.posts.is_empty()
    }

    fn method_not_allowed(&self) -> Response {
        let allow = if self.accepts_post() {
            "GET, HEAD, POST"
        } else {
            "GET, HEAD"
        };
        Response::text(StatusCode::MethodNotAllowed, "Method Not Allowed").header("Allow", allow)
    }
}

// Erase the concrete handler type and store it as a `Handler` trait object.
fn erase(handler: impl IntoHandler) -> Handler {
    Arc::new(move |req| handler.call(req))
}

impl Dispatch for Router {
    fn route(
        &self,
        req: Request,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        match req.method() {
            Method::Get | Method::Head => {
                let handler = Arc::clone(&self.fallback);
                Box::pin(async move { handler(req).await })
            }
            Method::Post => {
                let handler = self
                    .posts
                    .get(req.path())
                    .cloned()
                    .or_else(|| self.post_fallback.clone());
                match handler {
                    Some(handler) => Box::pin(async move { handler(req).await }),
                    None => {
                        let res = self.method_not_allowed();
                        Box::pin(async move { Ok(res) })
                    }
                }
            }
            _ => {
                let res = self.method_not_allowed();
                Box::pin(async move { Ok(res) })
            }
        }
    }
}
