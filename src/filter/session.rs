//! Session enforcement filter.

use std::collections::HashSet;
use std::sync::Arc;
use std::{future::Future, pin::Pin};

use super::{Fault, Filter, Next};
use crate::http::{alert, Method, Request, Response};
use crate::session::{self, SessionValidator};

/// Turns away requests that carry no valid session, except on public paths.
///
/// Public paths are two allow-sets keyed by method class: one consulted for
/// `GET`/`HEAD`, one for `POST` (so the login form page and the login
/// submission can each be opened up independently). Any other method is
/// never public. Everything else needs a session cookie that the
/// [`SessionValidator`] accepts; otherwise the answer is `401` with a link
/// to the sign-in page.
pub struct SessionFilter {
    validator: Arc<dyn SessionValidator>,
    public_get: HashSet<String>,
    public_post: HashSet<String>,
    login_page: String,
}

impl SessionFilter {
    pub fn new(
        validator: Arc<dyn SessionValidator>,
        public_get: impl IntoIterator<Item = impl Into<String>>,
        public_post: impl IntoIterator<Item = impl Into<String>>,
        login_page: impl Into<String>,
    ) -> Self {
        Self {
            validator,
            public_get: public_get.into_iter().map(Into::into).collect(),
            public_post: public_post.into_iter().map(Into::into).collect(),
            login_page: login_page.into(),
        }
    }

    fn is_public(&self, method: &Method, path: &str) -> bool {
        match method {
            Method::Get | Method::Head => self.public_get.contains(path),
            Method::Post => self.public_post.contains(path),
            _ => false,
        }
    }
}

impl Filter for SessionFilter {
    fn apply(
        &self,
        req: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        let path = if req.path().is_empty() {
            "/".to_owned()
        } else {
            req.path().to_owned()
        };

        if self.is_public(req.method(), &path) {
            return Box::pin(async move { next.run(req).await });
        }

        let valid = session::session_id(req.headers())
            .map(|id| self.validator.validate(&id).is_some())
            .unwrap_or(false);

        if !valid {
            let method = req.method().clone();
            let login_page = self.login_page.clone();
            return Box::pin(async move {
                tracing::warn!("unauthorized request: {} {}", method, path);
                Ok(alert::unauthorized("Sign-in is required.", &login_page))
            });
        }

        Box::pin(async move { next.run(req).await })
    }
}
