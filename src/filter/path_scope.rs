//! Path containment filter.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::{future::Future, pin::Pin};

use percent_encoding::percent_decode_str;

use super::{Fault, Filter, Next};
use crate::http::{alert, Request, Response};

/// Refuses any request whose path would escape the configured root.
///
/// The check is lexical: the request path is percent-decoded, its `.` and
/// `..` segments resolved against the root, and the result must still sit
/// inside the root. No filesystem access happens here: a path can fail
/// containment even if nothing exists at it, and pass even if the target is
/// missing (the static handler answers `404` for those).
///
/// Containment failures are `403`, and so are paths that cannot be decoded
/// into UTF-8 at all.
pub struct PathScopeFilter {
    web_root: PathBuf,
    home: String,
}

impl PathScopeFilter {
    /// `web_root` is made absolute once here so later checks are pure string
    /// work.
    ///
    /// # Errors
    ///
    /// Fails when `web_root` cannot be absolutized (for instance, an empty
    /// path).
    pub fn new(web_root: impl AsRef<Path>, home: impl Into<String>) -> io::Result<Self> {
        Ok(Self {
            web_root: std::path::absolute(web_root)?,
            home: home.into(),
        })
    }
}

impl Filter for PathScopeFilter {
    fn apply(
        &self,
        req: Request,
        next: Next,
    ) -> Pin<Box<dyn Future<Output = Result<Response, Fault>> + Send>> {
        if resolve_within(&self.web_root, req.path()).is_none() {
            let home = self.home.clone();
            let path = req.path().to_owned();
            return Box::pin(async move {
                tracing::warn!("path escapes web root: {path:?}");
                Ok(alert::forbidden("The requested path is not allowed.", &home))
            });
        }
        Box::pin(async move { next.run(req).await })
    }
}

/// Resolves a raw request path against `root`, confined to `root`.
///
/// Percent-decodes the path, then walks its segments lexically: normal
/// segments descend, `..` ascends but never above `root`, `.` is skipped.
/// Returns the resolved filesystem path, or `None` when the path escapes
/// the root, re-anchors at an absolute location, or does not decode to
/// UTF-8. The empty path (`/`) resolves to `root` itself.
pub fn resolve_within(root: &Path, raw_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(raw_path).decode_utf8().ok()?;
    let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);

    let mut resolved = root.to_path_buf();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::ParentDir => {
                if !resolved.pop() || !resolved.starts_with(root) {
                    return None;
                }
            }
            Component::CurDir => {}
            // "//etc/passwd" and friends re-anchor the path; never allowed.
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    resolved.starts_with(root).then_some(resolved)
}
