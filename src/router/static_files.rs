//! Static file serving out of a web root.

use std::io;
use std::path::{Path, PathBuf};

use crate::filter::{resolve_within, Fault};
use crate::http::{alert, Headers, Request, Response, StatusCode};

/// Serves files from under a single web root directory.
///
/// Paths resolve the same way the path-scope filter resolves them, so a
/// request that slipped past the filter (or never went through one) still
/// cannot read outside the root; it gets the same `403`. Directory paths
/// serve their `index.html`. A missing file is a `404` alert page; any
/// other read failure is raised as an I/O fault for the mapper.
///
/// The `Content-Type` comes from the file extension, falling back to
/// `application/octet-stream`.
pub struct StaticFiles {
    web_root: PathBuf,
}

impl StaticFiles {
    /// # Errors
    ///
    /// Fails when `web_root` cannot be absolutized.
    pub fn new(web_root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            web_root: std::path::absolute(web_root)?,
        })
    }

    /// Resolves and reads the file for `req`, building the whole response.
    pub async fn serve(&self, req: Request) -> Result<Response, Fault> {
        let Some(mut target) = resolve_within(&self.web_root, req.path()) else {
            return Ok(alert::forbidden("The requested path is not allowed.", "/"));
        };

        let is_dir = tokio::fs::metadata(&target)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false);
        if is_dir {
            target.push("index.html");
        }

        match tokio::fs::read(&target).await {
            Ok(data) => {
                let mime_type = mime_guess::from_path(&target).first_or_octet_stream();
                let mut headers = Headers::new();
                headers.insert("Content-Type", mime_type.as_ref());
                headers.insert("Content-Length", data.len().to_string());
                Ok(Response::from_parts(StatusCode::Ok, headers, data))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Ok(alert::not_found("There is no page at that address.", "/"))
            }
            Err(err) => Err(Fault::Io(err)),
        }
    }
}
