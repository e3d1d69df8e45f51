//! # portcullis
//!
//! A from-scratch async HTTP/1.1 server with an ordered, short-circuiting
//! request-filter pipeline.
//!
//! Every request accepted by the [`server`] travels the same road: the
//! [`http`] codec frames it, the [`filter`] pipeline applies policy in a
//! fixed order (logging, fault mapping, sessions, body limits, media types,
//! path containment, HEAD handling), and whatever survives reaches a
//! terminal dispatcher, usually the [`router`], which pairs POST handlers
//! with a static-file fallback for GET and HEAD. Any filter may short-circuit
//! with its own response; any fault funnels through one mapping into a
//! uniform HTML alert page.
//!
//! Connections are one-shot: one request, one response, close. There is no
//! keep-alive and no chunked transfer; both are refused explicitly rather
//! than half-supported.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use portcullis::filter::{FaultFilter, Filter, LoggingFilter, Pipeline};
//! use portcullis::http::{Request, Response, StatusCode};
//! use portcullis::router::Router;
//! use portcullis::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = Router::new(|_req: Request| async {
//!         Ok(Response::text(StatusCode::Ok, "Hello, World!"))
//!     });
//!
//!     let filters: Vec<Arc<dyn Filter>> = vec![
//!         Arc::new(LoggingFilter),
//!         Arc::new(FaultFilter::new("/")),
//!     ];
//!     let pipeline = Pipeline::new(filters, Arc::new(router));
//!
//!     let server = Server::bind("127.0.0.1:8080").await?;
//!     println!("Listening on http://{}", server.local_addr());
//!     server.run(pipeline).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod filter;
pub mod http;
pub mod router;
pub mod server;
pub mod session;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::ServerConfig;
pub use filter::{Fault, Filter, Pipeline};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError, ShutdownHandle};
