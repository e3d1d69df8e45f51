//! Async TCP/TLS connection acceptor.
//!
//! Accepts connections, optionally completes a TLS handshake, and serves
//! exactly one HTTP/1.1 exchange per connection before closing it. There is
//! deliberately no keep-alive: a connection carries one request and one
//! response, which keeps the per-connection worker a straight line with no
//! buffer carry-over between requests.

pub mod tls;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::filter::{Fault, Pipeline, fault_response};
use crate::http::alert;
use crate::http::{ParseError, Request, Response};

pub use tls::{TlsError, acceptor_from_pem};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a request head (request line + headers) we will buffer.
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Default body allowance used to size the connection buffer cap (1 MiB).
const DEFAULT_MAX_BODY_SIZE: u64 = 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The portcullis HTTP server.
///
/// Binds to a TCP address and feeds each accepted connection's single
/// request through a [`Pipeline`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use portcullis::filter::Pipeline;
/// use portcullis::http::{Request, Response, StatusCode};
/// use portcullis::router::Router;
/// use portcullis::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let router = Router::new(|_req: Request| async {
///         Ok(Response::text(StatusCode::Ok, "Hello!"))
///     });
///     let pipeline = Pipeline::new(Vec::new(), Arc::new(router));
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(pipeline).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    tls: Option<TlsAcceptor>,
    home: String,
    max_buffer: usize,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Cloneable stop signal for a running [`Server`].
///
/// Calling [`shutdown`](ShutdownHandle::shutdown) more than once is
/// harmless; the first call wins and the rest are no-ops.
#[derive(Clone)]
pub struct ShutdownHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Asks the accept loop to stop and release the listening socket.
    ///
    /// Connections already being served run to completion. The signal is
    /// latched, so firing it before the server runs still stops it.
    pub fn shutdown(&self) {
        self.signal.send_replace(true);
    }
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            listener,
            local_addr,
            tls: None,
            home: "/".to_owned(),
            max_buffer: MAX_HEAD_SIZE + DEFAULT_MAX_BODY_SIZE as usize,
            shutdown: Arc::new(shutdown),
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wraps every accepted connection in a TLS handshake.
    ///
    /// Build the acceptor with [`acceptor_from_pem`]. A connection whose
    /// handshake fails is dropped; the accept loop is unaffected.
    pub fn with_tls(mut self, acceptor: TlsAcceptor) -> Self {
        self.tls = Some(acceptor);
        self
    }

    /// Sets the body allowance used to cap per-connection buffering.
    ///
    /// A connection that keeps sending past the cap (head allowance plus
    /// `bytes`) is answered with a 413 alert and closed before the rest of
    /// its body is read. Align this with the body-limit filter's maximum so
    /// both layers agree on what "too large" means.
    pub fn max_body_size(mut self, bytes: u64) -> Self {
        let body = usize::try_from(bytes).unwrap_or(usize::MAX);
        self.max_buffer = MAX_HEAD_SIZE.saturating_add(body);
        self
    }

    /// Sets the link target alert pages produced at the transport layer
    /// point back to. Defaults to `/`.
    pub fn home(mut self, link: impl Into<String>) -> Self {
        self.home = link.into();
        self
    }

    /// Returns a handle that can stop the accept loop from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            signal: Arc::clone(&self.shutdown),
        }
    }

    /// Starts accepting connections and serving requests through `pipeline`.
    ///
    /// Each connection gets its own Tokio task; the pipeline is shared
    /// across tasks via [`Arc`]. Runs until the shutdown handle fires or an
    /// unrecoverable listener error occurs, then drops the listener so the
    /// port is released.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the TCP listener itself fails.
    pub async fn run(self, pipeline: Pipeline) -> Result<(), ServerError> {
        let pipeline = Arc::new(pipeline);
        let home: Arc<str> = Arc::from(self.home.as_str());
        let mut shutdown = self.shutdown.subscribe();
        let scheme = if self.tls.is_some() { "https" } else { "http" };
        info!(address = %self.local_addr, scheme, "portcullis listening");

        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = shutdown.wait_for(|stop| *stop) => {
                    info!(address = %self.local_addr, "shutdown requested, closing listener");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            debug!(peer = %peer_addr, "connection accepted");
            let pipeline = Arc::clone(&pipeline);
            let home = Arc::clone(&home);
            let tls = self.tls.clone();
            let max_buffer = self.max_buffer;

            tokio::spawn(async move {
                let served = match tls {
                    Some(acceptor) => match acceptor.accept(stream).await {
                        Ok(stream) => {
                            serve_connection(stream, peer_addr, pipeline, &home, max_buffer).await
                        }
                        Err(e) => {
                            warn!(peer = %peer_addr, error = %e, "TLS handshake failed");
                            Ok(())
                        }
                    },
                    None => serve_connection(stream, peer_addr, pipeline, &home, max_buffer).await,
                };
                if let Err(e) = served {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }

        Ok(())
    }
}

/// Serves one connection: read a single request, run the pipeline, write
/// the response, close.
async fn serve_connection<S>(
    mut stream: S,
    peer_addr: SocketAddr,
    pipeline: Arc<Pipeline>,
    home: &str,
    max_buffer: usize,
) -> Result<(), std::io::Error>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    let request = loop {
        let bytes_read = stream.read_buf(&mut buf).await?;

        if bytes_read == 0 {
            if buf.is_empty() {
                debug!(peer = %peer_addr, "connection closed by peer");
                return Ok(());
            }
            // The peer hung up mid-request; the buffered prefix will never
            // become a complete message.
            warn!(peer = %peer_addr, "peer closed mid-request, sending 400");
            let response = fault_response(&Fault::Parse(ParseError::Incomplete), home);
            return send(&mut stream, &response).await;
        }

        // Guard against a peer streaming more than we will buffer.
        if buf.len() > max_buffer {
            warn!(peer = %peer_addr, buffered = buf.len(), "request too large, sending 413");
            let response = alert::payload_too_large("The request body is too large.", home);
            return send(&mut stream, &response).await;
        }

        match Request::parse(&buf) {
            Ok((request, consumed)) => {
                if buf.len() > consumed {
                    debug!(
                        peer = %peer_addr,
                        excess = buf.len() - consumed,
                        "ignoring bytes past the first request"
                    );
                }
                break request;
            }
            Err(ParseError::Incomplete) => {
                if buf.len() > MAX_HEAD_SIZE && !head_complete(&buf) {
                    warn!(peer = %peer_addr, limit = MAX_HEAD_SIZE, "request head too large, sending 400");
                    let fault = Fault::Parse(ParseError::HeadTooLarge {
                        limit: MAX_HEAD_SIZE,
                    });
                    return send(&mut stream, &fault_response(&fault, home)).await;
                }
                continue;
            }
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request, sending 400");
                let response = fault_response(&Fault::Parse(e), home);
                return send(&mut stream, &response).await;
            }
        }
    };

    debug!(
        peer = %peer_addr,
        method = %request.method(),
        path = %request.path(),
        "dispatching request"
    );

    let response = match pipeline.handle(request).await {
        Ok(response) => response,
        // Reached only when the pipeline was assembled without a
        // fault-mapping filter.
        Err(fault) => fault_response(&fault, home),
    };
    send(&mut stream, &response).await
}

/// Writes a response and closes the write side of the connection.
async fn send<S>(stream: &mut S, response: &Response) -> Result<(), std::io::Error>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&response.encode()).await?;
    stream.flush().await?;
    stream.shutdown().await
}

fn head_complete(buf: &[u8]) -> bool {
    buf.windows(4).any(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpStream;

    use crate::filter::{FaultFilter, Filter};
    use crate::http::StatusCode;
    use crate::router::Router;

    fn pipeline() -> Pipeline {
        let filters: Vec<Arc<dyn Filter>> = vec![Arc::new(FaultFilter::new("/"))];
        let router = Router::new(|req: Request| async move {
            let body = format!("{} {}", req.method(), req.path());
            Ok(Response::text(StatusCode::Ok, body))
        });
        Pipeline::new(filters, Arc::new(router))
    }

    async fn roundtrip(addr: SocketAddr, raw: &[u8]) -> String {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        conn.write_all(raw).await.unwrap();
        let mut reply = Vec::new();
        conn.read_to_end(&mut reply).await.unwrap();
        String::from_utf8(reply).unwrap()
    }

    // ── one-shot connection behavior ──

    #[tokio::test]
    async fn serves_one_request_then_closes() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run(pipeline()));

        let reply = roundtrip(addr, b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 200 OK\r\n"));
        // read_to_end returning means the server closed the connection.
        assert!(reply.ends_with("GET /hello"));

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn malformed_request_line_gets_a_400_alert() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run(pipeline()));

        let reply = roundtrip(addr, b"NOT A REQUEST\r\n\r\n").await;
        assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(reply.contains("text/html"));

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn truncated_request_gets_a_400_when_peer_hangs_up() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run(pipeline()));

        let mut conn = TcpStream::connect(addr).await.unwrap();
        conn.write_all(b"GET /partial HTTP/1.1\r\nHost:").await.unwrap();
        conn.shutdown().await.unwrap();
        let mut reply = Vec::new();
        conn.read_to_end(&mut reply).await.unwrap();
        let reply = String::from_utf8(reply).unwrap();
        assert!(reply.starts_with("HTTP/1.1 400 Bad Request\r\n"));

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn overlong_body_gets_a_413_before_it_finishes_uploading() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.max_body_size(16).run(pipeline()));

        // One byte past the buffer cap, with far more still declared: the
        // server must refuse without waiting for the rest of the body.
        let head = "POST /upload HTTP/1.1\r\nHost: x\r\nContent-Length: 999999\r\n\r\n";
        let total = MAX_HEAD_SIZE + 16 + 1;
        let raw = format!("{head}{}", "y".repeat(total - head.len()));
        let reply = roundtrip(addr, raw.as_bytes()).await;
        assert!(reply.starts_with("HTTP/1.1 413 Payload Too Large\r\n"));

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    // ── shutdown ──

    #[tokio::test]
    async fn shutdown_releases_the_port() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run(pipeline()));

        handle.shutdown();
        // Idempotent: a second shutdown is a no-op.
        handle.shutdown();
        task.await.unwrap().unwrap();

        // The port is free again once run() has returned.
        let rebound = Server::bind(addr.to_string()).await;
        assert!(rebound.is_ok());
    }

    #[tokio::test]
    async fn shutdown_before_run_stops_immediately() {
        let server = Server::bind("127.0.0.1:0").await.unwrap();
        let handle = server.shutdown_handle();
        handle.shutdown();
        server.run(pipeline()).await.unwrap();
    }

    // ── helpers under test ──

    #[test]
    fn head_complete_finds_the_blank_line() {
        assert!(head_complete(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n"));
        assert!(!head_complete(b"GET / HTTP/1.1\r\nHost: x\r\n"));
    }
}
