//! Minimal wiring: two filters, one router, one handler.
//!
//! ```text
//! cargo run --example hello
//! curl -i http://127.0.0.1:8080/
//! curl -i -d 'ping' -H 'Content-Type: application/x-www-form-urlencoded' http://127.0.0.1:8080/echo
//! ```

use std::sync::Arc;

use portcullis::filter::{FaultFilter, Filter, LoggingFilter, Pipeline};
use portcullis::http::{Request, Response, StatusCode};
use portcullis::router::Router;
use portcullis::server::Server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut router = Router::new(|_req: Request| async {
        Ok(Response::text(StatusCode::Ok, "Hello, World!\n"))
    });
    router.post("/echo", |req: Request| async move {
        let body = String::from_utf8_lossy(req.body()).into_owned();
        Ok(Response::text(StatusCode::Ok, body))
    });

    let filters: Vec<Arc<dyn Filter>> =
        vec![Arc::new(LoggingFilter), Arc::new(FaultFilter::new("/"))];
    let pipeline = Pipeline::new(filters, Arc::new(router));

    let server = Server::bind("127.0.0.1:8080").await?;
    println!("Listening on http://{}", server.local_addr());
    server.run(pipeline).await?;
    Ok(())
}
