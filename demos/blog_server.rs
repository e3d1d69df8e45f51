//! A small blog-style server behind the full stock filter chain.
//!
//! Static pages come from the web root, session-gated POST endpoints manage
//! an in-memory post board, and the seven policy filters run in front of
//! everything in their fixed order. Pass a TOML file to override the
//! defaults.
//!
//! ```text
//! cargo run --example blog_server
//! RUST_LOG=debug cargo run --example blog_server -- portcullis.toml
//!
//! curl -i -c jar -d '{"username":"ada","password":"s3cret"}' \
//!      -H 'Content-Type: application/json' http://127.0.0.1:8080/login
//! curl -i -b jar -d '{"title":"First","body":"hello"}' \
//!      -H 'Content-Type: application/json' http://127.0.0.1:8080/posts/create
//! curl -i -b jar -X POST http://127.0.0.1:8080/posts/list
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use portcullis::config::ServerConfig;
use portcullis::filter::{
    BodyLimitFilter, Fault, FaultFilter, Filter, HeadFilter, LoggingFilter, MediaTypeFilter,
    PathScopeFilter, Pipeline, SessionFilter,
};
use portcullis::http::{Request, Response, StatusCode, alert};
use portcullis::router::{Router, StaticFiles};
use portcullis::server::{Server, acceptor_from_pem};
use portcullis::session::{MemorySessionStore, clear_cookie, session_id, set_cookie};

const DEFAULT_INDEX: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="UTF-8">
  <title>portcullis</title>
</head>
<body>
  <h1>portcullis</h1>
  <p>Your server is up and serving files from the web root.</p>
</body>
</html>
"#;

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct NewPost {
    title: String,
    body: String,
}

#[derive(Clone, Serialize)]
struct Post {
    id: u64,
    title: String,
    body: String,
}

/// The whole "database": an in-memory list of posts.
#[derive(Default)]
struct PostBoard {
    posts: Mutex<Vec<Post>>,
}

impl PostBoard {
    fn add(&self, title: String, body: String) -> Post {
        let mut posts = self.posts.lock().expect("post board mutex poisoned");
        let post = Post {
            id: 100 + posts.len() as u64,
            title,
            body,
        };
        posts.push(post.clone());
        post
    }

    fn all(&self) -> Vec<Post> {
        self.posts.lock().expect("post board mutex poisoned").clone()
    }
}

/// Creates the web root and a default `index.html` if they are missing.
async fn ensure_web_root(web_root: &Path) -> std::io::Result<()> {
    fs::create_dir_all(web_root).await?;
    let index = web_root.join("index.html");
    if !fs::try_exists(&index).await? {
        fs::write(&index, DEFAULT_INDEX).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_file(Path::new(&path))?,
        None => ServerConfig::default(),
    };
    ensure_web_root(&config.web_root).await?;

    let store = Arc::new(MemorySessionStore::new(Duration::from_secs(
        config.session_ttl_secs,
    )));
    let board = Arc::new(PostBoard::default());
    let files = Arc::new(StaticFiles::new(&config.web_root)?);

    let fallback_files = Arc::clone(&files);
    let mut router = Router::new(move |req: Request| {
        let files = Arc::clone(&fallback_files);
        async move { files.serve(req).await }
    });

    // There is no account table in this demo; any non-empty credentials
    // work, and /register behaves exactly like /login.
    for path in ["/login", "/register"] {
        let store = Arc::clone(&store);
        router.post(path, move |req: Request| {
            let store = Arc::clone(&store);
            async move {
                let creds: Credentials = match req.json() {
                    Ok(c) => c,
                    Err(_) => {
                        return Ok(alert::bad_request(
                            "Sign-in expects a JSON body with username and password.",
                            "/login.html",
                        ));
                    }
                };
                if creds.username.trim().is_empty() || creds.password.is_empty() {
                    return Ok(alert::unauthorized(
                        "Both a username and a password are required.",
                        "/login.html",
                    ));
                }
                let session = store.create(creds.username.trim());
                info!(user = %session.user(), "signed in");
                Ok(Response::redirect(StatusCode::SeeOther, "/")
                    .header("Set-Cookie", set_cookie(session.id())))
            }
        });
    }

    let logout_store = Arc::clone(&store);
    router.post("/logout", move |req: Request| {
        let store = Arc::clone(&logout_store);
        async move {
            if let Some(id) = session_id(req.headers()) {
                store.remove(&id);
            }
            Ok(Response::redirect(StatusCode::SeeOther, "/login.html")
                .header("Set-Cookie", clear_cookie()))
        }
    });

    let create_board = Arc::clone(&board);
    router.post("/posts/create", move |req: Request| {
        let board = Arc::clone(&create_board);
        async move {
            let post: NewPost = match req.json() {
                Ok(p) => p,
                Err(_) => {
                    return Ok(alert::bad_request(
                        "Post creation expects a JSON body with title and body.",
                        "/",
                    ));
                }
            };
            let created = board.add(post.title, post.body);
            Response::json(StatusCode::Created, &created).map_err(|e| Fault::Other(e.to_string()))
        }
    });

    let list_board = Arc::clone(&board);
    router.post("/posts/list", move |_req: Request| {
        let board = Arc::clone(&list_board);
        async move {
            Response::json(StatusCode::Ok, &board.all()).map_err(|e| Fault::Other(e.to_string()))
        }
    });

    router.post("/posts/delete", |_req: Request| async {
        Err(Fault::NotImplemented("post deletion".to_owned()))
    });

    // Anything POSTed to an unregistered path is echoed back.
    router.post_fallback(|req: Request| async move {
        let body = String::from_utf8_lossy(req.body()).into_owned();
        Ok(Response::text(StatusCode::Ok, body))
    });

    let fc = &config.filters;
    let filters: Vec<Arc<dyn Filter>> = vec![
        Arc::new(LoggingFilter),
        Arc::new(FaultFilter::new(fc.home.clone())),
        Arc::new(SessionFilter::new(
            Arc::<MemorySessionStore>::clone(&store),
            fc.public_get_paths.iter().cloned(),
            fc.public_post_paths.iter().cloned(),
            fc.login_page.clone(),
        )),
        Arc::new(BodyLimitFilter::new(config.max_body_size, fc.home.clone())),
        Arc::new(MediaTypeFilter::new(
            fc.home.clone(),
            fc.allowed_media_types.iter().cloned(),
        )),
        Arc::new(PathScopeFilter::new(&config.web_root, fc.home.clone())?),
        Arc::new(HeadFilter),
    ];
    let pipeline = Pipeline::new(filters, Arc::new(router));

    let mut server = Server::bind(&config.bind_addr)
        .await?
        .max_body_size(config.max_body_size)
        .home(fc.home.clone());
    if let Some(tls) = &config.tls {
        server = server.with_tls(acceptor_from_pem(&tls.cert_path, &tls.key_path)?);
    }

    let handle = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            handle.shutdown();
        }
    });

    server.run(pipeline).await?;
    Ok(())
}
