//! Server configuration, loadable from a TOML file.
//!
//! Every field has a default, so an empty file (or no file at all,
//! [`ServerConfig::default`]) yields a server that listens on localhost,
//! serves `www/`, and protects everything except the login and register
//! pages.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Errors from reading or parsing a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level server configuration.
///
/// ```toml
/// bind_addr = "0.0.0.0:8080"
/// web_root = "www"
/// max_body_size = 1048576
/// session_ttl_secs = 1800
///
/// [tls]
/// cert_path = "certs/server.pem"
/// key_path = "certs/server.key"
///
/// [filters]
/// home = "/"
/// login_page = "/login.html"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the listener binds, `host:port`.
    pub bind_addr: String,
    /// Directory static files are served from.
    pub web_root: PathBuf,
    /// Largest declared request body accepted, in bytes.
    pub max_body_size: u64,
    /// Session lifetime in seconds.
    pub session_ttl_secs: u64,
    /// TLS material; plain TCP when absent.
    pub tls: Option<TlsConfig>,
    /// Filter chain tuning.
    pub filters: FilterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_owned(),
            web_root: PathBuf::from("www"),
            max_body_size: 1024 * 1024,
            session_ttl_secs: 1800,
            tls: None,
            filters: FilterConfig::default(),
        }
    }
}

/// Certificate and key locations, both PEM.
#[derive(Debug, Clone, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Knobs for the stock filter chain.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Where alert pages link back to.
    pub home: String,
    /// Where `401` alerts send the visitor.
    pub login_page: String,
    /// Paths servable by `GET`/`HEAD` without a session.
    pub public_get_paths: Vec<String>,
    /// Paths accepting `POST` without a session.
    pub public_post_paths: Vec<String>,
    /// Media types accepted on body-bearing requests.
    pub allowed_media_types: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            home: "/".to_owned(),
            login_page: "/login.html".to_owned(),
            public_get_paths: vec![
                "/login".to_owned(),
                "/login.html".to_owned(),
                "/register".to_owned(),
                "/register.html".to_owned(),
            ],
            public_post_paths: vec!["/login".to_owned(), "/register".to_owned()],
            allowed_media_types: vec![
                "application/json".to_owned(),
                "application/x-www-form-urlencoded".to_owned(),
                "multipart/form-data".to_owned(),
            ],
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or does not
    /// parse as the expected shape.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}
