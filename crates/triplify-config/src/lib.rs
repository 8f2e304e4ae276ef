//! Configuration loading for Triplify.
//! Reads triplify.toml from the current directory or the path in the
//! TRIPLIFY_CONFIG env var.

use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use tracing::info;
use triplify_common::{Result, TriplifyError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub triplestore: TriplestoreConfig,
    pub namespaces: NamespaceConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub integration: IntegrationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 6543 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriplestoreConfig {
    /// SPARQL 1.1 query endpoint.
    pub query_endpoint: String,
    /// SPARQL 1.1 update endpoint. Falls back to the query endpoint.
    pub update_endpoint: Option<String>,
    /// Store-specific bulk file upload endpoint (Fuseki `/data` style).
    pub data_endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 60 }

impl TriplestoreConfig {
    pub fn update_endpoint(&self) -> &str {
        self.update_endpoint.as_deref().unwrap_or(&self.query_endpoint)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceConfig {
    /// Namespace of integrated data (the empty prefix).
    pub data: String,
    /// Namespace of the Triplify vocabulary (entity/attribute flags,
    /// provenance, users).
    pub internal: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root of per-user upload/rdf/result directories.
    pub files_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationConfig {
    /// Maximum number of triples per bulk-load chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub upload_method: UploadMethod,
    /// Public base URL under which generated ttl files are reachable by
    /// the store when loading with `LOAD <url>`.
    pub load_url: Option<String>,
}

fn default_chunk_size() -> usize { 10_000 }

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            upload_method: UploadMethod::default(),
            load_url: None,
        }
    }
}

/// How chunks reach the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadMethod {
    /// Write a temp ttl file and let the store fetch or receive it.
    #[default]
    Load,
    /// Inline `INSERT DATA` updates.
    Insert,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_password_min_length")]
    pub password_min_length: usize,
    /// Grant admin to the first account created on an empty store.
    #[serde(default = "default_first_user_admin")]
    pub first_user_admin: bool,
}

fn default_password_min_length() -> usize { 8 }
fn default_first_user_admin() -> bool { true }

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            password_min_length: default_password_min_length(),
            first_user_admin: default_first_user_admin(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = std::env::var("TRIPLIFY_CONFIG").unwrap_or_else(|_| "triplify.toml".to_string());
        Self::from_path(&path)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            TriplifyError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&raw)?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| TriplifyError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [triplestore]
        query_endpoint = "http://localhost:3030/ds/query"

        [namespaces]
        data = "http://example.org/data/"
        internal = "http://example.org/internal/"

        [storage]
        files_dir = "/tmp/triplify"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.server.port, default_port());
        assert_eq!(config.integration.chunk_size, default_chunk_size());
        assert_eq!(config.integration.upload_method, UploadMethod::Load);
        assert_eq!(config.auth.password_min_length, 8);
    }

    #[test]
    fn update_endpoint_falls_back_to_query_endpoint() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(
            config.triplestore.update_endpoint(),
            "http://localhost:3030/ds/query"
        );
    }

    #[test]
    fn upload_method_is_parsed() {
        let raw = format!("{MINIMAL}\n[integration]\nupload_method = \"insert\"");
        let config = Config::from_toml(&raw).unwrap();
        assert_eq!(config.integration.upload_method, UploadMethod::Insert);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::from_path("/nonexistent/triplify.toml").unwrap_err();
        assert!(matches!(err, TriplifyError::Config(_)));
    }
}
