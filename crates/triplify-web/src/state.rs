//! Shared application state injected into every handler.

use std::sync::Arc;

use axum_extra::extract::cookie::CookieJar;
use tokio::sync::RwLock;
use triplify_auth::{Session, SessionStore};
use triplify_common::{PrefixRegistry, Result};
use triplify_config::Config;
use triplify_convert::UserDirs;
use triplify_store::loader::{user_graph_base, LoaderSettings};
use triplify_store::{AccessLevel, QueryBuilder, SparqlClient, TripleLoader};

pub const SESSION_COOKIE: &str = "triplify_session";

pub struct AppState {
    pub config: Config,
    pub client: SparqlClient,
    pub sessions: SessionStore,
    /// Mutated when user text teaches us new namespaces via prefix.cc.
    pub prefixes: RwLock<PrefixRegistry>,
    /// Plain HTTP client for non-SPARQL calls (prefix.cc).
    pub http: reqwest::Client,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let client = SparqlClient::for_config(&config.triplestore)?;
        let prefixes =
            PrefixRegistry::new(&config.namespaces.data, &config.namespaces.internal);
        Ok(Self {
            config,
            client,
            sessions: SessionStore::new(),
            prefixes: RwLock::new(prefixes),
            http: reqwest::Client::new(),
        })
    }

    /// Session of the request, anonymous when the cookie is absent or
    /// stale.
    pub async fn session(&self, jar: &CookieJar) -> Session {
        match jar.get(SESSION_COOKIE) {
            Some(cookie) => self
                .sessions
                .get(cookie.value())
                .await
                .unwrap_or_else(Session::anonymous),
            None => Session::anonymous(),
        }
    }

    /// Query builder over a snapshot of the current prefix table.
    pub async fn query_builder(&self, session: &Session) -> QueryBuilder {
        let prefixes = self.prefixes.read().await.clone();
        QueryBuilder::new(prefixes, session.access())
    }

    pub fn internal_namespace(&self) -> &str {
        &self.config.namespaces.internal
    }

    pub fn user_dirs(&self, session: &Session) -> UserDirs {
        UserDirs::new(&self.config.storage.files_dir, &session.username)
    }

    /// A loader targeting a fresh named graph for this user and source.
    pub async fn loader(
        &self,
        session: &Session,
        access_level: AccessLevel,
        source: &str,
    ) -> Result<TripleLoader> {
        let dirs = self.user_dirs(session);
        let settings = LoaderSettings {
            method: self.config.integration.upload_method,
            chunk_size: self.config.integration.chunk_size,
            rdf_dir: dirs.rdf()?,
            load_url: self.config.integration.load_url.clone(),
            data_endpoint: self.config.triplestore.data_endpoint.clone(),
        };
        let prefixes = self.prefixes.read().await.clone();
        let base = user_graph_base(self.internal_namespace(), &session.username);
        Ok(TripleLoader::new(
            self.client.clone(),
            prefixes,
            session.access(),
            access_level,
            source,
            &base,
            settings,
        ))
    }
}
