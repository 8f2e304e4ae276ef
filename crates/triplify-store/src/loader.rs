//! Chunked triple loader.
//!
//! One loader is created per integration. It owns the target named-graph
//! URI (derived from the user graph base, the source label and a
//! timestamp), batches triple lines into bounded chunks, pushes each
//! chunk to the store with the configured strategy, writes the
//! provenance metadata, and knows how to roll the whole graph back when
//! anything fails.

use std::path::{Path, PathBuf};

use chrono::Utc;
use regex::Regex;
use tracing::{debug, error, info, warn};
use triplify_common::{PrefixRegistry, Result, TriplifyError};
use triplify_config::UploadMethod;

use crate::builder::{Access, AccessLevel, QueryBuilder};
use crate::client::SparqlClient;

/// Where chunk files live and how they reach the store.
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub method: UploadMethod,
    pub chunk_size: usize,
    /// Per-user directory for generated ttl files.
    pub rdf_dir: PathBuf,
    /// Public base URL under which `rdf_dir` is served, for `LOAD <url>`.
    pub load_url: Option<String>,
    /// Store bulk upload endpoint, preferred over `load_url` when set.
    pub data_endpoint: Option<String>,
}

pub struct TripleLoader {
    client: SparqlClient,
    prefixes: PrefixRegistry,
    access: Access,
    access_level: AccessLevel,
    settings: LoaderSettings,
    source: String,
    timestamp: String,
    graph_uri: String,
}

/// Graph base under which a user's datasets are created.
pub fn user_graph_base(internal_namespace: &str, username: &str) -> String {
    let mut base = internal_namespace.to_string();
    if !base.ends_with('/') && !base.ends_with('#') {
        base.push('/');
    }
    format!("{}graph/{}", base, triplify_common::uri::encode(username))
}

impl TripleLoader {
    pub fn new(
        client: SparqlClient,
        prefixes: PrefixRegistry,
        access: Access,
        access_level: AccessLevel,
        source: &str,
        user_graph_base: &str,
        settings: LoaderSettings,
    ) -> Self {
        // Graph names stay alphanumeric; everything else collapses to _.
        let sanitizer = Regex::new("[^0-9a-zA-Z]+").expect("static regex");
        let source = sanitizer.replace_all(source, "_").into_owned();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
        let graph_uri = format!("{}/{}_{}", user_graph_base, source, timestamp);

        Self {
            client,
            prefixes,
            access,
            access_level,
            settings,
            source,
            timestamp,
            graph_uri,
        }
    }

    pub fn graph_uri(&self) -> &str {
        &self.graph_uri
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Store triple lines by chunk. Returns the number of triples sent.
    pub async fn store_ttl<I>(&self, triples: I) -> Result<u64>
    where
        I: IntoIterator<Item = String>,
    {
        let mut chunk = String::new();
        let mut in_chunk: u64 = 0;
        let mut total: u64 = 0;
        let mut chunk_count: u32 = 1;

        for triple in triples {
            chunk.push_str(&triple);
            chunk.push('\n');
            in_chunk += 1;

            if in_chunk >= self.settings.chunk_size as u64 {
                debug!(chunk_count, "flushing ttl chunk");
                self.store_chunk(&chunk, chunk_count).await?;
                total += in_chunk;
                chunk.clear();
                in_chunk = 0;
                chunk_count += 1;
            }
        }

        if in_chunk > 0 {
            self.store_chunk(&chunk, chunk_count).await?;
            total += in_chunk;
        }

        info!(total, graph = %self.graph_uri, "triples stored");
        Ok(total)
    }

    async fn store_chunk(&self, chunk: &str, chunk_count: u32) -> Result<()> {
        match self.settings.method {
            UploadMethod::Insert => {
                let header = self.prefixes.sparql_header(chunk);
                self.client.insert_data(chunk, &self.graph_uri, &header).await
            }
            UploadMethod::Load => {
                let header = self.prefixes.turtle_header(chunk);
                let file = tempfile::Builder::new()
                    .prefix(&format!("tmp_{}_", self.source))
                    .suffix(".ttl")
                    .tempfile_in(&self.settings.rdf_dir)?;
                std::fs::write(file.path(), format!("{}\n{}", header, chunk))?;
                debug!(chunk_count, path = %file.path().display(), "loading ttl chunk file");
                // The temp file is removed when `file` drops, success or not.
                self.send_file(file.path()).await
            }
        }
    }

    /// Ship a complete on-disk ttl file to the store. The file must
    /// carry its own prefixes.
    pub async fn store_ttl_file(&self, path: &Path) -> Result<()> {
        match self.settings.method {
            UploadMethod::Load => self.send_file(path).await,
            UploadMethod::Insert => {
                let content = tokio::fs::read_to_string(path).await?;
                let (header, body) = split_turtle_prefixes(&content);
                self.client.insert_data(&body, &self.graph_uri, &header).await
            }
        }
    }

    async fn send_file(&self, path: &Path) -> Result<()> {
        if let Some(endpoint) = &self.settings.data_endpoint {
            return self.client.upload_file(endpoint, path, &self.graph_uri).await;
        }
        if let Some(base) = &self.settings.load_url {
            let name = path
                .file_name()
                .ok_or_else(|| TriplifyError::Convert("chunk file has no name".to_string()))?
                .to_string_lossy();
            let url = format!(
                "{}/ttl/{}/{}",
                base.trim_end_matches('/'),
                self.access.username,
                name
            );
            return self.client.load(&url, &self.graph_uri).await;
        }
        Err(TriplifyError::Config(
            "load upload method needs a data_endpoint or a load_url".to_string(),
        ))
    }

    /// `LOAD` a remote document straight into the graph.
    pub async fn load_from_url(&self, url: &str) -> Result<()> {
        self.client.load(url, &self.graph_uri).await
    }

    /// Write the provenance card of the new graph.
    pub async fn insert_metadata(&self, origin: &str) -> Result<()> {
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let ttl = format!(
            "<{graph}> prov:generatedAtTime \"{ts}\"^^xsd:dateTime ;\n\
             \tdc:creator {creator} ;\n\
             \ttriplify:accessLevel \"{access}\" ;\n\
             \tfoaf:Group {group} ;\n\
             \tprov:wasDerivedFrom {origin} ;\n\
             \tdc:hasVersion \"{version}\" ;\n\
             \tprov:describesService {service} ;\n\
             \tprov:atLocation {location} .",
            graph = self.graph_uri,
            ts = self.timestamp,
            creator = crate::builder::string_literal(&self.access.username),
            access = self.access_level.as_str(),
            group = crate::builder::string_literal(&self.access.group),
            origin = crate::builder::string_literal(origin),
            version = env!("CARGO_PKG_VERSION"),
            service = crate::builder::string_literal(&self.client.endpoint().query_url),
            location = crate::builder::string_literal(&hostname),
        );
        let header = self.prefixes.sparql_header(&ttl);
        debug!(graph = %self.graph_uri, "inserting provenance metadata");
        self.client.insert_data(&ttl, &self.graph_uri, &header).await
    }

    /// Best-effort cleanup after a failed integration: drop the graph and
    /// its metadata. Errors are logged, not propagated — the original
    /// failure is the one worth reporting.
    pub async fn rollback(&self) {
        warn!(graph = %self.graph_uri, "rolling back failed integration");
        let builder = QueryBuilder::new(self.prefixes.clone(), self.access.clone());
        if let Err(e) = self.client.update(&builder.drop_named_graph(&self.graph_uri)).await {
            error!(error = %e, "rollback: dropping graph failed");
        }
        if let Err(e) = self
            .client
            .update(&builder.delete_graph_metadata(&self.graph_uri))
            .await
        {
            error!(error = %e, "rollback: deleting metadata failed");
        }
    }
}

/// Split a Turtle document into a SPARQL PREFIX header and the body, so a
/// whole file can travel inside `INSERT DATA`.
pub fn split_turtle_prefixes(content: &str) -> (String, String) {
    let mut header = Vec::new();
    let mut body = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("@prefix") {
            let rest = rest.trim().trim_end_matches('.').trim_end();
            header.push(format!("PREFIX {}", rest));
        } else if let Some(rest) = trimmed.strip_prefix("@base") {
            let rest = rest.trim().trim_end_matches('.').trim_end();
            header.push(format!("BASE {}", rest));
        } else {
            body.push(line);
        }
    }
    (header.join("\n"), body.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_base_normalizes_namespace_separator() {
        assert_eq!(
            user_graph_base("http://example.org/internal", "alice"),
            "http://example.org/internal/graph/alice"
        );
        assert_eq!(
            user_graph_base("http://example.org/internal/", "alice"),
            "http://example.org/internal/graph/alice"
        );
    }

    #[test]
    fn graph_uri_sanitizes_the_source_label() {
        let client = SparqlClient::new(
            crate::client::StoreEndpoint::public("http://localhost:3030/ds"),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let prefixes =
            PrefixRegistry::new("http://example.org/data/", "http://example.org/internal/");
        let loader = TripleLoader::new(
            client,
            prefixes,
            Access::user("alice"),
            AccessLevel::Private,
            "my file (v2).tsv",
            "http://example.org/internal/graph/alice",
            LoaderSettings {
                method: UploadMethod::Insert,
                chunk_size: 10,
                rdf_dir: std::env::temp_dir(),
                load_url: None,
                data_endpoint: None,
            },
        );
        assert!(loader
            .graph_uri()
            .starts_with("http://example.org/internal/graph/alice/my_file_v2_tsv_"));
    }

    #[test]
    fn split_turtle_prefixes_moves_directives_to_the_header() {
        let ttl = "@prefix ex: <http://example.org/> .\nex:a ex:b ex:c .\n";
        let (header, body) = split_turtle_prefixes(ttl);
        assert_eq!(header, "PREFIX ex: <http://example.org/>");
        assert_eq!(body.trim(), "ex:a ex:b ex:c .");
    }
}
