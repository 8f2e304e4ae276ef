//! Registry of external SPARQL endpoints.
//!
//! Registered endpoints are persisted in their own named graph and can be
//! toggled without being forgotten. Disabled endpoints are skipped by
//! federation.

use serde::Serialize;
use tracing::debug;
use triplify_common::Result;
use uuid::Uuid;

use crate::builder::{bool_literal, string_literal, QueryBuilder};
use crate::client::{Row, SparqlClient};

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredEndpoint {
    pub id: String,
    pub name: String,
    pub url: String,
    pub auth: String,
    pub enabled: bool,
}

pub struct EndpointRegistry<'a> {
    client: &'a SparqlClient,
    builder: &'a QueryBuilder,
    graph: String,
    namespace: String,
}

impl<'a> EndpointRegistry<'a> {
    pub fn new(client: &'a SparqlClient, builder: &'a QueryBuilder, internal_namespace: &str) -> Self {
        let mut namespace = internal_namespace.to_string();
        if !namespace.ends_with('/') && !namespace.ends_with('#') {
            namespace.push('/');
        }
        Self {
            client,
            builder,
            graph: format!("{}graph/endpoints", namespace),
            namespace,
        }
    }

    fn endpoint_uri(&self, id: &str) -> String {
        format!("{}endpoint/{}", self.namespace, id)
    }

    /// Register an endpoint; returns its id.
    pub async fn save(&self, name: &str, url: &str, auth: &str, enabled: bool) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let ttl = format!(
            "<{uri}> rdf:type triplify:Endpoint ;\n\
             \trdfs:label {name} ;\n\
             \ttriplify:url {url} ;\n\
             \ttriplify:auth {auth} ;\n\
             \ttriplify:enabled {enabled} .",
            uri = self.endpoint_uri(&id),
            name = string_literal(name),
            url = string_literal(url),
            auth = string_literal(auth),
            enabled = bool_literal(enabled),
        );
        let header = self.builder.prefixes().sparql_header(&ttl);
        self.client.insert_data(&ttl, &self.graph, &header).await?;
        debug!(%id, url, "endpoint registered");
        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<RegisteredEndpoint>> {
        let query = self.builder.add_prefix_headers(&format!(
            "SELECT ?e ?name ?url ?auth ?enabled\n\
             WHERE {{\n\
             \tGRAPH <{g}> {{\n\
             \t\t?e rdf:type triplify:Endpoint ;\n\
             \t\t   rdfs:label ?name ;\n\
             \t\t   triplify:url ?url ;\n\
             \t\t   triplify:auth ?auth ;\n\
             \t\t   triplify:enabled ?enabled .\n\
             \t}}\n\
             }}\nORDER BY ?name",
            g = self.graph,
        ));
        let rows = self.client.select(&query).await?;
        Ok(rows.into_iter().map(endpoint_from_row).collect())
    }

    /// Enabled endpoints only, for federation.
    pub async fn enabled(&self) -> Result<Vec<RegisteredEndpoint>> {
        Ok(self.list().await?.into_iter().filter(|e| e.enabled).collect())
    }

    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let update = self.builder.add_prefix_headers(&format!(
            "DELETE WHERE {{ GRAPH <{g}> {{ <{uri}> triplify:enabled ?v }} }}",
            g = self.graph,
            uri = self.endpoint_uri(id),
        ));
        self.client.update(&update).await?;
        let ttl = format!(
            "<{uri}> triplify:enabled {} .",
            bool_literal(enabled),
            uri = self.endpoint_uri(id),
        );
        let header = self.builder.prefixes().sparql_header(&ttl);
        self.client.insert_data(&ttl, &self.graph, &header).await
    }

    pub async fn remove(&self, id: &str) -> Result<()> {
        let update = self.builder.add_prefix_headers(&format!(
            "DELETE WHERE {{ GRAPH <{g}> {{ <{uri}> ?p ?o }} }}",
            g = self.graph,
            uri = self.endpoint_uri(id),
        ));
        self.client.update(&update).await
    }
}

fn endpoint_from_row(mut row: Row) -> RegisteredEndpoint {
    let id = row
        .remove("e")
        .map(|uri| uri.rsplit('/').next().unwrap_or(&uri).to_string())
        .unwrap_or_default();
    RegisteredEndpoint {
        id,
        name: row.remove("name").unwrap_or_default(),
        url: row.remove("url").unwrap_or_default(),
        auth: row.remove("auth").unwrap_or_else(|| "none".to_string()),
        enabled: row
            .remove("enabled")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_rows_round_trip() {
        let mut row = Row::new();
        row.insert("e".to_string(), "http://example.org/internal/endpoint/7".to_string());
        row.insert("name".to_string(), "uniprot".to_string());
        row.insert("url".to_string(), "https://sparql.uniprot.org/sparql".to_string());
        row.insert("auth".to_string(), "none".to_string());
        row.insert("enabled".to_string(), "true".to_string());
        let endpoint = endpoint_from_row(row);
        assert_eq!(endpoint.id, "7");
        assert!(endpoint.enabled);
        assert_eq!(endpoint.url, "https://sparql.uniprot.org/sparql");
    }
}
