//! Integration and query job records.
//!
//! Jobs are rows in a dedicated named graph, like everything else in this
//! system: created in state `wait`, finished in state `ok` with their
//! result summary, or failed with an error message.

use chrono::Utc;
use serde::Serialize;
use tracing::debug;
use triplify_common::Result;
use uuid::Uuid;

use crate::builder::{string_literal, QueryBuilder};
use crate::client::{Row, SparqlClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Integration,
    Query,
}

impl JobKind {
    fn class(&self) -> &'static str {
        match self {
            JobKind::Integration => "triplify:IntegrationJob",
            JobKind::Query => "triplify:QueryJob",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub label: String,
    pub state: String,
    pub started: String,
    pub ended: Option<String>,
    pub row_count: Option<u64>,
    pub preview: Option<serde_json::Value>,
    pub result_file: Option<String>,
    pub error: Option<String>,
}

pub struct JobStore<'a> {
    client: &'a SparqlClient,
    builder: &'a QueryBuilder,
    jobs_graph: String,
    namespace: String,
}

impl<'a> JobStore<'a> {
    pub fn new(client: &'a SparqlClient, builder: &'a QueryBuilder, internal_namespace: &str) -> Self {
        let mut namespace = internal_namespace.to_string();
        if !namespace.ends_with('/') && !namespace.ends_with('#') {
            namespace.push('/');
        }
        Self {
            client,
            builder,
            jobs_graph: format!("{}graph/jobs", namespace),
            namespace,
        }
    }

    fn job_uri(&self, id: &str) -> String {
        format!("{}job/{}", self.namespace, id)
    }

    async fn insert(&self, ttl: &str) -> Result<()> {
        let header = self.builder.prefixes().sparql_header(ttl);
        self.client.insert_data(ttl, &self.jobs_graph, &header).await
    }

    /// Record a new job in state `wait`; returns its id.
    pub async fn create(&self, kind: JobKind, label: &str) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let ttl = format!(
            "<{uri}> rdf:type {class} ;\n\
             \tdc:creator {creator} ;\n\
             \ttriplify:state \"wait\" ;\n\
             \ttriplify:label {label} ;\n\
             \tprov:startedAtTime \"{ts}\"^^xsd:dateTime .",
            uri = self.job_uri(&id),
            class = kind.class(),
            creator = string_literal(&self.builder.access().username),
            label = string_literal(label),
            ts = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
        );
        self.insert(&ttl).await?;
        debug!(%id, ?kind, "job created");
        Ok(id)
    }

    async fn set_state(&self, id: &str, state: &str) -> Result<()> {
        let update = self.builder.add_prefix_headers(&format!(
            "DELETE WHERE {{ GRAPH <{g}> {{ <{uri}> triplify:state ?s }} }}",
            g = self.jobs_graph,
            uri = self.job_uri(id),
        ));
        self.client.update(&update).await?;
        let ttl = format!(
            "<{uri}> triplify:state {state} ;\n\
             \tprov:endedAtTime \"{ts}\"^^xsd:dateTime .",
            uri = self.job_uri(id),
            state = string_literal(state),
            ts = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f"),
        );
        self.insert(&ttl).await
    }

    /// Mark an integration job finished.
    pub async fn done(&self, id: &str) -> Result<()> {
        self.set_state(id, "ok").await
    }

    /// Mark a query job finished with its result summary.
    pub async fn done_query(
        &self,
        id: &str,
        row_count: u64,
        preview: &serde_json::Value,
        result_file: Option<&str>,
    ) -> Result<()> {
        self.set_state(id, "ok").await?;
        let mut ttl = format!(
            "<{uri}> triplify:rowCount \"{row_count}\"^^xsd:integer ;\n\
             \ttriplify:preview {} .",
            string_literal(&preview.to_string()),
            uri = self.job_uri(id),
        );
        if let Some(file) = result_file {
            ttl.push_str(&format!(
                "\n<{uri}> triplify:resultFile {} .",
                string_literal(file),
                uri = self.job_uri(id),
            ));
        }
        self.insert(&ttl).await
    }

    /// Record a failure message on a job.
    pub async fn set_error(&self, id: &str, message: &str) -> Result<()> {
        self.set_state(id, "error").await?;
        let ttl = format!(
            "<{uri}> triplify:errorMessage {} .",
            string_literal(message),
            uri = self.job_uri(id),
        );
        self.insert(&ttl).await
    }

    /// Jobs of one kind owned by the session user.
    pub async fn list(&self, kind: JobKind) -> Result<Vec<JobRecord>> {
        let query = self.builder.add_prefix_headers(&format!(
            "SELECT ?job ?label ?state ?started ?ended ?rows ?preview ?file ?error\n\
             WHERE {{\n\
             \tGRAPH <{g}> {{\n\
             \t\t?job rdf:type {class} ;\n\
             \t\t     dc:creator {creator} ;\n\
             \t\t     triplify:state ?state ;\n\
             \t\t     triplify:label ?label ;\n\
             \t\t     prov:startedAtTime ?started .\n\
             \t\tOPTIONAL {{ ?job prov:endedAtTime ?ended }}\n\
             \t\tOPTIONAL {{ ?job triplify:rowCount ?rows }}\n\
             \t\tOPTIONAL {{ ?job triplify:preview ?preview }}\n\
             \t\tOPTIONAL {{ ?job triplify:resultFile ?file }}\n\
             \t\tOPTIONAL {{ ?job triplify:errorMessage ?error }}\n\
             \t}}\n\
             }}\nORDER BY DESC(?started)",
            g = self.jobs_graph,
            class = kind.class(),
            creator = string_literal(&self.builder.access().username),
        ));
        let rows = self.client.select(&query).await?;
        Ok(rows.into_iter().map(|r| self.record_from_row(r)).collect())
    }

    fn record_from_row(&self, mut row: Row) -> JobRecord {
        let id = row
            .remove("job")
            .map(|uri| uri.rsplit('/').next().unwrap_or(&uri).to_string())
            .unwrap_or_default();
        JobRecord {
            id,
            label: row.remove("label").unwrap_or_default(),
            state: row.remove("state").unwrap_or_default(),
            started: row.remove("started").unwrap_or_default(),
            ended: row.remove("ended"),
            row_count: row.remove("rows").and_then(|v| v.parse().ok()),
            preview: row
                .remove("preview")
                .and_then(|v| serde_json::from_str(&v).ok()),
            result_file: row.remove("file"),
            error: row.remove("error"),
        }
    }

    /// Delete a job. Plain users can only delete their own.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let owner_clause = if self.builder.access().admin {
            String::new()
        } else {
            format!(
                " ?j dc:creator {} .",
                string_literal(&self.builder.access().username)
            )
        };
        let update = self.builder.add_prefix_headers(&format!(
            "DELETE {{ GRAPH <{g}> {{ ?j ?p ?o }} }}\n\
             WHERE {{ GRAPH <{g}> {{ ?j ?p ?o .{owner} FILTER(?j = <{uri}>) }} }}",
            g = self.jobs_graph,
            owner = owner_clause,
            uri = self.job_uri(id),
        ));
        self.client.update(&update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Access;
    use triplify_common::PrefixRegistry;

    fn fixture() -> (SparqlClient, QueryBuilder) {
        let client = SparqlClient::new(
            crate::client::StoreEndpoint::public("http://localhost:3030/ds"),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let prefixes =
            PrefixRegistry::new("http://example.org/data/", "http://example.org/internal/");
        (client, QueryBuilder::new(prefixes, Access::user("alice")))
    }

    #[test]
    fn job_uris_live_under_the_internal_namespace() {
        let (client, builder) = fixture();
        let jobs = JobStore::new(&client, &builder, "http://example.org/internal/");
        assert_eq!(
            jobs.job_uri("abc"),
            "http://example.org/internal/job/abc"
        );
        assert_eq!(jobs.jobs_graph, "http://example.org/internal/graph/jobs");
    }

    #[test]
    fn record_from_row_extracts_the_id_tail() {
        let (client, builder) = fixture();
        let jobs = JobStore::new(&client, &builder, "http://example.org/internal/");
        let mut row = Row::new();
        row.insert("job".to_string(), "http://example.org/internal/job/42-a".to_string());
        row.insert("label".to_string(), "file.tsv".to_string());
        row.insert("state".to_string(), "ok".to_string());
        row.insert("started".to_string(), "2024-01-01T00:00:00".to_string());
        row.insert("rows".to_string(), "12".to_string());
        let record = jobs.record_from_row(row);
        assert_eq!(record.id, "42-a");
        assert_eq!(record.row_count, Some(12));
        assert!(record.error.is_none());
    }
}
