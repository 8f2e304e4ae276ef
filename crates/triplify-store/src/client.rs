//! HTTP client for a remote SPARQL 1.1 endpoint.
//!
//! Queries go out as `application/x-www-form-urlencoded` POSTs and come
//! back as SPARQL results JSON, flattened into string rows. Everything
//! else (updates, bulk loads, file uploads) is a thin wrapper over the
//! same `reqwest` client.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use oxrdf::Term;
use secrecy::{ExposeSecret, SecretString};
use sparesults::{QueryResultsFormat, QueryResultsParser, ReaderQueryResultsParserOutput};
use tracing::{debug, instrument};
use triplify_common::{Result, TriplifyError};
use triplify_config::TriplestoreConfig;

/// One solution row, keyed by variable name without the leading `?`.
pub type Row = HashMap<String, String>;

/// Connection coordinates of one SPARQL endpoint.
#[derive(Debug, Clone)]
pub struct StoreEndpoint {
    pub query_url: String,
    pub update_url: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl StoreEndpoint {
    /// An external endpoint reachable without credentials.
    pub fn public(url: &str) -> Self {
        Self {
            query_url: url.to_string(),
            update_url: url.to_string(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SparqlClient {
    http: reqwest::Client,
    endpoint: StoreEndpoint,
}

impl SparqlClient {
    pub fn new(endpoint: StoreEndpoint, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, endpoint })
    }

    pub fn for_config(config: &TriplestoreConfig) -> Result<Self> {
        let endpoint = StoreEndpoint {
            query_url: config.query_endpoint.clone(),
            update_url: config.update_endpoint().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        };
        Self::new(endpoint, Duration::from_secs(config.timeout_secs))
    }

    pub fn endpoint(&self) -> &StoreEndpoint {
        &self.endpoint
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.endpoint.username, &self.endpoint.password) {
            (Some(user), Some(password)) => {
                builder.basic_auth(user, Some(password.expose_secret()))
            }
            (Some(user), None) => builder.basic_auth::<_, &str>(user, None),
            _ => builder,
        }
    }

    /// Run a SELECT and flatten the bindings into string rows.
    #[instrument(skip_all, fields(endpoint = %self.endpoint.query_url))]
    pub async fn select(&self, query: &str) -> Result<Vec<Row>> {
        debug!(query, "sending SPARQL query");
        let response = self
            .authed(self.http.post(&self.endpoint.query_url))
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriplifyError::Store {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.bytes().await?;
        parse_results_json(body.as_ref())
    }

    /// Run a SPARQL update. The store's answer body is only interesting
    /// when it refuses.
    #[instrument(skip_all, fields(endpoint = %self.endpoint.update_url))]
    pub async fn update(&self, update: &str) -> Result<()> {
        debug!(update, "sending SPARQL update");
        let response = self
            .authed(self.http.post(&self.endpoint.update_url))
            .form(&[("update", update)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriplifyError::Store {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    /// `INSERT DATA` a Turtle fragment into a named graph.
    pub async fn insert_data(&self, ttl: &str, graph: &str, header: &str) -> Result<()> {
        let update = format!(
            "{header}\nINSERT DATA {{\n\tGRAPH <{graph}> {{\n{ttl}\n\t}}\n}}"
        );
        self.update(&update).await
    }

    /// Ask the store to fetch a document itself.
    pub async fn load(&self, url: &str, graph: &str) -> Result<()> {
        self.update(&format!("LOAD <{url}> INTO GRAPH <{graph}>")).await
    }

    /// Push a Turtle file to a store-specific bulk upload endpoint
    /// (Fuseki `/data?graph=` style).
    pub async fn upload_file(&self, data_endpoint: &str, path: &Path, graph: &str) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "data.ttl".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(name)
            .mime_str("text/turtle")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .authed(self.http.post(data_endpoint))
            .query(&[("graph", graph)])
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriplifyError::Store {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Flatten SPARQL results JSON into rows of plain string values.
pub fn parse_results_json(body: &[u8]) -> Result<Vec<Row>> {
    let parser = QueryResultsParser::from_format(QueryResultsFormat::Json);
    let output = parser
        .for_reader(body)
        .map_err(|e| TriplifyError::Results(e.to_string()))?;

    match output {
        ReaderQueryResultsParserOutput::Solutions(solutions) => {
            let mut rows = Vec::new();
            for solution in solutions {
                let solution = solution.map_err(|e| TriplifyError::Results(e.to_string()))?;
                let mut row = Row::new();
                for (variable, term) in solution.iter() {
                    row.insert(variable.as_str().to_string(), term_value(term));
                }
                rows.push(row);
            }
            Ok(rows)
        }
        ReaderQueryResultsParserOutput::Boolean(value) => {
            let mut row = Row::new();
            row.insert("boolean".to_string(), value.to_string());
            Ok(vec![row])
        }
    }
}

fn term_value(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::BlankNode(node) => node.as_str().to_string(),
        Term::Literal(literal) => literal.value().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_solutions_into_rows() {
        let body = br#"{
            "head": {"vars": ["g", "count"]},
            "results": {"bindings": [
                {"g": {"type": "uri", "value": "http://example.org/graph/a"},
                 "count": {"type": "literal",
                           "datatype": "http://www.w3.org/2001/XMLSchema#integer",
                           "value": "42"}}
            ]}
        }"#;
        let rows = parse_results_json(body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["g"], "http://example.org/graph/a");
        assert_eq!(rows[0]["count"], "42");
    }

    #[test]
    fn unbound_variables_are_absent_from_the_row() {
        let body = br#"{
            "head": {"vars": ["a", "b"]},
            "results": {"bindings": [{"a": {"type": "literal", "value": "x"}}]}
        }"#;
        let rows = parse_results_json(body).unwrap();
        assert_eq!(rows[0].get("a").map(String::as_str), Some("x"));
        assert!(rows[0].get("b").is_none());
    }

    #[test]
    fn boolean_results_become_a_single_row() {
        let body = br#"{"head": {}, "boolean": true}"#;
        let rows = parse_results_json(body).unwrap();
        assert_eq!(rows[0]["boolean"], "true");
    }

    #[test]
    fn garbage_is_a_results_error() {
        assert!(matches!(
            parse_results_json(b"not json"),
            Err(TriplifyError::Results(_))
        ));
    }
}
