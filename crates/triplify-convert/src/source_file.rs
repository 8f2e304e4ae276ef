//! Shared source-file machinery: kind detection and the persist
//! orchestration (job record, loading, provenance, rollback).

use std::path::Path;

use serde::Serialize;
use tracing::{error, info};
use triplify_common::Result;
use triplify_store::jobs::{JobKind, JobStore};
use triplify_store::TripleLoader;

/// Quote a string as a Turtle literal.
pub fn quoted(value: &str) -> String {
    triplify_store::builder::string_literal(value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[serde(rename = "tsv")]
    Tabular,
    Gff,
    Bed,
    Ttl,
}

/// File kind from its extension, unless the caller forces one.
pub fn detect_kind(name: &str, forced: Option<&str>) -> Option<SourceKind> {
    let token = match forced {
        Some(t) => t.to_lowercase(),
        None => Path::new(name)
            .extension()?
            .to_string_lossy()
            .to_lowercase(),
    };
    match token.as_str() {
        "tsv" | "csv" | "txt" | "tabular" => Some(SourceKind::Tabular),
        "gff" | "gff2" | "gff3" => Some(SourceKind::Gff),
        "bed" => Some(SourceKind::Bed),
        "ttl" | "turtle" => Some(SourceKind::Ttl),
        _ => None,
    }
}

/// What an integration attempt reports back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct PersistOutcome {
    pub status: String,
    pub expected_lines_number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_triple_count: Option<u64>,
    pub graph: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PersistOutcome {
    fn ok(expected: u64, total: Option<u64>, graph: &str) -> Self {
        Self {
            status: "ok".to_string(),
            expected_lines_number: expected,
            total_triple_count: total,
            graph: graph.to_string(),
            error: None,
        }
    }

    fn failed(expected: u64, graph: &str, error: String) -> Self {
        Self {
            status: "ko".to_string(),
            expected_lines_number: expected,
            total_triple_count: None,
            graph: graph.to_string(),
            error: Some(error),
        }
    }
}

async fn store_all(
    loader: &TripleLoader,
    content: Vec<String>,
    abstraction: Vec<String>,
    origin: &str,
) -> Result<u64> {
    let total = loader.store_ttl(content).await?;
    loader.store_ttl(abstraction).await?;
    loader.insert_metadata(origin).await?;
    Ok(total)
}

/// Ship generated triples, with the job bookkeeping and rollback around
/// them. Failures are reported in the outcome, not as an error: the
/// client gets a `ko` status either way.
pub async fn persist_triples(
    name: &str,
    expected_lines: u64,
    content: Vec<String>,
    abstraction: Vec<String>,
    loader: &TripleLoader,
    jobs: &JobStore<'_>,
) -> Result<PersistOutcome> {
    let job_id = jobs.create(JobKind::Integration, name).await?;

    match store_all(loader, content, abstraction, name).await {
        Ok(total) => {
            jobs.done(&job_id).await?;
            info!(name, total, graph = %loader.graph_uri(), "integration done");
            Ok(PersistOutcome::ok(expected_lines, Some(total), loader.graph_uri()))
        }
        Err(e) => {
            error!(name, error = %e, "integration failed");
            loader.rollback().await;
            if let Err(je) = jobs.set_error(&job_id, &e.to_string()).await {
                error!(error = %je, "could not record job error");
            }
            Ok(PersistOutcome::failed(expected_lines, loader.graph_uri(), e.to_string()))
        }
    }
}

/// Ship a complete Turtle file (no chunking, the file carries its own
/// prefixes), with the same bookkeeping.
pub async fn persist_ttl_file(
    name: &str,
    path: &Path,
    expected_lines: u64,
    triple_count: u64,
    loader: &TripleLoader,
    jobs: &JobStore<'_>,
) -> Result<PersistOutcome> {
    let job_id = jobs.create(JobKind::Integration, name).await?;

    let result = async {
        loader.store_ttl_file(path).await?;
        loader.insert_metadata(name).await
    };
    match result.await {
        Ok(()) => {
            jobs.done(&job_id).await?;
            Ok(PersistOutcome::ok(expected_lines, Some(triple_count), loader.graph_uri()))
        }
        Err(e) => {
            error!(name, error = %e, "ttl integration failed");
            loader.rollback().await;
            if let Err(je) = jobs.set_error(&job_id, &e.to_string()).await {
                error!(error = %je, "could not record job error");
            }
            Ok(PersistOutcome::failed(expected_lines, loader.graph_uri(), e.to_string()))
        }
    }
}

/// `LOAD` a remote document into a fresh graph, with the same
/// bookkeeping.
pub async fn persist_remote(
    url: &str,
    loader: &TripleLoader,
    jobs: &JobStore<'_>,
) -> Result<PersistOutcome> {
    let job_id = jobs.create(JobKind::Integration, url).await?;

    let result = async {
        loader.load_from_url(url).await?;
        loader.insert_metadata(url).await
    };
    match result.await {
        Ok(()) => {
            jobs.done(&job_id).await?;
            Ok(PersistOutcome::ok(0, None, loader.graph_uri()))
        }
        Err(e) => {
            error!(url, error = %e, "remote integration failed");
            loader.rollback().await;
            if let Err(je) = jobs.set_error(&job_id, &e.to_string()).await {
                error!(error = %je, "could not record job error");
            }
            Ok(PersistOutcome::failed(0, loader.graph_uri(), e.to_string()))
        }
    }
}

/// Number of data lines in a file (the tabular converters report this as
/// the expected row count).
pub fn count_lines(path: &Path) -> Result<u64> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().count().saturating_sub(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_detection_prefers_the_forced_type() {
        assert_eq!(detect_kind("data.tsv", None), Some(SourceKind::Tabular));
        assert_eq!(detect_kind("data.csv", None), Some(SourceKind::Tabular));
        assert_eq!(detect_kind("genes.gff3", None), Some(SourceKind::Gff));
        assert_eq!(detect_kind("peaks.bed", None), Some(SourceKind::Bed));
        assert_eq!(detect_kind("model.ttl", None), Some(SourceKind::Ttl));
        assert_eq!(detect_kind("mystery.dat", None), None);
        assert_eq!(detect_kind("mystery.dat", Some("gff")), Some(SourceKind::Gff));
    }

    #[test]
    fn line_count_excludes_the_header() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "h1\th2\na\t1\nb\t2\n").unwrap();
        assert_eq!(count_lines(tmp.path()).unwrap(), 2);
    }
}
