//! RDF prefix registry.
//!
//! Keeps the namespace table used to head every Turtle chunk and SPARQL
//! query sent to the triplestore. Unknown prefixes found in user-supplied
//! text can be resolved once against the prefix.cc JSON service.

use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::Result;

/// Namespaces every Triplify deployment knows about.
const BUILTIN_PREFIXES: &[(&str, &str)] = &[
    ("xsd", "http://www.w3.org/2001/XMLSchema#"),
    ("rdfs", "http://www.w3.org/2000/01/rdf-schema#"),
    ("rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"),
    ("rdfg", "http://www.w3.org/2004/03/trix/rdfg-1/"),
    ("owl", "http://www.w3.org/2002/07/owl#"),
    ("prov", "http://www.w3.org/ns/prov#"),
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("foaf", "http://xmlns.com/foaf/0.1/"),
    ("faldo", "http://biohackathon.org/resource/faldo#"),
    ("sd", "http://www.w3.org/ns/sparql-service-description#"),
];

const PREFIX_CC_URL: &str = "http://prefix.cc/";

/// Prefix table shared by the query builders and the triple loader.
///
/// The empty prefix maps to the deployment data namespace, `triplify` to
/// the internal vocabulary namespace.
#[derive(Debug, Clone)]
pub struct PrefixRegistry {
    prefixes: BTreeMap<String, String>,
}

impl PrefixRegistry {
    pub fn new(default_namespace: &str, internal_namespace: &str) -> Self {
        let mut prefixes: BTreeMap<String, String> = BUILTIN_PREFIXES
            .iter()
            .map(|(p, uri)| (p.to_string(), uri.to_string()))
            .collect();
        prefixes.insert(String::new(), default_namespace.to_string());
        prefixes.insert("triplify".to_string(), internal_namespace.to_string());
        Self { prefixes }
    }

    pub fn insert(&mut self, prefix: &str, uri: &str) {
        if !self.prefixes.contains_key(prefix) {
            debug!(prefix, uri, "registering namespace prefix");
            self.prefixes.insert(prefix.to_string(), uri.to_string());
        }
    }

    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.prefixes.get(prefix).map(String::as_str)
    }

    /// Prefixes referenced by a TTL or SPARQL body, deduplicated.
    fn scan(text: &str) -> Vec<String> {
        // A prefixed name is preceded by whitespace, a datatype caret
        // pair, an opening bracket, or starts the text.
        let re = Regex::new(r"(?:^|[\s^(\[])(\w+):").expect("static regex");
        let mut found: Vec<String> = re
            .captures_iter(text)
            .map(|c| c[1].to_string())
            .collect();
        found.sort();
        found.dedup();
        found
    }

    fn header(&self, text: &str, keyword: &str, terminator: &str) -> String {
        let mut lines = Vec::new();
        for prefix in Self::scan(text).iter().chain([String::new()].iter()) {
            match self.prefixes.get(prefix.as_str()) {
                Some(uri) => lines.push(format!(
                    "{} {}: <{}>{}",
                    keyword, prefix, uri, terminator
                )),
                None => warn!(%prefix, "unknown prefix left unresolved"),
            }
        }
        lines.join("\n")
    }

    /// `@prefix` header lines for a Turtle body.
    pub fn turtle_header(&self, ttl: &str) -> String {
        self.header(ttl, "@prefix", " .")
    }

    /// `PREFIX` header lines for a SPARQL body.
    pub fn sparql_header(&self, sparql: &str) -> String {
        self.header(sparql, "PREFIX", "")
    }

    /// Resolve prefixes referenced by `text` but absent from the registry,
    /// asking prefix.cc for each. Lookup failures are logged and skipped,
    /// matching the best-effort behaviour of the loaders.
    pub async fn learn_from(&mut self, text: &str, client: &reqwest::Client) -> Result<()> {
        for prefix in Self::scan(text) {
            if self.prefixes.contains_key(&prefix) {
                continue;
            }
            let url = format!("{}{}.file.json", PREFIX_CC_URL, prefix);
            let response = match client.get(&url).send().await {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    warn!(%prefix, status = %r.status(), "prefix.cc lookup refused");
                    continue;
                }
                Err(e) => {
                    warn!(%prefix, error = %e, "prefix.cc lookup failed");
                    continue;
                }
            };
            let body: serde_json::Value = response.json().await?;
            if let Some(uri) = body.get(&prefix).and_then(|v| v.as_str()) {
                self.insert(&prefix, uri);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PrefixRegistry {
        PrefixRegistry::new("http://example.org/data/", "http://example.org/internal/")
    }

    #[test]
    fn sparql_header_covers_used_prefixes_and_default() {
        let header = registry().sparql_header("SELECT * WHERE { ?ont a owl:Ontology }");
        assert_eq!(
            header,
            "PREFIX owl: <http://www.w3.org/2002/07/owl#>\nPREFIX : <http://example.org/data/>"
        );
    }

    #[test]
    fn turtle_header_uses_turtle_syntax() {
        let header = registry().turtle_header("toto a owl:Ontology .");
        assert_eq!(
            header,
            "@prefix owl: <http://www.w3.org/2002/07/owl#> .\n@prefix : <http://example.org/data/> ."
        );
    }

    #[test]
    fn datatype_annotations_are_scanned() {
        let header = registry().sparql_header("?g :level \"public\"^^xsd:string .");
        assert!(header.contains("PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>"));
    }

    #[test]
    fn inserted_prefix_is_resolved() {
        let mut reg = registry();
        reg.insert("qq", "http://example.com/");
        assert_eq!(reg.get("qq"), Some("http://example.com/"));
        let header = reg.sparql_header("?s qq:knows ?o");
        assert!(header.contains("PREFIX qq: <http://example.com/>"));
    }

    #[test]
    fn insert_does_not_override_builtins() {
        let mut reg = registry();
        reg.insert("owl", "http://wrong.example/");
        assert_eq!(reg.get("owl"), Some("http://www.w3.org/2002/07/owl#"));
    }

    #[test]
    fn unknown_prefix_is_skipped() {
        let header = registry().sparql_header("?s mystery:prop ?o");
        assert!(!header.contains("mystery"));
        assert!(header.contains("PREFIX : <"));
    }
}
