//! Base SPARQL text builder.
//!
//! Every query the application sends is assembled here as plain text:
//! prefix headers, SELECT/FROM/WHERE skeleton, and the graph-management
//! statements. Access control is a matter of which graphs end up in the
//! FROM list — public graphs plus the session user's own.

use triplify_common::PrefixRegistry;

/// Visibility of a named graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    Public,
    Private,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::Public => "public",
            AccessLevel::Private => "private",
        }
    }
}

/// Identity of the requester, as the query builders need it.
#[derive(Debug, Clone, Default)]
pub struct Access {
    pub username: String,
    pub admin: bool,
    pub group: String,
}

impl Access {
    pub fn user(username: &str) -> Self {
        Self { username: username.to_string(), ..Default::default() }
    }
}

/// Pieces of an on-the-fly SELECT.
#[derive(Debug, Clone, Default)]
pub struct QueryParts {
    pub select: String,
    pub body: String,
    pub post_action: Option<String>,
    /// Graphs listed as FROM clauses. Ignored when the body carries its
    /// own `GRAPH ?g` pattern.
    pub from_graphs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    prefixes: PrefixRegistry,
    access: Access,
}

impl QueryBuilder {
    pub fn new(prefixes: PrefixRegistry, access: Access) -> Self {
        Self { prefixes, access }
    }

    pub fn access(&self) -> &Access {
        &self.access
    }

    pub fn prefixes(&self) -> &PrefixRegistry {
        &self.prefixes
    }

    /// Prepend the PREFIX lines a query body needs.
    pub fn add_prefix_headers(&self, query: &str) -> String {
        format!("{}\n{}", self.prefixes.sparql_header(query), query)
    }

    /// Assemble `SELECT .. FROM .. WHERE { .. } ..` text.
    ///
    /// With `with_graph`, the body is expected to constrain graphs itself
    /// with `GRAPH ?g { .. }`; otherwise every graph in `from_graphs`
    /// becomes a FROM clause and the store merges them into the default
    /// graph.
    pub fn on_the_fly(&self, parts: &QueryParts, with_graph: bool) -> String {
        let mut query = format!("SELECT DISTINCT {}\n", parts.select);

        if !with_graph {
            for graph in &parts.from_graphs {
                query.push_str(&format!("FROM <{}>\n", graph));
            }
        }

        query.push_str(&format!("WHERE {{\n{}\n}}\n", parts.body));

        if let Some(post) = &parts.post_action {
            query.push_str(post);
            query.push('\n');
        }

        self.add_prefix_headers(&query)
    }

    pub fn drop_named_graph(&self, graph: &str) -> String {
        format!("DROP SILENT GRAPH <{}>", graph)
    }

    /// Remove the provenance triples attached to a graph URI, wherever
    /// they were written.
    pub fn delete_graph_metadata(&self, graph: &str) -> String {
        self.add_prefix_headers(&format!(
            "DELETE WHERE {{ GRAPH ?g {{ <{0}> ?p ?o }} }}",
            graph
        ))
    }

    /// All data-graph URIs owned by a user. The provenance timestamp
    /// keeps other `dc:creator` subjects (jobs, api keys) out.
    pub fn graphs_of_user(&self, username: &str) -> String {
        self.add_prefix_headers(&format!(
            "SELECT DISTINCT ?g\nWHERE {{\n\
             \tGRAPH ?mg {{\n\
             \t\t?g dc:creator {} .\n\
             \t\t?g prov:generatedAtTime ?date .\n\
             \t}}\n}}",
            string_literal(username)
        ))
    }
}

/// Quote a string for use as a SPARQL/Turtle literal.
pub fn string_literal(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

/// Typed boolean literal.
pub fn bool_literal(value: bool) -> String {
    format!("\"{}\"^^xsd:boolean", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> QueryBuilder {
        let prefixes =
            PrefixRegistry::new("http://example.org/data/", "http://example.org/internal/");
        QueryBuilder::new(prefixes, Access::user("alice"))
    }

    #[test]
    fn on_the_fly_emits_from_clauses() {
        let parts = QueryParts {
            select: "?s ?p ?o".to_string(),
            body: "\t?s ?p ?o .".to_string(),
            from_graphs: vec!["http://example.org/graph/a".to_string()],
            post_action: None,
        };
        let query = builder().on_the_fly(&parts, false);
        assert!(query.contains("SELECT DISTINCT ?s ?p ?o"));
        assert!(query.contains("FROM <http://example.org/graph/a>"));
        assert!(query.contains("WHERE {\n\t?s ?p ?o .\n}"));
    }

    #[test]
    fn with_graph_skips_from_clauses() {
        let parts = QueryParts {
            select: "?g".to_string(),
            body: "\tGRAPH ?g { ?s ?p ?o }".to_string(),
            from_graphs: vec!["http://example.org/graph/a".to_string()],
            post_action: Some("GROUP BY ?g".to_string()),
        };
        let query = builder().on_the_fly(&parts, true);
        assert!(!query.contains("FROM"));
        assert!(query.ends_with("GROUP BY ?g\n"));
    }

    #[test]
    fn prefix_header_matches_body_prefixes() {
        let parts = QueryParts {
            select: "?s".to_string(),
            body: "\t?s rdf:type owl:Class .".to_string(),
            ..Default::default()
        };
        let query = builder().on_the_fly(&parts, false);
        assert!(query.contains("PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>"));
        assert!(query.contains("PREFIX owl: <http://www.w3.org/2002/07/owl#>"));
    }

    #[test]
    fn string_literal_escapes_quotes() {
        assert_eq!(string_literal(r#"a "b" c"#), r#""a \"b\" c""#);
    }

    #[test]
    fn drop_statement_brackets_the_graph() {
        assert_eq!(
            builder().drop_named_graph("http://example.org/graph/a"),
            "DROP SILENT GRAPH <http://example.org/graph/a>"
        );
    }
}
