//! External SPARQL endpoints as a data source.
//!
//! An external endpoint is inspected for its ontologies, then each chosen
//! ontology is abstracted: its classes and properties are pulled over
//! SPARQL and converted to the same abstraction triples a file
//! integration would produce. The endpoint itself is recorded as a
//! `sd:Service` description.

use tracing::debug;
use triplify_common::Result;
use triplify_store::builder::QueryBuilder;
use triplify_store::client::{Row, SparqlClient, StoreEndpoint};

use crate::abstraction::{AbstractedEntity, AbstractedRelation, RelationKind};

/// A remote endpoint being integrated.
pub struct ExternalEndpoint {
    client: SparqlClient,
    url: String,
}

impl ExternalEndpoint {
    pub fn new(url: &str, timeout: std::time::Duration) -> Result<Self> {
        Ok(Self {
            client: SparqlClient::new(StoreEndpoint::public(url), timeout)?,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ontologies hosted by the endpoint, with per-ontology counts of
    /// classes, object properties and datatype properties.
    pub async fn inspect(&self, builder: &QueryBuilder) -> Result<Vec<Row>> {
        let query = builder.add_prefix_headers(
            "SELECT ?ont ?owl (COUNT(DISTINCT *) AS ?count)\n\
             WHERE {\n\
             \t?ont a owl:Ontology .\n\
             \t?uri a ?owl .\n\
             \t?uri rdfs:isDefinedBy ?ont .\n\
             \tFILTER ( ?owl = owl:ObjectProperty || ?owl = owl:DatatypeProperty || ?owl = owl:Class ) .\n\
             }\nGROUP BY ?ont ?owl",
        );
        debug!(endpoint = %self.url, "inspecting external endpoint");
        self.client.select(&query).await
    }

    /// `sd:Service` description recorded for the endpoint.
    pub fn service_description(&self) -> String {
        format!(
            "[] a sd:Service ;\n\
             \tsd:endpoint <{}> ;\n\
             \tsd:supportedLanguage sd:SPARQL11Query .",
            self.url
        )
    }

    pub fn ontology(&self, uri: &str, prefix: &str) -> ExternalOntology<'_> {
        ExternalOntology { endpoint: self, uri: uri.to_string(), prefix: prefix.to_string() }
    }
}

/// One ontology of an external endpoint.
pub struct ExternalOntology<'a> {
    endpoint: &'a ExternalEndpoint,
    uri: String,
    prefix: String,
}

impl ExternalOntology<'_> {
    /// The ontology as a term in query text.
    fn term(&self) -> String {
        if self.prefix.is_empty() {
            format!("<{}>", self.uri)
        } else {
            format!("{}:", self.prefix)
        }
    }

    /// Namespace pair to register before building queries.
    pub fn prefix_mapping(&self) -> Option<(&str, &str)> {
        if self.prefix.is_empty() {
            None
        } else {
            Some((self.prefix.as_str(), self.uri.as_str()))
        }
    }

    /// Abstraction triples for the ontology: entities, then object and
    /// datatype properties.
    pub async fn abstraction(&self, builder: &QueryBuilder) -> Result<Vec<String>> {
        let mut blocks = self.ask_entities(builder).await?;
        blocks.extend(self.ask_properties(builder, "owl:ObjectProperty").await?);
        blocks.extend(self.ask_properties(builder, "owl:DatatypeProperty").await?);
        Ok(blocks)
    }

    async fn ask_entities(&self, builder: &QueryBuilder) -> Result<Vec<String>> {
        let query = builder.add_prefix_headers(&format!(
            "SELECT DISTINCT ?uri ?label\n\
             WHERE {{\n\
             \t?uri a owl:Class .\n\
             \t?uri rdfs:isDefinedBy {} .\n\
             \tOPTIONAL {{ ?uri rdfs:label ?label }}\n\
             }}",
            self.term()
        ));
        let rows = self.endpoint.client.select(&query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let uri = row.get("uri")?.clone();
                let label = row.get("label").cloned().unwrap_or_else(|| uri.clone());
                Some(
                    AbstractedEntity::from_uri(&format!("<{}>", uri), &label, true).turtle(),
                )
            })
            .collect())
    }

    async fn ask_properties(&self, builder: &QueryBuilder, rdf_type: &str) -> Result<Vec<String>> {
        let query = builder.add_prefix_headers(&format!(
            "SELECT ?uri ?label ?domain ?range\n\
             WHERE {{\n\
             \t?uri a {rdf_type} .\n\
             \t?uri rdfs:isDefinedBy {} .\n\
             \t?uri rdfs:domain ?domain .\n\
             \t?uri rdfs:range ?range .\n\
             \tOPTIONAL {{ ?uri rdfs:label ?label }}\n\
             }}",
            self.term()
        ));
        let kind = if rdf_type == "owl:ObjectProperty" {
            RelationKind::Object
        } else {
            RelationKind::Datatype
        };
        let rows = self.endpoint.client.select(&query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let uri = row.get("uri")?.clone();
                let domain = row.get("domain")?.clone();
                let range = row.get("range")?.clone();
                let label = row.get("label").cloned().unwrap_or_else(|| uri.clone());
                Some(
                    AbstractedRelation::from_uri(
                        &format!("<{}>", uri),
                        kind,
                        &label,
                        &format!("<{}>", domain),
                        &format!("<{}>", range),
                    )
                    .turtle(),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_description_names_the_endpoint() {
        let endpoint = ExternalEndpoint::new(
            "https://sparql.uniprot.org/sparql",
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let ttl = endpoint.service_description();
        assert!(ttl.contains("sd:endpoint <https://sparql.uniprot.org/sparql>"));
        assert!(ttl.contains("sd:SPARQL11Query"));
    }

    #[test]
    fn ontology_term_prefers_the_prefix() {
        let endpoint = ExternalEndpoint::new(
            "https://sparql.uniprot.org/sparql",
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let with_prefix = endpoint.ontology("http://purl.uniprot.org/core/", "up");
        assert_eq!(with_prefix.term(), "up:");
        let without = endpoint.ontology("http://purl.uniprot.org/core/", "");
        assert_eq!(without.term(), "<http://purl.uniprot.org/core/>");
    }
}
