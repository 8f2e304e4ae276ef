//! Canned queries over the data graphs: start points, dataset listings,
//! and the abstraction (schema) triples the query UI is driven by.
//!
//! Public variants filter on `triplify:accessLevel "public"`, user
//! variants on `dc:creator`. All of them carry their own `GRAPH ?g`
//! pattern, so they are built in with-graph mode.

use crate::builder::{string_literal, QueryBuilder, QueryParts};
use crate::client::{Row, SparqlClient};
use triplify_common::Result;

pub struct GraphQueries<'a> {
    builder: &'a QueryBuilder,
}

impl<'a> GraphQueries<'a> {
    pub fn new(builder: &'a QueryBuilder) -> Self {
        Self { builder }
    }

    fn owner_literal(&self) -> String {
        string_literal(&self.builder.access().username)
    }

    /// Start points declared in public graphs.
    pub fn public_start_points(&self) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g ?nodeUri ?nodeLabel".to_string(),
                body: "\tGRAPH ?g {\n\
                       \t\t?nodeUri triplify:entity \"true\"^^xsd:boolean .\n\
                       \t\t?nodeUri triplify:startPoint \"true\"^^xsd:boolean .\n\
                       \t\t?nodeUri rdfs:label ?nodeLabel .\n\
                       \t\t?g triplify:accessLevel \"public\" .\n\
                       \t}"
                    .to_string(),
                ..Default::default()
            },
            true,
        )
    }

    /// Start points declared in the session user's graphs.
    pub fn user_start_points(&self) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g ?nodeUri ?nodeLabel ?accessLevel".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\t?nodeUri triplify:entity \"true\"^^xsd:boolean .\n\
                     \t\t?nodeUri triplify:startPoint \"true\"^^xsd:boolean .\n\
                     \t\t?nodeUri rdfs:label ?nodeLabel .\n\
                     \t\t?g triplify:accessLevel ?accessLevel .\n\
                     \t\t?g dc:creator {} .\n\
                     \t}}",
                    self.owner_literal()
                ),
                ..Default::default()
            },
            true,
        )
    }

    /// Per-entity URI prefixes declared as metadata.
    pub fn prefix_uris(&self) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?nodeLabel ?prefUri".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\t?nodeUri triplify:entity \"true\"^^xsd:boolean .\n\
                     \t\t?nodeUri rdfs:label ?nodeLabel .\n\
                     \t\t?nodeUri triplify:prefixUri ?prefUri .\n\
                     \t\t{{ ?g triplify:accessLevel \"public\" }}\n\
                     \t\tUNION\n\
                     \t\t{{ ?g dc:creator {} }}\n\
                     \t}}",
                    self.owner_literal()
                ),
                ..Default::default()
            },
            true,
        )
    }

    /// Entity/sub-entity pairs related by rdfs:subClassOf.
    pub fn isa_relations(&self) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?uri ?urisub".to_string(),
                body: "\tGRAPH ?g1 { ?uri triplify:entity \"true\"^^xsd:boolean . }\n\
                       \tGRAPH ?g2 { ?uri rdfs:subClassOf ?urisub . }\n\
                       \tGRAPH ?g3 { ?urisub triplify:entity \"true\"^^xsd:boolean . }"
                    .to_string(),
                ..Default::default()
            },
            true,
        )
    }

    pub fn public_graphs(&self) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g".to_string(),
                body: "\tGRAPH ?g {\n\t\t?g triplify:accessLevel \"public\" .\n\t}".to_string(),
                post_action: Some("GROUP BY ?g".to_string()),
                ..Default::default()
            },
            true,
        )
    }

    /// Datasets visible in the graph listing: name, date, access level,
    /// owner, triple count. Admins see every user's graphs.
    pub fn user_graph_infos_with_count(&self) -> String {
        let bind = if self.builder.access().admin {
            String::new()
        } else {
            format!("\t\tBIND({} AS ?owner) .\n", self.owner_literal())
        };
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g ?name ?date ?access ?owner (COUNT(*) AS ?co)".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\t?s ?p ?o .\n\
                     \t\t?g prov:generatedAtTime ?date .\n\
                     \t\t?g prov:wasDerivedFrom ?name .\n\
                     \t\t?g triplify:accessLevel ?access .\n\
                     {bind}\
                     \t\t?g dc:creator ?owner .\n\
                     \t}}"
                ),
                post_action: Some("GROUP BY ?g ?name ?date ?access ?owner".to_string()),
                ..Default::default()
            },
            true,
        )
    }

    /// Does an entity carry position (locus) attributes?
    pub fn if_positionable(&self, uri: &str) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?exist".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\tBIND(EXISTS {{ <{uri}> triplify:positionable \"true\"^^xsd:boolean }} AS ?exist)\n\
                     \t\t{{ ?g triplify:accessLevel \"public\" }}\n\
                     \t\tUNION\n\
                     \t\t{{ ?g dc:creator {} }}\n\
                     \t}}",
                    self.owner_literal()
                ),
                ..Default::default()
            },
            true,
        )
    }

    /// Taxons known across accessible graphs.
    pub fn all_taxons(&self) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?taxon".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\ttriplify:taxonCategory triplify:category ?uriTax .\n\
                     \t\t?uriTax rdfs:label ?taxon .\n\
                     \t\t{{ ?g triplify:accessLevel \"public\" }}\n\
                     \t\tUNION\n\
                     \t\t{{ ?g dc:creator {} }}\n\
                     \t}}",
                    self.owner_literal()
                ),
                ..Default::default()
            },
            true,
        )
    }

    fn scope_clause(&self, public: bool) -> String {
        if public {
            "\t\t?g triplify:accessLevel \"public\" .\n".to_string()
        } else {
            format!("\t\t?g dc:creator {} .\n", self.owner_literal())
        }
    }

    /// Datatype attributes of every entity.
    pub fn abstraction_attributes(&self, public: bool) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g ?entity ?attribute ?labelAttribute ?typeAttribute ?order".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\t?entity triplify:entity \"true\"^^xsd:boolean .\n\
                     \t\t?attribute triplify:attribute \"true\"^^xsd:boolean .\n\
                     \t\t?attribute rdf:type owl:DatatypeProperty ;\n\
                     \t\t           rdfs:label ?labelAttribute ;\n\
                     \t\t           rdfs:domain ?entity ;\n\
                     \t\t           rdfs:range ?typeAttribute .\n\
                     \t\tOPTIONAL {{ ?attribute triplify:attributeOrder ?order . }}\n\
                     {}\
                     \t}}",
                    self.scope_clause(public)
                ),
                ..Default::default()
            },
            true,
        )
    }

    /// Entity-to-entity relations of a given property type.
    pub fn abstraction_relations(&self, prop: &str, public: bool) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g ?subject ?relation ?object".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\t?relation rdf:type {prop} ;\n\
                     \t\t          rdfs:domain ?subject ;\n\
                     \t\t          rdfs:range ?object .\n\
                     \t\t?subject triplify:entity \"true\"^^xsd:boolean .\n\
                     {}\
                     \t}}",
                    self.scope_clause(public)
                ),
                ..Default::default()
            },
            true,
        )
    }

    /// Every property attached to an entity.
    pub fn abstraction_entities(&self, public: bool) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g ?entity ?property ?value".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\t?entity ?property ?value .\n\
                     \t\t?entity triplify:entity \"true\"^^xsd:boolean .\n\
                     {}\
                     \t}}",
                    self.scope_clause(public)
                ),
                ..Default::default()
            },
            true,
        )
    }

    /// Category (ObjectProperty towards a category class) attributes.
    pub fn abstraction_categories(&self, public: bool) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g ?entity ?category ?labelCategory ?typeCategory ?order".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\t?entity triplify:entity \"true\"^^xsd:boolean .\n\
                     \t\t?category rdf:type owl:ObjectProperty ;\n\
                     \t\t          rdfs:label ?labelCategory ;\n\
                     \t\t          rdfs:domain ?entity ;\n\
                     \t\t          rdfs:range ?typeCategory .\n\
                     \t\tOPTIONAL {{ ?category triplify:attributeOrder ?order . }}\n\
                     \t\t?typeCategory triplify:category ?catMember .\n\
                     {}\
                     \t}}",
                    self.scope_clause(public)
                ),
                ..Default::default()
            },
            true,
        )
    }

    /// Entities carrying position attributes.
    pub fn positionable_entities(&self) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?entity".to_string(),
                body: "\tGRAPH ?g {\n\
                       \t\t?entity triplify:entity \"true\"^^xsd:boolean .\n\
                       \t\t?entity triplify:positionable \"true\"^^xsd:boolean .\n\
                       \t}"
                    .to_string(),
                ..Default::default()
            },
            true,
        )
    }

    /// Graph URIs the session user may read: public graphs plus their own.
    pub fn accessible_graphs(&self) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?g".to_string(),
                body: format!(
                    "\tGRAPH ?g {{\n\
                     \t\t{{ ?g triplify:accessLevel \"public\" }}\n\
                     \t\tUNION\n\
                     \t\t{{ ?g dc:creator {} }}\n\
                     \t}}",
                    self.owner_literal()
                ),
                ..Default::default()
            },
            true,
        )
    }
}

/// Fetch the graph URIs the session user may read.
pub async fn fetch_accessible_graphs(
    client: &SparqlClient,
    builder: &QueryBuilder,
) -> Result<Vec<String>> {
    let rows: Vec<Row> = client.select(&GraphQueries::new(builder).accessible_graphs()).await?;
    Ok(rows.into_iter().filter_map(|mut r| r.remove("g")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Access;
    use triplify_common::PrefixRegistry;

    fn builder(admin: bool) -> QueryBuilder {
        let prefixes =
            PrefixRegistry::new("http://example.org/data/", "http://example.org/internal/");
        let mut access = Access::user("alice");
        access.admin = admin;
        QueryBuilder::new(prefixes, access)
    }

    #[test]
    fn user_start_points_filter_on_owner() {
        let b = builder(false);
        let query = GraphQueries::new(&b).user_start_points();
        assert!(query.contains("?g dc:creator \"alice\""));
        assert!(query.contains("triplify:startPoint"));
        assert!(query.contains("PREFIX triplify: <http://example.org/internal/>"));
    }

    #[test]
    fn graph_infos_bind_owner_for_plain_users_only() {
        let b = builder(false);
        let query = GraphQueries::new(&b).user_graph_infos_with_count();
        assert!(query.contains("BIND(\"alice\" AS ?owner)"));

        let b = builder(true);
        let query = GraphQueries::new(&b).user_graph_infos_with_count();
        assert!(!query.contains("BIND("));
    }

    #[test]
    fn abstraction_scope_switches_between_public_and_owner() {
        let b = builder(false);
        let queries = GraphQueries::new(&b);
        assert!(queries
            .abstraction_attributes(true)
            .contains("triplify:accessLevel \"public\""));
        assert!(queries
            .abstraction_attributes(false)
            .contains("dc:creator \"alice\""));
    }
}
