//! Statistics queries: triple/entity/class/graph counts and the
//! class-to-attribute / class-to-relation tables shown on the stats page.

use crate::builder::{AccessLevel, QueryBuilder, QueryParts};

pub struct StatsQueries<'a> {
    builder: &'a QueryBuilder,
}

impl<'a> StatsQueries<'a> {
    pub fn new(builder: &'a QueryBuilder) -> Self {
        Self { builder }
    }

    /// Restrict to public graphs or to the session user's graphs.
    fn scoped(&self, body: &str, scope: AccessLevel) -> String {
        let filter = match scope {
            AccessLevel::Public => "\t\t?g triplify:accessLevel \"public\" .".to_string(),
            AccessLevel::Private => format!(
                "\t\t?g dc:creator {} .",
                crate::builder::string_literal(&self.builder.access().username)
            ),
        };
        format!("\tGRAPH ?g {{\n{}\n{}\n\t}}", body, filter)
    }

    pub fn number_of_triples(&self, scope: AccessLevel) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "(COUNT(*) AS ?number)".to_string(),
                body: self.scoped("\t\t?s ?p ?o .", scope),
                ..Default::default()
            },
            true,
        )
    }

    pub fn number_of_entities(&self, scope: AccessLevel) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "(COUNT(DISTINCT ?s) AS ?number)".to_string(),
                body: self.scoped("\t\t?s a [] .", scope),
                ..Default::default()
            },
            true,
        )
    }

    pub fn number_of_classes(&self, scope: AccessLevel) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "(COUNT(DISTINCT ?s) AS ?number)".to_string(),
                body: self.scoped("\t\t?s rdf:type owl:Class .", scope),
                ..Default::default()
            },
            true,
        )
    }

    pub fn number_of_graphs(&self, scope: AccessLevel) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "(COUNT(DISTINCT ?g) AS ?number)".to_string(),
                body: self.scoped("\t\t?s ?p ?o .", scope),
                ..Default::default()
            },
            true,
        )
    }

    /// Provenance card of every visible graph.
    pub fn graph_infos(&self, scope: AccessLevel) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?graph ?date ?owner ?server ?version".to_string(),
                body: self.scoped(
                    "\t\t?g prov:wasDerivedFrom ?graph .\n\
                     \t\t?g dc:creator ?owner .\n\
                     \t\t?g dc:hasVersion ?version .\n\
                     \t\t?g prov:describesService ?server .\n\
                     \t\t?g prov:generatedAtTime ?date .",
                    scope,
                ),
                ..Default::default()
            },
            true,
        )
    }

    pub fn attributes_of_classes(&self, scope: AccessLevel) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?class ?attr".to_string(),
                body: self.scoped(
                    "\t\t?uriClass a owl:Class .\n\
                     \t\t?uriClass rdfs:label ?class .\n\
                     \t\t?uriAttr rdfs:domain ?uriClass .\n\
                     \t\t?uriAttr rdfs:label ?attr .",
                    scope,
                ),
                ..Default::default()
            },
            true,
        )
    }

    pub fn relations_of_classes(&self, scope: AccessLevel) -> String {
        self.builder.on_the_fly(
            &QueryParts {
                select: "?domain ?relname ?range".to_string(),
                body: self.scoped(
                    "\t\t?rel a owl:ObjectProperty .\n\
                     \t\t?rel rdfs:label ?relname .\n\
                     \t\t?rel rdfs:domain ?uriDomain .\n\
                     \t\t?rel rdfs:range ?uriRange .\n\
                     \t\t?uriDomain rdfs:label ?domain .\n\
                     \t\t?uriRange rdfs:label ?range .",
                    scope,
                ),
                ..Default::default()
            },
            true,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Access;
    use triplify_common::PrefixRegistry;

    fn builder() -> QueryBuilder {
        let prefixes =
            PrefixRegistry::new("http://example.org/data/", "http://example.org/internal/");
        QueryBuilder::new(prefixes, Access::user("alice"))
    }

    #[test]
    fn triple_count_scopes_to_public() {
        let b = builder();
        let query = StatsQueries::new(&b).number_of_triples(AccessLevel::Public);
        assert!(query.contains("COUNT(*) AS ?number"));
        assert!(query.contains("triplify:accessLevel \"public\""));
        assert!(!query.contains("dc:creator"));
    }

    #[test]
    fn private_scope_filters_on_owner() {
        let b = builder();
        let query = StatsQueries::new(&b).number_of_classes(AccessLevel::Private);
        assert!(query.contains("dc:creator \"alice\""));
        assert!(query.contains("owl:Class"));
    }
}
