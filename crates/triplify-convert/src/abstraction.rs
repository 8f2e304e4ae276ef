//! Abstraction triples: the schema entities and relations the query UI
//! navigates, generated as Turtle fragments.

use triplify_common::uri::encode_to_rdf_uri;

/// A class of the integrated data, described by a URI and a label.
#[derive(Debug, Clone)]
pub struct AbstractedEntity {
    uri: String,
    label: String,
    start_point: bool,
}

impl AbstractedEntity {
    pub fn new(identifier: &str, prefix: Option<&str>) -> Self {
        Self {
            uri: encode_to_rdf_uri(identifier, prefix),
            label: identifier.to_string(),
            start_point: false,
        }
    }

    pub fn from_uri(uri: &str, label: &str, start_point: bool) -> Self {
        Self {
            uri: uri.to_string(),
            label: label.to_string(),
            start_point,
        }
    }

    pub fn start_point(mut self, start_point: bool) -> Self {
        self.start_point = start_point;
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Turtle block describing the entity.
    pub fn turtle(&self) -> String {
        let mut props = vec![
            format!("{} rdf:type owl:Class", self.uri),
            "\ttriplify:entity \"true\"^^xsd:boolean".to_string(),
            format!(
                "\trdfs:label {}^^xsd:string",
                crate::source_file::quoted(&self.label)
            ),
        ];
        if self.start_point {
            props.push("\ttriplify:startPoint \"true\"^^xsd:boolean".to_string());
        }
        format!("{} .\n", props.join(" ;\n"))
    }
}

/// Kinds of abstracted relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Binds an instance to another instance, shown as an edge.
    Object,
    /// Binds an instance to a literal, shown as a node attribute.
    Datatype,
}

impl RelationKind {
    fn rdf_type(&self) -> &'static str {
        match self {
            RelationKind::Object => "owl:ObjectProperty",
            RelationKind::Datatype => "owl:DatatypeProperty",
        }
    }
}

/// A property of the integrated data: domain --relation--> range.
#[derive(Debug, Clone)]
pub struct AbstractedRelation {
    uri: String,
    kind: RelationKind,
    label: String,
    domain: String,
    range: String,
    order: Option<usize>,
}

impl AbstractedRelation {
    pub fn new(
        identifier: &str,
        kind: RelationKind,
        label: &str,
        domain: &str,
        range: &str,
    ) -> Self {
        Self {
            uri: encode_to_rdf_uri(identifier, None),
            kind,
            label: label.to_string(),
            domain: domain.to_string(),
            range: range.to_string(),
            order: None,
        }
    }

    pub fn from_uri(uri: &str, kind: RelationKind, label: &str, domain: &str, range: &str) -> Self {
        Self {
            uri: uri.to_string(),
            kind,
            label: label.to_string(),
            domain: domain.to_string(),
            range: range.to_string(),
            order: None,
        }
    }

    pub fn order(mut self, order: usize) -> Self {
        self.order = Some(order);
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Turtle block describing the relation.
    pub fn turtle(&self) -> String {
        let mut props = vec![
            format!("{} rdf:type {}", self.uri, self.kind.rdf_type()),
            "\ttriplify:attribute \"true\"^^xsd:boolean".to_string(),
            format!(
                "\trdfs:label {}^^xsd:string",
                crate::source_file::quoted(&self.label)
            ),
            format!("\trdfs:domain {}", self.domain),
            format!("\trdfs:range {}", self.range),
        ];
        if let Some(order) = self.order {
            props.push(format!(
                "\ttriplify:attributeOrder \"{}\"^^xsd:integer",
                order
            ));
        }
        format!("{} .\n", props.join(" ;\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_turtle_carries_flags_and_label() {
        let ttl = AbstractedEntity::new("Gene", None).start_point(true).turtle();
        assert!(ttl.starts_with(":Gene rdf:type owl:Class ;"));
        assert!(ttl.contains("triplify:entity \"true\"^^xsd:boolean"));
        assert!(ttl.contains("rdfs:label \"Gene\"^^xsd:string"));
        assert!(ttl.contains("triplify:startPoint"));
    }

    #[test]
    fn relation_turtle_binds_domain_and_range() {
        let ttl = AbstractedRelation::new(
            "has_organism",
            RelationKind::Object,
            "organism",
            ":Gene",
            ":organismCategory",
        )
        .order(3)
        .turtle();
        assert!(ttl.starts_with(":has_organism rdf:type owl:ObjectProperty ;"));
        assert!(ttl.contains("rdfs:domain :Gene"));
        assert!(ttl.contains("rdfs:range :organismCategory"));
        assert!(ttl.contains("triplify:attributeOrder \"3\"^^xsd:integer"));
    }

    #[test]
    fn entity_identifier_is_uri_encoded() {
        let entity = AbstractedEntity::new("My Gene", None);
        assert_eq!(entity.uri(), ":My_s3_20Gene");
    }
}
