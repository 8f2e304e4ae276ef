//! SPARQL assembly from a JSON query description.
//!
//! The query UI ships a graph-shaped payload: selected variables and a
//! recursive constraint tree of triple patterns, filters, unions and
//! optionals. This module turns it into SELECT text. Every term is
//! validated before it is interpolated — nothing from the payload reaches
//! the query as raw text.

use serde::Deserialize;
use triplify_common::{Result, TriplifyError};

use crate::builder::{string_literal, QueryBuilder};

fn default_limit() -> i64 {
    -1
}

/// The JSON payload describing a visual query graph.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryGraph {
    /// Variables to select, `?x` style.
    pub variates: Vec<String>,
    pub constraints: Vec<Constraint>,
    /// Named graphs to query. Empty means every accessible graph.
    #[serde(default)]
    pub graphs: Vec<String>,
    /// URLs of registered endpoints to federate over.
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Row limit; negative means unlimited.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    Triple {
        subject: String,
        predicate: String,
        object: String,
        /// Remote endpoint evaluating this pattern, as a SERVICE block.
        #[serde(default)]
        endpoint: Option<String>,
    },
    Filter {
        variable: String,
        operator: FilterOperator,
        value: String,
    },
    Values {
        variable: String,
        values: Vec<String>,
    },
    Union {
        branches: Vec<Vec<Constraint>>,
    },
    Optional {
        constraints: Vec<Constraint>,
    },
    Group {
        constraints: Vec<Constraint>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
}

/// A SPARQL variable: `?name`.
fn validate_variable(value: &str) -> Result<&str> {
    let name = value
        .strip_prefix('?')
        .ok_or_else(|| TriplifyError::Query(format!("not a variable: {value}")))?;
    if !name.is_empty()
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(value)
    } else {
        Err(TriplifyError::Query(format!("invalid variable name: {value}")))
    }
}

fn is_valid_iri_ref(value: &str) -> bool {
    value.len() > 2
        && value.starts_with('<')
        && value.ends_with('>')
        && !value[1..value.len() - 1]
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}'))
}

fn is_valid_prefixed_name(value: &str) -> bool {
    match value.split_once(':') {
        Some((prefix, local)) => {
            prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !local.is_empty()
                && local
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '%'))
        }
        None => false,
    }
}

/// A term in subject or predicate position: variable, IRI or prefixed
/// name. `a` is allowed for predicates.
fn validate_term(value: &str) -> Result<&str> {
    if value == "a"
        || value.starts_with('?') && validate_variable(value).is_ok()
        || is_valid_iri_ref(value)
        || is_valid_prefixed_name(value)
    {
        Ok(value)
    } else {
        Err(TriplifyError::Query(format!("invalid term: {value}")))
    }
}

/// An object term additionally accepts plain values, quoted as literals.
fn object_term(value: &str) -> String {
    if validate_term(value).is_ok() {
        value.to_string()
    } else {
        string_literal(value)
    }
}

fn validate_service_url(value: &str) -> Result<&str> {
    if (value.starts_with("http://") || value.starts_with("https://"))
        && !value.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"'))
    {
        Ok(value)
    } else {
        Err(TriplifyError::Query(format!("invalid endpoint url: {value}")))
    }
}

fn render_filter(variable: &str, operator: FilterOperator, value: &str) -> Result<String> {
    let variable = validate_variable(variable)?;
    let rendered = match operator {
        FilterOperator::Equal
        | FilterOperator::NotEqual
        | FilterOperator::Less
        | FilterOperator::LessOrEqual
        | FilterOperator::Greater
        | FilterOperator::GreaterOrEqual => {
            let op = match operator {
                FilterOperator::Equal => "=",
                FilterOperator::NotEqual => "!=",
                FilterOperator::Less => "<",
                FilterOperator::LessOrEqual => "<=",
                FilterOperator::Greater => ">",
                FilterOperator::GreaterOrEqual => ">=",
                _ => unreachable!(),
            };
            // Numbers compare as numbers, everything else as strings.
            let operand = if value.parse::<f64>().is_ok() {
                value.to_string()
            } else {
                string_literal(value)
            };
            format!("FILTER ( {variable} {op} {operand} )")
        }
        FilterOperator::Contains => {
            format!(
                "FILTER ( regex({variable}, {}, \"i\") )",
                string_literal(&regex::escape(value))
            )
        }
        FilterOperator::StartsWith => {
            format!(
                "FILTER ( regex({variable}, {}, \"i\") )",
                string_literal(&format!("^{}", regex::escape(value)))
            )
        }
        FilterOperator::EndsWith => {
            format!(
                "FILTER ( regex({variable}, {}, \"i\") )",
                string_literal(&format!("{}$", regex::escape(value)))
            )
        }
        FilterOperator::Regex => {
            format!("FILTER ( regex({variable}, {}, \"i\") )", string_literal(value))
        }
    };
    Ok(rendered)
}

fn indent_str(depth: usize) -> String {
    "\t".repeat(depth)
}

fn render_constraints(constraints: &[Constraint], depth: usize) -> Result<String> {
    let pad = indent_str(depth);
    let mut lines: Vec<String> = Vec::new();
    // Consecutive patterns bound to the same endpoint share one SERVICE
    // block.
    let mut service: Option<(String, Vec<String>)> = None;

    let flush_service =
        |service: &mut Option<(String, Vec<String>)>, lines: &mut Vec<String>| {
            if let Some((url, patterns)) = service.take() {
                lines.push(format!("{pad}SERVICE <{url}> {{"));
                for pattern in patterns {
                    lines.push(format!("{pad}\t{pattern}"));
                }
                lines.push(format!("{pad}}}"));
            }
        };

    for constraint in constraints {
        match constraint {
            Constraint::Triple { subject, predicate, object, endpoint } => {
                let pattern = format!(
                    "{} {} {} .",
                    validate_term(subject)?,
                    validate_term(predicate)?,
                    object_term(object)
                );
                match endpoint {
                    Some(url) => {
                        let url = validate_service_url(url)?.to_string();
                        match &mut service {
                            Some((current, patterns)) if *current == url => {
                                patterns.push(pattern)
                            }
                            _ => {
                                flush_service(&mut service, &mut lines);
                                service = Some((url, vec![pattern]));
                            }
                        }
                    }
                    None => {
                        flush_service(&mut service, &mut lines);
                        lines.push(format!("{pad}{pattern}"));
                    }
                }
            }
            Constraint::Filter { variable, operator, value } => {
                flush_service(&mut service, &mut lines);
                lines.push(format!("{pad}{}", render_filter(variable, *operator, value)?));
            }
            Constraint::Values { variable, values } => {
                flush_service(&mut service, &mut lines);
                let variable = validate_variable(variable)?;
                let rendered: Vec<String> =
                    values.iter().map(|v| string_literal(v)).collect();
                lines.push(format!(
                    "{pad}VALUES {variable} {{ {} }}",
                    rendered.join(" ")
                ));
            }
            Constraint::Union { branches } => {
                flush_service(&mut service, &mut lines);
                if branches.is_empty() {
                    return Err(TriplifyError::Query("empty union".to_string()));
                }
                let mut rendered = Vec::new();
                for branch in branches {
                    rendered.push(format!(
                        "{pad}{{\n{}\n{pad}}}",
                        render_constraints(branch, depth + 1)?
                    ));
                }
                lines.push(rendered.join(&format!("\n{pad}UNION\n")));
            }
            Constraint::Optional { constraints } => {
                flush_service(&mut service, &mut lines);
                lines.push(format!(
                    "{pad}OPTIONAL {{\n{}\n{pad}}}",
                    render_constraints(constraints, depth + 1)?
                ));
            }
            Constraint::Group { constraints } => {
                flush_service(&mut service, &mut lines);
                lines.push(format!(
                    "{pad}{{\n{}\n{pad}}}",
                    render_constraints(constraints, depth + 1)?
                ));
            }
        }
    }
    flush_service(&mut service, &mut lines);

    Ok(lines.join("\n"))
}

/// SPARQL text assembled from a [`QueryGraph`].
#[derive(Debug, Clone)]
pub struct AssembledQuery {
    pub sparql: String,
}

/// Build the SELECT for a query description.
///
/// `accessible_graphs` is the access-control boundary: the FROM list is
/// the payload's graph selection intersected with it, or all of it when
/// the payload names none. Admin sessions skip the intersection.
pub fn assemble(
    payload: &QueryGraph,
    builder: &QueryBuilder,
    accessible_graphs: &[String],
) -> Result<AssembledQuery> {
    if payload.variates.is_empty() {
        return Err(TriplifyError::Query("no variable selected".to_string()));
    }
    for variate in &payload.variates {
        validate_variable(variate)?;
    }

    let from_graphs: Vec<&String> = if payload.graphs.is_empty() {
        accessible_graphs.iter().collect()
    } else if builder.access().admin {
        payload.graphs.iter().collect()
    } else {
        payload
            .graphs
            .iter()
            .filter(|g| accessible_graphs.contains(g))
            .collect()
    };

    let mut query = format!("SELECT DISTINCT {}\n", payload.variates.join(" "));
    for graph in &from_graphs {
        if !is_valid_iri_ref(&format!("<{graph}>")) {
            return Err(TriplifyError::Query(format!("invalid graph uri: {graph}")));
        }
        query.push_str(&format!("FROM <{graph}>\n"));
    }

    let body = render_constraints(&payload.constraints, 1)?;
    query.push_str(&format!("WHERE {{\n{}\n}}\n", body));

    if payload.limit > 0 {
        query.push_str(&format!("LIMIT {}\n", payload.limit));
    }

    Ok(AssembledQuery { sparql: builder.add_prefix_headers(&query) })
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

    fn triple(s: &str, p: &str, o: &str) -> Constraint {
        Constraint::Triple {
            subject: s.to_string(),
            predicate: p.to_string(),
            object: o.to_string(),
            endpoint: None,
        }
    }

    fn payload(constraints: Vec<Constraint>) -> QueryGraph {
        QueryGraph {
            variates: vec!["?gene".to_string(), "?label".to_string()],
            constraints,
            graphs: vec![],
            endpoints: vec![],
            limit: -1,
        }
    }

    #[test]
    fn basic_query_has_select_from_where() {
        let graphs = vec!["http://example.org/internal/graph/alice/f_1".to_string()];
        let assembled = assemble(
            &payload(vec![
                triple("?gene", "rdf:type", ":Gene"),
                triple("?gene", "rdfs:label", "?label"),
            ]),
            &builder(false),
            &graphs,
        )
        .unwrap();
        assert!(assembled.sparql.contains("SELECT DISTINCT ?gene ?label"));
        assert!(assembled
            .sparql
            .contains("FROM <http://example.org/internal/graph/alice/f_1>"));
        assert!(assembled.sparql.contains("?gene rdf:type :Gene ."));
        assert!(!assembled.sparql.contains("LIMIT"));
    }

    #[test]
    fn requested_graphs_are_intersected_with_accessible_ones() {
        let accessible = vec!["http://example.org/g/mine".to_string()];
        let mut p = payload(vec![triple("?s", "?p", "?o")]);
        p.graphs = vec![
            "http://example.org/g/mine".to_string(),
            "http://example.org/g/other".to_string(),
        ];
        let assembled = assemble(&p, &builder(false), &accessible).unwrap();
        assert!(assembled.sparql.contains("FROM <http://example.org/g/mine>"));
        assert!(!assembled.sparql.contains("FROM <http://example.org/g/other>"));

        // Admins are not filtered.
        let assembled = assemble(&p, &builder(true), &accessible).unwrap();
        assert!(assembled.sparql.contains("FROM <http://example.org/g/other>"));
    }

    #[test]
    fn filters_compare_numbers_and_quote_strings() {
        let assembled = assemble(
            &payload(vec![
                triple("?gene", ":start", "?start"),
                Constraint::Filter {
                    variable: "?start".to_string(),
                    operator: FilterOperator::Greater,
                    value: "1000".to_string(),
                },
                Constraint::Filter {
                    variable: "?label".to_string(),
                    operator: FilterOperator::Contains,
                    value: "kinase".to_string(),
                },
            ]),
            &builder(false),
            &[],
        )
        .unwrap();
        assert!(assembled.sparql.contains("FILTER ( ?start > 1000 )"));
        assert!(assembled
            .sparql
            .contains("FILTER ( regex(?label, \"kinase\", \"i\") )"));
    }

    #[test]
    fn union_and_optional_nest() {
        let assembled = assemble(
            &payload(vec![
                Constraint::Union {
                    branches: vec![
                        vec![triple("?s", "rdf:type", ":Gene")],
                        vec![triple("?s", "rdf:type", ":Protein")],
                    ],
                },
                Constraint::Optional {
                    constraints: vec![triple("?s", "rdfs:comment", "?comment")],
                },
            ]),
            &builder(false),
            &[],
        )
        .unwrap();
        assert!(assembled.sparql.contains("UNION"));
        assert!(assembled.sparql.contains("OPTIONAL {"));
        assert!(assembled.sparql.contains("?s rdf:type :Protein ."));
    }

    #[test]
    fn endpoint_bound_triples_share_a_service_block() {
        let assembled = assemble(
            &payload(vec![
                triple("?gene", "rdfs:label", "?label"),
                Constraint::Triple {
                    subject: "?gene".to_string(),
                    predicate: "up:annotation".to_string(),
                    object: "?a".to_string(),
                    endpoint: Some("https://sparql.uniprot.org/sparql".to_string()),
                },
                Constraint::Triple {
                    subject: "?a".to_string(),
                    predicate: "rdfs:comment".to_string(),
                    object: "?c".to_string(),
                    endpoint: Some("https://sparql.uniprot.org/sparql".to_string()),
                },
            ]),
            &builder(false),
            &[],
        )
        .unwrap();
        let service_blocks = assembled.sparql.matches("SERVICE <").count();
        assert_eq!(service_blocks, 1);
        assert!(assembled
            .sparql
            .contains("SERVICE <https://sparql.uniprot.org/sparql> {"));
    }

    #[test]
    fn plain_object_values_become_literals() {
        let assembled = assemble(
            &payload(vec![triple("?gene", ":organism", "Mus musculus")]),
            &builder(false),
            &[],
        )
        .unwrap();
        assert!(assembled.sparql.contains("?gene :organism \"Mus musculus\" ."));
    }

    #[test]
    fn hostile_terms_are_rejected() {
        let err = assemble(
            &payload(vec![triple("?s } . ?x ?y ?z", "?p", "?o")]),
            &builder(false),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, TriplifyError::Query(_)));

        let err = assemble(
            &payload(vec![triple("?s", "rdf:type> } DROP GRAPH <g", "?o")]),
            &builder(false),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, TriplifyError::Query(_)));
    }

    #[test]
    fn missing_variates_is_an_error() {
        let mut p = payload(vec![triple("?s", "?p", "?o")]);
        p.variates.clear();
        assert!(matches!(
            assemble(&p, &builder(false), &[]),
            Err(TriplifyError::Query(_))
        ));
    }

    #[test]
    fn limit_is_appended_when_positive() {
        let mut p = payload(vec![triple("?s", "?p", "?o")]);
        p.limit = 30;
        let assembled = assemble(&p, &builder(false), &[]).unwrap();
        assert!(assembled.sparql.trim_end().ends_with("LIMIT 30"));
    }

    #[test]
    fn deserializes_from_json() {
        let raw = r#"{
            "variates": ["?gene"],
            "constraints": [
                {"type": "triple", "subject": "?gene", "predicate": "rdf:type", "object": ":Gene"},
                {"type": "filter", "variable": "?gene", "operator": "contains", "value": "BRCA"}
            ],
            "limit": 10
        }"#;
        let parsed: QueryGraph = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.variates, vec!["?gene"]);
        assert_eq!(parsed.limit, 10);
        assert_eq!(parsed.constraints.len(), 2);
    }
}
