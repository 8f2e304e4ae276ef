//! Query endpoints: start points, abstraction, JSON-described SPARQL
//! execution and the statistics page.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error};
use triplify_common::{Result as TriplifyResult, TriplifyError};
use triplify_convert::UserDirs;
use triplify_store::assemble::{assemble, QueryGraph};
use triplify_store::builder::AccessLevel;
use triplify_store::client::Row;
use triplify_store::endpoints::{EndpointRegistry, RegisteredEndpoint};
use triplify_store::federation::MultiQuery;
use triplify_store::graph::{fetch_accessible_graphs, GraphQueries};
use triplify_store::jobs::{JobKind, JobStore};
use triplify_store::stats::StatsQueries;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::SharedState;

/// Rows kept as the stored preview of a persisted query job.
const JOB_PREVIEW_ROWS: usize = 30;

/// GET /start_points — query-starting entities, with their visibility.
pub async fn start_points(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let queries = GraphQueries::new(&builder);

    let public_rows = state.client.select(&queries.public_start_points()).await?;
    let user_rows = if session.logged_in() {
        state.client.select(&queries.user_start_points()).await?
    } else {
        Vec::new()
    };

    #[derive(Default)]
    struct Node {
        label: String,
        public: bool,
        private: bool,
    }
    let mut nodes: BTreeMap<String, Node> = BTreeMap::new();

    for row in public_rows {
        let Some(uri) = row.get("nodeUri") else { continue };
        let node = nodes.entry(uri.clone()).or_default();
        node.label = row.get("nodeLabel").cloned().unwrap_or_default();
        node.public = true;
    }
    for row in user_rows {
        let Some(uri) = row.get("nodeUri") else { continue };
        let node = nodes.entry(uri.clone()).or_default();
        if node.label.is_empty() {
            node.label = row.get("nodeLabel").cloned().unwrap_or_default();
        }
        if row.get("accessLevel").map(String::as_str) == Some("public") {
            node.public = true;
        } else {
            node.private = true;
        }
    }

    let nodes: Map<String, Value> = nodes
        .into_iter()
        .map(|(uri, node)| {
            (
                uri.clone(),
                json!({
                    "uri": uri,
                    "label": node.label,
                    "public": node.public,
                    "private": node.private,
                    "public_and_private": node.public && node.private,
                }),
            )
        })
        .collect();
    debug!(count = nodes.len(), "start points retrieved");

    Ok(Json(json!({ "nodes": nodes })))
}

/// POST /get_user_abstraction — everything the query UI needs to draw
/// the schema graph.
pub async fn get_user_abstraction(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let queries = GraphQueries::new(&builder);

    let mut entities = state
        .client
        .select(&queries.abstraction_entities(true))
        .await?;
    let mut attributes = state
        .client
        .select(&queries.abstraction_attributes(true))
        .await?;
    let mut relations = state
        .client
        .select(&queries.abstraction_relations("owl:ObjectProperty", true))
        .await?;
    let mut categories = state
        .client
        .select(&queries.abstraction_categories(true))
        .await?;

    if session.logged_in() {
        entities.extend(
            state
                .client
                .select(&queries.abstraction_entities(false))
                .await?,
        );
        attributes.extend(
            state
                .client
                .select(&queries.abstraction_attributes(false))
                .await?,
        );
        relations.extend(
            state
                .client
                .select(&queries.abstraction_relations("owl:ObjectProperty", false))
                .await?,
        );
        categories.extend(
            state
                .client
                .select(&queries.abstraction_categories(false))
                .await?,
        );
    }

    let positionable = state.client.select(&queries.positionable_entities()).await?;
    let subclasses = state.client.select(&queries.isa_relations()).await?;

    Ok(Json(json!({
        "entities": entities,
        "attributes": attributes,
        "relations": relations,
        "categories": categories,
        "positionable": positionable,
        "subclass_of": subclasses,
    })))
}

#[derive(Deserialize)]
pub struct SparqlQueryForm {
    #[serde(flatten)]
    pub graph: QueryGraph,
    /// Persist the run as a query job.
    #[serde(default, rename = "jobManager")]
    pub job_manager: bool,
    /// UI description of the query graph, stored with the job.
    #[serde(default, rename = "requestGraph")]
    pub request_graph: Option<Value>,
    /// Skip writing the result csv file.
    #[serde(default)]
    pub nofile: bool,
}

async fn execute(
    state: &SharedState,
    builder: &triplify_store::QueryBuilder,
    form: &SparqlQueryForm,
) -> TriplifyResult<(String, Vec<Row>)> {
    let accessible = fetch_accessible_graphs(&state.client, builder).await?;
    let assembled = assemble(&form.graph, builder, &accessible)?;
    debug!(query = %assembled.sparql, "executing assembled query");

    let rows = if form.graph.endpoints.is_empty() {
        state.client.select(&assembled.sparql).await?
    } else {
        let registry =
            EndpointRegistry::new(&state.client, builder, state.internal_namespace());
        let selected: Vec<_> = registry
            .enabled()
            .await?
            .into_iter()
            .filter(|e| form.graph.endpoints.contains(&e.url))
            .collect();
        MultiQuery::new(&state.client)
            .select(&assembled.sparql, &selected)
            .await?
    };
    Ok((assembled.sparql, rows))
}

fn write_results_csv(
    dir: &std::path::Path,
    variates: &[String],
    rows: &[Row],
) -> TriplifyResult<String> {
    let name = format!("result_{}.csv", Uuid::new_v4().simple());
    let path = UserDirs::safe_join(dir, &name)?;
    let mut writer = csv::Writer::from_path(&path)?;

    let columns: Vec<&str> = variates
        .iter()
        .map(|v| v.trim_start_matches('?'))
        .collect();
    writer.write_record(&columns)?;
    for row in rows {
        let record: Vec<&str> = columns
            .iter()
            .map(|c| row.get(*c).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(name)
}

/// POST /sparqlquery — assemble, execute, and report rows (plus an
/// optional result file and job record).
pub async fn sparqlquery(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<SparqlQueryForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());

    let job_id = if form.job_manager {
        let label = form.graph.variates.join(" ");
        Some(jobs.create(JobKind::Query, &label).await?)
    } else {
        None
    };

    match execute(&state, &builder, &form).await {
        Ok((_query, mut rows)) => {
            let nrow = rows.len();
            if form.graph.limit > 0 && rows.len() > form.graph.limit as usize {
                rows.truncate(form.graph.limit as usize);
            }

            let file = if form.nofile {
                None
            } else {
                let dir = state.user_dirs(&session).result()?;
                Some(write_results_csv(&dir, &form.graph.variates, &rows)?)
            };

            if let Some(job_id) = &job_id {
                let preview: Vec<&Row> = rows.iter().take(JOB_PREVIEW_ROWS).collect();
                jobs.done_query(
                    job_id,
                    nrow as u64,
                    &serde_json::to_value(&preview).map_err(TriplifyError::from)?,
                    file.as_deref(),
                )
                .await?;
            }

            Ok(Json(json!({
                "values": rows,
                "nrow": nrow,
                "file": file,
            })))
        }
        Err(e) => {
            error!(error = %e, "query execution failed");
            if let Some(job_id) = &job_id {
                if let Err(je) = jobs.set_error(job_id, &e.to_string()).await {
                    error!(error = %je, "could not record job error");
                }
            }
            Ok(Json(json!({
                "values": "",
                "file": "",
                "error": e.to_string(),
            })))
        }
    }
}

/// POST /sparql_query_text — assemble without executing.
pub async fn sparql_query_text(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<SparqlQueryForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let accessible = fetch_accessible_graphs(&state.client, &builder).await?;
    let assembled = assemble(&form.graph, &builder, &accessible)?;
    Ok(Json(json!({ "query": assembled.sparql })))
}

fn scalar(rows: Vec<Row>) -> u64 {
    rows.first()
        .and_then(|r| r.get("number"))
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn class_attr_table(rows: Vec<Row>) -> Map<String, Value> {
    let mut table: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let (Some(class), Some(attr)) = (row.get("class"), row.get("attr")) else {
            continue;
        };
        let attrs = table.entry(class.clone()).or_default();
        if !attrs.contains(attr) {
            attrs.push(attr.clone());
        }
    }
    table.into_iter().map(|(k, v)| (k, json!(v))).collect()
}

fn class_rel_table(rows: Vec<Row>) -> Map<String, Value> {
    let mut table: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for row in rows {
        let (Some(domain), Some(relname), Some(range)) =
            (row.get("domain"), row.get("relname"), row.get("range"))
        else {
            continue;
        };
        let rels = table.entry(domain.clone()).or_default();
        let entry = json!({ "relname": relname, "target": range });
        if !rels.contains(&entry) {
            rels.push(entry);
        }
    }
    table.into_iter().map(|(k, v)| (k, json!(v))).collect()
}

/// Public statistics span the federation; private ones stay local.
async fn scoped_rows(
    state: &SharedState,
    multi: &MultiQuery<'_>,
    endpoints: &[RegisteredEndpoint],
    scope: AccessLevel,
    query: String,
) -> TriplifyResult<Vec<Row>> {
    match scope {
        AccessLevel::Public => multi.select(&query, endpoints).await,
        AccessLevel::Private => state.client.select(&query).await,
    }
}

/// GET /statistics — triple/entity/class/graph counts and the schema
/// tables, for public data (across the federation) and the user's own.
pub async fn statistics(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let queries = StatsQueries::new(&builder);

    let registry = EndpointRegistry::new(&state.client, &builder, state.internal_namespace());
    let endpoints = registry.enabled().await.unwrap_or_default();
    let multi = MultiQuery::new(&state.client);

    let mut scopes = Map::new();
    for (key, scope) in [("public", AccessLevel::Public), ("private", AccessLevel::Private)] {
        let rows = |q: String| scoped_rows(&state, &multi, &endpoints, scope, q);

        let ntriples = scalar(rows(queries.number_of_triples(scope)).await?);
        let nentities = scalar(rows(queries.number_of_entities(scope)).await?);
        let nclasses = scalar(rows(queries.number_of_classes(scope)).await?);
        let ngraphs = scalar(rows(queries.number_of_graphs(scope)).await?);
        let graphs = rows(queries.graph_infos(scope)).await?;
        let class_attr = class_attr_table(rows(queries.attributes_of_classes(scope)).await?);
        let class_rel = class_rel_table(rows(queries.relations_of_classes(scope)).await?);

        scopes.insert(
            key.to_string(),
            json!({
                "ntriples": ntriples,
                "nentities": nentities,
                "nclasses": nclasses,
                "ngraphs": ngraphs,
                "graphs": graphs,
                "class_attr": class_attr,
                "class_rel": class_rel,
            }),
        );
    }

    Ok(Json(json!({
        "username": session.username,
        "public": scopes.get("public"),
        "private": scopes.get("private"),
    })))
}
