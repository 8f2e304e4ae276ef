//! External endpoint management: registry CRUD, inspection and
//! integration of remote ontologies.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use triplify_convert::external::ExternalEndpoint;
use triplify_convert::source_file::persist_triples;
use triplify_store::endpoints::EndpointRegistry;
use triplify_store::jobs::JobStore;
use triplify_store::AccessLevel;

use crate::error::ApiError;
use crate::state::SharedState;

const INSPECT_TIMEOUT: Duration = Duration::from_secs(60);
const OWL_NS: &str = "http://www.w3.org/2002/07/owl#";

/// GET /list_endpoints
pub async fn list_endpoints(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let registry = EndpointRegistry::new(&state.client, &builder, state.internal_namespace());
    Ok(Json(json!({
        "local": state.config.triplestore.query_endpoint,
        "external": registry.list().await?,
    })))
}

#[derive(Deserialize)]
pub struct AddEndpointForm {
    pub name: String,
    pub url: String,
    pub auth: String,
}

/// POST /add_endpoint
pub async fn add_endpoint(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<AddEndpointForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let registry = EndpointRegistry::new(&state.client, &builder, state.internal_namespace());
    let id = registry.save(&form.name, &form.url, &form.auth, true).await?;
    Ok(Json(json!({ "id": id })))
}

#[derive(Deserialize)]
pub struct DeleteEndpointsForm {
    pub id_endpoints: Vec<String>,
}

/// POST /delete_endpoints
pub async fn delete_endpoints(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<DeleteEndpointsForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let registry = EndpointRegistry::new(&state.client, &builder, state.internal_namespace());
    for id in &form.id_endpoints {
        registry.remove(id).await?;
    }
    Ok(Json(json!({})))
}

#[derive(Deserialize)]
pub struct EnableEndpointForm {
    pub id: String,
    pub enable: bool,
}

/// POST /enable_endpoints
pub async fn enable_endpoints(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<EnableEndpointForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let registry = EndpointRegistry::new(&state.client, &builder, state.internal_namespace());
    registry.set_enabled(&form.id, form.enable).await?;
    Ok(Json(json!({})))
}

#[derive(Deserialize)]
pub struct InspectForm {
    pub name: String,
    pub url: String,
}

/// POST /inspect_endpoint — per-ontology counts of classes and
/// properties hosted by a remote endpoint.
pub async fn inspect_endpoint(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<InspectForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;

    let endpoint = ExternalEndpoint::new(&form.url, INSPECT_TIMEOUT)?;
    let rows = endpoint.inspect(&builder).await?;

    // Group the (ontology, owl kind, count) rows per ontology.
    let mut ontologies: Map<String, Value> = Map::new();
    for row in rows {
        let (Some(ont), Some(owl), Some(count)) =
            (row.get("ont"), row.get("owl"), row.get("count"))
        else {
            continue;
        };
        let kind = owl.replace(OWL_NS, "");
        let entry = ontologies
            .entry(ont.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(counts) = entry {
            counts.insert(kind, json!(count.parse::<u64>().unwrap_or(0)));
        }
    }
    debug!(endpoint = %form.url, ontologies = ontologies.len(), "endpoint inspected");

    Ok(Json(json!({
        "name": form.name,
        "uri": form.url,
        "onto": ontologies,
    })))
}

#[derive(Deserialize)]
pub struct OntologyRef {
    pub name: String,
    pub prefix: String,
}

#[derive(Deserialize)]
pub struct EndpointIntegration {
    pub uri: String,
    pub onto: Vec<OntologyRef>,
}

/// POST /integrate_endpoint — record the endpoint's service description
/// and the abstraction of each chosen ontology. Always public.
pub async fn integrate_endpoint(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<HashMap<String, EndpointIntegration>>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    session.check_admin()?;

    let mut integrated = Vec::new();
    for (name, spec) in &form {
        let endpoint = ExternalEndpoint::new(&spec.uri, INSPECT_TIMEOUT)?;

        // Ontology prefixes become part of the shared registry before
        // any query text is built.
        {
            let mut prefixes = state.prefixes.write().await;
            for onto in &spec.onto {
                if !onto.prefix.is_empty() {
                    prefixes.insert(&onto.prefix, &onto.name);
                }
            }
        }
        let builder = state.query_builder(&session).await;
        let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());

        let mut blocks = vec![endpoint.service_description()];
        for onto in &spec.onto {
            let ontology = endpoint.ontology(&onto.name, &onto.prefix);
            blocks.extend(ontology.abstraction(&builder).await?);
        }

        let loader = state
            .loader(&session, AccessLevel::Public, &format!("endpoint_{name}"))
            .await?;
        let outcome =
            persist_triples(&spec.uri, 0, blocks, Vec::new(), &loader, &jobs).await?;
        info!(endpoint = %spec.uri, status = %outcome.status, "external endpoint integrated");
        integrated.push(json!({ "name": name, "outcome": outcome }));
    }

    Ok(Json(json!({ "integrated": integrated })))
}
