//! Named-graph management: listing, deletion, full wipe.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use triplify_store::graph::GraphQueries;
use triplify_store::QueryBuilder;

use crate::error::ApiError;
use crate::state::SharedState;

/// GET /list_user_graph
pub async fn list_user_graph(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;

    let rows = state
        .client
        .select(&GraphQueries::new(&builder).user_graph_infos_with_count())
        .await?;

    let mut graphs = Vec::new();
    for row in rows {
        let Some(date) = row.get("date") else {
            warn!(?row, "graph listing row without a date");
            continue;
        };
        let readable_date = NaiveDateTime::parse_from_str(date, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|d| d.format("%d/%m/%Y %H:%M:%S").to_string())
            .unwrap_or_else(|_| date.clone());
        let access = row.get("access").cloned().unwrap_or_default();
        graphs.push(json!({
            "g": row.get("g"),
            "name": row.get("name"),
            "count": row.get("co"),
            "date": date,
            "readable_date": readable_date,
            "access": access,
            "owner": row.get("owner"),
            "access_bool": access == "public",
        }));
    }
    Ok(Json(json!(graphs)))
}

/// Graph URIs owned by a user.
pub(crate) async fn graphs_of_user(
    state: &SharedState,
    builder: &QueryBuilder,
    username: &str,
) -> Result<Vec<String>, ApiError> {
    let rows = state
        .client
        .select(&builder.graphs_of_user(username))
        .await?;
    Ok(rows.into_iter().filter_map(|mut r| r.remove("g")).collect())
}

/// Drop every graph a user owns, with its metadata.
pub(crate) async fn drop_graphs_of_user(
    state: &SharedState,
    builder: &QueryBuilder,
    username: &str,
) -> Result<u64, ApiError> {
    let graphs = graphs_of_user(state, builder, username).await?;
    let mut dropped = 0;
    for graph in graphs {
        debug!(%graph, "dropping graph");
        state.client.update(&builder.drop_named_graph(&graph)).await?;
        state
            .client
            .update(&builder.delete_graph_metadata(&graph))
            .await?;
        dropped += 1;
    }
    Ok(dropped)
}

#[derive(Deserialize)]
pub struct DeleteGraphForm {
    pub named_graph: Vec<String>,
}

/// POST /delete_graph — drop the given graphs. Plain users can only
/// drop graphs they own.
pub async fn delete_graph(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<DeleteGraphForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;

    let owned = if session.admin {
        None
    } else {
        Some(graphs_of_user(&state, &builder, &session.username).await?)
    };

    let mut dropped = Vec::new();
    for graph in &form.named_graph {
        if let Some(owned) = &owned {
            if !owned.contains(graph) {
                warn!(%graph, user = %session.username, "refusing to drop foreign graph");
                continue;
            }
        }
        debug!(%graph, "dropping graph");
        state.client.update(&builder.drop_named_graph(graph)).await?;
        state
            .client
            .update(&builder.delete_graph_metadata(graph))
            .await?;
        dropped.push(graph.clone());
    }

    Ok(Json(json!({ "dropped": dropped })))
}

/// GET /empty_user_database — drop every graph of the session user.
pub async fn empty_user_database(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let dropped = drop_graphs_of_user(&state, &builder, &session.username).await?;
    Ok(Json(json!({ "dropped": dropped })))
}
