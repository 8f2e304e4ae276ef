//! Query shortcuts: admin-curated triples in a dedicated graph that the
//! query UI expands into ready-made patterns.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::ApiError;
use crate::state::SharedState;

fn shortcuts_graph(state: &SharedState) -> String {
    let mut namespace = state.internal_namespace().to_string();
    if !namespace.ends_with('/') && !namespace.ends_with('#') {
        namespace.push('/');
    }
    format!("{}graph/shortcuts", namespace)
}

#[derive(Deserialize)]
pub struct ImportShortcutForm {
    /// Turtle defining the shortcut.
    pub shortcut_def: String,
    /// Extra text whose prefixes must be known before insertion.
    #[serde(default)]
    pub prefix: String,
}

/// POST /import_shortcut
pub async fn import_shortcut(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<ImportShortcutForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    session.check_admin()?;

    // Shortcut definitions may use namespaces we have not met yet.
    {
        let mut prefixes = state.prefixes.write().await;
        let text = format!("{}\n{}", form.prefix, form.shortcut_def);
        prefixes.learn_from(&text, &state.http).await?;
    }

    let prefixes = state.prefixes.read().await;
    let header = prefixes.sparql_header(&form.shortcut_def);
    state
        .client
        .insert_data(&form.shortcut_def, &shortcuts_graph(&state), &header)
        .await?;
    info!("shortcut imported");

    Ok(Json(json!({})))
}

#[derive(Deserialize)]
pub struct DeleteShortcutForm {
    /// URI of the shortcut to remove.
    pub shortcut: String,
}

/// POST /delete_shortcut
pub async fn delete_shortcut(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<DeleteShortcutForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    session.check_admin()?;

    if form.shortcut.contains(['<', '>', '"', ' ']) {
        return Err(triplify_common::TriplifyError::Query(format!(
            "invalid shortcut uri: {}",
            form.shortcut
        ))
        .into());
    }

    let builder = state.query_builder(&session).await;
    let update = builder.add_prefix_headers(&format!(
        "DELETE WHERE {{ GRAPH <{g}> {{ <{uri}> ?r ?a }} }}",
        g = shortcuts_graph(&state),
        uri = form.shortcut,
    ));
    state.client.update(&update).await?;

    Ok(Json(json!({})))
}
