//! File preview and integration endpoints: everything between an upload
//! and a loaded named graph.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;
use triplify_auth::Session;
use triplify_common::TriplifyError;
use triplify_convert::bed::BedFile;
use triplify_convert::gff::GffFile;
use triplify_convert::source_file::{
    count_lines, detect_kind, persist_remote, persist_triples, persist_ttl_file, SourceKind,
};
use triplify_convert::tabular::{ColumnType, TabularFile};
use triplify_convert::ttl::TtlFile;
use triplify_convert::UserDirs;
use triplify_store::endpoints::EndpointRegistry;
use triplify_store::federation::MultiQuery;
use triplify_store::graph::GraphQueries;
use triplify_store::jobs::JobStore;
use triplify_store::AccessLevel;

use crate::error::ApiError;
use crate::state::SharedState;

/// Integrating into a public graph is an admin privilege.
fn check_public(session: &Session, public: bool) -> Result<(), TriplifyError> {
    if public && !session.admin {
        return Err(TriplifyError::Forbidden);
    }
    Ok(())
}

fn access_level(public: bool) -> AccessLevel {
    if public {
        AccessLevel::Public
    } else {
        AccessLevel::Private
    }
}

fn upload_path(
    state: &SharedState,
    session: &Session,
    name: &str,
) -> Result<std::path::PathBuf, TriplifyError> {
    let dir = state.user_dirs(session).upload()?;
    let path = UserDirs::safe_join(&dir, name)?;
    if !path.is_file() {
        return Err(TriplifyError::NotFound(name.to_string()));
    }
    Ok(path)
}

/// POST /source_files_overview — previews for the files about to be
/// integrated, plus the known taxons.
pub async fn source_files_overview(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(names): Json<Vec<String>>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;

    // Taxons already in the store, across the federation.
    let registry = EndpointRegistry::new(&state.client, &builder, state.internal_namespace());
    let endpoints = registry.enabled().await.unwrap_or_default();
    let taxon_rows = MultiQuery::new(&state.client)
        .select(&GraphQueries::new(&builder).all_taxons(), &endpoints)
        .await
        .unwrap_or_default();
    let taxons: Vec<String> = taxon_rows
        .into_iter()
        .filter_map(|mut r| r.remove("taxon"))
        .collect();

    let mut files = Vec::new();
    for name in &names {
        files.push(overview_of(&state, &session, name));
    }

    Ok(Json(json!({ "files": files, "taxons": taxons })))
}

fn overview_of(state: &SharedState, session: &Session, name: &str) -> Value {
    let path = match upload_path(state, session, name) {
        Ok(p) => p,
        Err(e) => return json!({ "name": name, "error": e.to_string() }),
    };
    let Some(kind) = detect_kind(name, None) else {
        return json!({ "name": name, "error": "unsupported file type" });
    };

    let result = match kind {
        SourceKind::Tabular => TabularFile::open(&path, name).and_then(|file| {
            let preview = file.preview()?;
            let column_types = file.guess_column_types(&preview);
            Ok(json!({
                "name": name,
                "type": kind,
                "headers": file.headers(),
                "preview_data": preview,
                "column_types": column_types,
            }))
        }),
        SourceKind::Gff => {
            let file = GffFile::open(&path, name);
            file.feature_types().map(|entities| {
                json!({ "name": name, "type": kind, "entities": entities })
            })
        }
        SourceKind::Bed => {
            let file = BedFile::open(&path, name);
            file.check()
                .map(|_| json!({ "name": name, "type": kind, "test": "OK" }))
        }
        SourceKind::Ttl => {
            let file = TtlFile::open(&path, name);
            file.preview()
                .map(|preview| json!({ "name": name, "type": kind, "preview": preview }))
        }
    };

    result.unwrap_or_else(|e| {
        error!(file = %name, error = %e, "could not preview file");
        json!({ "name": name, "type": kind, "error": e.to_string() })
    })
}

#[derive(Deserialize)]
pub struct GuessForm {
    pub filename: String,
}

/// POST /guess_csv_header_type
pub async fn guess_csv_header_type(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<GuessForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let path = upload_path(&state, &session, &form.filename)?;
    let file = TabularFile::open(&path, &form.filename)?;
    let preview = file.preview()?;
    Ok(Json(json!({ "types": file.guess_column_types(&preview) })))
}

/// POST /prefix_uri — URI prefix declared for each entity, plus the
/// deployment default.
pub async fn prefix_uri(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    let builder = state.query_builder(&session).await;
    let rows = state
        .client
        .select(&GraphQueries::new(&builder).prefix_uris())
        .await?;

    let mut out = serde_json::Map::new();
    for mut row in rows {
        if let (Some(label), Some(uri)) = (row.remove("nodeLabel"), row.remove("prefUri")) {
            out.insert(label, Value::String(uri));
        }
    }
    out.insert(
        "__default__".to_string(),
        Value::String(state.config.namespaces.data.clone()),
    );
    Ok(Json(Value::Object(out)))
}

#[derive(Deserialize)]
pub struct TabularForm {
    pub file_name: String,
    pub col_types: Vec<ColumnType>,
    #[serde(default)]
    pub disabled_columns: Vec<usize>,
    #[serde(default)]
    pub key_columns: Vec<usize>,
    #[serde(default)]
    pub uris: Option<Vec<Option<String>>>,
    #[serde(default)]
    pub forced_type: Option<String>,
    #[serde(default)]
    pub public: bool,
}

fn tabular_from_form(
    state: &SharedState,
    session: &Session,
    form: &TabularForm,
) -> Result<TabularFile, TriplifyError> {
    let path = upload_path(state, session, &form.file_name)?;
    let mut file = TabularFile::open(&path, &form.file_name)?;
    file.set_column_types(form.col_types.clone());
    file.set_disabled_columns(form.disabled_columns.clone());
    file.set_key_columns(form.key_columns.clone());
    if let Some(uris) = &form.uris {
        file.set_uris(uris.clone());
    }
    Ok(file)
}

/// POST /preview_ttl — the Turtle a tabular integration would produce.
pub async fn preview_ttl(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<TabularForm>,
) -> Result<String, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let file = tabular_from_form(&state, &session, &form)?;

    let content = file.turtle(true)?.join("\n");
    let abstraction = file.abstraction().join("\n");
    let domain_knowledge = file.domain_knowledge()?.join("\n");

    let prefixes = state.prefixes.read().await;
    let header = prefixes.turtle_header(&format!(
        "{}\n{}\n{}",
        content, abstraction, domain_knowledge
    ));

    Ok(format!(
        "{header}\n\n\
         #############\n\
         #  Content  #\n\
         #############\n\n\
         {content}\n\n\
         #################\n\
         #  Abstraction  #\n\
         #################\n\n\
         {abstraction}\n\n\
         ######################\n\
         #  Domain knowledge  #\n\
         ######################\n\n\
         {domain_knowledge}\n"
    ))
}

/// POST /load_data_into_graph — integrate a tabular file.
pub async fn load_data_into_graph(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<TabularForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    check_public(&session, form.public)?;

    let file = tabular_from_form(&state, &session, &form)?;
    let path = upload_path(&state, &session, &form.file_name)?;
    let expected = count_lines(&path)?;

    let content = file.turtle(false)?;
    let mut abstraction = file.abstraction();
    abstraction.extend(file.domain_knowledge()?);

    let builder = state.query_builder(&session).await;
    let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());
    let loader = state
        .loader(&session, access_level(form.public), &form.file_name)
        .await?;

    let outcome =
        persist_triples(&form.file_name, expected, content, abstraction, &loader, &jobs).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(TriplifyError::from)?))
}

#[derive(Deserialize)]
pub struct GffForm {
    pub file_name: String,
    pub taxon: String,
    pub entities: Vec<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub uri: Option<String>,
}

/// POST /load_gff_into_graph
pub async fn load_gff_into_graph(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<GffForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    check_public(&session, form.public)?;

    let path = upload_path(&state, &session, &form.file_name)?;
    let mut file = GffFile::open(&path, &form.file_name);
    file.set_taxon(&form.taxon);
    file.set_entities(form.entities.clone());
    file.set_uri(form.uri.clone());

    let expected = count_lines(&path)?;
    let content = file.turtle()?;
    let mut abstraction = file.abstraction()?;
    abstraction.extend(file.domain_knowledge()?);

    let builder = state.query_builder(&session).await;
    let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());
    let loader = state
        .loader(&session, access_level(form.public), &form.file_name)
        .await?;

    let outcome =
        persist_triples(&form.file_name, expected, content, abstraction, &loader, &jobs).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(TriplifyError::from)?))
}

#[derive(Deserialize)]
pub struct BedForm {
    pub file_name: String,
    pub taxon: String,
    pub entity_name: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub uri: Option<String>,
}

/// POST /load_bed_into_graph
pub async fn load_bed_into_graph(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<BedForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    check_public(&session, form.public)?;

    let path = upload_path(&state, &session, &form.file_name)?;
    let mut file = BedFile::open(&path, &form.file_name);
    file.set_taxon(&form.taxon);
    file.set_entity_name(&form.entity_name);
    file.set_uri(form.uri.clone());

    let expected = count_lines(&path)?;
    let content = file.turtle()?;
    let mut abstraction = file.abstraction();
    abstraction.extend(file.domain_knowledge()?);

    let builder = state.query_builder(&session).await;
    let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());
    let loader = state
        .loader(&session, access_level(form.public), &form.file_name)
        .await?;

    let outcome =
        persist_triples(&form.file_name, expected, content, abstraction, &loader, &jobs).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(TriplifyError::from)?))
}

#[derive(Deserialize)]
pub struct TtlForm {
    pub file_name: String,
    #[serde(default)]
    pub public: bool,
}

/// POST /load_ttl_into_graph — validate, then ship the file whole.
pub async fn load_ttl_into_graph(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<TtlForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    check_public(&session, form.public)?;

    let path = upload_path(&state, &session, &form.file_name)?;
    let file = TtlFile::open(&path, &form.file_name);
    let triple_count = file.validate()?;
    let expected = file.line_count()?;

    // The store fetches ttl files from the rdf directory, not the
    // upload one.
    let rdf_dir = state.user_dirs(&session).rdf()?;
    let rdf_path = UserDirs::safe_join(&rdf_dir, &form.file_name)?;
    std::fs::copy(&path, &rdf_path)?;

    let builder = state.query_builder(&session).await;
    let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());
    let loader = state
        .loader(&session, access_level(form.public), &form.file_name)
        .await?;

    let outcome = persist_ttl_file(
        &form.file_name,
        &rdf_path,
        expected,
        triple_count,
        &loader,
        &jobs,
    )
    .await?;
    Ok(Json(serde_json::to_value(outcome).map_err(TriplifyError::from)?))
}

#[derive(Deserialize)]
pub struct RemoteForm {
    pub url: String,
    #[serde(default)]
    pub public: bool,
}

/// POST /load_remote_data_into_graph — let the store fetch a document.
pub async fn load_remote_data_into_graph(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<RemoteForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    check_public(&session, form.public)?;

    if !form.url.starts_with("http://") && !form.url.starts_with("https://") {
        return Err(TriplifyError::Convert(format!("not a fetchable url: {}", form.url)).into());
    }

    let builder = state.query_builder(&session).await;
    let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());
    let loader = state
        .loader(&session, access_level(form.public), &form.url)
        .await?;

    let outcome = persist_remote(&form.url, &loader, &jobs).await?;
    Ok(Json(serde_json::to_value(outcome).map_err(TriplifyError::from)?))
}
