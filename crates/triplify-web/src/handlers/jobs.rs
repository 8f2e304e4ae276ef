//! Job listing and deletion.

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::{json, Value};
use triplify_store::jobs::{JobKind, JobStore};

use crate::error::ApiError;
use crate::state::SharedState;

/// GET /list_jobs
pub async fn list_jobs(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());

    Ok(Json(json!({
        "integration": jobs.list(JobKind::Integration).await?,
        "query": jobs.list(JobKind::Query).await?,
    })))
}

#[derive(Deserialize)]
pub struct DeleteJobForm {
    pub jobid: String,
}

/// POST /del_job
pub async fn del_job(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(form): Json<DeleteJobForm>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let builder = state.query_builder(&session).await;
    let jobs = JobStore::new(&state.client, &builder, state.internal_namespace());
    jobs.remove(&form.jobid).await?;
    Ok(Json(json!({})))
}
