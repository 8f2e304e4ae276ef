//! Upload management and file serving.
//!
//! Generated ttl files are served without a session: the triplestore
//! itself fetches them back when integrating with `LOAD <url>`.

use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use triplify_common::TriplifyError;
use triplify_convert::UserDirs;

use crate::error::ApiError;
use crate::state::SharedState;

/// POST /upload_file — multipart upload into the user's upload
/// directory.
pub async fn upload_file(
    State(state): State<SharedState>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let upload_dir = state.user_dirs(&session).upload()?;

    let mut uploaded = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TriplifyError::Convert(e.to_string()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let path = UserDirs::safe_join(&upload_dir, &file_name)?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| TriplifyError::Convert(e.to_string()))?;
        tokio::fs::write(&path, &bytes).await?;
        debug!(file = %file_name, size = bytes.len(), "file uploaded");
        uploaded.push(file_name);
    }

    Ok(Json(json!({ "uploaded": uploaded })))
}

/// GET /get_uploaded_files — name to human-readable size.
pub async fn get_uploaded_files(
    State(state): State<SharedState>,
    jar: CookieJar,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let upload_dir = state.user_dirs(&session).upload()?;

    let mut files = Map::new();
    for entry in std::fs::read_dir(&upload_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            let size = entry.metadata()?.len();
            files.insert(
                entry.file_name().to_string_lossy().into_owned(),
                Value::String(human_size(size)),
            );
        }
    }

    Ok(Json(json!({ "files": files })))
}

/// POST /delete_uploaded_files — body is the file name list.
pub async fn delete_uploaded_files(
    State(state): State<SharedState>,
    jar: CookieJar,
    Json(names): Json<Vec<String>>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let upload_dir = state.user_dirs(&session).upload()?;

    for name in &names {
        let path = UserDirs::safe_join(&upload_dir, name)?;
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(file = %name, error = %e, "could not delete upload");
        }
    }
    Ok(Json(json!({})))
}

/// GET /ttl/{username}/{name} — serve a generated ttl file back to the
/// store.
pub async fn serve_ttl(
    State(state): State<SharedState>,
    Path((username, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let dirs = UserDirs::new(&state.config.storage.files_dir, &username);
    let path = UserDirs::safe_join(&dirs.rdf()?, &name)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| TriplifyError::NotFound(name))?;
    Ok(([(header::CONTENT_TYPE, "text/turtle")], bytes))
}

/// GET /csv/{name} — serve a query result file.
pub async fn serve_csv(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let path = UserDirs::safe_join(&state.user_dirs(&session).result()?, &name)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| TriplifyError::NotFound(name))?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], bytes))
}

/// GET /del_csv/{name}
pub async fn delete_csv(
    State(state): State<SharedState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = state.session(&jar).await;
    session.check_auth()?;
    let path = UserDirs::safe_join(&state.user_dirs(&session).result()?, &name)?;
    if let Err(e) = std::fs::remove_file(&path) {
        warn!(file = %name, error = %e, "could not delete result file");
    }
    Ok(Json(json!({})))
}

pub(crate) fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_humanized() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KiB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
